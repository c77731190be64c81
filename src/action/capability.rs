use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("{0}")]
    Failed(String),
    #[error("Request failed: {0}")]
    Request(String),
}

/// One content block of a capability result. Only text blocks are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Result of a host capability call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    pub fn structured(value: impl Into<Value>) -> Self {
        Self {
            structured_content: Some(value.into()),
            ..Self::default()
        }
    }

    fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }

    /// Readable failure text: text segments joined by a space.
    pub fn error_message(&self) -> String {
        let message = self.text_segments().collect::<Vec<_>>().join(" ");
        if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        }
    }

    /// Value stored under a result key.
    ///
    /// Structured content wins, with a single-field record unwrapped to that
    /// field. Otherwise the text content, decoded as JSON when it is JSON.
    pub fn result_value(&self) -> Value {
        if let Some(structured) = &self.structured_content {
            return match structured {
                Value::Object(record) if record.len() == 1 => {
                    record.values().next().cloned().unwrap_or_default()
                }
                other => other.clone(),
            };
        }
        let segments: Vec<&str> = self.text_segments().collect();
        if segments.is_empty() {
            return Value::Undefined;
        }
        let text = segments.join("\n");
        serde_json::from_str::<serde_json::Value>(&text)
            .map(Value::from)
            .unwrap_or(Value::String(text))
    }
}

/// Host capabilities reachable from actions. Any of them may be absent, in
/// which case the corresponding action succeeds without effect.
#[automock]
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<CallResult, CapabilityError>;

    async fn send_message(&self, role: &str, content: &str) -> Result<CallResult, CapabilityError>;

    async fn open_link(&self, url: &str) -> Result<CallResult, CapabilityError>;

    async fn update_model_context(
        &self,
        content: Option<Value>,
        structured_content: Option<Value>,
    ) -> Result<CallResult, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_joins_text() {
        let result: CallResult = serde_json::from_value(json!({
            "isError": true,
            "content": [
                {"type": "text", "text": "quota"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "exceeded"}
            ]
        }))
        .unwrap();
        assert_eq!(result.error_message(), "quota exceeded");
        assert_eq!(CallResult::default().error_message(), "Unknown error");
    }

    #[test]
    fn test_result_value_prefers_structured_content() {
        let single = CallResult::structured(Value::from(json!({"items": [1, 2]})));
        assert_eq!(single.result_value(), Value::from(json!([1, 2])));

        let multi = CallResult::structured(Value::from(json!({"a": 1, "b": 2})));
        assert_eq!(multi.result_value(), Value::from(json!({"a": 1, "b": 2})));

        assert_eq!(
            CallResult::text(r#"{"ok": true}"#).result_value(),
            Value::from(json!({"ok": true}))
        );
        assert_eq!(CallResult::text("plain").result_value(), Value::from("plain"));
        assert_eq!(CallResult::default().result_value(), Value::Undefined);
    }
}
