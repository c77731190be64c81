use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use super::notify::ToastVariant;
use crate::config::EngineConfig;
use crate::value::{Record, Value};

pub const ON_SUCCESS: &str = "onSuccess";
pub const ON_ERROR: &str = "onError";
pub const ON_TICK: &str = "onTick";
pub const ON_COMPLETE: &str = "onComplete";

/// Fields holding nested action specs. They are never interpolated with the
/// parent's bindings: their `$event`/`$error` exist only once they run.
pub const HANDLER_FIELDS: &[&str] = &[
    ON_SUCCESS,
    ON_ERROR,
    ON_TICK,
    ON_COMPLETE,
    "onClick",
    "onChange",
    "onSubmit",
];

/// Fields re-evaluated by the action itself, kept as written.
pub const RAW_FIELDS: &[&str] = &["while"];

/// Declarative action node as written in a view definition.
///
/// Parsing never fails. Shape problems surface when the node is executed
/// and its parameters are validated into an [`Action`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSpec {
    /// Discriminator from the `action` field.
    pub kind: Option<String>,
    /// Every other field, interpolated before validation.
    pub params: Record,
    pub raw: Record,
    pub handlers: BTreeMap<String, Vec<ActionSpec>>,
}

impl ActionSpec {
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };
        let mut spec = Self {
            kind: fields.get("action").and_then(Value::as_str).map(str::to_string),
            ..Self::default()
        };
        for (name, field) in fields.iter() {
            if HANDLER_FIELDS.contains(&name.as_str()) {
                spec.handlers
                    .insert(name.clone(), Self::list_from_value(field));
            } else if RAW_FIELDS.contains(&name.as_str()) {
                spec.raw.insert(name.clone(), field.clone());
            } else {
                spec.params.insert(name.clone(), field.clone());
            }
        }
        spec
    }

    /// A single spec or a list of specs. Null/undefined is an empty list.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            Value::Undefined | Value::Null => Vec::new(),
            other => vec![Self::from_value(other)],
        }
    }

    pub fn handler(&self, name: &str) -> &[ActionSpec] {
        self.handlers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn raw_field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn kind_name(&self) -> &str {
        self.kind.as_deref().unwrap_or("<none>")
    }
}

impl From<serde_json::Value> for ActionSpec {
    fn from(json: serde_json::Value) -> Self {
        Self::from_value(&Value::from(json))
    }
}

impl<'de> Deserialize<'de> for ActionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self::from_value(&value))
    }
}

/// Validated action, discriminated by the `action` field.
#[derive(Debug, Clone, PartialEq, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Action {
    SetState {
        key: String,
        #[serde(default)]
        value: Value,
    },
    ToggleState {
        key: String,
    },
    AppendState {
        key: String,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        index: Option<i64>,
    },
    PopState {
        key: String,
        #[serde(default)]
        index: Option<i64>,
    },
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: Option<Value>,
        #[serde(default)]
        result_key: Option<String>,
    },
    SendMessage {
        #[serde(deserialize_with = "lenient_string")]
        content: String,
        #[serde(default = "default_role")]
        role: String,
    },
    OpenLink {
        #[serde(deserialize_with = "lenient_string")]
        url: String,
    },
    UpdateContext {
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        structured_content: Option<Value>,
    },
    ShowToast {
        #[serde(deserialize_with = "lenient_string")]
        message: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        duration: Option<u64>,
        #[serde(default)]
        variant: Option<ToastVariant>,
    },
    Fetch {
        #[serde(deserialize_with = "lenient_string")]
        url: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        headers: Option<Record>,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default)]
        result_key: Option<String>,
    },
    OpenFilePicker {
        #[serde(default)]
        accept: Option<String>,
        #[serde(default)]
        multiple: bool,
        #[serde(default)]
        max_size: Option<u64>,
        #[serde(default)]
        result_key: Option<String>,
    },
    CloseOverlay {},
    SetInterval {
        /// Milliseconds between ticks.
        duration: u64,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        id: Option<String>,
    },
    ClearInterval {
        id: String,
    },
}

fn default_role() -> String {
    "user".to_string()
}

/// Accepts any scalar and keeps its display form.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        value @ (Value::Number(_) | Value::Bool(_)) => Ok(value.to_display_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            other.type_name()
        ))),
    }
}

impl Action {
    /// Builds an action from interpolated parameters.
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let json = serde_json::Value::from(params);
        let action: Action = serde_json::from_value(json).map_err(|e| e.to_string())?;
        Ok(action)
    }

    /// Checks that depend on engine configuration.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), String> {
        match self {
            Action::SetInterval { duration, .. } => {
                let minimum = config.interval.minimum_period.as_millis().max(1) as u64;
                if *duration < minimum {
                    return Err(format!(
                        "setInterval duration {}ms is below the minimum of {}ms",
                        duration, minimum
                    ));
                }
                Ok(())
            }
            Action::SetState { key, .. }
            | Action::ToggleState { key }
            | Action::AppendState { key, .. }
            | Action::PopState { key, .. }
                if key.is_empty() =>
            {
                Err("state key must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }
}
