use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Default,
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToastOptions {
    pub description: Option<String>,
    /// Milliseconds.
    pub duration: Option<u64>,
}

/// Presents transient notifications.
#[automock]
pub trait Notifier: Send + Sync {
    fn show(&self, variant: ToastVariant, message: &str, options: &ToastOptions);
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show(&self, variant: ToastVariant, message: &str, options: &ToastOptions) {
        let description = options.description.as_deref().unwrap_or("");
        match variant {
            ToastVariant::Error => error!(%variant, description, "{}", message),
            ToastVariant::Warning => warn!(%variant, description, "{}", message),
            _ => info!(%variant, description, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_variant_names() {
        assert_eq!(ToastVariant::from_str("warning").unwrap(), ToastVariant::Warning);
        assert_eq!(ToastVariant::Success.to_string(), "success");
        let parsed: ToastVariant = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(parsed, ToastVariant::Info);
    }
}
