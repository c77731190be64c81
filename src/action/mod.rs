//! # Action Executor
//!
//! Declarative action trees, as written in a view definition, and the
//! machinery that runs them.
//!
//! A node is parsed infallibly into an [`ActionSpec`]. At execution time its
//! parameters are interpolated against the state, the local scope, `$event`
//! and `$error`, then validated into an [`Action`] and dispatched. Nested
//! `onSuccess`/`onError` lists run one level deeper; the depth limit is the
//! only guard against runaway callback graphs.
//!
//! Host facilities are traits so that they can be swapped or mocked:
//!
//! * [`CapabilityProvider`] - tool calls, messages, links, model context
//! * [`HttpClient`] - the `fetch` action ([`ReqwestClient`] by default)
//! * [`FilePicker`] - the `openFilePicker` action ([`PathFilePicker`] headless)
//! * [`Notifier`] - the `showToast` action ([`TracingNotifier`] by default)

pub mod capability;
pub mod context;
pub mod executor;
pub mod fetch;
pub mod file;
pub mod notify;
pub mod spec;

use thiserror::Error;

pub use capability::{CallResult, CapabilityError, CapabilityProvider, ContentBlock};
pub use context::{ExecutionContext, OverlayClose};
pub use executor::ActionExecutor;
pub use fetch::{FetchRequest, FetchResponse, HttpClient, ReqwestClient};
pub use file::{FileData, FileError, FilePicker, FilePickerOptions, PathFilePicker};
pub use notify::{Notifier, ToastOptions, ToastVariant, TracingNotifier};
pub use spec::{Action, ActionSpec};

/// Failure of a single action. The display text becomes `$error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Invalid action: {0}")]
    Invalid(String),
    #[error("{0}")]
    Tool(String),
    #[error("{status} {status_text}")]
    Http { status: u16, status_text: String },
    #[error("{0}")]
    Capability(#[from] CapabilityError),
    #[error("{0}")]
    File(#[from] FileError),
    #[error("File picker unavailable")]
    FilePickerUnavailable,
    #[error("Invalid response body: {0}")]
    Body(String),
}
