use std::fmt;
use std::sync::Arc;

use super::capability::CapabilityProvider;
use crate::eval::Context;
use crate::state_store::StateStore;
use crate::value::Value;

pub type OverlayClose = Arc<dyn Fn() + Send + Sync>;

/// Everything one action node executes against.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub capabilities: Option<Arc<dyn CapabilityProvider>>,
    pub state: Arc<StateStore>,
    /// Bound as `$event`.
    pub event: Value,
    pub depth: usize,
    /// Bound as `$error`; only set on the `onError` path.
    pub error: Option<String>,
    /// Render-time local bindings layered over state.
    pub scope: Value,
    pub overlay_close: Option<OverlayClose>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("capabilities", &self.capabilities.is_some())
            .field("event", &self.event)
            .field("depth", &self.depth)
            .field("error", &self.error)
            .field("scope", &self.scope)
            .field("overlay_close", &self.overlay_close.is_some())
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(state: Arc<StateStore>) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilityProvider>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_event(mut self, event: impl Into<Value>) -> Self {
        self.event = event.into();
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<Value>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_overlay_close(mut self, close: OverlayClose) -> Self {
        self.overlay_close = Some(close);
        self
    }

    /// Context for a nested callback: one level deeper, no event, no error.
    pub fn child(&self) -> Self {
        Self {
            event: Value::Undefined,
            error: None,
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    /// State with scope layered on top.
    pub fn state_context(&self) -> Context {
        let mut context = Context::from_value(&self.state.get_all());
        context.extend(&self.scope);
        context
    }

    /// State, scope, `$event` and `$error`, later entries shadowing earlier ones.
    pub fn expression_context(&self) -> Context {
        let mut context = self.state_context();
        if !self.event.is_undefined() {
            context.insert("$event", self.event.clone());
        }
        if let Some(error) = &self.error {
            context.insert("$error", error.clone());
        }
        context
    }
}
