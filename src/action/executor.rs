use std::sync::Arc;
use std::time::Duration;

use async_recursion::async_recursion;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::capability::{CallResult, CapabilityError, CapabilityProvider};
use super::context::ExecutionContext;
use super::fetch::{build_request, parse_body, FetchRequest, HttpClient, ReqwestClient};
use super::file::{FilePicker, FilePickerOptions};
use super::notify::{Notifier, ToastOptions, TracingNotifier};
use super::spec::{Action, ActionSpec, ON_COMPLETE, ON_ERROR, ON_SUCCESS, ON_TICK};
use super::ActionError;
use crate::config::EngineConfig;
use crate::error::InternalResult;
use crate::eval::ExpressionEvaluator;
use crate::interval::{IntervalRequest, IntervalScheduler};
use crate::value::Value;

/// How a dispatched action finished.
enum Outcome {
    /// Callbacks still to be run by the generic `onSuccess`/`onError` step.
    Completed(Result<(), ActionError>),
    /// The action ran its own callbacks.
    SelfManaged(bool),
}

/// Runs action trees against a state store and the host's capabilities.
///
/// Cloning is cheap and every clone shares the same interval scheduler.
#[derive(Clone)]
pub struct ActionExecutor {
    config: Arc<EngineConfig>,
    evaluator: Arc<ExpressionEvaluator>,
    http: Arc<dyn HttpClient>,
    file_picker: Option<Arc<dyn FilePicker>>,
    notifier: Arc<dyn Notifier>,
    intervals: Arc<IntervalScheduler>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .field("file_picker", &self.file_picker.is_some())
            .field("intervals", &self.intervals.active_count())
            .finish()
    }
}

impl ActionExecutor {
    pub fn new(config: EngineConfig) -> InternalResult<Self> {
        let http = ReqwestClient::new(&config.fetch)?;
        Ok(Self {
            evaluator: Arc::new(ExpressionEvaluator::new(&config)),
            config: Arc::new(config),
            http: Arc::new(http),
            file_picker: None,
            notifier: Arc::new(TracingNotifier),
            intervals: Arc::new(IntervalScheduler::new()),
        })
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_file_picker(mut self, file_picker: Arc<dyn FilePicker>) -> Self {
        self.file_picker = Some(file_picker);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &ExpressionEvaluator {
        &self.evaluator
    }

    pub fn intervals(&self) -> &IntervalScheduler {
        &self.intervals
    }

    /// Stops every interval started through this executor or its clones.
    pub fn clear_all_intervals(&self) {
        self.intervals.clear_all();
    }

    /// Runs a list in order and stops at the first failure.
    ///
    /// Returns whether every action succeeded.
    #[instrument(level = "debug", skip_all, fields(count = specs.len(), depth = ctx.depth))]
    pub async fn execute_actions(&self, specs: &[ActionSpec], ctx: ExecutionContext) -> bool {
        for (position, spec) in specs.iter().enumerate() {
            if !self.execute_action(spec, ctx.clone()).await {
                if position + 1 < specs.len() {
                    debug!(
                        "Skipping {} actions after failed '{}'",
                        specs.len() - position - 1,
                        spec.kind_name()
                    );
                }
                return false;
            }
        }
        true
    }

    /// Executes one node and its callbacks.
    ///
    /// Never fails outright: depth overflow and invalid specs return `false`
    /// without running anything, other failures run `onError` first.
    #[async_recursion]
    pub async fn execute_action(&self, spec: &ActionSpec, ctx: ExecutionContext) -> bool {
        if ctx.depth > self.config.max_action_depth {
            warn!(
                "Action '{}' exceeds maximum depth {} (depth {})",
                spec.kind_name(),
                self.config.max_action_depth,
                ctx.depth
            );
            return false;
        }

        let action = match self.resolve(spec, &ctx) {
            Ok(action) => action,
            Err(e) => {
                warn!("Invalid action '{}': {}", spec.kind_name(), e);
                return false;
            }
        };
        debug!("Executing '{}' at depth {}", action.kind(), ctx.depth);

        match self.dispatch(action, spec, &ctx).await {
            Outcome::SelfManaged(succeeded) => succeeded,
            Outcome::Completed(Ok(())) => {
                self.execute_actions(spec.handler(ON_SUCCESS), ctx.child())
                    .await;
                true
            }
            Outcome::Completed(Err(e)) => {
                self.fail(spec, &ctx, &e).await;
                false
            }
        }
    }

    /// Interpolates the parameters and validates them into an [`Action`].
    fn resolve(&self, spec: &ActionSpec, ctx: &ExecutionContext) -> Result<Action, ActionError> {
        if spec.kind.is_none() {
            return Err(ActionError::Invalid("missing 'action' field".to_string()));
        }
        let params = self
            .evaluator
            .interpolate_props(&Value::object(spec.params.clone()), &ctx.expression_context());
        let action = Action::from_params(&params).map_err(ActionError::Invalid)?;
        action
            .validate(&self.config)
            .map_err(ActionError::Invalid)?;
        Ok(action)
    }

    async fn fail(&self, spec: &ActionSpec, ctx: &ExecutionContext, error: &ActionError) {
        let message = error.to_string();
        warn!("Action '{}' failed: {}", spec.kind_name(), message);
        self.execute_actions(spec.handler(ON_ERROR), ctx.child().with_error(message))
            .await;
    }

    async fn dispatch(&self, action: Action, spec: &ActionSpec, ctx: &ExecutionContext) -> Outcome {
        let state = &ctx.state;
        let result = match action {
            Action::SetState { key, value } => {
                state.set(&key, value);
                Ok(())
            }
            Action::ToggleState { key } => {
                let current = state.get(&key);
                state.set(&key, !current.to_bool());
                Ok(())
            }
            Action::AppendState { key, value, index } => {
                append_state(ctx, &key, value, index);
                Ok(())
            }
            Action::PopState { key, index } => {
                pop_state(ctx, &key, index);
                Ok(())
            }
            Action::ToolCall {
                tool,
                arguments,
                result_key,
            } => {
                self.call_capability(ctx, result_key.as_deref(), |provider| async move {
                    provider
                        .invoke_tool(&tool, arguments.unwrap_or_else(Value::empty_object))
                        .await
                })
                .await
            }
            Action::SendMessage { content, role } => {
                self.call_capability(ctx, None, |provider| async move {
                    provider.send_message(&role, &content).await
                })
                .await
            }
            Action::OpenLink { url } => {
                self.call_capability(ctx, None, |provider| async move {
                    provider.open_link(&url).await
                })
                .await
            }
            Action::UpdateContext {
                content,
                structured_content,
            } => {
                self.call_capability(ctx, None, |provider| async move {
                    provider
                        .update_model_context(content, structured_content)
                        .await
                })
                .await
            }
            Action::ShowToast {
                message,
                description,
                duration,
                variant,
            } => {
                let options = ToastOptions {
                    description,
                    duration,
                };
                self.notifier
                    .show(variant.unwrap_or_default(), &message, &options);
                Ok(())
            }
            Action::CloseOverlay {} => {
                match &ctx.overlay_close {
                    Some(close) => close(),
                    None => debug!("closeOverlay without an enclosing overlay"),
                }
                Ok(())
            }
            Action::ClearInterval { id } => {
                if !self.intervals.clear(&id) {
                    debug!("clearInterval: no interval '{}'", id);
                }
                Ok(())
            }
            Action::Fetch {
                url,
                method,
                headers,
                body,
                result_key,
            } => {
                let request = build_request(
                    self.config.fetch.base_url.as_deref(),
                    &url,
                    method.as_deref(),
                    headers.as_ref(),
                    body.as_ref(),
                );
                return Outcome::SelfManaged(
                    self.run_fetch(spec, ctx, request, result_key.as_deref())
                        .await,
                );
            }
            Action::OpenFilePicker {
                accept,
                multiple,
                max_size,
                result_key,
            } => {
                let options = FilePickerOptions {
                    accept,
                    multiple,
                    max_size: max_size.unwrap_or(self.config.file_picker.max_size),
                };
                return Outcome::SelfManaged(
                    self.run_file_picker(spec, ctx, options, result_key.as_deref())
                        .await,
                );
            }
            Action::SetInterval {
                duration,
                count,
                id,
            } => {
                let request = IntervalRequest {
                    period: Duration::from_millis(duration),
                    count,
                    condition: spec.raw_field("while").filter(|v| !v.is_nullish()).cloned(),
                    on_tick: spec.handler(ON_TICK).to_vec(),
                    on_complete: spec.handler(ON_COMPLETE).to_vec(),
                };
                let name = id.unwrap_or_else(|| Uuid::new_v4().to_string());
                self.intervals.start(self, name, request, ctx.clone()).await;
                return Outcome::SelfManaged(true);
            }
        };
        Outcome::Completed(result)
    }

    /// Awaits one provider call. A missing provider succeeds without effect.
    async fn call_capability<F, Fut>(
        &self,
        ctx: &ExecutionContext,
        result_key: Option<&str>,
        call: F,
    ) -> Result<(), ActionError>
    where
        F: FnOnce(Arc<dyn CapabilityProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<CallResult, CapabilityError>>,
    {
        let Some(provider) = ctx.capabilities.clone() else {
            debug!("No capability provider; skipping call");
            return Ok(());
        };
        let result = call(provider).await?;
        if result.is_error {
            return Err(ActionError::Tool(result.error_message()));
        }
        if let Some(key) = result_key {
            ctx.state.set(key, result.result_value());
        }
        Ok(())
    }

    async fn run_fetch(
        &self,
        spec: &ActionSpec,
        ctx: &ExecutionContext,
        request: FetchRequest,
        result_key: Option<&str>,
    ) -> bool {
        debug!("fetch {} {}", request.method, request.url);
        match self.fetch_body(request).await {
            Ok(body) => {
                if let Some(key) = result_key {
                    ctx.state.set(key, body.clone());
                }
                self.execute_actions(spec.handler(ON_SUCCESS), ctx.child().with_event(body))
                    .await;
                true
            }
            Err(e) => {
                self.fail(spec, ctx, &e).await;
                false
            }
        }
    }

    async fn fetch_body(&self, request: FetchRequest) -> Result<Value, ActionError> {
        let response = self.http.fetch(request).await?;
        if !response.is_success() {
            return Err(ActionError::Http {
                status: response.status,
                status_text: response.status_text,
            });
        }
        parse_body(&response).map_err(|e| ActionError::Body(e.to_string()))
    }

    async fn run_file_picker(
        &self,
        spec: &ActionSpec,
        ctx: &ExecutionContext,
        options: FilePickerOptions,
        result_key: Option<&str>,
    ) -> bool {
        let Some(picker) = &self.file_picker else {
            self.fail(spec, ctx, &ActionError::FilePickerUnavailable)
                .await;
            return false;
        };
        let multiple = options.multiple;
        let files = match picker.pick(options).await {
            Ok(Some(files)) => files,
            Ok(None) => {
                debug!("File picker cancelled");
                return true;
            }
            Err(e) => {
                self.fail(spec, ctx, &ActionError::File(e)).await;
                return false;
            }
        };

        let values: Vec<Value> = files.iter().map(|file| file.to_value()).collect();
        let picked = if multiple {
            Value::array(values)
        } else {
            values.into_iter().next().unwrap_or(Value::Null)
        };
        if let Some(key) = result_key {
            ctx.state.set(key, picked.clone());
        }
        self.execute_actions(spec.handler(ON_SUCCESS), ctx.child().with_event(picked))
            .await;
        true
    }
}

/// Inserts into the array at `key`. Negative indices count from the end and
/// every index is clamped into `0..=len`.
fn append_state(ctx: &ExecutionContext, key: &str, value: Value, index: Option<i64>) {
    let mut items = match ctx.state.get(key) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Array(items) => items.as_ref().clone(),
        other => {
            warn!(
                "appendState: '{}' holds {}, not an array",
                key,
                other.type_name()
            );
            return;
        }
    };
    let len = items.len() as i64;
    let position = match index {
        None => len,
        Some(i) if i < 0 => len + i,
        Some(i) => i,
    }
    .clamp(0, len) as usize;
    items.insert(position, value);
    ctx.state.set(key, Value::array(items));
}

/// Removes from the array at `key`, the last element by default.
fn pop_state(ctx: &ExecutionContext, key: &str, index: Option<i64>) {
    let current = ctx.state.get(key);
    let Value::Array(items) = current else {
        warn!(
            "popState: '{}' holds {}, not an array",
            key,
            current.type_name()
        );
        return;
    };
    let len = items.len() as i64;
    let position = match index {
        None => len - 1,
        Some(i) if i < 0 => len + i,
        Some(i) => i,
    };
    if position < 0 || position >= len {
        warn!("popState: index {} out of range for '{}' (length {})", position, key, len);
        return;
    }
    let mut items = items.as_ref().clone();
    items.remove(position as usize);
    ctx.state.set(key, Value::array(items));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::spec::ActionSpec;
    use crate::state_store::StateStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn executor() -> ActionExecutor {
        ActionExecutor::new(EngineConfig::default()).unwrap()
    }

    fn context(state: serde_json::Value) -> ExecutionContext {
        ExecutionContext::new(Arc::new(StateStore::new(Value::from(state))))
    }

    #[tokio::test]
    async fn test_set_state_interpolates_value() {
        let ctx = context(json!({"count": 2}));
        let spec = ActionSpec::from(json!({
            "action": "setState", "key": "next", "value": "{{ count + 1 }}"
        }));
        assert!(executor().execute_action(&spec, ctx.clone()).await);
        assert_eq!(ctx.state.get("next"), Value::from(3.0));
    }

    #[tokio::test]
    async fn test_toggle_state() {
        let ctx = context(json!({"open": false}));
        let spec = ActionSpec::from(json!({"action": "toggleState", "key": "open"}));
        let executor = executor();
        assert!(executor.execute_action(&spec, ctx.clone()).await);
        assert_eq!(ctx.state.get("open"), Value::Bool(true));
        assert!(executor.execute_action(&spec, ctx.clone()).await);
        assert_eq!(ctx.state.get("open"), Value::Bool(false));
    }

    #[test]
    fn test_append_state_indices() {
        let ctx = context(json!({"items": [1, 2, 3], "name": "x"}));
        append_state(&ctx, "items", Value::from(4.0), None);
        append_state(&ctx, "items", Value::from(0.0), Some(-10));
        append_state(&ctx, "items", Value::from(9.0), Some(-1));
        append_state(&ctx, "fresh", Value::from("a"), Some(5));
        append_state(&ctx, "name", Value::from("y"), None);
        assert_eq!(
            serde_json::Value::from(ctx.state.get_all()),
            json!({"items": [0, 1, 2, 3, 9, 4], "fresh": ["a"], "name": "x"})
        );
    }

    #[test]
    fn test_pop_state_indices() {
        let ctx = context(json!({"items": [1, 2, 3, 4], "name": "x"}));
        pop_state(&ctx, "items", None);
        pop_state(&ctx, "items", Some(-3));
        pop_state(&ctx, "items", Some(7));
        pop_state(&ctx, "name", None);
        pop_state(&ctx, "missing", None);
        assert_eq!(
            serde_json::Value::from(ctx.state.get_all()),
            json!({"items": [2, 3], "name": "x"})
        );
    }

    #[tokio::test]
    async fn test_invalid_spec_runs_nothing() {
        let ctx = context(json!({}));
        let spec = ActionSpec::from(json!({
            "action": "teleport",
            "onError": {"action": "setState", "key": "failed", "value": true}
        }));
        assert!(!executor().execute_action(&spec, ctx.clone()).await);
        assert!(ctx.state.get("failed").is_undefined());

        let missing_key = ActionSpec::from(json!({"action": "setState", "value": 1}));
        assert!(!executor().execute_action(&missing_key, ctx.clone()).await);
        assert!(!executor().execute_action(&ActionSpec::default(), ctx).await);
    }

    #[tokio::test]
    async fn test_on_success_runs_one_level_deeper() {
        let ctx = context(json!({}));
        let spec = ActionSpec::from(json!({
            "action": "setState", "key": "a", "value": 1,
            "onSuccess": {"action": "setState", "key": "b", "value": "{{ a + 1 }}"}
        }));
        assert!(executor().execute_action(&spec, ctx.clone()).await);
        assert_eq!(ctx.state.get("b"), Value::from(2.0));

        let too_deep = ctx.clone().with_depth(10);
        assert!(executor().execute_action(&spec, too_deep).await);
        assert_eq!(ctx.state.get("b"), Value::from(2.0));
    }

    #[tokio::test]
    async fn test_missing_provider_is_a_noop_success() {
        let ctx = context(json!({}));
        let spec = ActionSpec::from(json!({
            "action": "toolCall", "tool": "search", "resultKey": "found",
            "onSuccess": {"action": "setState", "key": "done", "value": true}
        }));
        assert!(executor().execute_action(&spec, ctx.clone()).await);
        assert!(ctx.state.get("found").is_undefined());
        assert_eq!(ctx.state.get("done"), Value::Bool(true));
    }

    #[tokio::test]
    async fn test_close_overlay_calls_nearest_callback() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let ctx = context(json!({})).with_overlay_close(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let spec = ActionSpec::from(json!({"action": "closeOverlay"}));
        assert!(executor().execute_action(&spec, ctx).await);
        assert!(executor().execute_action(&spec, context(json!({}))).await);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_picker_unavailable() {
        let ctx = context(json!({}));
        let spec = ActionSpec::from(json!({
            "action": "openFilePicker",
            "onError": {"action": "setState", "key": "error", "value": "{{ $error }}"}
        }));
        assert!(!executor().execute_action(&spec, ctx.clone()).await);
        assert_eq!(ctx.state.get("error"), Value::from("File picker unavailable"));
    }
}
