use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dynaview::action::{CapabilityError, FetchRequest, FetchResponse, HttpClient};
use dynaview::{ActionExecutor, ActionSpec, EngineConfig, ExecutionContext, StateStore, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::sleep;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn setup(state: serde_json::Value) -> (ActionExecutor, ExecutionContext) {
    let executor = ActionExecutor::new(EngineConfig::default()).unwrap();
    let ctx = ExecutionContext::new(Arc::new(StateStore::new(Value::from(state))));
    (executor, ctx)
}

fn interval(extra: serde_json::Value) -> ActionSpec {
    let mut spec = json!({
        "action": "setInterval",
        "duration": 100,
        "onTick": {"action": "appendState", "key": "ticks", "value": "{{ $event }}"},
        "onComplete": {"action": "appendState", "key": "completed", "value": "{{ $event }}"}
    });
    if let (Some(spec), Some(extra)) = (spec.as_object_mut(), extra.as_object()) {
        spec.extend(extra.clone());
    }
    ActionSpec::from(spec)
}

/// Answers every request after a delay, counting calls.
#[derive(Default)]
struct SlowHttpClient {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for SlowHttpClient {
    async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(300)).await;
        Ok(FetchResponse {
            status: 200,
            status_text: "OK".to_string(),
            content_type: Some("application/json".to_string()),
            body: "true".to_string(),
        })
    }
}

fn slow_fetch() -> serde_json::Value {
    json!({
        "action": "fetch",
        "url": "/slow",
        "onSuccess": {"action": "setState", "key": "fetched", "value": "{{ $event }}"},
        "onError": {"action": "setState", "key": "failed", "value": true}
    })
}

fn get(ctx: &ExecutionContext, key: &str) -> serde_json::Value {
    serde_json::Value::from(ctx.state.get(key))
}

#[tokio::test(start_paused = true)]
async fn test_live_condition_stops_on_next_tick() {
    let (executor, ctx) = setup(json!({"running": true}));
    let spec = interval(json!({"id": "poll", "while": "running"}));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    assert!(executor.intervals().is_active("poll"));

    sleep(Duration::from_millis(250)).await;
    assert_eq!(get(&ctx, "ticks"), json!([1, 2]));

    ctx.state.set("running", false);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(get(&ctx, "ticks"), json!([1, 2, 3]));
    assert_eq!(get(&ctx, "completed"), json!([3]));
    assert!(!executor.intervals().is_active("poll"));

    sleep(Duration::from_millis(500)).await;
    assert_eq!(get(&ctx, "ticks"), json!([1, 2, 3]));
    assert_eq!(get(&ctx, "completed"), json!([3]));
}

#[tokio::test(start_paused = true)]
async fn test_immediate_stop_completes_synchronously() {
    let (executor, ctx) = setup(json!({"running": false}));
    let spec = interval(json!({"while": "{{ running }}"}));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    assert_eq!(get(&ctx, "completed"), json!([0]));
    assert_eq!(executor.intervals().active_count(), 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(get(&ctx, "ticks"), json!(null));
}

#[tokio::test(start_paused = true)]
async fn test_tick_handler_can_stop_its_interval() {
    let (executor, ctx) = setup(json!({"running": true}));
    let spec = ActionSpec::from(json!({
        "action": "setInterval",
        "duration": 50,
        "while": "running",
        "onTick": {"action": "toggleState", "key": "running"},
        "onComplete": {"action": "setState", "key": "done", "value": "{{ $event }}"}
    }));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(get(&ctx, "running"), json!(false));
    assert_eq!(get(&ctx, "done"), json!(1));
}

#[tokio::test(start_paused = true)]
async fn test_count_limits_ticks() {
    let (executor, ctx) = setup(json!({}));
    let spec = interval(json!({"count": 3}));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(get(&ctx, "ticks"), json!([1, 2, 3]));
    assert_eq!(get(&ctx, "completed"), json!([3]));
    assert_eq!(executor.intervals().active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_interval_by_id() {
    let (executor, ctx) = setup(json!({}));
    assert!(
        executor
            .execute_action(&interval(json!({"id": "poll"})), ctx.clone())
            .await
    );

    sleep(Duration::from_millis(250)).await;
    assert_eq!(executor.intervals().tick_count("poll"), Some(2));

    let clear = ActionSpec::from(json!({"action": "clearInterval", "id": "poll"}));
    assert!(executor.execute_action(&clear, ctx.clone()).await);
    assert!(!executor.intervals().is_active("poll"));

    sleep(Duration::from_millis(500)).await;
    assert_eq!(get(&ctx, "ticks"), json!([1, 2]));
    assert_eq!(get(&ctx, "completed"), json!(null));
}

#[tokio::test(start_paused = true)]
async fn test_clear_all_intervals() {
    let (executor, ctx) = setup(json!({}));
    for id in ["a", "b"] {
        assert!(
            executor
                .execute_action(&interval(json!({"id": id})), ctx.clone())
                .await
        );
    }
    assert_eq!(executor.intervals().active_count(), 2);

    executor.clear_all_intervals();
    assert_eq!(executor.intervals().active_count(), 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(get(&ctx, "ticks"), json!(null));
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_is_invalid() {
    let (executor, ctx) = setup(json!({}));
    let spec = interval(json!({"duration": 0}));
    assert!(!executor.execute_action(&spec, ctx.clone()).await);
    assert_eq!(executor.intervals().active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_from_own_tick_finishes_that_tick() {
    let (executor, ctx) = setup(json!({}));
    let http = Arc::new(SlowHttpClient::default());
    let executor = executor.with_http_client(http.clone());
    let spec = ActionSpec::from(json!({
        "action": "setInterval",
        "id": "poll",
        "duration": 100,
        "onTick": [
            {"action": "clearInterval", "id": "poll"},
            slow_fetch(),
            {"action": "setState", "key": "after", "value": true}
        ],
        "onComplete": {"action": "setState", "key": "completed", "value": true}
    }));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(get(&ctx, "fetched"), json!(true));
    assert_eq!(get(&ctx, "after"), json!(true));
    assert_eq!(get(&ctx, "failed"), json!(null));
    assert_eq!(get(&ctx, "completed"), json!(null));
    assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    assert!(!executor.intervals().is_active("poll"));
}

#[tokio::test(start_paused = true)]
async fn test_clear_all_during_tick_keeps_callbacks() {
    let (executor, ctx) = setup(json!({}));
    let http = Arc::new(SlowHttpClient::default());
    let executor = executor.with_http_client(http.clone());
    let spec = ActionSpec::from(json!({
        "action": "setInterval",
        "id": "poll",
        "duration": 100,
        "onTick": [slow_fetch(), {"action": "setState", "key": "after", "value": true}]
    }));

    assert!(executor.execute_action(&spec, ctx.clone()).await);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    assert_eq!(get(&ctx, "fetched"), json!(null));

    executor.clear_all_intervals();
    assert_eq!(executor.intervals().active_count(), 0);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(get(&ctx, "fetched"), json!(true));
    assert_eq!(get(&ctx, "after"), json!(true));
    assert_eq!(get(&ctx, "failed"), json!(null));
    assert_eq!(http.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_tick_keeps_old_callbacks() {
    let (executor, ctx) = setup(json!({}));
    let http = Arc::new(SlowHttpClient::default());
    let executor = executor.with_http_client(http.clone());
    let slow = ActionSpec::from(json!({
        "action": "setInterval",
        "id": "poll",
        "duration": 100,
        "onTick": slow_fetch()
    }));

    assert!(executor.execute_action(&slow, ctx.clone()).await);
    sleep(Duration::from_millis(150)).await;

    let quick = interval(json!({"id": "poll", "count": 1}));
    assert!(executor.execute_action(&quick, ctx.clone()).await);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(get(&ctx, "fetched"), json!(true));
    assert_eq!(get(&ctx, "ticks"), json!([1]));
    assert_eq!(get(&ctx, "completed"), json!([1]));
    assert_eq!(http.calls.load(Ordering::SeqCst), 1);
}
