//! # Interval Scheduler
//!
//! Repeating timers started by `setInterval` actions.
//!
//! An interval is either ticking or stopped. Whether it keeps going is decided
//! before the first tick and again after every tick, always against the live
//! state: a `while` condition flipped by the tick's own handler, or by any other
//! action chain, stops the interval on that same tick.
//!
//! Every running interval is registered by name so that a single interval can be
//! cleared by id and the whole set can be cleared when the view goes away.
//!
//! Clearing only stops future ticks. A tick whose `onTick` list is already
//! running finishes it, callbacks included, and then the task exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

use crate::action::{ActionExecutor, ActionSpec, ExecutionContext};
use crate::eval::ExpressionEvaluator;
use crate::value::Value;

/// Everything needed to drive one interval.
#[derive(Debug, Clone)]
pub struct IntervalRequest {
    pub period: Duration,
    /// Maximum number of ticks.
    pub count: Option<u64>,
    /// The raw `while` field: a condition string, or any value taken for its
    /// truthiness.
    pub condition: Option<Value>,
    pub on_tick: Vec<ActionSpec>,
    pub on_complete: Vec<ActionSpec>,
}

impl IntervalRequest {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            count: None,
            condition: None,
            on_tick: Vec::new(),
            on_complete: Vec::new(),
        }
    }

    /// Checked before the first tick and after each one.
    pub fn should_continue(
        &self,
        evaluator: &ExpressionEvaluator,
        ticks: u64,
        ctx: &ExecutionContext,
    ) -> bool {
        if self.count.is_some_and(|count| ticks >= count) {
            return false;
        }
        match &self.condition {
            None => true,
            Some(Value::String(source)) => {
                evaluator.evaluate_condition(source, &ctx.state_context())
            }
            Some(other) => other.to_bool(),
        }
    }
}

#[derive(Debug)]
pub struct IntervalHandle {
    timer_id: u64,
    tick_count: Arc<AtomicU64>,
    stop: watch::Sender<bool>,
}

impl IntervalHandle {
    pub fn ticks(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    /// Wakes a task waiting for its next tick. A task inside a tick sees the
    /// signal once its handlers return.
    fn stop(&self) {
        self.stop.send_replace(true);
    }
}

/// Registry of running intervals, owned by one view.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    handles: DashMap<String, IntervalHandle>,
    next_timer_id: AtomicU64,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an interval under `name`, replacing any interval already
    /// registered under it.
    ///
    /// When the interval must not run at all, `onComplete` runs before this
    /// returns and nothing is registered.
    pub async fn start(
        &self,
        executor: &ActionExecutor,
        name: String,
        request: IntervalRequest,
        ctx: ExecutionContext,
    ) {
        self.clear(&name);

        if !request.should_continue(executor.evaluator(), 0, &ctx) {
            debug!("Interval '{}' stopped before its first tick", name);
            executor
                .execute_actions(&request.on_complete, ctx.child().with_event(0u64))
                .await;
            return;
        }

        let timer_id = self.next_timer_id.fetch_add(1, Ordering::SeqCst);
        let tick_count = Arc::new(AtomicU64::new(0));
        let (stop, stopped) = watch::channel(false);
        self.handles.insert(
            name.clone(),
            IntervalHandle {
                timer_id,
                tick_count: tick_count.clone(),
                stop,
            },
        );
        info!("Interval '{}' started every {:?}", name, request.period);

        tokio::spawn(run_interval(
            executor.clone(),
            IntervalTask {
                name,
                timer_id,
                tick_count,
                stopped,
            },
            request,
            ctx,
        ));
    }

    /// Stops one interval. A tick already running its `onTick` list
    /// finishes it, and no further tick follows.
    pub fn clear(&self, name: &str) -> bool {
        match self.handles.remove(name) {
            Some((_, handle)) => {
                handle.stop();
                debug!("Interval '{}' cleared after {} ticks", name, handle.ticks());
                true
            }
            None => false,
        }
    }

    /// Stops every registered interval.
    pub fn clear_all(&self) {
        let names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        if !names.is_empty() {
            info!("Clearing {} intervals", names.len());
        }
        for name in names {
            self.clear(&name);
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn active_count(&self) -> usize {
        self.handles.len()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.handles.iter().map(|e| e.key().clone()).collect()
    }

    pub fn tick_count(&self, name: &str) -> Option<u64> {
        self.handles.get(name).map(|handle| handle.ticks())
    }

    fn is_current(&self, name: &str, timer_id: u64) -> bool {
        self.handles
            .get(name)
            .is_some_and(|handle| handle.timer_id == timer_id)
    }

    /// Unregisters a finished interval.
    fn release(&self, name: &str, timer_id: u64) {
        self.handles
            .remove_if(name, |_, handle| handle.timer_id == timer_id);
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.clear_all();
    }
}

/// Identity of one spawned interval task.
struct IntervalTask {
    name: String,
    timer_id: u64,
    tick_count: Arc<AtomicU64>,
    stopped: watch::Receiver<bool>,
}

impl IntervalTask {
    fn is_stopped(&self, scheduler: &IntervalScheduler) -> bool {
        *self.stopped.borrow() || !scheduler.is_current(&self.name, self.timer_id)
    }
}

async fn run_interval(
    executor: ActionExecutor,
    mut task: IntervalTask,
    request: IntervalRequest,
    ctx: ExecutionContext,
) {
    let name = task.name.clone();
    let mut ticker = interval_at(Instant::now() + request.period, request.period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            // Fires on the stop signal and when the handle is dropped.
            _ = task.stopped.changed() => {
                debug!("Interval '{}' stopped while idle", name);
                return;
            }
        }
        let scheduler = executor.intervals();
        if task.is_stopped(scheduler) {
            return;
        }

        let ticks = task.tick_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Interval '{}' tick {}", name, ticks);
        executor
            .execute_actions(&request.on_tick, ctx.child().with_event(ticks))
            .await;

        if task.is_stopped(scheduler) {
            debug!("Interval '{}' stopped during tick {}", name, ticks);
            return;
        }
        if !request.should_continue(executor.evaluator(), ticks, &ctx) {
            scheduler.release(&name, task.timer_id);
            info!("Interval '{}' completed after {} ticks", name, ticks);
            executor
                .execute_actions(&request.on_complete, ctx.child().with_event(ticks))
                .await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::state_store::StateStore;
    use serde_json::json;

    fn executor() -> ActionExecutor {
        ActionExecutor::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_should_continue_count_and_condition() {
        let executor = executor();
        let state = Arc::new(StateStore::new(Value::from(json!({"running": true}))));
        let ctx = ExecutionContext::new(state.clone());

        let mut request = IntervalRequest::new(Duration::from_millis(10));
        request.count = Some(2);
        assert!(request.should_continue(executor.evaluator(), 1, &ctx));
        assert!(!request.should_continue(executor.evaluator(), 2, &ctx));

        request.count = None;
        request.condition = Some(Value::from("running"));
        assert!(request.should_continue(executor.evaluator(), 5, &ctx));
        state.set("running", false);
        assert!(!request.should_continue(executor.evaluator(), 5, &ctx));

        request.condition = Some(Value::Bool(false));
        assert!(!request.should_continue(executor.evaluator(), 0, &ctx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_unknown_interval() {
        let executor = executor();
        assert!(!executor.intervals().clear("missing"));
        assert_eq!(executor.intervals().active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_registers_and_restart_replaces() {
        let executor = executor();
        let ctx = ExecutionContext::default();
        let scheduler = executor.intervals();

        let request = IntervalRequest::new(Duration::from_millis(100));
        scheduler
            .start(&executor, "poll".to_string(), request.clone(), ctx.clone())
            .await;
        assert!(scheduler.is_active("poll"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(scheduler.tick_count("poll"), Some(2));

        scheduler
            .start(&executor, "poll".to_string(), request, ctx)
            .await;
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.tick_count("poll"), Some(0));

        scheduler.clear_all();
        assert_eq!(scheduler.active_count(), 0);
    }
}
