//! Workflow Engine — runs a workflow's steps in order on a background task.
//!
//! ```text
//!   start ──► supervisor task ──► run task
//!                                   │  for each pass:
//!                                   │    for each step:
//!                                   │      cancelled? ─► skipped
//!                                   │      pause gate
//!                                   │      disabled?  ─► skipped
//!                                   │      dispatch   ─► completed | failed
//!                                   │      interruptible delay
//!                                   │    loop mode? ─► reset ─► countdown ─► next pass
//!                                   ▼
//!   JoinHandle<RunStatus> ◄── final progress + workflow_done
//! ```
//!
//! Control calls (`pause`, `resume`, `cancel`, setters) take effect at the
//! next check point: before a step, between delay ticks, between countdown
//! ticks. An in-flight dispatch is never interrupted by the engine itself;
//! `cancel` asks the dispatcher to abandon its completion wait.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bridge::PromptDispatcher;
use crate::error::{AutomationError, Result};
use crate::workflow::schema::{SharedWorkflow, StepStatus, Workflow, WorkflowStep};

/// Granularity of the inter-step delay.
const DELAY_TICK: Duration = Duration::from_millis(200);
/// Upper bound of one loop-countdown tick.
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
const DRY_RUN_PREVIEW_CHARS: usize = 80;

/// How a run (or, for `Looping`, one pass of a run) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    /// Non-final: another pass follows
    Looping,
    Errored(String),
}

impl RunStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, RunStatus::Looping)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Cancelled => f.write_str("cancelled"),
            RunStatus::Looping => f.write_str("looping"),
            RunStatus::Errored(message) => write!(f, "error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    /// Between passes, counting down
    Looping,
}

/// Run notifications. Every method defaults to a no-op; panics raised by an
/// observer are caught and logged.
pub trait EngineObserver: Send + Sync {
    fn step_started(&self, _index: usize, _step: &WorkflowStep) {}

    fn step_completed(&self, _index: usize, _step: &WorkflowStep, _result: &str) {}

    fn step_failed(&self, _index: usize, _step: &WorkflowStep, _error: &str) {}

    /// Fired with `RunStatus::Looping` after each non-final pass, then exactly
    /// once with the final status.
    fn workflow_done(&self, _workflow: &Workflow, _status: &RunStatus) {}

    fn progress(&self, _index: usize, _total: usize, _percent: f64) {}

    fn loop_wait(&self, _remaining_secs: u64) {}
}

struct RunState {
    running: bool,
    paused: bool,
    cancel_requested: bool,
    looping: bool,
    loop_mode: bool,
    loop_interval: Duration,
    wait_for_completion: bool,
    current_step: Option<usize>,
    loop_countdown: Option<u64>,
    dispatcher: Option<Arc<dyn PromptDispatcher>>,
    observer: Option<Arc<dyn EngineObserver>>,
}

struct EngineInner {
    state: Mutex<RunState>,
    /// Bumped on every control change; waiters re-check state when it moves.
    signal: watch::Sender<u64>,
}

/// Handle to a workflow engine. Clones share the same run state.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(RunState {
                    running: false,
                    paused: false,
                    cancel_requested: false,
                    looping: false,
                    loop_mode: false,
                    loop_interval: Duration::from_secs(120),
                    wait_for_completion: false,
                    current_step: None,
                    loop_countdown: None,
                    dispatcher: None,
                    observer: None,
                }),
                signal,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.inner.signal.send_modify(|g| *g = g.wrapping_add(1));
    }

    // ─── Configuration ──────────────────────────────────────────────────

    /// Without a dispatcher every step completes with a dry-run result.
    pub fn set_dispatcher(&self, dispatcher: Arc<dyn PromptDispatcher>) {
        self.lock().dispatcher = Some(dispatcher);
    }

    pub fn set_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.lock().observer = Some(observer);
    }

    /// Dispatch with `send_and_wait` and ignore step delays.
    pub fn set_wait_for_completion(&self, wait: bool) {
        self.lock().wait_for_completion = wait;
    }

    pub fn set_loop_mode(&self, enabled: bool) {
        self.lock().loop_mode = enabled;
        self.notify();
    }

    pub fn set_loop_interval(&self, interval: Duration) {
        self.lock().loop_interval = interval;
    }

    // ─── State ──────────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn loop_mode(&self) -> bool {
        self.lock().loop_mode
    }

    /// Index of the step being (or last) dispatched in the current pass.
    pub fn current_step_index(&self) -> Option<usize> {
        self.lock().current_step
    }

    /// Seconds left before the next pass, while counting down.
    pub fn loop_countdown(&self) -> Option<u64> {
        self.lock().loop_countdown
    }

    pub fn run_phase(&self) -> RunPhase {
        let state = self.lock();
        if !state.running {
            RunPhase::Idle
        } else if state.paused {
            RunPhase::Paused
        } else if state.looping {
            RunPhase::Looping
        } else {
            RunPhase::Running
        }
    }

    // ─── Control ────────────────────────────────────────────────────────

    /// Reset the workflow's steps and run it on a background task.
    ///
    /// Fails with [`AutomationError::AlreadyRunning`] while a run is active.
    pub async fn start(&self, workflow: SharedWorkflow) -> Result<JoinHandle<RunStatus>> {
        let dispatcher = {
            let mut state = self.lock();
            if state.running {
                return Err(AutomationError::AlreadyRunning);
            }
            state.running = true;
            state.paused = false;
            state.cancel_requested = false;
            state.looping = false;
            state.current_step = None;
            state.loop_countdown = None;
            state.dispatcher.clone()
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.reset_cancel();
        }
        self.notify();

        workflow.write().await.reset_steps();

        let engine = self.clone();
        Ok(tokio::spawn(engine.supervise(workflow)))
    }

    pub fn pause(&self) {
        {
            let mut state = self.lock();
            if !state.running || state.paused {
                return;
            }
            state.paused = true;
        }
        tracing::info!("[WorkflowEngine] Paused");
        self.notify();
    }

    pub fn resume(&self) {
        {
            let mut state = self.lock();
            if !state.running || !state.paused {
                return;
            }
            state.paused = false;
        }
        tracing::info!("[WorkflowEngine] Resumed");
        self.notify();
    }

    /// Request cancellation: remaining steps are skipped, loop mode is turned
    /// off, a paused run is released, and the dispatcher's wait is abandoned.
    pub fn cancel(&self) {
        let (dispatcher, was_running) = {
            let mut state = self.lock();
            state.loop_mode = false;
            state.paused = false;
            if state.running {
                state.cancel_requested = true;
            }
            (state.dispatcher.clone(), state.running)
        };
        if was_running {
            tracing::info!("[WorkflowEngine] Cancel requested");
        }
        self.notify();
        if let Some(dispatcher) = dispatcher {
            dispatcher.cancel_wait();
        }
    }

    fn cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    // ─── Run ────────────────────────────────────────────────────────────

    /// Runs the loop on its own task so a panic inside it still ends the run
    /// cleanly.
    async fn supervise(self, workflow: SharedWorkflow) -> RunStatus {
        let runner = self.clone();
        let run_workflow = workflow.clone();
        let status = match tokio::spawn(async move { runner.run(run_workflow).await }).await {
            Ok(status) => status,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::error!("[WorkflowEngine] Run aborted: {}", message);
                RunStatus::Errored(message)
            }
            Err(e) => RunStatus::Errored(e.to_string()),
        };

        if let RunStatus::Errored(message) = &status {
            fail_running_steps(&workflow, message).await;
        }

        let snapshot = workflow.read().await.clone();
        if !matches!(status, RunStatus::Errored(_)) {
            let total = snapshot.steps.len();
            self.emit(|o| o.progress(total, total, 100.0));
        }
        self.emit(|o| o.workflow_done(&snapshot, &status));

        {
            let mut state = self.lock();
            state.running = false;
            state.paused = false;
            state.looping = false;
            state.current_step = None;
            state.loop_countdown = None;
        }
        self.notify();
        tracing::info!("[WorkflowEngine] Workflow '{}' finished: {}", snapshot.name, status);
        status
    }

    async fn run(&self, workflow: SharedWorkflow) -> RunStatus {
        let (name, total) = {
            let wf = workflow.read().await;
            (wf.name.clone(), wf.steps.len())
        };
        tracing::info!("[WorkflowEngine] Starting workflow '{}' ({} steps)", name, total);

        let mut pass = 1u32;
        loop {
            self.run_pass(&workflow).await;

            let (loop_mode, cancelled, interval) = {
                let state = self.lock();
                (state.loop_mode, state.cancel_requested, state.loop_interval)
            };
            if !loop_mode || cancelled {
                break;
            }

            let snapshot = workflow.read().await.clone();
            self.emit(|o| o.workflow_done(&snapshot, &RunStatus::Looping));
            workflow.write().await.reset_steps();

            tracing::info!(
                "[WorkflowEngine] Pass {} done, next pass in {}s",
                pass,
                interval.as_secs()
            );
            self.lock().looping = true;
            let again = self.loop_countdown_wait(interval).await;
            {
                let mut state = self.lock();
                state.looping = false;
                state.loop_countdown = None;
            }
            if !again {
                break;
            }
            pass += 1;
        }

        if self.cancel_requested() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        }
    }

    async fn run_pass(&self, workflow: &SharedWorkflow) {
        let total = workflow.read().await.steps.len();

        for index in 0..total {
            if self.cancel_requested() {
                mark(workflow, index, StepStatus::Skipped).await;
                continue;
            }

            self.pause_gate().await;

            if self.cancel_requested() {
                mark(workflow, index, StepStatus::Skipped).await;
                continue;
            }

            let step = {
                let mut wf = workflow.write().await;
                let Some(step) = wf.steps.get_mut(index) else {
                    break;
                };
                if !step.enabled {
                    step.status = StepStatus::Skipped;
                    continue;
                }
                step.status = StepStatus::Running;
                step.started_at = Some(Utc::now());
                step.clone()
            };

            self.lock().current_step = Some(index);
            tracing::info!("[WorkflowEngine] Step {}/{}: {}", index + 1, total, step.name);
            self.emit(|o| o.step_started(index, &step));
            let percent = index as f64 / total as f64 * 100.0;
            self.emit(|o| o.progress(index, total, percent));

            let prompt = workflow.read().await.resolve_prompt(&step);
            let outcome = self.dispatch(&prompt).await;

            let step = {
                let mut wf = workflow.write().await;
                let Some(slot) = wf.steps.get_mut(index) else {
                    break;
                };
                match &outcome {
                    Ok(result) => {
                        slot.status = StepStatus::Completed;
                        slot.result = if result.is_empty() {
                            "Done".to_string()
                        } else {
                            result.clone()
                        };
                    }
                    Err(e) => {
                        slot.status = StepStatus::Failed;
                        slot.result = e.to_string();
                    }
                }
                slot.completed_at = Some(Utc::now());
                slot.clone()
            };

            match step.status {
                StepStatus::Completed => {
                    self.emit(|o| o.step_completed(index, &step, &step.result));
                }
                _ => {
                    tracing::warn!(
                        "[WorkflowEngine] Step {} '{}' failed: {}",
                        index + 1,
                        step.name,
                        step.result
                    );
                    self.emit(|o| o.step_failed(index, &step, &step.result));
                }
            }

            let waited = self.lock().wait_for_completion;
            if !waited && index + 1 < total {
                self.interruptible_delay(step.delay()).await;
            }
        }
    }

    async fn dispatch(&self, prompt: &str) -> Result<String> {
        let (dispatcher, wait) = {
            let state = self.lock();
            (state.dispatcher.clone(), state.wait_for_completion)
        };
        let Some(dispatcher) = dispatcher else {
            return Ok(dry_run_result(prompt));
        };

        // A panicking dispatcher fails the step, not the run.
        let prompt = prompt.to_string();
        let send = tokio::spawn(async move {
            if wait {
                dispatcher.send_and_wait(&prompt).await
            } else {
                dispatcher.send_prompt(&prompt).await
            }
        });
        match send.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(AutomationError::Dispatch(format!(
                "Dispatcher panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(AutomationError::Dispatch(e.to_string())),
        }
    }

    // ─── Waits ──────────────────────────────────────────────────────────

    /// Block while paused. Returns immediately once cancellation is requested.
    async fn pause_gate(&self) {
        loop {
            let mut rx = self.inner.signal.subscribe();
            {
                let state = self.lock();
                if !state.paused || state.cancel_requested {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `total` in short ticks. Time spent paused does not count.
    async fn interruptible_delay(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() {
            let mut rx = self.inner.signal.subscribe();
            let paused = {
                let state = self.lock();
                if state.cancel_requested {
                    return;
                }
                state.paused
            };
            if paused {
                self.pause_gate().await;
                continue;
            }

            let tick = remaining.min(DELAY_TICK);
            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(tick) => remaining -= tick,
                _ = rx.changed() => remaining = remaining.saturating_sub(started.elapsed()),
            }
        }
    }

    /// Count down to the next pass. Returns `false` if cancellation was
    /// requested or loop mode was turned off meanwhile.
    async fn loop_countdown_wait(&self, interval: Duration) -> bool {
        let mut remaining = interval;
        loop {
            let mut rx = self.inner.signal.subscribe();
            let paused = {
                let mut state = self.lock();
                if state.cancel_requested || !state.loop_mode {
                    return false;
                }
                state.loop_countdown = Some(ceil_secs(remaining));
                state.paused
            };
            if remaining.is_zero() {
                return true;
            }
            if paused {
                self.pause_gate().await;
                continue;
            }

            let remaining_secs = ceil_secs(remaining);
            self.emit(|o| o.loop_wait(remaining_secs));

            let tick = remaining.min(COUNTDOWN_TICK);
            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(tick) => remaining -= tick,
                _ = rx.changed() => remaining = remaining.saturating_sub(started.elapsed()),
            }
        }
    }

    fn emit<F>(&self, notify: F)
    where
        F: FnOnce(&dyn EngineObserver),
    {
        let observer = self.lock().observer.clone();
        if let Some(observer) = observer {
            if catch_unwind(AssertUnwindSafe(|| notify(observer.as_ref()))).is_err() {
                tracing::warn!("[WorkflowEngine] Observer panicked; ignoring");
            }
        }
    }
}

async fn mark(workflow: &SharedWorkflow, index: usize, status: StepStatus) {
    if let Some(step) = workflow.write().await.steps.get_mut(index) {
        step.status = status;
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Result text used when no dispatcher is configured.
pub fn dry_run_result(prompt: &str) -> String {
    let preview: String = prompt.chars().take(DRY_RUN_PREVIEW_CHARS).collect();
    format!("[Dry Run] Prompt queued: {}...", preview)
}

/// Mark steps left `Running` by an aborted run as failed.
async fn fail_running_steps(workflow: &SharedWorkflow, message: &str) {
    let mut wf = workflow.write().await;
    for step in wf.steps.iter_mut().filter(|s| s.status == StepStatus::Running) {
        step.status = StepStatus::Failed;
        step.result = format!("Run aborted: {}", message);
        step.completed_at = Some(Utc::now());
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "run task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_result_truncates() {
        let prompt = "a".repeat(100);
        let result = dry_run_result(&prompt);
        assert_eq!(result, format!("[Dry Run] Prompt queued: {}...", "a".repeat(80)));
        assert_eq!(dry_run_result("short"), "[Dry Run] Prompt queued: short...");
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(2_100)), 3);
        assert_eq!(ceil_secs(Duration::from_secs(2)), 2);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::Errored("boom".into()).to_string(), "error: boom");
        assert!(!RunStatus::Looping.is_final());
    }

    #[tokio::test]
    async fn test_idle_controls_are_noops() {
        let engine = WorkflowEngine::new();
        engine.pause();
        assert!(!engine.is_paused());
        engine.resume();
        engine.cancel();
        assert_eq!(engine.run_phase(), RunPhase::Idle);
        assert_eq!(engine.current_step_index(), None);
    }

    #[tokio::test]
    async fn test_dry_run_completes_every_step() {
        let engine = WorkflowEngine::new();
        let workflow = Workflow::new("Dry", "")
            .with_variable("x", "42")
            .with_step(WorkflowStep::new("one", "value {x}").with_delay(0.0))
            .with_step(WorkflowStep::new("two", "plain").with_delay(0.0))
            .into_shared();

        let status = engine.start(workflow.clone()).await.unwrap().await.unwrap();

        assert_eq!(status, RunStatus::Completed);
        let wf = workflow.read().await;
        assert_eq!(wf.steps[0].status, StepStatus::Completed);
        assert_eq!(wf.steps[0].result, "[Dry Run] Prompt queued: value 42...");
        assert!(wf.steps.iter().all(|s| s.completed_at.is_some()));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_aborted_run_leaves_no_running_step() {
        let workflow = Workflow::new("Aborted", "")
            .with_step(WorkflowStep::new("done", "a"))
            .with_step(WorkflowStep::new("in flight", "b"))
            .with_step(WorkflowStep::new("pending", "c"))
            .into_shared();
        {
            let mut wf = workflow.write().await;
            wf.steps[0].status = StepStatus::Completed;
            wf.steps[1].status = StepStatus::Running;
        }

        fail_running_steps(&workflow, "boom").await;

        let wf = workflow.read().await;
        let statuses: Vec<StepStatus> = wf.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Completed, StepStatus::Failed, StepStatus::Pending]
        );
        assert_eq!(wf.steps[1].result, "Run aborted: boom");
        assert!(wf.steps[1].completed_at.is_some());
    }
}
