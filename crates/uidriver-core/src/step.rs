//! The cooperative step scheduler.
//!
//! A sequence compiles into an ordered queue of [`Step`]s. One spawned task
//! drives the queue: it runs the step under the cursor, honors the returned
//! [`StepResult`], sleeps for the requested wait scaled by the speed
//! multiplier, and re-invokes itself. Steps never block; "wait", "poll" and
//! "retry" are all expressed by returning [`StepResult::repeat`] with a
//! delay.
//!
//! Queue mutation is the only cross-task state. Appending is legal only
//! before execution starts; splicing via [`StepScope::insert_next`] is legal
//! only from within a running step. Both are mutex guarded and fail fast on
//! misuse.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AutomationError;

/// Floor for the scheduler's re-arm delay.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// What a step tells the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// The step finished; advance to the next one.
    Done,
    /// Run the same step again after the wait.
    Repeat,
    /// Abort the whole sequence.
    Failed,
}

/// A step's verdict plus the delay before the scheduler's next tick.
#[derive(Debug)]
pub struct StepResult {
    state: StepState,
    next_wait: Duration,
    error: Option<AutomationError>,
}

impl StepResult {
    /// The step completed; move on immediately.
    pub fn done() -> Self {
        Self {
            state: StepState::Done,
            next_wait: Duration::ZERO,
            error: None,
        }
    }

    /// Re-run this step after `next_wait`.
    pub fn repeat(next_wait: Duration) -> Self {
        Self {
            state: StepState::Repeat,
            next_wait,
            error: None,
        }
    }

    /// Abort the sequence, recording why.
    pub fn failed(error: AutomationError) -> Self {
        Self {
            state: StepState::Failed,
            next_wait: Duration::ZERO,
            error: Some(error),
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn next_wait(&self) -> Duration {
        self.next_wait
    }
}

/// One unit of retryable work. Steps close over whatever locators and
/// collaborators they need; they have no identity beyond queue position.
pub type Step = Box<dyn FnMut(&mut StepScope<'_>) -> StepResult + Send>;

/// What a running step sees: how long it has been retried, and the splice
/// point for follow-up steps.
pub struct StepScope<'a> {
    queue: &'a StepQueue,
    elapsed: Duration,
}

impl StepScope<'_> {
    /// Time accumulated since this step first ran. Resets when the step
    /// returns [`StepResult::done`].
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Splices `step` in immediately after the current one.
    ///
    /// Inserted steps run before anything queued after the current step.
    /// Calling this twice from one step body makes the *second* insertion run
    /// first, since both land at the same splice point.
    pub fn insert_next(&self, step: Step) -> Result<(), AutomationError> {
        self.queue.insert_next(step)
    }

    #[cfg(test)]
    pub(crate) fn for_test(queue: &StepQueue, elapsed: Duration) -> StepScope<'_> {
        StepScope { queue, elapsed }
    }
}

struct QueueState {
    /// `None` marks the slot whose step is currently out being executed.
    steps: Vec<Option<Step>>,
    cursor: usize,
    started: bool,
    executing: bool,
}

/// The ordered, cursor-tracked step list for one perform invocation.
pub struct StepQueue {
    state: Mutex<QueueState>,
}

impl StepQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                steps: Vec::new(),
                cursor: 0,
                started: false,
                executing: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().expect("step queue lock poisoned")
    }

    /// Appends a step. Legal only before execution has started.
    pub fn add(&self, step: Step) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if state.started {
            return Err(AutomationError::AppendAfterExecute);
        }
        state.steps.push(Some(step));
        Ok(())
    }

    /// Splices a step in after the cursor. Legal only mid-execution.
    pub fn insert_next(&self, step: Step) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if !state.executing {
            return Err(AutomationError::InsertOutsideExecution);
        }
        let at = state.cursor + 1;
        state.steps.insert(at, Some(step));
        Ok(())
    }

    /// Number of queued steps.
    pub fn len(&self) -> usize {
        self.lock().steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().steps.is_empty()
    }

    /// Steps completed so far (the cursor, clamped to the queue length).
    pub fn completed_steps(&self) -> usize {
        let state = self.lock();
        state.cursor.min(state.steps.len())
    }
}

/// Receiver half of a sequence's pass/fail result.
///
/// Fulfilled exactly once. If the executor is dropped before the run
/// finishes, the result resolves to `false` instead of hanging.
pub struct Completion {
    rx: oneshot::Receiver<bool>,
}

impl Completion {
    /// Awaits the result.
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }

    /// Blocks the calling thread until the result arrives.
    ///
    /// Must not be called from a runtime worker thread; blocking the thread
    /// that drives the scheduler deadlocks the run.
    pub fn wait_blocking(self) -> bool {
        self.rx.blocking_recv().unwrap_or(false)
    }
}

/// Drives one queue of steps to completion on a spawned task.
///
/// A new executor is built for every perform invocation and discarded
/// afterward. Dropping it mid-run cancels the scheduler task and resolves the
/// outstanding [`Completion`] to `false`.
pub struct StepExecutor {
    queue: Arc<StepQueue>,
    handle: Handle,
    speed_multiplier: f64,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl StepExecutor {
    pub fn new(handle: Handle, speed_multiplier: f64) -> Self {
        Self {
            queue: Arc::new(StepQueue::new()),
            handle,
            speed_multiplier,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// The executor's queue, for appending steps before execution.
    pub fn queue(&self) -> &Arc<StepQueue> {
        &self.queue
    }

    /// Starts the scheduler task. Legal exactly once per executor.
    pub fn execute(&self) -> Result<Completion, AutomationError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AutomationError::SequenceAlreadyExecuting);
        }
        {
            let mut state = self.queue.lock();
            state.started = true;
            state.executing = true;
        }

        let (tx, rx) = oneshot::channel();
        let queue = Arc::clone(&self.queue);
        let cancel = self.cancel.clone();
        let speed = self.speed_multiplier;

        self.handle.spawn(async move {
            let passed = run(queue, cancel, speed).await;
            if let Some(passed) = passed {
                let _ = tx.send(passed);
            }
            // On cancellation tx is dropped unfulfilled, which the
            // Completion reads as false.
        });

        Ok(Completion { rx })
    }
}

impl Drop for StepExecutor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The scheduler loop. Returns `None` when cancelled.
async fn run(queue: Arc<StepQueue>, cancel: CancellationToken, speed: f64) -> Option<bool> {
    let mut elapsed = Duration::ZERO;

    loop {
        // Take the current step out of its slot so the queue lock is not
        // held while the step body runs (step bodies may call insert_next).
        let (mut step, cursor) = {
            let mut state = queue.lock();
            if state.cursor >= state.steps.len() {
                state.executing = false;
                return Some(true);
            }
            let cursor = state.cursor;
            let step = state.steps[cursor]
                .take()
                .expect("step slot empty while scheduler holds the cursor");
            (step, cursor)
        };

        let result = {
            let mut scope = StepScope {
                queue: &queue,
                elapsed,
            };
            step(&mut scope)
        };
        debug!(step = cursor, state = ?result.state, "step tick");

        {
            let mut state = queue.lock();
            state.steps[cursor] = Some(step);
            match result.state {
                StepState::Done => state.cursor += 1,
                StepState::Repeat => {}
                StepState::Failed => state.executing = false,
            }
        }

        match result.state {
            StepState::Failed => {
                match &result.error {
                    Some(error) => warn!(step = cursor, %error, "step failed, aborting sequence"),
                    None => warn!(step = cursor, "step failed, aborting sequence"),
                }
                return Some(false);
            }
            StepState::Done => elapsed = Duration::ZERO,
            StepState::Repeat => {}
        }

        let delay = scaled_delay(result.next_wait, speed);
        // Accumulate before the next invocation so a step can measure how
        // long it has been retried.
        elapsed += delay;

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn scaled_delay(next_wait: Duration, speed: f64) -> Duration {
    next_wait.mul_f64(speed).max(MIN_DELAY)
}
