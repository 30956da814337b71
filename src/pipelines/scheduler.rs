// SPDX-License-Identifier: GPL-3.0-only
//! Multi-stage tasks that alternate between execution contexts
//!
//! Stage `n` runs in the background when `n` is even and in the foreground
//! when `n` is odd. The task object is moved from one stage's job into the
//! next, so whatever stage `n` wrote is what stage `n + 1` reads.
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler = StagedScheduler::new("thumbnail", dispatcher, |stage| match stage {
//!     0 => { /* heavy work, background */ StageResult::Continue }
//!     _ => { /* publish, foreground */ StageResult::Done }
//! });
//! let mut outcome = scheduler.start()?;
//! foreground.wait_for(&mut outcome)?;
//! ```

use super::dispatch::{Completer, Completion, Context, Dispatcher, completion, current_context};
use crate::constants::scheduler::{DELAY_JITTER_MAX, DELAY_JITTER_MIN, MAX_STAGES};
use crate::errors::{AgeError, AgeResult};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a stage asks the scheduler to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageResult {
    /// Schedule the next stage
    Continue,
    /// The task is finished
    Done,
    /// Stop without running further stages
    Abort,
}

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// `Done` was returned; `stages` counts every stage that ran
    Completed { stages: u32 },
    /// `Abort` was returned from `stage`
    Aborted { stage: u32 },
}

/// A unit of work split into numbered stages
pub trait StagedTask: Send + 'static {
    fn execute(&mut self, stage: u32) -> StageResult;
}

impl<F> StagedTask for F
where
    F: FnMut(u32) -> StageResult + Send + 'static,
{
    fn execute(&mut self, stage: u32) -> StageResult {
        self(stage)
    }
}

/// Context a stage runs in
pub fn context_for_stage(stage: u32) -> Context {
    if stage % 2 == 0 {
        Context::Background
    } else {
        Context::Foreground
    }
}

/// `delay` scaled by a random factor in the jitter window
fn jittered(delay: Duration, rng: &mut impl Rng) -> Duration {
    delay.mul_f64(rng.gen_range(DELAY_JITTER_MIN..=DELAY_JITTER_MAX))
}

/// Runs one [`StagedTask`] to completion
pub struct StagedScheduler {
    name: Arc<str>,
    dispatcher: Dispatcher,
    task: Option<Box<dyn StagedTask>>,
    stage_delay: Option<Duration>,
}

impl StagedScheduler {
    pub fn new(name: &str, dispatcher: Dispatcher, task: impl StagedTask) -> Self {
        Self {
            name: Arc::from(name),
            dispatcher,
            task: Some(Box::new(task)),
            stage_delay: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.task.is_none()
    }

    /// Inject a jittered delay of roughly `delay_ms` between stages
    ///
    /// Zero disables the delay. Only allowed before [`StagedScheduler::start`].
    pub fn set_stage_delay(&mut self, delay_ms: u64) -> AgeResult<()> {
        if self.is_started() {
            return Err(AgeError::invalid_state(format!(
                "task '{}' already started; stage delay is fixed",
                self.name
            )));
        }
        self.stage_delay = (delay_ms > 0).then(|| Duration::from_millis(delay_ms));
        Ok(())
    }

    /// Schedule stage 0. Allowed once.
    pub fn start(&mut self) -> AgeResult<Completion<TaskOutcome>> {
        let task = self.task.take().ok_or_else(|| {
            AgeError::invalid_state(format!("task '{}' already started", self.name))
        })?;

        let (completer, outcome) = completion();
        info!(task = %self.name, delay = ?self.stage_delay, "Starting staged task");

        Run {
            name: Arc::clone(&self.name),
            dispatcher: self.dispatcher.clone(),
            task,
            stage: 0,
            stage_delay: self.stage_delay,
            completer,
        }
        .schedule();

        Ok(outcome)
    }
}

/// A started task travelling from stage to stage
struct Run {
    name: Arc<str>,
    dispatcher: Dispatcher,
    task: Box<dyn StagedTask>,
    stage: u32,
    stage_delay: Option<Duration>,
    completer: Completer<TaskOutcome>,
}

impl Run {
    fn jitter(&self) -> Option<Duration> {
        if self.stage == 0 {
            return None;
        }
        self.stage_delay.map(|delay| jittered(delay, &mut rand::thread_rng()))
    }

    fn schedule(self) {
        let context = context_for_stage(self.stage);
        let delay = self.jitter();
        let dispatcher = self.dispatcher.clone();
        let name = Arc::clone(&self.name);
        let stage = self.stage;

        let job = Box::new(move || self.step());
        let posted = match delay {
            Some(delay) => dispatcher.post_delayed(context, delay, job),
            None => dispatcher.post(context, job),
        };
        // A rejected job is dropped with its completer, so the caller sees Disconnected
        if let Err(e) = posted {
            warn!(task = %name, stage, error = %e, "Could not schedule stage");
        }
    }

    fn step(mut self) {
        let stage = self.stage;
        debug!(task = %self.name, stage, context = ?current_context(), "Running stage");

        match self.task.execute(stage) {
            StageResult::Continue => {
                self.stage += 1;
                if self.stage >= MAX_STAGES {
                    error!(task = %self.name, limit = MAX_STAGES, "Staged task ran away");
                    self.finish(Err(AgeError::RunawayTask { limit: MAX_STAGES }));
                } else {
                    self.schedule();
                }
            }
            StageResult::Done => {
                debug!(task = %self.name, stages = stage + 1, "Staged task done");
                self.finish(Ok(TaskOutcome::Completed { stages: stage + 1 }));
            }
            StageResult::Abort => {
                info!(task = %self.name, stage, "Staged task aborted");
                self.finish(Ok(TaskOutcome::Aborted { stage }));
            }
        }
    }

    /// Deliver the outcome from the foreground
    fn finish(self, result: AgeResult<TaskOutcome>) {
        if current_context() == Some(Context::Foreground) {
            self.completer.complete(result);
            return;
        }

        let completer = self.completer;
        if let Err(e) = self
            .dispatcher
            .post_foreground(move || completer.complete(result))
        {
            warn!(task = %self.name, error = %e, "Could not deliver task outcome");
        }
    }
}

/// Run `work` in one background stage and deliver its result from the foreground
pub fn run_in_background<T, F>(
    name: &str,
    dispatcher: Dispatcher,
    stage_delay_ms: u64,
    work: F,
) -> AgeResult<Completion<T>>
where
    T: Send + 'static,
    F: FnOnce() -> AgeResult<T> + Send + 'static,
{
    let (completer, result) = completion();
    let task = BackgroundCall {
        work: Some(Box::new(work)),
        result: None,
        completer: Some(completer),
    };

    let mut scheduler = StagedScheduler::new(name, dispatcher, task);
    scheduler.set_stage_delay(stage_delay_ms)?;
    // The outcome is implied by the result completion
    let _ = scheduler.start()?;
    Ok(result)
}

type Work<T> = Box<dyn FnOnce() -> AgeResult<T> + Send>;

struct BackgroundCall<T> {
    work: Option<Work<T>>,
    result: Option<AgeResult<T>>,
    completer: Option<Completer<T>>,
}

impl<T: Send + 'static> StagedTask for BackgroundCall<T> {
    fn execute(&mut self, stage: u32) -> StageResult {
        match stage {
            0 => {
                self.result = self.work.take().map(|work| work());
                StageResult::Continue
            }
            _ => {
                if let (Some(completer), Some(result)) = (self.completer.take(), self.result.take())
                {
                    completer.complete(result);
                }
                StageResult::Done
            }
        }
    }
}
