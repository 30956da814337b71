// SPDX-License-Identifier: GPL-3.0-only
//! Foreground and background execution contexts
//!
//! The foreground is a single logical thread of control: whoever owns the
//! [`ForegroundLoop`] drains its queue. The background is the tokio blocking
//! pool. [`Dispatcher`] is the only way work crosses between the two.

use crate::errors::{AgeError, AgeResult};
use std::cell::Cell;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A unit of work posted to a context
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Which context a job runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// UI-affinity context, drained by [`ForegroundLoop`]
    Foreground,
    /// Worker context backed by the runtime's blocking pool
    Background,
}

thread_local! {
    static CURRENT: Cell<Option<Context>> = const { Cell::new(None) };
}

/// Context of the job currently executing on this thread, if any
pub fn current_context() -> Option<Context> {
    CURRENT.with(|c| c.get())
}

/// Marks the current thread as running in a context until dropped
struct ContextGuard(Option<Context>);

impl ContextGuard {
    fn enter(context: Context) -> Self {
        Self(CURRENT.with(|c| c.replace(Some(context))))
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.0));
    }
}

/// Posts jobs to either context
#[derive(Debug, Clone)]
pub struct Dispatcher {
    foreground: mpsc::UnboundedSender<Job>,
    runtime: Handle,
}

impl Dispatcher {
    /// Create a dispatcher and the foreground loop it feeds
    pub fn new(runtime: Handle) -> (Self, ForegroundLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                foreground: tx,
                runtime: runtime.clone(),
            },
            ForegroundLoop { jobs: rx, runtime },
        )
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn post(&self, context: Context, job: Job) -> AgeResult<()> {
        match context {
            Context::Foreground => self
                .foreground
                .send(job)
                .map_err(|_| AgeError::Disconnected("foreground loop is gone".to_string())),
            Context::Background => {
                self.runtime.spawn_blocking(move || {
                    let _guard = ContextGuard::enter(Context::Background);
                    job()
                });
                Ok(())
            }
        }
    }

    pub fn post_foreground(&self, job: impl FnOnce() + Send + 'static) -> AgeResult<()> {
        self.post(Context::Foreground, Box::new(job))
    }

    pub fn post_background(&self, job: impl FnOnce() + Send + 'static) -> AgeResult<()> {
        self.post(Context::Background, Box::new(job))
    }

    /// Post after `delay`, measured on the runtime's timer
    ///
    /// If the target context is gone by then the job is dropped, which drops
    /// any completion it owns.
    pub fn post_delayed(&self, context: Context, delay: Duration, job: Job) -> AgeResult<()> {
        let dispatcher = self.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = dispatcher.post(context, job) {
                warn!(error = %e, ?context, "Dropping delayed job");
            }
        });
        Ok(())
    }
}

/// Queue of foreground jobs, drained by its owner
#[derive(Debug)]
pub struct ForegroundLoop {
    jobs: mpsc::UnboundedReceiver<Job>,
    runtime: Handle,
}

impl ForegroundLoop {
    fn run(&self, job: Job) {
        let _guard = ContextGuard::enter(Context::Foreground);
        job();
    }

    /// Run every job queued right now; never blocks
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            self.run(job);
            ran += 1;
        }
        ran
    }

    /// Run jobs until `done` returns true
    ///
    /// `done` is checked before waiting and after every job. Returns false if
    /// every dispatcher was dropped first. Must not be called from inside the
    /// tokio runtime.
    pub fn run_until(&mut self, mut done: impl FnMut() -> bool) -> bool {
        loop {
            if done() {
                return true;
            }
            match self.jobs.blocking_recv() {
                Some(job) => self.run(job),
                None => return false,
            }
        }
    }

    /// Like [`ForegroundLoop::run_until`], giving up after `timeout`
    pub fn run_until_timeout(&mut self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(?timeout, "Foreground wait timed out");
                return false;
            }
            let next = self
                .runtime
                .block_on(async { tokio::time::timeout(remaining, self.jobs.recv()).await });
            match next {
                Ok(Some(job)) => self.run(job),
                Ok(None) => return false,
                Err(_) => return done(),
            }
        }
    }

    /// Drive the loop until `completion` resolves
    pub fn wait_for<T>(&mut self, completion: &mut Completion<T>) -> AgeResult<T> {
        self.run_until(|| completion.is_ready());
        completion
            .try_take()
            .unwrap_or_else(|| Err(AgeError::Disconnected("foreground loop closed".to_string())))
    }

    /// Drive the loop until `completion` resolves or `timeout` passes
    pub fn wait_for_timeout<T>(
        &mut self,
        completion: &mut Completion<T>,
        timeout: Duration,
    ) -> AgeResult<T> {
        if !self.run_until_timeout(timeout, || completion.is_ready()) {
            return Err(AgeError::Disconnected(format!(
                "no result within {:?}",
                timeout
            )));
        }
        completion
            .try_take()
            .unwrap_or_else(|| Err(AgeError::Disconnected("result already taken".to_string())))
    }
}

/// Producer half of a [`Completion`]
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<AgeResult<T>>,
}

impl<T> Completer<T> {
    /// Resolve the completion; a dropped receiver is not an error
    pub fn complete(self, result: AgeResult<T>) {
        let _ = self.tx.send(result);
    }
}

/// One-shot result of asynchronous work
///
/// Dropping the [`Completer`] without answering resolves it to
/// [`AgeError::Disconnected`]. The value can be taken once.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<AgeResult<T>>,
    ready: Option<AgeResult<T>>,
}

/// Create a linked completer/completion pair
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx, ready: None })
}

impl<T> Completion<T> {
    fn poll(&mut self) {
        if self.ready.is_some() {
            return;
        }
        match self.rx.try_recv() {
            Ok(result) => self.ready = Some(result),
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.ready = Some(Err(AgeError::Disconnected(
                    "work was dropped before completing".to_string(),
                )))
            }
        }
    }

    /// Non-blocking check
    pub fn is_ready(&mut self) -> bool {
        self.poll();
        self.ready.is_some()
    }

    /// Take the result if it has arrived
    pub fn try_take(&mut self) -> Option<AgeResult<T>> {
        self.poll();
        self.ready.take()
    }

    /// Block the calling thread until the result arrives
    ///
    /// Only for threads outside the runtime that are not the foreground
    /// owner; the foreground should use [`ForegroundLoop::wait_for`].
    pub fn wait(mut self) -> AgeResult<T> {
        if let Some(result) = self.ready.take() {
            return result;
        }
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(AgeError::Disconnected("work was dropped".to_string())))
    }
}
