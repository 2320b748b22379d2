use crate::codec::RespValue;
use crate::commands::Command;
use crate::network::error::CommandErrors;
use crate::network::lock;
use crate::network::response::assert_error;
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::task::AtomicWaker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Raw outcome of a request, before command specific evaluation
pub(crate) type Outcome = Result<RespValue, CommandErrors>;

/// Narrow completion contract shared by blocking and async result boxes
///
/// A box is completed at most once. The first completion wins, every later one is rejected and
/// reported by returning false, so a response racing with a timeout or cancellation is dropped.
pub trait Completion: Send + Sync {
    /// Completes the box. Returns false if the box was already completed.
    fn complete(&self, outcome: Result<RespValue, CommandErrors>) -> bool;

    fn is_completed(&self) -> bool;
}

/// Drives the I/O loop on behalf of a waiting caller, if no background worker is running
pub trait Driver: Send + Sync {
    fn drive(&self);
}

#[derive(Default)]
struct SyncState {
    completed: bool,
    outcome: Option<Outcome>,
}

/// Result box for callers blocking on a condition variable
#[derive(Default)]
pub struct SyncResultBox {
    state: Mutex<SyncState>,
    signal: Condvar,
}

impl SyncResultBox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the outcome without blocking
    pub(crate) fn take(&self) -> Option<Outcome> {
        lock(&self.state).outcome.take()
    }

    /// Blocks until completed or the given duration elapsed
    pub(crate) fn wait_for(&self, duration: Option<Duration>) -> Option<Outcome> {
        let mut state = lock(&self.state);
        while !state.completed {
            match duration {
                Some(duration) => {
                    let (guard, result) = self
                        .signal
                        .wait_timeout(state, duration)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    state = guard;
                    if result.timed_out() {
                        break;
                    }
                }
                None => state = self.signal.wait(state).unwrap_or_else(|poisoned| poisoned.into_inner()),
            }
        }

        state.outcome.take()
    }
}

impl Completion for SyncResultBox {
    fn complete(&self, outcome: Outcome) -> bool {
        let mut state = lock(&self.state);
        if state.completed {
            return false;
        }

        state.completed = true;
        state.outcome = Some(outcome);
        drop(state);

        self.signal.notify_all();
        true
    }

    fn is_completed(&self) -> bool {
        lock(&self.state).completed
    }
}

/// Result box for async callers, waking the registered task on completion
#[derive(Default)]
pub struct AsyncResultBox {
    completed: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
    waker: AtomicWaker,
}

impl AsyncResultBox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn take(&self) -> Option<Outcome> {
        lock(&self.outcome).take()
    }
}

impl Completion for AsyncResultBox {
    fn complete(&self, outcome: Outcome) -> bool {
        let mut slot = lock(&self.outcome);
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }

        *slot = Some(outcome);
        drop(slot);

        self.waker.wake();
        true
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

/// Converts the raw outcome to the high level command response
fn evaluate<Cmd: Command>(command: &Cmd, outcome: Outcome) -> Result<Cmd::Response, CommandErrors> {
    let value = outcome?;
    assert_error(&value)?;
    command
        .eval_response(value)
        .map_err(CommandErrors::CommandResponseViolation)
}

/// Blocking response handle
///
/// With a background worker the caller just waits for the completion signal. Without one,
/// waiting drives the I/O loop of the multiplexer itself.
pub struct ResponseFuture<Cmd: Command> {
    command: Cmd,
    result: Arc<SyncResultBox>,
    driver: Option<Arc<dyn Driver>>,

    /// Outcome fetched by ready(), returned on wait()
    outcome: Option<Outcome>,
}

impl<Cmd: Command> ResponseFuture<Cmd> {
    pub(crate) fn new(command: Cmd, result: Arc<SyncResultBox>, driver: Option<Arc<dyn Driver>>) -> Self {
        Self {
            command,
            result,
            driver,
            outcome: None,
        }
    }

    /// Blocks until response is received and returns the response
    /// Returns an error on failed connection, error response, timeout or cancellation
    pub fn wait(mut self) -> Result<Cmd::Response, CommandErrors> {
        if let Some(outcome) = self.outcome.take() {
            return evaluate(&self.command, outcome);
        }

        let outcome = match &self.driver {
            None => self.result.wait_for(None),
            Some(driver) => loop {
                if self.result.is_completed() {
                    break self.result.take();
                }

                driver.drive();
                if let Some(outcome) = self.result.wait_for(Some(Duration::from_micros(100))) {
                    break Some(outcome);
                }
            },
        };

        match outcome {
            Some(outcome) => evaluate(&self.command, outcome),
            None => Err(CommandErrors::InvalidFuture),
        }
    }

    /// Non blocking method for checking if data is ready
    /// So if true is returned, wait() is non-blocking
    pub fn ready(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }

        if let Some(driver) = &self.driver {
            driver.drive();
        }

        self.outcome = self.result.take();
        self.outcome.is_some()
    }

    pub fn command(&self) -> &Cmd {
        &self.command
    }
}

/// Async response handle implementing [core::future::Future]
pub struct AsyncResponse<Cmd: Command> {
    command: Cmd,
    result: Arc<AsyncResultBox>,
    driver: Option<Arc<dyn Driver>>,
}

impl<Cmd: Command> AsyncResponse<Cmd> {
    pub(crate) fn new(command: Cmd, result: Arc<AsyncResultBox>, driver: Option<Arc<dyn Driver>>) -> Self {
        Self {
            command,
            result,
            driver,
        }
    }
}

impl<Cmd: Command> AsyncResponse<Cmd> {
    fn finish(&self) -> Result<Cmd::Response, CommandErrors> {
        match self.result.take() {
            Some(outcome) => evaluate(&self.command, outcome),
            None => Err(CommandErrors::InvalidFuture),
        }
    }
}

impl<Cmd: Command + Unpin> core::future::Future for AsyncResponse<Cmd> {
    type Output = Result<Cmd::Response, CommandErrors>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.result.waker.register(cx.waker());

        if this.result.is_completed() {
            return Poll::Ready(this.finish());
        }

        if let Some(driver) = &this.driver {
            driver.drive();
            if this.result.is_completed() {
                return Poll::Ready(this.finish());
            }

            // No worker is going to wake us, so poll again
            cx.waker().wake_by_ref();
        }

        Poll::Pending
    }
}
