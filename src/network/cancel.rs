use crate::commands::CommandFlags;
use crate::network::error::CommandErrors;
use crate::network::future::Completion;
use crate::network::lock;
use embedded_time::duration::Microseconds;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn Completion>>>,
    children: Mutex<Vec<Weak<TokenState>>>,
}

impl TokenState {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let listeners = core::mem::take(&mut *lock(&self.listeners));
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.complete(Err(CommandErrors::Cancelled));
        }

        let children = core::mem::take(&mut *lock(&self.children));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Caller side cancellation
///
/// Cancelling completes every registered request with [CommandErrors::Cancelled]. Requests
/// already written to the socket are not recalled, their responses are discarded on arrival.
/// Cancelling a token cancels all its children, but not its parent.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token cancelled together with this one
    pub fn child(&self) -> CancellationToken {
        let child = CancellationToken::new();

        {
            let mut children = lock(&self.state.children);
            if !self.is_cancelled() {
                children.retain(|child| child.strong_count() > 0);
                children.push(Arc::downgrade(&child.state));
                return child;
            }
        }

        child.cancel();
        child
    }

    /// Number of tracked children, including dropped ones not yet pruned
    pub(crate) fn child_count(&self) -> usize {
        lock(&self.state.children).len()
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Completes the given request once cancelled. Already cancelled tokens complete it at once.
    pub(crate) fn register(&self, completion: &Arc<dyn Completion>) {
        {
            let mut listeners = lock(&self.state.listeners);
            if !self.is_cancelled() {
                listeners.retain(|listener| listener.strong_count() > 0);
                listeners.push(Arc::downgrade(completion));
                return;
            }
        }

        completion.complete(Err(CommandErrors::Cancelled));
    }
}

impl core::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Per request settings, passed explicitly along with a command
///
/// A nested scope created by [RequestContext::scope] may override timeout and flags for a sub
/// operation. The outer context is a separate value and stays untouched.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    timeout: Option<Microseconds>,
    token: Option<CancellationToken>,
    flags: Option<CommandFlags>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the response timeout of the connection
    pub fn with_timeout(mut self, timeout: Microseconds) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Overrides the routing flags of the command
    pub fn with_flags(mut self, flags: CommandFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Nested context inheriting all settings. Its token is a child of the outer token.
    pub fn scope(&self) -> RequestContext {
        RequestContext {
            timeout: self.timeout,
            token: Some(match &self.token {
                Some(token) => token.child(),
                None => CancellationToken::new(),
            }),
            flags: self.flags,
        }
    }

    pub fn timeout(&self) -> Option<Microseconds> {
        self.timeout
    }

    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    pub fn flags(&self) -> Option<CommandFlags> {
        self.flags
    }
}
