use crate::commands::CommandFlags;
use crate::network::CommandErrors;
use crate::subscribe::channel::RedisChannel;
use crate::subscribe::manager::{Sink, SubscriptionState, ViewId};
use crate::subscribe::messages::Message;
use bytes::{Bytes, BytesMut};
use embedded_nal::SocketAddr;
use crossbeam::channel::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_VIEW: AtomicU64 = AtomicU64::new(1);

/// Server side of a [Subscriber]
pub(crate) trait PubSubBackend: Send + Sync {
    fn subscribe(&self, channel: RedisChannel, flags: CommandFlags, view: ViewId, sink: Sink)
        -> Result<(), CommandErrors>;

    fn unsubscribe(&self, channel: &RedisChannel, view: ViewId) -> Result<(), CommandErrors>;

    fn unsubscribe_all(&self, view: ViewId);

    fn publish(&self, channel: &RedisChannel, payload: Bytes) -> Result<i64, CommandErrors>;

    fn subscribed_endpoint(&self, channel: &RedisChannel) -> Option<SocketAddr>;

    fn subscriptions(&self) -> Vec<SubscriptionState>;
}

/// Pub/Sub interface of a multiplexer
///
/// Subscriptions survive connection failures: they are moved to another eligible server
/// without the handlers being registered again. A view created by [Subscriber::with_prefix]
/// prepends its prefix to every channel and owns its own handlers.
#[derive(Clone)]
pub struct Subscriber {
    backend: Arc<dyn PubSubBackend>,
    view: ViewId,
    prefix: Bytes,
}

impl Subscriber {
    pub(crate) fn new(backend: Arc<dyn PubSubBackend>) -> Self {
        Self {
            backend,
            view: NEXT_VIEW.fetch_add(1, Ordering::Relaxed),
            prefix: Bytes::new(),
        }
    }

    /// Invokes the handler for every message of the channel.
    ///
    /// Succeeds without server confirmation if no eligible server is reachable, the subscription
    /// is established as soon as one becomes available.
    pub fn subscribe<F>(&self, channel: RedisChannel, handler: F) -> Result<(), CommandErrors>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe_with_flags(channel, CommandFlags::PREFER_MASTER, handler)
    }

    /// Same as [Subscriber::subscribe], flags restrict the eligible servers
    pub fn subscribe_with_flags<F>(&self, channel: RedisChannel, flags: CommandFlags, handler: F) -> Result<(), CommandErrors>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let sink = Sink::Handler(Arc::new(handler));
        self.backend.subscribe(self.prefixed(&channel), flags, self.view, sink)
    }

    /// Forwards the messages to a queue. `capacity` None creates an unbounded queue.
    pub fn subscribe_queue(&self, channel: RedisChannel, capacity: Option<usize>) -> Result<Receiver<Message>, CommandErrors> {
        let (sender, receiver) = match capacity {
            Some(capacity) => crossbeam::channel::bounded(capacity),
            None => crossbeam::channel::unbounded(),
        };

        let sink = Sink::Queue(sender);
        self.backend.subscribe(self.prefixed(&channel), CommandFlags::PREFER_MASTER, self.view, sink)?;
        Ok(receiver)
    }

    /// Removes the handlers of this view. The server subscription ends with the last handler.
    pub fn unsubscribe(&self, channel: &RedisChannel) -> Result<(), CommandErrors> {
        self.backend.unsubscribe(&self.prefixed(channel), self.view)
    }

    /// Removes all handlers of this view
    pub fn unsubscribe_all(&self) {
        self.backend.unsubscribe_all(self.view);
    }

    /// Publishes the message. Returns the number of clients that received it.
    pub fn publish<P: Into<Bytes>>(&self, channel: &RedisChannel, payload: P) -> Result<i64, CommandErrors> {
        self.backend.publish(&self.prefixed(channel), payload.into())
    }

    /// New view, whose channels are prefixed by the given prefix (in addition to the own prefix)
    pub fn with_prefix(&self, prefix: &str) -> Subscriber {
        let mut combined = BytesMut::with_capacity(self.prefix.len() + prefix.len());
        combined.extend_from_slice(&self.prefix);
        combined.extend_from_slice(prefix.as_bytes());

        Subscriber {
            backend: self.backend.clone(),
            view: NEXT_VIEW.fetch_add(1, Ordering::Relaxed),
            prefix: combined.freeze(),
        }
    }

    /// Endpoint currently carrying the subscription, None while pending
    pub fn subscribed_endpoint(&self, channel: &RedisChannel) -> Option<SocketAddr> {
        self.backend.subscribed_endpoint(&self.prefixed(channel))
    }

    /// All subscriptions of the multiplexer
    pub fn subscriptions(&self) -> Vec<SubscriptionState> {
        self.backend.subscriptions()
    }

    pub fn prefix(&self) -> &Bytes {
        &self.prefix
    }

    fn prefixed(&self, channel: &RedisChannel) -> RedisChannel {
        channel.with_prefix(&self.prefix)
    }
}
