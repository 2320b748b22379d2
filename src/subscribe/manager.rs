use crate::codec::RespValue;
use crate::commands::CommandFlags;
use crate::network::lock;
use crate::subscribe::channel::RedisChannel;
use crate::subscribe::messages::{Message, PushMessage};
use embedded_nal::SocketAddr;
use crossbeam::channel::{Sender, TrySendError};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Identifies a subscriber view
pub type ViewId = u64;

/// Receiver of the messages of a subscription
#[derive(Clone)]
pub(crate) enum Sink {
    /// Executed on the dispatcher thread
    Handler(MessageHandler),
    /// Messages are forwarded to a channel. Full bounded queues drop the message.
    Queue(Sender<Message>),
}

struct Registration {
    view: ViewId,
    sink: Sink,
}

struct Subscription {
    flags: CommandFlags,

    /// Endpoint whose subscription connection carries the subscription
    owner: Option<SocketAddr>,

    /// Last owner lost by failure
    previous: Option<SocketAddr>,
    registrations: Vec<Registration>,
}

/// Public view on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub channel: RedisChannel,
    pub owner: Option<SocketAddr>,
    pub handlers: usize,
}

type Delivery = (MessageHandler, Message);

/// Tracks subscriptions, their owning endpoint and the registered handlers
///
/// Messages are only accepted from the current owner of a subscription. A subscription
/// without owner is pending and picked up by the next heal round.
pub(crate) struct SubscriptionManager {
    subscriptions: Mutex<HashMap<RedisChannel, Subscription>>,
    dispatcher: Option<Sender<Delivery>>,
    worker: Option<JoinHandle<()>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded::<Delivery>();

        let worker = std::thread::Builder::new()
            .name("redis-mux-pubsub".to_string())
            .spawn(move || {
                for (handler, message) in receiver.iter() {
                    invoke(&handler, &message);
                }
            });

        match worker {
            Ok(worker) => Self {
                subscriptions: Mutex::new(HashMap::new()),
                dispatcher: Some(sender),
                worker: Some(worker),
            },
            Err(error) => {
                log::error!("Unable to start pub/sub dispatcher, handlers run inline: {}", error);
                Self {
                    subscriptions: Mutex::new(HashMap::new()),
                    dispatcher: None,
                    worker: None,
                }
            }
        }
    }

    /// Registers the sink. Returns true if the subscription is new and needs a server.
    pub fn add(&self, channel: RedisChannel, flags: CommandFlags, view: ViewId, sink: Sink) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let registration = Registration { view, sink };

        match subscriptions.get_mut(&channel) {
            Some(subscription) => {
                subscription.registrations.push(registration);
                false
            }
            None => {
                subscriptions.insert(
                    channel,
                    Subscription {
                        flags,
                        owner: None,
                        previous: None,
                        registrations: vec![registration],
                    },
                );
                true
            }
        }
    }

    /// Removes the registrations of the view. Returns the owner if the subscription was dropped.
    pub fn remove(&self, channel: &RedisChannel, view: ViewId) -> Option<Option<SocketAddr>> {
        let mut subscriptions = lock(&self.subscriptions);
        let subscription = subscriptions.get_mut(channel)?;
        subscription.registrations.retain(|registration| registration.view != view);

        if !subscription.registrations.is_empty() {
            return None;
        }

        subscriptions.remove(channel).map(|subscription| subscription.owner)
    }

    /// Removes all registrations of the view. Returns the dropped subscriptions with their owner.
    pub fn remove_view(&self, view: ViewId) -> Vec<(RedisChannel, Option<SocketAddr>)> {
        let mut subscriptions = lock(&self.subscriptions);
        let mut dropped = vec![];

        subscriptions.retain(|channel, subscription| {
            subscription.registrations.retain(|registration| registration.view != view);
            if subscription.registrations.is_empty() {
                dropped.push((channel.clone(), subscription.owner));
                return false;
            }
            true
        });

        dropped
    }

    /// Subscriptions without owner
    pub fn orphans(&self) -> Vec<(RedisChannel, CommandFlags)> {
        lock(&self.subscriptions)
            .iter()
            .filter(|(_, subscription)| subscription.owner.is_none())
            .map(|(channel, subscription)| (channel.clone(), subscription.flags))
            .collect()
    }

    /// Assigns an orphaned subscription to the endpoint.
    /// Returns the previous owner, or None if the subscription is gone or owned meanwhile.
    pub fn claim(&self, channel: &RedisChannel, endpoint: SocketAddr) -> Option<Option<SocketAddr>> {
        let mut subscriptions = lock(&self.subscriptions);
        let subscription = subscriptions.get_mut(channel)?;
        if subscription.owner.is_some() {
            return None;
        }

        subscription.owner = Some(endpoint);
        Some(subscription.previous.take())
    }

    /// Reverts a claim, e.g. if the subscribe command could not be sent
    pub fn release(&self, channel: &RedisChannel, endpoint: SocketAddr) {
        if let Some(subscription) = lock(&self.subscriptions).get_mut(channel) {
            if subscription.owner == Some(endpoint) {
                subscription.owner = None;
            }
        }
    }

    /// Orphans all subscriptions carried by the endpoint's subscription connection
    pub fn connection_lost(&self, endpoint: SocketAddr) {
        for subscription in lock(&self.subscriptions).values_mut() {
            if subscription.owner == Some(endpoint) {
                subscription.owner = None;
                subscription.previous = Some(endpoint);
            }
        }
    }

    pub fn owner(&self, channel: &RedisChannel) -> Option<SocketAddr> {
        lock(&self.subscriptions).get(channel).and_then(|subscription| subscription.owner)
    }

    pub fn states(&self) -> Vec<SubscriptionState> {
        lock(&self.subscriptions)
            .iter()
            .map(|(channel, subscription)| SubscriptionState {
                channel: channel.clone(),
                owner: subscription.owner,
                handlers: subscription.registrations.len(),
            })
            .collect()
    }

    /// Routes a push message received on the subscription connection of `origin`
    pub fn deliver(&self, origin: SocketAddr, value: &RespValue) {
        let push = match PushMessage::decode(value) {
            Ok(push) => push,
            Err(error) => {
                log::debug!("Ignoring push message of {}: {:?}", origin, error);
                return;
            }
        };

        let (subscription_channel, channel, payload) = match (push.subscription(), push) {
            (Some(subscription), PushMessage::Publish(_, channel, payload)) => (subscription, channel, payload),
            (Some(subscription), PushMessage::PatternPublish(_, channel, payload)) => (subscription, channel, payload),
            _ => return,
        };

        let mut closed = vec![];
        let mut handlers = vec![];
        {
            let mut subscriptions = lock(&self.subscriptions);
            let subscription = match subscriptions.get_mut(&subscription_channel) {
                Some(subscription) if subscription.owner == Some(origin) => subscription,
                Some(_) => {
                    log::debug!("Dropping message of {} from former owner {}", subscription_channel, origin);
                    return;
                }
                None => return,
            };

            let message = Message {
                subscription: subscription_channel.clone(),
                channel,
                payload,
            };

            for (index, registration) in subscription.registrations.iter().enumerate() {
                match &registration.sink {
                    Sink::Handler(handler) => handlers.push((handler.clone(), message.clone())),
                    Sink::Queue(queue) => match queue.try_send(message.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            log::warn!("Queue of {} is full, dropping message", subscription_channel)
                        }
                        Err(TrySendError::Disconnected(_)) => closed.push(index),
                    },
                }
            }

            if !closed.is_empty() {
                let mut index = 0;
                subscription.registrations.retain(|_| {
                    index += 1;
                    !closed.contains(&(index - 1))
                });
            }
        }

        for delivery in handlers {
            self.dispatch(delivery);
        }
    }

    fn dispatch(&self, delivery: Delivery) {
        let delivery = match &self.dispatcher {
            Some(dispatcher) => match dispatcher.send(delivery) {
                Ok(()) => return,
                Err(error) => error.into_inner(),
            },
            None => delivery,
        };

        invoke(&delivery.0, &delivery.1);
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.dispatcher.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn invoke(handler: &MessageHandler, message: &Message) {
    if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
        log::error!("Handler of {} panicked", message.subscription);
    }
}
