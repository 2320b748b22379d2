pub use channel::{ChannelKind, RedisChannel};
pub use manager::{MessageHandler, SubscriptionState, ViewId};
pub use messages::{DecodeError, Message, PushMessage};
pub use subscriber::Subscriber;

pub(crate) mod channel;
pub(crate) mod manager;
pub(crate) mod messages;
pub(crate) mod subscriber;
