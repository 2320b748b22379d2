use crate::codec::RespValue;
use crate::subscribe::channel::{ChannelKind, RedisChannel};
use bytes::Bytes;

/// A decoded push message of a subscription connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Confirmation of a subscription. The integer represents the number of channels currently subscribed to.
    SubConfirmation(ChannelKind, Bytes, usize),
    /// Confirmation of a unsubscribe command. The integer represents the number of channels currently subscribed to.
    UnSubConfirmation(ChannelKind, Bytes, usize),
    /// A message published to a literal or sharded channel
    Publish(ChannelKind, Bytes, Bytes),
    /// A message matched by a pattern. Values are pattern, channel and payload.
    PatternPublish(Bytes, Bytes, Bytes),
}

/// Errors related for decoding push messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The given value is neither a push message nor an array
    NoPushMessage,
    /// Unknown sub message type
    UnknownType,
    /// Invalid message format (violation of RESP2 or RESP3 specification)
    ProtocolViolation,
    /// The given channel counts overflows usize
    IntegerOverflow,
}

impl PushMessage {
    /// Decodes RESP3 push messages as well as their RESP2 array equivalent
    pub fn decode(value: &RespValue) -> Result<PushMessage, DecodeError> {
        let data = match value.skip_attributes() {
            RespValue::Push(elements) | RespValue::Array(Some(elements)) => elements.as_slice(),
            _ => return Err(DecodeError::NoPushMessage),
        };

        if data.len() < 3 {
            return Err(DecodeError::ProtocolViolation);
        }

        match &string_of(&data[0])?.to_ascii_lowercase()[..] {
            b"message" => Self::decode_message(ChannelKind::Literal, data),
            b"smessage" => Self::decode_message(ChannelKind::Sharded, data),
            b"pmessage" => Self::decode_pattern_message(data),
            b"subscribe" => Self::decode_confirmation(ChannelKind::Literal, data, PushMessage::SubConfirmation),
            b"psubscribe" => Self::decode_confirmation(ChannelKind::Pattern, data, PushMessage::SubConfirmation),
            b"ssubscribe" => Self::decode_confirmation(ChannelKind::Sharded, data, PushMessage::SubConfirmation),
            b"unsubscribe" => Self::decode_confirmation(ChannelKind::Literal, data, PushMessage::UnSubConfirmation),
            b"punsubscribe" => Self::decode_confirmation(ChannelKind::Pattern, data, PushMessage::UnSubConfirmation),
            b"sunsubscribe" => Self::decode_confirmation(ChannelKind::Sharded, data, PushMessage::UnSubConfirmation),
            _ => Err(DecodeError::UnknownType),
        }
    }

    /// Subscription the message is addressed to, None for confirmations
    pub fn subscription(&self) -> Option<RedisChannel> {
        match self {
            PushMessage::Publish(kind, channel, _) => Some(RedisChannel::new(channel.clone(), *kind)),
            PushMessage::PatternPublish(pattern, _, _) => Some(RedisChannel::pattern(pattern.clone())),
            _ => None,
        }
    }

    fn decode_message(kind: ChannelKind, data: &[RespValue]) -> Result<PushMessage, DecodeError> {
        Ok(PushMessage::Publish(kind, string_of(&data[1])?, string_of(&data[2])?))
    }

    fn decode_pattern_message(data: &[RespValue]) -> Result<PushMessage, DecodeError> {
        if data.len() < 4 {
            return Err(DecodeError::ProtocolViolation);
        }

        Ok(PushMessage::PatternPublish(
            string_of(&data[1])?,
            string_of(&data[2])?,
            string_of(&data[3])?,
        ))
    }

    fn decode_confirmation<F>(kind: ChannelKind, data: &[RespValue], build: F) -> Result<PushMessage, DecodeError>
    where
        F: Fn(ChannelKind, Bytes, usize) -> PushMessage,
    {
        // Unsubscribing without any subscription confirms a null channel
        let channel = match data[1].is_null() {
            true => Bytes::new(),
            false => string_of(&data[1])?,
        };

        let count = data[2].as_integer().ok_or(DecodeError::ProtocolViolation)?;
        Ok(build(kind, channel, cast_channel_count(count)?))
    }
}

fn string_of(value: &RespValue) -> Result<Bytes, DecodeError> {
    value.as_bytes().cloned().ok_or(DecodeError::ProtocolViolation)
}

/// Safe casting of channel count
fn cast_channel_count(count: i64) -> Result<usize, DecodeError> {
    if count.is_negative() {
        return Err(DecodeError::ProtocolViolation);
    }

    usize::try_from(count).map_err(|_| DecodeError::IntegerOverflow)
}

/// A published message, as handed to handlers and queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Subscription that received the message
    pub subscription: RedisChannel,

    /// The channel the message has been published to
    pub channel: Bytes,

    /// The actual payload
    pub payload: Bytes,
}
