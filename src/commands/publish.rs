//! Abstraction of PUBLISH command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/publish/>).
//!
//! Returns the number of clients that received the message. Sharded channels are published with
//! SPUBLISH, which is routed by the channel's cluster slot.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::flags::CommandFlags;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{IntegerProcessor, ResultProcessor};
use bytes::Bytes;

/// Abstraction for PUBLISH command
#[derive(Debug, Clone)]
pub struct PublishCommand {
    channel: Bytes,
    message: Bytes,
    sharded: bool,
}

impl PublishCommand {
    pub fn new<C, M>(channel: C, message: M) -> Self
    where
        Bytes: From<C>,
        Bytes: From<M>,
    {
        PublishCommand {
            channel: channel.into(),
            message: message.into(),
            sharded: false,
        }
    }

    /// Uses SPUBLISH
    pub fn sharded(mut self) -> Self {
        self.sharded = true;
        self
    }
}

impl Command for PublishCommand {
    /// the number of clients that received the message
    type Response = i64;

    fn encode(&self) -> CommandBuilder {
        let keyword = if self.sharded { "SPUBLISH" } else { "PUBLISH" };
        CommandBuilder::new(keyword).arg(&self.channel).arg(&self.message)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        IntegerProcessor.process(&value)
    }

    fn key(&self) -> Option<&Bytes> {
        self.sharded.then_some(&self.channel)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::PREFER_MASTER
    }
}
