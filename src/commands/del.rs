//! Abstraction of DEL command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/del/>).
//!
//! Only a single key is supported, so the command can be routed to the owning cluster node.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{IntegerProcessor, ResultProcessor};
use bytes::Bytes;

/// Abstraction for DEL command
#[derive(Debug, Clone)]
pub struct DelCommand {
    key: Bytes,
}

impl DelCommand {
    pub fn new<K>(key: K) -> Self
    where
        Bytes: From<K>,
    {
        DelCommand { key: key.into() }
    }
}

impl Command for DelCommand {
    /// True if the key existed
    type Response = bool;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("DEL").arg(&self.key)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        Ok(IntegerProcessor.process(&value)? > 0)
    }

    fn key(&self) -> Option<&Bytes> {
        Some(&self.key)
    }
}
