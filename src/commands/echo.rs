//! Abstraction of ECHO command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/echo/>).
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{BytesProcessor, ResultProcessor};
use bytes::Bytes;

/// Abstraction for ECHO command
#[derive(Debug, Clone)]
pub struct EchoCommand {
    message: Bytes,
}

impl EchoCommand {
    pub fn new<M>(message: M) -> Self
    where
        Bytes: From<M>,
    {
        EchoCommand {
            message: message.into(),
        }
    }
}

impl Command for EchoCommand {
    /// The echoed message
    type Response = Bytes;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("ECHO").arg(&self.message)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        BytesProcessor.process(&value)
    }
}
