//! Abstraction of HELLO command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/hello/>).
//!
//! *As this command is executed automatically during the handshake of RESP3 connections, there is usually no
//! need for manual execution.*
//!
//! Response is mapped to [HelloResponse].
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{HelloProcessor, HelloResponse, ResultProcessor};

/// Abstraction of HELLO command.
#[derive(Debug, Clone)]
pub struct HelloCommand {
    protocol_version: usize,
}

impl HelloCommand {
    pub fn new(protocol_version: usize) -> Self {
        Self { protocol_version }
    }
}

impl Default for HelloCommand {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Command for HelloCommand {
    type Response = HelloResponse;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("HELLO").arg_uint(self.protocol_version)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        HelloProcessor.process(&value)
    }
}
