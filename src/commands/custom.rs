//! Abstraction for arbitrary commands.
//!
//! [CustomCommand] in combination with [CommandBuilder] can be used for executing arbitrary commands,
//! which high level logic is not abstracted yet by this crate.
//!
//! Response is not evaluated, so the pure [RespValue] is returned.
//! The only exception is that error responses are intercepted and converted to [CommandErrors::ErrorResponse](crate::network::CommandErrors::ErrorResponse)
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::flags::CommandFlags;
use crate::commands::{Command, ResponseTypeError};
use bytes::Bytes;

/// Abstraction for arbitrary commands.
#[derive(Debug, Clone)]
pub struct CustomCommand {
    builder: CommandBuilder,
    key: Option<Bytes>,
    flags: CommandFlags,
}

impl CustomCommand {
    pub fn new(builder: CommandBuilder) -> Self {
        CustomCommand {
            builder,
            key: None,
            flags: CommandFlags::empty(),
        }
    }

    /// Sets the key used for cluster slot routing
    pub fn routed_by(mut self, key: Bytes) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_flags(mut self, flags: CommandFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl Command for CustomCommand {
    type Response = RespValue;

    fn encode(&self) -> CommandBuilder {
        self.builder.clone()
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        Ok(value)
    }

    fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    fn flags(&self) -> CommandFlags {
        self.flags
    }
}
