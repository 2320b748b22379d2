//! Abstraction of ROLE command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/role/>).
//!
//! Executed during the handshake of interactive connections for detecting primaries and replicas.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{ResultProcessor, Role, RoleProcessor};

#[derive(Debug, Clone, Default)]
pub struct RoleCommand;

impl Command for RoleCommand {
    type Response = Role;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("ROLE")
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        RoleProcessor.process(&value)
    }
}
