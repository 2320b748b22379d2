//! Abstraction of CLUSTER SLOTS command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/cluster-slots/>).
//!
//! Used for discovering the slot ownership of cluster nodes. Servers running without cluster
//! support reply with an error, which the multiplexer ignores.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::processors::{ClusterSlotsProcessor, ResultProcessor, SlotRange};

#[derive(Debug, Clone, Default)]
pub struct ClusterSlotsCommand;

impl Command for ClusterSlotsCommand {
    type Response = Vec<SlotRange>;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("CLUSTER").arg_static("SLOTS")
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        ClusterSlotsProcessor.process(&value)
    }
}
