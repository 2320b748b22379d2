//! Abstraction of PING command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/ping/>).
//!
//! Without argument the server replies `PONG`, otherwise it echoes the argument. Both cases are
//! verified. The multiplexer also uses this command as heartbeat.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::multiplexer::ConnectionMultiplexer;
use crate::network::{CommandErrors, ResponseFuture};
use crate::processors::{BytesProcessor, ResultProcessor};
use bytes::Bytes;
use embedded_nal::TcpClientStack;

/// Abstraction for PING command
#[derive(Debug, Clone, Default)]
pub struct PingCommand {
    argument: Option<Bytes>,
}

impl PingCommand {
    pub fn new(argument: Option<Bytes>) -> Self {
        PingCommand { argument }
    }
}

static PONG: Bytes = Bytes::from_static(b"PONG");

impl Command for PingCommand {
    type Response = ();

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("PING").arg_option(self.argument.as_ref())
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        // Subscribed RESP2 connections reply with ["pong", argument]
        let response = match value.as_elements() {
            Some([kind, argument]) if kind.as_str() == Some("pong") => {
                if self.argument.is_none() {
                    return Ok(());
                }
                BytesProcessor.process(argument)?
            }
            _ => BytesProcessor.process(&value)?,
        };

        let expected = self.argument.as_ref().unwrap_or(&PONG);
        if &response != expected {
            return Err(ResponseTypeError::new("PONG or echoed argument", &value));
        }

        Ok(())
    }
}

impl<N> ConnectionMultiplexer<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    /// Shorthand for [PingCommand]
    pub fn ping(&self) -> Result<ResponseFuture<PingCommand>, CommandErrors> {
        self.send(PingCommand::new(None))
    }
}
