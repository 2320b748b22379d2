//! Abstraction of SET command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/set/>).
//!
//! An optional time to live is sent as `PX` option, s. [SetCommand::expires_in].
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::multiplexer::ConnectionMultiplexer;
use crate::network::{CommandErrors, ResponseFuture};
use crate::processors::{OkProcessor, ResultProcessor};
use bytes::Bytes;
use embedded_nal::TcpClientStack;
use embedded_time::duration::Milliseconds;

#[derive(Debug, Clone)]
pub struct SetCommand {
    key: Bytes,
    value: Bytes,
    expiry: Option<Milliseconds>,
}

impl SetCommand {
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        Bytes: From<K>,
        Bytes: From<V>,
    {
        SetCommand {
            key: key.into(),
            value: value.into(),
            expiry: None,
        }
    }

    /// Key expires after the given time
    pub fn expires_in(mut self, expiry: Milliseconds) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

impl Command for SetCommand {
    type Response = ();

    fn encode(&self) -> CommandBuilder {
        let builder = CommandBuilder::new("SET").arg(&self.key).arg(&self.value);

        match self.expiry {
            Some(expiry) => builder.arg_static("PX").arg_uint(expiry.0 as usize),
            None => builder,
        }
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        OkProcessor.process(&value)
    }

    fn key(&self) -> Option<&Bytes> {
        Some(&self.key)
    }
}

impl<N> ConnectionMultiplexer<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    /// Shorthand for [SetCommand]
    pub fn set<K, V>(&self, key: K, value: V) -> Result<ResponseFuture<SetCommand>, CommandErrors>
    where
        Bytes: From<K>,
        Bytes: From<V>,
    {
        self.send(SetCommand::new(key, value))
    }
}
