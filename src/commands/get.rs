//! Abstraction of GET command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/get/>).
//!
//! In case of existing key [`Some(GetResponse)`](GetResponse) is returned, `None` for missing keys.
//! The key is used for cluster slot routing.
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::multiplexer::ConnectionMultiplexer;
use crate::network::{CommandErrors, ResponseFuture};
use crate::processors::{NullableBytesProcessor, ResultProcessor};
use bytes::Bytes;
use embedded_nal::TcpClientStack;

///Abstraction of GET command.
#[derive(Debug, Clone)]
pub struct GetCommand {
    key: Bytes,
}

impl GetCommand {
    pub fn new<K>(key: K) -> Self
    where
        Bytes: From<K>,
    {
        GetCommand { key: key.into() }
    }

    /// Create from static key
    pub fn static_key(key: &'static str) -> Self {
        Self {
            key: Bytes::from_static(key.as_bytes()),
        }
    }
}

///Abstraction of GET response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    inner: Bytes,
}

impl GetResponse {
    pub fn new(inner: Bytes) -> Self {
        GetResponse { inner }
    }

    /// Extracts inner value
    pub fn to_bytes(self) -> Bytes {
        self.inner
    }

    /// Tries converting to String by copy, returns None in case of error (wrong UTF8 encoding)
    pub fn as_string(&self) -> Option<String> {
        String::from_utf8(self.inner.to_vec()).ok()
    }

    /// Returns a &str to inner data, returns None in case of invalid UTF8 encoding
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.inner.as_ref()).ok()
    }
}

impl Command for GetCommand {
    type Response = Option<GetResponse>;

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("GET").arg(&self.key)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        Ok(NullableBytesProcessor.process(&value)?.map(GetResponse::new))
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
    /// Shorthand for [GetCommand]
    pub fn get<K>(&self, key: K) -> Result<ResponseFuture<GetCommand>, CommandErrors>
    where
        Bytes: From<K>,
    {
        self.send(GetCommand::new(key))
    }
}
