//! Command abstractions
//!
//! A command encodes itself into a [CommandBuilder] and evaluates the decoded [RespValue] reply
//! into a high level response, usually by delegating to a [processor](crate::processors).
use crate::codec::RespValue;
use bytes::Bytes;
use core::fmt::{Display, Formatter};

pub use builder::CommandBuilder;
pub use flags::CommandFlags;

pub mod auth;
pub mod builder;
pub mod cluster;
pub mod custom;
pub mod del;
pub mod echo;
pub mod flags;
pub mod get;
pub mod hello;
pub mod ping;
pub mod publish;
pub mod role;
pub mod set;
#[cfg(test)]
pub(crate) mod tests;

/// Error in case Redis response type does not match specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTypeError {
    /// Shape the processor expected
    pub expected: &'static str,
    /// Kind of the value received
    pub received: &'static str,
}

impl ResponseTypeError {
    pub fn new(expected: &'static str, value: &RespValue) -> Self {
        Self {
            expected,
            received: value.skip_attributes().kind(),
        }
    }
}

impl Display for ResponseTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "expected {}, received {}", self.expected, self.received)
    }
}

impl std::error::Error for ResponseTypeError {}

/// Generic command structure
pub trait Command {
    /// Response type, either a custom evaluated "high-level" response or the original value
    type Response;

    /// Encodes the command
    fn encode(&self) -> CommandBuilder;

    /// The command has the ability to evaluate the reply and craft its own high level
    /// response from that.
    ///
    /// Error responses are captured upfront and converted to CommandErrors::ErrorResponse.
    /// So error responses never reach that method.
    ///
    /// Returns Error only in case of protocol violation (e.g. received an array for an command
    /// that only returns strings)
    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError>;

    /// Key used for cluster slot routing
    fn key(&self) -> Option<&Bytes> {
        None
    }

    /// Routing flags of this command
    fn flags(&self) -> CommandFlags {
        CommandFlags::empty()
    }
}
