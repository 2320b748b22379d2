//! Abstraction of AUTH command.
//!
//! For general information about this command, see the [Redis documentation](<https://redis.io/commands/auth/>).
//!
//! *Authentication is done automatically during the handshake of each physical connection, as configured
//! by [ConnectionOptions](crate::network::ConnectionOptions), so there is usually no need for manual execution.*
//!
//! # Error handling
//! Successful execution is terminated by returning `Ok(())` response.
//!
//! Authentication errors are normally signalled by Redis with an error response, which is mapped
//! to [CommandErrors::ErrorResponse](crate::network::CommandErrors::ErrorResponse). During the
//! handshake, such an error fails the connection with
//! [AuthenticationFailure](crate::network::ConnectionFailureType::AuthenticationFailure).
use crate::codec::RespValue;
use crate::commands::builder::CommandBuilder;
use crate::commands::{Command, ResponseTypeError};
use crate::network::handler::Credentials;
use crate::processors::{OkProcessor, ResultProcessor};
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct AuthCommand {
    /// Optionally sets a username for ACL based authentication, which requires
    /// Redis version >= 6 + ACL enabled
    username: Option<Bytes>,
    password: Bytes,
}

impl AuthCommand {
    pub fn new<U, P>(username: Option<U>, password: P) -> Self
    where
        U: Into<Bytes>,
        P: Into<Bytes>,
    {
        AuthCommand {
            username: username.map(Into::into),
            password: password.into(),
        }
    }
}

impl Command for AuthCommand {
    type Response = ();

    fn encode(&self) -> CommandBuilder {
        CommandBuilder::new("AUTH")
            .arg_option(self.username.as_ref())
            .arg(&self.password)
    }

    fn eval_response(&self, value: RespValue) -> Result<Self::Response, ResponseTypeError> {
        OkProcessor.process(&value)
    }
}

impl From<&Credentials> for AuthCommand {
    fn from(credentials: &Credentials) -> AuthCommand {
        AuthCommand::new(credentials.username.clone(), credentials.password.clone())
    }
}
