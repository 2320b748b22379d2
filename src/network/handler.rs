use crate::codec::DEFAULT_BLOCK_SIZE;
use crate::network::error::{CommandErrors, ConnectionFailureType};
use crate::network::protocol::Protocol;
use core::fmt::{Debug, Display, Formatter};
use embedded_time::duration::Extensions;
use embedded_time::duration::Microseconds;

/// Error handling for connection management
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Unable to get a socket from network layer
    TcpSocketError,

    /// TCP Connect failed
    TcpConnectionFailed,

    /// TCP connect or handshake did not complete in time
    ConnectTimeout,

    /// Authentication failed with the given sub error
    AuthenticationError(CommandErrors),

    /// Protocol switch (switch to RESP3) failed with the given sub error
    ProtocolSwitchError(CommandErrors),

    /// None of the configured endpoints could be connected
    NoServerReachable,
}

impl ConnectionError {
    /// Failure category reported to pending commands and event listeners
    pub fn failure_type(&self) -> ConnectionFailureType {
        match self {
            ConnectionError::TcpSocketError
            | ConnectionError::TcpConnectionFailed
            | ConnectionError::ConnectTimeout
            | ConnectionError::NoServerReachable => ConnectionFailureType::UnableToConnect,
            ConnectionError::AuthenticationError(_) => ConnectionFailureType::AuthenticationFailure,
            ConnectionError::ProtocolSwitchError(_) => ConnectionFailureType::ProtocolFailure,
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionError::TcpSocketError => write!(f, "unable to allocate socket"),
            ConnectionError::TcpConnectionFailed => write!(f, "TCP connect failed"),
            ConnectionError::ConnectTimeout => write!(f, "connect timeout"),
            ConnectionError::AuthenticationError(error) => write!(f, "authentication failed: {}", error),
            ConnectionError::ProtocolSwitchError(error) => write!(f, "protocol switch failed: {}", error),
            ConnectionError::NoServerReachable => write!(f, "no server reachable"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub(crate) username: Option<String>,
    pub(crate) password: String,
}

impl Credentials {
    /// Uses ACL based authentication
    /// Required Redis version >= 6 + ACL enabled
    pub fn acl(username: &str, password: &str) -> Self {
        Credentials {
            username: Some(username.to_string()),
            password: password.to_string(),
        }
    }

    /// Uses password-only authentication.
    /// This form just authenticates against the password set with requirepass (Redis server conf)
    pub fn password_only(password: &str) -> Self {
        Self {
            username: None,
            password: password.to_string(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Settings of a single physical connection
///
/// Every timer is disabled by a zero duration.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub(crate) protocol: Protocol,

    /// Authentication credentials. None in case of no authentication.
    pub(crate) credentials: Option<Credentials>,

    /// Sent as CLIENT SETNAME during the handshake
    pub(crate) client_name: Option<String>,

    /// Max. duration waiting for Redis responses
    pub(crate) response_timeout: Microseconds,

    /// Max. duration of TCP connect + handshake
    pub(crate) connect_timeout: Microseconds,

    /// Interval of keep-alive PINGs
    pub(crate) heartbeat_interval: Microseconds,

    /// Max. duration waiting for the heartbeat reply
    pub(crate) heartbeat_timeout: Microseconds,

    /// Bytes read from the socket at once
    pub(crate) chunk_size: usize,
}

impl ConnectionOptions {
    /// Options using RESP2 protocol
    pub fn resp2() -> Self {
        Self::new(Protocol::Resp2)
    }

    /// Options using RESP3 protocol
    pub fn resp3() -> Self {
        Self::new(Protocol::Resp3)
    }

    fn new(protocol: Protocol) -> Self {
        ConnectionOptions {
            protocol,
            credentials: None,
            client_name: None,
            response_timeout: 5_000_000.microseconds(),
            connect_timeout: 5_000_000.microseconds(),
            heartbeat_interval: 1_000_000.microseconds(),
            heartbeat_timeout: 5_000_000.microseconds(),
            chunk_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Sets the max. duration waiting for Redis responses
    pub fn timeout(&mut self, timeout: Microseconds) -> &mut Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the max. duration of TCP connect and handshake
    pub fn connect_timeout(&mut self, timeout: Microseconds) -> &mut Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets heartbeat interval and the window its reply is expected in
    pub fn heartbeat(&mut self, interval: Microseconds, timeout: Microseconds) -> &mut Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    /// Sets the authentication credentials
    pub fn auth(&mut self, credentials: Credentials) -> &mut Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the name announced by CLIENT SETNAME
    pub fn client_name(&mut self, name: &str) -> &mut Self {
        self.client_name = Some(name.to_string());
        self
    }

    /// Sets the number of bytes read from the socket at once
    pub fn chunk_size(&mut self, size: usize) -> &mut Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn response_timeout(&self) -> Microseconds {
        self.response_timeout
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::resp2()
    }
}
