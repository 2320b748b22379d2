use crate::codec::ProtocolError;
use crate::commands::ResponseTypeError;
use crate::network::timeout::TimeoutError;
use core::fmt::{Display, Formatter};
use embedded_nal::{SocketAddr, TcpErrorKind};

/// Category of a connection failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionFailureType {
    /// Low level socket error
    SocketFailure,
    /// The peer closed the connection
    SocketClosed,
    /// AUTH was rejected
    AuthenticationFailure,
    /// Socket allocation, TCP connect or handshake did not succeed in time
    UnableToConnect,
    /// Unparsable data received or protocol switch rejected
    ProtocolFailure,
    /// Heartbeat was not answered within its window
    HeartbeatFailure,
    /// Failure caused by the client itself, e.g. a forced or simulated reconnect
    InternalFailure,
}

impl ConnectionFailureType {
    /// Category of a TCP error reported by the network stack
    pub fn from_tcp(kind: TcpErrorKind) -> Self {
        match kind {
            TcpErrorKind::PipeClosed => ConnectionFailureType::SocketClosed,
            _ => ConnectionFailureType::SocketFailure,
        }
    }
}

impl Display for ConnectionFailureType {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ConnectionFailureType::SocketFailure => "SocketFailure",
            ConnectionFailureType::SocketClosed => "SocketClosed",
            ConnectionFailureType::AuthenticationFailure => "AuthenticationFailure",
            ConnectionFailureType::UnableToConnect => "UnableToConnect",
            ConnectionFailureType::ProtocolFailure => "ProtocolFailure",
            ConnectionFailureType::HeartbeatFailure => "HeartbeatFailure",
            ConnectionFailureType::InternalFailure => "InternalFailure",
        };
        f.write_str(name)
    }
}

/// Context attached to timed out commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutDiagnostics {
    /// Upper-case command name
    pub command: String,
    /// Endpoint the command was sent to, None if it never left the backlog
    pub endpoint: Option<SocketAddr>,
    /// Size of the transmitted frame in bytes
    pub sent_bytes: usize,
    /// Time between submission and expiry
    pub elapsed_micros: u64,
    /// Microseconds since the connection last received data
    pub last_read_micros: Option<u64>,
    /// Microseconds since the connection last wrote data
    pub last_write_micros: Option<u64>,
    /// Commands still waiting on the same connection
    pub pending: usize,
}

impl Display for TimeoutDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "Timeout performing {} ({} bytes)", self.command, self.sent_bytes)?;
        match self.endpoint {
            Some(endpoint) => write!(f, " on {}", endpoint)?,
            None => write!(f, " in backlog")?,
        }
        write!(f, " after {}us", self.elapsed_micros)?;
        if let Some(read) = self.last_read_micros {
            write!(f, ", last read {}us ago", read)?;
        }
        if let Some(write) = self.last_write_micros {
            write!(f, ", last write {}us ago", write)?;
        }
        write!(f, ", {} pending", self.pending)
    }
}

/// Error handling for command execution
#[derive(Debug, Clone, PartialEq)]
pub enum CommandErrors {
    /// No response within expected time frame. The connection stays intact, a late response is discarded.
    Timeout(TimeoutDiagnostics),
    /// Cancelled by the caller before a response arrived
    Cancelled,
    /// Connection carrying the command failed
    ConnectionFailure {
        failure: ConnectionFailureType,
        endpoint: SocketAddr,
        message: String,
    },
    /// Received an invalid response violating the RESP protocol. The connection gets reset.
    ProtocolViolation(ProtocolError),
    /// Received an unexpected response incompatible with the command specification
    CommandResponseViolation(ResponseTypeError),
    /// Redis error response. Inner value is the error message received.
    ErrorResponse(String),
    /// No endpoint eligible for the command is known or reachable
    NoConnectionAvailable(String),
    /// Backlog of the target endpoint is full
    BacklogFull,
    /// Command requires admin mode. Inner value is the command name.
    AdminModeNotEnabled(String),
    /// Command is disabled by configuration. Inner value is the command name.
    CommandDisabled(String),
    /// Command was redirected (MOVED/ASK) too often
    TooManyRedirects,
    /// Upstream timer/clock failure
    TimerError,
    /// Result was already taken or the multiplexer is gone
    InvalidFuture,
}

impl Display for CommandErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandErrors::Timeout(diagnostics) => write!(f, "{}", diagnostics),
            CommandErrors::Cancelled => write!(f, "command cancelled"),
            CommandErrors::ConnectionFailure {
                failure,
                endpoint,
                message,
            } => write!(f, "{} on {}: {}", failure, endpoint, message),
            CommandErrors::ProtocolViolation(error) => write!(f, "protocol violation: {}", error),
            CommandErrors::CommandResponseViolation(error) => write!(f, "unexpected response: {}", error),
            CommandErrors::ErrorResponse(message) => write!(f, "error response: {}", message),
            CommandErrors::NoConnectionAvailable(reason) => write!(f, "no connection available: {}", reason),
            CommandErrors::BacklogFull => write!(f, "backlog full"),
            CommandErrors::AdminModeNotEnabled(command) => {
                write!(f, "command {} requires admin mode", command)
            }
            CommandErrors::CommandDisabled(command) => write!(f, "command {} is disabled", command),
            CommandErrors::TooManyRedirects => write!(f, "too many redirects"),
            CommandErrors::TimerError => write!(f, "timer error"),
            CommandErrors::InvalidFuture => write!(f, "future is no longer valid"),
        }
    }
}

impl std::error::Error for CommandErrors {}

impl From<TimeoutError> for CommandErrors {
    fn from(_: TimeoutError) -> Self {
        CommandErrors::TimerError
    }
}

impl From<ResponseTypeError> for CommandErrors {
    fn from(error: ResponseTypeError) -> Self {
        CommandErrors::CommandResponseViolation(error)
    }
}

impl From<ProtocolError> for CommandErrors {
    fn from(error: ProtocolError) -> Self {
        CommandErrors::ProtocolViolation(error)
    }
}
