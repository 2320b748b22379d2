use core::fmt::{Display, Formatter};

/// Fatal violation of the RESP protocol
///
/// Missing data is never an error, the decoder reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Unknown type prefix byte
    InvalidPrefix(u8),
    /// Length prefix is not a number or out of range
    InvalidLength(String),
    /// Integer or big number payload is not numeric
    InvalidInteger(String),
    /// Double payload is not a valid floating point number
    InvalidDouble(String),
    /// Boolean payload is neither `t` nor `f`
    InvalidBoolean(String),
    /// Verbatim string without `xxx:` format header
    InvalidVerbatimString,
    /// Chunk header of a streamed string is malformed
    InvalidStreamedString,
    /// Aggregates are nested deeper than the configured limit
    NestingTooDeep(usize),
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::InvalidPrefix(byte) => write!(f, "invalid type prefix {:#04x}", byte),
            ProtocolError::InvalidLength(text) => write!(f, "invalid length prefix '{}'", text),
            ProtocolError::InvalidInteger(text) => write!(f, "invalid integer '{}'", text),
            ProtocolError::InvalidDouble(text) => write!(f, "invalid double '{}'", text),
            ProtocolError::InvalidBoolean(text) => write!(f, "invalid boolean '{}'", text),
            ProtocolError::InvalidVerbatimString => write!(f, "verbatim string without format header"),
            ProtocolError::InvalidStreamedString => write!(f, "malformed streamed string chunk"),
            ProtocolError::NestingTooDeep(depth) => write!(f, "aggregate nesting exceeds depth {}", depth),
        }
    }
}

impl std::error::Error for ProtocolError {}
