use crate::codec::encoder::{encode_command, CommandArg};
use bytes::BytesMut;
use core::fmt::{Debug, Display, Formatter};

/// Headroom reserved in front of each frame, fits `ASKING` or `SELECT <db>`
pub const DEFAULT_PREAMBLE_HEADROOM: usize = 32;

/// Errors attaching a preamble
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreambleError {
    /// Preamble does not fit in the reserved headroom
    TooLarge { length: usize, headroom: usize },
    /// Frame already carries a preamble
    AlreadyAttached,
    /// Preamble without any bytes
    Empty,
}

impl Display for PreambleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PreambleError::TooLarge { length, headroom } => {
                write!(f, "preamble of {} bytes exceeds headroom of {} bytes", length, headroom)
            }
            PreambleError::AlreadyAttached => write!(f, "frame already has a preamble"),
            PreambleError::Empty => write!(f, "preamble is empty"),
        }
    }
}

impl std::error::Error for PreambleError {}

/// Encoded command ready for transmission
///
/// The payload is encoded once, behind a reserved headroom. A preamble (one or more complete
/// commands, e.g. `ASKING`) can be written into the headroom right in front of the payload and
/// removed again later. Neither operation touches the payload bytes.
#[derive(Clone)]
pub struct CommandFrame {
    name: String,
    buf: BytesMut,
    headroom: usize,

    /// Start of the transmitted bytes inside `buf`
    head: usize,

    /// Number of replies the attached preamble produces
    preamble_replies: usize,
}

impl CommandFrame {
    pub fn new(name: &str, args: &[CommandArg]) -> Self {
        Self::with_headroom(name, args, DEFAULT_PREAMBLE_HEADROOM)
    }

    pub fn with_headroom(name: &str, args: &[CommandArg], headroom: usize) -> Self {
        let mut buf = BytesMut::new();
        buf.resize(headroom, 0);
        encode_command(&mut buf, name, args);

        Self {
            name: name.to_ascii_uppercase(),
            buf,
            headroom,
            head: headroom,
            preamble_replies: 0,
        }
    }

    /// Puts the given encoded command(s) in front of the payload.
    /// On error the frame stays unchanged.
    pub fn attach_preamble(&mut self, preamble: &[u8], replies: usize) -> Result<(), PreambleError> {
        if self.has_preamble() {
            return Err(PreambleError::AlreadyAttached);
        }

        if preamble.is_empty() {
            return Err(PreambleError::Empty);
        }

        if preamble.len() > self.headroom {
            return Err(PreambleError::TooLarge {
                length: preamble.len(),
                headroom: self.headroom,
            });
        }

        let head = self.headroom - preamble.len();
        self.buf[head..self.headroom].copy_from_slice(preamble);
        self.head = head;
        self.preamble_replies = replies;
        Ok(())
    }

    /// Removes an attached preamble. Returns false if there was none.
    pub fn detach_preamble(&mut self) -> bool {
        if !self.has_preamble() {
            return false;
        }

        self.head = self.headroom;
        self.preamble_replies = 0;
        true
    }

    pub fn has_preamble(&self) -> bool {
        self.head != self.headroom
    }

    /// Number of replies preceding the reply of the payload command
    pub fn preamble_replies(&self) -> usize {
        self.preamble_replies
    }

    /// Bytes to transmit: preamble (if any) + payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// Encoded command without preamble
    pub fn payload(&self) -> &[u8] {
        &self.buf[self.headroom..]
    }

    /// Upper-case command name, e.g. `GET`
    pub fn command_name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for CommandFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandFrame")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("preamble_replies", &self.preamble_replies)
            .finish()
    }
}
