pub use decoder::{DecodeOptions, Decoder, DEFAULT_MAX_DEPTH};
pub use encoder::{encode_command, estimate_len, format_double, CommandArg, FrameWriter};
pub use error::ProtocolError;
pub use frame::{CommandFrame, PreambleError, DEFAULT_PREAMBLE_HEADROOM};
pub use segments::{Cursor, ReceiveArena, SegmentedBuffer, DEFAULT_BLOCK_SIZE};
pub use value::RespValue;

pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod error;
pub(crate) mod frame;
pub(crate) mod segments;
pub(crate) mod value;

#[cfg(test)]
mod tests;
