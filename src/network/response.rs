use crate::codec::{DecodeOptions, Decoder, ProtocolError, RespValue, SegmentedBuffer};
use crate::network::error::CommandErrors;
use bytes::Bytes;

/// Buffer for unparsed/incomplete received data
///
/// Received chunks are kept as they are, values are decoded across chunk borders.
pub(crate) struct ResponseBuffer {
    decoder: Decoder,

    /// Unparsed data
    buffer: SegmentedBuffer,

    /// Received unknown message prefix or otherwise broken stream
    faulty: Option<ProtocolError>,
}

impl ResponseBuffer {
    pub fn new(options: DecodeOptions) -> ResponseBuffer {
        Self {
            decoder: Decoder::new(options),
            buffer: SegmentedBuffer::new(),
            faulty: None,
        }
    }

    /// Appends received data
    pub fn append(&mut self, chunk: Bytes) {
        self.buffer.push(chunk);
    }

    /// Takes the next complete value, if any
    ///
    /// If a protocol violation was detected, the same error is returned on every later call.
    /// Since the cause (e.g. Redis bug, network fault, etc.) is unclear, this is a fatal problem.
    pub fn next(&mut self) -> Result<Option<RespValue>, ProtocolError> {
        if let Some(error) = &self.faulty {
            return Err(error.clone());
        }

        match self.decoder.decode(&self.buffer) {
            Ok(Some((value, length))) => {
                self.buffer.advance(length);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                self.faulty = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty.is_some()
    }

    /// Number of buffered but not yet decoded bytes
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Resets the buffer in case of fatal error or reconnect
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.faulty = None;
    }
}

/// Wraps error responses to CommandErrors
pub(crate) fn assert_error(value: &RespValue) -> Result<(), CommandErrors> {
    match value.error_message() {
        Some(message) => Err(CommandErrors::ErrorResponse(message)),
        None => Ok(()),
    }
}
