use crate::codec::error::ProtocolError;
use crate::codec::segments::{Cursor, SegmentedBuffer};
use crate::codec::value::RespValue;
use bytes::{BufMut, Bytes, BytesMut};

/// Default max. nesting depth of aggregates
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Upper bound for preallocated aggregate capacity
const MAX_PREALLOCATION: usize = 1024;

/// Returns `Ok(None)` from the enclosing parse function if the inner step is incomplete
macro_rules! ready {
    ($step:expr) => {
        match $step {
            Some(value) => value,
            None => return Ok(None),
        }
    };
}

type Parse<T> = Result<Option<T>, ProtocolError>;

/// Decoder settings
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Max. nesting depth of aggregates
    pub max_depth: usize,
    /// Keep attributes as [RespValue::Attribute] wrappers instead of dropping them
    pub keep_attributes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            keep_attributes: false,
        }
    }
}

/// Incremental RESP2/RESP3 decoder
///
/// Decodes exactly one top-level value from the front of a [SegmentedBuffer]. If the value is not
/// complete yet, `Ok(None)` is returned and nothing is consumed, so decoding can be retried from
/// the same position once more data has arrived.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: DecodeOptions,
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    /// Decodes the next value. Returns the value and the number of bytes it occupied.
    pub fn decode(&self, buffer: &SegmentedBuffer) -> Result<Option<(RespValue, usize)>, ProtocolError> {
        if buffer.is_empty() {
            return Ok(None);
        }

        let mut cursor = buffer.cursor();
        let value = ready!(self.parse_value(&mut cursor, 0)?);
        Ok(Some((value, cursor.position())))
    }

    /// Decodes all complete values and releases their bytes from the buffer
    pub fn decode_all(&self, buffer: &mut SegmentedBuffer) -> Result<Vec<RespValue>, ProtocolError> {
        let mut values = Vec::new();
        while let Some((value, consumed)) = self.decode(buffer)? {
            buffer.advance(consumed);
            values.push(value);
        }
        Ok(values)
    }

    /// Convenience for decoding a contiguous slice
    pub fn decode_slice(&self, data: &[u8]) -> Result<Option<(RespValue, usize)>, ProtocolError> {
        let mut buffer = SegmentedBuffer::new();
        buffer.push(Bytes::copy_from_slice(data));
        self.decode(&buffer)
    }

    fn parse_value(&self, cursor: &mut Cursor<'_>, depth: usize) -> Parse<RespValue> {
        let prefix = ready!(cursor.next_byte());

        match prefix {
            b'+' => Ok(Some(RespValue::SimpleString(ready!(cursor.read_line())))),
            b'-' => Ok(Some(RespValue::Error(ready!(cursor.read_line())))),
            b':' => {
                let line = ready!(cursor.read_line());
                Ok(Some(RespValue::Integer(parse_integer(&line)?)))
            }
            b'$' => self.parse_bulk_string(cursor),
            b'!' => {
                let length = ready!(parse_blob_length(cursor)?);
                Ok(Some(RespValue::BulkError(ready!(read_blob(cursor, length)))))
            }
            b'=' => parse_verbatim(cursor),
            b'_' => {
                let _ = ready!(cursor.read_line());
                Ok(Some(RespValue::Null))
            }
            b'#' => {
                let line = ready!(cursor.read_line());
                match &line[..] {
                    b"t" => Ok(Some(RespValue::Boolean(true))),
                    b"f" => Ok(Some(RespValue::Boolean(false))),
                    _ => Err(ProtocolError::InvalidBoolean(lossy(&line))),
                }
            }
            b',' => {
                let line = ready!(cursor.read_line());
                Ok(Some(RespValue::Double(parse_double(&line)?)))
            }
            b'(' => {
                let line = ready!(cursor.read_line());
                validate_big_number(&line)?;
                Ok(Some(RespValue::BigNumber(line)))
            }
            b'*' => {
                let elements = ready!(self.parse_elements(cursor, depth)?);
                Ok(Some(RespValue::Array(elements)))
            }
            b'~' => {
                let elements = ready!(self.parse_elements(cursor, depth)?);
                Ok(Some(RespValue::Set(elements.unwrap_or_default())))
            }
            b'>' => {
                let elements = ready!(self.parse_elements(cursor, depth)?);
                Ok(Some(RespValue::Push(elements.unwrap_or_default())))
            }
            b'%' => {
                let pairs = ready!(self.parse_pairs(cursor, depth)?);
                Ok(Some(RespValue::Map(pairs)))
            }
            b'|' => {
                let attributes = ready!(self.parse_pairs(cursor, depth)?);
                let value = ready!(self.parse_value(cursor, depth)?);

                if self.options.keep_attributes {
                    return Ok(Some(RespValue::Attribute {
                        attributes,
                        value: Box::new(value),
                    }));
                }

                Ok(Some(value))
            }
            other => Err(ProtocolError::InvalidPrefix(other)),
        }
    }

    fn parse_bulk_string(&self, cursor: &mut Cursor<'_>) -> Parse<RespValue> {
        let line = ready!(cursor.read_line());
        if &line[..] == b"?" {
            return Ok(Some(RespValue::BulkString(Some(ready!(parse_streamed_string(cursor)?)))));
        }

        match parse_length(&line)? {
            None => Ok(Some(RespValue::BulkString(None))),
            Some(length) => Ok(Some(RespValue::BulkString(Some(ready!(read_blob(cursor, length)))))),
        }
    }

    /// Elements of `*`, `~` and `>`. `Ok(Some(None))` represents a null aggregate.
    fn parse_elements(&self, cursor: &mut Cursor<'_>, depth: usize) -> Parse<Option<Vec<RespValue>>> {
        let depth = self.enter(depth)?;
        let line = ready!(cursor.read_line());

        if &line[..] == b"?" {
            let mut elements = Vec::new();
            loop {
                if ready!(end_of_stream(cursor)) {
                    return Ok(Some(Some(elements)));
                }
                elements.push(ready!(self.parse_value(cursor, depth)?));
            }
        }

        let count = match parse_length(&line)? {
            None => return Ok(Some(None)),
            Some(count) => count,
        };

        let mut elements = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for _ in 0..count {
            elements.push(ready!(self.parse_value(cursor, depth)?));
        }

        Ok(Some(Some(elements)))
    }

    /// Pairs of `%` and `|`
    fn parse_pairs(&self, cursor: &mut Cursor<'_>, depth: usize) -> Parse<Vec<(RespValue, RespValue)>> {
        let depth = self.enter(depth)?;
        let line = ready!(cursor.read_line());

        if &line[..] == b"?" {
            let mut pairs = Vec::new();
            loop {
                if ready!(end_of_stream(cursor)) {
                    return Ok(Some(pairs));
                }
                let key = ready!(self.parse_value(cursor, depth)?);
                let value = ready!(self.parse_value(cursor, depth)?);
                pairs.push((key, value));
            }
        }

        let count = parse_length(&line)?.unwrap_or(0);
        let mut pairs = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for _ in 0..count {
            let key = ready!(self.parse_value(cursor, depth)?);
            let value = ready!(self.parse_value(cursor, depth)?);
            pairs.push((key, value));
        }

        Ok(Some(pairs))
    }

    fn enter(&self, depth: usize) -> Result<usize, ProtocolError> {
        let depth = depth + 1;
        if depth > self.options.max_depth {
            return Err(ProtocolError::NestingTooDeep(self.options.max_depth));
        }
        Ok(depth)
    }
}

/// Checks for the `.\r\n` terminator of streamed aggregates and consumes it
fn end_of_stream(cursor: &mut Cursor<'_>) -> Option<bool> {
    if cursor.peek()? != b'.' {
        return Some(false);
    }

    let mut probe = cursor.clone();
    let _ = probe.next_byte();
    let _ = probe.read_line()?;
    *cursor = probe;
    Some(true)
}

/// Streamed string chunks: `;<len>\r\n<data>\r\n` ... `;0\r\n`
fn parse_streamed_string(cursor: &mut Cursor<'_>) -> Parse<Bytes> {
    let mut data = BytesMut::new();

    loop {
        let prefix = ready!(cursor.next_byte());
        if prefix != b';' {
            return Err(ProtocolError::InvalidStreamedString);
        }

        let line = ready!(cursor.read_line());
        let length = parse_length(&line)?.ok_or(ProtocolError::InvalidStreamedString)?;
        if length == 0 {
            return Ok(Some(data.freeze()));
        }

        data.put_slice(&ready!(read_blob(cursor, length)));
    }
}

fn parse_verbatim(cursor: &mut Cursor<'_>) -> Parse<RespValue> {
    let length = ready!(parse_blob_length(cursor)?);
    let blob = ready!(read_blob(cursor, length));

    if blob.len() < 4 || blob[3] != b':' {
        return Err(ProtocolError::InvalidVerbatimString);
    }

    Ok(Some(RespValue::VerbatimString {
        format: [blob[0], blob[1], blob[2]],
        data: blob.slice(4..),
    }))
}

fn parse_blob_length(cursor: &mut Cursor<'_>) -> Parse<usize> {
    let line = ready!(cursor.read_line());
    parse_length(&line)?
        .map(Some)
        .ok_or_else(|| ProtocolError::InvalidLength(lossy(&line)))
}

/// Reads blob data followed by CRLF. A wrong terminator is treated as missing data.
fn read_blob(cursor: &mut Cursor<'_>, length: usize) -> Option<Bytes> {
    let mut probe = cursor.clone();
    let data = probe.take(length)?;
    if !probe.expect_crlf()? {
        return None;
    }

    *cursor = probe;
    Some(data)
}

/// Parses a length prefix. `-1` is the null marker, other negative values are invalid.
fn parse_length(line: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let length = core::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| ProtocolError::InvalidLength(lossy(line)))?;

    match length {
        -1 => Ok(None),
        length if length < 0 => Err(ProtocolError::InvalidLength(lossy(line))),
        length => usize::try_from(length)
            .map(Some)
            .map_err(|_| ProtocolError::InvalidLength(lossy(line))),
    }
}

fn parse_integer(line: &[u8]) -> Result<i64, ProtocolError> {
    core::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| ProtocolError::InvalidInteger(lossy(line)))
}

fn parse_double(line: &[u8]) -> Result<f64, ProtocolError> {
    let text = core::str::from_utf8(line).map_err(|_| ProtocolError::InvalidDouble(lossy(line)))?;

    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        "nan" | "-nan" => Ok(f64::NAN),
        _ => text.parse::<f64>().map_err(|_| ProtocolError::InvalidDouble(lossy(line))),
    }
}

fn validate_big_number(line: &[u8]) -> Result<(), ProtocolError> {
    let digits = line.strip_prefix(b"-").unwrap_or(line);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::InvalidInteger(lossy(line)));
    }
    Ok(())
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
