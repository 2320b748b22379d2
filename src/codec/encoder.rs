use bytes::{BufMut, Bytes, BytesMut};

/// Command argument in its wire representation
///
/// Integers are formatted as decimal text, doubles with the shortest round-trip notation and
/// the sentinels `+inf`, `-inf` and `NaN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandArg(Bytes);

impl CommandArg {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Number of bytes this argument occupies on the wire (`$<len>\r\n<data>\r\n`)
    pub fn encoded_len(&self) -> usize {
        1 + decimal_len(self.0.len()) + 2 + self.0.len() + 2
    }
}

impl From<Bytes> for CommandArg {
    fn from(data: Bytes) -> Self {
        CommandArg(data)
    }
}

impl From<&Bytes> for CommandArg {
    fn from(data: &Bytes) -> Self {
        CommandArg(data.clone())
    }
}

impl From<&'static str> for CommandArg {
    fn from(data: &'static str) -> Self {
        CommandArg(Bytes::from_static(data.as_bytes()))
    }
}

impl From<String> for CommandArg {
    fn from(data: String) -> Self {
        CommandArg(Bytes::from(data))
    }
}

impl From<Vec<u8>> for CommandArg {
    fn from(data: Vec<u8>) -> Self {
        CommandArg(Bytes::from(data))
    }
}

impl From<&[u8]> for CommandArg {
    fn from(data: &[u8]) -> Self {
        CommandArg(Bytes::copy_from_slice(data))
    }
}

impl From<i64> for CommandArg {
    fn from(number: i64) -> Self {
        CommandArg(Bytes::from(number.to_string()))
    }
}

impl From<u64> for CommandArg {
    fn from(number: u64) -> Self {
        CommandArg(Bytes::from(number.to_string()))
    }
}

impl From<usize> for CommandArg {
    fn from(number: usize) -> Self {
        CommandArg(Bytes::from(number.to_string()))
    }
}

impl From<f64> for CommandArg {
    fn from(number: f64) -> Self {
        CommandArg(Bytes::from(format_double(number)))
    }
}

/// Formats a double for use as command argument
pub fn format_double(number: f64) -> String {
    if number.is_nan() {
        return "NaN".into();
    }

    if number.is_infinite() {
        return if number.is_sign_positive() { "+inf".into() } else { "-inf".into() };
    }

    // Integral values below 2^53 are exact, so they are written without fraction
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        return format!("{}", number as i64);
    }

    format!("{:?}", number)
}

/// Upper bound of the encoded size of a command
pub fn estimate_len(name: &str, args: &[CommandArg]) -> usize {
    let name_len = 1 + decimal_len(name.len()) + 2 + name.len() + 2;
    let header_len = 1 + decimal_len(args.len() + 1) + 2;
    header_len + name_len + args.iter().map(CommandArg::encoded_len).sum::<usize>()
}

/// Encodes a command as RESP array of bulk strings. The command name is written in lower case.
pub fn encode_command(buf: &mut BytesMut, name: &str, args: &[CommandArg]) -> usize {
    let mut writer = FrameWriter::new(buf, estimate_len(name, args));
    writer.write_header(args.len() + 1);
    writer.write_bulk(name.to_ascii_lowercase().as_bytes());
    for arg in args {
        writer.write_bulk(arg.as_bytes());
    }
    writer.finish()
}

/// Writes a frame directly into a caller supplied buffer
///
/// The caller announces an upper bound of the frame size upfront, which is reserved at once.
/// Exceeding the estimate is a bug of the caller: debug builds panic, release builds just
/// grow the buffer and log a warning.
pub struct FrameWriter<'a> {
    buf: &'a mut BytesMut,
    start: usize,
    estimate: usize,
}

impl<'a> FrameWriter<'a> {
    pub fn new(buf: &'a mut BytesMut, estimate: usize) -> Self {
        buf.reserve(estimate);
        let start = buf.len();
        Self { buf, start, estimate }
    }

    /// Writes the `*<argc>\r\n` array header
    pub fn write_header(&mut self, argc: usize) {
        self.buf.put_u8(b'*');
        self.put_decimal(argc);
        self.buf.put_slice(b"\r\n");
    }

    /// Writes one `$<len>\r\n<data>\r\n` argument
    pub fn write_bulk(&mut self, data: &[u8]) {
        self.buf.put_u8(b'$');
        self.put_decimal(data.len());
        self.buf.put_slice(b"\r\n");
        self.buf.put_slice(data);
        self.buf.put_slice(b"\r\n");
    }

    pub fn write_arg(&mut self, arg: &CommandArg) {
        self.write_bulk(arg.as_bytes());
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Completes the frame and returns its size
    pub fn finish(self) -> usize {
        let written = self.written();
        debug_assert!(
            written <= self.estimate,
            "frame size {} exceeds estimate {}",
            written,
            self.estimate
        );

        if written > self.estimate {
            log::warn!("Frame size {} exceeded estimate {}", written, self.estimate);
        }

        written
    }

    fn put_decimal(&mut self, number: usize) {
        let mut digits = [0u8; 20];
        let mut position = digits.len();
        let mut rest = number;

        loop {
            position -= 1;
            digits[position] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }

        self.buf.put_slice(&digits[position..]);
    }
}

fn decimal_len(mut number: usize) -> usize {
    let mut digits = 1;
    while number >= 10 {
        number /= 10;
        digits += 1;
    }
    digits
}
