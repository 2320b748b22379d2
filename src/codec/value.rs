use bytes::{BufMut, Bytes, BytesMut};

/// A decoded RESP2/RESP3 value
///
/// Null markers keep the shape they were sent with: `$-1` becomes `BulkString(None)`,
/// `*-1` becomes `Array(None)` and the RESP3 `_` becomes `Null`. [RespValue::is_null] treats all
/// of them alike, while processors that care about the difference can still see it.
///
/// Streamed aggregates (`*?`, `%?`, `~?`) and streamed strings (`$?`) are decoded to the same
/// variants as their fixed-length counterparts.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// RESP3 null: `_\r\n`
    Null,
    /// `+OK\r\n`
    SimpleString(Bytes),
    /// `-ERR message\r\n`
    Error(Bytes),
    /// `:1000\r\n`
    Integer(i64),
    /// `,3.14\r\n`
    Double(f64),
    /// `#t\r\n`
    Boolean(bool),
    /// `(3492890328409238509324850943850943825024385\r\n`, kept as decimal text
    BigNumber(Bytes),
    /// `$6\r\nfoobar\r\n`, `None` for `$-1\r\n`
    BulkString(Option<Bytes>),
    /// `!21\r\nSYNTAX invalid syntax\r\n`
    BulkError(Bytes),
    /// `=15\r\ntxt:Some string\r\n`
    VerbatimString { format: [u8; 3], data: Bytes },
    /// `*2\r\n...`, `None` for `*-1\r\n`
    Array(Option<Vec<RespValue>>),
    /// `%2\r\n...`
    Map(Vec<(RespValue, RespValue)>),
    /// `~2\r\n...`
    Set(Vec<RespValue>),
    /// `>3\r\n...`, out-of-band server message
    Push(Vec<RespValue>),
    /// `|1\r\n...` metadata preceding `value`. Only produced when the decoder keeps attributes.
    Attribute {
        attributes: Vec<(RespValue, RespValue)>,
        value: Box<RespValue>,
    },
}

impl RespValue {
    /// Creates a bulk string value
    pub fn bulk<B: Into<Bytes>>(data: B) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// Creates a simple string value
    pub fn simple<B: Into<Bytes>>(data: B) -> Self {
        RespValue::SimpleString(data.into())
    }

    /// Creates an error value
    pub fn error<B: Into<Bytes>>(message: B) -> Self {
        RespValue::Error(message.into())
    }

    /// Creates a non-null array
    pub fn array(elements: Vec<RespValue>) -> Self {
        RespValue::Array(Some(elements))
    }

    /// Returns the value behind any attribute prefixes
    pub fn skip_attributes(&self) -> &RespValue {
        let mut value = self;
        while let RespValue::Attribute { value: inner, .. } = value {
            value = inner;
        }
        value
    }

    /// Owned variant of [RespValue::skip_attributes]
    pub fn into_unattributed(self) -> RespValue {
        let mut value = self;
        while let RespValue::Attribute { value: inner, .. } = value {
            value = *inner;
        }
        value
    }

    /// True for `_`, `$-1` and `*-1`
    pub fn is_null(&self) -> bool {
        matches!(
            self.skip_attributes(),
            RespValue::Null | RespValue::BulkString(None) | RespValue::Array(None)
        )
    }

    /// True for simple and bulk errors
    pub fn is_error(&self) -> bool {
        matches!(self.skip_attributes(), RespValue::Error(_) | RespValue::BulkError(_))
    }

    /// Message of simple or bulk errors
    pub fn error_message(&self) -> Option<String> {
        match self.skip_attributes() {
            RespValue::Error(data) | RespValue::BulkError(data) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        }
    }

    /// Bytes of string-like values (simple, bulk, verbatim)
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self.skip_attributes() {
            RespValue::SimpleString(data) => Some(data),
            RespValue::BulkString(Some(data)) => Some(data),
            RespValue::VerbatimString { data, .. } => Some(data),
            _ => None,
        }
    }

    /// UTF-8 view of string-like values
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()?).ok()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.skip_attributes() {
            RespValue::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.skip_attributes() {
            RespValue::Double(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.skip_attributes() {
            RespValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Elements of arrays, sets and push messages
    pub fn as_elements(&self) -> Option<&[RespValue]> {
        match self.skip_attributes() {
            RespValue::Array(Some(elements)) | RespValue::Set(elements) | RespValue::Push(elements) => {
                Some(elements)
            }
            _ => None,
        }
    }

    /// Key/value pairs of maps
    pub fn as_pairs(&self) -> Option<&[(RespValue, RespValue)]> {
        match self.skip_attributes() {
            RespValue::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Short type name, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::Null => "null",
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::Double(_) => "double",
            RespValue::Boolean(_) => "boolean",
            RespValue::BigNumber(_) => "big number",
            RespValue::BulkString(None) => "null bulk string",
            RespValue::BulkString(Some(_)) => "bulk string",
            RespValue::BulkError(_) => "bulk error",
            RespValue::VerbatimString { .. } => "verbatim string",
            RespValue::Array(None) => "null array",
            RespValue::Array(Some(_)) => "array",
            RespValue::Map(_) => "map",
            RespValue::Set(_) => "set",
            RespValue::Push(_) => "push",
            RespValue::Attribute { .. } => "attribute",
        }
    }

    /// Encodes the value in RESP wire format
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            RespValue::Null => buf.put_slice(b"_\r\n"),
            RespValue::SimpleString(data) => encode_line(buf, b'+', data),
            RespValue::Error(data) => encode_line(buf, b'-', data),
            RespValue::Integer(number) => encode_line(buf, b':', number.to_string().as_bytes()),
            RespValue::Double(number) => encode_line(buf, b',', format_resp3_double(*number).as_bytes()),
            RespValue::Boolean(flag) => buf.put_slice(if *flag { b"#t\r\n" } else { b"#f\r\n" }),
            RespValue::BigNumber(data) => encode_line(buf, b'(', data),
            RespValue::BulkString(None) => buf.put_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => encode_blob(buf, b'$', data),
            RespValue::BulkError(data) => encode_blob(buf, b'!', data),
            RespValue::VerbatimString { format, data } => {
                encode_line(buf, b'=', (data.len() + 4).to_string().as_bytes());
                buf.put_slice(format);
                buf.put_u8(b':');
                buf.put_slice(data);
                buf.put_slice(b"\r\n");
            }
            RespValue::Array(None) => buf.put_slice(b"*-1\r\n"),
            RespValue::Array(Some(elements)) => encode_aggregate(buf, b'*', elements),
            RespValue::Set(elements) => encode_aggregate(buf, b'~', elements),
            RespValue::Push(elements) => encode_aggregate(buf, b'>', elements),
            RespValue::Map(pairs) => encode_pairs(buf, b'%', pairs),
            RespValue::Attribute { attributes, value } => {
                encode_pairs(buf, b'|', attributes);
                value.encode(buf);
            }
        }
    }

    /// Encodes the value to a new buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

impl From<&'static str> for RespValue {
    fn from(data: &'static str) -> Self {
        RespValue::bulk(Bytes::from_static(data.as_bytes()))
    }
}

impl From<i64> for RespValue {
    fn from(number: i64) -> Self {
        RespValue::Integer(number)
    }
}

fn encode_line(buf: &mut BytesMut, prefix: u8, data: &[u8]) {
    buf.put_u8(prefix);
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

fn encode_blob(buf: &mut BytesMut, prefix: u8, data: &[u8]) {
    encode_line(buf, prefix, data.len().to_string().as_bytes());
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

fn encode_aggregate(buf: &mut BytesMut, prefix: u8, elements: &[RespValue]) {
    encode_line(buf, prefix, elements.len().to_string().as_bytes());
    for element in elements {
        element.encode(buf);
    }
}

fn encode_pairs(buf: &mut BytesMut, prefix: u8, pairs: &[(RespValue, RespValue)]) {
    encode_line(buf, prefix, pairs.len().to_string().as_bytes());
    for (key, value) in pairs {
        key.encode(buf);
        value.encode(buf);
    }
}

/// RESP3 double notation (`inf`, `-inf`, `nan`)
fn format_resp3_double(number: f64) -> String {
    if number.is_nan() {
        return "nan".into();
    }

    if number.is_infinite() {
        return if number.is_sign_positive() { "inf".into() } else { "-inf".into() };
    }

    format!("{:?}", number)
}
