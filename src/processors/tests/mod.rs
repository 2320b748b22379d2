#[cfg(test)]
mod scalar;

use crate::codec::{DecodeOptions, Decoder, RespValue};

/// Decodes a single complete value, attributes are handed to the processors
pub(crate) fn parse(data: &[u8]) -> RespValue {
    let decoder = Decoder::new(DecodeOptions {
        keep_attributes: true,
        ..DecodeOptions::default()
    });
    let (value, consumed) = decoder.decode_slice(data).unwrap().unwrap();
    assert_eq!(data.len(), consumed);
    value
}

/// Same bytes with a leading attribute `|1 foo bar`
pub(crate) fn with_attribute(data: &[u8]) -> Vec<u8> {
    let mut prefixed = b"|1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n".to_vec();
    prefixed.extend_from_slice(data);
    prefixed
}

#[test]
fn test_parse_keeps_attributes() {
    assert!(matches!(
        parse(&with_attribute(b":1\r\n")),
        RespValue::Attribute { .. }
    ));
}
