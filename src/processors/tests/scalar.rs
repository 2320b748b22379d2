use crate::codec::{DecodeOptions, Decoder, RespValue};
use crate::processors::tests::{parse, with_attribute};
use crate::processors::{
    BooleanProcessor, BytesProcessor, DoubleProcessor, IntegerProcessor, NullableBytesProcessor,
    NullableDoubleProcessor, NullableIntegerProcessor, NullableStringProcessor, OkProcessor, ResultProcessor,
    ValueProcessor,
};
use bytes::Bytes;

#[test]
fn test_ok() {
    assert!(OkProcessor.process(&parse(b"+OK\r\n")).is_ok());
    assert!(OkProcessor.process(&parse(b"$2\r\nOK\r\n")).is_ok());

    let error = OkProcessor.process(&parse(b"+QUEUED\r\n")).unwrap_err();
    assert_eq!("OK", error.expected);
    assert_eq!("simple string", error.received);
}

#[test]
fn test_integer() {
    assert_eq!(12, IntegerProcessor.process(&parse(b":12\r\n")).unwrap());
    assert_eq!(-3, IntegerProcessor.process(&parse(b"$2\r\n-3\r\n")).unwrap());
    assert!(IntegerProcessor.process(&parse(b"$3\r\nabc\r\n")).is_err());
    assert!(IntegerProcessor.process(&parse(b"_\r\n")).is_err());
    assert!(IntegerProcessor.process(&parse(b"*1\r\n:1\r\n")).is_err());
}

#[test]
fn test_nullable_integer() {
    assert_eq!(None, NullableIntegerProcessor.process(&parse(b"_\r\n")).unwrap());
    assert_eq!(None, NullableIntegerProcessor.process(&parse(b"$-1\r\n")).unwrap());
    assert_eq!(Some(7), NullableIntegerProcessor.process(&parse(b":7\r\n")).unwrap());
}

#[test]
fn test_boolean() {
    assert!(BooleanProcessor.process(&parse(b"#t\r\n")).unwrap());
    assert!(!BooleanProcessor.process(&parse(b"#f\r\n")).unwrap());
    assert!(BooleanProcessor.process(&parse(b":1\r\n")).unwrap());
    assert!(!BooleanProcessor.process(&parse(b":0\r\n")).unwrap());
    assert!(BooleanProcessor.process(&parse(b"+OK\r\n")).is_err());
}

#[test]
fn test_double() {
    assert_eq!(1.5, DoubleProcessor.process(&parse(b",1.5\r\n")).unwrap());
    assert_eq!(2.0, DoubleProcessor.process(&parse(b":2\r\n")).unwrap());
    assert_eq!(0.25, DoubleProcessor.process(&parse(b"$4\r\n0.25\r\n")).unwrap());
    assert_eq!(f64::INFINITY, DoubleProcessor.process(&parse(b"$3\r\ninf\r\n")).unwrap());
    assert_eq!(f64::NEG_INFINITY, DoubleProcessor.process(&parse(b"$4\r\n-inf\r\n")).unwrap());
    assert!(DoubleProcessor.process(&parse(b"$1\r\nx\r\n")).is_err());
}

#[test]
fn test_nullable_double() {
    assert_eq!(None, NullableDoubleProcessor.process(&parse(b"_\r\n")).unwrap());
    assert_eq!(Some(3.0), NullableDoubleProcessor.process(&parse(b",3\r\n")).unwrap());
}

#[test]
fn test_bytes() {
    assert_eq!(Bytes::from_static(b"abc"), BytesProcessor.process(&parse(b"$3\r\nabc\r\n")).unwrap());
    assert_eq!(Bytes::from_static(b"abc"), BytesProcessor.process(&parse(b"+abc\r\n")).unwrap());
    assert_eq!(
        Bytes::from_static(b"abc"),
        BytesProcessor.process(&parse(b"=7\r\ntxt:abc\r\n")).unwrap()
    );
    assert!(BytesProcessor.process(&parse(b"$-1\r\n")).is_err());
}

#[test]
fn test_nullable_bytes_null_variants() {
    for data in [&b"$-1\r\n"[..], b"_\r\n", b"*-1\r\n"] {
        assert_eq!(None, NullableBytesProcessor.process(&parse(data)).unwrap());
    }
}

#[test]
fn test_nullable_string_invalid_utf8() {
    assert!(NullableStringProcessor.process(&parse(b"$2\r\n\xff\xfe\r\n")).is_err());
    assert_eq!(
        Some("ok".to_string()),
        NullableStringProcessor.process(&parse(b"$2\r\nok\r\n")).unwrap()
    );
}

#[test]
fn test_attribute_transparency() {
    let cases = [&b"+OK\r\n"[..], b":12\r\n", b",1.5\r\n", b"$3\r\nabc\r\n", b"_\r\n"];

    for data in cases {
        let plain = parse(data);
        let attributed = parse(&with_attribute(data));

        assert_eq!(
            IntegerProcessor.process(&plain).ok(),
            IntegerProcessor.process(&attributed).ok()
        );
        assert_eq!(
            NullableBytesProcessor.process(&plain).ok(),
            NullableBytesProcessor.process(&attributed).ok()
        );
        assert_eq!(OkProcessor.process(&plain).ok(), OkProcessor.process(&attributed).ok());
        assert_eq!(
            NullableDoubleProcessor.process(&plain).ok(),
            NullableDoubleProcessor.process(&attributed).ok()
        );
    }
}

#[test]
fn test_kept_attributes_are_stripped() {
    let decoder = Decoder::new(DecodeOptions {
        keep_attributes: true,
        ..DecodeOptions::default()
    });
    let (value, _) = decoder
        .decode_slice(b"*2\r\n|1\r\n+a\r\n+b\r\n:1\r\n:2\r\n")
        .unwrap()
        .unwrap();

    assert_eq!(
        RespValue::array(vec![RespValue::Integer(1), RespValue::Integer(2)]),
        ValueProcessor.process(&value).unwrap()
    );
    assert_eq!(Some(1), NullableIntegerProcessor.process(&value.as_elements().unwrap()[0]).unwrap());
}
