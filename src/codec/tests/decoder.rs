use crate::codec::tests::decode_fragmented;
use crate::codec::{DecodeOptions, Decoder, ProtocolError, RespValue, SegmentedBuffer};
use bytes::Bytes;

fn decode(data: &[u8]) -> RespValue {
    let (value, consumed) = Decoder::default().decode_slice(data).unwrap().unwrap();
    assert_eq!(data.len(), consumed);
    value
}

fn int_array(values: &[i64]) -> RespValue {
    RespValue::array(values.iter().map(|value| RespValue::Integer(*value)).collect())
}

#[test]
fn test_decode_empty_buffer() {
    assert!(Decoder::default().decode(&SegmentedBuffer::new()).unwrap().is_none());
}

#[test]
fn test_decode_simple_string() {
    assert_eq!(RespValue::simple("OK"), decode(b"+OK\r\n"));
}

#[test]
fn test_decode_error() {
    let value = decode(b"-ERR unknown command\r\n");
    assert!(value.is_error());
    assert_eq!("ERR unknown command", value.error_message().unwrap());
}

#[test]
fn test_decode_integer() {
    assert_eq!(RespValue::Integer(-42), decode(b":-42\r\n"));
}

#[test]
fn test_decode_bulk_string() {
    assert_eq!(RespValue::bulk("foobar"), decode(b"$6\r\nfoobar\r\n"));
}

#[test]
fn test_decode_empty_bulk_string() {
    assert_eq!(RespValue::bulk(""), decode(b"$0\r\n\r\n"));
}

#[test]
fn test_decode_binary_bulk_string() {
    assert_eq!(RespValue::bulk(&b"a\r\nb"[..]), decode(b"$4\r\na\r\nb\r\n"));
}

#[test]
fn test_decode_null_variants() {
    assert_eq!(RespValue::BulkString(None), decode(b"$-1\r\n"));
    assert_eq!(RespValue::Array(None), decode(b"*-1\r\n"));
    assert_eq!(RespValue::Null, decode(b"_\r\n"));

    assert!(decode(b"$-1\r\n").is_null());
    assert!(decode(b"*-1\r\n").is_null());
    assert!(decode(b"_\r\n").is_null());
}

#[test]
fn test_decode_resp3_scalars() {
    assert_eq!(RespValue::Boolean(true), decode(b"#t\r\n"));
    assert_eq!(RespValue::Boolean(false), decode(b"#f\r\n"));
    assert_eq!(RespValue::Double(3.25), decode(b",3.25\r\n"));
    assert_eq!(RespValue::Double(f64::INFINITY), decode(b",inf\r\n"));
    assert_eq!(RespValue::Double(f64::NEG_INFINITY), decode(b",-inf\r\n"));
    assert!(decode(b",nan\r\n").as_double().unwrap().is_nan());
    assert_eq!(
        RespValue::BigNumber(Bytes::from_static(b"3492890328409238509324850943850943825024385")),
        decode(b"(3492890328409238509324850943850943825024385\r\n")
    );
}

#[test]
fn test_decode_bulk_error() {
    let value = decode(b"!21\r\nSYNTAX invalid syntax\r\n");
    assert_eq!(RespValue::BulkError(Bytes::from_static(b"SYNTAX invalid syntax")), value);
    assert!(value.is_error());
}

#[test]
fn test_decode_verbatim_string() {
    let value = decode(b"=15\r\ntxt:Some string\r\n");
    assert_eq!(
        RespValue::VerbatimString {
            format: *b"txt",
            data: Bytes::from_static(b"Some string"),
        },
        value
    );
    assert_eq!("Some string", value.as_str().unwrap());
}

#[test]
fn test_decode_verbatim_string_missing_format() {
    let result = Decoder::default().decode_slice(b"=3\r\ntxt\r\n");
    assert_eq!(ProtocolError::InvalidVerbatimString, result.unwrap_err());
}

#[test]
fn test_decode_array() {
    assert_eq!(int_array(&[1, 2, 3]), decode(b"*3\r\n:1\r\n:2\r\n:3\r\n"));
}

#[test]
fn test_decode_nested_array_with_nulls() {
    let value = decode(b"*3\r\n$3\r\nfoo\r\n$-1\r\n*1\r\n_\r\n");
    assert_eq!(
        RespValue::array(vec![
            RespValue::bulk("foo"),
            RespValue::BulkString(None),
            RespValue::array(vec![RespValue::Null]),
        ]),
        value
    );
}

#[test]
fn test_decode_map_set_push() {
    assert_eq!(
        RespValue::Map(vec![(RespValue::simple("first"), RespValue::Integer(1))]),
        decode(b"%1\r\n+first\r\n:1\r\n")
    );
    assert_eq!(
        RespValue::Set(vec![RespValue::Integer(1), RespValue::Integer(2)]),
        decode(b"~2\r\n:1\r\n:2\r\n")
    );
    assert_eq!(
        RespValue::Push(vec![
            RespValue::bulk("message"),
            RespValue::bulk("chan"),
            RespValue::bulk("hi")
        ]),
        decode(b">3\r\n$7\r\nmessage\r\n$4\r\nchan\r\n$2\r\nhi\r\n")
    );
}

#[test]
fn test_streamed_array_equals_fixed_array() {
    assert_eq!(
        decode(b"*3\r\n:1\r\n:2\r\n:3\r\n"),
        decode(b"*?\r\n:1\r\n:2\r\n:3\r\n.\r\n")
    );
}

#[test]
fn test_streamed_map_and_set() {
    assert_eq!(
        decode(b"%2\r\n+a\r\n:1\r\n+b\r\n:2\r\n"),
        decode(b"%?\r\n+a\r\n:1\r\n+b\r\n:2\r\n.\r\n")
    );
    assert_eq!(decode(b"~1\r\n:7\r\n"), decode(b"~?\r\n:7\r\n.\r\n"));
}

#[test]
fn test_streamed_empty_array() {
    assert_eq!(RespValue::array(vec![]), decode(b"*?\r\n.\r\n"));
}

#[test]
fn test_streamed_string_equals_bulk_string() {
    assert_eq!(
        decode(b"$11\r\nHello world\r\n"),
        decode(b"$?\r\n;4\r\nHell\r\n;5\r\no wor\r\n;2\r\nld\r\n;0\r\n")
    );
}

#[test]
fn test_streamed_string_invalid_chunk() {
    let result = Decoder::default().decode_slice(b"$?\r\n:4\r\n");
    assert_eq!(ProtocolError::InvalidStreamedString, result.unwrap_err());
}

#[test]
fn test_attribute_is_skipped() {
    assert_eq!(
        decode(b"*2\r\n:1\r\n:2\r\n"),
        decode(b"|1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n:1\r\n:2\r\n")
    );
}

#[test]
fn test_nested_attribute_is_skipped() {
    assert_eq!(
        decode(b"*2\r\n:1\r\n:2\r\n"),
        decode(b"*2\r\n|1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n:1\r\n:2\r\n")
    );
}

#[test]
fn test_attribute_kept_on_request() {
    let decoder = Decoder::new(DecodeOptions {
        keep_attributes: true,
        ..DecodeOptions::default()
    });

    let (value, _) = decoder
        .decode_slice(b"|1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n:5\r\n")
        .unwrap()
        .unwrap();

    assert!(matches!(value, RespValue::Attribute { .. }));
    assert_eq!(Some(5), value.as_integer());
    assert_eq!(RespValue::Integer(5), value.into_unattributed());
}

#[test]
fn test_incomplete_values() {
    let decoder = Decoder::default();

    for data in [
        &b"+OK"[..],
        b"+OK\r",
        b"$6\r\nfoo",
        b"$6\r\nfoobar",
        b"$6\r\nfoobar\r",
        b"*2\r\n:1\r\n",
        b"*?\r\n:1\r\n",
        b"%1\r\n+a\r\n",
        b"|1\r\n+a\r\n+b\r\n",
        b"$?\r\n;2\r\nab\r\n",
        b":12",
    ] {
        assert!(decoder.decode_slice(data).unwrap().is_none(), "{:?}", data);
    }
}

#[test]
fn test_wrong_bulk_terminator_is_incomplete() {
    assert!(Decoder::default().decode_slice(b"$3\r\nfooXY").unwrap().is_none());
}

#[test]
fn test_incomplete_does_not_consume() {
    let decoder = Decoder::default();
    let mut buffer = SegmentedBuffer::new();
    buffer.push(Bytes::from_static(b"*2\r\n:1\r\n"));

    assert!(decoder.decode(&buffer).unwrap().is_none());
    assert_eq!(8, buffer.len());

    buffer.push(Bytes::from_static(b":2\r\n"));
    let (value, consumed) = decoder.decode(&buffer).unwrap().unwrap();
    assert_eq!(int_array(&[1, 2]), value);
    assert_eq!(12, consumed);
}

#[test]
fn test_invalid_prefix() {
    assert_eq!(
        ProtocolError::InvalidPrefix(b'x'),
        Decoder::default().decode_slice(b"x\r\n").unwrap_err()
    );
}

#[test]
fn test_terminator_outside_stream_is_invalid() {
    assert_eq!(
        ProtocolError::InvalidPrefix(b'.'),
        Decoder::default().decode_slice(b".\r\n").unwrap_err()
    );
}

#[test]
fn test_non_numeric_length_is_fatal() {
    assert!(matches!(
        Decoder::default().decode_slice(b"$abc\r\n").unwrap_err(),
        ProtocolError::InvalidLength(_)
    ));
    assert!(matches!(
        Decoder::default().decode_slice(b"*x\r\n").unwrap_err(),
        ProtocolError::InvalidLength(_)
    ));
}

#[test]
fn test_negative_length_is_fatal() {
    assert!(matches!(
        Decoder::default().decode_slice(b"$-2\r\n").unwrap_err(),
        ProtocolError::InvalidLength(_)
    ));
}

#[test]
fn test_invalid_scalars() {
    let decoder = Decoder::default();
    assert!(matches!(
        decoder.decode_slice(b":abc\r\n").unwrap_err(),
        ProtocolError::InvalidInteger(_)
    ));
    assert!(matches!(
        decoder.decode_slice(b"#x\r\n").unwrap_err(),
        ProtocolError::InvalidBoolean(_)
    ));
    assert!(matches!(
        decoder.decode_slice(b",1.2.3\r\n").unwrap_err(),
        ProtocolError::InvalidDouble(_)
    ));
    assert!(matches!(
        decoder.decode_slice(b"(12a\r\n").unwrap_err(),
        ProtocolError::InvalidInteger(_)
    ));
}

#[test]
fn test_nesting_limit() {
    let decoder = Decoder::new(DecodeOptions {
        max_depth: 2,
        ..DecodeOptions::default()
    });

    assert!(decoder.decode_slice(b"*1\r\n*1\r\n:1\r\n").unwrap().is_some());
    assert_eq!(
        ProtocolError::NestingTooDeep(2),
        decoder.decode_slice(b"*1\r\n*1\r\n*1\r\n:1\r\n").unwrap_err()
    );
}

#[test]
fn test_fragmentation_seed_case() {
    let data = b"$4\r\nPING\r\n+PONG\r\n";
    let expected = vec![RespValue::bulk("PING"), RespValue::simple("PONG")];

    for chunk_size in 1..=data.len() {
        assert_eq!(expected, decode_fragmented(data, chunk_size), "chunk size {}", chunk_size);
    }
}

#[test]
fn test_fragmentation_invariance_mixed_stream() {
    let data: &[u8] = b"+OK\r\n-ERR fail\r\n:12\r\n$5\r\nhello\r\n$-1\r\n*-1\r\n_\r\n\
        *3\r\n:1\r\n:2\r\n:3\r\n*?\r\n:1\r\n:2\r\n:3\r\n.\r\n%?\r\n+k\r\n#t\r\n.\r\n\
        |1\r\n$3\r\nfoo\r\n$3\r\nbar\r\n,1.5\r\n=8\r\ntxt:abcd\r\n~2\r\n(123\r\n!3\r\nbad\r\n\
        >2\r\n+a\r\n+b\r\n$?\r\n;3\r\nabc\r\n;1\r\nd\r\n;0\r\n";

    let whole = decode_fragmented(data, data.len());
    assert_eq!(15, whole.len());

    for chunk_size in [1, 2, 3, 5, 7, 16, 64] {
        assert_eq!(whole, decode_fragmented(data, chunk_size), "chunk size {}", chunk_size);
    }
}

#[test]
fn test_value_split_across_segments_is_copied_once() {
    let decoder = Decoder::default();
    let mut buffer = SegmentedBuffer::new();
    buffer.push(Bytes::from_static(b"$10\r\nhello"));
    buffer.push(Bytes::from_static(b"world\r\n+OK\r\n"));

    let values = decoder.decode_all(&mut buffer).unwrap();
    assert_eq!(vec![RespValue::bulk("helloworld"), RespValue::simple("OK")], values);
    assert_eq!(0, buffer.segment_count());
}

#[test]
fn test_value_roundtrip_through_encoder() {
    let value = RespValue::array(vec![
        RespValue::bulk("a"),
        RespValue::Map(vec![(RespValue::simple("k"), RespValue::Double(2.5))]),
        RespValue::Set(vec![RespValue::Boolean(true)]),
        RespValue::BulkString(None),
        RespValue::Null,
        RespValue::VerbatimString {
            format: *b"mkd",
            data: Bytes::from_static(b"# hi"),
        },
    ]);

    assert_eq!(value, decode(&value.to_bytes()));
}
