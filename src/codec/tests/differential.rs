use crate::codec::tests::decode_fragmented;
use crate::codec::RespValue;
use bytes::{Bytes, BytesMut};
use redis_protocol::resp2::types::Frame as Resp2Frame;
use redis_protocol::resp3::types::{Frame as Resp3Frame, FrameMap, FrameSet};
use redis_protocol::{resp2, resp3};

fn blob(data: &'static str) -> Resp3Frame {
    Resp3Frame::BlobString {
        data: Bytes::from_static(data.as_bytes()),
        attributes: None,
    }
}

fn number(data: i64) -> Resp3Frame {
    Resp3Frame::Number { data, attributes: None }
}

fn resp2_bytes(frame: &Resp2Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    resp2::encode::encode_bytes(&mut buf, frame).unwrap();
    buf
}

fn resp3_bytes(frame: &Resp3Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    resp3::encode::complete::encode_bytes(&mut buf, frame).unwrap();
    buf
}

/// Decodes with every chunk size and ensures all results agree
fn decode_single(data: &[u8]) -> RespValue {
    let mut values = decode_fragmented(data, data.len());
    assert_eq!(1, values.len());

    for chunk_size in [1, 2, 3, 7] {
        assert_eq!(values, decode_fragmented(data, chunk_size), "chunk size {}", chunk_size);
    }

    values.remove(0)
}

#[test]
fn test_resp2_frames() {
    let frame = Resp2Frame::Array(vec![
        Resp2Frame::SimpleString(Bytes::from_static(b"OK")),
        Resp2Frame::Integer(-17),
        Resp2Frame::BulkString(Bytes::from_static(b"line\r\nbreak")),
        Resp2Frame::Null,
        Resp2Frame::Array(vec![Resp2Frame::BulkString(Bytes::from_static(b""))]),
    ]);

    assert_eq!(
        RespValue::array(vec![
            RespValue::simple("OK"),
            RespValue::Integer(-17),
            RespValue::bulk("line\r\nbreak"),
            RespValue::BulkString(None),
            RespValue::array(vec![RespValue::bulk("")]),
        ]),
        decode_single(&resp2_bytes(&frame))
    );
}

#[test]
fn test_resp3_scalars() {
    let cases = vec![
        (number(42), RespValue::Integer(42)),
        (
            Resp3Frame::Boolean {
                data: true,
                attributes: None,
            },
            RespValue::Boolean(true),
        ),
        (
            Resp3Frame::Double {
                data: 1.25,
                attributes: None,
            },
            RespValue::Double(1.25),
        ),
        (
            Resp3Frame::BigNumber {
                data: Bytes::from_static(b"123456789012345678901234567890"),
                attributes: None,
            },
            RespValue::BigNumber(Bytes::from_static(b"123456789012345678901234567890")),
        ),
        (
            Resp3Frame::BlobError {
                data: Bytes::from_static(b"ERR blob"),
                attributes: None,
            },
            RespValue::BulkError(Bytes::from_static(b"ERR blob")),
        ),
        (Resp3Frame::Null, RespValue::Null),
    ];

    for (frame, expected) in cases {
        assert_eq!(expected, decode_single(&resp3_bytes(&frame)));
    }
}

#[test]
fn test_resp3_hello_map() {
    let mut map = FrameMap::new();
    map.insert(blob("server"), blob("redis"));
    map.insert(blob("version"), blob("7.2.0"));
    map.insert(blob("proto"), number(3));
    map.insert(
        blob("modules"),
        Resp3Frame::Array {
            data: vec![],
            attributes: None,
        },
    );

    let value = decode_single(&resp3_bytes(&Resp3Frame::Map {
        data: map,
        attributes: None,
    }));

    let pairs = value.as_pairs().unwrap();
    assert_eq!(4, pairs.len());

    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(candidate, _)| candidate.as_str() == Some(key))
            .map(|(_, value)| value.clone())
    };

    assert_eq!(Some(RespValue::bulk("redis")), lookup("server"));
    assert_eq!(Some(RespValue::bulk("7.2.0")), lookup("version"));
    assert_eq!(Some(RespValue::Integer(3)), lookup("proto"));
    assert_eq!(Some(RespValue::array(vec![])), lookup("modules"));
}

#[test]
fn test_resp3_push_and_set() {
    let push = Resp3Frame::Push {
        data: vec![blob("message"), blob("news"), blob("hello")],
        attributes: None,
    };
    assert_eq!(
        RespValue::Push(vec![
            RespValue::bulk("message"),
            RespValue::bulk("news"),
            RespValue::bulk("hello")
        ]),
        decode_single(&resp3_bytes(&push))
    );

    let mut set = FrameSet::new();
    set.insert(number(5));
    assert_eq!(
        RespValue::Set(vec![RespValue::Integer(5)]),
        decode_single(&resp3_bytes(&Resp3Frame::Set {
            data: set,
            attributes: None
        }))
    );
}

#[test]
fn test_resp3_attributes_are_transparent() {
    let mut attributes = FrameMap::new();
    attributes.insert(blob("ttl"), number(100));

    let frame = Resp3Frame::Array {
        data: vec![number(1), number(2)],
        attributes: Some(attributes),
    };

    assert_eq!(
        RespValue::array(vec![RespValue::Integer(1), RespValue::Integer(2)]),
        decode_single(&resp3_bytes(&frame))
    );
}

#[test]
fn test_our_encoding_matches_resp2_encoder() {
    let value = RespValue::array(vec![
        RespValue::bulk("get"),
        RespValue::Integer(5),
        RespValue::simple("OK"),
        RespValue::BulkString(None),
    ]);
    let frame = Resp2Frame::Array(vec![
        Resp2Frame::BulkString(Bytes::from_static(b"get")),
        Resp2Frame::Integer(5),
        Resp2Frame::SimpleString(Bytes::from_static(b"OK")),
        Resp2Frame::Null,
    ]);

    assert_eq!(resp2_bytes(&frame).freeze(), value.to_bytes());
}
