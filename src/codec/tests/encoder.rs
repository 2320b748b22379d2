use crate::codec::{encode_command, estimate_len, format_double, CommandArg, FrameWriter};
use bytes::{Bytes, BytesMut};

fn encode(name: &str, args: &[CommandArg]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    let written = encode_command(&mut buf, name, args);
    assert_eq!(buf.len(), written);
    buf.to_vec()
}

#[test]
fn test_encode_without_arguments() {
    assert_eq!(b"*1\r\n$4\r\nping\r\n".to_vec(), encode("PING", &[]));
}

#[test]
fn test_encode_with_argument() {
    assert_eq!(b"*2\r\n$4\r\nping\r\n$3\r\nabc\r\n".to_vec(), encode("PING", &["abc".into()]));
}

#[test]
fn test_encode_binary_argument() {
    let arg = CommandArg::from(Bytes::from_static(b"a\r\n\0b"));
    assert_eq!(
        b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$5\r\na\r\n\0b\r\n".to_vec(),
        encode("SET", &["k".into(), arg])
    );
}

#[test]
fn test_encode_empty_argument() {
    assert_eq!(b"*2\r\n$4\r\necho\r\n$0\r\n\r\n".to_vec(), encode("ECHO", &["".into()]));
}

#[test]
fn test_encode_numeric_arguments() {
    let args: Vec<CommandArg> = vec![(-5i64).into(), 17u64.into(), 3usize.into(), 1.5f64.into()];
    assert_eq!(
        b"*5\r\n$6\r\nzrange\r\n$2\r\n-5\r\n$2\r\n17\r\n$1\r\n3\r\n$3\r\n1.5\r\n".to_vec(),
        encode("ZRANGE", &args)
    );
}

#[test]
fn test_encode_appends_to_buffer() {
    let mut buf = BytesMut::from(&b"prefix"[..]);
    let written = encode_command(&mut buf, "PING", &[]);

    assert_eq!(14, written);
    assert_eq!(b"prefix*1\r\n$4\r\nping\r\n".to_vec(), buf.to_vec());
}

#[test]
fn test_estimate_is_upper_bound() {
    let args: Vec<CommandArg> = (0..120).map(|i| CommandArg::from(format!("value-{}", i))).collect();
    let estimate = estimate_len("MSET", &args);
    let encoded = encode("MSET", &args);

    assert!(encoded.len() <= estimate);
}

#[test]
fn test_encoded_len_of_argument() {
    assert_eq!(9, CommandArg::from("abc").encoded_len());
    assert_eq!(17, CommandArg::from("0123456789").encoded_len());
}

#[test]
fn test_frame_writer_counts_written_bytes() {
    let mut buf = BytesMut::new();
    let mut writer = FrameWriter::new(&mut buf, 64);
    writer.write_header(2);
    writer.write_bulk(b"get");
    writer.write_arg(&"key".into());
    assert_eq!(22, writer.written());
    assert_eq!(22, writer.finish());
    assert_eq!(b"*2\r\n$3\r\nget\r\n$3\r\nkey\r\n".to_vec(), buf.to_vec());
}

#[test]
#[should_panic(expected = "exceeds estimate")]
#[cfg(debug_assertions)]
fn test_frame_writer_estimate_exceeded() {
    let mut buf = BytesMut::new();
    let mut writer = FrameWriter::new(&mut buf, 4);
    writer.write_bulk(b"too long");
    writer.finish();
}

#[test]
fn test_format_double() {
    assert_eq!("1", format_double(1.0));
    assert_eq!("-3", format_double(-3.0));
    assert_eq!("0.5", format_double(0.5));
    assert_eq!("3.14159", format_double(3.14159));
    assert_eq!("+inf", format_double(f64::INFINITY));
    assert_eq!("-inf", format_double(f64::NEG_INFINITY));
    assert_eq!("NaN", format_double(f64::NAN));
}

#[test]
fn test_format_double_large_values_keep_precision() {
    assert_eq!("1e100", format_double(1e100));
    assert_eq!(1e100, format_double(1e100).parse::<f64>().unwrap());
}
