#[cfg(test)]
mod decoder;
#[cfg(test)]
mod differential;
#[cfg(test)]
mod encoder;

use crate::codec::{Decoder, RespValue, SegmentedBuffer};
use bytes::Bytes;

/// Feeds `data` in chunks of `chunk_size` bytes and collects every value decoded on the way
pub(crate) fn decode_fragmented(data: &[u8], chunk_size: usize) -> Vec<RespValue> {
    let decoder = Decoder::default();
    let mut buffer = SegmentedBuffer::new();
    let mut values = vec![];

    for chunk in data.chunks(chunk_size) {
        buffer.push(Bytes::copy_from_slice(chunk));
        values.extend(decoder.decode_all(&mut buffer).unwrap());
    }

    assert!(buffer.is_empty(), "unconsumed bytes left");
    values
}
