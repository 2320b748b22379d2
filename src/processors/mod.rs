//! Result processors
//!
//! A processor is a pure function turning a decoded [RespValue] into a typed result. Attributes
//! are skipped at every nesting level, and nulls are treated alike no matter which protocol
//! version produced them (`$-1`, `*-1` or `_`).
//!
//! Processors validate shapes strictly. A reply with a wrong arity or an incompatible type is
//! reported as [ResponseTypeError] instead of being coerced.
use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use bytes::Bytes;

pub use arrays::{MapProcessor, ScanProcessor, ScanResult, StringArrayProcessor, ValueArrayProcessor};
pub use geo::{GeoPosition, GeoPositionArrayProcessor, GeoPositionProcessor};
pub use scalar::{
    BooleanProcessor, BytesProcessor, DoubleProcessor, IntegerProcessor, NullableBytesProcessor,
    NullableDoubleProcessor, NullableIntegerProcessor, NullableStringProcessor, OkProcessor, ValueProcessor,
};
pub use scored::{ScoredMember, ScoredMemberArrayProcessor, ScoredMemberProcessor};
pub use server::{
    ClusterSlotsProcessor, HelloProcessor, HelloResponse, NodeAddress, ReplicaInfo, Role, RoleProcessor, SlotRange,
};
pub use time::{TimeProcessor, UnixMillisProcessor, UnixSecondsProcessor};

pub(crate) mod arrays;
pub(crate) mod geo;
pub(crate) mod scalar;
pub(crate) mod scored;
pub(crate) mod server;
pub(crate) mod time;

#[cfg(test)]
mod tests;

/// Converts a reply into a typed result
pub trait ResultProcessor {
    type Output;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError>;
}

/// Copy of the value with attributes removed at every nesting level
///
/// Null markers of both protocol versions (`$-1`, `*-1` and `_`) become [RespValue::Null].
pub fn strip_attributes(value: &RespValue) -> RespValue {
    match value.skip_attributes() {
        RespValue::BulkString(None) | RespValue::Array(None) => RespValue::Null,
        RespValue::Array(Some(elements)) => RespValue::Array(Some(elements.iter().map(strip_attributes).collect())),
        RespValue::Set(elements) => RespValue::Set(elements.iter().map(strip_attributes).collect()),
        RespValue::Push(elements) => RespValue::Push(elements.iter().map(strip_attributes).collect()),
        RespValue::Map(pairs) => RespValue::Map(
            pairs
                .iter()
                .map(|(key, value)| (strip_attributes(key), strip_attributes(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Integer of integer replies or numeric strings
pub(crate) fn integer_of(value: &RespValue) -> Option<i64> {
    match value.skip_attributes() {
        RespValue::Integer(number) => Some(*number),
        RespValue::BigNumber(data) => core::str::from_utf8(data).ok()?.parse().ok(),
        other => other.as_str()?.parse().ok(),
    }
}

/// Double of double/integer replies or numeric strings, including `inf` sentinels
pub(crate) fn double_of(value: &RespValue) -> Option<f64> {
    match value.skip_attributes() {
        RespValue::Double(number) => Some(*number),
        RespValue::Integer(number) => Some(*number as f64),
        other => parse_double(other.as_str()?),
    }
}

pub(crate) fn parse_double(text: &str) -> Option<f64> {
    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Bytes of string-like replies
pub(crate) fn bytes_of(value: &RespValue) -> Option<Bytes> {
    value.as_bytes().cloned()
}

/// Owned UTF-8 string of string-like replies
pub(crate) fn string_of(value: &RespValue) -> Option<String> {
    value.as_str().map(str::to_string)
}
