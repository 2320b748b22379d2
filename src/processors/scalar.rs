use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{bytes_of, double_of, integer_of, string_of, strip_attributes, ResultProcessor};
use bytes::Bytes;

/// Returns the reply as is, minus attributes
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueProcessor;

impl ResultProcessor for ValueProcessor {
    type Output = RespValue;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        Ok(strip_attributes(value))
    }
}

/// Expects `OK`
#[derive(Debug, Clone, Copy, Default)]
pub struct OkProcessor;

impl ResultProcessor for OkProcessor {
    type Output = ();

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        match value.as_bytes() {
            Some(data) if data.as_ref() == b"OK" => Ok(()),
            _ => Err(ResponseTypeError::new("OK", value)),
        }
    }
}

/// Integer reply. Numeric strings are accepted as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerProcessor;

impl ResultProcessor for IntegerProcessor {
    type Output = i64;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        integer_of(value).ok_or_else(|| ResponseTypeError::new("integer", value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullableIntegerProcessor;

impl ResultProcessor for NullableIntegerProcessor {
    type Output = Option<i64>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        IntegerProcessor.process(value).map(Some)
    }
}

/// RESP3 boolean or RESP2 integer (`:0` is false)
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanProcessor;

impl ResultProcessor for BooleanProcessor {
    type Output = bool;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        match value.skip_attributes() {
            RespValue::Boolean(flag) => Ok(*flag),
            RespValue::Integer(number) => Ok(*number != 0),
            _ => Err(ResponseTypeError::new("boolean", value)),
        }
    }
}

/// RESP3 double, integer or numeric string
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleProcessor;

impl ResultProcessor for DoubleProcessor {
    type Output = f64;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        double_of(value).ok_or_else(|| ResponseTypeError::new("double", value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullableDoubleProcessor;

impl ResultProcessor for NullableDoubleProcessor {
    type Output = Option<f64>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        DoubleProcessor.process(value).map(Some)
    }
}

/// Non-null string reply
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesProcessor;

impl ResultProcessor for BytesProcessor {
    type Output = Bytes;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        bytes_of(value).ok_or_else(|| ResponseTypeError::new("string", value))
    }
}

/// String reply or null, e.g. GET
#[derive(Debug, Clone, Copy, Default)]
pub struct NullableBytesProcessor;

impl ResultProcessor for NullableBytesProcessor {
    type Output = Option<Bytes>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        BytesProcessor.process(value).map(Some)
    }
}

/// UTF-8 string reply or null
#[derive(Debug, Clone, Copy, Default)]
pub struct NullableStringProcessor;

impl ResultProcessor for NullableStringProcessor {
    type Output = Option<String>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        string_of(value)
            .map(Some)
            .ok_or_else(|| ResponseTypeError::new("utf-8 string", value))
    }
}
