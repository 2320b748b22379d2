use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{integer_of, ResultProcessor};
use chrono::{DateTime, TimeZone, Utc};

/// Reply of TIME: `[seconds, microseconds]`
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeProcessor;

impl ResultProcessor for TimeProcessor {
    type Output = DateTime<Utc>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        let elements = match value.as_elements() {
            Some(elements) if elements.len() == 2 => elements,
            _ => return Err(ResponseTypeError::new("[seconds, microseconds]", value)),
        };

        let seconds = integer_of(&elements[0]).ok_or_else(|| ResponseTypeError::new("seconds", &elements[0]))?;
        let micros = integer_of(&elements[1])
            .filter(|micros| (0..1_000_000).contains(micros))
            .ok_or_else(|| ResponseTypeError::new("microseconds", &elements[1]))?;

        Utc.timestamp_opt(seconds, (micros * 1_000) as u32)
            .single()
            .ok_or_else(|| ResponseTypeError::new("timestamp in range", value))
    }
}

/// Unix timestamp in seconds. Null and negative values (e.g. `-1` for no expiry) map to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSecondsProcessor;

impl ResultProcessor for UnixSecondsProcessor {
    type Output = Option<DateTime<Utc>>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        match integer_of(value) {
            Some(seconds) if seconds < 0 => Ok(None),
            Some(seconds) => Ok(Utc.timestamp_opt(seconds, 0).single()),
            None => Err(ResponseTypeError::new("unix seconds", value)),
        }
    }
}

/// Unix timestamp in milliseconds, see [UnixSecondsProcessor]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixMillisProcessor;

impl ResultProcessor for UnixMillisProcessor {
    type Output = Option<DateTime<Utc>>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        match integer_of(value) {
            Some(millis) if millis < 0 => Ok(None),
            Some(millis) => Ok(Utc.timestamp_millis_opt(millis).single()),
            None => Err(ResponseTypeError::new("unix milliseconds", value)),
        }
    }
}
