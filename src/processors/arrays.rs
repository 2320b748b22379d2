use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{integer_of, string_of, strip_attributes, ResultProcessor};

/// Array of arbitrary values
///
/// * `*-1` and `_` map to `None`
/// * `$-1` maps to an empty array
/// * a single string is treated as a one-element array
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueArrayProcessor;

impl ResultProcessor for ValueArrayProcessor {
    type Output = Option<Vec<RespValue>>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        match value.skip_attributes() {
            RespValue::Null | RespValue::Array(None) => Ok(None),
            RespValue::BulkString(None) => Ok(Some(vec![])),
            single @ (RespValue::BulkString(Some(_)) | RespValue::SimpleString(_)) => Ok(Some(vec![single.clone()])),
            other => match other.as_elements() {
                Some(elements) => Ok(Some(elements.iter().map(strip_attributes).collect())),
                None => Err(ResponseTypeError::new("array", value)),
            },
        }
    }
}

/// Array of UTF-8 strings. Null elements stay in position as `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringArrayProcessor;

impl ResultProcessor for StringArrayProcessor {
    type Output = Option<Vec<Option<String>>>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        let elements = value.as_elements().ok_or_else(|| ResponseTypeError::new("array", value))?;

        elements
            .iter()
            .map(|element| {
                if element.is_null() {
                    return Ok(None);
                }

                string_of(element)
                    .map(Some)
                    .ok_or_else(|| ResponseTypeError::new("string element", element))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Reply of SCAN like commands
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// Cursor to continue with, 0 if iteration is complete
    pub cursor: u64,
    pub items: Vec<RespValue>,
}

/// Strict `[cursor, [items...]]` reply
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanProcessor;

impl ResultProcessor for ScanProcessor {
    type Output = ScanResult;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        let elements = match value.as_elements() {
            Some(elements) if elements.len() == 2 => elements,
            _ => return Err(ResponseTypeError::new("2 element array", value)),
        };

        let cursor = integer_of(&elements[0])
            .and_then(|cursor| u64::try_from(cursor).ok())
            .ok_or_else(|| ResponseTypeError::new("cursor", &elements[0]))?;

        let items = elements[1]
            .as_elements()
            .ok_or_else(|| ResponseTypeError::new("array", &elements[1]))?;

        Ok(ScanResult {
            cursor,
            items: items.iter().map(strip_attributes).collect(),
        })
    }
}

/// RESP3 map or RESP2 array of alternating keys and values
#[derive(Debug, Clone, Copy, Default)]
pub struct MapProcessor;

impl ResultProcessor for MapProcessor {
    type Output = Vec<(RespValue, RespValue)>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(vec![]);
        }

        if let Some(pairs) = value.as_pairs() {
            return Ok(pairs
                .iter()
                .map(|(key, value)| (strip_attributes(key), strip_attributes(value)))
                .collect());
        }

        match value.as_elements() {
            Some(elements) if elements.len() % 2 == 0 => Ok(elements
                .chunks(2)
                .map(|pair| (strip_attributes(&pair[0]), strip_attributes(&pair[1])))
                .collect()),
            _ => Err(ResponseTypeError::new("map or even array", value)),
        }
    }
}
