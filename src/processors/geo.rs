use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{double_of, ResultProcessor};

/// Longitude/latitude pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub longitude: f64,
    pub latitude: f64,
}

/// Strict `[longitude, latitude]` pair, null if the member does not exist
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPositionProcessor;

impl ResultProcessor for GeoPositionProcessor {
    type Output = Option<GeoPosition>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        let elements = match value.as_elements() {
            Some(elements) if elements.len() == 2 => elements,
            _ => return Err(ResponseTypeError::new("[longitude, latitude]", value)),
        };

        let longitude = double_of(&elements[0]).ok_or_else(|| ResponseTypeError::new("longitude", &elements[0]))?;
        let latitude = double_of(&elements[1]).ok_or_else(|| ResponseTypeError::new("latitude", &elements[1]))?;

        Ok(Some(GeoPosition { longitude, latitude }))
    }
}

/// Reply of GEOPOS: one position (or null) per requested member
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPositionArrayProcessor;

impl ResultProcessor for GeoPositionArrayProcessor {
    type Output = Option<Vec<Option<GeoPosition>>>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        value
            .as_elements()
            .ok_or_else(|| ResponseTypeError::new("array", value))?
            .iter()
            .map(|element| GeoPositionProcessor.process(element))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}
