use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{bytes_of, double_of, ResultProcessor};
use bytes::Bytes;

/// Sorted set member with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: Bytes,
    pub score: f64,
}

/// Strict `[member, score]` pair, null if the sorted set is empty
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoredMemberProcessor;

impl ResultProcessor for ScoredMemberProcessor {
    type Output = Option<ScoredMember>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(None);
        }

        match value.as_elements() {
            Some([member, score]) => Ok(Some(scored_member(member, score)?)),
            Some([]) => Ok(None),
            _ => Err(ResponseTypeError::new("[member, score]", value)),
        }
    }
}

/// Members with scores, either flat (`[m1, s1, m2, s2]`, RESP2) or nested (`[[m1, s1], [m2, s2]]`, RESP3)
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoredMemberArrayProcessor;

impl ResultProcessor for ScoredMemberArrayProcessor {
    type Output = Vec<ScoredMember>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        if value.is_null() {
            return Ok(vec![]);
        }

        let elements = value.as_elements().ok_or_else(|| ResponseTypeError::new("array", value))?;

        if elements.iter().all(|element| element.as_elements().is_some()) {
            return elements
                .iter()
                .map(|pair| match pair.as_elements() {
                    Some([member, score]) => scored_member(member, score),
                    _ => Err(ResponseTypeError::new("[member, score]", pair)),
                })
                .collect();
        }

        if elements.len() % 2 != 0 {
            return Err(ResponseTypeError::new("even array", value));
        }

        elements
            .chunks(2)
            .map(|pair| scored_member(&pair[0], &pair[1]))
            .collect()
    }
}

fn scored_member(member: &RespValue, score: &RespValue) -> Result<ScoredMember, ResponseTypeError> {
    Ok(ScoredMember {
        member: bytes_of(member).ok_or_else(|| ResponseTypeError::new("member", member))?,
        score: double_of(score).ok_or_else(|| ResponseTypeError::new("score", score))?,
    })
}
