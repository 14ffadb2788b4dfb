use std::convert::TryFrom;

use anyhow::{anyhow, Result};

use crate::db::models::DetectionReason;

pub fn to_i64(value: u32) -> i64 {
    i64::from(value)
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} value {value} is out of range"))
}

pub fn parse_reason(value: &str) -> Result<DetectionReason> {
    match value {
        "rapid_scroll" => Ok(DetectionReason::RapidScroll),
        "long_session" => Ok(DetectionReason::LongSession),
        other => Err(anyhow!("unknown detection reason {other}")),
    }
}

/// Wraps an `anyhow` error so it can leave a `rusqlite` row mapper.
pub fn conversion_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Integer,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip() {
        for reason in [DetectionReason::RapidScroll, DetectionReason::LongSession] {
            assert_eq!(parse_reason(reason.as_str()).unwrap(), reason);
        }
        assert!(parse_reason("bored").is_err());
    }

    #[test]
    fn test_to_u32_rejects_negative() {
        assert!(to_u32(-1, "scroll_count").is_err());
        assert_eq!(to_u32(7, "scroll_count").unwrap(), 7);
    }
}
