use crate::error::{ConvoError, ConvoResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// A UTC instant in its canonical string form plus the epoch-seconds shadow
/// used for range filtering. Both are derived from the same `DateTime`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTimestamp {
    pub iso: String,
    pub epoch_secs: f64,
}

impl CanonicalTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        // Truncate to millisecond precision first so the string and the
        // epoch shadow describe the exact same instant.
        let millis = at.timestamp_millis();
        let at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(at);
        Self {
            iso: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            epoch_secs: millis as f64 / 1000.0,
        }
    }

    pub fn from_epoch_millis(millis: i64) -> ConvoResult<Self> {
        let at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| ConvoError::invalid_timestamp(&millis.to_string(), "out of range"))?;
        Ok(Self::from_datetime(at))
    }

    pub fn parse(raw: &str) -> ConvoResult<Self> {
        parse_instant(raw).map(Self::from_datetime)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }
}

/// Parse a user- or source-supplied instant. RFC 3339 is preferred; a bare
/// `YYYY-MM-DDTHH:MM:SS[.fff]` or `YYYY-MM-DD` is read as UTC.
pub fn parse_instant(raw: &str) -> ConvoResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConvoError::invalid_timestamp(raw, "empty"));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        && let Some(naive) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(ConvoError::invalid_timestamp(
        raw,
        "expected RFC 3339 or YYYY-MM-DD[THH:MM:SS]",
    ))
}

pub fn epoch_secs(at: DateTime<Utc>) -> f64 {
    CanonicalTimestamp::from_datetime(at).epoch_secs
}
