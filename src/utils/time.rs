// src/utils/time.rs

//! Timestamp helpers shared by the persisted JSON formats.
//!
//! Timestamps are written as RFC 3339 in UTC with second precision. On read,
//! naive ISO-8601 values without an offset are also accepted and interpreted
//! in the local time zone, which is how older manifests were written.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Format a timestamp the way every file in the data directory stores it.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 or naive ISO-8601 timestamp.
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current time truncated to what [`format`] keeps.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Convert a file modification time, truncated to what [`format`] keeps.
pub fn from_system_time(t: SystemTime) -> DateTime<Utc> {
    truncate(DateTime::<Utc>::from(t))
}

fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// Human readable duration: `45s`, `2m 30s`, `1h 15m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let (m, s) = (secs / 60, secs % 60);
        if s > 0 { format!("{m}m {s}s") } else { format!("{m}m") }
    } else {
        let (h, m) = (secs / 3600, (secs % 3600) / 60);
        if m > 0 { format!("{h}h {m}m") } else { format!("{h}h") }
    }
}

/// `#[serde(with = "crate::utils::time::serde_ts")]`
pub mod serde_ts {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// Same as [`serde_ts`] for optional fields.
pub mod serde_ts_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&super::format(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse("2025-03-01T10:20:30Z").unwrap();
        assert_eq!(format(&ts), "2025-03-01T10:20:30Z");
    }

    #[test]
    fn test_parse_offset_normalizes_to_utc() {
        let ts = parse("2025-03-01T12:20:30+02:00").unwrap();
        assert_eq!(format(&ts), "2025-03-01T10:20:30Z");
    }

    #[test]
    fn test_parse_naive_iso() {
        assert!(parse("2025-07-14T09:15:02.123456").is_some());
        assert!(parse("2025-07-14T09:15:02").is_some());
        assert!(parse("unknown").is_none());
    }

    #[test]
    fn test_format_truncates_to_seconds() {
        let ts = DateTime::from_timestamp(1_700_000_000, 987_000_000).unwrap();
        assert_eq!(truncate(ts).timestamp_subsec_nanos(), 0);
        assert_eq!(format(&ts), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(150)), "2m 30s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(4500)), "1h 15m");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
    }
}
