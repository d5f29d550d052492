//! ProDOS date/time words and the ISO-8601 `created` attribute format.
//!
//! ProDOS packs timestamps into two 16-bit words:
//!
//! - Date: bits 0-4 day (1-31), bits 5-8 month (1-12), bits 9-15 year
//!   offset from 1900 (0-127).
//! - Time: bits 0-5 minute (0-59), bits 8-12 hour (0-23).
//!
//! Encoding uses the local-time components of the source timestamp, as
//! real ProDOS clock cards did; decoding inverts that. A zero date word
//! decodes as "now". The metadata sidecar stores creation times as
//! 20-character ISO-8601 UTC strings (`YYYY-MM-DDTHH:MM:SSZ`).

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike, Utc};

/// Encode the local date of a timestamp as a ProDOS date word.
pub fn encode_prodos_date(t: DateTime<Local>) -> u16 {
    let day = t.day().clamp(1, 31) as u16;
    let month = t.month().clamp(1, 12) as u16;
    let year = (t.year() - 1900).clamp(0, 127) as u16;
    (day & 0x1F) | ((month & 0x0F) << 5) | ((year & 0x7F) << 9)
}

/// Encode the local time of day of a timestamp as a ProDOS time word.
pub fn encode_prodos_time(t: DateTime<Local>) -> u16 {
    let minute = t.minute().min(59) as u16;
    let hour = t.hour().min(23) as u16;
    (minute & 0x3F) | ((hour & 0x1F) << 8)
}

/// Decode a ProDOS date/time pair into a local timestamp.
///
/// A zero date word yields the current time. Field combinations that do
/// not name a real local time (nonexistent dates, DST gaps) also fall
/// back to now.
pub fn decode_prodos_datetime(date: u16, time: u16) -> DateTime<Local> {
    if date == 0 {
        return Local::now();
    }

    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = ((date >> 9) & 0x7F) as i32 + 1900;

    let minute = (time & 0x3F) as u32;
    let hour = ((time >> 8) & 0x1F) as u32;

    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
        .unwrap_or_else(Local::now)
}

/// Convert a host timestamp to local time.
pub fn system_time_local(t: std::time::SystemTime) -> DateTime<Local> {
    DateTime::from(t)
}

/// Render a ProDOS date/time pair as the stored ISO-8601 UTC string.
pub fn prodos_to_iso8601(date: u16, time: u16) -> String {
    decode_prodos_datetime(date, time)
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Parse a stored ISO-8601 UTC string (`YYYY-MM-DDTHH:MM:SSZ`, exactly
/// 20 characters, year 1900-3000). Returns `None` when malformed.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 20 {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ").ok()?;
    if !(1900..=3000).contains(&naive.year()) {
        return None;
    }
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_date() {
        // 1986-09-17 -> year 86, month 9, day 17
        let t = Local.with_ymd_and_hms(1986, 9, 17, 0, 0, 0).unwrap();
        let word = encode_prodos_date(t);
        assert_eq!(word & 0x1F, 17);
        assert_eq!((word >> 5) & 0x0F, 9);
        assert_eq!((word >> 9) & 0x7F, 86);
    }

    #[test]
    fn test_encode_clamps_year() {
        let t = Local.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
        assert_eq!((encode_prodos_date(t) >> 9) & 0x7F, 127);
    }

    #[test]
    fn test_encode_known_time() {
        let t = Local.with_ymd_and_hms(2001, 1, 1, 14, 42, 30).unwrap();
        let word = encode_prodos_time(t);
        assert_eq!(word & 0x3F, 42);
        assert_eq!((word >> 8) & 0x1F, 14);
    }

    #[test]
    fn test_date_round_trip() {
        let t = Local.with_ymd_and_hms(1999, 12, 31, 23, 59, 0).unwrap();
        let date = encode_prodos_date(t);
        let time = encode_prodos_time(t);
        let back = decode_prodos_datetime(date, time);
        assert_eq!(back.year(), 1999);
        assert_eq!(back.month(), 12);
        assert_eq!(back.day(), 31);
        assert_eq!(back.hour(), 23);
        assert_eq!(back.minute(), 59);
    }

    #[test]
    fn test_zero_date_decodes_to_now() {
        let before = Local::now();
        let decoded = decode_prodos_datetime(0, 0);
        let after = Local::now();
        assert!(decoded >= before - chrono::Duration::seconds(1));
        assert!(decoded <= after + chrono::Duration::seconds(1));
    }

    #[test]
    fn test_iso8601_round_trip() {
        let parsed = parse_iso8601("1994-06-05T12:34:56Z").unwrap();
        assert_eq!(parsed.year(), 1994);
        assert_eq!(parsed.hour(), 12);
        assert_eq!(
            parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "1994-06-05T12:34:56Z"
        );
    }

    #[test]
    fn test_iso8601_rejects_malformed() {
        assert!(parse_iso8601("").is_none());
        assert!(parse_iso8601("1994-06-05 12:34:56Z").is_none());
        assert!(parse_iso8601("1994-06-05T12:34:56").is_none());
        assert!(parse_iso8601("1899-06-05T12:34:56Z").is_none());
        assert!(parse_iso8601("not-a-timestamp-----").is_none());
    }
}
