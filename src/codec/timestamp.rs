use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::codec::DecodeError;


const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOSECONDS_PER_TICK: i64 = 100;

/// Seconds from 1601-01-01T00:00:00Z to 1970-01-01T00:00:00Z.
const EPOCH_OFFSET_SECONDS: i64 = 11_644_473_600;

const GENERALIZED_TIME_LENGTH: usize = 14;


/// Converts an interval count (100ns ticks since 1601-01-01 UTC, as in
/// `lastLogon` or `pwdLastSet`) into local time.
pub fn decode_ticks(ticks: i64) -> Result<DateTime<Local>, DecodeError> {
    let seconds = ticks.div_euclid(TICKS_PER_SECOND) - EPOCH_OFFSET_SECONDS;
    let nanoseconds = ticks.rem_euclid(TICKS_PER_SECOND) * NANOSECONDS_PER_TICK;
    // rem_euclid keeps this below one second
    let utc = DateTime::<Utc>::from_timestamp(seconds, nanoseconds as u32)
        .ok_or(DecodeError::OutOfRange)?;
    Ok(utc.with_timezone(&Local))
}

/// Parses the decimal string form of an interval count.
pub fn parse_ticks(text: &str) -> Result<DateTime<Local>, DecodeError> {
    let ticks: i64 = text.trim().parse()
        .map_err(|_| DecodeError::InvalidNumber)?;
    decode_ticks(ticks)
}

/// Parses a generalized time string (`YYYYMMDDHHMMSS.0Z`, as in `whenCreated`)
/// as UTC and converts it to local time.
///
/// Everything after the seconds is ignored.
pub fn parse_generalized_time(text: &str) -> Result<DateTime<Local>, DecodeError> {
    let invalid = || DecodeError::InvalidFormat(format!("not a generalized time: {:?}", text));

    let digits = text.get(..GENERALIZED_TIME_LENGTH)
        .ok_or_else(invalid)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
        .map_err(|_| invalid())?;
    Ok(Utc.from_utc_datetime(&naive).with_timezone(&Local))
}
