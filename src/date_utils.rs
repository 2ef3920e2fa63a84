use std::ops::Index;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

fn to_int<T: std::str::FromStr>(num_str: &str, date_str: &str) -> Result<T, String> {
    match num_str.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => Err(format!("Error parsing {} from the date {}", num_str, date_str)),
    }
}

/// Parses `YYYY-MM-DD` with an optional `HH:MM[:SS]` part, separated by a
/// space or a `T`. A date without a time resolves to midnight.
pub fn parse_date_time(buf: &str) -> Result<NaiveDateTime, String> {
    lazy_static! {
        static ref DATE_TIME_REGEX: Regex = Regex::new(
            r"(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}):(\d{1,2})(?::(\d{1,2}))?)?"
        ).unwrap();
    }

    let Some(caps) = DATE_TIME_REGEX.captures(buf) else {
        return Err(format!("Unable to parse date {}", buf));
    };

    let to_i32 = |num_str: &str| to_int::<i32>(num_str, buf);
    let to_u32 = |num_str: &str| to_int::<u32>(num_str, buf);

    let y: i32 = to_i32(caps.index(1))?;
    let m: u32 = to_u32(caps.index(2))?;
    let d: u32 = to_u32(caps.index(3))?;

    let (h, mn, s) = match caps.get(4) {
        Some(hour) => {
            let h = to_u32(hour.as_str())?;
            let mn = to_u32(caps.index(5))?;
            let s = match caps.get(6) {
                Some(sec) => to_u32(sec.as_str())?,
                None => 0,
            };
            (h, mn, s)
        }
        None => (0, 0, 0),
    };

    let date = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| format!("Date {} is out of range", buf))?;
    let time = NaiveTime::from_hms_opt(h, mn, s)
        .ok_or_else(|| format!("Time in {} is out of range", buf))?;

    Ok(NaiveDateTime::new(date, time))
}

pub fn format_date(date_time: &NaiveDateTime) -> String {
    date_time.format("%Y-%m-%d").to_string()
}

pub fn format_date_time(date_time: &NaiveDateTime) -> String {
    date_time.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_only() {
        let date_time = parse_date_time("2024-01-15").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-15 00:00:00");
    }

    #[test]
    fn test_parse_date_with_time() {
        let date_time = parse_date_time("2017-09-10 10:42:32").unwrap();
        assert_eq!(format_date_time(&date_time), "2017-09-10 10:42:32");

        let date_time = parse_date_time("2017-09-10T10:42").unwrap();
        assert_eq!(format_date_time(&date_time), "2017-09-10 10:42:00");
    }

    #[test]
    fn test_parse_invalid_dates() {
        assert!(parse_date_time("not a date").is_err());
        assert!(parse_date_time("2024-13-40").is_err());
    }

    #[test]
    fn test_format_date() {
        let date_time = parse_date_time("2024-01-15 08:30:00").unwrap();
        assert_eq!(format_date(&date_time), "2024-01-15");
    }
}
