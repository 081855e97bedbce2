pub mod attendance;
pub mod checkin;
pub mod dashboard;
pub mod recap;
pub mod student;

use crate::config::parse_time_of_day;
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, de};

/// School-local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// School-local wall clock, seconds dropped.
pub fn now_to_minute() -> NaiveTime {
    let now = Local::now().time();
    NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now)
}

/// Accepts `"HH:MM"` or `"HH:MM:SS"`; missing or null stays `None`.
pub fn deserialize_opt_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_time_of_day(&raw).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "deserialize_opt_time")]
        time: Option<NaiveTime>,
    }

    #[test]
    fn time_field_accepts_short_and_long_forms() {
        let short: Body = serde_json::from_str(r#"{"time":"07:15"}"#).unwrap();
        assert_eq!(short.time, NaiveTime::from_hms_opt(7, 15, 0));

        let long: Body = serde_json::from_str(r#"{"time":"07:15:30"}"#).unwrap();
        assert_eq!(long.time, NaiveTime::from_hms_opt(7, 15, 30));

        let missing: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.time, None);

        assert!(serde_json::from_str::<Body>(r#"{"time":"soon"}"#).is_err());
    }

    #[test]
    fn current_minute_has_no_seconds() {
        let now = now_to_minute();
        assert_eq!((now.second(), now.nanosecond()), (0, 0));
    }
}
