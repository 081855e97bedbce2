use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub reset_token_ttl: usize,

    // Rate limiting
    pub rate_sign_in_per_min: u32,
    pub rate_sign_up_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_reset_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Camera check-ins after this minute are recorded as late.
    pub late_cutoff: NaiveTime,

    pub photo_dir: String,
    pub photo_public_url: String,
    pub reset_url_base: String,
    pub log_dir: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}"))
}

/// Parses `HH:MM` (or `HH:MM:SS`).
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("invalid time of day {raw:?}, expected HH:MM"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let late_cutoff =
            parse_time_of_day(&env::var("LATE_CUTOFF").unwrap_or_else(|_| "08:00".to_string()))
                .context("LATE_CUTOFF")?;

        let server_addr = required("SERVER_ADDR")?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", "604800")?, // 7 days
            reset_token_ttl: parsed_or("RESET_TOKEN_TTL", "3600")?,

            rate_sign_in_per_min: parsed_or("RATE_SIGN_IN_PER_MIN", "60")?,
            rate_sign_up_per_min: parsed_or("RATE_SIGN_UP_PER_MIN", "30")?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_reset_per_min: parsed_or("RATE_RESET_PER_MIN", "10")?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            late_cutoff,

            photo_dir: env::var("PHOTO_DIR").unwrap_or_else(|_| "storage".to_string()),
            photo_public_url: env::var("PHOTO_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://{server_addr}/photos")),
            reset_url_base: env::var("RESET_URL_BASE")
                .unwrap_or_else(|_| format!("http://{server_addr}/reset-password")),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            server_addr,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "mysql://localhost/absensi_test".into(),
        jwt_secret: "test-secret".into(),
        server_addr: "127.0.0.1:8080".into(),
        access_token_ttl: 900,
        refresh_token_ttl: 604800,
        reset_token_ttl: 3600,
        rate_sign_in_per_min: 60,
        rate_sign_up_per_min: 30,
        rate_refresh_per_min: 30,
        rate_reset_per_min: 10,
        rate_protected_per_min: 1000,
        api_prefix: "/api".into(),
        late_cutoff: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        photo_dir: "storage".into(),
        photo_public_url: "http://127.0.0.1:8080/photos".into(),
        reset_url_base: "http://127.0.0.1:8080/reset-password".into(),
        log_dir: "logs".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_time_of_day("08:00").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("07:45:30").unwrap(),
            NaiveTime::from_hms_opt(7, 45, 30).unwrap()
        );
    }

    #[test]
    fn cutoff_rejects_garbage() {
        assert!(parse_time_of_day("eight").is_err());
        assert!(parse_time_of_day("25:00").is_err());
    }
}
