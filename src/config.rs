use std::env;
use std::net::SocketAddr;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::AppError;

pub const DEFAULT_HORIZON_DAYS: i64 = 31;

#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Sqlite { database_url: String },
    Rest { base_url: String, api_key: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub school_offset: FixedOffset,
    /// How far ahead reconciliation regenerates when the caller gives no end date.
    pub horizon_days: i64,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR is invalid: {}", e)))?;

        let store = match env::var("STORE_BACKEND").as_deref() {
            Err(_) | Ok("sqlite") => StoreBackend::Sqlite {
                database_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://school.db".to_string()),
            },
            Ok("rest") => StoreBackend::Rest {
                base_url: env::var("REST_URL")
                    .map_err(|_| AppError::Config("REST_URL is not set".to_string()))?,
                api_key: env::var("REST_API_KEY")
                    .map_err(|_| AppError::Config("REST_API_KEY is not set".to_string()))?,
            },
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be 'sqlite' or 'rest', got {:?}",
                    other
                )));
            }
        };

        let school_offset = match env::var("SCHOOL_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw)?,
            Err(_) => Utc.fix(),
        };

        let horizon_days = match env::var("RECONCILE_HORIZON_DAYS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| *days >= 0)
                .ok_or_else(|| {
                    AppError::Config(format!("RECONCILE_HORIZON_DAYS is invalid: {:?}", raw))
                })?,
            Err(_) => DEFAULT_HORIZON_DAYS,
        };

        Ok(Self {
            bind_addr,
            store,
            school_offset,
            horizon_days,
        })
    }
}

/// Parses `±HH:MM`, e.g. `+01:00`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, AppError> {
    let invalid = || AppError::Config(format!("SCHOOL_UTC_OFFSET is invalid: {:?}", raw));
    let raw = raw.trim();

    let (sign, rest) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+01:00").unwrap().local_minus_utc(), 3600);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("+00:00").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("01:00").is_err());
        assert!(parse_utc_offset("+1").is_err());
        assert!(parse_utc_offset("+01:75").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }
}
