use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::notification::Permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub public_base_url: String,
    pub static_dir: PathBuf,
    pub seed_file: Option<PathBuf>,
    pub geolocation_enabled: bool,
    pub messaging_enabled: bool,
    pub notification_permission: Permission,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let http_port = parse_or_default("HTTP_PORT", 3000)?;

        Ok(Self {
            http_port,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{http_port}")),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            seed_file: env::var("SEED_FILE").ok().map(PathBuf::from),
            geolocation_enabled: parse_or_default("GEOLOCATION_ENABLED", true)?,
            messaging_enabled: parse_or_default("MESSAGING_ENABLED", true)?,
            notification_permission: match env::var("NOTIFICATION_PERMISSION") {
                Ok(raw) => parse_permission(&raw)?,
                Err(_) => Permission::Granted,
            },
        })
    }
}

fn parse_permission(raw: &str) -> Result<Permission, AppError> {
    match raw {
        "granted" => Ok(Permission::Granted),
        "denied" => Ok(Permission::Denied),
        other => Err(AppError::Internal(format!(
            "invalid NOTIFICATION_PERMISSION: {other}"
        ))),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_permission, LogFormat};
    use crate::models::notification::Permission;

    #[test]
    fn log_format_accepts_known_values() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn permission_parsing_is_strict() {
        assert_eq!(parse_permission("denied").unwrap(), Permission::Denied);
        assert!(parse_permission("maybe").is_err());
    }
}
