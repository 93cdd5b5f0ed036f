use anyhow::{Context, Result};
use std::env;

use crate::services::video_metadata_service::{DEFAULT_VIMEO_OEMBED_URL, DEFAULT_YOUTUBE_OEMBED_URL};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub app_url: String,
    pub swap_request_ttl_hours: i64,
    pub run_migrations: bool,
    pub seed_demo_data: bool,
    pub smtp: Option<SmtpConfig>,
    pub s3_bucket: Option<String>,
    pub youtube_oembed_url: String,
    pub vimeo_oembed_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());
        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let swap_request_ttl_hours = parse_swap_ttl(env::var("SWAP_REQUEST_TTL_HOURS").ok())?;

        let run_migrations = parse_flag(env::var("RUN_MIGRATIONS").ok(), true);
        let seed_demo_data = parse_flag(env::var("SEED_DEMO_DATA").ok(), false);

        // Email is disabled unless an SMTP host is configured
        let smtp = match env::var("SMTP_HOST") {
            Ok(smtp_host) if !smtp_host.is_empty() => Some(SmtpConfig {
                host: smtp_host,
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .context("SMTP_PORT must be a valid port number")?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from_address: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Coach Platform <no-reply@localhost>".to_string()),
            }),
            _ => None,
        };

        let s3_bucket = env::var("S3_BUCKET").ok().filter(|bucket| !bucket.is_empty());

        let youtube_oembed_url = env::var("YOUTUBE_OEMBED_URL")
            .unwrap_or_else(|_| DEFAULT_YOUTUBE_OEMBED_URL.to_string());
        let vimeo_oembed_url = env::var("VIMEO_OEMBED_URL")
            .unwrap_or_else(|_| DEFAULT_VIMEO_OEMBED_URL.to_string());

        Ok(AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            app_url,
            swap_request_ttl_hours,
            run_migrations,
            seed_demo_data,
            smtp,
            s3_bucket,
            youtube_oembed_url,
            vimeo_oembed_url,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            app_url: "http://localhost:3000".to_string(),
            swap_request_ttl_hours: DEFAULT_SWAP_TTL_HOURS,
            run_migrations: true,
            seed_demo_data: false,
            smtp: None,
            s3_bucket: None,
            youtube_oembed_url: DEFAULT_YOUTUBE_OEMBED_URL.to_string(),
            vimeo_oembed_url: DEFAULT_VIMEO_OEMBED_URL.to_string(),
        }
    }
}

pub const DEFAULT_SWAP_TTL_HOURS: i64 = 48;
const MAX_SWAP_TTL_HOURS: i64 = 24 * 365;

/// Swap request lifetime in hours, 1..=8760
fn parse_swap_ttl(value: Option<String>) -> Result<i64> {
    let Some(raw) = value else {
        return Ok(DEFAULT_SWAP_TTL_HOURS);
    };

    let hours: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("SWAP_REQUEST_TTL_HOURS must be a whole number of hours, got {:?}", raw))?;
    if !(1..=MAX_SWAP_TTL_HOURS).contains(&hours) {
        anyhow::bail!("SWAP_REQUEST_TTL_HOURS must be between 1 and {}, got {}", MAX_SWAP_TTL_HOURS, hours);
    }
    Ok(hours)
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag(Some("true".to_string()), false));
        assert!(!parse_flag(Some("0".to_string()), true));
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("maybe".to_string()), false));
    }

    #[test]
    fn test_swap_ttl_parsing() {
        assert_eq!(parse_swap_ttl(None).unwrap(), 48);
        assert_eq!(parse_swap_ttl(Some(" 12 ".to_string())).unwrap(), 12);
        assert!(parse_swap_ttl(Some("two days".to_string())).is_err());
        assert!(parse_swap_ttl(Some("0".to_string())).is_err());
        assert!(parse_swap_ttl(Some("-4".to_string())).is_err());
        assert!(parse_swap_ttl(Some("9223372036854775807".to_string())).is_err());
    }

    #[test]
    fn test_server_address() {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..AppConfig::default()
        };

        assert_eq!(config.server_address(), "127.0.0.1:8080");
        assert!(config.is_development());
    }
}
