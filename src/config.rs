// Environment configuration

use std::time::Duration;

use crate::auth::{
    email::SmtpConfig,
    otp::DEFAULT_OTP_TTL_SECONDS,
    token::{DEFAULT_ACCESS_TOKEN_SECONDS, DEFAULT_PROFILE_TOKEN_MINUTES},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_seconds: i64,
    pub profile_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub otp_ttl_seconds: i64,
    pub redis_url: Option<String>,
    /// `None` when SMTP_HOST is unset; codes are then only logged as sent
    pub smtp: Option<SmtpConfig>,
    pub upload_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            access_ttl_seconds: parse_or(&get, "JWT_TTL_SECONDS", DEFAULT_ACCESS_TOKEN_SECONDS)?,
            profile_ttl_minutes: parse_or(
                &get,
                "PROFILE_TOKEN_TTL_MINUTES",
                DEFAULT_PROFILE_TOKEN_MINUTES,
            )?,
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = required("SMTP_USER")?;
                Some(SmtpConfig {
                    host,
                    port: parse_or(&get, "SMTP_PORT", 587u16)?,
                    from: get("SMTP_FROM").unwrap_or_else(|| username.clone()),
                    username,
                    password: required("SMTP_PASSWORD")?,
                    timeout: Duration::from_secs(parse_or(&get, "SMTP_TIMEOUT_SECONDS", 10u64)?),
                })
            }
            None => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8080u16)?,
            jwt,
            otp_ttl_seconds: parse_or(&get, "OTP_TTL_SECONDS", DEFAULT_OTP_TTL_SECONDS)?,
            redis_url: get("REDIS_URL"),
            smtp,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
