use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server configuration, read once from the environment at startup and
/// handed to the collaborators that need it. Nothing else in the process
/// reads env vars.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub otp_ttl: Duration,
    pub mail: MailConfig,
}

pub enum MailConfig {
    /// No provider configured: log OTP codes instead of sending mail.
    Log,
    HttpApi {
        endpoint: String,
        api_token: String,
        from: String,
    },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PARLEY_PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let db_path =
            PathBuf::from(std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into()));
        let jwt_secret =
            std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let otp_ttl_secs: u64 = std::env::var("PARLEY_OTP_TTL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .context("PARLEY_OTP_TTL_SECS must be a number of seconds")?;

        let mail = match (
            std::env::var("PARLEY_MAIL_ENDPOINT"),
            std::env::var("PARLEY_MAIL_TOKEN"),
        ) {
            (Ok(endpoint), Ok(api_token)) => MailConfig::HttpApi {
                endpoint,
                api_token,
                from: std::env::var("PARLEY_MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@parley.local".into()),
            },
            _ => MailConfig::Log,
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            otp_ttl: Duration::from_secs(otp_ttl_secs),
            mail,
        })
    }
}
