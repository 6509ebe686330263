//! API configuration module.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults ([`ApiConfig::default`])
//! 2. Optional `emporium.toml` in the working directory
//! 3. `EMPORIUM_*` environment variables (`EMPORIUM_HTTP_PORT`,
//!    `EMPORIUM_JWT_SECRET`, `EMPORIUM_CORS_ORIGINS=a,b`, ...)

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// HMAC secret for bearer tokens
    pub jwt_secret: String,

    /// Bearer token lifetime in days
    pub jwt_lifetime_days: i64,

    /// Redis connection string. Without it OTPs and notification feeds
    /// live in process memory.
    pub redis_url: Option<String>,

    /// SMTP relay host. Without it sends fail unless `mail_outbox` is set.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    /// Sender mailbox, e.g. `Emporium <no-reply@example.com>`
    pub mail_from: String,

    /// Keep mail in an in-process outbox when SMTP is not configured.
    /// Development only: nothing leaves the process.
    pub mail_outbox: bool,

    /// Gateway key id, returned to the storefront with each gateway order
    pub razorpay_key_id: String,

    /// Gateway key secret, signs checkout callbacks
    pub razorpay_key_secret: String,

    /// Webhook secret, signs webhook bodies
    pub razorpay_webhook_secret: String,

    /// Gateway REST base URL
    pub razorpay_api_base: String,

    /// ISO currency for gateway orders
    pub currency: String,

    /// Allowed browser origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 5000,
            database_path: "./emporium.db".to_string(),
            // In production, this MUST be set via EMPORIUM_JWT_SECRET
            jwt_secret: "emporium-dev-secret-change-in-production".to_string(),
            jwt_lifetime_days: 30,
            redis_url: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            mail_from: "Emporium <no-reply@emporium.local>".to_string(),
            mail_outbox: false,
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            razorpay_webhook_secret: String::new(),
            razorpay_api_base: "https://api.razorpay.com/v1".to_string(),
            currency: "INR".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `emporium.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config: ApiConfig = Config::builder()
            .add_source(File::with_name("emporium").required(false))
            .add_source(
                Environment::with_prefix("EMPORIUM")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }

        if self.jwt_lifetime_days <= 0 {
            return Err(ConfigError::InvalidValue("jwt_lifetime_days".to_string()));
        }

        if self.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }

        // Validate SMTP configuration
        if self.smtp_host.is_some()
            && (self.smtp_username.is_none() || self.smtp_password.is_none())
        {
            return Err(ConfigError::MissingSmtpCredentials);
        }

        if self.currency.len() != 3 {
            return Err(ConfigError::InvalidValue("currency".to_string()));
        }

        Ok(())
    }

    /// Whether gateway orders can be created.
    pub fn gateway_enabled(&self) -> bool {
        !self.razorpay_key_id.is_empty() && !self.razorpay_key_secret.is_empty()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("SMTP host configured but username or password not provided")]
    MissingSmtpCredentials,

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.jwt_lifetime_days, 30);
        assert_eq!(config.currency, "INR");
        assert!(!config.gateway_enabled());
        assert!(!config.mail_outbox);
    }

    #[test]
    fn test_smtp_host_requires_credentials() {
        let config = ApiConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_username: Some("mailer".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSmtpCredentials)
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = ApiConfig {
            jwt_secret: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(field)) if field == "jwt_secret"
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ApiConfig = Config::builder()
            .add_source(File::from_str(
                "http_port = 8080\ncors_origins = [\"http://localhost:5173\"]",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.database_path, "./emporium.db");
    }
}
