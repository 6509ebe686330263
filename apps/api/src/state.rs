//! Application state shared across handlers.

use std::sync::Arc;

use tracing::{info, warn};

use emporium_db::{Database, DbConfig};

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::email::{Mailer, OutboxMailer, SmtpMailer};
use crate::feed::NotificationFeed;
use crate::gateway::GatewayClient;
use crate::kv::{KvStore, RedisStore};
use emporium_core::notification::NotificationKind;

/// Everything a handler needs. Cheap to clone: every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub kv: KvStore,
    pub mailer: Mailer,
    pub jwt: JwtManager,
    pub gateway: GatewayClient,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Connects every backend named in `config`.
    pub async fn from_config(config: ApiConfig) -> anyhow::Result<Self> {
        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        info!(path = %config.database_path, "Database ready");

        let kv = match &config.redis_url {
            Some(url) => KvStore::Redis(RedisStore::connect(url).await?),
            None => {
                warn!("No Redis URL configured, OTPs and notifications are kept in memory");
                KvStore::memory()
            }
        };

        let mailer = match (&config.smtp_host, &config.smtp_username, &config.smtp_password) {
            (Some(host), Some(username), Some(password)) => Mailer::Smtp(SmtpMailer::new(
                host,
                config.smtp_port,
                username.clone(),
                password.clone(),
                &config.mail_from,
            )?),
            _ if config.mail_outbox => {
                warn!("SMTP not configured, emails are kept in an in-memory outbox");
                Mailer::Outbox(OutboxMailer::new())
            }
            _ => {
                warn!("SMTP not configured, sending email (including OTPs) will fail");
                Mailer::Disabled
            }
        };

        if !config.gateway_enabled() {
            warn!("Razorpay keys not configured, gateway orders are disabled");
        }

        Ok(Self::new(db, kv, mailer, config))
    }

    pub fn new(db: Database, kv: KvStore, mailer: Mailer, config: ApiConfig) -> Self {
        AppState {
            jwt: JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_days),
            gateway: GatewayClient::new(
                config.razorpay_api_base.clone(),
                config.razorpay_key_id.clone(),
                config.razorpay_key_secret.clone(),
            ),
            db,
            kv,
            mailer,
            config: Arc::new(config),
        }
    }

    pub fn feed(&self, kind: NotificationKind) -> NotificationFeed {
        NotificationFeed::new(self.kv.clone(), kind)
    }
}
