//! Application state management

use crate::brokers::etrade::ETradeClient;
use crate::brokers::types::BrokerCredentials;
use crate::brokers::Broker;
use crate::config::AppConfig;
use parking_lot::RwLock;
use std::sync::Arc;

/// State shared by the scheduler and any front end driving the services.
pub struct AppState {
    /// Broker adapter the services talk to.
    pub broker: Arc<dyn Broker>,

    /// Live configuration: account selection, dry-run flag, schedule.
    pub config: RwLock<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, broker: Arc<dyn Broker>) -> Self {
        Self { broker, config: RwLock::new(config) }
    }

    /// Build state backed by the E*TRADE client, pairing the configured
    /// consumer keys with an access token obtained out of band.
    pub fn with_etrade(config: AppConfig, access_token: &str, access_token_secret: &str) -> Self {
        let credentials = BrokerCredentials {
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            access_token: access_token.to_string(),
            access_token_secret: access_token_secret.to_string(),
        };
        let broker = Arc::new(ETradeClient::new(config.env, credentials));
        Self::new(config, broker)
    }

    /// Select the account scheduled rotations act on.
    pub fn set_account(&self, account_id_key: Option<String>) {
        self.config.write().account_id_key = account_id_key;
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.config.write().dry_run = dry_run;
    }

    pub fn dry_run(&self) -> bool {
        self.config.read().dry_run
    }
}
