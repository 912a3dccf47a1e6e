//! Common broker types

use serde::{Deserialize, Serialize};

/// API environment to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ApiEnv {
    #[serde(rename = "SB")]
    Sandbox,
    #[default]
    #[serde(rename = "PROD")]
    Prod,
}

/// Credentials for a signed API session.
///
/// The access token pair is obtained out of band (PIN authorization flow);
/// this crate only signs requests with it.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// A brokerage account, normalized from the account list payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Opaque key used in account-scoped endpoint paths.
    pub id_key: String,
    pub id: String,
    pub name: String,
    pub account_type: Option<String>,
}
