//! Broker adapters module
//!
//! The core consumes raw order/transaction payloads and hands back typed
//! change requests; everything broker-specific (endpoints, signing,
//! pagination, fallback request ladders) lives behind this trait.

pub mod etrade;
pub mod types;

use crate::error::Result;
use crate::rotation::ChangeRequest;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use types::Account;

/// Brokerage REST API surface required by the rotation and PnL services.
///
/// Order and transaction listings return raw payload objects; shaping them is
/// the normalizer's job, so every endpoint variant funnels through one
/// contract.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Broker ID (e.g., "etrade")
    fn id(&self) -> &'static str;

    /// Broker display name
    fn name(&self) -> &'static str;

    /// List accounts visible to the session.
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// List open orders, fully paged through the continuation marker.
    async fn list_open_orders(
        &self,
        account_id_key: &str,
        symbol: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// List transactions in [start, end], fully paged.
    async fn list_transactions(
        &self,
        account_id_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        symbol: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// Preview a change to an existing order.
    async fn preview_order_change(
        &self,
        account_id_key: &str,
        order_id: &str,
        payload: &ChangeRequest,
    ) -> Result<Value>;

    /// Place a previously previewed change.
    async fn place_order_change(
        &self,
        account_id_key: &str,
        order_id: &str,
        payload: &ChangeRequest,
    ) -> Result<Value>;
}
