//! E*TRADE broker adapter
//!
//! Thin wrapper over the v1 accounts REST API: OAuth1-signed requests, marker
//! pagination, and the request fallback ladder the live API occasionally
//! requires (some deployments reject transaction date parameters with 400,
//! and change previews accept PUT or POST depending on gateway).
//!
//! Responses are returned as raw payload objects; shaping them into stable
//! records is the normalizer's job.

pub mod oauth;

use crate::brokers::types::{Account, ApiEnv, BrokerCredentials};
use crate::brokers::Broker;
use crate::error::{AppError, Result};
use crate::rotation::ChangeRequest;
use async_trait::async_trait;
use chrono::NaiveDate;
use oauth::OauthKeys;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

const SANDBOX_BASE: &str = "https://apisb.etrade.com";
const PROD_BASE: &str = "https://api.etrade.com";

/// Safety cap on transaction pagination.
const MAX_TRANSACTION_PAGES: usize = 10;

const PAGE_SIZE: u32 = 50;

/// E*TRADE REST client.
pub struct ETradeClient {
    http: Client,
    env: ApiEnv,
    keys: OauthKeys,
}

impl ETradeClient {
    pub fn new(env: ApiEnv, credentials: BrokerCredentials) -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            env,
            keys: OauthKeys {
                consumer_key: credentials.consumer_key.trim().to_string(),
                consumer_secret: credentials.consumer_secret.trim().to_string(),
                access_token: credentials.access_token.trim().to_string(),
                access_token_secret: credentials.access_token_secret.trim().to_string(),
            },
        }
    }

    fn base(&self) -> &'static str {
        match self.env {
            ApiEnv::Sandbox => SANDBOX_BASE,
            ApiEnv::Prod => PROD_BASE,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }

    async fn signed_get(&self, url: &str, params: &[(String, String)]) -> Result<reqwest::Response> {
        let auth = oauth::authorization_header(&self.keys, "GET", url, params);
        debug!(%url, ?params, "GET");
        let mut request = self
            .http
            .get(url)
            .header("Authorization", auth)
            .header("Accept", "application/json");
        if !params.is_empty() {
            request = request.query(params);
        }
        Ok(request.send().await?)
    }

    async fn signed_write(
        &self,
        method: Method,
        url: &str,
        payload: &ChangeRequest,
    ) -> Result<reqwest::Response> {
        let auth = oauth::authorization_header(&self.keys, method.as_str(), url, &[]);
        debug!(%url, method = %method, "write");
        Ok(self
            .http
            .request(method, url)
            .header("Authorization", auth)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?)
    }

    /// Decode a response body, mapping HTTP failures to broker errors.
    async fn into_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Object(Default::default()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(300).collect::<String>();
            if status == StatusCode::UNAUTHORIZED {
                return Err(AppError::Auth(format!("HTTP 401: {}", body)));
            }
            return Err(AppError::Broker(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(response.json().await?)
    }
}

/// A payload node that may be a list, a lone object, or absent.
fn ensure_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        _ => Vec::new(),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text(obj.get(*k)))
}

/// One page of the orders listing: raw orders plus the continuation marker.
fn orders_page(data: &Value) -> (Vec<Value>, Option<String>) {
    let node = data
        .get("OrdersResponse")
        .or_else(|| data.get("OrderListResponse"))
        .unwrap_or(data);
    let orders = ensure_list(node.get("Order").or_else(|| node.get("order")));
    (orders, text(node.get("marker")))
}

/// One page of the transactions listing: records, marker, more-pages flag.
fn transactions_page(data: &Value) -> (Vec<Value>, Option<String>, bool) {
    let node = data.get("TransactionListResponse").unwrap_or(data);
    let records = ensure_list(node.get("Transaction"));
    let more = node
        .get("moreTransactions")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    (records, text(node.get("marker")), more)
}

fn account_from(raw: &Value) -> Account {
    let id = str_field(raw, &["accountId", "accountIdMasked"]).unwrap_or_default();
    let id_key = str_field(raw, &["accountIdKey", "accountId"]).unwrap_or_default();
    let name = str_field(raw, &["accountName", "accountDesc", "displayName"])
        .unwrap_or_else(|| id.clone());
    Account {
        id_key,
        id,
        name,
        account_type: str_field(raw, &["accountType"]),
    }
}

fn mmddyyyy(date: NaiveDate) -> String {
    date.format("%m%d%Y").to_string()
}

#[async_trait]
impl Broker for ETradeClient {
    fn id(&self) -> &'static str {
        "etrade"
    }

    fn name(&self) -> &'static str {
        "E*TRADE"
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let url = self.url("/v1/accounts/list.json");
        let data = Self::into_json(self.signed_get(&url, &[]).await?).await?;

        let node = data
            .get("AccountListResponse")
            .and_then(|n| n.get("Accounts"))
            .and_then(|n| n.get("Account"));
        let accounts: Vec<Account> = ensure_list(node).iter().map(account_from).collect();
        info!(count = accounts.len(), "accounts listed");
        Ok(accounts)
    }

    async fn list_open_orders(
        &self,
        account_id_key: &str,
        symbol: Option<&str>,
    ) -> Result<Vec<Value>> {
        let url = self.url(&format!("/v1/accounts/{}/orders.json", account_id_key));
        let mut params = vec![
            ("status".to_string(), "OPEN".to_string()),
            ("count".to_string(), PAGE_SIZE.to_string()),
        ];
        if let Some(sym) = symbol {
            params.push(("symbol".to_string(), sym.to_string()));
        }

        let mut orders = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let mut query = params.clone();
            if let Some(m) = &marker {
                query.push(("marker".to_string(), m.clone()));
            }
            let data = Self::into_json(self.signed_get(&url, &query).await?).await?;
            pages += 1;
            let (page, next) = orders_page(&data);
            orders.extend(page);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        info!(count = orders.len(), pages, "open orders fetched");
        Ok(orders)
    }

    async fn list_transactions(
        &self,
        account_id_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        symbol: Option<&str>,
    ) -> Result<Vec<Value>> {
        let url = self.url(&format!("/v1/accounts/{}/transactions.json", account_id_key));

        let mut full = vec![
            ("startDate".to_string(), mmddyyyy(start)),
            ("endDate".to_string(), mmddyyyy(end)),
            ("count".to_string(), PAGE_SIZE.to_string()),
        ];
        if let Some(sym) = symbol {
            full.push(("symbol".to_string(), sym.to_string()));
        }
        // Some gateways reject date parameters outright; retry bare, then with
        // count only, before giving up.
        let attempts: Vec<Vec<(String, String)>> = vec![
            full,
            Vec::new(),
            vec![("count".to_string(), PAGE_SIZE.to_string())],
        ];

        for params in &attempts {
            let response = self.signed_get(&url, params).await?;
            if response.status() == StatusCode::BAD_REQUEST {
                warn!(?params, "transactions request rejected, trying next parameter set");
                continue;
            }
            let data = Self::into_json(response).await?;
            let (mut records, mut marker, mut more) = transactions_page(&data);

            let mut pages = 1usize;
            while more && marker.is_some() && pages < MAX_TRANSACTION_PAGES {
                let mut query = params.clone();
                query.push(("marker".to_string(), marker.unwrap()));
                let data = Self::into_json(self.signed_get(&url, &query).await?).await?;
                let (page, next, next_more) = transactions_page(&data);
                records.extend(page);
                marker = next;
                more = next_more;
                pages += 1;
            }
            info!(count = records.len(), pages, "transactions fetched");
            return Ok(records);
        }

        Err(AppError::Broker(
            "transactions request rejected for every parameter set".to_string(),
        ))
    }

    async fn preview_order_change(
        &self,
        account_id_key: &str,
        order_id: &str,
        payload: &ChangeRequest,
    ) -> Result<Value> {
        let url = self.url(&format!(
            "/v1/accounts/{}/orders/{}/change/preview.json",
            account_id_key, order_id
        ));
        let response = self.signed_write(Method::PUT, &url, payload).await?;
        // Older gateways only accept POST here.
        let response = if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
        ) {
            self.signed_write(Method::POST, &url, payload).await?
        } else {
            response
        };
        Self::into_json(response).await
    }

    async fn place_order_change(
        &self,
        account_id_key: &str,
        order_id: &str,
        payload: &ChangeRequest,
    ) -> Result<Value> {
        let url = self.url(&format!(
            "/v1/accounts/{}/orders/{}/change/place.json",
            account_id_key, order_id
        ));
        let response = self.signed_write(Method::POST, &url, payload).await?;
        Self::into_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_list_accepts_lists_objects_and_absence() {
        assert_eq!(ensure_list(Some(&json!([1, 2]))).len(), 2);
        assert_eq!(ensure_list(Some(&json!({"a": 1}))).len(), 1);
        assert!(ensure_list(Some(&json!(null))).is_empty());
        assert!(ensure_list(None).is_empty());
    }

    #[test]
    fn orders_page_extracts_orders_and_marker() {
        let data = json!({
            "OrdersResponse": {
                "Order": [{"orderId": 1}, {"orderId": 2}],
                "marker": 99887766,
            }
        });
        let (orders, marker) = orders_page(&data);
        assert_eq!(orders.len(), 2);
        assert_eq!(marker.as_deref(), Some("99887766"));
    }

    #[test]
    fn orders_page_handles_lone_order_object_and_no_marker() {
        let data = json!({"OrdersResponse": {"Order": {"orderId": 1}}});
        let (orders, marker) = orders_page(&data);
        assert_eq!(orders.len(), 1);
        assert_eq!(marker, None);
    }

    #[test]
    fn transactions_page_reads_more_flag() {
        let data = json!({
            "TransactionListResponse": {
                "Transaction": [{"transactionId": 1}],
                "marker": "abc",
                "moreTransactions": true,
            }
        });
        let (records, marker, more) = transactions_page(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(marker.as_deref(), Some("abc"));
        assert!(more);
    }

    #[test]
    fn transactions_page_accepts_flattened_payloads() {
        let data = json!({"Transaction": [{"transactionId": 1}]});
        let (records, marker, more) = transactions_page(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(marker, None);
        assert!(!more);
    }

    #[test]
    fn account_mapping_uses_fallback_chains() {
        let raw = json!({
            "accountId": "840104290",
            "accountIdKey": "JIdOIAcSpwR1Jva7RQBaYg",
            "accountDesc": "  Brokerage  ",
            "accountType": "INDIVIDUAL",
        });
        let account = account_from(&raw);
        assert_eq!(account.id_key, "JIdOIAcSpwR1Jva7RQBaYg");
        assert_eq!(account.name, "Brokerage");
        assert_eq!(account.account_type.as_deref(), Some("INDIVIDUAL"));

        let minimal = account_from(&json!({"accountId": 123}));
        assert_eq!(minimal.id_key, "123");
        assert_eq!(minimal.name, "123");
    }

    #[test]
    fn date_parameters_use_mmddyyyy() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(mmddyyyy(date), "03042024");
    }

    #[test]
    fn environments_select_their_base_url() {
        let creds = BrokerCredentials {
            consumer_key: "k".into(),
            consumer_secret: "s".into(),
            access_token: "t".into(),
            access_token_secret: "ts".into(),
        };
        let sandbox = ETradeClient::new(ApiEnv::Sandbox, creds.clone());
        let prod = ETradeClient::new(ApiEnv::Prod, creds);
        assert_eq!(sandbox.base(), "https://apisb.etrade.com");
        assert_eq!(prod.base(), "https://api.etrade.com");
        assert!(sandbox
            .url("/v1/accounts/list.json")
            .starts_with("https://apisb.etrade.com/v1/"));
    }
}
