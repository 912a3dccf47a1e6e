//! PnL Service
//!
//! Fetches transaction history, normalizes it, and aggregates realized PnL.
//! Also backs the day-trades view with today's raw fills.

use crate::brokers::Broker;
use crate::error::Result;
use crate::normalize::{normalize_transaction, NormalizedTransaction};
use crate::pnl::{aggregate, PnlQuery, PnlReport};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// One row of the day-trades view.
#[derive(Debug, Clone, Serialize)]
pub struct DayTradeRow {
    pub time: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub gross: f64,
    pub fees: f64,
    pub net: f64,
    /// Order id when present, else transaction id.
    pub reference: String,
}

/// Today's fills plus reconciliation totals.
#[derive(Debug, Clone, Serialize)]
pub struct DayTradesReport {
    pub rows: Vec<DayTradeRow>,
    pub total_quantity: f64,
    pub total_gross: f64,
    pub total_fees: f64,
    pub total_net: f64,
}

/// PnL service for business logic
pub struct PnlService;

impl PnlService {
    /// Realized PnL for an account over the query's date range.
    pub async fn realized_pnl(
        broker: &dyn Broker,
        account_id_key: &str,
        query: &PnlQuery,
    ) -> Result<PnlReport> {
        info!(
            account_id_key,
            start = %query.start,
            end = %query.end,
            "PnlService::realized_pnl"
        );

        let raw = broker
            .list_transactions(account_id_key, query.start, query.end, query.symbol.as_deref())
            .await?;
        let transactions: Vec<NormalizedTransaction> =
            raw.iter().map(normalize_transaction).collect();

        let report = aggregate(&transactions, query);
        info!(
            buckets = report.buckets.len(),
            total = report.total_realized,
            "realized PnL aggregated"
        );
        Ok(report)
    }

    /// Today's transactions as display rows with gross/fees/net totals.
    pub async fn day_trades(
        broker: &dyn Broker,
        account_id_key: &str,
        today: NaiveDate,
    ) -> Result<DayTradesReport> {
        info!(account_id_key, %today, "PnlService::day_trades");

        let raw = broker
            .list_transactions(account_id_key, today, today, None)
            .await?;

        let mut rows = Vec::with_capacity(raw.len());
        let (mut total_quantity, mut total_gross, mut total_fees) = (0.0, 0.0, 0.0);
        for value in &raw {
            let txn = normalize_transaction(value);
            let net = txn.proceeds - txn.fees;
            total_quantity += txn.quantity;
            total_gross += txn.proceeds;
            total_fees += txn.fees;
            rows.push(DayTradeRow {
                time: txn.time.clone(),
                symbol: txn.symbol.clone(),
                side: txn.side.to_string(),
                quantity: txn.quantity,
                price: txn.price,
                gross: txn.proceeds,
                fees: txn.fees,
                net,
                reference: txn
                    .order_id
                    .clone()
                    .or(txn.transaction_id.clone())
                    .unwrap_or_default(),
            });
        }

        Ok(DayTradesReport {
            rows,
            total_quantity,
            total_gross,
            total_fees,
            total_net: total_gross - total_fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnl::{InstrumentType, TypeFilter};
    use crate::services::rotation_service::tests::MockBroker;
    use serde_json::json;

    fn march() -> PnlQuery {
        PnlQuery {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            symbol: None,
            instrument: TypeFilter::All,
        }
    }

    #[tokio::test]
    async fn realized_pnl_normalizes_and_aggregates() {
        let broker = MockBroker {
            transactions: vec![
                json!({
                    "transactionDate": "2024-03-04",
                    "symbol": "abc",
                    "transactionType": "Buy",
                    "quantity": 10,
                    "amount": 1000.0,
                    "fees": 0.5,
                    "commission": 0.5,
                }),
                json!({
                    "transactionDate": "2024-03-05",
                    "symbol": "ABC",
                    "transactionType": "Sell",
                    "quantity": 10,
                    "amount": 1200.0,
                    "commission": 1.0,
                }),
            ],
            ..Default::default()
        };

        let report = PnlService::realized_pnl(&broker, "acct", &march()).await.unwrap();
        assert_eq!(report.buckets.len(), 1);
        let bucket = &report.buckets[0];
        assert_eq!(bucket.symbol, "ABC");
        assert_eq!(bucket.instrument_type, InstrumentType::Stocks);
        assert_eq!(bucket.trade_count, 2);
        assert!((bucket.realized - 198.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_history_yields_an_empty_report() {
        let broker = MockBroker::default();
        let report = PnlService::realized_pnl(&broker, "acct", &march()).await.unwrap();
        assert!(report.buckets.is_empty());
        assert_eq!(report.total_realized, 0.0);
    }

    #[tokio::test]
    async fn day_trades_reconcile_totals() {
        let broker = MockBroker {
            transactions: vec![
                json!({
                    "transactionDate": "2024-03-04",
                    "symbol": "AAA",
                    "transactionType": "Buy",
                    "quantity": 2,
                    "price": 50.0,
                    "amount": 100.0,
                    "commission": 1.0,
                    "orderId": "ord-1",
                }),
                json!({
                    "transactionDate": "2024-03-04",
                    "symbol": "AAA",
                    "transactionType": "Sell",
                    "quantity": 2,
                    "amount": 110.0,
                    "fees": 0.5,
                    "transactionId": "txn-2",
                }),
            ],
            ..Default::default()
        };

        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let report = PnlService::day_trades(&broker, "acct", today).await.unwrap();

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].reference, "ord-1");
        assert_eq!(report.rows[1].reference, "txn-2");
        assert!((report.rows[0].net - 99.0).abs() < 1e-9);
        assert!((report.total_gross - 210.0).abs() < 1e-9);
        assert!((report.total_fees - 1.5).abs() < 1e-9);
        assert!((report.total_net - 208.5).abs() < 1e-9);
    }
}
