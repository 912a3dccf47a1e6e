//! Rotation Service
//!
//! Fetches open orders, normalizes them, and moves each between trading
//! sessions/durations. In dry-run mode the constructed payloads are logged
//! and never sent to the write endpoints.

use crate::brokers::Broker;
use crate::error::{AppError, Result};
use crate::normalize::{normalize_order, NormalizedOrder, OrderFilter};
use crate::rotation::{build_change_request, RotationAction};
use crate::state::AppState;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// Outcome of one order within a bulk rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RotationStatus {
    /// Change previewed and placed.
    Changed,
    /// Payload built and logged; write endpoints skipped.
    DryRun,
    /// Order could not be rotated (e.g. missing quantity); nothing sent.
    Skipped,
    /// The broker rejected the preview or placement.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationOutcome {
    pub order_id: String,
    pub symbol: String,
    pub status: RotationStatus,
    pub message: String,
}

/// Result of a bulk rotation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub action: RotationAction,
    pub dry_run: bool,
    pub outcomes: Vec<RotationOutcome>,
}

impl RotationReport {
    pub fn changed(&self) -> usize {
        self.count(RotationStatus::Changed)
    }

    pub fn skipped(&self) -> usize {
        self.count(RotationStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(RotationStatus::Failed)
    }

    fn count(&self, status: RotationStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Rotation service for business logic
pub struct RotationService;

impl RotationService {
    /// Fetch and normalize the open orders a rotation would touch.
    pub async fn preview_open_orders(
        broker: &dyn Broker,
        account_id_key: &str,
        filter: &OrderFilter,
    ) -> Result<Vec<NormalizedOrder>> {
        info!(account_id_key, "RotationService::preview_open_orders");

        let raw_orders = broker.list_open_orders(account_id_key, None).await?;
        let orders: Vec<NormalizedOrder> = raw_orders
            .iter()
            .flat_map(|raw| normalize_order(raw))
            .filter(|order| filter.matches(order))
            .collect();
        info!(count = orders.len(), "open orders normalized");
        Ok(orders)
    }

    /// Change a single order to the target session/duration.
    ///
    /// Propagates [`AppError::MissingQuantity`] without sending anything, so
    /// callers can block submission of malformed payloads.
    pub async fn change_order(
        broker: &dyn Broker,
        account_id_key: &str,
        order: &NormalizedOrder,
        action: RotationAction,
        dry_run: bool,
    ) -> Result<Option<Value>> {
        let payload = build_change_request(order, action)?;

        if dry_run {
            info!(
                order_id = %order.order_id,
                symbol = %order.symbol,
                payload = %serde_json::to_string(&payload)?,
                "dry run, change not submitted"
            );
            return Ok(None);
        }

        broker
            .preview_order_change(account_id_key, &order.order_id, &payload)
            .await?;
        let placed = broker
            .place_order_change(account_id_key, &order.order_id, &payload)
            .await?;
        info!(order_id = %order.order_id, symbol = %order.symbol, %action, "order changed");
        Ok(Some(placed))
    }

    /// Rotate every open order matching `filter` to the target
    /// session/duration, collecting a per-order outcome.
    pub async fn rotate_open_orders(
        broker: &dyn Broker,
        account_id_key: &str,
        action: RotationAction,
        filter: &OrderFilter,
        dry_run: bool,
    ) -> Result<RotationReport> {
        info!(account_id_key, %action, dry_run, "RotationService::rotate_open_orders");

        let orders = Self::preview_open_orders(broker, account_id_key, filter).await?;

        let mut outcomes = Vec::with_capacity(orders.len());
        for order in &orders {
            let outcome = match Self::change_order(broker, account_id_key, order, action, dry_run)
                .await
            {
                Ok(Some(_)) => RotationOutcome {
                    order_id: order.order_id.clone(),
                    symbol: order.symbol.clone(),
                    status: RotationStatus::Changed,
                    message: "changed".to_string(),
                },
                Ok(None) => RotationOutcome {
                    order_id: order.order_id.clone(),
                    symbol: order.symbol.clone(),
                    status: RotationStatus::DryRun,
                    message: "dry run".to_string(),
                },
                Err(err @ AppError::MissingQuantity(_)) => {
                    warn!(order_id = %order.order_id, "skipping order: {}", err);
                    RotationOutcome {
                        order_id: order.order_id.clone(),
                        symbol: order.symbol.clone(),
                        status: RotationStatus::Skipped,
                        message: err.to_string(),
                    }
                }
                Err(err) => {
                    error!(order_id = %order.order_id, "failed to change order: {}", err);
                    RotationOutcome {
                        order_id: order.order_id.clone(),
                        symbol: order.symbol.clone(),
                        status: RotationStatus::Failed,
                        message: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RotationReport { action, dry_run, outcomes };
        info!(
            changed = report.changed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "rotation pass complete"
        );
        Ok(report)
    }

    /// Scheduler entry point: rotate the configured account with the
    /// configured dry-run flag. Errors are logged, not propagated, since the
    /// tick loop has no caller to hand them to.
    pub async fn run_scheduled(state: &AppState, action: RotationAction) {
        let (account, dry_run) = {
            let config = state.config.read();
            (config.account_id_key.clone(), config.dry_run)
        };

        let Some(account_id_key) = account else {
            warn!(%action, "scheduled rotation skipped: no account configured");
            return;
        };

        match Self::rotate_open_orders(
            state.broker.as_ref(),
            &account_id_key,
            action,
            &OrderFilter::default(),
            dry_run,
        )
        .await
        {
            Ok(report) => info!(
                changed = report.changed(),
                skipped = report.skipped(),
                failed = report.failed(),
                dry_run,
                "scheduled rotation finished"
            ),
            Err(err) => error!(%action, "scheduled rotation failed: {}", err),
        }
    }
}
