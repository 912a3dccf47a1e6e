//! Order change construction
//!
//! Builds the E*TRADE change-preview payload that moves an open order between
//! trading sessions and order durations while keeping symbol, side, quantity,
//! and (for limit orders) the limit price intact.

use crate::error::{AppError, Result};
use crate::normalize::NormalizedOrder;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Trading-hours window for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSession {
    Regular,
    Extended,
}

impl MarketSession {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSession::Regular => "REGULAR",
            MarketSession::Extended => "EXTENDED",
        }
    }
}

/// Order time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTerm {
    GoodForDay,
    GoodUntilCancel,
}

impl OrderTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderTerm::GoodForDay => "GOOD_FOR_DAY",
            OrderTerm::GoodUntilCancel => "GOOD_UNTIL_CANCEL",
        }
    }
}

/// A session/duration pair applied to orders during a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationAction {
    pub session: MarketSession,
    pub term: OrderTerm,
}

impl RotationAction {
    /// Morning rotation: good-until-cancel orders become extended-hours day
    /// orders.
    pub fn gtc_to_extended() -> Self {
        Self { session: MarketSession::Extended, term: OrderTerm::GoodForDay }
    }

    /// Evening rotation: extended-hours orders return to regular-session
    /// good-until-cancel.
    pub fn extended_to_gtc() -> Self {
        Self { session: MarketSession::Regular, term: OrderTerm::GoodUntilCancel }
    }
}

impl std::fmt::Display for RotationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session={} duration={}", self.session.as_str(), self.term.as_str())
    }
}

/// `Product` node of the change payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    #[serde(rename = "securityType")]
    pub security_type: String,
    pub symbol: String,
}

/// `Instrument` node of the change payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    #[serde(rename = "Product")]
    pub product: Product,
    #[serde(rename = "orderAction")]
    pub order_action: String,
    #[serde(rename = "quantityType")]
    pub quantity_type: String,
    pub quantity: f64,
    /// Present only for limit orders; market and stop orders omit the field
    /// entirely rather than sending a synthesized zero.
    #[serde(rename = "limitPrice", skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
}

/// One `Order` entry of the change payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBody {
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    #[serde(rename = "priceType")]
    pub price_type: String,
    #[serde(rename = "orderTerm")]
    pub order_term: String,
    #[serde(rename = "marketSession")]
    pub market_session: String,
    #[serde(rename = "Instrument")]
    pub instrument: Vec<Instrument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewOrderRequest {
    #[serde(rename = "orderType")]
    pub order_type: String,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: i64,
    #[serde(rename = "Order")]
    pub order: Vec<OrderBody>,
}

/// Change-preview request payload, E*TRADE wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRequest {
    #[serde(rename = "PreviewOrderRequest")]
    pub preview_order_request: PreviewOrderRequest,
}

/// Build a change request for `order` with an idempotency token derived from
/// the wall clock.
///
/// Returns [`AppError::MissingQuantity`] when the order carries no quantity;
/// the payload must never default it.
pub fn build_change_request(order: &NormalizedOrder, action: RotationAction) -> Result<ChangeRequest> {
    build_change_request_at(order, action, Utc::now().timestamp_millis())
}

/// As [`build_change_request`] with the client order id supplied explicitly,
/// so callers comparing payloads structurally can pin the one variable field.
pub fn build_change_request_at(
    order: &NormalizedOrder,
    action: RotationAction,
    client_order_id: i64,
) -> Result<ChangeRequest> {
    let quantity = order
        .quantity
        .ok_or_else(|| AppError::MissingQuantity(order.order_id.clone()))?;

    // Orders arriving without a price type are limit orders in practice.
    let price_type = order.price_type.clone().unwrap_or_else(|| "LIMIT".to_string());
    let limit_price = if price_type.eq_ignore_ascii_case("LIMIT") { order.price } else { None };

    let instrument = Instrument {
        product: Product { security_type: "EQ".to_string(), symbol: order.symbol.clone() },
        order_action: order.side.to_string(),
        quantity_type: "QUANTITY".to_string(),
        quantity,
        limit_price,
    };

    Ok(ChangeRequest {
        preview_order_request: PreviewOrderRequest {
            order_type: "EQ".to_string(),
            client_order_id,
            order: vec![OrderBody {
                all_or_none: false,
                price_type,
                order_term: action.term.as_str().to_string(),
                market_session: action.session.as_str().to_string(),
                instrument: vec![instrument],
            }],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Side;

    fn limit_order() -> NormalizedOrder {
        NormalizedOrder {
            order_id: "123".to_string(),
            symbol: "MSFT".to_string(),
            side: Side::Buy,
            quantity: Some(10.0),
            price: Some(415.25),
            price_type: Some("LIMIT".to_string()),
            session: Some("REGULAR".to_string()),
            duration: Some("GOOD_UNTIL_CANCEL".to_string()),
            placed_time: None,
        }
    }

    #[test]
    fn missing_quantity_is_rejected() {
        let mut order = limit_order();
        order.quantity = None;
        let err = build_change_request(&order, RotationAction::gtc_to_extended()).unwrap_err();
        assert!(matches!(err, crate::error::AppError::MissingQuantity(ref id) if id == "123"));
    }

    #[test]
    fn limit_order_keeps_its_price() {
        let req = build_change_request_at(&limit_order(), RotationAction::gtc_to_extended(), 1)
            .unwrap();
        let body = &req.preview_order_request.order[0];
        assert_eq!(body.market_session, "EXTENDED");
        assert_eq!(body.order_term, "GOOD_FOR_DAY");
        assert_eq!(body.instrument[0].limit_price, Some(415.25));
        assert_eq!(body.instrument[0].order_action, "BUY");
        assert_eq!(body.instrument[0].quantity, 10.0);
    }

    #[test]
    fn market_order_omits_the_price_field() {
        let mut order = limit_order();
        order.price_type = Some("MARKET".to_string());
        let req = build_change_request_at(&order, RotationAction::extended_to_gtc(), 1).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        let instrument = &json["PreviewOrderRequest"]["Order"][0]["Instrument"][0];
        assert!(instrument.get("limitPrice").is_none());
    }

    #[test]
    fn absent_price_type_defaults_to_limit() {
        let mut order = limit_order();
        order.price_type = None;
        let req = build_change_request_at(&order, RotationAction::extended_to_gtc(), 1).unwrap();
        let body = &req.preview_order_request.order[0];
        assert_eq!(body.price_type, "LIMIT");
        assert_eq!(body.instrument[0].limit_price, Some(415.25));
    }

    #[test]
    fn payload_is_deterministic_apart_from_the_client_order_id() {
        let order = limit_order();
        let a = build_change_request_at(&order, RotationAction::gtc_to_extended(), 1).unwrap();
        let b = build_change_request_at(&order, RotationAction::gtc_to_extended(), 2).unwrap();
        let mut a_json = serde_json::to_value(&a).unwrap();
        let mut b_json = serde_json::to_value(&b).unwrap();
        a_json["PreviewOrderRequest"]["clientOrderId"] = 0.into();
        b_json["PreviewOrderRequest"]["clientOrderId"] = 0.into();
        assert_eq!(a_json, b_json);
    }

    #[test]
    fn unknown_side_passes_through_verbatim() {
        let mut order = limit_order();
        order.side = Side::Unknown("EXCHANGE".to_string());
        let req = build_change_request_at(&order, RotationAction::gtc_to_extended(), 1).unwrap();
        assert_eq!(req.preview_order_request.order[0].instrument[0].order_action, "EXCHANGE");
    }
}
