//! Payload normalization
//!
//! E*TRADE returns orders and transactions in several payload shapes depending
//! on endpoint, account age, and detail flags. Field names drift
//! (`orderedQuantity` vs `quantity`), nesting drifts (`OrderDetail` as a list
//! or a lone object), and numeric fields arrive as numbers or strings. This
//! module flattens all of that into fixed-shape records the rest of the crate
//! can rely on.
//!
//! Normalization is pure and total: a field that cannot be resolved becomes
//! absent (or empty, or zero), never an error.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Recursion bound for [`deep_find`] on malformed or adversarial payloads.
const MAX_SEARCH_DEPTH: usize = 32;

/// Order or transaction side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Side {
    Buy,
    Sell,
    /// Unrecognized action string, preserved verbatim for downstream filtering.
    Unknown(String),
}

impl Side {
    /// Infer a side from a raw action string by case-insensitive prefix match.
    ///
    /// `"Buy To Open"` → `Buy`, `"SELL_SHORT"` → `Sell`; anything else is
    /// passed through as `Unknown` rather than silently mapped.
    pub fn infer(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        if upper.starts_with("BUY") {
            Side::Buy
        } else if upper.starts_with("SELL") {
            Side::Sell
        } else {
            Side::Unknown(raw.to_string())
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
            Side::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// An open order flattened to a stable shape.
///
/// `order_id` is never empty for an order sourced from a real payload;
/// `symbol` is uppercase or empty, never null, so tables sort and filter
/// predictably.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub price_type: Option<String>,
    pub session: Option<String>,
    pub duration: Option<String>,
    pub placed_time: Option<String>,
}

/// A transaction record flattened to a stable shape.
///
/// `proceeds` is treated as a magnitude by the PnL aggregator; `description`
/// and `security_type` are carried for instrument classification and symbol
/// fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTransaction {
    pub time: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: Option<f64>,
    pub proceeds: f64,
    pub fees: f64,
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
    pub security_type: String,
    pub description: String,
}

/// True for values the candidate search should skip over: null, empty string,
/// empty array.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Depth-first search for the first non-empty value under any of `keys`.
///
/// At every mapping visited, candidate keys are checked in order before
/// descending into nested values, so a shallow hit always beats a deeper one.
/// A visited set keyed by value identity plus a depth cap bound the traversal
/// on malformed input.
pub fn deep_find<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    fn walk<'a>(
        value: &'a Value,
        keys: &[&str],
        seen: &mut HashSet<usize>,
        depth: usize,
    ) -> Option<&'a Value> {
        if depth > MAX_SEARCH_DEPTH || !seen.insert(value as *const Value as usize) {
            return None;
        }
        match value {
            Value::Object(map) => {
                for key in keys {
                    if let Some(v) = map.get(*key) {
                        if !is_empty_value(v) {
                            return Some(v);
                        }
                    }
                }
                map.values().find_map(|v| walk(v, keys, seen, depth + 1))
            }
            Value::Array(items) => items.iter().find_map(|v| walk(v, keys, seen, depth + 1)),
            _ => None,
        }
    }
    walk(root, keys, &mut HashSet::new(), 0)
}

/// Best-effort numeric coercion.
///
/// Strings are trimmed; the sentinels `""`, `"none"`, `"null"`, `"nan"`
/// (any case) coerce to `None` rather than 0 or NaN. Unparseable values are
/// `None`, never an error.
pub fn try_parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.to_ascii_lowercase().as_str() {
                "none" | "null" | "nan" => None,
                _ => trimmed.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Render a scalar as trimmed text; `None` for null, empty, and containers.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn find_text(scope: &Value, keys: &[&str]) -> Option<String> {
    deep_find(scope, keys).and_then(text_of)
}

fn find_f64(scope: &Value, keys: &[&str]) -> Option<f64> {
    deep_find(scope, keys).and_then(try_parse_f64)
}

/// Normalize one raw order payload into zero or more records.
///
/// Orders may carry several `OrderDetail` sub-records (multi-leg or
/// multi-instrument); one record is produced per detail, or a single record
/// against the order body when no detail exists.
pub fn normalize_order(raw: &Value) -> Vec<NormalizedOrder> {
    let details = raw
        .get("OrderDetail")
        .or_else(|| raw.get("orderDetail"))
        .or_else(|| raw.get("orderDetails"));

    match details {
        Some(Value::Array(list)) if !list.is_empty() => list
            .iter()
            .map(|detail| normalize_order_row(raw, Some(detail)))
            .collect(),
        Some(detail @ Value::Object(_)) => vec![normalize_order_row(raw, Some(detail))],
        _ => vec![normalize_order_row(raw, None)],
    }
}

fn normalize_order_row(order: &Value, detail: Option<&Value>) -> NormalizedOrder {
    // Detail-level fields resolve against the detail when one exists,
    // otherwise against the whole order body.
    let scope = detail.unwrap_or(order);

    let order_id = order
        .get("orderId")
        .or_else(|| order.get("id"))
        .and_then(text_of)
        .or_else(|| find_text(order, &["orderId", "id", "orderNumber", "clordId"]))
        .unwrap_or_default();

    let mut symbol =
        find_text(scope, &["symbol", "productSymbol", "securitySymbol"]).unwrap_or_default();
    if symbol.is_empty() {
        // Some variants only carry the ticker inside a Product/Instrument node.
        if let Some(node) = deep_find(scope, &["Product", "product", "Instrument", "instrument"]) {
            symbol = product_symbol(node).unwrap_or_default();
        }
    }
    let symbol = symbol.to_ascii_uppercase();

    let side = find_text(
        scope,
        &["orderAction", "transactionType", "side", "instruction", "OrderAction"],
    )
    .map(|raw| Side::infer(&raw))
    .unwrap_or_else(|| Side::Unknown(String::new()));

    NormalizedOrder {
        order_id,
        symbol,
        side,
        quantity: find_f64(scope, &["orderedQuantity", "quantity", "qty", "filledQuantity"]),
        price: find_f64(
            scope,
            &["limitPrice", "price", "avgExecPrice", "stopPrice", "stopLimitPrice"],
        ),
        price_type: find_text(scope, &["priceType", "orderType"]),
        session: find_text(scope, &["marketSession", "session"]),
        duration: find_text(scope, &["orderTerm", "duration"]),
        placed_time: find_text(order, &["placedTime", "orderTime", "timePlaced", "placeTime"]),
    }
}

fn product_symbol(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => map
            .get("symbol")
            .or_else(|| map.get("securitySymbol"))
            .and_then(text_of),
        Value::Array(items) => items.iter().find_map(product_symbol),
        _ => None,
    }
}

/// Normalize one raw transaction payload.
pub fn normalize_transaction(raw: &Value) -> NormalizedTransaction {
    let quantity = find_f64(raw, &["quantity", "shares", "qty"]).unwrap_or(0.0);
    let price = find_f64(raw, &["price", "averagePrice", "avgPrice"]);

    // Net amount when reported; otherwise reconstruct from price * quantity.
    let proceeds = find_f64(raw, &["netAmount", "netamount", "net", "amount", "proceeds"])
        .or_else(|| price.map(|p| p * quantity))
        .unwrap_or(0.0);

    let fees = find_f64(raw, &["fees", "fee"]).unwrap_or(0.0)
        + find_f64(raw, &["commission"]).unwrap_or(0.0);

    let side = find_text(raw, &["transactionType", "type", "action", "side"])
        .map(|raw_side| Side::infer(&raw_side))
        .unwrap_or_else(|| Side::Unknown(String::new()));

    NormalizedTransaction {
        time: find_text(raw, &["transactionDate", "tradeDate", "time", "date"])
            .unwrap_or_default(),
        symbol: find_text(raw, &["symbol", "productSymbol", "securitySymbol", "ticker"])
            .unwrap_or_default()
            .to_ascii_uppercase(),
        side,
        quantity,
        price,
        proceeds,
        fees,
        order_id: find_text(raw, &["orderId"]),
        transaction_id: find_text(raw, &["transactionId", "id"]),
        security_type: find_text(raw, &["productType", "securityType", "instrumentType"])
            .unwrap_or_default(),
        description: find_text(raw, &["description"]).unwrap_or_default(),
    }
}

/// Side filter supplied by the caller alongside a symbol filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideFilter {
    Both,
    Buy,
    Sell,
}

impl SideFilter {
    fn matches(&self, side: &Side) -> bool {
        match self {
            SideFilter::Both => true,
            SideFilter::Buy => side.is_buy(),
            SideFilter::Sell => side.is_sell(),
        }
    }
}

/// Caller-supplied filter over normalized orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Case-insensitive substring match against the symbol.
    pub symbol: Option<String>,
    pub side: Option<SideFilter>,
}

impl OrderFilter {
    pub fn matches(&self, order: &NormalizedOrder) -> bool {
        if let Some(sym) = &self.symbol {
            if !order
                .symbol
                .to_ascii_uppercase()
                .contains(&sym.to_ascii_uppercase())
            {
                return false;
            }
        }
        self.side.unwrap_or(SideFilter::Both).matches(&order.side)
    }
}
