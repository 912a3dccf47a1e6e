//! Realized PnL aggregation
//!
//! Groups normalized transactions by (symbol, instrument type) and accumulates
//! buy/sell quantities, realized gain, and fees over a date range.
//!
//! Realized PnL is a cash-flow approximation: buys subtract the transaction
//! amount, sells add it. That is only correct in aggregate when every buy and
//! sell of a round trip falls inside the queried window; positions opened
//! before the window start show as pure losses when sold. This matches the
//! upstream report the numbers are reconciled against and is intentionally
//! not a matched-lot cost-basis calculation.

use crate::normalize::{NormalizedTransaction, Side};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// Instrument classification for a PnL bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum InstrumentType {
    Options,
    Stocks,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Options => "Options",
            InstrumentType::Stocks => "Stocks",
        }
    }
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument-type filter supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Stocks,
    Options,
}

impl TypeFilter {
    fn matches(&self, instrument: InstrumentType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Stocks => instrument == InstrumentType::Stocks,
            TypeFilter::Options => instrument == InstrumentType::Options,
        }
    }
}

/// Aggregation parameters: inclusive date range plus optional filters.
#[derive(Debug, Clone)]
pub struct PnlQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Exact-symbol filter, case-insensitive, applied after symbol resolution.
    pub symbol: Option<String>,
    pub instrument: TypeFilter,
}

/// One (symbol, instrument type) row of the realized-PnL report.
///
/// `realized` is net of `fees`; fees are also reported on their own so the
/// column stays independently inspectable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlBucket {
    pub symbol: String,
    pub instrument_type: InstrumentType,
    pub trade_count: usize,
    pub qty_buy: f64,
    pub qty_sell: f64,
    pub realized: f64,
    pub fees: f64,
}

/// Full report: sorted buckets plus the grand total.
#[derive(Debug, Clone, Serialize)]
pub struct PnlReport {
    pub buckets: Vec<PnlBucket>,
    pub total_realized: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Default)]
struct Accumulator {
    trade_count: usize,
    qty_buy: f64,
    qty_sell: f64,
    realized: f64,
    fees: f64,
}

/// Aggregate transactions into per-(symbol, instrument type) buckets.
///
/// Every transaction that passes the filters is counted: records whose symbol
/// cannot be resolved land under `UNKNOWN`, and records with an unresolvable
/// side still contribute their trade count and fees. Nothing is silently
/// dropped, so bucket counts reconcile against the input.
pub fn aggregate(transactions: &[NormalizedTransaction], query: &PnlQuery) -> PnlReport {
    let mut buckets: BTreeMap<(String, InstrumentType), Accumulator> = BTreeMap::new();
    let symbol_filter = query.symbol.as_ref().map(|s| s.trim().to_ascii_uppercase());

    for txn in transactions {
        // Records with unparseable dates stay in the window; dropping them
        // would break count reconciliation against the raw statement.
        if let Some(date) = parse_transaction_date(&txn.time) {
            if date < query.start || date > query.end {
                continue;
            }
        }

        let instrument = classify(txn);
        if !query.instrument.matches(instrument) {
            continue;
        }

        let symbol = resolve_symbol(txn);
        if let Some(filter) = &symbol_filter {
            if symbol != *filter {
                continue;
            }
        }

        let side = effective_side(txn);
        let entry = buckets.entry((symbol, instrument)).or_default();
        entry.trade_count += 1;
        match side {
            Side::Buy => {
                entry.qty_buy += txn.quantity;
                entry.realized -= txn.proceeds.abs();
            }
            Side::Sell => {
                entry.qty_sell += txn.quantity;
                entry.realized += txn.proceeds.abs();
            }
            Side::Unknown(_) => {}
        }
        entry.fees += txn.fees;
    }

    let mut rows: Vec<PnlBucket> = buckets
        .into_iter()
        .map(|((symbol, instrument_type), acc)| PnlBucket {
            symbol,
            instrument_type,
            trade_count: acc.trade_count,
            qty_buy: acc.qty_buy,
            qty_sell: acc.qty_sell,
            realized: acc.realized - acc.fees,
            fees: acc.fees,
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.symbol.as_str(), a.instrument_type.as_str())
            .cmp(&(b.symbol.as_str(), b.instrument_type.as_str()))
    });

    let total_realized = rows.iter().map(|r| r.realized).sum();
    PnlReport { buckets: rows, total_realized, start: query.start, end: query.end }
}

/// Options when the security type mentions "option" or the description
/// contains the whole word "call" or "put"; Stocks otherwise.
fn classify(txn: &NormalizedTransaction) -> InstrumentType {
    if txn.security_type.to_ascii_lowercase().contains("option") {
        return InstrumentType::Options;
    }
    let has_option_word = txn
        .description
        .split(|c: char| !c.is_ascii_alphabetic())
        .any(|word| word.eq_ignore_ascii_case("call") || word.eq_ignore_ascii_case("put"));
    if has_option_word {
        InstrumentType::Options
    } else {
        InstrumentType::Stocks
    }
}

/// Resolve the bucket symbol: the explicit field, else the first all-caps
/// alphabetic token of length 1-5 in the description, else `UNKNOWN`.
fn resolve_symbol(txn: &NormalizedTransaction) -> String {
    if !txn.symbol.is_empty() {
        return txn.symbol.to_ascii_uppercase();
    }
    txn.description
        .split(|c: char| c.is_whitespace() || c == ',')
        .find(|token| {
            (1..=5).contains(&token.len())
                && token.chars().all(|c| c.is_ascii_alphabetic() && c.is_ascii_uppercase())
        })
        .map(str::to_string)
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// A transaction with an unresolved side is re-inferred from its description.
fn effective_side(txn: &NormalizedTransaction) -> Side {
    match &txn.side {
        Side::Unknown(_) => {
            let desc = txn.description.to_ascii_lowercase();
            if desc.contains("sell") {
                Side::Sell
            } else if desc.contains("buy") || desc.contains("bought") {
                Side::Buy
            } else {
                txn.side.clone()
            }
        }
        side => side.clone(),
    }
}

/// Parse the handful of date shapes transactions arrive with.
fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('T') {
        let head = raw.split('.').next().unwrap_or(raw);
        if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Reporting timeframe, resolved against a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Today,
    ThisWeek,
    ThisMonth,
    YearToDate,
    Years(u32),
    Custom(NaiveDate, NaiveDate),
}

impl Timeframe {
    /// Inclusive [start, end] range for this timeframe.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            Timeframe::Today => (today, today),
            Timeframe::ThisWeek => {
                let monday = today
                    .checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))
                    .unwrap_or(today);
                (monday, today)
            }
            Timeframe::ThisMonth => (today.with_day(1).unwrap_or(today), today),
            Timeframe::YearToDate => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                today,
            ),
            Timeframe::Years(n) => {
                let year = today.year() - n as i32;
                // Feb 29 has no counterpart in most years.
                let start = today
                    .with_year(year)
                    .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
                    .unwrap_or(today);
                (start, today)
            }
            Timeframe::Custom(start, end) => (start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(symbol: &str, side: Side, quantity: f64, proceeds: f64, fees: f64) -> NormalizedTransaction {
        NormalizedTransaction {
            time: "2024-03-04".to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price: None,
            proceeds,
            fees,
            order_id: None,
            transaction_id: None,
            security_type: String::new(),
            description: String::new(),
        }
    }

    fn query() -> PnlQuery {
        PnlQuery {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            symbol: None,
            instrument: TypeFilter::All,
        }
    }

    #[test]
    fn round_trip_cash_flow() {
        let txns = vec![
            txn("ABC", Side::Buy, 10.0, 1000.0, 1.0),
            txn("ABC", Side::Sell, 10.0, 1200.0, 1.0),
        ];
        let report = aggregate(&txns, &query());
        assert_eq!(report.buckets.len(), 1);
        let bucket = &report.buckets[0];
        assert_eq!(bucket.symbol, "ABC");
        assert_eq!(bucket.instrument_type, InstrumentType::Stocks);
        assert_eq!(bucket.trade_count, 2);
        assert_eq!(bucket.qty_buy, 10.0);
        assert_eq!(bucket.qty_sell, 10.0);
        assert!((bucket.realized - 198.0).abs() < 1e-9);
        assert!((bucket.fees - 2.0).abs() < 1e-9);
        assert!((report.total_realized - 198.0).abs() < 1e-9);
    }

    #[test]
    fn every_transaction_is_counted() {
        let mut unknown = txn("", Side::Unknown("JOURNAL".into()), 0.0, 12.0, 0.5);
        unknown.description = "mystery entry".to_string();
        let txns = vec![
            txn("AAA", Side::Buy, 1.0, 10.0, 0.0),
            txn("BBB", Side::Sell, 2.0, 20.0, 0.0),
            unknown,
        ];
        let report = aggregate(&txns, &query());
        let counted: usize = report.buckets.iter().map(|b| b.trade_count).sum();
        assert_eq!(counted, txns.len());
        assert!(report.buckets.iter().any(|b| b.symbol == "UNKNOWN"));
    }

    #[test]
    fn unknown_side_contributes_fees_but_no_realized() {
        let t = txn("XYZ", Side::Unknown("TRANSFER".into()), 5.0, 500.0, 3.0);
        let report = aggregate(&[t], &query());
        let bucket = &report.buckets[0];
        assert_eq!(bucket.trade_count, 1);
        assert_eq!(bucket.qty_buy, 0.0);
        assert_eq!(bucket.qty_sell, 0.0);
        assert!((bucket.realized - (-3.0)).abs() < 1e-9);
    }

    #[test]
    fn side_recovered_from_description() {
        let mut t = txn("XYZ", Side::Unknown(String::new()), 4.0, 400.0, 0.0);
        t.description = "Bought 4 shares of XYZ".to_string();
        let report = aggregate(&[t], &query());
        assert_eq!(report.buckets[0].qty_buy, 4.0);
    }

    #[test]
    fn options_classified_by_security_type_and_description() {
        let mut by_type = txn("SPY", Side::Sell, 1.0, 150.0, 0.0);
        by_type.security_type = "OPTN option".to_string();

        let mut by_word = txn("SPY", Side::Buy, 1.0, 100.0, 0.0);
        by_word.description = "SPY Mar 500 Call".to_string();

        // "callable" must not classify as an option: whole-word match only.
        let mut near_miss = txn("AAA", Side::Buy, 1.0, 50.0, 0.0);
        near_miss.description = "callable bond redemption".to_string();

        let report = aggregate(&[by_type, by_word, near_miss], &query());
        let spy: Vec<_> = report.buckets.iter().filter(|b| b.symbol == "SPY").collect();
        assert_eq!(spy.len(), 1);
        assert_eq!(spy[0].instrument_type, InstrumentType::Options);
        let aaa = report.buckets.iter().find(|b| b.symbol == "AAA").unwrap();
        assert_eq!(aaa.instrument_type, InstrumentType::Stocks);
    }

    #[test]
    fn symbol_inferred_from_description_token() {
        let mut t = txn("", Side::Buy, 1.0, 100.0, 0.0);
        t.description = "Bought 1 share of TSLA common stock".to_string();
        let report = aggregate(&[t], &query());
        assert_eq!(report.buckets[0].symbol, "TSLA");
    }

    #[test]
    fn date_window_is_inclusive_and_keeps_unparseable_dates() {
        let mut inside = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        inside.time = "2024-03-04".to_string();
        let mut edge = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        edge.time = "03/31/2024".to_string();
        let mut outside = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        outside.time = "2024-04-01T09:30:00.000".to_string();
        let mut undated = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        undated.time = "whenever".to_string();

        let q = PnlQuery {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            symbol: None,
            instrument: TypeFilter::All,
        };
        let report = aggregate(&[inside, edge, outside, undated], &q);
        assert_eq!(report.buckets[0].trade_count, 3);
    }

    #[test]
    fn buckets_sort_by_symbol_then_type() {
        let mut opt = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        opt.security_type = "OPTION".to_string();
        let txns = vec![txn("BBB", Side::Buy, 1.0, 10.0, 0.0), txn("AAA", Side::Buy, 1.0, 10.0, 0.0), opt];
        let report = aggregate(&txns, &query());
        let keys: Vec<_> = report
            .buckets
            .iter()
            .map(|b| (b.symbol.clone(), b.instrument_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAA".to_string(), InstrumentType::Options),
                ("AAA".to_string(), InstrumentType::Stocks),
                ("BBB".to_string(), InstrumentType::Stocks),
            ]
        );
    }

    #[test]
    fn filters_restrict_output() {
        let mut opt = txn("AAA", Side::Buy, 1.0, 10.0, 0.0);
        opt.security_type = "OPTION".to_string();
        let txns = vec![txn("AAA", Side::Buy, 1.0, 10.0, 0.0), txn("BBB", Side::Buy, 1.0, 10.0, 0.0), opt];

        let mut q = query();
        q.symbol = Some("aaa".to_string());
        q.instrument = TypeFilter::Stocks;
        let report = aggregate(&txns, &q);
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].symbol, "AAA");
        assert_eq!(report.buckets[0].instrument_type, InstrumentType::Stocks);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = aggregate(&[], &query());
        assert!(report.buckets.is_empty());
        assert_eq!(report.total_realized, 0.0);
    }

    #[test]
    fn timeframe_ranges() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(); // a Wednesday
        assert_eq!(Timeframe::Today.range(today), (today, today));
        assert_eq!(
            Timeframe::ThisWeek.range(today).0,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert_eq!(
            Timeframe::ThisMonth.range(today).0,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            Timeframe::YearToDate.range(today).0,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            Timeframe::Years(2).range(today).0,
            NaiveDate::from_ymd_opt(2022, 3, 6).unwrap()
        );
        // Leap day falls back to Feb 28.
        let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            Timeframe::Years(1).range(leap).0,
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
    }
}
