//! Conversion state for a single amount between two currencies.
//!
//! The engine is a plain synchronous store. Rate refreshes are split into
//! [`ConversionEngine::begin_refresh`], which hands out a [`RefreshTicket`]
//! describing the selection the fetch was issued for, and
//! [`ConversionEngine::apply_refresh`], which only accepts the result if that
//! ticket still describes the current selection and is newer than whatever
//! was applied last. Callers are free to run the fetch anywhere in between.

use crate::core::currency::CurrencyCode;
use crate::core::rates::{RateProvider, RateTable};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_SOURCE_CURRENCY: &str = "USD";
pub const DEFAULT_TARGET_CURRENCY: &str = "INR";
pub const DEFAULT_COMPARISON_CURRENCIES: [&str; 5] = ["EUR", "GBP", "AUD", "CAD", "JPY"];

/// Parses raw user input as a decimal amount. Empty or non-numeric input
/// yields `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    // Decimal parsing accepts digit separators, user input must not.
    if raw.is_empty() || raw.contains('_') {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Rounds half away from zero to two decimals and keeps the trailing zeros.
pub fn round_to_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `amount × rate` rounded to two decimals, or `None` when `amount` is not a
/// number. Products beyond `Decimal`'s range are computed in `f64`.
pub fn convert(amount: &str, rate: f64) -> Option<String> {
    let amount = parse_amount(amount)?;
    let exact = Decimal::try_from(rate)
        .ok()
        .and_then(|rate| amount.checked_mul(rate));
    if let Some(value) = exact {
        return Some(round_to_cents(value).to_string());
    }

    let value = amount.to_f64()? * rate;
    if !value.is_finite() {
        return None;
    }
    debug!(%amount, rate, "Product out of decimal range, using f64");
    Some(format!("{value:.2}"))
}

/// Formats a rate at two decimals, e.g. `0.9` as `0.90`.
pub fn format_rate(rate: f64) -> String {
    match Decimal::try_from(rate) {
        Ok(rate) => round_to_cents(rate).to_string(),
        Err(_) => format!("{rate:.2}"),
    }
}

/// Identifies one rate refresh and the selection it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    seq: u64,
    base: CurrencyCode,
    target: CurrencyCode,
}

impl RefreshTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The currency the rate table must be fetched for.
    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn target(&self) -> &CurrencyCode {
        &self.target
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied,
    /// The selection changed, or a newer result was already applied.
    Stale,
    /// Fetch failed; the previous state was kept.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ConversionEngine {
    amount: String,
    source: CurrencyCode,
    target: CurrencyCode,
    converted_amount: Option<String>,
    exchange_rate: f64,
    comparison_currencies: Vec<CurrencyCode>,
    comparison_rates: Vec<(CurrencyCode, f64)>,
    last_updated: Option<DateTime<Utc>>,
    next_seq: u64,
    last_applied: Option<u64>,
}

impl ConversionEngine {
    pub fn new(
        source: CurrencyCode,
        target: CurrencyCode,
        comparison_currencies: Vec<CurrencyCode>,
    ) -> Self {
        ConversionEngine {
            amount: String::new(),
            source,
            target,
            converted_amount: None,
            exchange_rate: 1.0,
            comparison_currencies,
            comparison_rates: Vec::new(),
            last_updated: None,
            next_seq: 0,
            last_applied: None,
        }
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn source(&self) -> &CurrencyCode {
        &self.source
    }

    pub fn target(&self) -> &CurrencyCode {
        &self.target
    }

    pub fn converted_amount(&self) -> Option<&str> {
        self.converted_amount.as_deref()
    }

    pub fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }

    /// Comparison rates in the configured order. Currencies missing from the
    /// last applied rate table are absent.
    pub fn comparison_rates(&self) -> &[(CurrencyCode, f64)] {
        &self.comparison_rates
    }

    pub fn comparison_rate(&self, code: &CurrencyCode) -> Option<f64> {
        self.comparison_rates
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, rate)| *rate)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Whether any rate table has been applied yet. Until then the exchange
    /// rate is the identity.
    pub fn has_rates(&self) -> bool {
        self.last_applied.is_some()
    }

    pub fn set_amount(&mut self, raw: &str) {
        self.amount = raw.to_string();
        self.recompute();
    }

    pub fn set_source_currency(&mut self, code: CurrencyCode) -> RefreshTicket {
        self.source = code;
        self.begin_refresh()
    }

    pub fn set_target_currency(&mut self, code: CurrencyCode) -> RefreshTicket {
        self.target = code;
        self.begin_refresh()
    }

    /// Exchanges the currencies and the amount with the converted amount in
    /// one step, then asks for rates of the new source.
    pub fn swap(&mut self) -> RefreshTicket {
        std::mem::swap(&mut self.source, &mut self.target);
        let previous_amount = std::mem::take(&mut self.amount);
        self.amount = self.converted_amount.take().unwrap_or_default();
        self.converted_amount = Some(previous_amount).filter(|a| !a.is_empty());
        self.begin_refresh()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.next_seq += 1;
        let ticket = RefreshTicket {
            seq: self.next_seq,
            base: self.source.clone(),
            target: self.target.clone(),
        };
        debug!(
            seq = ticket.seq,
            base = %ticket.base,
            target = %ticket.target,
            "Issued rate refresh"
        );
        ticket
    }

    pub fn apply_refresh(
        &mut self,
        ticket: &RefreshTicket,
        result: Result<RateTable>,
    ) -> RefreshOutcome {
        let superseded = self.last_applied.is_some_and(|seq| ticket.seq <= seq);
        if ticket.base != self.source || ticket.target != self.target || superseded {
            debug!(
                seq = ticket.seq,
                base = %ticket.base,
                target = %ticket.target,
                "Discarding stale rate refresh"
            );
            return RefreshOutcome::Stale;
        }

        let table = match result {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, base = %ticket.base, "Failed to refresh exchange rates");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        if table.base != ticket.base {
            let reason = format!(
                "Rate table is quoted in {} but {} was requested",
                table.base, ticket.base
            );
            warn!(base = %ticket.base, "{reason}");
            return RefreshOutcome::Failed(reason);
        }

        let Some(rate) = table.rate(&self.target) else {
            let reason = format!("No rate for {} in {} table", self.target, table.base);
            warn!(base = %ticket.base, target = %self.target, "{reason}");
            return RefreshOutcome::Failed(reason);
        };

        self.exchange_rate = rate;
        self.comparison_rates = self
            .comparison_currencies
            .iter()
            .filter_map(|code| table.rate(code).map(|r| (code.clone(), r)))
            .collect();
        self.last_updated = table.updated_at;
        self.last_applied = Some(ticket.seq);
        self.recompute();

        debug!(
            seq = ticket.seq,
            rate,
            converted = ?self.converted_amount,
            "Applied rate refresh"
        );
        RefreshOutcome::Applied
    }

    /// Fetches and applies rates for the current selection in one go.
    pub async fn refresh_rates(
        &mut self,
        provider: &(dyn RateProvider + Send + Sync),
    ) -> RefreshOutcome {
        let ticket = self.begin_refresh();
        let result = provider.fetch_rates(ticket.base()).await;
        self.apply_refresh(&ticket, result)
    }

    fn recompute(&mut self) {
        self.converted_amount = convert(&self.amount, self.exchange_rate);
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        ConversionEngine::new(
            CurrencyCode::from_static(DEFAULT_SOURCE_CURRENCY),
            CurrencyCode::from_static(DEFAULT_TARGET_CURRENCY),
            DEFAULT_COMPARISON_CURRENCIES
                .into_iter()
                .map(CurrencyCode::from_static)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    fn usd_table() -> RateTable {
        RateTable::from_rates(
            code("USD"),
            [
                ("USD", 1.0),
                ("INR", 83.0),
                ("EUR", 0.9),
                ("GBP", 0.8),
                ("AUD", 1.5),
                ("CAD", 1.35),
                ("JPY", 150.0),
            ]
            .into_iter()
            .map(|(c, r)| (c.to_string(), r)),
        )
    }

    fn eur_table() -> RateTable {
        RateTable::from_rates(
            code("EUR"),
            [("EUR", 1.0), ("INR", 92.0), ("GBP", 0.85), ("USD", 1.1)]
                .into_iter()
                .map(|(c, r)| (c.to_string(), r)),
        )
    }

    struct StaticProvider(Result<RateTable, String>);

    #[async_trait]
    impl RateProvider for StaticProvider {
        async fn fetch_rates(&self, _base: &CurrencyCode) -> Result<RateTable> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    #[test]
    fn test_defaults() {
        let engine = ConversionEngine::default();
        assert_eq!(engine.source(), &code("USD"));
        assert_eq!(engine.target(), &code("INR"));
        assert_eq!(engine.amount(), "");
        assert_eq!(engine.converted_amount(), None);
        assert_eq!(engine.exchange_rate(), 1.0);
        assert!(engine.comparison_rates().is_empty());
        assert!(!engine.has_rates());
    }

    #[test]
    fn test_convert_rounds_to_two_decimals() {
        assert_eq!(convert("10", 83.0).as_deref(), Some("830.00"));
        assert_eq!(convert("2.5", 0.5).as_deref(), Some("1.25"));
        assert_eq!(convert("1.005", 1.0).as_deref(), Some("1.01"));
        assert_eq!(convert("0.125", 1.0).as_deref(), Some("0.13"));
        assert_eq!(convert("3", 0.0).as_deref(), Some("0.00"));
        assert_eq!(convert("1e2", 1.5).as_deref(), Some("150.00"));
        assert_eq!(convert(" 7 ", 1.35).as_deref(), Some("9.45"));
        assert_eq!(convert("-0.125", 1.0).as_deref(), Some("-0.13"));
    }

    #[test]
    fn test_convert_rejects_non_numeric() {
        for raw in ["", "   ", "abc", "10usd", "1,000", "1_000", "_5"] {
            assert_eq!(convert(raw, 83.0), None, "input {raw:?}");
        }
        assert_eq!(convert("10", f64::NAN), None);
    }

    #[test]
    fn test_convert_beyond_decimal_range() {
        let converted = convert("2", 1e30).unwrap();
        assert!(converted.ends_with(".00"));
        assert_eq!(converted.parse::<f64>().unwrap(), 2e30);

        let converted = convert("79228162514264337593543950335", 10.0).unwrap();
        assert!(converted.parse::<f64>().unwrap() > 7.9e29);

        assert_eq!(convert("1e300", 1e300), None);
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.9), "0.90");
        assert_eq!(format_rate(150.0), "150.00");
    }

    #[test]
    fn test_set_amount_uses_current_rate() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("12.5");
        assert_eq!(engine.converted_amount(), Some("12.50"));

        engine.set_amount("not a number");
        assert_eq!(engine.amount(), "not a number");
        assert_eq!(engine.converted_amount(), None);

        engine.set_amount("");
        assert_eq!(engine.converted_amount(), None);
    }

    #[test]
    fn test_apply_refresh_populates_state() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");
        let ticket = engine.begin_refresh();

        let outcome = engine.apply_refresh(&ticket, Ok(usd_table()));

        assert_eq!(outcome, RefreshOutcome::Applied);
        assert_eq!(engine.exchange_rate(), 83.0);
        assert_eq!(engine.converted_amount(), Some("830.00"));
        let rendered: Vec<(String, String)> = engine
            .comparison_rates()
            .iter()
            .map(|(c, r)| (c.to_string(), format_rate(*r)))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("EUR".to_string(), "0.90".to_string()),
                ("GBP".to_string(), "0.80".to_string()),
                ("AUD".to_string(), "1.50".to_string()),
                ("CAD".to_string(), "1.35".to_string()),
                ("JPY".to_string(), "150.00".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_comparison_currencies_are_absent() {
        let mut engine = ConversionEngine::default();
        let ticket = engine.set_source_currency(code("EUR"));
        assert_eq!(
            engine.apply_refresh(&ticket, Ok(eur_table())),
            RefreshOutcome::Applied
        );

        let codes: Vec<&str> = engine
            .comparison_rates()
            .iter()
            .map(|(c, _)| c.as_str())
            .collect();
        assert_eq!(codes, vec!["EUR", "GBP"]);
        assert_eq!(engine.comparison_rate(&code("GBP")), Some(0.85));
        assert_eq!(engine.comparison_rate(&code("JPY")), None);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_state() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");
        let ticket = engine.begin_refresh();
        engine.apply_refresh(&ticket, Ok(usd_table()));
        let rates_before = engine.comparison_rates().to_vec();

        let ticket = engine.begin_refresh();
        let outcome = engine.apply_refresh(&ticket, Err(anyhow!("connection refused")));

        assert_eq!(outcome, RefreshOutcome::Failed("connection refused".to_string()));
        assert_eq!(engine.exchange_rate(), 83.0);
        assert_eq!(engine.converted_amount(), Some("830.00"));
        assert_eq!(engine.comparison_rates(), rates_before.as_slice());
    }

    #[test]
    fn test_table_without_target_counts_as_failure() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("4");
        let ticket = engine.set_target_currency(code("TON"));

        let outcome = engine.apply_refresh(&ticket, Ok(usd_table()));

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(engine.exchange_rate(), 1.0);
        assert_eq!(engine.converted_amount(), Some("4.00"));
        assert!(engine.comparison_rates().is_empty());
    }

    #[test]
    fn test_table_for_wrong_base_counts_as_failure() {
        let mut engine = ConversionEngine::default();
        let ticket = engine.begin_refresh();

        let outcome = engine.apply_refresh(&ticket, Ok(eur_table()));

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(engine.exchange_rate(), 1.0);
    }

    #[test]
    fn test_stale_refresh_for_previous_source_is_discarded() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");
        let usd_ticket = engine.begin_refresh();
        let eur_ticket = engine.set_source_currency(code("EUR"));

        assert_eq!(
            engine.apply_refresh(&eur_ticket, Ok(eur_table())),
            RefreshOutcome::Applied
        );
        assert_eq!(
            engine.apply_refresh(&usd_ticket, Ok(usd_table())),
            RefreshOutcome::Stale
        );

        assert_eq!(engine.exchange_rate(), 92.0);
        assert_eq!(engine.converted_amount(), Some("920.00"));
        assert_eq!(engine.comparison_rate(&code("GBP")), Some(0.85));
    }

    #[test]
    fn test_stale_refresh_resolving_first_is_discarded() {
        let mut engine = ConversionEngine::default();
        let usd_ticket = engine.begin_refresh();
        let eur_ticket = engine.set_source_currency(code("EUR"));

        assert_eq!(
            engine.apply_refresh(&usd_ticket, Ok(usd_table())),
            RefreshOutcome::Stale
        );
        assert_eq!(engine.exchange_rate(), 1.0);
        assert_eq!(
            engine.apply_refresh(&eur_ticket, Ok(eur_table())),
            RefreshOutcome::Applied
        );
    }

    #[test]
    fn test_older_ticket_for_same_selection_does_not_overwrite_newer() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("1");
        let first = engine.begin_refresh();
        let second = engine.begin_refresh();

        let mut newer = usd_table();
        newer.rates.insert("INR".to_string(), 84.0);
        assert_eq!(
            engine.apply_refresh(&second, Ok(newer)),
            RefreshOutcome::Applied
        );
        assert_eq!(
            engine.apply_refresh(&first, Ok(usd_table())),
            RefreshOutcome::Stale
        );
        assert_eq!(engine.converted_amount(), Some("84.00"));
    }

    #[test]
    fn test_stale_failure_is_not_reported_as_failure() {
        let mut engine = ConversionEngine::default();
        let usd_ticket = engine.begin_refresh();
        engine.set_target_currency(code("EUR"));

        let outcome = engine.apply_refresh(&usd_ticket, Err(anyhow!("timeout")));
        assert_eq!(outcome, RefreshOutcome::Stale);
    }

    #[test]
    fn test_swap_exchanges_currencies_and_amounts() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");
        let ticket = engine.begin_refresh();
        engine.apply_refresh(&ticket, Ok(usd_table()));

        let ticket = engine.swap();

        assert_eq!(ticket.base(), &code("INR"));
        assert_eq!(ticket.target(), &code("USD"));
        assert_eq!(engine.source(), &code("INR"));
        assert_eq!(engine.target(), &code("USD"));
        assert_eq!(engine.amount(), "830.00");
        assert_eq!(engine.converted_amount(), Some("10"));
    }

    #[test]
    fn test_swap_twice_restores_state() {
        for raw in ["10", "", "abc", "0.5"] {
            let mut engine = ConversionEngine::default();
            engine.set_amount(raw);
            let ticket = engine.begin_refresh();
            engine.apply_refresh(&ticket, Ok(usd_table()));
            let before = (
                engine.source().clone(),
                engine.target().clone(),
                engine.amount().to_string(),
                engine.converted_amount().map(str::to_string),
            );

            engine.swap();
            engine.swap();

            let after = (
                engine.source().clone(),
                engine.target().clone(),
                engine.amount().to_string(),
                engine.converted_amount().map(str::to_string),
            );
            assert_eq!(before, after, "input {raw:?}");
        }
    }

    #[test]
    fn test_swap_refresh_recomputes_with_new_rate() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");
        let ticket = engine.begin_refresh();
        engine.apply_refresh(&ticket, Ok(usd_table()));

        let ticket = engine.swap();
        let inr_table = RateTable::from_rates(code("INR"), vec![("USD".to_string(), 0.012)]);
        assert_eq!(
            engine.apply_refresh(&ticket, Ok(inr_table)),
            RefreshOutcome::Applied
        );

        assert_eq!(engine.amount(), "830.00");
        assert_eq!(engine.converted_amount(), Some("9.96"));
    }

    #[tokio::test]
    async fn test_refresh_rates_with_provider() {
        let mut engine = ConversionEngine::default();
        engine.set_amount("10");

        let outcome = engine.refresh_rates(&StaticProvider(Ok(usd_table()))).await;
        assert_eq!(outcome, RefreshOutcome::Applied);
        assert_eq!(engine.converted_amount(), Some("830.00"));

        let outcome = engine
            .refresh_rates(&StaticProvider(Err("unreachable".to_string())))
            .await;
        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(engine.converted_amount(), Some("830.00"));
    }
}
