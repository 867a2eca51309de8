//! Exchange rate abstractions and core types

use crate::core::currency::CurrencyCode;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Rates quoted against a base currency: one unit of `base` buys
/// `rates[code]` units of `code`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pub base: CurrencyCode,
    pub rates: HashMap<String, f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RateTable {
    /// Builds a table from raw provider data, dropping rates that are not
    /// positive finite numbers.
    pub fn from_rates<I>(base: CurrencyCode, rates: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let rates = rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .collect();
        RateTable {
            base,
            rates,
            updated_at: None,
        }
    }

    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn rate(&self, code: &CurrencyCode) -> Option<f64> {
        self.rates.get(code.as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<RateTable>;
}
