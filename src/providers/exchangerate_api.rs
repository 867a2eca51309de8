use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyCode;
use crate::core::rates::{RateProvider, RateTable};

// ExchangeRateApiProvider implementation for RateProvider, backed by the
// exchangerate-api.com v6 `latest` endpoint.
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("xconv/1.0").build()?;
        Ok(ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    base_code: Option<String>,
    time_last_update_unix: Option<i64>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    #[instrument(
        name = "ExchangeRateApiFetch",
        skip(self),
        fields(base = %base)
    )]
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<RateTable> {
        let url = format!("{}/v6/{}/latest/{}", self.base_url, self.api_key, base);
        debug!("Requesting exchange rates for {}", base);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for base currency: {}", e, base))?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Error responses still carry the provider's error type in the body.
            if let Ok(LatestRatesResponse {
                error_type: Some(error_type),
                ..
            }) = serde_json::from_str::<LatestRatesResponse>(&text)
            {
                return Err(anyhow!(
                    "Rate provider error: {} for base currency: {}",
                    error_type,
                    base
                ));
            }
            return Err(anyhow!(
                "HTTP error: {} for base currency: {}",
                status,
                base
            ));
        }

        let data: LatestRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", base, e))?;

        if data.result != "success" {
            return Err(anyhow!(
                "Rate provider error: {} for base currency: {}",
                data.error_type.as_deref().unwrap_or("unknown"),
                base
            ));
        }

        let quoted_base: CurrencyCode = data
            .base_code
            .as_deref()
            .ok_or_else(|| anyhow!("No base currency in response for {}", base))?
            .parse()?;
        if &quoted_base != base {
            return Err(anyhow!(
                "Response quoted in {} but {} was requested",
                quoted_base,
                base
            ));
        }

        let updated_at = data
            .time_last_update_unix
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        let table = RateTable::from_rates(quoted_base, data.conversion_rates)
            .with_updated_at(updated_at);

        if table.is_empty() {
            return Err(anyhow!("No rate data found for base currency: {}", base));
        }

        debug!(count = table.len(), "Received exchange rates");
        Ok(table)
    }
}
