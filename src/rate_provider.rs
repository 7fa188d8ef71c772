//! Provides daily exchange rate lookups for the application.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// One raw rate entry as published upstream. Values are passed through
/// unvalidated; the NB fields may be absent for minor currencies.
#[derive(Debug, Clone, Deserialize)]
pub struct RateRecord {
    pub currency: String,
    #[serde(rename = "saleRateNB")]
    pub sale_rate_nb: Option<f64>,
    #[serde(rename = "purchaseRateNB")]
    pub purchase_rate_nb: Option<f64>,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches all rate records published for one `DD.MM.YYYY` date.
    async fn fetch_rates(&self, date: &str) -> Result<Vec<RateRecord>>;
}
