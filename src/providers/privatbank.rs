use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::rate_provider::{RateProvider, RateRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// PrivatBankProvider implementation for RateProvider
pub struct PrivatBankProvider {
    base_url: String,
    client: reqwest::Client,
}

impl PrivatBankProvider {
    /// Builds a provider with one shared HTTP client. The client is reused
    /// across all concurrent per-date lookups of an aggregate call, and its
    /// request timeout bounds how long a hung upstream can stall the batch.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("xrates/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(PrivatBankProvider {
            base_url: base_url.to_string(),
            client,
        })
    }
}

#[derive(Deserialize, Debug)]
struct ExchangeRatesResponse {
    #[serde(rename = "exchangeRate")]
    exchange_rate: Vec<RateRecord>,
}

#[async_trait]
impl RateProvider for PrivatBankProvider {
    #[instrument(
        name = "PrivatBankFetch",
        skip(self),
        fields(date = %date)
    )]
    async fn fetch_rates(&self, date: &str) -> Result<Vec<RateRecord>> {
        let url = format!("{}/p24api/exchange_rates?json&date={}", self.base_url, date);
        debug!("Requesting exchange rates from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for date: {} URL: {}", e, date, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for date: {}",
                response.status(),
                date
            ));
        }

        let text = response.text().await?;

        let data: ExchangeRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse exchange rates for {}: {}", date, e))?;

        Ok(data.exchange_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(date: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p24api/exchange_rates"))
            .and(query_param("date", date))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_response = r#"{
            "date": "10.01.2024",
            "bank": "PB",
            "exchangeRate": [
                {"currency": "EUR", "saleRateNB": 42.1, "purchaseRateNB": 41.6},
                {"currency": "USD", "saleRateNB": 38.0, "purchaseRateNB": 37.5}
            ]
        }"#;

        let mock_server = create_mock_server("10.01.2024", mock_response).await;
        let provider = PrivatBankProvider::new(&mock_server.uri()).unwrap();

        let records = provider.fetch_rates("10.01.2024").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].currency, "EUR");
        assert_eq!(records[0].sale_rate_nb, Some(42.1));
        assert_eq!(records[1].currency, "USD");
        assert_eq!(records[1].purchase_rate_nb, Some(37.5));
    }

    #[tokio::test]
    async fn test_record_with_missing_nb_fields() {
        // Minor currencies come back without national bank prices.
        let mock_response = r#"{
            "exchangeRate": [
                {"currency": "XAU"}
            ]
        }"#;

        let mock_server = create_mock_server("10.01.2024", mock_response).await;
        let provider = PrivatBankProvider::new(&mock_server.uri()).unwrap();

        let records = provider.fetch_rates("10.01.2024").await.unwrap();
        assert_eq!(records[0].currency, "XAU");
        assert_eq!(records[0].sale_rate_nb, None);
        assert_eq!(records[0].purchase_rate_nb, None);
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p24api/exchange_rates"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = PrivatBankProvider::new(&mock_server.uri()).unwrap();
        let result = provider.fetch_rates("10.01.2024").await;

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for date: 10.01.2024"
        );
    }

    #[tokio::test]
    async fn test_missing_rate_list_field_is_malformed_payload() {
        let mock_response = r#"{"date": "10.01.2024", "rates": []}"#;

        let mock_server = create_mock_server("10.01.2024", mock_response).await;
        let provider = PrivatBankProvider::new(&mock_server.uri()).unwrap();

        let result = provider.fetch_rates("10.01.2024").await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse exchange rates for 10.01.2024")
        );
    }
}
