pub mod config;
pub mod journal;
pub mod log;
pub mod providers;
pub mod rate_provider;
pub mod rates;
pub mod server;

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the one-shot query (fetch, print, journal) and then, unless told
/// otherwise, keeps serving the same query over TCP.
pub async fn run(
    days: u32,
    currencies: Vec<String>,
    config_path: Option<&str>,
    serve: bool,
) -> Result<()> {
    info!("Exchange rates tracker starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = providers::privatbank::PrivatBankProvider::new(&config.provider.base_url)?;
    let journal = journal::Journal::new(&config.journal);

    let reference_date = Local::now().date_naive();
    let result = rates::aggregate(&provider, reference_date, days, &currencies).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    journal
        .append_best_effort(&format!(
            "Exchange rates fetched for {} days and currencies: {}",
            days,
            currencies.join(", ")
        ))
        .await;

    if serve {
        server::serve(
            &config.server.bind,
            Arc::new(provider),
            currencies,
            Arc::new(journal),
        )
        .await?;
    }

    Ok(())
}
