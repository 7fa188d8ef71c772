//! Persistent-connection responder: a line-delimited TCP protocol answering
//! `exchange <days>` queries with the same JSON document the CLI prints.
//!
//! Commands are newline-delimited, but a success response is a multi-line
//! indented JSON document. Clients that pipeline commands on one connection
//! cannot delimit responses; issue one query per connection and read to EOF,
//! or rely on the one-line shape of error responses.

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::journal::Journal;
use crate::rate_provider::RateProvider;
use crate::rates;

pub async fn serve(
    bind: &str,
    provider: Arc<dyn RateProvider>,
    currencies: Vec<String>,
    journal: Arc<Journal>,
) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind server to {bind}"))?;
    serve_on(listener, provider, currencies, journal).await
}

pub async fn serve_on(
    listener: TcpListener,
    provider: Arc<dyn RateProvider>,
    currencies: Vec<String>,
    journal: Arc<Journal>,
) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    let currencies = Arc::new(currencies);

    loop {
        let (stream, peer) = listener.accept().await.context("Failed to accept client")?;
        debug!("Accepted connection from {peer}");

        let provider = Arc::clone(&provider);
        let currencies = Arc::clone(&currencies);
        let journal = Arc::clone(&journal);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &*provider, &currencies, &journal).await {
                warn!("Connection from {peer} failed: {e:#}");
            }
            debug!("Connection from {peer} closed");
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    provider: &dyn RateProvider,
    currencies: &[String],
    journal: &Journal,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if let Some(response) = handle_command(line.trim(), provider, currencies, journal).await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
    }
    Ok(())
}

/// Executes one inbound command. Returns the response to send, or `None`
/// for unrecognized commands, which are dropped without a reply (the
/// original protocol contract).
async fn handle_command(
    command: &str,
    provider: &dyn RateProvider,
    currencies: &[String],
    journal: &Journal,
) -> Option<String> {
    let mut parts = command.split_whitespace();
    if parts.next() != Some("exchange") {
        debug!("Ignoring unrecognized command: {command:?}");
        return None;
    }

    let days = match parts.next().map(str::parse::<u32>) {
        Some(Ok(days)) => days,
        _ => {
            debug!("Malformed day count in command: {command:?}");
            return Some(json!({"error": "usage: exchange <days>"}).to_string());
        }
    };

    let reference_date = Local::now().date_naive();
    match rates::aggregate(provider, reference_date, days, currencies).await {
        Ok(result) => {
            journal
                .append_best_effort(&format!("Exchange rates fetched for {days} days"))
                .await;
            match serde_json::to_string_pretty(&result) {
                Ok(body) => Some(body),
                Err(e) => Some(json!({"error": format!("Serialization failed: {e}")}).to_string()),
            }
        }
        Err(e) => {
            warn!("Aggregate call failed for {days} days: {e:#}");
            Some(json!({"error": format!("{e:#}")}).to_string())
        }
    }
}
