use anyhow::Result;
use clap::Parser;
use xrates::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Number of days to fetch exchange rates for
    days: u32,

    /// Currencies to report
    #[arg(short, long, num_args = 1.., default_values_t = [String::from("EUR"), String::from("USD")])]
    currencies: Vec<String>,

    /// Exit after printing instead of starting the server
    #[arg(long)]
    no_serve: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(long)]
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = xrates::run(
        cli.days,
        cli.currencies,
        cli.config_path.as_deref(),
        !cli.no_serve,
    )
    .await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
