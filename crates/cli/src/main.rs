//! Beer Sales Forecast CLI
//!
//! A command-line tool for querying sales forecasts and checking the
//! health of the forecast service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{forecast, health};

/// Beer Sales Forecast CLI
#[derive(Parser)]
#[command(name = "bsf")]
#[command(author, version, about = "CLI for the Beer Sales Forecast service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via BSF_API_URL env var)
    #[arg(long, env = "BSF_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show predicted sales per day
    Forecast {
        /// Number of days to forecast (1-11)
        #[arg(long, short, default_value_t = 7)]
        days: i64,
    },

    /// Show service health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
    let format = config.resolve_format(cli.format);

    match cli.command {
        Commands::Forecast { days } => {
            forecast::show_forecast(&client, days, format).await?;
        }
        Commands::Health => {
            health::show_health(&client, format).await?;
        }
    }

    Ok(())
}
