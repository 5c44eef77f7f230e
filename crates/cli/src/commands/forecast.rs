//! Forecast CLI command

use anyhow::Result;
use colored::Colorize;
use tabled::{builder::Builder, settings::Style};

use crate::client::{ApiClient, ForecastResponse};
use crate::output::{format_sales, print_json, print_warning, OutputFormat};

/// Fetch and print the sales forecast for the next `days` days
pub async fn show_forecast(client: &ApiClient, days: i64, format: OutputFormat) -> Result<()> {
    let result = client.forecast(days).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Beer Sales Forecast".bold());
            println!("{}", "=".repeat(50));

            if result.predictions.is_empty() {
                print_warning("No forecast days returned");
                return Ok(());
            }

            println!("{}", forecast_table(&result));
            println!();
            println!(
                "{} {}",
                "Horizon total:".bold(),
                format!("{:.1}", horizon_total(&result)).green().bold()
            );

            let closed = result.predictions.iter().filter(|d| d.total.is_none()).count();
            if closed > 0 {
                println!("{}", format!("{} day(s) without a prediction", closed).dimmed());
            }
        }
    }

    Ok(())
}

/// One row per day: date, weekday, total, then each variant in id order
fn forecast_table(result: &ForecastResponse) -> String {
    let variant_ids = result.variant_ids();

    let mut builder = Builder::default();
    let mut header = vec!["Date".to_string(), "Weekday".to_string(), "Total".to_string()];
    header.extend(variant_ids.iter().cloned());
    builder.push_record(header);

    for day in &result.predictions {
        let mut row = vec![day.date.clone(), day.weekday.clone(), format_sales(day.total)];
        row.extend(
            variant_ids
                .iter()
                .map(|id| format_sales(day.variants.get(id).copied().flatten())),
        );
        builder.push_record(row);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Sum of the primary prediction over days that have one
fn horizon_total(result: &ForecastResponse) -> f64 {
    result.predictions.iter().filter_map(|d| d.total).sum()
}
