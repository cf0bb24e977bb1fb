use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::path::PathBuf;

use medichat_stock::{export_csv, export_file_name, mock_stock, quantity_by_status, StockFilter};

/// Run the `stock` subcommand: filter the inventory and write the CSV export.
pub async fn run_stock_export(
    blood_type: Option<String>,
    location: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let records = mock_stock();
    let filter = StockFilter {
        blood_type,
        location,
        expiry_between: None,
    };
    let filtered = filter.apply(&records);

    let path = output
        .unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().date_naive())));
    let csv = export_csv(&filtered);
    tokio::fs::write(&path, &csv)
        .await
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    println!(
        "{} Exported {} record(s) to {}",
        "💾".bright_green(),
        filtered.len(),
        path.display()
    );
    for (status, quantity) in quantity_by_status(&filtered) {
        println!("{}", format!("  {}: {} pochettes", status, quantity).bright_black());
    }
    Ok(())
}
