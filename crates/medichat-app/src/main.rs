use anyhow::Result;
use clap::Parser;

// Local modules
mod app;
mod capture;
mod cli;
mod conversation_logger;
mod history_view;
mod store;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // If a subcommand was provided, execute it and exit
    if let Some(ref command) = cli.command {
        match command {
            Commands::Stock {
                blood_type,
                location,
                output,
            } => {
                return app::run_stock_export(
                    blood_type.clone(),
                    location.clone(),
                    output.clone(),
                )
                .await;
            }
        }
    }

    // Interactive chat session
    app::run_repl_mode(&cli).await
}
