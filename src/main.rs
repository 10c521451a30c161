//! Liver risk - Main Entry Point
//!
//! Trains the risk model, scores records from the command line, or serves
//! the prediction API.

use clap::Parser;
use liver_risk::cli::{cmd_generate_data, cmd_predict, cmd_serve, cmd_train, Cli, Commands};
use liver_risk::server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liver_risk=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { data, models_dir, epochs }) => {
            cmd_train(&data, &models_dir, epochs).await?;
        }
        Some(Commands::Predict { input, models_dir }) => {
            cmd_predict(&input, &models_dir).await?;
        }
        Some(Commands::GenerateData { output, rows, seed }) => {
            cmd_generate_data(&output, rows, seed).await?;
        }
        Some(Commands::Serve { host, port, models_dir }) => {
            let config = ServerConfig::default()
                .with_host(host)
                .with_port(port)
                .with_models_dir(models_dir);
            cmd_serve(config).await?;
        }
        None => {
            // Default: serve with environment configuration
            cmd_serve(ServerConfig::default()).await?;
        }
    }

    Ok(())
}
