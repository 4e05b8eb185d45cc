//! Medex Server CLI
//!
//! Starts the extraction HTTP server.

use anyhow::Context;
use medex_server::{config::ServerConfig, start_server};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing (RUST_LOG, default info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        let config_path = &args[2];
        ServerConfig::from_file(config_path)
            .with_context(|| format!("loading configuration from {}", config_path))?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        ServerConfig::from_env().context("loading configuration from environment")?
    };

    start_server(config).await?;

    Ok(())
}

fn print_help() {
    println!("Medex Server - Batch extraction of medicine/material attributes");
    println!();
    println!("USAGE:");
    println!("    medex-server [--config <path-to-config.toml>]");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("Without --config, settings come from defaults and the environment.");
    println!();
    println!("ENVIRONMENT:");
    println!("    AZURE_OPENAI_ENDPOINT       Resource endpoint URL");
    println!("    AZURE_OPENAI_DEPLOYMENT     Deployment name");
    println!("    AZURE_OPENAI_API_KEY        API key");
    println!("    AZURE_OPENAI_BEARER_TOKEN   Bearer token (used when no API key is set)");
    println!("    RUST_LOG                    Log filter (default: info)");
    println!();
    println!("CONFIGURATION:");
    println!("    The TOML config file may contain:");
    println!("    - bind_address, bind_port (default 0.0.0.0:5000)");
    println!("    - [gateway] endpoint, deployment, api_key, bearer_token, api_version, timeout_secs");
    println!("    - [extractor] max_concurrency, item_timeout_secs, max_batch_size");
    println!();
}
