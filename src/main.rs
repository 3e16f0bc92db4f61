// src/main.rs

//! The main entry point for the pullcdn proxy.

use anyhow::Result;
use pullcdn::config::Config;
use pullcdn::server;
use std::env;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("pullcdn version {VERSION}");
        return Ok(());
    }

    // Determine the configuration path.
    // It can be provided via a --config flag; otherwise, it defaults to "config.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.toml");

    // Load the proxy configuration from the determined path.
    // If loading fails, print the error and exit, as the proxy
    // cannot run without a valid configuration.
    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    // Override port if provided as a command-line argument
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
    }

    // Get the initial log level from the environment or the config file.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}
