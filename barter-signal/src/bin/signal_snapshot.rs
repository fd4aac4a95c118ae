//! Reads a stream of `MarketInput` JSON documents from stdin and writes one `SignalSnapshot`
//! JSON line per document to stdout. Fatal tick errors are written as `{"symbol", "error"}`.
//!
//! Environment:
//! - `SIGNAL_CONFIG`: optional path to a JSON `SignalConfig`
//! - `SIGNAL_COVERAGE`, `SIGNAL_CLUSTER_MULTIPLIER`, `SIGNAL_PERSIST_TICKS`, `SIGNAL_SMOOTHING`
//! - `RUST_LOG`: log filter (default `info`, logs go to stderr)

use barter_signal::{MarketInput, SignalConfig, SignalEngine, StateRegistry};
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use tracing::{error, info, warn};

const ENV_CONFIG_PATH: &str = "SIGNAL_CONFIG";

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    symbol: &'a str,
    error: String,
}

fn load_config() -> Result<SignalConfig, Box<dyn std::error::Error>> {
    let config = match std::env::var(ENV_CONFIG_PATH).ok() {
        Some(path) => {
            info!("Loading signal config from {}", path);
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
        None => SignalConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let engine = SignalEngine::new(load_config()?)?;
    let registry = StateRegistry::new();

    let stdin = io::stdin().lock();
    let mut stdout = BufWriter::new(io::stdout().lock());

    let mut evaluated = 0usize;
    for input in serde_json::Deserializer::from_reader(stdin).into_iter::<MarketInput>() {
        let input = match input {
            Ok(input) => input,
            Err(e) => {
                error!("Failed to parse market input: {}", e);
                return Err(e.into());
            }
        };

        match registry.evaluate(&engine, &input) {
            Ok(snapshot) => serde_json::to_writer(&mut stdout, &snapshot)?,
            Err(e) => {
                warn!(symbol = %input.symbol, "Tick aborted: {}", e);
                let response = ErrorResponse {
                    symbol: &input.symbol,
                    error: e.to_string(),
                };
                serde_json::to_writer(&mut stdout, &response)?;
            }
        }
        writeln!(stdout)?;
        stdout.flush()?;
        evaluated += 1;
    }

    info!("Evaluated {} inputs across {} symbols", evaluated, registry.len());
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
