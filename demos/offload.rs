//! Offload demo - uploads a random matrix and waits for the mirrored result.
//!
//! This example demonstrates:
//! - Building a session with the fluent API
//! - Reporting progress through `tracing` or as JSON lines on stdout
//! - Checking the received matrix against the locally mirrored input
//!
//! # Running
//!
//! ```text
//! cargo run --example offload -- [addr] [dimension] [threads] [--json]
//! RUST_LOG=offload_client=debug cargo run --example offload
//! ```

use std::env;
use std::time::Duration;

use offload_client::transport::DEFAULT_SERVER_ADDR;
use offload_client::{JsonLinesSink, Matrix, ProtocolSession, TracingSink};
use rand::Rng;
use tracing_subscriber::EnvFilter;

/// Matrices up to this size are printed.
const PRINT_LIMIT: u32 = 10;

fn random_matrix(dimension: u32) -> Result<Matrix, offload_client::OffloadError> {
    let mut rng = rand::thread_rng();
    let len = (dimension as usize) * (dimension as usize);
    let data = (0..len).map(|_| rng.gen_range(1..=100)).collect();
    Matrix::new(dimension, data)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let addr = positional
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());
    let dimension: u32 = positional.get(1).map_or(Ok(4), |s| s.parse())?;
    let threads: u32 = positional.get(2).map_or(Ok(4), |s| s.parse())?;

    let matrix = random_matrix(dimension)?;
    let expected = matrix.mirrored_horizontally();

    let builder = ProtocolSession::builder()
        .thread_count(threads)
        .poll_interval(Duration::from_secs(1));
    let builder = if json {
        builder.progress_sink(JsonLinesSink)
    } else {
        builder.progress_sink(TracingSink)
    };

    tracing::info!("connecting to {}", addr);
    let session = builder.connect(addr.as_str(), matrix).await?;
    let outcome = session.run().await?;

    if outcome.received.dimension() != outcome.sent.dimension() {
        tracing::warn!(
            "server sent a {}x{} matrix for a {}x{} request",
            outcome.received.dimension(),
            outcome.received.dimension(),
            outcome.sent.dimension(),
            outcome.sent.dimension()
        );
    }

    if dimension <= PRINT_LIMIT && !json {
        eprintln!("Expected (mirrored locally):\n{}", expected);
    }

    if outcome.received == expected {
        tracing::info!("mirror OK");
    } else {
        tracing::warn!("mirror mismatch");
    }

    Ok(())
}
