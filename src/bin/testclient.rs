//! Send random postal codes to a listening application for testing
//!
//! Picks codes from a database built by `makedb` and sends them as
//! `<code>,<tag>` UDP datagrams at a fixed rate until interrupted. The
//! client keeps running when the receiver is unreachable.
//!
//! Usage:
//!   cargo run --release --bin testclient -- -f <postalcodes.txt> [OPTIONS]

use anyhow::{Context, Result};
use clap::Parser;
use pt_postcodes::emitter::{self, EmitterConfig, SampleEmitter, UdpTransport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Postal code test client
#[derive(Parser, Debug)]
#[command(name = "testclient")]
#[command(about = "Send random postal codes over UDP")]
struct Args {
    /// Receiver host name or address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    hostname: String,

    /// Receiver UDP port
    #[arg(short, long, default_value = "15001")]
    port: u16,

    /// Codes sent per second
    #[arg(short, long, default_value = "4")]
    rate: f64,

    /// Database file produced by makedb
    #[arg(short, long)]
    file: PathBuf,

    /// Client tag appended to every code (1-16 word characters)
    #[arg(short, long)]
    tag: Option<String>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let tag = match args.tag {
        Some(tag) => tag,
        None => emitter::generate_tag(&mut rng),
    };
    let config = EmitterConfig::new(args.rate, tag)?;

    let codes = emitter::load_codes_from_path(&args.file)
        .with_context(|| format!("Failed to read {:?}", args.file))?;
    let transport = UdpTransport::connect(&args.hostname, args.port).await?;

    info!(
        "Sending {} codes/s to {} with tag {:?}",
        args.rate,
        transport.target(),
        config.tag()
    );

    let mut emitter = SampleEmitter::new(codes, config, transport, rng)?;
    emitter.run(None).await;

    Ok(())
}
