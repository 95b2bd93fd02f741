//! olink: OpenLink command line client
//!
//! Sends API requests through the secure tunnel, resolves node addresses to
//! countries and prints the obfuscated request path for a given minute.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::SendOptions;
use config::AppConfig;
use olink_geoip::RangeIndex;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// OpenLink command line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "olink.toml")]
    config: PathBuf,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve node addresses (`1.2.3.4:443`, `[2001:db8::1]`) to country codes
    Lookup {
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Map country names to ISO codes
    Country {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Send an API request through the tunnel
    Send {
        /// API path, e.g. /api/mobile/node/list
        url: String,

        /// Request method
        #[arg(short = 'X', long, default_value = "POST")]
        method: String,

        /// Parameter as key=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Parameters as a JSON object
        #[arg(long)]
        json: Option<String>,

        /// Session token sent as x-user-token
        #[arg(short, long)]
        token: Option<String>,

        /// Print the decrypted body without checking the reply code
        #[arg(long)]
        raw: bool,
    },

    /// Print the derived and obfuscated path for a minute
    Path {
        /// RFC 3339 timestamp (default: now)
        #[arg(long)]
        at: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::load(&args.config)?;
    info!("olink {} starting", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Lookup { addresses } => {
            let index = RangeIndex::new(&config.geoip);
            commands::lookup(&index, &addresses).await?;
        }
        Command::Country { names } => commands::country(&names),
        Command::Send { url, method, params, json, token, raw } => {
            let options = SendOptions { url, method, params, json, token, raw };
            commands::send(config.tunnel, options).await?;
        }
        Command::Path { at } => commands::path(&config.tunnel.secret, at.as_deref())?,
    }

    Ok(())
}
