//! certsync CLI
//!
//! Distributes a TLS certificate/private-key pair to database nodes through
//! etcd.
//!
//! # Commands
//!
//! - `get` - Materialize the credential if etcd holds a newer revision
//! - `put` - Publish a local credential to etcd
//! - `verify` - Check a local certificate/key pair
//! - `version` - Show version information

mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::ConnectionArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Version-gated TLS credential sync through etcd.
#[derive(Parser, Debug)]
#[command(name = "certsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the credential and write it locally if it is newer
    Get {
        /// etcd key holding the credential
        #[arg(short = 'k', long)]
        etcd_key: String,

        /// Destination of the certificate
        #[arg(long)]
        out_cert: PathBuf,

        /// Destination of the private key
        #[arg(long)]
        out_key: PathBuf,

        /// File recording the last synchronized revision
        #[arg(long, default_value = certsync_engine::DEFAULT_LEDGER_PATH)]
        ledger: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Publish a local certificate and private key to etcd
    Put {
        /// etcd key to write
        #[arg(short = 'k', long)]
        etcd_key: String,

        /// Certificate to publish
        #[arg(long)]
        in_cert: PathBuf,

        /// Private key to publish
        #[arg(long)]
        in_key: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Check that a certificate and private key are valid and match
    Verify {
        /// Certificate file
        #[arg(long)]
        cert: PathBuf,

        /// Private key file
        #[arg(long)]
        key: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the command's report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Get {
            etcd_key,
            out_cert,
            out_key,
            ledger,
            connection,
        } => {
            commands::get::run(&connection, &etcd_key, &out_cert, &out_key, ledger)?;
        }
        Commands::Put {
            etcd_key,
            in_cert,
            in_key,
            connection,
        } => {
            commands::put::run(&connection, &etcd_key, &in_cert, &in_key)?;
        }
        Commands::Verify { cert, key } => {
            commands::verify::run(&cert, &key)?;
        }
        Commands::Version => {
            println!("certsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("certsync engine v{}", certsync_engine::VERSION);
        }
    }

    Ok(())
}
