//! Cachet operator tool.
//!
//! # Usage
//!
//! ```bash
//! # Generate a 2048-bit host key active from now
//! cachet keygen --host id.example.org --out host.key
//!
//! # Show a key file's public parameters
//! cachet keyinfo host.key
//!
//! # Show what an envelope claims, without verifying it
//! cachet inspect envelope.bin
//! ```

mod inspect;
mod keyfile;

use std::{
    fmt::{self, Write as _},
    fs,
    path::PathBuf,
};

use cachet_core::{CodecConfig, Environment, SystemEnv, config::DEFAULT_PROOF_EXPONENT_BITS};
use cachet_crypto::PrivateKey;
use cachet_proto::{HostId, Timestamp};
use clap::{Parser, Subcommand};
use keyfile::KeyFile;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Cachet envelope tooling
#[derive(Parser, Debug)]
#[command(name = "cachet")]
#[command(about = "Host key generation and envelope inspection")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a host key file
    Keygen {
        /// Host identifier the key belongs to
        #[arg(long)]
        host: String,

        /// Modulus size in bits
        #[arg(long, default_value = "2048")]
        bits: usize,

        /// Activation time in seconds since the epoch (default: now)
        #[arg(long)]
        activation: Option<u64>,

        /// Client proof bound the key must fit under
        #[arg(long, default_value_t = DEFAULT_PROOF_EXPONENT_BITS)]
        proof_exponent_bits: usize,

        /// Output path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print a key file's public parameters
    Keyinfo {
        /// Key file
        file: PathBuf,
    },

    /// Print an envelope's unverified metadata
    Inspect {
        /// Envelope file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match args.command {
        Command::Keygen { host, bits, activation, proof_exponent_bits, out } => {
            let config = CodecConfig { proof_exponent_bits, ..CodecConfig::default() };
            config.validate()?;
            config.check_modulus_bits(bits)?;

            let activation =
                activation.map_or_else(|| SystemEnv::new().now(), Timestamp::from_secs);

            tracing::info!(%host, bits, "generating host key");
            let key = PrivateKey::generate(&mut rand::rngs::OsRng, bits)?;
            let file = KeyFile { host: HostId::new(host), activation, key };
            file.write(&out)?;

            tracing::info!(path = %out.display(), "wrote key file");
            inspect::emit(&describe_key(&file)?)?;
        },
        Command::Keyinfo { file } => {
            let file = KeyFile::read(&file)?;
            inspect::emit(&describe_key(&file)?)?;
        },
        Command::Inspect { file } => {
            let bytes = fs::read(&file)?;
            inspect::emit(&inspect::describe(&bytes)?)?;
        },
    }

    Ok(())
}

fn describe_key(file: &KeyFile) -> Result<String, fmt::Error> {
    let public = file.key.public_key();
    let mut out = String::new();
    writeln!(out, "{:>12}: {}", "host", file.host)?;
    writeln!(out, "{:>12}: {}", "active from", file.activation)?;
    writeln!(out, "{:>12}: {} bits", "modulus", public.modulus_bits())?;
    write!(out, "{:>12}: ", "fingerprint")?;
    for byte in public.fingerprint().as_bytes() {
        write!(out, "{byte:02x}")?;
    }
    out.push('\n');
    Ok(out)
}
