use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_config::{ConfigLoad, ConfigLoader, telemetry};
use tessera_core::domain::tokens::VerificationService;

mod keygen;

#[derive(Parser)]
#[command(
    name = "tesseractl",
    version,
    about = "Tessera operator tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an Ed25519 signing key pair and a fingerprint binding key
    Keygen {
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },
    /// Load configuration and key material the way the service does at startup
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
    /// Verify an access token offline against a client fingerprint
    Verify {
        #[arg(long)]
        token: String,
        /// Raw fingerprint material as presented by the client
        #[arg(long)]
        fingerprint: String,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    if let Err(err) = telemetry::init_tracing("warn") {
        eprintln!("failed to initialise tracing: {err}");
    }

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Keygen { out_dir, force } => {
            let generated = keygen::generate(&out_dir, force)?;
            println!("private key: {}", generated.private_key.display());
            println!("public key:  {}", generated.public_key.display());
            println!("binding key: {}", generated.binding_key.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { config, env_file } => {
            let ConfigLoad { config, warnings } = load(config, env_file)?;

            for warning in warnings.iter() {
                println!("warning: {}", warning.message);
                if let Some(hint) = &warning.hint {
                    println!("  hint: {hint}");
                }
            }

            let keys = config
                .signing_keys()
                .context("failed to load signing keys")?;
            config.binder().context("failed to load binding key")?;
            let settings = config.token_settings()?;

            println!("issuer: {}", config.token.issuer);
            println!("algorithm: {:?}", keys.algorithm());
            println!("refresh cap: {}", settings.refresh_cap);
            println!(
                "refresh store: {}",
                if config.database.url.is_some() {
                    "postgres"
                } else {
                    "in-memory"
                }
            );
            println!("configuration ok");
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            token,
            fingerprint,
            config,
            env_file,
        } => {
            let ConfigLoad { config, .. } = load(config, env_file)?;
            let keys = config
                .signing_keys()
                .context("failed to load signing keys")?;
            let verifier = VerificationService::new(
                Arc::new(config.codec(keys)?),
                Arc::new(config.binder()?),
            );

            match verifier.verify(token.trim(), fingerprint.as_bytes()) {
                Ok(identity) => {
                    println!("user: {}", identity.user_id);
                    let roles: Vec<&str> =
                        identity.roles.iter().map(|role| role.as_str()).collect();
                    println!("roles: {}", roles.join(","));
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    tracing::debug!(error = ?err, "Verification failed");
                    println!("rejected: {}", err.rejection());
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}

fn load(
    config: Option<PathBuf>,
    env_file: Option<PathBuf>,
) -> Result<ConfigLoad> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = env_file {
        loader = loader.with_env_file(path);
    }
    loader.load().context("failed to load configuration")
}
