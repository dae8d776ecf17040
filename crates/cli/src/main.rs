use std::{
    env,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use commerce_helcim_types::{GatewayConfig, GatewayMode};

mod check;
mod hash;
mod hosted;
mod manifest;
mod transaction;

use manifest::Manifest;

pub const API_TOKEN_ENV: &str = "HELCIM_API_TOKEN";
pub const SECRET_KEY_ENV: &str = "HELCIM_SECRET_KEY";

#[derive(Clone, Debug)]
pub struct Context {
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub gateway: Option<String>,
}

impl Context {
    pub fn new(manifest_path: PathBuf, manifest: Manifest, gateway: Option<String>) -> Self {
        Context {
            manifest_path,
            manifest,
            gateway,
        }
    }

    /// Selected gateway configuration with credentials from the environment applied.
    ///
    /// Credentials are taken, in order, from `HELCIM_API_TOKEN` /
    /// `HELCIM_SECRET_KEY` and then from the manifest.
    pub fn gateway_config(&self) -> Result<(String, GatewayConfig), String> {
        let (name, mut config) = match self.manifest.get_gateway(self.gateway.as_deref()) {
            Some((name, config)) => (name.to_string(), config.clone()),
            None => match &self.gateway {
                Some(name) => {
                    return Err(format!(
                        "Gateway '{}' not found in {}",
                        name,
                        self.manifest_path.display()
                    ));
                }
                None => (
                    "helcim".to_string(),
                    GatewayConfig::new(GatewayMode::Test, "", ""),
                ),
            },
        };

        if let Ok(token) = env::var(API_TOKEN_ENV) {
            config.api_token = token;
        }
        if let Ok(secret) = env::var(SECRET_KEY_ENV) {
            config.secret_key = secret;
        }
        Ok((name, config))
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Helcim payment gateway tools", long_about = None)]
struct Opts {
    /// Path to the helcim.yaml manifest file (default: ./helcim.yaml)
    #[arg(
        long = "manifest-path",
        short = 'm',
        global = true,
        default_value = "./helcim.yaml"
    )]
    manifest_path: PathBuf,

    /// Gateway configuration to use (e.g., "helcim", "helcim_live")
    /// If not specified, uses the first gateway found in helcim.yaml
    #[arg(long = "gateway", short = 'g', global = true)]
    gateway: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Validate the gateway configuration and Helcim credentials
    Check(check::CheckCommand),
    /// Look up a transaction on Helcim
    Transaction(transaction::TransactionCommand),
    /// Compute or verify a hosted page amount hash
    Hash(hash::HashCommand),
    /// Print the redirect form for the hosted payment page
    HostedForm(hosted::HostedFormCommand),
}

#[tokio::main]
async fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let manifest_dir = opts
        .manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    load_env_file(&manifest_dir);

    let manifest = match Manifest::load(&opts.manifest_path) {
        Ok(manifest) => {
            eprintln!("✓ Loaded manifest from {}", opts.manifest_path.display());
            manifest
        }
        Err(e) => {
            eprintln!("Warning: {}", e);
            eprintln!("Using credentials from the environment...");
            Manifest::default()
        }
    };

    let ctx = Context::new(opts.manifest_path.clone(), manifest, opts.gateway.clone());

    if let Err(e) = handle_command(opts, &ctx).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Load environment variables from .env file in the manifest directory
fn load_env_file(manifest_dir: &Path) {
    let env_file_path = manifest_dir.join(".env");

    match dotenvy::from_path(&env_file_path) {
        Ok(_) => {
            eprintln!("✓ Loaded environment from {}", env_file_path.display());
        }
        Err(e) if e.not_found() => {}
        Err(e) => {
            eprintln!(
                "Warning: Failed to load .env file at {}: {}",
                env_file_path.display(),
                e
            );
        }
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    match opts.command {
        Command::Check(cmd) => cmd.execute(ctx).await,
        Command::Transaction(cmd) => cmd.execute(ctx).await,
        Command::Hash(cmd) => cmd.execute(ctx),
        Command::HostedForm(cmd) => cmd.execute(ctx),
    }
}
