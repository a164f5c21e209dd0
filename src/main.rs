//! Screener policy tooling - main entry point
//!
//! This binary provides two subcommands:
//! - bearish: Derive bearish screener URLs and rewrite the policy file
//! - verify-hash: Check the policy file's integrity hash

use anyhow::Result;
use clap::{Parser, Subcommand};
use screener_policy::config::DEFAULT_POLICY_PATH;
use screener_policy::Variant;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "screener-policy")]
#[command(about = "Derive bearish screeners and verify the trading policy file", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to a file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add bearish screeners to every sector of the policy file
    Bearish {
        /// Path to policy file (rewritten in place)
        #[arg(short, long, default_value = DEFAULT_POLICY_PATH)]
        policy: PathBuf,

        /// Transform behaviour (naive or corrected)
        #[arg(long, default_value_t = Variant::Corrected)]
        variant: Variant,

        /// JSON transform config (overrides --variant)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report what would change without writing the file
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify the policy signature hash
    VerifyHash {
        /// Path to policy file
        #[arg(short, long, default_value = DEFAULT_POLICY_PATH)]
        policy: PathBuf,
    },
}

fn setup_logging(verbose: bool, command_name: &str, log_dir: Option<&PathBuf>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Console layer, no timestamps: output reads as a progress log
    let console_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stdout);

    // File layer - full format without ANSI colors
    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;

            // {command}_{date}.log
            let log_filename = format!(
                "{}_{}.log",
                command_name,
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let file_appender = tracing_appender::rolling::never(dir, &log_filename);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false);
            (Some(layer.boxed()), Some(dir.join(log_filename)))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        info!("Log file: {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Bearish { .. } => "bearish",
        Commands::VerifyHash { .. } => "verify_hash",
    };

    setup_logging(cli.verbose, command_name, cli.log_dir.as_ref())?;

    match cli.command {
        Commands::Bearish {
            policy,
            variant,
            config,
            dry_run,
        } => commands::bearish::run(policy, variant, config, dry_run),

        Commands::VerifyHash { policy } => commands::verify::run(policy),
    }
}
