//! hookrelay CLI - send, receive and sign lifecycle-event webhooks.
//!
//! # Commands
//!
//! - `hookrelay receive --config <file>` - Run the receiver endpoint
//! - `hookrelay send --config <file> --event <file>` - Deliver one event
//! - `hookrelay sign --secret <secret> <file>` - Print the signature of a body

use clap::{Parser, Subcommand, ValueEnum};
use hookrelay::logging::{LogConfig, LogFormat};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;

use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "hookrelay")]
#[command(version)]
#[command(about = "Signed lifecycle-event webhooks")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook receiver and print emitted records as JSON lines
    Receive {
        /// Configuration file (TOML, JSON or .env)
        #[arg(short, long, env = "HOOKRELAY_CONFIG")]
        config: Option<PathBuf>,

        /// Override the configured bind address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Deliver one event descriptor
    Send {
        /// Configuration file (TOML, JSON or .env)
        #[arg(short, long, env = "HOOKRELAY_CONFIG")]
        config: Option<PathBuf>,

        /// Descriptor JSON file, or `-` for stdin
        #[arg(short, long)]
        event: PathBuf,
    },

    /// Print the hex HMAC-SHA256 signature of a body
    Sign {
        /// Shared secret
        #[arg(short, long, env = "HOOKRELAY_SECRET", hide_env_values = true)]
        secret: String,

        /// Sign the canonical form of the descriptor instead of the raw bytes
        #[arg(long)]
        canonical: bool,

        /// Body file, or `-` for stdin
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> CliResult<()> {
    LogConfig::new()
        .level(cli.log_level)
        .format(cli.log_format.into())
        .init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    match cli.command {
        Commands::Receive { config, bind } => {
            commands::receive::run(config.as_deref(), bind).await
        }
        Commands::Send { config, event } => commands::send::run(config.as_deref(), &event).await,
        Commands::Sign {
            secret,
            canonical,
            file,
        } => commands::sign::run(&secret, &file, canonical),
    }
}
