use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

#[derive(Parser, Debug)]
#[command(
    name = "review-gate",
    author,
    version,
    about = "Multi-model code review gate"
)]
struct Cli {
    /// Deployment configuration (TOML); built-in defaults apply without it
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// JSON file holding issued API keys
    #[arg(
        long = "keys-file",
        value_name = "FILE",
        default_value = "./keys.json",
        global = true
    )]
    keys_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a diff for review (from a file, or stdin when omitted)
    Review {
        /// Diff file; stdin is read when not given
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// API key; falls back to REVIEW_GATE_API_KEY
        #[arg(long = "api-key", value_name = "KEY")]
        api_key: Option<String>,

        /// Emit the raw JSON response instead of the terminal report
        #[arg(long)]
        json: bool,
    },
    /// Administer issued API keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Issue a new key for a developer
    Create { developer: String },
    /// List all issued keys
    List,
    /// Re-enable a key
    Enable { api_key: String },
    /// Disable a key
    Disable { api_key: String },
    /// Show review counts per developer
    Usage,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Review {
            file,
            api_key,
            json,
        } => {
            commands::review(
                cli.config.as_deref(),
                &cli.keys_file,
                file.as_deref(),
                api_key,
                json,
            )
            .await
        }
        Commands::Keys { command } => {
            match command {
                KeysCommand::Create { developer } => {
                    commands::keys_create(&cli.keys_file, &developer).await?
                }
                KeysCommand::List => commands::keys_list(&cli.keys_file).await?,
                KeysCommand::Enable { api_key } => {
                    commands::keys_set_enabled(&cli.keys_file, &api_key, true).await?
                }
                KeysCommand::Disable { api_key } => {
                    commands::keys_set_enabled(&cli.keys_file, &api_key, false).await?
                }
                KeysCommand::Usage => commands::keys_usage(&cli.keys_file).await?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
