mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use edu_models::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "educonnect-cli")]
#[command(about = "Administration tools for EduConnect")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to configs/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant the instructor role to the user with this email
    Promote {
        email: String,
    },

    /// Apply database migrations
    Migrate,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Promote { email } => {
            let store = commands::open_store(&config).await?;
            let (message, found) = commands::promote(&store, &email).await?;
            println!("{message}");
            if !found {
                std::process::exit(1);
            }
        }
        Commands::Migrate => {
            println!("{}", commands::migrate(&config).await?);
        }
        Commands::Config => {
            print!("{}", commands::render_config(&config)?);
        }
    }
    Ok(())
}
