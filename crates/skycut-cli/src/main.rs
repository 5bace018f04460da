//! Administrative command-line interface for skycut.

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skycut_core::db::{create_pool, Migrator};
use skycut_core::Config;

#[derive(Parser)]
#[command(name = "skycut")]
#[command(about = "Skycut image cutout service")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "SKYCUT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve,

    /// Initialize the database storage
    Init {
        /// Delete all existing database data first
        #[arg(long)]
        reset: bool,
    },

    /// Validate the configuration and print the effective values
    Config,
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Command::Serve => {
            skycut_api::run(config).await?;
        }
        Command::Init { reset } => {
            let pool = create_pool(&config.database).await?;
            let migrator = Migrator::new(pool);
            if reset {
                migrator.reset().await?;
            } else {
                migrator.initialize().await?;
            }
            info!("Database initialized");
        }
        Command::Config => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
