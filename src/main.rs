use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mission_control::config::{CliOverrides, MissionConfig};
use mission_control::logging;

mod cmd;

#[derive(Parser)]
#[command(name = "mission-control")]
#[command(version, about = "Cloud resource console: preferences, live build logs and the log proxy")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to mission.toml (default: <config_dir>/mission-control/mission.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the stream-logs proxy. Overrides mission.toml and MISSION_CONTROL_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory holding stored preferences. Overrides mission.toml and MISSION_CONTROL_STORAGE_DIR.
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api_url: self.api_url.clone(),
            storage_dir: self.storage_dir.clone(),
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and write stored preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Stream a build or deployment log through the proxy
    Logs {
        /// Upstream log URL
        url: String,

        /// Don't show the progress spinner
        #[arg(long)]
        no_progress: bool,
    },
    /// Run the stream-logs proxy server
    Serve {
        /// Port to serve on (default: [server] port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (default: [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (CORS permissive for browser clients on another origin)
        #[arg(long)]
        dev: bool,
    },
    /// View, validate or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum PrefsCommands {
    /// Print a stored value
    Get {
        key: String,
        /// Value to print when the key is not set (JSON, or a plain string)
        #[arg(long)]
        default: Option<String>,
    },
    /// Store a value (JSON, or a plain string)
    Set { key: String, value: String },
    /// Remove a stored value
    Clear { key: String },
    /// Show, set or clear the API token
    Token {
        #[arg(long, conflicts_with = "clear")]
        set: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    /// Show or set the theme (light, dark, system)
    Theme {
        #[arg(long)]
        set: Option<String>,
    },
    /// Add or remove a favorite resource
    Favorite {
        /// Resource kind: app, droplet, database, domain
        kind: String,
        id: String,
        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,
    },
    /// List favorite resources
    Favorites,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default mission.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    // `config init` must work before any config file exists
    if let Commands::Config {
        command: Some(ConfigCommands::Init),
    } = &cli.command
    {
        return cmd::cmd_config_init(cli.config.as_deref());
    }

    let config = MissionConfig::resolve(cli.config.as_deref(), &overrides)?;
    let _log_guard = logging::init(&config.logging)?;

    match &cli.command {
        Commands::Prefs { command } => cmd::cmd_prefs(&config, command.clone()).await?,
        Commands::Logs { url, no_progress } => cmd::cmd_logs(&config, url, *no_progress).await?,
        Commands::Serve { port, host, dev } => {
            cmd::cmd_serve(&config, *port, host.clone(), *dev).await?
        }
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
