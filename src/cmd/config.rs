//! Configuration view and validation commands: `mission-control config`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use mission_control::config::{MissionConfig, default_config_path};
use mission_control::ui::icons::{CHECK, WARN};

use super::super::ConfigCommands;

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().context("Could not determine the config directory"),
    }
}

pub fn cmd_config(
    config: &MissionConfig,
    explicit_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let path = config_path(explicit_path)?;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Mission Control Configuration");
            println!("=============================");
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No mission.toml at {} (using defaults)", path.display());
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            println!("[api]");
            println!("  base_url = \"{}\"", config.api.base_url);
            println!();
            println!("[storage]");
            println!("  dir = \"{}\"", config.storage.dir().display());
            println!();
            println!("[viewer]");
            println!("  font_size = {}", config.viewer.font_size());
            println!("  cols = {}", config.viewer.cols);
            println!("  rows = {}", config.viewer.rows);
            println!();
            println!("[server]");
            println!("  host = \"{}\"", config.server.host);
            println!("  port = {}", config.server.port);
            println!(
                "  request_timeout_secs = {}",
                config.server.request_timeout_secs
            );
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", config.logging.level);
            println!("  json = {}", config.logging.json);
            if let Some(file) = &config.logging.file {
                println!("  file = \"{}\"", file.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{}Configuration is valid.", CHECK);
            } else {
                println!("{}Configuration warnings:", WARN);
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => cmd_config_init(explicit_path)?,
    }

    Ok(())
}

/// Write a default mission.toml. Never overwrites an existing file.
pub fn cmd_config_init(explicit_path: Option<&Path>) -> Result<()> {
    let path = config_path(explicit_path)?;
    if path.exists() {
        println!("mission.toml already exists at {}", path.display());
        println!("Delete it first if you want to recreate it.");
        return Ok(());
    }

    MissionConfig::default().save(&path)?;

    println!("{}Created mission.toml at {}", CHECK, path.display());
    println!();
    println!("You can now customize:");
    println!("  - [api] base_url of the stream-logs proxy");
    println!("  - [storage] dir for saved preferences");
    println!("  - [viewer] font_size, cols, rows");
    println!("  - [server] host, port, request_timeout_secs");
    println!("  - [logging] level, json, file");
    println!();
    Ok(())
}
