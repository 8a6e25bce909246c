//! Preference commands: `mission-control prefs`.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use mission_control::config::MissionConfig;
use mission_control::preferences::{Favorite, Preferences, Theme};
use mission_control::resources::ResourceKind;
use mission_control::ui::icons::{CHECK, KEY, STAR};

use super::super::PrefsCommands;

/// Interpret CLI input as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Strings print bare, everything else as pretty JSON.
fn render_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string_pretty(other).context("Failed to render value"),
    }
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

pub async fn cmd_prefs(config: &MissionConfig, command: PrefsCommands) -> Result<()> {
    let dir = config.storage.dir();
    let prefs = Preferences::open(&dir);

    match command {
        PrefsCommands::Get { key, default } => {
            let stored = prefs
                .get_value(&key)
                .await
                .with_context(|| format!("Failed to read preference '{}'", key))?;
            let value = match (stored, default) {
                (Some(value), _) => value,
                (None, Some(default)) => parse_value(&default),
                (None, None) => anyhow::bail!("Preference '{}' is not set", key),
            };
            println!("{}", render_value(&value)?);
        }
        PrefsCommands::Set { key, value } => {
            prefs
                .set(&key, &parse_value(&value))
                .await
                .with_context(|| format!("Failed to store preference '{}'", key))?;
            println!("{}Saved {}", CHECK, style(&key).bold());
        }
        PrefsCommands::Clear { key } => {
            prefs
                .clear(&key)
                .await
                .with_context(|| format!("Failed to clear preference '{}'", key))?;
            println!("{}Cleared {}", CHECK, style(&key).bold());
        }
        PrefsCommands::Token { set, clear } => {
            if clear {
                prefs.clear_auth_token().await.context("Failed to clear token")?;
                println!("{}Signed out", CHECK);
            } else if let Some(token) = set {
                prefs
                    .set_auth_token(token.trim())
                    .await
                    .context("Failed to store token")?;
                println!("{}Token saved", CHECK);
            } else {
                match prefs.auth_token().await.context("Failed to read token")? {
                    Some(token) => println!("{}{}", KEY, mask_token(&token)),
                    None => println!("{}", style("No token set").dim()),
                }
            }
        }
        PrefsCommands::Theme { set } => {
            if let Some(raw) = set {
                let theme: Theme = raw.parse()?;
                prefs.set_theme(theme).await.context("Failed to store theme")?;
                println!("{}Theme set to {}", CHECK, theme);
            } else {
                println!("{}", prefs.theme().await.context("Failed to read theme")?);
            }
        }
        PrefsCommands::Favorite { kind, id, name } => {
            let kind: ResourceKind = kind.parse()?;
            let favorite = Favorite {
                kind,
                name: name.unwrap_or_else(|| id.clone()),
                id,
            };
            let label = format!("{} {}", favorite.kind, favorite.name);
            let added = prefs
                .toggle_favorite(favorite)
                .await
                .context("Failed to update favorites")?;
            if added {
                println!("{}Added {} to favorites", STAR, style(label).bold());
            } else {
                println!("{}Removed {} from favorites", CHECK, style(label).bold());
            }
        }
        PrefsCommands::Favorites => {
            let favorites = prefs.favorites().await.context("Failed to read favorites")?;
            if favorites.is_empty() {
                println!("{}", style("No favorites yet").dim());
            }
            for favorite in favorites {
                println!(
                    "{}{:<9} {} {}",
                    STAR,
                    favorite.kind.to_string(),
                    style(&favorite.name).bold(),
                    style(format!("({})", favorite.id)).dim()
                );
            }
        }
    }

    tracing::debug!(dir = %dir.display(), stats = ?prefs.cache().stats(), "Preference command done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("42"), serde_json::json!(42));
        assert_eq!(parse_value("[1,2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_value("\"quoted\""), serde_json::json!("quoted"));
        assert_eq!(parse_value("dark"), serde_json::json!("dark"));
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&serde_json::json!("plain")).unwrap(), "plain");
        assert_eq!(render_value(&serde_json::json!(true)).unwrap(), "true");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("dop_v1_abcdef1234"), "****1234");
        assert_eq!(mask_token("short"), "*****");
    }
}
