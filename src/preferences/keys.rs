//! Well-known preference keys and typed accessors for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Preferences;
use crate::errors::PreferenceError;
use crate::resources::ResourceKind;

/// DigitalOcean API token used by every resource call.
pub const AUTH_TOKEN: &str = "token";
pub const THEME: &str = "theme";
pub const FAVORITES: &str = "favorites";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the device setting
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
            Theme::System => write!(f, "system"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => anyhow::bail!("Invalid theme '{}'. Valid values: light, dark, system", s),
        }
    }
}

/// A pinned resource shown on the home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

impl Favorite {
    fn same_resource(&self, other: &Favorite) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl Preferences {
    pub async fn auth_token(&self) -> Result<Option<String>, PreferenceError> {
        self.get(AUTH_TOKEN).await
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<(), PreferenceError> {
        self.set(AUTH_TOKEN, token).await
    }

    /// Sign out.
    pub async fn clear_auth_token(&self) -> Result<(), PreferenceError> {
        self.clear(AUTH_TOKEN).await
    }

    pub async fn theme(&self) -> Result<Theme, PreferenceError> {
        self.get_or(THEME, Theme::default()).await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), PreferenceError> {
        self.set(THEME, &theme).await
    }

    pub async fn favorites(&self) -> Result<Vec<Favorite>, PreferenceError> {
        self.get_or(FAVORITES, Vec::new()).await
    }

    /// Add `favorite` if no entry with the same kind and id exists, otherwise remove it.
    /// Returns whether the resource is a favorite afterwards.
    ///
    /// This is a read-modify-write; two concurrent toggles can lose one update.
    pub async fn toggle_favorite(&self, favorite: Favorite) -> Result<bool, PreferenceError> {
        let mut favorites = self.favorites().await?;
        let before = favorites.len();
        favorites.retain(|f| !f.same_resource(&favorite));
        let added = favorites.len() == before;
        if added {
            favorites.push(favorite);
        }
        self.set(FAVORITES, &favorites).await?;
        Ok(added)
    }
}
