//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Log streaming
pub static SCROLL: Emoji<'_, '_> = Emoji("📜 ", "");
pub static ROTATE: Emoji<'_, '_> = Emoji("🔄 ", "[<>]");

// Preferences
pub static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
pub static STAR: Emoji<'_, '_> = Emoji("⭐ ", "*");
