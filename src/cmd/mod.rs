//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `prefs`  | `Prefs`          |
//! | `logs`   | `Logs`           |
//! | `serve`  | `Serve`          |
//! | `config` | `Config`         |

pub mod config;
pub mod logs;
pub mod prefs;
pub mod serve;

pub use config::{cmd_config, cmd_config_init};
pub use logs::cmd_logs;
pub use prefs::cmd_prefs;
pub use serve::cmd_serve;
