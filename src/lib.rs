pub mod config;
pub mod errors;
pub mod logging;
pub mod preferences;
pub mod proxy;
pub mod resources;
pub mod stream;
pub mod ui;
