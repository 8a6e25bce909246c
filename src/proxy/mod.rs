//! HTTP side of log streaming: the `stream-logs` proxy that fetches an
//! upstream log URL and relays its body unchanged, chunk by chunk.

pub mod api;
pub mod server;

pub use api::{ApiError, AppState, SharedState, api_router};
pub use server::{ServerConfig, build_router, serve, start_server};
