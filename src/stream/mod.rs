//! Live log streaming: byte source, UTF-8 decoding, terminal viewport and the
//! viewer that ties them together.

pub mod decoder;
pub mod source;
pub mod terminal;
pub mod viewer;

pub use decoder::Utf8ChunkDecoder;
pub use source::{HttpLogSource, LogBody, LogSource, STREAM_LOGS_PATH};
pub use terminal::TerminalBuffer;
pub use viewer::{LogViewer, SessionInfo, StreamState};
