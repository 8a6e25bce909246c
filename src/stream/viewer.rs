//! Log viewer: one terminal viewport plus the stream session feeding it.
//!
//! ```text
//!  idle ──open(url)──> loading ──end of stream──> success
//!                         │                          │
//!                         └──fetch/read failure──> error
//!  success | error ──refresh(overwrite)──> loading
//!  any ──close()──> viewport disposed, session cancelled
//! ```
//!
//! Every session owns a `CancellationToken`. Starting a new session (refresh
//! or a new URL) or closing the viewer cancels the previous token; the read
//! loop drops its response at the next suspension point, which releases the
//! connection. Writes and state transitions are committed under the viewport
//! lock only while the session's token is live, so a superseded session can
//! never write into the buffer or flip the state after its replacement started.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::decoder::Utf8ChunkDecoder;
use super::source::LogSource;
use super::terminal::{ROTATE_HINT_MIN_COLS, TerminalBuffer};
use crate::errors::{StreamError, ViewerError};

/// Lifecycle state of the current stream session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    /// No URL yet, or the viewer was closed.
    #[default]
    Idle,
    Loading,
    Success,
    Error { message: String },
}

impl StreamState {
    /// `Success` or `Error`.
    pub fn is_settled(&self) -> bool {
        matches!(self, StreamState::Success | StreamState::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            StreamState::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Metadata for one fetch of the target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub bytes_received: u64,
}

struct Surface {
    terminal: TerminalBuffer,
    session: Option<SessionInfo>,
}

struct Shared {
    surface: Mutex<Surface>,
    state: watch::Sender<StreamState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the viewport lock, but only while `cancel` is live.
    fn commit<R>(
        &self,
        cancel: &CancellationToken,
        f: impl FnOnce(&mut Surface, &watch::Sender<StreamState>) -> R,
    ) -> Option<R> {
        let mut surface = self.lock();
        if cancel.is_cancelled() {
            return None;
        }
        Some(f(&mut surface, &self.state))
    }

    fn fail(&self, cancel: &CancellationToken, error: &StreamError) {
        let committed = self.commit(cancel, |surface, state| {
            tracing::debug!(
                session = ?surface.session.as_ref().map(|s| s.id),
                error = %error,
                "Log stream failed"
            );
            state.send_replace(StreamState::Error {
                message: error.user_message().to_string(),
            });
        });
        if committed.is_none() {
            tracing::debug!(error = %error, "Ignoring failure of a superseded session");
        }
    }
}

struct ActiveSession {
    cancel: CancellationToken,
    // Held so the task is not detached silently; it exits on cancellation.
    _handle: JoinHandle<()>,
}

/// A mounted log viewport.
///
/// Sessions are spawned onto the current tokio runtime, so `open` and
/// `refresh` must be called from within one.
pub struct LogViewer {
    source: Arc<dyn LogSource>,
    shared: Arc<Shared>,
    target: Option<String>,
    active: Option<ActiveSession>,
    rotate_hint_dismissed: bool,
    closed: bool,
}

impl LogViewer {
    /// Create the viewport. No fetch happens until a URL is provided.
    pub fn mount(source: Arc<dyn LogSource>, cols: u16, rows: u16) -> Result<Self, ViewerError> {
        let terminal = TerminalBuffer::new(cols, rows)?;
        let (state, _rx) = watch::channel(StreamState::Idle);
        Ok(Self {
            source,
            shared: Arc::new(Shared {
                surface: Mutex::new(Surface {
                    terminal,
                    session: None,
                }),
                state,
            }),
            target: None,
            active: None,
            rotate_hint_dismissed: false,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), ViewerError> {
        if self.closed {
            Err(ViewerError::Closed)
        } else {
            Ok(())
        }
    }

    /// Point the viewer at `target` and start streaming it.
    ///
    /// A different URL replaces the buffer; the same URL behaves like
    /// `refresh(true)`.
    pub fn open(&mut self, target: impl Into<String>) -> Result<(), ViewerError> {
        self.ensure_open()?;
        self.target = Some(target.into());
        self.start_session(true)
    }

    /// Re-fetch the current URL. With `overwrite`, the buffer is cleared first;
    /// otherwise new output is appended after the old.
    pub fn refresh(&mut self, overwrite: bool) -> Result<(), ViewerError> {
        self.ensure_open()?;
        self.start_session(overwrite)
    }

    fn start_session(&mut self, overwrite: bool) -> Result<(), ViewerError> {
        let target = self.target.clone().ok_or(ViewerError::NoTarget)?;

        if let Some(previous) = self.active.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let info = SessionInfo {
            id: Uuid::new_v4(),
            target: target.clone(),
            started_at: Utc::now(),
            bytes_received: 0,
        };
        {
            let mut surface = self.shared.lock();
            if overwrite {
                surface.terminal.clear()?;
            }
            surface.session = Some(info.clone());
            self.shared.state.send_replace(StreamState::Loading);
        }

        tracing::debug!(session = %info.id, target = %target, overwrite, "Log stream session started");
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.source),
            Arc::clone(&self.shared),
            target,
            cancel.clone(),
        ));
        self.active = Some(ActiveSession {
            cancel,
            _handle: handle,
        });
        Ok(())
    }

    /// Dispose the viewport and abort any in-flight fetch. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        {
            let mut surface = self.shared.lock();
            surface.terminal.dispose();
            surface.session = None;
            self.shared.state.send_replace(StreamState::Idle);
        }
        tracing::debug!("Log viewer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    /// Wait until the current session leaves `Loading`.
    pub async fn wait_settled(&self) -> StreamState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|state| *state != StreamState::Loading).await {
            Ok(state) => state.clone(),
            Err(_) => StreamState::Idle,
        }
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.shared.lock().session.clone()
    }

    /// Everything rendered so far.
    pub fn contents(&self) -> String {
        self.shared.lock().terminal.contents().to_string()
    }

    pub fn visible_lines(&self) -> Vec<String> {
        self.shared.lock().terminal.visible_lines()
    }

    /// Receive every chunk of text as it is written to the viewport.
    pub fn tap_output(&self) -> Result<mpsc::UnboundedReceiver<String>, ViewerError> {
        self.ensure_open()?;
        Ok(self.shared.lock().terminal.tap())
    }

    /// Run a viewport control (zoom, scroll, resize) against the terminal.
    /// These never touch the stream state.
    pub fn with_terminal<R>(
        &self,
        f: impl FnOnce(&mut TerminalBuffer) -> R,
    ) -> Result<R, ViewerError> {
        self.ensure_open()?;
        Ok(f(&mut self.shared.lock().terminal))
    }

    pub fn zoom_in(&self) -> Result<u8, ViewerError> {
        self.with_terminal(TerminalBuffer::zoom_in)
    }

    pub fn zoom_out(&self) -> Result<u8, ViewerError> {
        self.with_terminal(TerminalBuffer::zoom_out)
    }

    pub fn reset_zoom(&self) -> Result<u8, ViewerError> {
        self.with_terminal(TerminalBuffer::reset_zoom)
    }

    pub fn scroll_to_top(&self) -> Result<(), ViewerError> {
        self.with_terminal(TerminalBuffer::scroll_to_top)
    }

    pub fn scroll_to_bottom(&self) -> Result<(), ViewerError> {
        self.with_terminal(TerminalBuffer::scroll_to_bottom)
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), ViewerError> {
        self.with_terminal(|terminal| terminal.resize(cols, rows))?
            .map_err(ViewerError::from)
    }

    /// Narrow viewports show a "rotate your device" overlay until dismissed.
    pub fn rotate_hint_visible(&self) -> bool {
        if self.closed || self.rotate_hint_dismissed {
            return false;
        }
        let (cols, _) = self.shared.lock().terminal.size();
        cols < ROTATE_HINT_MIN_COLS
    }

    pub fn dismiss_rotate_hint(&mut self) {
        self.rotate_hint_dismissed = true;
    }
}

impl Drop for LogViewer {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

async fn run_session(
    source: Arc<dyn LogSource>,
    shared: Arc<Shared>,
    target: String,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.open(&target) => opened,
    };
    let mut body = match opened {
        Ok(Some(body)) => body,
        Ok(None) => {
            shared.fail(&cancel, &StreamError::NoBody);
            return;
        }
        Err(e) => {
            shared.fail(&cancel, &e);
            return;
        }
    };

    let mut decoder = Utf8ChunkDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = body.next_chunk() => next,
        };
        match next {
            Ok(Some(chunk)) => {
                let text = decoder.decode(&chunk);
                let written = shared.commit(&cancel, |surface, _| {
                    if let Some(session) = surface.session.as_mut() {
                        session.bytes_received += chunk.len() as u64;
                    }
                    surface.terminal.write(&text)
                });
                match written {
                    Some(Ok(())) => {}
                    // Superseded or disposed: stop reading
                    None | Some(Err(_)) => return,
                }
            }
            Ok(None) => {
                let tail = decoder.finish();
                shared.commit(&cancel, |surface, state| {
                    if surface.terminal.write(&tail).is_ok() {
                        tracing::debug!(
                            session = ?surface.session.as_ref().map(|s| s.id),
                            bytes = surface.session.as_ref().map_or(0, |s| s.bytes_received),
                            "Log stream finished"
                        );
                        state.send_replace(StreamState::Success);
                    }
                });
                return;
            }
            Err(e) => {
                shared.fail(&cancel, &e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::LogBody;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::time::Duration;

    type ChunkTx = mpsc::UnboundedSender<Result<Bytes, StreamError>>;

    enum Script {
        Fail(StreamError),
        NoBody,
        Body(mpsc::UnboundedReceiver<Result<Bytes, StreamError>>),
    }

    /// Body fed from a channel; ends when every sender is dropped.
    struct ChannelBody {
        rx: mpsc::UnboundedReceiver<Result<Bytes, StreamError>>,
    }

    #[async_trait]
    impl LogBody for ChannelBody {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
            self.rx.recv().await.transpose()
        }
    }

    /// Serves one script per `open` call, in order.
    #[derive(Default)]
    struct ScriptedSource {
        scripts: Mutex<VecDeque<Script>>,
        opened: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                opened: Mutex::new(Vec::new()),
            })
        }

        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogSource for ScriptedSource {
        async fn open(&self, target: &str) -> Result<Option<Box<dyn LogBody>>, StreamError> {
            self.opened.lock().unwrap().push(target.to_string());
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::Fail(e)) => Err(e),
                Some(Script::NoBody) => Ok(None),
                Some(Script::Body(rx)) => Ok(Some(Box::new(ChannelBody { rx }))),
                None => Err(StreamError::Status { status: 404 }),
            }
        }
    }

    fn chunks(parts: &[&[u8]]) -> Script {
        let (tx, rx) = mpsc::unbounded_channel();
        for part in parts {
            tx.send(Ok(Bytes::copy_from_slice(part))).unwrap();
        }
        Script::Body(rx)
    }

    fn live() -> (ChunkTx, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Script::Body(rx))
    }

    fn mount(source: Arc<ScriptedSource>) -> LogViewer {
        LogViewer::mount(source, 100, 30).unwrap()
    }

    async fn settled(viewer: &LogViewer) -> StreamState {
        tokio::time::timeout(Duration::from_secs(5), viewer.wait_settled())
            .await
            .expect("session did not settle")
    }

    const URL: &str = "https://logs.example.com/build.log";

    #[tokio::test]
    async fn test_starts_idle_without_url() {
        let mut viewer = mount(ScriptedSource::new(vec![]));
        assert_eq!(viewer.state(), StreamState::Idle);
        assert_eq!(viewer.refresh(true), Err(ViewerError::NoTarget));
        assert!(viewer.session().is_none());
    }

    #[tokio::test]
    async fn test_chunks_render_in_order_and_succeed() {
        let source = ScriptedSource::new(vec![chunks(&[b"Buil", b"ding...\n", b"Done"])]);
        let mut viewer = mount(source.clone());

        viewer.open(URL).unwrap();
        assert_eq!(viewer.state(), StreamState::Loading);

        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "Building...\nDone");
        assert_eq!(source.opened(), vec![URL.to_string()]);

        let session = viewer.session().unwrap();
        assert_eq!(session.target, URL);
        assert_eq!(session.bytes_received, 16);
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        let text = "step ✅ → 🚀\n";
        let bytes = text.as_bytes();
        let parts: Vec<&[u8]> = bytes.chunks(3).collect();
        let mut viewer = mount(ScriptedSource::new(vec![chunks(&parts)]));

        viewer.open(URL).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), text);
    }

    #[tokio::test]
    async fn test_http_error_goes_straight_to_error_without_output() {
        let source = ScriptedSource::new(vec![Script::Fail(StreamError::Status { status: 500 })]);
        let mut viewer = mount(source);
        let mut output = viewer.tap_output().unwrap();

        viewer.open(URL).unwrap();
        let state = settled(&viewer).await;
        assert_eq!(state.error_message(), Some("Error fetching log"));
        assert_eq!(viewer.contents(), "");
        assert!(output.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_body_is_unable_to_read_stream() {
        let mut viewer = mount(ScriptedSource::new(vec![Script::NoBody]));
        viewer.open(URL).unwrap();
        assert_eq!(
            settled(&viewer).await,
            StreamState::Error {
                message: "Unable to read stream".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_read_failure_keeps_partial_output() {
        let (tx, script) = live();
        let mut viewer = mount(ScriptedSource::new(vec![script]));
        viewer.open(URL).unwrap();

        tx.send(Ok(Bytes::from_static(b"partial line\n"))).unwrap();
        tx.send(Err(StreamError::Read("connection reset".into())))
            .unwrap();

        let state = settled(&viewer).await;
        assert_eq!(state.error_message(), Some("Error fetching log"));
        assert_eq!(viewer.contents(), "partial line\n");
    }

    #[tokio::test]
    async fn test_refresh_with_overwrite_replaces_buffer() {
        let source = ScriptedSource::new(vec![chunks(&[b"OLD"]), chunks(&[b"NEW"])]);
        let mut viewer = mount(source);

        viewer.open(URL).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "OLD");

        viewer.refresh(true).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "NEW");
    }

    #[tokio::test]
    async fn test_refresh_without_overwrite_appends() {
        let source = ScriptedSource::new(vec![chunks(&[b"OLD\n"]), chunks(&[b"NEW\n"])]);
        let mut viewer = mount(source);

        viewer.open(URL).unwrap();
        settled(&viewer).await;
        viewer.refresh(false).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "OLD\nNEW\n");
    }

    #[tokio::test]
    async fn test_refresh_after_error_recovers() {
        let source = ScriptedSource::new(vec![
            Script::Fail(StreamError::Status { status: 502 }),
            chunks(&[b"ok"]),
        ]);
        let mut viewer = mount(source);

        viewer.open(URL).unwrap();
        assert!(settled(&viewer).await.error_message().is_some());
        viewer.refresh(true).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "ok");
    }

    #[tokio::test]
    async fn test_refresh_aborts_stale_session() {
        let (stale_tx, stale) = live();
        let source = ScriptedSource::new(vec![stale, chunks(&[b"fresh"])]);
        let mut viewer = mount(source);
        let mut output = viewer.tap_output().unwrap();

        viewer.open(URL).unwrap();
        stale_tx.send(Ok(Bytes::from_static(b"stale-1 "))).unwrap();
        assert_eq!(output.recv().await.as_deref(), Some("stale-1 "));

        viewer.refresh(true).unwrap();
        // Late bytes from the superseded fetch must not land in the buffer
        let _ = stale_tx.send(Ok(Bytes::from_static(b"stale-2 ")));

        assert_eq!(settled(&viewer).await, StreamState::Success);
        assert_eq!(viewer.contents(), "fresh");

        // The stale body was dropped, releasing the connection
        tokio::time::timeout(Duration::from_secs(5), stale_tx.closed())
            .await
            .expect("stale stream was not released");
        assert_eq!(viewer.state(), StreamState::Success);
    }

    #[tokio::test]
    async fn test_new_url_replaces_buffer() {
        let source = ScriptedSource::new(vec![chunks(&[b"build"]), chunks(&[b"deploy"])]);
        let mut viewer = mount(source.clone());

        viewer.open(URL).unwrap();
        settled(&viewer).await;
        viewer.open("https://logs.example.com/deploy.log").unwrap();
        settled(&viewer).await;

        assert_eq!(viewer.contents(), "deploy");
        assert_eq!(viewer.target(), Some("https://logs.example.com/deploy.log"));
        assert_eq!(source.opened().len(), 2);
    }

    #[tokio::test]
    async fn test_close_disposes_and_cancels_in_flight_fetch() {
        let (tx, script) = live();
        let mut viewer = mount(ScriptedSource::new(vec![script]));
        let mut output = viewer.tap_output().unwrap();

        viewer.open(URL).unwrap();
        tx.send(Ok(Bytes::from_static(b"first"))).unwrap();
        assert_eq!(output.recv().await.as_deref(), Some("first"));

        viewer.close();
        tokio::time::timeout(Duration::from_secs(5), tx.closed())
            .await
            .expect("in-flight stream was not released");

        assert!(viewer.is_closed());
        assert_eq!(viewer.state(), StreamState::Idle);
        assert_eq!(viewer.contents(), "");
        assert_eq!(viewer.refresh(true), Err(ViewerError::Closed));
        assert_eq!(viewer.zoom_in(), Err(ViewerError::Closed));
        // Closing twice is a no-op
        viewer.close();
    }

    #[tokio::test]
    async fn test_drop_cancels_in_flight_fetch() {
        let (tx, script) = live();
        let mut viewer = mount(ScriptedSource::new(vec![script]));
        viewer.open(URL).unwrap();
        drop(viewer);

        tokio::time::timeout(Duration::from_secs(5), tx.closed())
            .await
            .expect("stream outlived its viewer");
    }

    #[tokio::test]
    async fn test_build_output_renders_like_a_terminal() {
        // Colour code split across chunks, then a progress line rewritten with \r
        let source = ScriptedSource::new(vec![chunks(&[
            b"\x1b[3",
            b"2mcompiled\x1b[0m\n",
            b"upload 50%\rupload 100%\n",
        ])]);
        let mut viewer = mount(source);
        viewer.open(URL).unwrap();
        assert_eq!(settled(&viewer).await, StreamState::Success);

        let lines = viewer.visible_lines();
        assert_eq!(&lines[..3], ["compiled", "upload 100%", ""]);
        assert!(viewer.contents().starts_with("\x1b[32mcompiled"));
    }

    #[tokio::test]
    async fn test_viewport_controls_leave_state_alone() {
        let source = ScriptedSource::new(vec![chunks(&[b"a\nb\nc\n"])]);
        let mut viewer = mount(source);
        viewer.open(URL).unwrap();
        settled(&viewer).await;

        assert_eq!(viewer.zoom_in().unwrap(), 14);
        assert_eq!(viewer.zoom_out().unwrap(), 12);
        viewer.scroll_to_top().unwrap();
        viewer.scroll_to_bottom().unwrap();
        viewer.resize(40, 2).unwrap();
        assert_eq!(viewer.visible_lines(), vec!["c", ""]);
        assert_eq!(viewer.state(), StreamState::Success);
        assert_eq!(viewer.contents(), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_rotate_hint_on_narrow_viewport() {
        let mut narrow = LogViewer::mount(ScriptedSource::new(vec![]), 40, 20).unwrap();
        assert!(narrow.rotate_hint_visible());
        narrow.dismiss_rotate_hint();
        assert!(!narrow.rotate_hint_visible());

        let wide = LogViewer::mount(ScriptedSource::new(vec![]), 120, 20).unwrap();
        assert!(!wide.rotate_hint_visible());
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_success() {
        let (tx, script) = live();
        let mut viewer = mount(ScriptedSource::new(vec![script]));
        let mut states = viewer.subscribe_state();

        viewer.open(URL).unwrap();
        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), StreamState::Loading);

        drop(tx);
        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), StreamState::Success);
    }
}
