//! Live log streaming command: `mission-control logs`.

use anyhow::{Context, Result};
use std::sync::Arc;
use terminal_size::{Height, Width, terminal_size};

use mission_control::config::MissionConfig;
use mission_control::stream::{HttpLogSource, LogViewer, StreamState};
use mission_control::ui::StreamUI;

/// Viewport size: the real terminal when there is one, else the configured size.
fn viewport_size(config: &MissionConfig) -> (u16, u16) {
    match terminal_size() {
        Some((Width(cols), Height(rows))) if cols > 0 && rows > 0 => (cols, rows),
        _ => (config.viewer.cols, config.viewer.rows),
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

pub async fn cmd_logs(config: &MissionConfig, url: &str, no_progress: bool) -> Result<()> {
    let source = HttpLogSource::new(&config.api.base_url)
        .with_context(|| format!("Invalid API base URL '{}'", config.api.base_url))?;
    let (cols, rows) = viewport_size(config);

    let mut viewer =
        LogViewer::mount(Arc::new(source), cols, rows).context("Failed to create log viewport")?;
    let font_size = config.viewer.font_size();
    viewer.with_terminal(|terminal| terminal.set_font_size(font_size))?;

    let hidden = no_progress || !console::Term::stderr().is_term();
    let mut ui = StreamUI::new(url, hidden);
    if viewer.rotate_hint_visible() {
        ui.show_rotate_hint(cols);
        viewer.dismiss_rotate_hint();
    }

    let mut output = viewer.tap_output()?;
    let mut states = viewer.subscribe_state();
    viewer.open(url)?;

    let interrupt = interrupted();
    tokio::pin!(interrupt);

    let final_state = loop {
        tokio::select! {
            Some(text) = output.recv() => ui.print_chunk(&text),
            changed = states.changed() => {
                let state = states.borrow_and_update().clone();
                if changed.is_err() || state.is_settled() {
                    break state;
                }
            }
            _ = &mut interrupt => {
                viewer.close();
                ui.finish(&StreamState::Idle);
                anyhow::bail!("Interrupted");
            }
        }
    };

    // Writes land before the settling transition, so the tap already holds the rest
    while let Ok(text) = output.try_recv() {
        ui.print_chunk(&text);
    }
    ui.finish(&final_state);

    if let Some(session) = viewer.session() {
        tracing::debug!(
            session = %session.id,
            bytes = session.bytes_received,
            elapsed_ms = (chrono::Utc::now() - session.started_at).num_milliseconds(),
            "Log command finished"
        );
    }
    viewer.close();

    match final_state {
        StreamState::Error { message } => anyhow::bail!(message),
        _ => Ok(()),
    }
}
