//! Logging that steps aside while the picker owns the terminal
//!
//! Log lines written to stderr while the alternate screen is active would
//! corrupt the picker display, so the stderr layer is gated on a flag that
//! [`TuiModeGuard`] holds for the lifetime of the interactive session.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

static TUI_MODE: AtomicBool = AtomicBool::new(false);

fn set_tui_mode(enabled: bool) {
    TUI_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if the interactive picker currently owns the terminal
pub fn is_tui_mode() -> bool {
    TUI_MODE.load(Ordering::SeqCst)
}

/// Silences stderr logging until dropped
pub struct TuiModeGuard {
    previous: bool,
}

impl TuiModeGuard {
    pub fn enter() -> Self {
        let previous = is_tui_mode();
        set_tui_mode(true);
        Self { previous }
    }
}

impl Drop for TuiModeGuard {
    fn drop(&mut self) {
        set_tui_mode(self.previous);
    }
}

/// Wraps a layer and drops its output while the picker is active
pub struct ConditionalStderrLayer<L> {
    inner: L,
}

impl<L> ConditionalStderrLayer<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<S, L> Layer<S> for ConditionalStderrLayer<L>
where
    S: tracing::Subscriber,
    L: Layer<S>,
{
    // Span lifecycle is forwarded unconditionally
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        self.inner.on_new_span(attrs, id, ctx);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        self.inner.on_record(id, values, ctx);
    }

    fn on_close(&self, id: tracing::span::Id, ctx: Context<'_, S>) {
        self.inner.on_close(id, ctx);
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_event(event, ctx);
        }
    }

    fn on_enter(&self, id: &tracing::span::Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_enter(id, ctx);
        }
    }

    fn on_exit(&self, id: &tracing::span::Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_exit(id, ctx);
        }
    }
}
