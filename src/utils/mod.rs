//! Utility functions

mod clipboard;
mod sanitize;
pub mod tui_log;

pub use clipboard::copy_to_clipboard;
pub use sanitize::{sanitize_filename, title_case_slug};
pub use tui_log::{ConditionalStderrLayer, TuiModeGuard};
