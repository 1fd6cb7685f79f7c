//! Clipboard output through the platform's clipboard tools

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// Clipboard commands tried in order
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Feed `text` to `program` on stdin; `Ok(false)` when it is not installed
///
/// The child is always reaped, including when writing to it fails.
fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<bool> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Clipboard tool {} not installed", program);
            return Ok(false);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to run {}", program)),
    };

    // Dropping stdin closes the pipe so the tool sees EOF
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };

    if let Err(e) = written {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e).with_context(|| format!("Failed to write to {}", program));
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for {}", program))?;
    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(true)
}

/// Copy text to the system clipboard using the first tool that is installed
pub fn copy_to_clipboard(text: &str) -> Result<&'static str> {
    for (program, args) in CLIPBOARD_COMMANDS {
        if pipe_to(program, args, text)? {
            debug!("Copied {} bytes with {}", text.len(), program);
            return Ok(program);
        }
    }

    bail!("No clipboard tool found (tried pbcopy, wl-copy, xclip, xsel)")
}
