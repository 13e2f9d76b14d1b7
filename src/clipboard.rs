use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

/// Write-only plain-text clipboard.
pub trait Clipboard: Send {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Pipes text into whichever platform clipboard command is available.
#[derive(Debug, Default)]
pub struct SystemClipboard;

const COMMANDS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip.exe", &[]),
];

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        for (program, args) in COMMANDS {
            let Ok(mut child) = Command::new(program)
                .args(*args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            else {
                continue;
            };

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .with_context(|| format!("writing to {}", program))?;
            }
            let status = child.wait().with_context(|| format!("waiting for {}", program))?;
            if status.success() {
                tracing::debug!(program, bytes = text.len(), "copied to clipboard");
                return Ok(());
            }
        }
        Err(anyhow!("no clipboard command available (tried pbcopy, wl-copy, xclip, xsel, clip.exe)"))
    }
}

#[cfg(test)]
pub use memory::MemoryClipboard;
