//! The "Obra em 3D" dialog.
//!
//! A terminal cannot embed the interactive viewer, so the dialog shows the
//! link and hands it to the system browser or clipboard on request. The URL
//! is passed through untouched.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

pub const HINT_TEXT: &str =
    "Oferecemos essa obra de maneira interativa em 3D, clique no botão abaixo para visualizar.";
pub const BUTTON_TEXT: &str = "Visualizar obra em 3D";
pub const DIALOG_TITLE: &str = "Obra em 3D";
pub const DIALOG_DESCRIPTION: &str = "Você pode interagir com essa obra em 3D.";

/// An open 3D viewer dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerDialog {
    pub url: String,
    /// Conversation index of the message the link belongs to.
    pub message_index: usize,
}

impl ViewerDialog {
    pub fn new(url: impl Into<String>, message_index: usize) -> Self {
        Self {
            url: url.into(),
            message_index,
        }
    }
}

fn opener_command(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(url);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// Opens `url` with the platform's default handler without waiting for it.
pub fn open_in_browser(url: &str) -> Result<()> {
    let mut cmd = opener_command(url);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("could not launch a browser for {}", url))?;
    Ok(())
}

fn clipboard_command() -> Command {
    if cfg!(target_os = "macos") {
        Command::new("pbcopy")
    } else if cfg!(target_os = "windows") {
        Command::new("clip")
    } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        Command::new("wl-copy")
    } else {
        let mut cmd = Command::new("xclip");
        cmd.args(["-selection", "clipboard"]);
        cmd
    }
}

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut child = clipboard_command()
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("no clipboard tool available")?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    child.wait()?;
    Ok(())
}
