//! Browser launching and manual-entry plumbing for terminal logins.

use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};

use smartmeal_core::auth::{AuthResult, BrowserLauncher, LaunchMode};
use smartmeal_core::{AuthError, LifecycleEvent, LifecycleHub};

/// A terminal has neither a host app for deep links nor an embedded web
/// view, so only `ExternalBrowser` is accepted.
#[derive(Debug, Clone, Copy)]
pub struct TerminalLauncher {
    open_browser: bool,
}

impl TerminalLauncher {
    pub const fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl BrowserLauncher for TerminalLauncher {
    fn launch(&self, mode: LaunchMode, url: &str) -> AuthResult<()> {
        if mode != LaunchMode::ExternalBrowser {
            return Err(AuthError::Launch(format!(
                "{mode} is not available in a terminal"
            )));
        }

        eprintln!("Open this URL to authorize SmartMeal:\n\n  {url}\n");
        if self.open_browser {
            if let Err(error) = open_in_browser(url) {
                tracing::warn!("Failed to open browser: {}", error);
            }
        }
        eprintln!("After approving, paste the redirected URL (or just the code) here:");
        let _ = io::stderr().flush();
        Ok(())
    }
}

fn open_in_browser(url: &str) -> io::Result<()> {
    let mut command = browser_command(url);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn browser_command(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}

/// Forward each non-empty stdin line to `hub` as a manual code.
pub fn forward_stdin(hub: LifecycleHub) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(text) = normalize_pasted_line(&line) {
                hub.publish(LifecycleEvent::ManualCode(text));
            }
        }
    });
}

/// Forward Ctrl-C to `hub` as a cancellation.
pub fn forward_ctrl_c(hub: LifecycleHub) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            hub.publish(LifecycleEvent::Cancelled);
        }
    });
}

pub fn normalize_pasted_line(line: &str) -> Option<String> {
    let trimmed = line.trim().trim_matches(|ch| ch == '"' || ch == '\'');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
