//! Line-oriented terminal front end.
//!
//! Prints status changes as they happen and shows notices on stderr. A
//! terminal cannot wait for the operator to dismiss a notice, so a notice
//! asking for a resync requests it immediately.

use std::io::{self, Write};
use std::sync::OnceLock;

use parking_lot::Mutex;
use sle_proto::{LogEntry, Profile, ProviderType};
use tracing::{debug, warn};

use crate::link::LinkStatus;
use crate::notice::{Notice, NoticeSink, Recovery, ResyncHandle};
use crate::provider::{ProviderStatus, UNKNOWN_LABEL};
use crate::view::ConsoleView;

/// Prints to a writer; notices go to a separate writer.
pub struct TerminalView {
    echo: bool,
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    resync: OnceLock<ResyncHandle>,
}

impl std::fmt::Debug for TerminalView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalView")
            .field("echo", &self.echo)
            .finish_non_exhaustive()
    }
}

impl TerminalView {
    /// View on stdout/stderr. With `echo` off only notices are printed.
    #[must_use]
    pub fn stdio(echo: bool) -> Self {
        Self::new(echo, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// View on arbitrary writers.
    #[must_use]
    pub fn new(echo: bool, out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            echo,
            out: Mutex::new(out),
            err: Mutex::new(err),
            resync: OnceLock::new(),
        }
    }

    /// Where resync requests from notices go. Only the first call counts.
    pub fn set_resync_handle(&self, handle: ResyncHandle) {
        if self.resync.set(handle).is_err() {
            debug!("resync handle already set");
        }
    }

    fn line(&self, text: &str) {
        if !self.echo {
            return;
        }
        if let Err(e) = writeln!(self.out.lock(), "{text}") {
            warn!(error = %e, "failed to write status line");
        }
    }
}

impl ConsoleView for TerminalView {
    fn provider_changed(&self, status: &ProviderStatus) {
        let mut text = format!(
            "[{}] {} profile={} connection={} transferred={} delivery={}",
            status.provider,
            status.state,
            status.bound_profile.as_deref().unwrap_or(UNKNOWN_LABEL),
            status
                .connection_number
                .map_or_else(|| UNKNOWN_LABEL.to_string(), |n| n.to_string()),
            status.transfer_data_count,
            status.delivery_mode_label(),
        );
        if status.bind_in_flight {
            text.push_str(" (binding)");
        }
        self.line(&text);
    }

    fn link_changed(&self, status: &LinkStatus) {
        self.line(&format!(
            "[{}] {} transferred={}",
            status.link, status.state, status.transfer_data_count
        ));
    }

    fn selection_changed(&self, provider: ProviderType, profile: Option<&str>, locked: bool) {
        let lock = if locked { " (locked)" } else { "" };
        self.line(&format!(
            "[{provider}] selected profile={}{lock}",
            profile.unwrap_or(UNKNOWN_LABEL)
        ));
    }

    fn profiles_changed(&self, profiles: &[Profile]) {
        self.line(&format!("profiles: {}", profiles.len()));
    }

    fn log_appended(&self, entry: &LogEntry) {
        self.line(&format!("{} {:<7} {}", entry.time, entry.level, entry.message));
    }

    fn connection_changed(&self, connected: bool) {
        self.line(if connected {
            "connected to the proxy"
        } else {
            "disconnected from the proxy"
        });
    }
}

impl NoticeSink for TerminalView {
    fn show(&self, notice: Notice) {
        if let Err(e) = writeln!(self.err.lock(), "{notice}") {
            warn!(error = %e, "failed to write notice");
        }
        if notice.recovery() == Recovery::Resync {
            match self.resync.get() {
                Some(handle) => handle.request_resync(),
                None => debug!("no resync handle, skipping resync"),
            }
        }
    }
}
