//! Fire-and-forget notifications emitted by the store and the session.

use std::fmt;
use std::io::{self, IsTerminal, Write};

use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

/// Receives human-readable events. Delivery is advisory: nothing in the
/// core depends on a notification arriving.
pub trait NotificationSink {
    fn notify(&mut self, message: &str, severity: Severity);
}

/// Routes notifications into the tracing pipeline only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => error!(%severity, "{message}"),
            Severity::Info | Severity::Success => info!(%severity, "{message}"),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Vec<Notification>,
}

impl RecordingSink {
    pub fn events(&self) -> &[Notification] {
        &self.events
    }

    pub fn last(&self) -> Option<&Notification> {
        self.events.last()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.events)
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, message: &str, severity: Severity) {
        self.events.push(Notification {
            message: message.to_string(),
            severity,
        });
    }
}

/// Prints notifications to stderr, colored when attached to a terminal.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl NotificationSink for ConsoleSink {
    fn notify(&mut self, message: &str, severity: Severity) {
        debug!(%severity, message, "console notification");
        let mut err = io::stderr().lock();
        let line = if self.color && io::stderr().is_terminal() {
            let code = match severity {
                Severity::Info => "36",
                Severity::Success => "32",
                Severity::Error => "31",
            };
            format!("\x1b[{code}m[{severity}]\x1b[0m {message}")
        } else {
            format!("[{severity}] {message}")
        };
        // stderr going away is not worth failing a command over
        let _ = writeln!(err, "{line}");
    }
}
