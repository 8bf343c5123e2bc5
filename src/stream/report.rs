//! Report channel: one status line per event, flushed immediately.
//!
//! ```text
//! QUEUED:<path>
//! SUCCESS:<path>
//! ERROR:<message>
//! ```
//!
//! Writing a status never fails from the caller's point of view. A closed or
//! broken report channel is logged once and otherwise ignored.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Queued(PathBuf),
    Success(PathBuf),
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Queued(path) => write!(f, "QUEUED:{}", path.display()),
            Status::Success(path) => write!(f, "SUCCESS:{}", path.display()),
            // Keep one status per line even if a cause spans several.
            Status::Error(message) => write!(f, "ERROR:{}", message.replace(['\r', '\n'], " ")),
        }
    }
}

/// Destination of status lines, shared by the control loop and the worker.
pub trait StatusSink: Send + Sync {
    fn emit(&self, status: Status);
}

/// Writes status lines to an `io::Write` (stdout in production).
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
    broken: AtomicBool,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            broken: AtomicBool::new(false),
        }
    }
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> StatusSink for ConsoleReporter<W> {
    fn emit(&self, status: Status) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = writeln!(out, "{}", status).and_then(|_| out.flush());
        if let Err(e) = result {
            if !self.broken.swap(true, Ordering::Relaxed) {
                warn!(error = %e, "report channel is not writable");
            }
        }
    }
}

/// Collects statuses in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<Status>>,
}

#[cfg(test)]
impl MemoryReporter {
    pub fn statuses(&self) -> Vec<Status> {
        self.lines.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.statuses().iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
impl StatusSink for MemoryReporter {
    fn emit(&self, status: Status) {
        self.lines.lock().unwrap().push(status);
    }
}
