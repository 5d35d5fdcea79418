// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run lifecycle status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a tracked run.
///
/// A run enters `Scheduled` only on the batch backend (submitted to the
/// queue, not yet dispatched); the local and remote-shell backends go
/// straight to `Started`. `Finished`, `Failed`, and `Stopped` are terminal:
/// no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Submitted to a batch queue, not yet running
    Scheduled,
    /// Currently executing on the host
    Started,
    /// All commands returned exit code zero in order
    Finished,
    /// Some command returned nonzero, or the queue-level completion marker
    /// is missing (batch only)
    Failed,
    /// Terminated by an explicit stop call
    Stopped,
}

impl RunStatus {
    /// A run is alive while it is scheduled or started.
    pub fn is_alive(self) -> bool {
        matches!(self, RunStatus::Scheduled | RunStatus::Started)
    }

    /// Complement of [`is_alive`](Self::is_alive).
    pub fn is_terminal(self) -> bool {
        !self.is_alive()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Scheduled => write!(f, "scheduled"),
            RunStatus::Started => write!(f, "started"),
            RunStatus::Finished => write!(f, "finished"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
