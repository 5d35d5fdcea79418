// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run-environment contract

use crate::error::EnvironmentError;
use async_trait::async_trait;
use dh_core::{ContainerId, RunId, RunStatus};
use std::path::Path;
use std::time::Duration;

/// Directory holding asset containers inside a runtime directory.
pub const ASSETS_DIR: &str = "__assets";

/// Accumulated stdout of a run, inside the run directory.
pub const STDOUT_LOG: &str = "stdout.log";

/// Accumulated stderr of a run, inside the run directory.
pub const STDERR_LOG: &str = "stderr.log";

/// Working subdirectory where a run's commands execute.
pub const WORK_DIR: &str = "run";

/// One execution substrate supervising named runs and their asset containers.
///
/// All state mutation within one environment is single-writer: lifecycle
/// operations serialize against the environment's internal maps. Polling is
/// pull-based, so status only advances inside operations that observe it
/// (`get_status`, `stop`, `clean`, `wait`).
#[async_trait]
pub trait RunEnvironment: Send + Sync {
    /// Register and launch a run executing `commands` in order.
    ///
    /// Fails if the run id is already known, if the command list is empty,
    /// or if the transport refuses the submission. Execution failures of
    /// the commands themselves are observable only through the run status.
    async fn start(&self, run: &RunId, commands: Vec<Vec<String>>) -> Result<(), EnvironmentError>;

    /// Force an alive run into `stopped`; no-op if already terminal.
    async fn stop(&self, run: &RunId) -> Result<(), EnvironmentError>;

    /// Stop the run if alive, remove its on-host directory, and forget it.
    async fn clean(&self, run: &RunId) -> Result<(), EnvironmentError>;

    /// Refresh and return the run's status.
    async fn get_status(&self, run: &RunId) -> Result<RunStatus, EnvironmentError>;

    /// The run's accumulated stdout bytes.
    async fn get_stdout(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError>;

    /// The run's accumulated stderr bytes.
    async fn get_stderr(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError>;

    /// Read a file at `path` relative to the run's working directory.
    async fn get_file(&self, run: &RunId, path: &str) -> Result<Vec<u8>, EnvironmentError>;

    /// Store a local file into an asset container at `remote_path`,
    /// creating intermediate directories.
    async fn add_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError>;

    /// Whether the container holds an asset at `remote_path`.
    async fn has_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<bool, EnvironmentError>;

    /// Absolute host path of an asset, for a run's commands to read directly.
    async fn get_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<String, EnvironmentError>;

    /// Recursively remove the container; no-op if it never existed.
    async fn clean_assets(&self, container: &ContainerId) -> Result<(), EnvironmentError>;

    /// Poll the given runs until all are terminal.
    ///
    /// Returns `true` once every id is terminal, `false` if `limit` elapses
    /// first. The deadline counts accumulated sleep time, not wall clock.
    async fn wait(
        &self,
        runs: &[RunId],
        interval: Duration,
        limit: Option<Duration>,
    ) -> Result<bool, EnvironmentError> {
        let mut remaining: Vec<RunId> = runs.to_vec();
        let mut waited = Duration::ZERO;

        loop {
            let mut still_alive = Vec::with_capacity(remaining.len());
            for run in remaining {
                if self.get_status(&run).await?.is_alive() {
                    still_alive.push(run);
                }
            }
            remaining = still_alive;

            if remaining.is_empty() {
                return Ok(true);
            }

            if let Some(limit) = limit {
                if waited > limit {
                    return Ok(false);
                }
            }

            tokio::time::sleep(interval).await;
            waited += interval;
        }
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
