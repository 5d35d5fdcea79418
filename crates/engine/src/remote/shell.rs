// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detached remote-shell run environment

use super::{RemoteRuns, RUN_SCRIPT};
use crate::environment::{RunEnvironment, STDERR_LOG, STDOUT_LOG};
use crate::error::EnvironmentError;
use async_trait::async_trait;
use dh_core::{ContainerId, RunId, RunStatus};
use dh_transport::{CallOptions, Transport};
use std::path::Path;
use tokio::sync::Mutex;

/// Run environment launching detached shell processes on a transport host.
///
/// A run's commands are batched into `run.sh` and launched once with
/// `sh run.sh &`; the shell's `$!` is the run handle. Command ordering is
/// enforced by `sh` on the host, so polling only needs a single liveness
/// check per run. State survives supervisor restarts through the
/// `state.json` mirror.
pub struct ShellEnvironment<T: Transport> {
    inner: Mutex<RemoteRuns<T>>,
}

impl<T: Transport> ShellEnvironment<T> {
    /// Connect over `transport` to an existing absolute runtime directory,
    /// rejoining any runs recorded in the state mirror.
    pub async fn connect(
        transport: T,
        runtime_dir: impl Into<String>,
    ) -> Result<Self, EnvironmentError> {
        let inner = RemoteRuns::connect(transport, runtime_dir).await?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

/// Poll every alive run with `kill -0`; a vanished process is mapped to
/// finished or failed through the recorded `return_code`.
async fn advance<T: Transport>(runs: &mut RemoteRuns<T>) -> Result<(), EnvironmentError> {
    let mut updated = false;

    for run in runs.alive_runs() {
        let pid = runs.handle_of(&run)?;
        let probe = runs
            .transport()
            .call(
                &["kill", "-0", &pid.to_string()],
                CallOptions::default().tolerant(),
            )
            .await?;

        // Still running (or at least still visible).
        if probe.success() {
            continue;
        }

        let code = runs.read_return_code(&run).await?;
        let status = if code == 0 {
            RunStatus::Finished
        } else {
            RunStatus::Failed
        };
        runs.update_status(&run, status);
        updated = true;
    }

    if updated {
        runs.persist_state().await?;
    }
    Ok(())
}

#[async_trait]
impl<T: Transport> RunEnvironment for ShellEnvironment<T> {
    async fn start(&self, run: &RunId, commands: Vec<Vec<String>>) -> Result<(), EnvironmentError> {
        let mut runs = self.inner.lock().await;

        runs.prepare_run(run, &commands).await?;

        let work_dir = runs.work_dir(run);
        let output = runs
            .transport()
            .call(
                &["sh", RUN_SCRIPT, "&", "echo", "$!"],
                CallOptions::in_dir(&work_dir),
            )
            .await?;
        let pid: i64 = output
            .stdout_text()
            .trim()
            .parse()
            .map_err(|_| EnvironmentError::PidUnrecovered)?;

        runs.record(run, pid, RunStatus::Started);
        runs.persist_state().await?;

        tracing::info!(run = %run, pid, "started run");
        Ok(())
    }

    async fn stop(&self, run: &RunId) -> Result<(), EnvironmentError> {
        let mut runs = self.inner.lock().await;
        advance(&mut runs).await?;

        if runs.status_of(run)?.is_alive() {
            let pid = runs.handle_of(run)?;
            runs.transport()
                .call(&["kill", "-9", &pid.to_string()], CallOptions::default())
                .await?;
            runs.update_status(run, RunStatus::Stopped);
            runs.persist_state().await?;
        }

        tracing::info!(run = %run, "stopped run");
        Ok(())
    }

    async fn clean(&self, run: &RunId) -> Result<(), EnvironmentError> {
        let mut runs = self.inner.lock().await;
        advance(&mut runs).await?;

        if runs.status_of(run)?.is_alive() {
            let pid = runs.handle_of(run)?;
            runs.transport()
                .call(&["kill", "-9", &pid.to_string()], CallOptions::default())
                .await?;
            runs.update_status(run, RunStatus::Stopped);
        }

        runs.remove_run_dir(run).await?;
        runs.forget(run);
        runs.persist_state().await?;

        tracing::info!(run = %run, "cleaned run");
        Ok(())
    }

    async fn get_status(&self, run: &RunId) -> Result<RunStatus, EnvironmentError> {
        let mut runs = self.inner.lock().await;
        advance(&mut runs).await?;
        runs.status_of(run)
    }

    async fn get_stdout(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.status_of(run)?;
        let dir = runs.run_dir(run);
        runs.read_run_file(&dir, STDOUT_LOG).await
    }

    async fn get_stderr(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.status_of(run)?;
        let dir = runs.run_dir(run);
        runs.read_run_file(&dir, STDERR_LOG).await
    }

    async fn get_file(&self, run: &RunId, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.status_of(run)?;
        let dir = runs.work_dir(run);
        runs.read_run_file(&dir, path).await
    }

    async fn add_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.add_asset(container, remote_path, local_path).await
    }

    async fn has_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<bool, EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.has_asset(container, remote_path).await
    }

    async fn get_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<String, EnvironmentError> {
        let runs = self.inner.lock().await;
        Ok(runs.get_asset(container, remote_path))
    }

    async fn clean_assets(&self, container: &ContainerId) -> Result<(), EnvironmentError> {
        let runs = self.inner.lock().await;
        runs.clean_assets(container).await
    }
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
