// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-backed run environments
//!
//! The remote-shell and batch environments share everything except how a
//! prepared run script is launched and polled: the shell variant detaches
//! `sh run.sh` and tracks the pid, the batch variant submits it to the
//! queue and tracks the job id. The shared machinery lives in [`RemoteRuns`],
//! composed into both (no inheritance).

mod batch;
mod shell;

pub use batch::BatchEnvironment;
pub use shell::ShellEnvironment;

use crate::environment::{ASSETS_DIR, STDERR_LOG, STDOUT_LOG, WORK_DIR};
use crate::error::EnvironmentError;
use dh_core::{ContainerId, RunId, RunStatus};
use dh_transport::{quote, CallOptions, Transport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub(crate) const STATE_FILE: &str = "state.json";
pub(crate) const RUN_SCRIPT: &str = "run.sh";
pub(crate) const RETURN_CODE_FILE: &str = "return_code";

/// On-host mirror of the run-state store.
///
/// Serialized verbatim as `state.json` in the runtime directory after every
/// supervisor-originated transition; the pid map doubles as the job-id map
/// on the batch backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StateFile {
    pub pids: HashMap<String, i64>,
    pub status: HashMap<String, RunStatus>,
}

/// Render the run script body: one line per command, each appending to the
/// shared logs, ordering enforced by `sh` rather than by the supervisor.
pub(crate) fn run_script(commands: &[Vec<String>]) -> String {
    commands
        .iter()
        .map(|command| {
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            format!(
                "{} 1>> ../{} 2>> ../{}",
                quote::join(&args),
                STDOUT_LOG,
                STDERR_LOG
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shared state and operations of the transport-backed environments.
///
/// Callers hold the whole struct behind one `tokio::sync::Mutex`, so every
/// lifecycle operation, including its transport round trips, serializes
/// against the environment's maps.
pub(crate) struct RemoteRuns<T: Transport> {
    transport: T,
    runtime_dir: String,
    state: StateFile,
}

impl<T: Transport> RemoteRuns<T> {
    /// Connect to an existing absolute runtime directory on the host,
    /// restoring any persisted run state and ensuring the asset root.
    pub(crate) async fn connect(
        transport: T,
        runtime_dir: impl Into<String>,
    ) -> Result<Self, EnvironmentError> {
        let runtime_dir = runtime_dir.into();

        if !runtime_dir.starts_with('/') {
            return Err(EnvironmentError::RuntimeDirNotAbsolute(runtime_dir));
        }

        let probe = transport
            .call(
                &["ls", &runtime_dir],
                CallOptions::default().tolerant(),
            )
            .await?;
        if !probe.success() {
            return Err(EnvironmentError::RuntimeDirMissing(runtime_dir));
        }

        let mut this = Self {
            transport,
            runtime_dir,
            state: StateFile::default(),
        };
        this.recover_state().await?;
        this.ensure_assets_dir().await?;
        Ok(this)
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn run_dir(&self, run: &RunId) -> String {
        format!("{}/{}", self.runtime_dir, run)
    }

    pub(crate) fn work_dir(&self, run: &RunId) -> String {
        format!("{}/{}/{}", self.runtime_dir, run, WORK_DIR)
    }

    fn container_dir(&self, container: &ContainerId) -> String {
        format!("{}/{}/{}", self.runtime_dir, ASSETS_DIR, container)
    }

    fn options(&self) -> CallOptions<'_> {
        CallOptions::in_dir(&self.runtime_dir)
    }

    pub(crate) fn status_of(&self, run: &RunId) -> Result<RunStatus, EnvironmentError> {
        self.state
            .status
            .get(run.as_str())
            .copied()
            .ok_or_else(|| EnvironmentError::UnknownRun(run.clone()))
    }

    pub(crate) fn handle_of(&self, run: &RunId) -> Result<i64, EnvironmentError> {
        self.state
            .pids
            .get(run.as_str())
            .copied()
            .ok_or_else(|| EnvironmentError::UnknownRun(run.clone()))
    }

    /// Run ids currently alive, for a polling sweep.
    pub(crate) fn alive_runs(&self) -> Vec<RunId> {
        self.state
            .status
            .iter()
            .filter(|(_, status)| status.is_alive())
            .map(|(id, _)| RunId::new(id.clone()))
            .collect()
    }

    pub(crate) fn record(&mut self, run: &RunId, handle: i64, status: RunStatus) {
        self.state.pids.insert(run.to_string(), handle);
        self.state.status.insert(run.to_string(), status);
    }

    pub(crate) fn update_status(&mut self, run: &RunId, status: RunStatus) {
        self.state.status.insert(run.to_string(), status);
        tracing::info!(run = %run, status = %status, "run status updated");
    }

    pub(crate) fn forget(&mut self, run: &RunId) {
        self.state.pids.remove(run.as_str());
        self.state.status.remove(run.as_str());
    }

    async fn recover_state(&mut self) -> Result<(), EnvironmentError> {
        let output = self
            .transport
            .call(&["cat", STATE_FILE], self.options().tolerant())
            .await?;

        if output.success() {
            match serde_json::from_slice::<StateFile>(&output.stdout) {
                Ok(state) => self.state = state,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable state file, starting empty");
                }
            }
        }

        Ok(())
    }

    /// Mirror the in-memory maps to `state.json` via the quoted-echo trick.
    pub(crate) async fn persist_state(&self) -> Result<(), EnvironmentError> {
        let json = serde_json::to_string(&self.state)?;
        self.transport
            .call(&["echo", &json], self.options().redirect_to(STATE_FILE))
            .await?;
        Ok(())
    }

    async fn ensure_assets_dir(&self) -> Result<(), EnvironmentError> {
        let probe = self
            .transport
            .call(&["ls", ASSETS_DIR], self.options().tolerant())
            .await?;
        if !probe.success() {
            self.transport
                .call(&["mkdir", ASSETS_DIR], self.options())
                .await?;
        }
        Ok(())
    }

    /// Write the run script for a fresh run: clears stale logs, renders one
    /// redirected line per command, and appends the exit-code trailer.
    pub(crate) async fn prepare_run(
        &mut self,
        run: &RunId,
        commands: &[Vec<String>],
    ) -> Result<(), EnvironmentError> {
        if self.state.status.contains_key(run.as_str()) {
            return Err(EnvironmentError::DuplicateRun(run.clone()));
        }
        if commands.is_empty() {
            return Err(EnvironmentError::EmptyCommands(run.clone()));
        }

        let subdir = format!("{}/{}", run, WORK_DIR);
        self.transport
            .call(&["mkdir", "-p", &subdir], self.options())
            .await?;

        let work_dir = self.work_dir(run);
        for log in [STDOUT_LOG, STDERR_LOG] {
            let stale = format!("../{}", log);
            self.transport
                .call(&["rm", &stale], CallOptions::in_dir(&work_dir).tolerant())
                .await?;
        }

        let script = run_script(commands);
        self.transport
            .call(
                &["echo", &script],
                CallOptions::in_dir(&work_dir).redirect_to(RUN_SCRIPT),
            )
            .await?;
        self.transport
            .call(
                &["echo", "echo \\$? > ../return_code"],
                CallOptions::in_dir(&work_dir).append_to(RUN_SCRIPT),
            )
            .await?;

        Ok(())
    }

    /// Read the program-level exit code the run script recorded.
    pub(crate) async fn read_return_code(&self, run: &RunId) -> Result<i32, EnvironmentError> {
        let run_dir = self.run_dir(run);
        let output = self
            .transport
            .call(&["cat", RETURN_CODE_FILE], CallOptions::in_dir(&run_dir))
            .await?;

        match output.stdout_text().trim().parse() {
            Ok(code) => Ok(code),
            Err(_) => {
                tracing::warn!(run = %run, "unparseable return code, treating as failure");
                Ok(-1)
            }
        }
    }

    pub(crate) async fn read_run_file(
        &self,
        dir: &str,
        name: &str,
    ) -> Result<Vec<u8>, EnvironmentError> {
        let output = self
            .transport
            .call(&["cat", name], CallOptions::in_dir(dir))
            .await?;
        Ok(output.stdout)
    }

    pub(crate) async fn remove_run_dir(&self, run: &RunId) -> Result<(), EnvironmentError> {
        let target = format!("./{}", run);
        self.transport
            .call(&["rm", "-rf", &target], self.options())
            .await?;
        Ok(())
    }

    pub(crate) async fn add_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError> {
        let asset_path = format!("{}/{}", self.container_dir(container), remote_path);

        // Idempotent ensure of the container root and any intermediate dirs.
        let parent = match asset_path.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => self.container_dir(container),
        };
        self.transport
            .call(&["mkdir", "-p", &parent], CallOptions::default())
            .await?;

        self.transport.upload(local_path, &asset_path).await?;
        Ok(())
    }

    pub(crate) async fn has_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<bool, EnvironmentError> {
        let asset = format!("{}/{}/{}", ASSETS_DIR, container, remote_path);
        let probe = self
            .transport
            .call(&["ls", &asset], self.options().tolerant())
            .await?;
        Ok(probe.success())
    }

    pub(crate) fn get_asset(&self, container: &ContainerId, remote_path: &str) -> String {
        format!("{}/{}", self.container_dir(container), remote_path)
    }

    pub(crate) async fn clean_assets(
        &self,
        container: &ContainerId,
    ) -> Result<(), EnvironmentError> {
        let target = format!("{}/{}", ASSETS_DIR, container);
        self.transport
            .call(&["rm", "-rf", &target], self.options())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
