// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-host run environment

use crate::environment::{RunEnvironment, ASSETS_DIR, STDERR_LOG, STDOUT_LOG, WORK_DIR};
use crate::error::EnvironmentError;
use async_trait::async_trait;
use dh_core::{ContainerId, RunId, RunStatus};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

struct LocalRun {
    status: RunStatus,
    /// Remaining commands; drains as earlier ones finish. Non-empty exactly
    /// while the run is alive and more work is queued.
    queue: VecDeque<Vec<String>>,
    /// Live child while the run is alive; kept after exit until `clean`.
    child: Option<Child>,
}

/// Run environment spawning processes directly on this host.
///
/// Each run gets `<runtime>/<run_id>/` holding `stdout.log`, `stderr.log`,
/// and a `run/` working directory. Exactly one command per run is live at
/// any moment; the next command spawns only after the previous one exits
/// zero. Logs open in append mode so successive commands accumulate.
pub struct LocalEnvironment {
    runtime_dir: PathBuf,
    runs: Mutex<HashMap<RunId, LocalRun>>,
}

impl LocalEnvironment {
    /// Create an environment over an existing absolute runtime directory.
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Result<Self, EnvironmentError> {
        let runtime_dir = runtime_dir.into();

        if !runtime_dir.is_absolute() {
            return Err(EnvironmentError::RuntimeDirNotAbsolute(
                runtime_dir.display().to_string(),
            ));
        }
        if !runtime_dir.is_dir() {
            return Err(EnvironmentError::RuntimeDirMissing(
                runtime_dir.display().to_string(),
            ));
        }

        std::fs::create_dir_all(runtime_dir.join(ASSETS_DIR))?;

        Ok(Self {
            runtime_dir,
            runs: Mutex::new(HashMap::new()),
        })
    }

    fn run_path(&self, run: &RunId) -> PathBuf {
        self.runtime_dir.join(run.as_str())
    }

    fn container_path(&self, container: &ContainerId) -> PathBuf {
        self.runtime_dir.join(ASSETS_DIR).join(container.as_str())
    }

    fn asset_path(&self, container: &ContainerId, remote_path: &str) -> PathBuf {
        self.container_path(container).join(remote_path)
    }

    /// Spawn the next queued command, appending to the run's log files.
    ///
    /// A spawn failure is the observable equivalent of an immediate nonzero
    /// exit: the run goes straight to `failed` and the queue is dropped.
    fn spawn_next(&self, run: &RunId, record: &mut LocalRun) {
        let Some(args) = record.queue.pop_front() else {
            record.status = RunStatus::Finished;
            return;
        };

        match self.try_spawn(run, &args) {
            Ok(child) => record.child = Some(child),
            Err(e) => {
                tracing::warn!(run = %run, error = %e, "command spawn failed");
                record.status = RunStatus::Failed;
                record.queue.clear();
            }
        }
    }

    fn try_spawn(&self, run: &RunId, args: &[String]) -> std::io::Result<Child> {
        let run_path = self.run_path(run);

        let stdout = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_path.join(STDOUT_LOG))?;
        let stderr = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_path.join(STDERR_LOG))?;

        let (program, rest) = args
            .split_first()
            .ok_or_else(|| std::io::Error::other("empty command"))?;

        Command::new(program)
            .args(rest)
            .current_dir(run_path.join(WORK_DIR))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
    }

    /// Poll every alive run's child and advance the state machine.
    fn advance(&self) {
        let mut runs = self.runs.lock();

        for (run, record) in runs.iter_mut() {
            if !record.status.is_alive() {
                continue;
            }
            let Some(child) = record.child.as_mut() else {
                continue;
            };

            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(exit)) => {
                    if exit.success() {
                        if record.queue.is_empty() {
                            record.status = RunStatus::Finished;
                            tracing::info!(run = %run, status = %record.status, "run status updated");
                        } else {
                            self.spawn_next(run, record);
                        }
                    } else {
                        record.status = RunStatus::Failed;
                        record.queue.clear();
                        tracing::info!(
                            run = %run,
                            status = %record.status,
                            code = exit.code().unwrap_or(-1),
                            "run status updated"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(run = %run, error = %e, "child poll failed");
                    record.status = RunStatus::Failed;
                    record.queue.clear();
                }
            }
        }
    }
}

/// Request graceful termination of a child.
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[async_trait]
impl RunEnvironment for LocalEnvironment {
    async fn start(&self, run: &RunId, commands: Vec<Vec<String>>) -> Result<(), EnvironmentError> {
        if commands.is_empty() {
            return Err(EnvironmentError::EmptyCommands(run.clone()));
        }

        let mut runs = self.runs.lock();
        if runs.contains_key(run.as_str()) {
            return Err(EnvironmentError::DuplicateRun(run.clone()));
        }

        std::fs::create_dir_all(self.run_path(run).join(WORK_DIR))?;

        let mut record = LocalRun {
            status: RunStatus::Started,
            queue: commands.into(),
            child: None,
        };
        self.spawn_next(run, &mut record);
        runs.insert(run.clone(), record);

        tracing::info!(run = %run, "started run");
        Ok(())
    }

    async fn stop(&self, run: &RunId) -> Result<(), EnvironmentError> {
        self.advance();

        let mut runs = self.runs.lock();
        let record = runs
            .get_mut(run.as_str())
            .ok_or_else(|| EnvironmentError::UnknownRun(run.clone()))?;

        if record.status.is_alive() {
            if let Some(child) = record.child.as_ref() {
                terminate(child);
            }
            record.status = RunStatus::Stopped;
            record.queue.clear();
            tracing::info!(run = %run, "stopped run");
        }

        Ok(())
    }

    async fn clean(&self, run: &RunId) -> Result<(), EnvironmentError> {
        self.advance();

        {
            let mut runs = self.runs.lock();
            let record = runs
                .get_mut(run.as_str())
                .ok_or_else(|| EnvironmentError::UnknownRun(run.clone()))?;

            if record.status.is_alive() {
                if let Some(child) = record.child.as_ref() {
                    terminate(child);
                }
                record.status = RunStatus::Stopped;
                record.queue.clear();
            }
        }

        tokio::fs::remove_dir_all(self.run_path(run)).await?;
        self.runs.lock().remove(run.as_str());

        tracing::info!(run = %run, "cleaned run");
        Ok(())
    }

    async fn get_status(&self, run: &RunId) -> Result<RunStatus, EnvironmentError> {
        self.advance();

        self.runs
            .lock()
            .get(run.as_str())
            .map(|record| record.status)
            .ok_or_else(|| EnvironmentError::UnknownRun(run.clone()))
    }

    async fn get_stdout(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError> {
        if !self.runs.lock().contains_key(run.as_str()) {
            return Err(EnvironmentError::UnknownRun(run.clone()));
        }
        Ok(tokio::fs::read(self.run_path(run).join(STDOUT_LOG)).await?)
    }

    async fn get_stderr(&self, run: &RunId) -> Result<Vec<u8>, EnvironmentError> {
        if !self.runs.lock().contains_key(run.as_str()) {
            return Err(EnvironmentError::UnknownRun(run.clone()));
        }
        Ok(tokio::fs::read(self.run_path(run).join(STDERR_LOG)).await?)
    }

    async fn get_file(&self, run: &RunId, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        if !self.runs.lock().contains_key(run.as_str()) {
            return Err(EnvironmentError::UnknownRun(run.clone()));
        }
        Ok(tokio::fs::read(self.run_path(run).join(WORK_DIR).join(path)).await?)
    }

    async fn add_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError> {
        let asset = self.asset_path(container, remote_path);
        if let Some(parent) = asset.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &asset).await?;
        Ok(())
    }

    async fn has_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<bool, EnvironmentError> {
        Ok(self.asset_path(container, remote_path).exists())
    }

    async fn get_asset(
        &self,
        container: &ContainerId,
        remote_path: &str,
    ) -> Result<String, EnvironmentError> {
        Ok(self.asset_path(container, remote_path).display().to_string())
    }

    async fn clean_assets(&self, container: &ContainerId) -> Result<(), EnvironmentError> {
        let container_path = self.container_path(container);
        if container_path.exists() {
            tokio::fs::remove_dir_all(container_path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
