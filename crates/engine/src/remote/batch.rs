// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch-scheduled (LSF) run environment

use super::{RemoteRuns, RUN_SCRIPT};
use crate::environment::{RunEnvironment, STDERR_LOG, STDOUT_LOG};
use crate::error::EnvironmentError;
use async_trait::async_trait;
use dh_core::{ContainerId, RunId, RunStatus};
use dh_transport::{CallOptions, Transport};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::sync::Mutex;

/// The job id line printed by `bsub` on successful submission.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Job <([0-9]+)>").expect("constant regex pattern is valid"));

/// The queue-level success marker in the per-job output file.
const QUEUE_SUCCESS_MARKER: &str = "Successfully completed.";

/// Run environment submitting runs to an LSF batch queue.
///
/// Shares script construction, state persistence, and asset handling with
/// [`super::ShellEnvironment`]; the run handle is the queue's job id rather
/// than a pid, and a run starts in `scheduled` until the queue dispatches
/// it. Completion is a two-signal test: the queue must report
/// `Successfully completed.` in `lsf.o<jobid>` AND the run script's own
/// `return_code` must be zero — a job can succeed at the queue level while
/// the wrapped commands failed, and rarely the reverse.
pub struct BatchEnvironment<T: Transport> {
    inner: Mutex<RemoteRuns<T>>,
    job_tag: String,
}

impl<T: Transport> BatchEnvironment<T> {
    /// Connect over `transport` to an existing absolute runtime directory.
    ///
    /// `job_tag` prefixes submitted job names as `<tag>:<run_id>`.
    pub async fn connect(
        transport: T,
        runtime_dir: impl Into<String>,
        job_tag: impl Into<String>,
    ) -> Result<Self, EnvironmentError> {
        let inner = RemoteRuns::connect(transport, runtime_dir).await?;
        Ok(Self {
            inner: Mutex::new(inner),
            job_tag: job_tag.into(),
        })
    }
}

/// Query the queue for every alive run and advance the state machine.
async fn advance<T: Transport>(runs: &mut RemoteRuns<T>) -> Result<(), EnvironmentError> {
    let mut updated = false;

    for run in runs.alive_runs() {
        let job_id = runs.handle_of(&run)?.to_string();
        let bjobs = runs
            .transport()
            .call(&["bjobs", &job_id], CallOptions::default().tolerant())
            .await?;
        let report = bjobs.stdout_text();

        let mut status = runs.status_of(&run)?;

        // Left the pending queue: the job has been dispatched.
        if status == RunStatus::Scheduled && !report.contains("PEND") {
            status = RunStatus::Started;
            runs.update_status(&run, status);
            updated = true;
        }

        // Left the queue entirely: decide finished vs failed.
        if status.is_alive() && !report.contains("PEND") && !report.contains("RUN") {
            let queue_ok = queue_reported_success(runs, &run, &job_id).await?;
            let program_ok = runs.read_return_code(&run).await? == 0;

            let status = if queue_ok && program_ok {
                RunStatus::Finished
            } else {
                RunStatus::Failed
            };
            runs.update_status(&run, status);
            updated = true;
        }
    }

    if updated {
        runs.persist_state().await?;
    }
    Ok(())
}

/// Check the per-job output file for exactly one queue success line.
async fn queue_reported_success<T: Transport>(
    runs: &RemoteRuns<T>,
    run: &RunId,
    job_id: &str,
) -> Result<bool, EnvironmentError> {
    let work_dir = runs.work_dir(run);
    let report_file = format!("lsf.o{}", job_id);
    let output = runs
        .transport()
        .call(
            &[
                "cat",
                &report_file,
                "|",
                "grep",
                QUEUE_SUCCESS_MARKER,
                "|",
                "wc",
                "-l",
            ],
            CallOptions::in_dir(&work_dir),
        )
        .await?;

    Ok(output.stdout_text().trim() == "1")
}

#[async_trait]
impl<T: Transport> RunEnvironment for BatchEnvironment<T> {
    async fn start(&self, run: &RunId, commands: Vec<Vec<String>>) -> Result<(), EnvironmentError> {
        let mut runs = self.inner.lock().await;

        runs.prepare_run(run, &commands).await?;

        let work_dir = runs.work_dir(run);
        let job_name = format!("{}:{}", self.job_tag, run);
        let output = runs
            .transport()
            .call(
                &["bsub", "-J", &job_name, "sh", RUN_SCRIPT],
                CallOptions::in_dir(&work_dir),
            )
            .await?;

        let stdout = output.stdout_text();
        let job_id: i64 = JOB_ID
            .captures(&stdout)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(EnvironmentError::JobIdUnrecovered)?;

        runs.record(run, job_id, RunStatus::Scheduled);
        runs.persist_state().await?;

        tracing::info!(run = %run, job_id, "scheduled run");
        Ok(())
    }

    async fn stop(&self, run: &RunId) -> Result<(), EnvironmentError> {
        let mut runs = self.inner.lock().await;
        advance(&mut runs).await?;

        if runs.status_of(run)?.is_alive() {
            let job_id = runs.handle_of(run)?;
            runs.transport()
                .call(&["bkill", &job_id.to_string()], CallOptions::default())
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
            let job_id = runs.handle_of(run)?;
            runs.transport()
                .call(&["bkill", &job_id.to_string()], CallOptions::default())
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
#[path = "batch_tests.rs"]
mod tests;
