// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH transport using the system `ssh` and `scp` clients

use crate::{finish_call, quote, CallOptions, CallOutput, Transport, TransportError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Transport executing commands on a remote host over SSH.
///
/// Each call opens a fresh session by invoking the system `ssh` client with
/// a single assembled command line; uploads go through `scp`. Key-based
/// authentication must already be configured — there is no interactive
/// prompt handling, so `BatchMode` is forced to fail fast instead of
/// hanging on a password prompt.
#[derive(Debug, Clone)]
pub struct SshTransport {
    destination: String,
    options: Vec<String>,
}

impl SshTransport {
    /// Create a transport for `destination` (`host` or `user@host`).
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            options: Vec::new(),
        }
    }

    /// Create a transport with extra `-o` style client options, passed to
    /// both `ssh` and `scp`.
    pub fn with_options(destination: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            destination: destination.into(),
            options,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn ssh_argv(&self, line: &str) -> Vec<String> {
        let mut argv = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        argv.extend(self.options.iter().cloned());
        argv.push(self.destination.clone());
        argv.push(line.to_string());
        argv
    }

    fn scp_argv(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut argv = vec!["-o".to_string(), "BatchMode=yes".to_string(), "-q".to_string()];
        argv.extend(self.options.iter().cloned());
        argv.push(local.display().to_string());
        argv.push(format!("{}:{}", self.destination, remote));
        argv
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn call(
        &self,
        args: &[&str],
        opts: CallOptions<'_>,
    ) -> Result<CallOutput, TransportError> {
        let line = quote::assemble(args, opts.cwd, opts.redirect);
        tracing::debug!(host = %self.destination, command = %line, "ssh call");

        let output = Command::new("ssh")
            .args(self.ssh_argv(&line))
            .output()
            .await
            .map_err(|source| TransportError::Launch {
                command: line.clone(),
                source,
            })?;

        finish_call(
            &line,
            CallOutput {
                code: output.status.code().unwrap_or(-1),
                stdout: output.stdout,
                stderr: output.stderr,
            },
            opts.tolerate_failure,
        )
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        tracing::debug!(host = %self.destination, local = %local.display(), remote, "scp upload");

        let output = Command::new("scp")
            .args(self.scp_argv(local, remote))
            .output()
            .await
            .map_err(|e| TransportError::Upload(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Upload(format!(
                "scp {} -> {}:{}: {}",
                local.display(),
                self.destination,
                remote,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
