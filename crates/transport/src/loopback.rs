// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback transport running the assembled command line on the local host

use crate::{finish_call, quote, CallOptions, CallOutput, Transport, TransportError};
use async_trait::async_trait;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Transport that executes command lines through `sh -c` on the local host.
///
/// Behaves like a remote shell whose host happens to be this machine, which
/// makes it the natural substrate for the remote backends in tests and for
/// supervising detached runs on the local host. Uploads degrade to a
/// filesystem copy.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport;

impl LoopbackTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn call(
        &self,
        args: &[&str],
        opts: CallOptions<'_>,
    ) -> Result<CallOutput, TransportError> {
        let line = quote::assemble(args, opts.cwd, opts.redirect);
        tracing::debug!(command = %line, "loopback call");

        let launch_err = |source: std::io::Error| TransportError::Launch {
            command: line.clone(),
            source,
        };

        // Capture through anonymous files rather than pipes: a command line
        // ending in `& echo $!` leaves a background child holding the write
        // end, and a pipe read would block on it until the whole run
        // finished. Waiting on the exit status alone returns as soon as the
        // foreground shell is done.
        let mut stdout_file = tempfile::tempfile().map_err(launch_err)?;
        let mut stderr_file = tempfile::tempfile().map_err(launch_err)?;

        let status = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone().map_err(launch_err)?))
            .stderr(Stdio::from(stderr_file.try_clone().map_err(launch_err)?))
            .status()
            .await
            .map_err(launch_err)?;

        let mut stdout = Vec::new();
        stdout_file.seek(SeekFrom::Start(0)).map_err(launch_err)?;
        stdout_file.read_to_end(&mut stdout).map_err(launch_err)?;

        let mut stderr = Vec::new();
        stderr_file.seek(SeekFrom::Start(0)).map_err(launch_err)?;
        stderr_file.read_to_end(&mut stderr).map_err(launch_err)?;

        finish_call(
            &line,
            CallOutput {
                code: status.code().unwrap_or(-1),
                stdout,
                stderr,
            },
            opts.tolerate_failure,
        )
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        tokio::fs::copy(local, remote).await.map_err(|e| {
            TransportError::Upload(format!("copy {} -> {}: {}", local.display(), remote, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "loopback_tests.rs"]
mod tests;
