// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dh-transport: remote command execution for the Deckhand run supervisor
//!
//! A [`Transport`] turns an argument vector into a single shell command line
//! (see [`quote`]) and executes it on its host, returning the exit code and
//! the drained stdout/stderr bytes. A separate file-transfer primitive
//! ([`Transport::upload`]) copies a local file onto the host.

pub mod quote;

mod loopback;
mod ssh;

pub use loopback::LoopbackTransport;
pub use ssh::SshTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, TransportCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
    #[error("command `{command}` failed (exit {code}): {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Stdout redirection for a remote command.
#[derive(Debug, Clone, Copy)]
pub struct Redirect<'a> {
    pub path: &'a str,
    pub append: bool,
}

/// Per-call options for [`Transport::call`].
///
/// `tolerate_failure` decides whether a nonzero exit is an error or an
/// inspectable result: probes that expect possible failure (liveness
/// checks, state recovery reads, log removal) set it and look at the
/// returned code themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions<'a> {
    pub cwd: Option<&'a str>,
    pub redirect: Option<Redirect<'a>>,
    pub tolerate_failure: bool,
}

impl<'a> CallOptions<'a> {
    /// Options running in the given working directory.
    pub fn in_dir(cwd: &'a str) -> Self {
        Self {
            cwd: Some(cwd),
            ..Self::default()
        }
    }

    /// Treat a nonzero exit as a result instead of an error.
    pub fn tolerant(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    /// Redirect stdout to `path`, overwriting it.
    pub fn redirect_to(mut self, path: &'a str) -> Self {
        self.redirect = Some(Redirect {
            path,
            append: false,
        });
        self
    }

    /// Redirect stdout to `path`, appending.
    pub fn append_to(mut self, path: &'a str) -> Self {
        self.redirect = Some(Redirect { path, append: true });
        self
    }
}

/// Result of a transport call: exit code plus drained output streams.
#[derive(Debug, Clone, Default)]
pub struct CallOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CallOutput {
    /// An exit-zero output carrying the given stdout text.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// An empty output with the given exit code.
    pub fn exit(code: i32) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout as lossy UTF-8.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Command execution on one host.
///
/// One instance per host; every call opens a fresh session. Any call can
/// block until the host responds.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Execute an argument vector, returning exit code and drained output.
    async fn call(
        &self,
        args: &[&str],
        opts: CallOptions<'_>,
    ) -> Result<CallOutput, TransportError>;

    /// Copy a local file to `remote` on the host. Parent directories must
    /// already exist.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError>;
}

/// Map a finished call to a result honoring the tolerate toggle.
pub(crate) fn finish_call(
    command: &str,
    output: CallOutput,
    tolerate_failure: bool,
) -> Result<CallOutput, TransportError> {
    if !tolerate_failure && !output.success() {
        return Err(TransportError::CommandFailed {
            command: command.to_string(),
            code: output.code,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}
