// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::{finish_call, CallOptions, CallOutput, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded transport call
#[derive(Debug, Clone)]
pub enum TransportCall {
    Call {
        args: Vec<String>,
        cwd: Option<String>,
        redirect: Option<(String, bool)>,
        tolerate_failure: bool,
    },
    Upload {
        local: PathBuf,
        remote: String,
    },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<TransportCall>,
    responses: HashMap<String, VecDeque<CallOutput>>,
}

/// Fake transport recording calls and replaying scripted responses.
///
/// Responses are keyed by program name (the first argument) and consumed in
/// order; a program without a queued response answers with an empty
/// exit-zero output.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Queue a response for the next call to `program`.
    pub fn respond(&self, program: &str, output: CallOutput) {
        self.inner
            .lock()
            .responses
            .entry(program.to_string())
            .or_default()
            .push_back(output);
    }

    /// Queue an exit-zero response with the given stdout text.
    pub fn respond_ok(&self, program: &str, stdout: &str) {
        self.respond(program, CallOutput::ok(stdout.as_bytes().to_vec()));
    }

    /// Queue an empty response with the given exit code.
    pub fn respond_exit(&self, program: &str, code: i32) {
        self.respond(program, CallOutput::exit(code));
    }

    /// Recorded argument vectors of every call to `program`, in order.
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Call { args, .. } if args.first().map(String::as_str) == Some(program) => {
                    Some(args.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Recorded uploads as `(local, remote)` pairs.
    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Upload { local, remote } => Some((local.clone(), remote.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn call(
        &self,
        args: &[&str],
        opts: CallOptions<'_>,
    ) -> Result<CallOutput, TransportError> {
        let mut inner = self.inner.lock();

        inner.calls.push(TransportCall::Call {
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: opts.cwd.map(str::to_string),
            redirect: opts.redirect.map(|r| (r.path.to_string(), r.append)),
            tolerate_failure: opts.tolerate_failure,
        });

        let response = args
            .first()
            .and_then(|program| inner.responses.get_mut(*program))
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        let command = args.join(" ");
        drop(inner);

        finish_call(&command, response, opts.tolerate_failure)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.inner.lock().calls.push(TransportCall::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
