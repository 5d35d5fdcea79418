// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for run environments

use dh_core::RunId;
use dh_transport::TransportError;
use thiserror::Error;

/// Errors from run environment operations.
///
/// Execution failures of the supervised commands are deliberately not here:
/// they surface as the `failed` run status, never as an error on the caller.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    // Configuration: raised at environment construction, not recoverable.
    #[error("runtime directory should be absolute: {0}")]
    RuntimeDirNotAbsolute(String),
    #[error("runtime directory does not exist: {0}")]
    RuntimeDirMissing(String),

    // Identity: the operation has no effect.
    #[error("run id exists already: {0}")]
    DuplicateRun(RunId),
    #[error("unknown run: {0}")]
    UnknownRun(RunId),
    #[error("run has no commands: {0}")]
    EmptyCommands(RunId),

    // Backend protocol.
    #[error("unable to recover process id from launch output")]
    PidUnrecovered,
    #[error("unable to recover job id from batch submission")]
    JobIdUnrecovered,

    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("state serialization error: {0}")]
    State(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
