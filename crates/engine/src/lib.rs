// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dh-engine: backend-abstracted run lifecycle for the Deckhand supervisor
//!
//! One [`RunEnvironment`] contract, three realizations: a local host
//! ([`LocalEnvironment`]), a detached remote shell ([`ShellEnvironment`]),
//! and a batch-scheduled cluster ([`BatchEnvironment`]). The [`Registry`]
//! is the process-wide map a control plane registers environments and
//! simulation records into.

pub mod environment;
pub mod error;
pub mod local;
pub mod registry;
pub mod remote;

pub use environment::{RunEnvironment, ASSETS_DIR, STDERR_LOG, STDOUT_LOG, WORK_DIR};
pub use error::EnvironmentError;
pub use local::LocalEnvironment;
pub use registry::{EnvironmentKind, EnvironmentSpec, Registry, RegistryError};
pub use remote::{BatchEnvironment, ShellEnvironment};
