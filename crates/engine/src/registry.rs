// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry of environments and simulation records
//!
//! The surface a control plane consumes: environments register under
//! caller-chosen ids from a typed `{type, …}` config, simulation records
//! are opaque payloads keyed by caller-unique ids. Explicitly constructed
//! and torn down, never ambient state.

use crate::environment::RunEnvironment;
use crate::error::EnvironmentError;
use crate::local::LocalEnvironment;
use crate::remote::{BatchEnvironment, ShellEnvironment};
use dh_core::EnvironmentId;
use dh_transport::SshTransport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("environment id exists already: {0}")]
    DuplicateEnvironment(EnvironmentId),
    #[error("unknown environment: {0}")]
    UnknownEnvironment(EnvironmentId),
    #[error("simulation id exists already: {0}")]
    DuplicateSimulation(String),
    #[error("unknown simulation: {0}")]
    UnknownSimulation(String),
    #[error("invalid environment config: {0}")]
    InvalidSpec(String),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// The execution substrate behind an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Local,
    Ssh,
    Lsf,
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentKind::Local => write!(f, "local"),
            EnvironmentKind::Ssh => write!(f, "ssh"),
            EnvironmentKind::Lsf => write!(f, "lsf"),
        }
    }
}

/// Typed environment registration config.
///
/// Mirrors the control plane's `{type: local|ssh|lsf, path, …}` payload;
/// an unknown `type` is rejected at parse time with a readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvironmentSpec {
    Local {
        path: PathBuf,
    },
    Ssh {
        host: String,
        path: String,
    },
    Lsf {
        host: String,
        path: String,
        /// Job name prefix for queue submissions; defaults to the
        /// environment id at registration.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_tag: Option<String>,
    },
}

impl EnvironmentSpec {
    /// Parse a registration payload, surfacing a human-readable error for
    /// unknown types or missing fields.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RegistryError> {
        serde_json::from_value(value).map_err(|e| RegistryError::InvalidSpec(e.to_string()))
    }

    pub fn kind(&self) -> EnvironmentKind {
        match self {
            EnvironmentSpec::Local { .. } => EnvironmentKind::Local,
            EnvironmentSpec::Ssh { .. } => EnvironmentKind::Ssh,
            EnvironmentSpec::Lsf { .. } => EnvironmentKind::Lsf,
        }
    }
}

struct EnvironmentEntry {
    name: String,
    kind: EnvironmentKind,
    environment: Box<dyn RunEnvironment>,
}

/// Registry owned by one supervisor process.
pub struct Registry {
    environments: HashMap<EnvironmentId, EnvironmentEntry>,
    simulations: HashMap<String, serde_json::Value>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            environments: HashMap::new(),
            simulations: HashMap::new(),
        }
    }

    /// Construct and register an environment under `id`.
    ///
    /// Remote kinds open their transport and verify the runtime directory
    /// before the registration is recorded; a failed construction leaves
    /// the registry untouched.
    pub async fn register_environment(
        &mut self,
        id: &EnvironmentId,
        name: &str,
        spec: EnvironmentSpec,
    ) -> Result<(), RegistryError> {
        if self.environments.contains_key(id.as_str()) {
            return Err(RegistryError::DuplicateEnvironment(id.clone()));
        }

        let kind = spec.kind();
        let environment: Box<dyn RunEnvironment> = match spec {
            EnvironmentSpec::Local { path } => Box::new(LocalEnvironment::new(path)?),
            EnvironmentSpec::Ssh { host, path } => {
                Box::new(ShellEnvironment::connect(SshTransport::new(host), path).await?)
            }
            EnvironmentSpec::Lsf { host, path, job_tag } => {
                let tag = job_tag.unwrap_or_else(|| id.to_string());
                Box::new(BatchEnvironment::connect(SshTransport::new(host), path, tag).await?)
            }
        };

        self.environments.insert(
            id.clone(),
            EnvironmentEntry {
                name: name.to_string(),
                kind,
                environment,
            },
        );

        tracing::info!(environment = %id, %kind, "registered environment");
        Ok(())
    }

    /// Look up a registered environment.
    pub fn environment(&self, id: &EnvironmentId) -> Result<&dyn RunEnvironment, RegistryError> {
        self.environments
            .get(id.as_str())
            .map(|entry| entry.environment.as_ref())
            .ok_or_else(|| RegistryError::UnknownEnvironment(id.clone()))
    }

    /// Remove a registered environment, dropping its transport.
    pub fn deregister_environment(&mut self, id: &EnvironmentId) -> Result<(), RegistryError> {
        self.environments
            .remove(id.as_str())
            .ok_or_else(|| RegistryError::UnknownEnvironment(id.clone()))?;
        tracing::info!(environment = %id, "deregistered environment");
        Ok(())
    }

    /// Registered environments as `(id, name, kind)`.
    pub fn list_environments(&self) -> Vec<(EnvironmentId, String, EnvironmentKind)> {
        self.environments
            .iter()
            .map(|(id, entry)| (id.clone(), entry.name.clone(), entry.kind))
            .collect()
    }

    /// Record a simulation payload under a caller-unique id.
    pub fn register_simulation(
        &mut self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<(), RegistryError> {
        if self.simulations.contains_key(id) {
            return Err(RegistryError::DuplicateSimulation(id.to_string()));
        }
        self.simulations.insert(id.to_string(), payload);
        Ok(())
    }

    pub fn simulation(&self, id: &str) -> Result<&serde_json::Value, RegistryError> {
        self.simulations
            .get(id)
            .ok_or_else(|| RegistryError::UnknownSimulation(id.to_string()))
    }

    pub fn deregister_simulation(&mut self, id: &str) -> Result<(), RegistryError> {
        self.simulations
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownSimulation(id.to_string()))?;
        Ok(())
    }

    pub fn list_simulations(&self) -> Vec<(String, serde_json::Value)> {
        self.simulations
            .iter()
            .map(|(id, payload)| (id.clone(), payload.clone()))
            .collect()
    }

    /// Drop every registered environment and simulation record.
    pub fn shutdown(&mut self) {
        self.environments.clear();
        self.simulations.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
