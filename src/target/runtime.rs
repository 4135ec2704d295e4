// ============================================================================
// File: src/target/runtime.rs
// ----------------------------------------------------------------------------
// Container runtime selection
// ============================================================================

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};
use crate::runner::{CommandRunner, command_available};

/// Supported container runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Preferred on SELinux hosts
    Podman,
    Docker,
}

impl ContainerRuntime {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    /// Read-only volume suffix; podman needs SELinux relabeling
    pub fn readonly_volume_suffix(&self) -> &'static str {
        match self {
            Self::Podman => ":ro,z",
            Self::Docker => ":ro",
        }
    }

    /// Detect a usable runtime, explicit preference first, then podman,
    /// then docker
    pub fn detect(runner: &dyn CommandRunner, preference: Option<Self>) -> Result<Self> {
        let mut order = Vec::new();
        if let Some(preferred) = preference {
            order.push(preferred);
        }
        for fallback in [Self::Podman, Self::Docker] {
            if !order.contains(&fallback) {
                order.push(fallback);
            }
        }

        for candidate in order {
            if command_available(runner, candidate.command()) {
                info!("using container runtime: {candidate}");
                return Ok(candidate);
            }
            debug!("container runtime {candidate} not found");
        }

        Err(SandboxError::RuntimeUnavailable {
            reason: "neither podman nor docker found in PATH".to_string(),
        })
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for ContainerRuntime {
    type Err = SandboxError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            other => Err(SandboxError::InvalidConfig {
                details: format!("unknown container runtime '{other}'"),
            }),
        }
    }
}
