// ============================================================================
// File: src/error.rs
// ----------------------------------------------------------------------------
// Error taxonomy for sandbox orchestration
// ============================================================================

use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while provisioning or driving the sandbox
///
/// Every variant is fatal to the run; there is no retry logic anywhere.
/// Recovery is limited to idempotent skips inside the individual steps.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// A local setup step failed (key material, secrets file, log reset)
    #[error("setup failed: {details}")]
    Setup { details: String },

    /// No usable container runtime on this host
    #[error("no container runtime available: {reason}")]
    RuntimeUnavailable { reason: String },

    /// A required external tool is not installed
    #[error("required command '{command}' not found in PATH")]
    MissingDependency { command: String },

    /// A configuration value could not be used
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    /// Image build or container start failed; carries the runtime's exit
    /// status so it can propagate verbatim
    #[error("target '{name}' failed: {details}")]
    Resource {
        name: String,
        details: String,
        code: i32,
    },

    /// Role or collection provisioning failed; carries the tool's exit
    /// status so it can propagate verbatim
    #[error("dependency provisioning failed: {details}")]
    Dependency { details: String, code: i32 },

    /// The playbook run itself exited non-zero
    #[error("playbook exited with status {code}")]
    Execution { code: i32 },

    /// Filesystem operation failed
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SandboxError {
    pub fn setup<D: Into<String>>(details: D) -> Self {
        Self::Setup {
            details: details.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit status for this failure
    ///
    /// Whichever step failed first hands its own status through verbatim:
    /// build, start, fetch and playbook codes are not collapsed into a
    /// generic failure code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Execution { code }
            | Self::Resource { code, .. }
            | Self::Dependency { code, .. } => *code,
            Self::MissingDependency { .. } | Self::InvalidConfig { .. } => {
                exit_codes::MISSING_DEPENDENCY
            }
            Self::RuntimeUnavailable { .. } => exit_codes::NO_RUNTIME,
            _ => exit_codes::FAILURE,
        }
    }
}

/// Result type for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Process exit codes for the different failure scenarios
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const MISSING_DEPENDENCY: i32 = 2;
    pub const NO_RUNTIME: i32 = 4;
    pub const INTERRUPTED: i32 = 130;
}
