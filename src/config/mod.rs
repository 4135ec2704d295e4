// ============================================================================
// File: src/config/mod.rs
// ----------------------------------------------------------------------------
// Sandbox configuration: defaults, settings-file values and CLI overrides
// resolved once at startup into a single value object that every component
// receives explicitly. No ambient or global state.
// ============================================================================

pub mod env_file;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;
use crate::error::{Result, SandboxError};
use crate::target::ContainerRuntime;

/// Default paths and names for the sandbox pieces
pub mod defaults {
    /// Settings file consulted for container overrides
    pub const ENV_FILE: &str = ".env";
    /// Fixed container name; one instance at a time per host
    pub const CONTAINER_NAME: &str = "playpen_target";
    /// SSH port published on the host, kept off the privileged 22
    pub const HOST_PORT: u16 = 2222;
    /// SSH port inside the container
    pub const SSH_PORT: u16 = 22;
    /// Directory for the ephemeral key material
    pub const KEY_DIR: &str = "ssh_keys";
    /// Base name for the generated key pair
    pub const KEY_BASENAME: &str = "playpen_target";
    /// Development vault password file
    pub const VAULT_PASSWORD_FILE: &str = "vault-pw.txt";
    /// Execution log appended to by ansible-playbook
    pub const LOG_FILE: &str = "ansible.log";
    /// Third-party role content root
    pub const ROLES_DIR: &str = "roles";
    /// Role requirements manifest inside the roles root
    pub const ROLE_MANIFEST: &str = "requirements.yml";
    /// Sibling source-of-truth role directory for co-development
    pub const SIBLING_ROLE: &str = "playpen_role";
    /// Container build definition inside the working root
    pub const CONTAINERFILE: &str = "containerfile";
    /// Inventory consumed by the execution step
    pub const INVENTORY: &str = "inventory/main.yml";
    /// Playbook executed against the targets
    pub const PLAYBOOK: &str = "playbooks/sample_playbook.yml";
    /// Collections the playbook needs
    pub const COLLECTIONS: &[&str] = &["ansible.posix", "community.general"];
}

/// Resolved sandbox configuration
///
/// Built once from defaults, the settings file and CLI overrides, then
/// passed to every component. Derived paths all hang off `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Working root containing playbooks, inventory and the containerfile
    pub root: PathBuf,

    /// Explicit runtime choice; None falls back to detection order
    pub runtime_preference: Option<ContainerRuntime>,

    /// Fixed name for the isolated target container
    pub target_name: String,

    /// Image tag built from the local containerfile
    pub image_tag: String,

    /// Host port published to the target's SSH port
    pub host_port: u16,

    /// SSH port inside the target
    pub ssh_port: u16,

    /// Base name of the generated key pair
    pub key_basename: String,

    /// Collections required by the execution step
    pub required_collections: Vec<String>,

    /// Raw settings-file values, handed to the execution step's environment
    pub settings: HashMap<String, String>,
}

impl SandboxConfig {
    /// Configuration with every default, rooted at the given directory
    pub fn with_root(root: PathBuf) -> Self {
        let target_name = defaults::CONTAINER_NAME.to_string();
        Self {
            root,
            runtime_preference: None,
            image_tag: format!("{target_name}:latest"),
            target_name,
            host_port: defaults::HOST_PORT,
            ssh_port: defaults::SSH_PORT,
            key_basename: defaults::KEY_BASENAME.to_string(),
            required_collections: defaults::COLLECTIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            settings: HashMap::new(),
        }
    }

    /// Resolve the effective configuration for a run
    ///
    /// CLI overrides beat settings-file values; a disagreement is applied
    /// but warned about so the override stays explicit.
    pub fn resolve(args: &RunArgs, settings: HashMap<String, String>) -> Result<Self> {
        let root = fs::canonicalize(&args.root).unwrap_or_else(|_| args.root.clone());
        let mut config = Self::with_root(root);

        let settings_runtime = match settings.get("CONTAINER_RUNTIME") {
            Some(value) => match value.parse::<ContainerRuntime>() {
                Ok(runtime) => Some(runtime),
                Err(_) => {
                    warn!("ignoring unknown CONTAINER_RUNTIME value '{value}' from settings");
                    None
                }
            },
            None => None,
        };
        config.runtime_preference = match args.runtime {
            Some(cli_runtime) => {
                if let Some(file_runtime) = settings_runtime
                    && file_runtime != cli_runtime
                {
                    warn!(
                        "overriding CONTAINER_RUNTIME from settings ({file_runtime}) with --runtime ({cli_runtime})"
                    );
                }
                Some(cli_runtime)
            }
            None => settings_runtime,
        };

        if let Some(name) = &args.target_name {
            if let Some(file_name) = settings.get("CONTAINER_NAME")
                && file_name != name
            {
                warn!(
                    "overriding CONTAINER_NAME from settings ({file_name}) with --target-name ({name})"
                );
            }
            config.target_name = name.clone();
        } else if let Some(file_name) = settings.get("CONTAINER_NAME") {
            config.target_name = file_name.clone();
        }
        config.image_tag = format!("{}:latest", config.target_name);

        match (args.host_port, settings.get("CONTAINER_HOST_PORT")) {
            (Some(port), Some(file_port)) => {
                if file_port.parse::<u16>().ok() != Some(port) {
                    warn!(
                        "overriding CONTAINER_HOST_PORT from settings ({file_port}) with --host-port ({port})"
                    );
                }
                config.host_port = port;
            }
            (Some(port), None) => config.host_port = port,
            (None, Some(file_port)) => {
                config.host_port =
                    file_port
                        .parse::<u16>()
                        .map_err(|_| SandboxError::InvalidConfig {
                            details: format!("invalid CONTAINER_HOST_PORT value '{file_port}'"),
                        })?;
            }
            (None, None) => {}
        }

        config.settings = settings;
        Ok(config)
    }

    pub fn key_dir(&self) -> PathBuf {
        self.root.join(defaults::KEY_DIR)
    }

    pub fn private_key(&self) -> PathBuf {
        self.key_dir().join(&self.key_basename)
    }

    pub fn public_key(&self) -> PathBuf {
        self.private_key().with_extension("pub")
    }

    pub fn authorized_keys(&self) -> PathBuf {
        self.key_dir().join("authorized_keys")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.root.join(defaults::VAULT_PASSWORD_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(defaults::LOG_FILE)
    }

    pub fn roles_dir(&self) -> PathBuf {
        self.root.join(defaults::ROLES_DIR)
    }

    pub fn role_manifest(&self) -> PathBuf {
        self.roles_dir().join(defaults::ROLE_MANIFEST)
    }

    /// Sibling role checkout next to the working root, when co-developing
    pub fn sibling_role_dir(&self) -> PathBuf {
        match self.root.parent() {
            Some(parent) => parent.join(defaults::SIBLING_ROLE),
            None => PathBuf::from(defaults::SIBLING_ROLE),
        }
    }

    pub fn containerfile(&self) -> PathBuf {
        self.root.join(defaults::CONTAINERFILE)
    }

    pub fn inventory(&self) -> PathBuf {
        self.root.join(defaults::INVENTORY)
    }

    pub fn playbook(&self) -> PathBuf {
        self.root.join(defaults::PLAYBOOK)
    }
}
