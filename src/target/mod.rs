// ============================================================================
// File: src/target/mod.rs
// ----------------------------------------------------------------------------
// Lifecycle management for the isolated target container.
//
// One fixed-name instance at a time: start replaces any prior instance
// under the same name, stop tolerates absence, and presence is established
// through a typed inspect query rather than text matching.
// ============================================================================

mod guard;
mod runtime;

pub use guard::TargetGuard;
pub use runtime::ContainerRuntime;

use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{Result, SandboxError};
use crate::runner::{CommandRunner, CommandSpec};

/// Lifecycle states for the isolated target
///
/// Only `Running` is valid while the playbook executes; everything else is
/// transient within a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Absent,
    Building,
    Built,
    Starting,
    Running,
    Stopping,
}

/// `State` block of `container inspect` output (podman and docker agree
/// on these fields)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectState {
    pub status: String,
    pub running: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    state: InspectState,
}

/// Drives the isolated target through its lifecycle
pub struct TargetManager<'a> {
    runtime: ContainerRuntime,
    runner: &'a dyn CommandRunner,
    name: String,
    state: TargetState,
}

impl<'a> TargetManager<'a> {
    pub fn new(
        runtime: ContainerRuntime,
        runner: &'a dyn CommandRunner,
        name: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            runner,
            name: name.into(),
            state: TargetState::Absent,
        }
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Build the target image from the local build definition
    ///
    /// Synchronous and fatal on failure; builds are deterministic given
    /// fixed inputs, so there are no retries.
    pub fn build_image(&mut self, containerfile: &Path, tag: &str, context: &Path) -> Result<()> {
        info!("building image {tag} from {}", containerfile.display());
        self.state = TargetState::Building;

        let spec = CommandSpec::new(self.runtime.command())
            .arg("build")
            .arg("--file")
            .arg(containerfile.display().to_string())
            .arg("--tag")
            .arg(tag)
            .arg(context.display().to_string());
        let out = self.runner.run(&spec).map_err(|e| self.resource_err(e))?;

        if !out.success() {
            self.state = TargetState::Absent;
            return Err(SandboxError::Resource {
                name: self.name.clone(),
                details: format!("image build exited with status {}", out.code),
                code: out.code,
            });
        }

        self.state = TargetState::Built;
        Ok(())
    }

    /// Query the runtime for the container's state
    ///
    /// Absence is a result, not an error: inspect exiting non-zero means no
    /// container under this name.
    pub fn inspect(&self) -> Result<Option<InspectState>> {
        let spec = CommandSpec::new(self.runtime.command())
            .args(["container", "inspect"])
            .arg(&self.name)
            .capture();
        let out = self.runner.run(&spec).map_err(|e| self.resource_err(e))?;

        if !out.success() {
            return Ok(None);
        }

        let entries: Vec<InspectEntry> =
            serde_json::from_str(&out.stdout).map_err(|e| SandboxError::Resource {
                name: self.name.clone(),
                details: format!("could not parse inspect output: {e}"),
                code: crate::error::exit_codes::FAILURE,
            })?;
        Ok(entries.into_iter().next().map(|entry| entry.state))
    }

    /// Start the target, replacing any prior instance under the same name
    ///
    /// The instance runs detached and auto-removing, publishing the host
    /// port onto the container's SSH port with the key directory bound
    /// read-only at /root/.ssh.
    pub fn start(
        &mut self,
        tag: &str,
        host_port: u16,
        container_port: u16,
        key_dir: &Path,
    ) -> Result<()> {
        self.stop()?;

        info!("starting target '{}' on port {host_port}", self.name);
        self.state = TargetState::Starting;

        let volume = format!(
            "{}:/root/.ssh{}",
            key_dir.display(),
            self.runtime.readonly_volume_suffix()
        );
        let spec = CommandSpec::new(self.runtime.command())
            .arg("run")
            .arg("--detach")
            .args(["--hostname", self.name.as_str()])
            .args(["--name", self.name.as_str()])
            .arg("--publish")
            .arg(format!("{host_port}:{container_port}"))
            .arg("--rm")
            .arg("--volume")
            .arg(volume)
            .arg(tag)
            .capture();
        let out = self.runner.run(&spec).map_err(|e| self.resource_err(e))?;

        if !out.success() {
            self.state = TargetState::Absent;
            return Err(SandboxError::Resource {
                name: self.name.clone(),
                details: format!(
                    "container start exited with status {}: {}",
                    out.code,
                    out.stderr.trim()
                ),
                code: out.code,
            });
        }

        self.state = TargetState::Running;
        info!("target '{}' running", self.name);
        Ok(())
    }

    /// Stop the target; stopping an absent target is success
    pub fn stop(&mut self) -> Result<()> {
        match self.inspect()? {
            None => {
                debug!("target '{}' not present; nothing to stop", self.name);
                self.state = TargetState::Absent;
                Ok(())
            }
            Some(state) => {
                debug!(
                    "stopping target '{}' (currently {})",
                    self.name, state.status
                );
                self.state = TargetState::Stopping;

                let spec = CommandSpec::new(self.runtime.command())
                    .args(["container", "stop"])
                    .arg(&self.name)
                    .capture();
                let out = self.runner.run(&spec).map_err(|e| self.resource_err(e))?;

                if !out.success() {
                    return Err(SandboxError::Resource {
                        name: self.name.clone(),
                        details: format!(
                            "container stop exited with status {}: {}",
                            out.code,
                            out.stderr.trim()
                        ),
                        code: out.code,
                    });
                }

                self.state = TargetState::Absent;
                info!("target '{}' stopped", self.name);
                Ok(())
            }
        }
    }

    fn resource_err(&self, source: std::io::Error) -> SandboxError {
        SandboxError::Resource {
            name: self.name.clone(),
            details: format!("failed to invoke {}: {source}", self.runtime.command()),
            code: crate::error::exit_codes::FAILURE,
        }
    }
}
