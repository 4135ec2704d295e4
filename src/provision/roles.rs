// ============================================================================
// File: src/provision/roles.rs
// ----------------------------------------------------------------------------
// Third-party role content resolution.
//
// Anything already present under the roles root counts as satisfied; the
// resolver never re-validates against the manifest. When empty, a sibling
// source-of-truth checkout is symlinked in preference to a network fetch,
// so role and sandbox can be co-developed without pushing.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::runner::{CommandRunner, CommandSpec};

/// Make sure role content is available under the roles root
pub fn ensure_roles(config: &SandboxConfig, runner: &dyn CommandRunner) -> Result<()> {
    let roles_dir = config.roles_dir();
    if !roles_dir.exists() {
        info!("roles directory not present; skipping role setup");
        return Ok(());
    }

    let present = role_entries(&roles_dir)?;
    if !present.is_empty() {
        info!("roles already present ({} found); skipping install", present.len());
        debug!("existing roles: {present:?}");
        return Ok(());
    }

    let manifest = config.role_manifest();
    if !manifest.exists() {
        info!(
            "no roles found and {} missing; skipping role install",
            manifest.display()
        );
        return Ok(());
    }

    let sibling = config.sibling_role_dir();
    if sibling.exists() {
        return link_sibling_role(&roles_dir, &sibling);
    }

    info!("installing roles from {}", manifest.display());
    let spec = CommandSpec::new("ansible-galaxy")
        .args(["install", "--role-file"])
        .arg(manifest.display().to_string())
        .arg("--roles-path")
        .arg(roles_dir.display().to_string());
    let out = runner.run(&spec).map_err(|e| SandboxError::Dependency {
        details: format!("failed to invoke ansible-galaxy: {e}"),
        code: crate::error::exit_codes::FAILURE,
    })?;
    if !out.success() {
        return Err(SandboxError::Dependency {
            details: format!("role install exited with status {}", out.code),
            code: out.code,
        });
    }

    info!("role installation complete");
    Ok(())
}

/// Top-level directories and symlinks under the roles root. Plain files
/// (the manifest itself) do not count as content.
fn role_entries(roles_dir: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    let listing = fs::read_dir(roles_dir).map_err(|e| SandboxError::io(roles_dir, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| SandboxError::io(roles_dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| SandboxError::io(&entry.path(), e))?;
        if file_type.is_dir() || file_type.is_symlink() {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(entries)
}

/// Link the sibling checkout into the roles root with a relative target,
/// replacing any leftover link
fn link_sibling_role(roles_dir: &Path, sibling: &Path) -> Result<()> {
    let link_name = sibling
        .file_name()
        .ok_or_else(|| SandboxError::setup(format!("bad sibling path {}", sibling.display())))?;
    let link_path = roles_dir.join(link_name);

    if fs::symlink_metadata(&link_path).is_ok() {
        debug!("removing existing link at {}", link_path.display());
        fs::remove_file(&link_path).map_err(|e| SandboxError::io(&link_path, e))?;
    }

    // the link lives one level under the working root, so the sibling is
    // two levels up from the link's directory
    let relative_target = PathBuf::from("../..").join(link_name);

    #[cfg(unix)]
    std::os::unix::fs::symlink(&relative_target, &link_path)
        .map_err(|e| SandboxError::io(&link_path, e))?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_dir(&relative_target, &link_path)
        .map_err(|e| SandboxError::io(&link_path, e))?;

    info!(
        "linked sibling role: {} -> {}",
        link_path.display(),
        relative_target.display()
    );
    Ok(())
}
