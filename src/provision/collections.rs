// ============================================================================
// File: src/provision/collections.rs
// ----------------------------------------------------------------------------
// Ansible collection installation.
//
// The installed set is queried once, as structured JSON rather than text
// matching. A failed query degrades to "nothing installed" and lets the
// install attempts decide; a failed install is fatal.
// ============================================================================

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{Result, SandboxError};
use crate::runner::{CommandRunner, CommandSpec};

/// Install every required collection that is not already present
pub fn ensure_collections(required: &[String], runner: &dyn CommandRunner) -> Result<()> {
    if required.is_empty() {
        return Ok(());
    }

    let installed = installed_collections(runner);
    for name in required {
        if installed.contains(name.as_str()) {
            debug!("collection {name} already installed");
            continue;
        }

        info!("installing collection {name}");
        let spec = CommandSpec::new("ansible-galaxy")
            .args(["collection", "install"])
            .arg(name);
        let out = runner.run(&spec).map_err(|e| SandboxError::Dependency {
            details: format!("failed to invoke ansible-galaxy: {e}"),
            code: crate::error::exit_codes::FAILURE,
        })?;
        if !out.success() {
            return Err(SandboxError::Dependency {
                details: format!(
                    "install of collection {name} exited with status {}",
                    out.code
                ),
                code: out.code,
            });
        }
    }

    Ok(())
}

/// One structured query for the installed collection set
///
/// The listing maps collection paths to name/version tables. Any query or
/// parse failure degrades to an empty set; the subsequent installs will
/// fail loudly if the toolchain is actually broken.
fn installed_collections(runner: &dyn CommandRunner) -> HashSet<String> {
    let spec = CommandSpec::new("ansible-galaxy")
        .args(["collection", "list", "--format", "json"])
        .capture();

    let out = match runner.run(&spec) {
        Ok(out) if out.success() => out,
        Ok(out) => {
            warn!(
                "collection listing exited with status {}; assuming none installed",
                out.code
            );
            return HashSet::new();
        }
        Err(err) => {
            warn!("could not query installed collections ({err}); assuming none installed");
            return HashSet::new();
        }
    };

    match serde_json::from_str::<HashMap<String, HashMap<String, Value>>>(&out.stdout) {
        Ok(listing) => listing
            .into_values()
            .flat_map(|names| names.into_keys())
            .collect(),
        Err(err) => {
            warn!("could not parse collection listing ({err}); assuming none installed");
            HashSet::new()
        }
    }
}
