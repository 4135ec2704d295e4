// ============================================================================
// File: src/target/guard.rs
// ----------------------------------------------------------------------------
// Deferred finalizer for the running target.
//
// Registered before any acquisition call and fired at most once, whether
// the run completes, aborts mid-sequence, or is interrupted. Teardown
// failures are warned about, never raised.
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::runner::CommandRunner;

use super::{ContainerRuntime, TargetManager};

struct Teardown {
    runner: Arc<dyn CommandRunner>,
    runtime: ContainerRuntime,
    name: String,
}

/// Guaranteed-teardown handle for the isolated target
pub struct TargetGuard {
    teardown: Option<Teardown>,
    fired: AtomicBool,
}

impl TargetGuard {
    /// Guard that will stop the named target when fired
    pub fn armed(
        runner: Arc<dyn CommandRunner>,
        runtime: ContainerRuntime,
        name: impl Into<String>,
    ) -> Self {
        Self {
            teardown: Some(Teardown {
                runner,
                runtime,
                name: name.into(),
            }),
            fired: AtomicBool::new(false),
        }
    }

    /// Guard for runs that never acquire the target
    pub fn disarmed() -> Self {
        Self {
            teardown: None,
            fired: AtomicBool::new(false),
        }
    }

    /// Run the teardown action; every call after the first is a no-op
    pub fn fire(&self) {
        let Some(teardown) = &self.teardown else {
            return;
        };
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("teardown already ran for target '{}'", teardown.name);
            return;
        }

        info!("tearing down target '{}'", teardown.name);
        let mut manager = TargetManager::new(
            teardown.runtime,
            teardown.runner.as_ref(),
            teardown.name.clone(),
        );
        if let Err(err) = manager.stop() {
            warn!("failed to stop target '{}' during teardown: {err}", teardown.name);
        }
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.fire();
    }
}
