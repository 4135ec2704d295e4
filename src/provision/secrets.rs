// ============================================================================
// File: src/provision/secrets.rs
// ----------------------------------------------------------------------------
// Development vault password file
// ============================================================================

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Result, SandboxError};

/// Default content for an auto-created vault password file. A development
/// convenience, not a production credential.
pub const DEFAULT_VAULT_PASSWORD: &str = "password\n";

/// Make sure a vault password file exists
///
/// An existing file is never touched; otherwise the default is written and
/// the creation logged.
pub fn ensure_secrets_file(path: &Path, default_value: &str) -> Result<()> {
    if path.exists() {
        debug!("vault password file already present at {}", path.display());
        return Ok(());
    }

    fs::write(path, default_value).map_err(|e| SandboxError::io(path, e))?;
    info!("created default vault password file at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_when_absent() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let path = temp.path().join("vault-pw.txt");

        ensure_secrets_file(&path, DEFAULT_VAULT_PASSWORD).expect("ensure failed");
        assert_eq!(
            fs::read_to_string(&path).expect("read secrets"),
            "password\n"
        );
    }

    #[test]
    fn never_overwrites_existing_content() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let path = temp.path().join("vault-pw.txt");
        fs::write(&path, "real-secret\n").expect("seed");

        ensure_secrets_file(&path, DEFAULT_VAULT_PASSWORD).expect("ensure failed");
        assert_eq!(
            fs::read_to_string(&path).expect("read secrets"),
            "real-secret\n"
        );
    }

    #[test]
    fn unwritable_location_is_fatal() {
        let path = Path::new("/nonexistent/dir/vault-pw.txt");
        let err = ensure_secrets_file(path, DEFAULT_VAULT_PASSWORD).unwrap_err();
        assert!(matches!(err, SandboxError::Io { .. }));
    }
}
