// ============================================================================
// File: src/provision/keys.rs
// ----------------------------------------------------------------------------
// Ephemeral SSH key material for the isolated target
// ============================================================================

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::runner::{CommandRunner, CommandSpec};

/// Paths to the generated key material
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub authorized_keys: PathBuf,
}

/// Generate a fresh key pair and authorized_keys file
///
/// Always executes: the sandbox is ephemeral and keys never survive an
/// invocation. Stale key files from a previous run are removed first, and
/// the key directory is restricted to the owner because the runtime mounts
/// it as /root/.ssh.
pub fn provision_keys(
    config: &SandboxConfig,
    runner: &dyn CommandRunner,
) -> Result<KeyMaterial> {
    let key_dir = config.key_dir();
    info!("provisioning key material in {}", key_dir.display());

    fs::create_dir_all(&key_dir).map_err(|e| SandboxError::io(&key_dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&key_dir)
            .map_err(|e| SandboxError::io(&key_dir, e))?
            .permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&key_dir, perms).map_err(|e| SandboxError::io(&key_dir, e))?;
    }

    let private_key = config.private_key();
    let public_key = config.public_key();
    for stale in [&private_key, &public_key] {
        if stale.exists() {
            debug!("removing stale key file {}", stale.display());
            fs::remove_file(stale).map_err(|e| SandboxError::io(stale, e))?;
        }
    }

    let spec = CommandSpec::new("ssh-keygen")
        .args(["-q", "-t", "ed25519", "-N", ""])
        .arg("-C")
        .arg(format!("ansible@{}", config.target_name))
        .arg("-f")
        .arg(private_key.display().to_string())
        .capture();
    let out = runner.run(&spec).map_err(|e| {
        SandboxError::setup(format!("failed to invoke ssh-keygen: {e}"))
    })?;
    if !out.success() {
        return Err(SandboxError::setup(format!(
            "ssh-keygen exited with status {}: {}",
            out.code,
            out.stderr.trim()
        )));
    }

    let authorized_keys = config.authorized_keys();
    fs::copy(&public_key, &authorized_keys)
        .map_err(|e| SandboxError::io(&authorized_keys, e))?;

    info!(
        "key material ready: {} / {}",
        private_key.display(),
        authorized_keys.display()
    );
    Ok(KeyMaterial {
        private_key,
        public_key,
        authorized_keys,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::runner::testing::{ScriptedRunner, failed, ok};

    fn keygen_faking_runner() -> ScriptedRunner {
        ScriptedRunner::new(|spec| {
            if spec.program == "ssh-keygen" {
                let key = PathBuf::from(spec.args.last().expect("missing -f value"));
                fs::write(&key, "PRIVATE").expect("write private");
                fs::write(key.with_extension("pub"), "PUBLIC").expect("write public");
            }
            Ok(ok())
        })
    }

    #[test]
    fn generates_pair_and_authorized_keys() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = SandboxConfig::with_root(temp.path().to_path_buf());
        let runner = keygen_faking_runner();

        let material = provision_keys(&config, &runner).expect("provisioning failed");

        assert!(material.private_key.exists());
        assert_eq!(
            fs::read_to_string(&material.authorized_keys).expect("read authorized_keys"),
            "PUBLIC"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(config.key_dir())
                .expect("key dir metadata")
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn regenerates_over_stale_keys() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = SandboxConfig::with_root(temp.path().to_path_buf());

        fs::create_dir_all(config.key_dir()).expect("mkdir");
        fs::write(config.private_key(), "OLD-PRIVATE").expect("seed private");
        fs::write(config.public_key(), "OLD-PUBLIC").expect("seed public");

        let runner = keygen_faking_runner();
        let material = provision_keys(&config, &runner).expect("provisioning failed");

        assert_eq!(
            fs::read_to_string(&material.private_key).expect("read private"),
            "PRIVATE"
        );
        assert_eq!(
            fs::read_to_string(&material.authorized_keys).expect("read authorized_keys"),
            "PUBLIC"
        );
    }

    #[test]
    fn keygen_failure_is_fatal() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = SandboxConfig::with_root(temp.path().to_path_buf());
        let runner = ScriptedRunner::new(|_| Ok(failed(1)));

        let err = provision_keys(&config, &runner).unwrap_err();
        assert!(matches!(err, SandboxError::Setup { .. }));
    }
}
