// ============================================================================
// File: src/orchestrator.rs
// ----------------------------------------------------------------------------
// The fixed provisioning sequence.
//
// Each step returns a result and the sequence stops on the first failure;
// teardown is registered by the caller before this runs, so an abort at any
// step still releases the target. The playbook's own exit status passes
// through unchanged.
// ============================================================================

use std::fs;

use log::info;

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::provision::{
    DEFAULT_VAULT_PASSWORD, KeyMaterial, ensure_collections, ensure_roles, ensure_secrets_file,
    provision_keys,
};
use crate::runner::{CommandRunner, CommandSpec, command_available};
use crate::target::{ContainerRuntime, TargetManager};

/// Per-run options from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Leave the isolated target out and run against localhost only
    pub skip_target: bool,
    /// Restrict the playbook to matching hosts
    pub limit: Option<String>,
}

/// Run the whole provisioning sequence and the playbook
///
/// `runtime` is the detected container runtime, or None when the isolated
/// target is skipped; key material is only provisioned when the target is
/// in play, since nothing else consumes it.
pub fn run(
    config: &SandboxConfig,
    options: &RunOptions,
    runtime: Option<ContainerRuntime>,
    runner: &dyn CommandRunner,
) -> Result<()> {
    if !command_available(runner, "ansible") {
        return Err(SandboxError::MissingDependency {
            command: "ansible".to_string(),
        });
    }

    let key_material = match runtime {
        Some(rt) => {
            let material = provision_keys(config, runner)?;

            let mut target = TargetManager::new(rt, runner, config.target_name.clone());
            target.build_image(&config.containerfile(), &config.image_tag, &config.root)?;
            target.start(
                &config.image_tag,
                config.host_port,
                config.ssh_port,
                &config.key_dir(),
            )?;
            Some(material)
        }
        None => {
            info!("isolated target skipped; running against localhost only");
            None
        }
    };

    ensure_secrets_file(&config.secrets_file(), DEFAULT_VAULT_PASSWORD)?;
    ensure_roles(config, runner)?;
    ensure_collections(&config.required_collections, runner)?;
    reset_log(config)?;

    let limit = match (&options.limit, options.skip_target) {
        (Some(limit), _) => Some(limit.clone()),
        (None, true) => {
            info!("target skipped; defaulting limit to localhost");
            Some("localhost".to_string())
        }
        (None, false) => None,
    };

    run_playbook(config, key_material.as_ref(), limit.as_deref(), runner)
}

/// Truncate the execution log so each run starts from an empty file
fn reset_log(config: &SandboxConfig) -> Result<()> {
    let log_file = config.log_file();
    fs::write(&log_file, "").map_err(|e| SandboxError::io(&log_file, e))?;
    Ok(())
}

/// Invoke the playbook with the assembled inventory and environment
///
/// Host-key verification is disabled because the target's host key changes
/// every run. Settings-file values reach the playbook's environment first,
/// then the run-specific values override them.
fn run_playbook(
    config: &SandboxConfig,
    key_material: Option<&KeyMaterial>,
    limit: Option<&str>,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let mut spec = CommandSpec::new("ansible-playbook")
        .arg("--inventory")
        .arg(config.inventory().display().to_string())
        .arg(config.playbook().display().to_string())
        .cwd(&config.root);

    for (key, value) in &config.settings {
        spec = spec.env(key, value);
    }
    spec = spec
        .env("PLAYBOOK_PATH", config.root.display().to_string())
        .env("ANSIBLE_HOST_KEY_CHECKING", "False")
        .env(
            "ANSIBLE_VAULT_PASSWORD_FILE",
            config.secrets_file().display().to_string(),
        )
        .env("ANSIBLE_LOG_PATH", config.log_file().display().to_string());
    if let Some(material) = key_material {
        spec = spec.env(
            "ANSIBLE_PRIVATE_KEY_FILE",
            material.private_key.display().to_string(),
        );
    }
    if let Some(limit) = limit {
        spec = spec.args(["-l", limit]);
    }

    info!("running playbook {}", config.playbook().display());
    let out = runner.run(&spec).map_err(|_| SandboxError::MissingDependency {
        command: "ansible-playbook".to_string(),
    })?;
    if !out.success() {
        return Err(SandboxError::Execution { code: out.code });
    }

    info!("playbook run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::runner::testing::{ScriptedRunner, failed, ok, ok_with_stdout};
    use crate::target::TargetGuard;

    fn options(skip_target: bool) -> RunOptions {
        RunOptions {
            skip_target,
            limit: None,
        }
    }

    fn config_in(temp: &assert_fs::TempDir) -> SandboxConfig {
        SandboxConfig::with_root(temp.path().to_path_buf())
    }

    /// Script that fakes out every external tool a full run touches
    fn full_run_script(
        spec: &crate::runner::CommandSpec,
    ) -> std::io::Result<crate::runner::CommandOutput> {
        match spec.program.as_str() {
            "ssh-keygen" => {
                let key = std::path::PathBuf::from(spec.args.last().expect("missing -f value"));
                fs::write(&key, "PRIVATE").expect("write private");
                fs::write(key.with_extension("pub"), "PUBLIC").expect("write public");
                Ok(ok())
            }
            "ansible-galaxy" => Ok(ok_with_stdout("{}")),
            "podman" if spec.args.contains(&"inspect".to_string()) => Ok(failed(125)),
            _ => Ok(ok()),
        }
    }

    #[test]
    fn skip_target_defaults_limit_to_localhost() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);
        let runner = ScriptedRunner::new(full_run_script);

        run(&config, &options(true), None, &runner).expect("run failed");

        let calls = runner.calls();
        let playbook = calls
            .iter()
            .find(|spec| spec.program == "ansible-playbook")
            .expect("playbook never invoked");
        assert!(playbook.args.contains(&"-l".to_string()));
        assert!(playbook.args.contains(&"localhost".to_string()));

        // no key material and no container traffic in localhost-only mode
        assert!(!calls.iter().any(|spec| spec.program == "ssh-keygen"));
        assert!(!calls.iter().any(|spec| spec.program == "podman"));

        // secrets file was created with the development default
        assert_eq!(
            fs::read_to_string(config.secrets_file()).expect("read secrets"),
            "password\n"
        );
    }

    #[test]
    fn full_run_provisions_in_order_and_resets_log() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);
        fs::write(config.log_file(), "stale output\n").expect("seed log");

        let runner = ScriptedRunner::new(full_run_script);
        run(
            &config,
            &options(false),
            Some(ContainerRuntime::Podman),
            &runner,
        )
        .expect("run failed");

        let programs: Vec<String> = runner
            .calls()
            .into_iter()
            .map(|spec| spec.program)
            .collect();
        let keygen = programs
            .iter()
            .position(|p| p == "ssh-keygen")
            .expect("no keygen");
        let build = programs
            .iter()
            .position(|p| p == "podman")
            .expect("no podman call");
        let playbook = programs
            .iter()
            .position(|p| p == "ansible-playbook")
            .expect("no playbook");
        assert!(keygen < build);
        assert!(build < playbook);

        // log starts empty; the playbook appends through ANSIBLE_LOG_PATH
        assert_eq!(
            fs::read_to_string(config.log_file()).expect("read log"),
            ""
        );
    }

    #[test]
    fn playbook_env_points_at_generated_key() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);
        let runner = ScriptedRunner::new(full_run_script);

        run(
            &config,
            &options(false),
            Some(ContainerRuntime::Podman),
            &runner,
        )
        .expect("run failed");

        let calls = runner.calls();
        let playbook = calls
            .iter()
            .find(|spec| spec.program == "ansible-playbook")
            .expect("playbook never invoked");
        let env: std::collections::HashMap<_, _> = playbook
            .envs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        assert_eq!(env["ANSIBLE_HOST_KEY_CHECKING"], "False");
        assert_eq!(
            env["ANSIBLE_PRIVATE_KEY_FILE"],
            config.private_key().display().to_string()
        );
        assert_eq!(
            env["ANSIBLE_VAULT_PASSWORD_FILE"],
            config.secrets_file().display().to_string()
        );
    }

    #[test]
    fn build_failure_aborts_before_playbook_and_teardown_still_fires() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);

        let runner = Arc::new(ScriptedRunner::new(|spec| match spec.program.as_str() {
            "ssh-keygen" => {
                let key = std::path::PathBuf::from(spec.args.last().expect("missing -f value"));
                fs::write(&key, "PRIVATE").expect("write private");
                fs::write(key.with_extension("pub"), "PUBLIC").expect("write public");
                Ok(ok())
            }
            "podman" if spec.args.first().map(String::as_str) == Some("build") => Ok(failed(7)),
            "podman" => Ok(failed(125)),
            _ => Ok(ok()),
        }));

        let guard = TargetGuard::armed(
            runner.clone(),
            ContainerRuntime::Podman,
            config.target_name.clone(),
        );
        let err = run(
            &config,
            &options(false),
            Some(ContainerRuntime::Podman),
            runner.as_ref(),
        )
        .unwrap_err();
        guard.fire();

        assert!(matches!(err, SandboxError::Resource { .. }));
        // the build step's own status becomes the process status
        assert_eq!(err.exit_code(), 7);

        let calls = runner.calls();
        assert!(!calls.iter().any(|spec| spec.program == "ansible-playbook"));

        // teardown probed for the target and found nothing to stop
        let inspects = calls
            .iter()
            .filter(|spec| spec.args.contains(&"inspect".to_string()))
            .count();
        assert_eq!(inspects, 1);
    }

    #[test]
    fn playbook_status_propagates_verbatim() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);

        let runner = ScriptedRunner::new(|spec| match spec.program.as_str() {
            "ansible-playbook" => Ok(failed(4)),
            "ansible-galaxy" => Ok(ok_with_stdout("{}")),
            _ => Ok(ok()),
        });

        let err = run(&config, &options(true), None, &runner).unwrap_err();
        assert!(matches!(err, SandboxError::Execution { code: 4 }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn missing_ansible_aborts_before_any_provisioning() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);

        let runner = ScriptedRunner::new(|spec| {
            if spec.program == "ansible" {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not installed",
                ))
            } else {
                Ok(ok())
            }
        });

        let err = run(&config, &options(true), None, &runner).unwrap_err();
        assert!(matches!(err, SandboxError::MissingDependency { .. }));
        assert_eq!(runner.calls().len(), 1);
        assert!(!config.secrets_file().exists());
    }

    #[test]
    fn explicit_limit_wins_over_localhost_default() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let config = config_in(&temp);
        let runner = ScriptedRunner::new(full_run_script);

        let opts = RunOptions {
            skip_target: true,
            limit: Some("webservers".to_string()),
        };
        run(&config, &opts, None, &runner).expect("run failed");

        let calls = runner.calls();
        let playbook = calls
            .iter()
            .find(|spec| spec.program == "ansible-playbook")
            .expect("playbook never invoked");
        assert!(playbook.args.contains(&"webservers".to_string()));
        assert!(!playbook.args.contains(&"localhost".to_string()));
    }
}
