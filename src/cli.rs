// ============================================================================
// File: src/cli.rs
// ----------------------------------------------------------------------------
// Command-line surface
// ============================================================================

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::defaults;
use crate::target::ContainerRuntime;

/// Disposable container sandbox for Ansible playbooks and roles
#[derive(Debug, Parser)]
#[command(name = "playpen", version, about)]
pub struct Cli {
    /// Path to the settings file
    #[arg(long, default_value = defaults::ENV_FILE)]
    pub env_file: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision the sandbox and run the playbook workflow
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Working root containing playbooks, inventory and the containerfile
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Container runtime to use
    #[arg(long, value_enum)]
    pub runtime: Option<ContainerRuntime>,

    /// Container name override
    #[arg(long)]
    pub target_name: Option<String>,

    /// Host port published to the target's SSH port
    #[arg(long)]
    pub host_port: Option<u16>,

    /// Skip building and starting the isolated target (localhost only)
    #[arg(long)]
    pub skip_target: bool,

    /// Restrict the playbook to matching hosts
    #[arg(short, long)]
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::parse_from([
            "playpen",
            "-vvv",
            "run",
            "--runtime",
            "docker",
            "--target-name",
            "alt_target",
            "--host-port",
            "2300",
            "--skip-target",
            "--limit",
            "localhost",
        ]);

        assert_eq!(cli.verbose, 3);
        let Command::Run(args) = cli.command;
        assert_eq!(args.runtime, Some(ContainerRuntime::Docker));
        assert_eq!(args.target_name.as_deref(), Some("alt_target"));
        assert_eq!(args.host_port, Some(2300));
        assert!(args.skip_target);
        assert_eq!(args.limit.as_deref(), Some("localhost"));
    }

    #[test]
    fn run_defaults_are_empty() {
        let cli = Cli::parse_from(["playpen", "run"]);
        let Command::Run(args) = cli.command;

        assert_eq!(args.root, PathBuf::from("."));
        assert!(args.runtime.is_none());
        assert!(!args.skip_target);
        assert!(args.limit.is_none());
    }
}
