// ============================================================================
// File: src/main.rs
// ----------------------------------------------------------------------------
// CLI entry point.
//
// The provisioning sequence itself is sequential and blocking; the async
// runtime exists to race it against ctrl-c so the teardown guard fires on
// interruption as well as on completion and failure.
// ============================================================================

use std::fs::File;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, error, warn};

use playpen::cli::{Cli, Command, RunArgs};
use playpen::config::{SandboxConfig, env_file};
use playpen::error::exit_codes;
use playpen::orchestrator::{self, RunOptions};
use playpen::runner::{CommandRunner, ProcessRunner};
use playpen::target::{ContainerRuntime, TargetGuard};

fn init_logging(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("could not open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("playpen: {err:#}");
        process::exit(exit_codes::FAILURE);
    }

    let code = match cli.command {
        Command::Run(ref args) => run_command(&cli, args).await,
    };
    process::exit(code);
}

async fn run_command(cli: &Cli, args: &RunArgs) -> i32 {
    let settings = env_file::load(&cli.env_file);
    let config = match SandboxConfig::resolve(args, settings) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return err.exit_code();
        }
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);

    let runtime = if args.skip_target {
        None
    } else {
        match ContainerRuntime::detect(runner.as_ref(), config.runtime_preference) {
            Ok(runtime) => Some(runtime),
            Err(err) => {
                error!("{err}");
                return err.exit_code();
            }
        }
    };

    // registered before any acquisition: an abort at any later step, or an
    // interrupt, still releases the target
    let guard = Arc::new(match runtime {
        Some(rt) => TargetGuard::armed(Arc::clone(&runner), rt, config.target_name.clone()),
        None => TargetGuard::disarmed(),
    });

    let options = RunOptions {
        skip_target: args.skip_target,
        limit: args.limit.clone(),
    };

    let sequence = {
        let runner = Arc::clone(&runner);
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            orchestrator::run(&config, &options, runtime, runner.as_ref())
        })
    };

    let code = tokio::select! {
        joined = sequence => match joined {
            Ok(Ok(())) => exit_codes::SUCCESS,
            Ok(Err(err)) => {
                error!("{err}");
                err.exit_code()
            }
            Err(err) => {
                error!("orchestration task failed: {err}");
                exit_codes::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received; shutting down");
            exit_codes::INTERRUPTED
        }
    };

    guard.fire();
    code
}
