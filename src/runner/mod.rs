// ============================================================================
// File: src/runner/mod.rs
// ----------------------------------------------------------------------------
// Subprocess seam for every external tool the sandbox drives.
//
// All side effects against ssh-keygen, ansible-galaxy, ansible-playbook and
// the container runtime go through the CommandRunner trait, so tests can
// script the outside world instead of parsing it.
// ============================================================================

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

/// Description of one external command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub capture: bool,
}

impl CommandSpec {
    pub fn new<P: Into<String>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
            capture: false,
        }
    }

    pub fn arg<A: Into<String>>(mut self, arg: A) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Capture stdout/stderr instead of streaming to the console
    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Render the command line for log output
    pub fn rendered(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of a completed external command
///
/// A non-zero exit lands here rather than in an error; callers decide what
/// is fatal for their step.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs external commands to completion
///
/// Err means the process could not be spawned at all; everything else is
/// reported through the returned output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Production runner backed by std::process
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        debug!("running: {}", spec.rendered());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        if spec.capture {
            let output = cmd.output()?;
            Ok(CommandOutput {
                code: output.status.code().unwrap_or(1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = cmd.stdin(Stdio::null()).status()?;
            Ok(CommandOutput {
                code: status.code().unwrap_or(1),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }
}

/// Probe PATH for a usable executable by asking it for its version
pub fn command_available(runner: &dyn CommandRunner, program: &str) -> bool {
    let spec = CommandSpec::new(program).arg("--version").capture();
    matches!(runner.run(&spec), Ok(out) if out.success())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::Mutex;

    use super::{CommandOutput, CommandRunner, CommandSpec};

    type Script = Box<dyn Fn(&CommandSpec) -> io::Result<CommandOutput> + Send + Sync>;

    pub fn ok() -> CommandOutput {
        CommandOutput {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn ok_with_stdout<S: Into<String>>(stdout: S) -> CommandOutput {
        CommandOutput {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32) -> CommandOutput {
        CommandOutput {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Test double for the process runner
    ///
    /// Records every spec it sees and answers from a caller-provided script,
    /// the same shape as the injectable runner the unit tests fake out.
    pub struct ScriptedRunner {
        script: Script,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn new<F>(script: F) -> Self
        where
            F: Fn(&CommandSpec) -> io::Result<CommandOutput> + Send + Sync + 'static,
        {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Runner that reports success for everything
        pub fn succeeding() -> Self {
            Self::new(|_| Ok(ok()))
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().expect("call log poisoned").clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls
                .lock()
                .expect("call log poisoned")
                .push(spec.clone());
            (self.script)(spec)
        }
    }
}
