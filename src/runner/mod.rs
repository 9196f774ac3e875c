//! External command execution
//!
//! Everything stormctl drives is an external process: the build tool that
//! packages the uberjar, `ssh` for the Nimbus tunnel, and the cluster-side
//! list/kill/submit commands. All of them go through the [`CommandRunner`]
//! trait so the pipeline can be exercised in-process against a scripted
//! runner (see [`crate::mock`]).

use std::process::{Command, Stdio};

/// A command to run: program, arguments, and environment overrides.
///
/// Environment overrides apply to the spawned child only. The parent
/// process environment is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Extra environment variables for the child, in insertion order
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment override for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Render the command for progress output and error messages.
    ///
    /// Arguments containing whitespace or double quotes are single-quoted
    /// so the printed line can be copied back into a shell.
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            if arg.chars().any(|c| c.is_whitespace() || c == '"') {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Captured result of a completed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, if the process exited normally
    pub status: Option<i32>,

    /// Captured stdout, lossily decoded
    pub stdout: String,

    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// True when the command exited with code zero
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Successful output with the given stdout (test/mock convenience)
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr (test/mock convenience)
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Errors from launching a command
///
/// A command that launches but exits non-zero is not an error at this
/// layer; callers decide what a non-zero exit means for their step.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Execution seam for external commands
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, capturing stdout and stderr
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Production runner backed by `std::process::Command`
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder_preserves_order() {
        let spec = CommandSpec::new("lein")
            .arg("run")
            .args(["-m", "example/-main"])
            .env("JVM_OPTS", "-Dfoo=bar");

        assert_eq!(spec.program, "lein");
        assert_eq!(spec.args, vec!["run", "-m", "example/-main"]);
        assert_eq!(spec.env, vec![("JVM_OPTS".to_string(), "-Dfoo=bar".to_string())]);
    }

    #[test]
    fn test_display_line_quotes_whitespace() {
        let spec = CommandSpec::new("lein")
            .arg("--option")
            .arg("topology.workers=2")
            .arg("a b");
        assert_eq!(spec.display_line(), "lein --option topology.workers=2 'a b'");
    }

    #[test]
    fn test_shell_runner_captures_stdout() {
        let output = ShellRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello"]))
            .expect("sh should spawn");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_shell_runner_scopes_env_to_child() {
        let output = ShellRunner
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "printf '%s' \"$STORMCTL_TEST_FLAG\""])
                    .env("STORMCTL_TEST_FLAG", "set-for-child"),
            )
            .expect("sh should spawn");
        assert_eq!(output.stdout, "set-for-child");
        // The override never leaks into the parent process.
        assert!(std::env::var("STORMCTL_TEST_FLAG").is_err());
    }

    #[test]
    fn test_shell_runner_reports_exit_code() {
        let output = ShellRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .expect("sh should spawn");
        assert!(!output.success());
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let err = ShellRunner
            .run(&CommandSpec::new("stormctl-no-such-binary"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
