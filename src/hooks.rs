//! Pre/post submission hooks
//!
//! Hooks are injected through the [`SubmitHooks`] trait rather than
//! discovered on the filesystem: library callers implement the trait,
//! the CLI wires command-backed hooks from the `[hooks]` config table.
//! Absent hooks are not an error; a hook that fails aborts the
//! submission (pre) or surfaces after it (post).

use thiserror::Error;

use crate::config::{EnvConfig, HooksConfig};
use crate::runner::{CommandError, CommandRunner, CommandSpec};

/// Errors from a user-supplied hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{stage} hook: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("{stage} hook failed (status {status:?})\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    Failed {
        stage: &'static str,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Callbacks around the submission sequence
pub trait SubmitHooks {
    /// Runs before the virtualenv/build/submit sequence
    fn pre_submit(&self, name: &str, env_name: &str, env: &EnvConfig) -> Result<(), HookError> {
        let _ = (name, env_name, env);
        Ok(())
    }

    /// Runs only after a successful submission
    fn post_submit(&self, name: &str, env_name: &str, env: &EnvConfig) -> Result<(), HookError> {
        let _ = (name, env_name, env);
        Ok(())
    }
}

/// Hooks that do nothing
pub struct NoHooks;

impl SubmitHooks for NoHooks {}

/// Hooks that run configured commands, each invoked with the topology
/// name and environment name appended as arguments
pub struct CommandHooks<'a> {
    runner: &'a dyn CommandRunner,
    config: HooksConfig,
}

impl<'a> CommandHooks<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: HooksConfig) -> Self {
        Self { runner, config }
    }

    fn run_stage(
        &self,
        stage: &'static str,
        command: Option<&[String]>,
        name: &str,
        env_name: &str,
    ) -> Result<(), HookError> {
        let Some(command) = command else {
            return Ok(());
        };
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };

        let spec = CommandSpec::new(program)
            .args(args.iter().cloned())
            .arg(name)
            .arg(env_name);
        let output = self
            .runner
            .run(&spec)
            .map_err(|source| HookError::Spawn { stage, source })?;
        if !output.success() {
            return Err(HookError::Failed {
                stage,
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

impl SubmitHooks for CommandHooks<'_> {
    fn pre_submit(&self, name: &str, env_name: &str, _env: &EnvConfig) -> Result<(), HookError> {
        self.run_stage("pre_submit", self.config.pre_submit.as_deref(), name, env_name)
    }

    fn post_submit(&self, name: &str, env_name: &str, _env: &EnvConfig) -> Result<(), HookError> {
        self.run_stage("post_submit", self.config.post_submit.as_deref(), name, env_name)
    }
}
