//! Virtualenv reconciliation seam
//!
//! Environments that run topology components out of managed virtualenvs
//! need those virtualenvs brought in line with the topology's
//! requirements file before submission. The reconciliation itself is an
//! external tool; stormctl only decides when to call it and with what.

use std::path::Path;

use thiserror::Error;

use crate::runner::{CommandError, CommandRunner, CommandSpec};

/// Errors from the sync collaborator
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("virtualenv sync: {0}")]
    Spawn(#[from] CommandError),

    #[error("virtualenv sync failed (status {status:?})\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    Failed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Brings a topology's virtualenv in line with its requirements file
pub trait DependencySync {
    fn sync(&self, env_name: &str, topology_name: &str, spec_path: &Path) -> Result<(), SyncError>;
}

/// Sync backed by a configured command, invoked as
/// `<command...> <env> <topology> <requirements-file>`.
///
/// Without a configured command the step is announced and skipped; which
/// tool reconciles virtualenvs is the operator's call, not this one's.
pub struct ConfiguredSync<'a> {
    runner: &'a dyn CommandRunner,
    command: Option<Vec<String>>,
}

impl<'a> ConfiguredSync<'a> {
    pub fn new(runner: &'a dyn CommandRunner, command: Option<Vec<String>>) -> Self {
        Self { runner, command }
    }
}

impl DependencySync for ConfiguredSync<'_> {
    fn sync(&self, env_name: &str, topology_name: &str, spec_path: &Path) -> Result<(), SyncError> {
        let Some((program, args)) = self.command.as_deref().and_then(<[String]>::split_first)
        else {
            println!(
                "No virtualenv sync command configured for '{}'; skipping reconciliation.",
                env_name
            );
            return Ok(());
        };

        println!(
            "Reconciling virtualenv for topology '{}' ({})...",
            topology_name,
            spec_path.display()
        );
        let spec = CommandSpec::new(program)
            .args(args.iter().cloned())
            .arg(env_name)
            .arg(topology_name)
            .arg(spec_path.display().to_string());
        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(SyncError::Failed {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use crate::runner::CommandOutput;
    use std::path::PathBuf;

    #[test]
    fn test_unconfigured_sync_skips_without_running() {
        let runner = MockRunner::new();
        let sync = ConfiguredSync::new(&runner, None);
        sync.sync("prod", "wordcount", &PathBuf::from("virtualenvs/wordcount.txt"))
            .unwrap();
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_configured_sync_passes_env_name_and_spec() {
        let runner = MockRunner::new();
        runner.expect("venv-sync", CommandOutput::ok(""));

        let sync = ConfiguredSync::new(&runner, Some(vec!["venv-sync".to_string()]));
        sync.sync("prod", "wordcount", &PathBuf::from("virtualenvs/wordcount.txt"))
            .unwrap();

        let line = runner.invocations()[0].display_line();
        assert_eq!(line, "venv-sync prod wordcount virtualenvs/wordcount.txt");
    }

    #[test]
    fn test_failed_sync_propagates() {
        let runner = MockRunner::new();
        runner.expect("venv-sync", CommandOutput::failed(1, "pip install failed"));

        let sync = ConfiguredSync::new(&runner, Some(vec!["venv-sync".to_string()]));
        let err = sync
            .sync("prod", "wordcount", &PathBuf::from("virtualenvs/wordcount.txt"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Failed { .. }));
    }
}
