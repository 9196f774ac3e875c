//! Topology artifact build
//!
//! Packages the topology as an uberjar through the project's build tool:
//! a clean, then an uberjar build, then a scan of the build output for
//! the produced `standalone.jar`. The build tool is opaque to stormctl;
//! only its exit status and the artifact path matter.

use std::path::PathBuf;

use crate::runner::{CommandError, CommandRunner, CommandSpec};

/// Suffix identifying the deployable jar among build outputs
const ARTIFACT_SUFFIX: &str = "standalone.jar";

/// Errors from the build step
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("'{command}' failed\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    CommandFailed {
        command: String,
        stdout: String,
        stderr: String,
    },

    #[error("build succeeded but no standalone.jar path appeared in its output")]
    ArtifactNotFound,
}

/// Build the deployable uberjar and return its path.
pub fn build_artifact(runner: &dyn CommandRunner) -> Result<PathBuf, BuildError> {
    println!("Cleaning from prior builds...");
    run_build_step(runner, CommandSpec::new("lein").arg("clean"))?;

    println!("Creating topology uberjar...");
    let output = run_build_step(runner, CommandSpec::new("lein").arg("uberjar"))?;

    let artifact = find_artifact(&output).ok_or(BuildError::ArtifactNotFound)?;
    println!("Uberjar created: {}", artifact.display());
    Ok(artifact)
}

fn run_build_step(runner: &dyn CommandRunner, spec: CommandSpec) -> Result<String, BuildError> {
    let command = spec.display_line();
    let output = runner.run(&spec)?;
    if !output.success() {
        return Err(BuildError::CommandFailed {
            command,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(output.stdout)
}

/// Pick the artifact path out of the build output.
///
/// The uberjar build prints `Created <path>` for each jar it writes; the
/// deployable is the one ending in `standalone.jar`.
fn find_artifact(stdout: &str) -> Option<PathBuf> {
    stdout
        .split_whitespace()
        .find(|token| token.ends_with(ARTIFACT_SUFFIX))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use crate::runner::CommandOutput;

    const UBERJAR_OUTPUT: &str = "\
Compiling wordcount
Created /build/target/wordcount-0.1.0.jar
Created /build/target/wordcount-0.1.0-standalone.jar
";

    #[test]
    fn test_find_artifact_picks_standalone_jar() {
        assert_eq!(
            find_artifact(UBERJAR_OUTPUT),
            Some(PathBuf::from("/build/target/wordcount-0.1.0-standalone.jar"))
        );
        assert_eq!(find_artifact("Compiling wordcount\n"), None);
    }

    #[test]
    fn test_build_runs_clean_then_uberjar() {
        let runner = MockRunner::new();
        runner.expect("lein clean", CommandOutput::ok(""));
        runner.expect("lein uberjar", CommandOutput::ok(UBERJAR_OUTPUT));

        let artifact = build_artifact(&runner).unwrap();
        assert!(artifact.ends_with("wordcount-0.1.0-standalone.jar"));

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].display_line(), "lein clean");
        assert_eq!(invocations[1].display_line(), "lein uberjar");
    }

    #[test]
    fn test_failed_clean_stops_the_build() {
        let runner = MockRunner::new();
        runner.expect("lein clean", CommandOutput::failed(1, "stale lock"));

        let err = build_artifact(&runner).unwrap_err();
        match err {
            BuildError::CommandFailed { command, stderr, .. } => {
                assert_eq!(command, "lein clean");
                assert!(stderr.contains("stale lock"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls_matching("uberjar"), 0);
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let runner = MockRunner::new();
        runner.expect("lein clean", CommandOutput::ok(""));
        runner.expect("lein uberjar", CommandOutput::ok("Compiling wordcount\n"));

        assert!(matches!(
            build_artifact(&runner).unwrap_err(),
            BuildError::ArtifactNotFound
        ));
    }
}
