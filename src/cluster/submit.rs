//! Submission command
//!
//! Builds the one command line that hands the topology to the cluster:
//! the definition file, the coordinator endpoint, the debug flag, and
//! every assembled option. The artifact is referenced through JVM flags
//! set as an environment override on the spawned child only.

use std::path::Path;

use crate::config::TopologyDefinition;
use crate::options::SubmissionOption;
use crate::runner::{CommandError, CommandRunner, CommandSpec};

use super::{Endpoint, SUBMIT_ENTRYPOINT};

/// Everything one submission needs
#[derive(Debug)]
pub struct SubmitRequest<'a> {
    pub topology: &'a TopologyDefinition,
    pub artifact: &'a Path,
    pub options: &'a [SubmissionOption],
    pub debug: bool,
    pub endpoint: &'a Endpoint,
}

/// Errors from the submit command
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("submitting topology '{name}' failed\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    CommandFailed {
        name: String,
        stdout: String,
        stderr: String,
    },
}

/// Build the submit command line for a request.
///
/// Split out from [`submit_topology`] so the exact generated command is
/// testable without running anything.
pub fn submit_command(request: &SubmitRequest<'_>) -> CommandSpec {
    let jvm_opts = format!(
        "-Dstorm.jar={} -Dstorm.options= -Dstorm.conf.file=",
        request.artifact.display()
    );

    let mut spec = CommandSpec::new("lein")
        .arg("run")
        .arg("-m")
        .arg(SUBMIT_ENTRYPOINT)
        .arg(request.topology.file.display().to_string())
        .env("JVM_OPTS", jvm_opts);

    if let Some(host) = &request.endpoint.host {
        spec = spec.arg("--host").arg(host);
    }
    if let Some(port) = request.endpoint.port {
        spec = spec.arg("--port").arg(port.to_string());
    }
    if request.debug {
        spec = spec.arg("--debug");
    }
    for option in request.options {
        spec = spec.arg("--option").arg(option.render());
    }
    spec
}

/// Run the submit command, surfacing its output either way.
pub fn submit_topology(
    runner: &dyn CommandRunner,
    request: &SubmitRequest<'_>,
) -> Result<(), SubmissionError> {
    let spec = submit_command(request);

    println!("Running command to submit topology to Nimbus:");
    println!("{}", spec.display_line());

    let output = runner.run(&spec)?;
    if !output.success() {
        return Err(SubmissionError::CommandFailed {
            name: request.topology.name.clone(),
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    if !output.stdout.is_empty() {
        print!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(())
}
