//! Nimbus cluster interaction
//!
//! The coordinator is driven through its own command-line entry points;
//! stormctl builds those command lines, runs them through the
//! [`CommandRunner`](crate::runner::CommandRunner) seam, and interprets
//! their text output. No Thrift protocol lives here.

pub mod kill;
pub mod listing;
pub mod safety;
pub mod submit;

pub use kill::{kill_existing_if_unsafe, wait_until_absent, KillError, KillPolicy};
pub use listing::{parse_listing, ListingRow, TopologyState};
pub use safety::{is_safe_to_submit, ListingError};
pub use submit::{submit_topology, SubmissionError, SubmitRequest};

use crate::runner::{CommandRunner, CommandSpec};

/// Cluster-side entry point that prints the topology listing
pub const LIST_ENTRYPOINT: &str = "streamparse.commands.list/-main";

/// Cluster-side entry point that kills a topology
pub const KILL_ENTRYPOINT: &str = "streamparse.commands.kill_topology/-main";

/// Cluster-side entry point that submits a topology
pub const SUBMIT_ENTRYPOINT: &str = "streamparse.commands.submit_topology/-main";

/// Where to reach the coordinator.
///
/// Tunneled runs use the forwarded local port; direct runs carry the
/// environment's configured host and port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Endpoint {
    /// Direct connection to a known host and port
    pub fn direct(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
        }
    }

    /// Append `--host`/`--port` arguments when set
    fn apply(&self, mut spec: CommandSpec) -> CommandSpec {
        if let Some(host) = &self.host {
            spec = spec.arg("--host").arg(host);
        }
        if let Some(port) = self.port {
            spec = spec.arg("--port").arg(port.to_string());
        }
        spec
    }
}

/// Client for the coordinator's list and kill commands
pub struct NimbusClient<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> NimbusClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Fetch the raw topology listing.
    ///
    /// A failed list command propagates; a fabricated "empty" listing
    /// would read as safe-to-submit and risk a double submission.
    pub fn list_topologies(&self, endpoint: &Endpoint) -> Result<String, ListingError> {
        let spec = endpoint.apply(
            CommandSpec::new("lein")
                .arg("run")
                .arg("-m")
                .arg(LIST_ENTRYPOINT),
        );
        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(ListingError::CommandFailed {
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    /// Ask the cluster to kill a topology.
    ///
    /// Completion only means the request was accepted; callers poll the
    /// listing to learn when the topology is actually gone.
    pub fn kill_topology(
        &self,
        name: &str,
        wait: Option<u64>,
        endpoint: &Endpoint,
    ) -> Result<(), KillError> {
        let mut spec = CommandSpec::new("lein")
            .arg("run")
            .arg("-m")
            .arg(KILL_ENTRYPOINT)
            .arg(name);
        if let Some(wait) = wait {
            spec = spec.arg("--wait").arg(wait.to_string());
        }
        let spec = endpoint.apply(spec);

        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(KillError::CommandFailed {
                name: name.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}
