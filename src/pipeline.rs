//! Submission pipeline
//!
//! One linear pass per invocation: resolve config, reconcile the
//! virtualenv, run pre-submit hooks, build the uberjar, reach Nimbus
//! (directly or through a scoped SSH tunnel), clear the topology name if
//! forced, submit, then run post-submit hooks. Any failure aborts the
//! remaining steps; the tunnel is released on every path.

use std::path::Path;

use thiserror::Error;

use crate::build::{build_artifact, BuildError};
use crate::cluster::{
    kill_existing_if_unsafe, submit_topology, Endpoint, KillError, KillPolicy, ListingError,
    SubmissionError, SubmitRequest,
};
use crate::config::{Config, ConfigError, EnvConfig, TopologyDefinition};
use crate::hooks::{HookError, SubmitHooks};
use crate::options::{build_submission_options, OptionFormatError, SubmissionOption};
use crate::runner::CommandRunner;
use crate::sync::{DependencySync, SyncError};
use crate::tunnel::{SshTunnel, TunnelConfig, TunnelError};

/// Pipeline errors, one variant per failing stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("malformed option: {0}")]
    Option(#[from] OptionFormatError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Kill(#[from] KillError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl PipelineError {
    /// Exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Option(_) => 2,
            PipelineError::Hook(_) => 10,
            PipelineError::Sync(_) => 15,
            PipelineError::Tunnel(_) => 20,
            PipelineError::Build(_) => 30,
            PipelineError::Listing(_) => 40,
            PipelineError::Kill(KillError::Timeout { .. }) => 41,
            PipelineError::Kill(_) => 42,
            PipelineError::Submission(_) => 50,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One submission request
#[derive(Debug, Clone)]
pub struct SubmitArgs {
    /// Topology name; `None` resolves the lone definition in `topology_specs`
    pub name: Option<String>,

    /// Environment key under `[envs]`
    pub env_name: String,

    /// `topology.workers`
    pub workers: u32,

    /// `topology.acker.executors`
    pub ackers: u32,

    /// Operator-supplied options, already parsed
    pub options: Vec<SubmissionOption>,

    /// Kill a running topology of the same name first
    pub force: bool,

    /// Submit with topology-level debug logging
    pub debug: bool,

    /// Cluster-side wait budget for the kill command, in seconds
    pub wait: Option<u64>,
}

/// The orchestrator: wires config, runner, hooks, and sync together
pub struct SubmitPipeline<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    hooks: &'a dyn SubmitHooks,
    dependency_sync: &'a dyn DependencySync,
    kill_policy: KillPolicy,
}

impl<'a> SubmitPipeline<'a> {
    pub fn new(
        config: &'a Config,
        runner: &'a dyn CommandRunner,
        hooks: &'a dyn SubmitHooks,
        dependency_sync: &'a dyn DependencySync,
    ) -> Self {
        Self {
            config,
            runner,
            hooks,
            dependency_sync,
            kill_policy: KillPolicy::default(),
        }
    }

    /// Override the kill-wait pacing (tests use a tight interval)
    pub fn with_kill_policy(mut self, kill_policy: KillPolicy) -> Self {
        self.kill_policy = kill_policy;
        self
    }

    /// Run the full submission sequence.
    pub fn run(&self, args: &SubmitArgs) -> PipelineResult<()> {
        let topology = self.config.resolve_topology(args.name.as_deref())?;
        let env = self.config.env(&args.env_name)?;
        let (nimbus_host, nimbus_port) = env.nimbus_endpoint()?;

        if env.use_virtualenv {
            let spec_path = self.config.virtualenv_spec_path(&topology.name);
            self.dependency_sync
                .sync(&args.env_name, &topology.name, &spec_path)?;
        }

        self.hooks.pre_submit(&topology.name, &args.env_name, env)?;

        let artifact = build_artifact(self.runner)?;

        println!("Deploying \"{}\" topology...", topology.name);

        if env.use_ssh_for_nimbus {
            let tunnel_config =
                TunnelConfig::new(env.user.clone(), nimbus_host.clone(), nimbus_port);
            let tunnel = SshTunnel::open(&tunnel_config)?;
            println!(
                "SSH tunnel to Nimbus {}:{} established.",
                nimbus_host, nimbus_port
            );
            // The tunnel drops (and the forward dies) on every exit from
            // this block, error paths included.
            self.kill_and_submit(args, &topology, env, &artifact, &tunnel.local_endpoint())?;
        } else {
            let endpoint = Endpoint::direct(nimbus_host, nimbus_port);
            self.kill_and_submit(args, &topology, env, &artifact, &endpoint)?;
        }

        self.hooks.post_submit(&topology.name, &args.env_name, env)?;
        Ok(())
    }

    fn kill_and_submit(
        &self,
        args: &SubmitArgs,
        topology: &TopologyDefinition,
        env: &EnvConfig,
        artifact: &Path,
        endpoint: &Endpoint,
    ) -> PipelineResult<()> {
        kill_existing_if_unsafe(
            self.runner,
            &topology.name,
            args.force,
            args.wait,
            endpoint,
            self.kill_policy,
        )?;

        let options = build_submission_options(
            &topology.name,
            env,
            args.workers,
            args.ackers,
            &args.options,
        );
        if let Some(path) = env.log.path().or(env.log_path.as_deref()) {
            println!("Routing topology logging to {}.", path);
        }

        submit_topology(
            self.runner,
            &SubmitRequest {
                topology,
                artifact,
                options: &options,
                debug: args.debug,
                endpoint,
            },
        )?;
        Ok(())
    }
}

/// Run `f` against the environment's coordinator endpoint, opening a
/// scoped SSH tunnel first when the environment calls for one. Shared by
/// the read-only CLI commands (list, kill).
pub fn with_coordinator<T>(
    env: &EnvConfig,
    f: impl FnOnce(&Endpoint) -> PipelineResult<T>,
) -> PipelineResult<T> {
    let (host, port) = env.nimbus_endpoint()?;
    if env.use_ssh_for_nimbus {
        let tunnel = SshTunnel::open(&TunnelConfig::new(env.user.clone(), host.clone(), port))?;
        println!("SSH tunnel to Nimbus {}:{} established.", host, port);
        f(&tunnel.local_endpoint())
    } else {
        f(&Endpoint::direct(host, port))
    }
}
