//! stormctl - deploy Storm topologies to a Nimbus coordinator
//!
//! This crate is a thin orchestration layer over external commands: the
//! build tool that packages the topology uberjar, `ssh` for the optional
//! Nimbus tunnel, and the cluster-side list/kill/submit entry points.
//! Every external process runs through the [`runner::CommandRunner`]
//! seam, so the whole pipeline is testable in-process against the
//! scripted runner in [`mock`].

pub mod build;
pub mod cluster;
pub mod config;
pub mod hooks;
pub mod mock;
pub mod options;
pub mod pipeline;
pub mod runner;
pub mod sync;
pub mod tunnel;

pub use cluster::{Endpoint, KillPolicy, NimbusClient, TopologyState};
pub use config::{Config, EnvConfig, TopologyDefinition};
pub use options::{build_submission_options, OptionFormatError, SubmissionOption};
pub use pipeline::{PipelineError, SubmitArgs, SubmitPipeline};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ShellRunner};
