//! Submission pipeline integration tests
//!
//! Drives the full orchestrator against the scripted command runner:
//! no build tool, ssh, or cluster is touched. Each scenario checks both
//! the outcome and the exact external commands that ran.

use std::cell::Cell;
use std::fs;
use std::time::Duration;

use tempfile::TempDir;

use stormctl::cluster::{KillError, KillPolicy, KILL_ENTRYPOINT, LIST_ENTRYPOINT, SUBMIT_ENTRYPOINT};
use stormctl::config::EnvConfig;
use stormctl::hooks::{HookError, NoHooks, SubmitHooks};
use stormctl::mock::MockRunner;
use stormctl::sync::ConfiguredSync;
use stormctl::{
    Config, CommandOutput, PipelineError, SubmissionOption, SubmitArgs, SubmitPipeline,
};

const UBERJAR_OUTPUT: &str = "\
Compiling wordcount
Created /build/target/wordcount-0.1.0-standalone.jar
";

const ACTIVE_LISTING: &str = "wordcount  |  ACTIVE  |  3600  |  4";

/// Project fixture: a config and a lone topology definition on disk.
struct Fixture {
    _dir: TempDir,
    config: Config,
}

fn fixture(env_toml: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let specs = dir.path().join("topologies");
    fs::create_dir(&specs).expect("create topology_specs");
    fs::write(specs.join("wordcount.clj"), "(ns wordcount)").expect("write definition");

    let mut config = Config::parse(env_toml).expect("parse fixture config");
    config.topology_specs = specs;
    config.virtualenv_specs = dir.path().join("virtualenvs");
    Fixture { _dir: dir, config }
}

fn direct_env() -> &'static str {
    r#"
[envs.prod]
nimbus = "nimbus.example.com:6627"
use_ssh_for_nimbus = false
use_virtualenv = false
"#
}

fn default_args() -> SubmitArgs {
    SubmitArgs {
        name: None,
        env_name: "prod".to_string(),
        workers: 2,
        ackers: 1,
        options: Vec::new(),
        force: false,
        debug: false,
        wait: None,
    }
}

fn script_build(runner: &MockRunner) {
    runner.expect("lein clean", CommandOutput::ok(""));
    runner.expect("lein uberjar", CommandOutput::ok(UBERJAR_OUTPUT));
}

fn fast_kill_policy() -> KillPolicy {
    KillPolicy {
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 5,
    }
}

/// Hooks that count their invocations.
#[derive(Default)]
struct RecordingHooks {
    pre_calls: Cell<u32>,
    post_calls: Cell<u32>,
    fail_pre: bool,
}

impl SubmitHooks for RecordingHooks {
    fn pre_submit(&self, _name: &str, _env_name: &str, _env: &EnvConfig) -> Result<(), HookError> {
        self.pre_calls.set(self.pre_calls.get() + 1);
        if self.fail_pre {
            return Err(HookError::Failed {
                stage: "pre_submit",
                status: Some(1),
                stdout: String::new(),
                stderr: "hook rejected the deploy".to_string(),
            });
        }
        Ok(())
    }

    fn post_submit(&self, _name: &str, _env_name: &str, _env: &EnvConfig) -> Result<(), HookError> {
        self.post_calls.set(self.post_calls.get() + 1);
        Ok(())
    }
}

// =========================================================================
// Happy path
// =========================================================================

#[test]
fn test_submit_without_force_skips_kill_phase_entirely() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok("Finished submitting topology"));

    let hooks = RecordingHooks::default();
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(&fixture.config, &runner, &hooks, &sync)
        .with_kill_policy(fast_kill_policy());

    pipeline.run(&default_args()).expect("submission succeeds");

    // Build, then submit; with force off the listing is never consulted.
    assert_eq!(runner.calls_matching("lein clean"), 1);
    assert_eq!(runner.calls_matching("lein uberjar"), 1);
    assert_eq!(runner.calls_matching(LIST_ENTRYPOINT), 0);
    assert_eq!(runner.calls_matching(KILL_ENTRYPOINT), 0);
    assert_eq!(runner.calls_matching(SUBMIT_ENTRYPOINT), 1);

    assert_eq!(hooks.pre_calls.get(), 1);
    assert_eq!(hooks.post_calls.get(), 1);
}

#[test]
fn test_submit_command_carries_ordered_options_and_endpoint() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok(""));

    let args = SubmitArgs {
        options: vec![SubmissionOption::parse_cli("foo=bar").unwrap()],
        ..default_args()
    };
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    );
    pipeline.run(&args).expect("submission succeeds");

    let submit_line = runner
        .invocations()
        .iter()
        .map(|spec| spec.display_line())
        .find(|line| line.contains(SUBMIT_ENTRYPOINT))
        .expect("submit command ran");

    let workers_at = submit_line.find("--option topology.workers=2").unwrap();
    let ackers_at = submit_line
        .find("--option topology.acker.executors=1")
        .unwrap();
    let user_at = submit_line.find("--option foo=bar").unwrap();
    assert!(workers_at < ackers_at && ackers_at < user_at);

    assert!(submit_line.contains("--host nimbus.example.com"));
    assert!(submit_line.contains("--port 6627"));
    assert!(submit_line.contains("wordcount.clj"));
}

#[test]
fn test_submit_references_artifact_through_child_env_only() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok(""));

    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    );
    pipeline.run(&default_args()).expect("submission succeeds");

    let invocations = runner.invocations();
    let submit = invocations
        .iter()
        .find(|spec| spec.display_line().contains(SUBMIT_ENTRYPOINT))
        .expect("submit command ran");
    assert_eq!(submit.env.len(), 1);
    assert_eq!(submit.env[0].0, "JVM_OPTS");
    assert!(submit.env[0]
        .1
        .contains("-Dstorm.jar=/build/target/wordcount-0.1.0-standalone.jar"));

    // No parent-process environment mutation.
    assert!(std::env::var("JVM_OPTS").is_err());
}

// =========================================================================
// Forced replacement
// =========================================================================

#[test]
fn test_force_kills_running_topology_once_then_submits() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect_sequence(
        LIST_ENTRYPOINT,
        vec![
            CommandOutput::ok(ACTIVE_LISTING), // pre-kill check
            CommandOutput::ok(""),             // poll: gone
        ],
    );
    runner.expect(KILL_ENTRYPOINT, CommandOutput::ok(""));
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok(""));

    let args = SubmitArgs {
        force: true,
        wait: Some(30),
        ..default_args()
    };
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    )
    .with_kill_policy(fast_kill_policy());
    pipeline.run(&args).expect("forced submission succeeds");

    assert_eq!(runner.calls_matching(KILL_ENTRYPOINT), 1);
    assert_eq!(runner.calls_matching(SUBMIT_ENTRYPOINT), 1);

    // Kill happened before submit.
    let lines: Vec<String> = runner
        .invocations()
        .iter()
        .map(|spec| spec.display_line())
        .collect();
    let kill_at = lines.iter().position(|l| l.contains(KILL_ENTRYPOINT)).unwrap();
    let submit_at = lines
        .iter()
        .position(|l| l.contains(SUBMIT_ENTRYPOINT))
        .unwrap();
    assert!(kill_at < submit_at);
}

#[test]
fn test_force_with_stuck_topology_times_out() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(LIST_ENTRYPOINT, CommandOutput::ok(ACTIVE_LISTING));
    runner.expect(KILL_ENTRYPOINT, CommandOutput::ok(""));

    let args = SubmitArgs {
        force: true,
        ..default_args()
    };
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    )
    .with_kill_policy(fast_kill_policy());

    let err = pipeline.run(&args).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Kill(KillError::Timeout { .. })
    ));
    assert_eq!(err.exit_code(), 41);
    assert_eq!(runner.calls_matching(SUBMIT_ENTRYPOINT), 0);
}

// =========================================================================
// Failure ordering
// =========================================================================

#[test]
fn test_build_failure_aborts_before_any_cluster_call() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    runner.expect("lein clean", CommandOutput::ok(""));
    runner.expect("lein uberjar", CommandOutput::failed(1, "compilation failed"));

    let hooks = RecordingHooks::default();
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &hooks,
        &sync,
    );

    let err = pipeline.run(&default_args()).unwrap_err();
    assert!(matches!(err, PipelineError::Build(_)));
    assert_ne!(err.exit_code(), 0);

    assert_eq!(runner.calls_matching(LIST_ENTRYPOINT), 0);
    assert_eq!(runner.calls_matching(KILL_ENTRYPOINT), 0);
    assert_eq!(runner.calls_matching(SUBMIT_ENTRYPOINT), 0);
    // Pre-submit hooks precede the build; post-submit hooks never ran.
    assert_eq!(hooks.pre_calls.get(), 1);
    assert_eq!(hooks.post_calls.get(), 0);
}

#[test]
fn test_failing_pre_hook_aborts_before_build() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();

    let hooks = RecordingHooks {
        fail_pre: true,
        ..Default::default()
    };
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &hooks,
        &sync,
    );

    let err = pipeline.run(&default_args()).unwrap_err();
    assert!(matches!(err, PipelineError::Hook(_)));

    assert!(runner.invocations().is_empty());
    assert_eq!(hooks.post_calls.get(), 0);
}

#[test]
fn test_failed_submission_skips_post_hooks() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(
        SUBMIT_ENTRYPOINT,
        CommandOutput::failed(1, "topology already exists"),
    );

    let hooks = RecordingHooks::default();
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &hooks,
        &sync,
    );

    let err = pipeline.run(&default_args()).unwrap_err();
    assert!(matches!(err, PipelineError::Submission(_)));
    assert_eq!(err.exit_code(), 50);
    assert_eq!(hooks.post_calls.get(), 0);
}

// =========================================================================
// Virtualenv environments
// =========================================================================

#[test]
fn test_virtualenv_env_syncs_then_submits_with_python_path() {
    let fixture = fixture(
        r#"
[envs.prod]
nimbus = "nimbus.example.com:6627"
use_ssh_for_nimbus = false
virtualenv_root = "/data/venvs"
"#,
    );
    let runner = MockRunner::new();
    runner.expect("venv-sync", CommandOutput::ok(""));
    script_build(&runner);
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok(""));

    let sync = ConfiguredSync::new(&runner, Some(vec!["venv-sync".to_string()]));
    let pipeline = SubmitPipeline::new(&fixture.config, &runner, &NoHooks, &sync);
    pipeline.run(&default_args()).expect("submission succeeds");

    let lines: Vec<String> = runner
        .invocations()
        .iter()
        .map(|spec| spec.display_line())
        .collect();

    // Sync runs first, against the per-topology requirements file.
    assert!(lines[0].starts_with("venv-sync prod wordcount"));
    assert!(lines[0].ends_with("wordcount.txt"));

    let submit_line = lines
        .iter()
        .find(|l| l.contains(SUBMIT_ENTRYPOINT))
        .expect("submit command ran");
    assert!(submit_line
        .contains("--option 'topology.python.path=\"/data/venvs/wordcount/bin/python\"'"));
}

#[test]
fn test_failed_sync_aborts_before_build() {
    let fixture = fixture(
        r#"
[envs.prod]
nimbus = "nimbus.example.com:6627"
use_ssh_for_nimbus = false
virtualenv_root = "/data/venvs"
"#,
    );
    let runner = MockRunner::new();
    runner.expect("venv-sync", CommandOutput::failed(1, "pip install failed"));

    let sync = ConfiguredSync::new(&runner, Some(vec!["venv-sync".to_string()]));
    let pipeline = SubmitPipeline::new(&fixture.config, &runner, &NoHooks, &sync);

    let err = pipeline.run(&default_args()).unwrap_err();
    assert!(matches!(err, PipelineError::Sync(_)));
    assert_eq!(runner.calls_matching("lein"), 0);
}

// =========================================================================
// Configuration edges
// =========================================================================

#[test]
fn test_unknown_environment_fails_before_any_command() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    );

    let args = SubmitArgs {
        env_name: "staging".to_string(),
        ..default_args()
    };
    let err = pipeline.run(&args).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(runner.invocations().is_empty());
}

#[test]
fn test_missing_topology_definition_fails_early() {
    let fixture = fixture(direct_env());
    let runner = MockRunner::new();
    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    );

    let args = SubmitArgs {
        name: Some("linecount".to_string()),
        ..default_args()
    };
    let err = pipeline.run(&args).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(runner.invocations().is_empty());
}

#[test]
fn test_explicit_name_resolves_matching_definition() {
    let fixture = fixture(direct_env());
    let extra = fixture.config.topology_specs.join("pixelcount.clj");
    fs::write(extra, "(ns pixelcount)").expect("write second definition");

    let runner = MockRunner::new();
    script_build(&runner);
    runner.expect(SUBMIT_ENTRYPOINT, CommandOutput::ok(""));

    let sync = ConfiguredSync::new(&runner, None);
    let pipeline = SubmitPipeline::new(
        &fixture.config,
        &runner,
        &NoHooks,
        &sync,
    );
    let args = SubmitArgs {
        name: Some("pixelcount".to_string()),
        ..default_args()
    };
    pipeline.run(&args).expect("submission succeeds");

    let submit_line = runner
        .invocations()
        .iter()
        .map(|spec| spec.display_line())
        .find(|line| line.contains(SUBMIT_ENTRYPOINT))
        .expect("submit command ran");
    assert!(submit_line.contains("pixelcount.clj"));
}
