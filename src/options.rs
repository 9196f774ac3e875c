//! Submission option assembly
//!
//! The submit command accepts repeated `--option` arguments. Their order
//! is meaningful to operators reading the generated command line, so the
//! builder emits a deterministic sequence: parallelism first, then the
//! interpreter path, then log routing, then user options verbatim.
//! Duplicate keys are passed through untouched; the cluster owns their
//! semantics.

use crate::config::EnvConfig;

/// Marker for user options that must reach the cluster as string
/// literals. Kept for compatibility with configs written against the
/// previous deployment tooling; the structured [`SubmissionOption::Pair`]
/// flag is what the builder actually honors.
const QUOTED_KEY_MARKER: &str = "deployment_stage";

/// A single `--option` value for the submit command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOption {
    /// Passed through exactly as the operator wrote it
    Raw(String),

    /// Structured option; with `quote_as_string` the value is wrapped in
    /// double quotes so the submit command reads it as a string literal
    /// instead of a bare token
    Pair {
        key: String,
        value: String,
        quote_as_string: bool,
    },
}

impl SubmissionOption {
    /// Unquoted `key=value` option
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        SubmissionOption::Pair {
            key: key.into(),
            value: value.into(),
            quote_as_string: false,
        }
    }

    /// `key="value"` option, value quoted as a string literal
    pub fn quoted(key: impl Into<String>, value: impl Into<String>) -> Self {
        SubmissionOption::Pair {
            key: key.into(),
            value: value.into(),
            quote_as_string: true,
        }
    }

    /// Parse an operator-supplied `--option` token.
    ///
    /// Options whose key carries the legacy string-literal marker must be
    /// `key=value` form and come back quoted; anything else passes through
    /// raw, untouched.
    pub fn parse_cli(raw: &str) -> Result<Self, OptionFormatError> {
        if raw.contains(QUOTED_KEY_MARKER) {
            let (key, value) = raw.split_once('=').ok_or_else(|| OptionFormatError {
                raw: raw.to_string(),
            })?;
            return Ok(SubmissionOption::quoted(key, value));
        }
        Ok(SubmissionOption::Raw(raw.to_string()))
    }

    /// Render the option as passed to the submit command
    pub fn render(&self) -> String {
        match self {
            SubmissionOption::Raw(raw) => raw.clone(),
            SubmissionOption::Pair {
                key,
                value,
                quote_as_string: true,
            } => format!("{}=\"{}\"", key, value),
            SubmissionOption::Pair {
                key,
                value,
                quote_as_string: false,
            } => format!("{}={}", key, value),
        }
    }
}

/// Malformed operator-supplied option
#[derive(Debug, thiserror::Error)]
#[error("option '{raw}' must have key=value form")]
pub struct OptionFormatError {
    pub raw: String,
}

/// Apply `--par` as the default for whichever of workers/ackers the
/// operator did not set explicitly.
pub fn resolve_parallelism(par: u32, workers: Option<u32>, ackers: Option<u32>) -> (u32, u32) {
    (workers.unwrap_or(par), ackers.unwrap_or(par))
}

/// Assemble the full ordered option list for one submission.
pub fn build_submission_options(
    topology_name: &str,
    env: &EnvConfig,
    workers: u32,
    ackers: u32,
    user_options: &[SubmissionOption],
) -> Vec<SubmissionOption> {
    let mut options = vec![
        SubmissionOption::pair("topology.workers", workers.to_string()),
        SubmissionOption::pair("topology.acker.executors", ackers.to_string()),
    ];

    if let Some(python_path) = env.python_path(topology_name) {
        options.push(SubmissionOption::quoted("topology.python.path", python_path));
    }

    if let Some(path) = env.log.path().or(env.log_path.as_deref()) {
        options.push(SubmissionOption::quoted("streamparse.log.path", path));
    }
    if let Some(max_bytes) = env.log.max_bytes() {
        options.push(SubmissionOption::pair(
            "streamparse.log.max_bytes",
            max_bytes.to_string(),
        ));
    }
    if let Some(backup_count) = env.log.backup_count() {
        options.push(SubmissionOption::pair(
            "streamparse.log.backup_count",
            backup_count.to_string(),
        ));
    }
    if let Some(level) = env.log.level() {
        options.push(SubmissionOption::quoted(
            "streamparse.log.level",
            level.to_lowercase(),
        ));
    }

    options.extend(user_options.iter().cloned());
    options
}
