//! Kill-then-poll phase
//!
//! Replacing a running topology is a two-step dance: ask the cluster to
//! kill it, then poll the listing until the name is actually free. The
//! kill command returning says nothing about completion. The poll is
//! bounded; a cluster that never releases the name surfaces as a timeout
//! instead of an endless wait.

use std::time::Duration;

use crate::runner::{CommandError, CommandRunner};

use super::safety::{is_safe_to_submit, ListingError};
use super::{Endpoint, NimbusClient};

/// Poll pacing and bound for the kill-wait loop
#[derive(Debug, Clone, Copy)]
pub struct KillPolicy {
    /// Delay between listing polls
    pub poll_interval: Duration,

    /// Maximum number of polls before giving up
    pub max_poll_attempts: u32,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_attempts: 120,
        }
    }
}

/// Errors from the kill phase
#[derive(Debug, thiserror::Error)]
pub enum KillError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("kill command for topology '{name}' failed\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    CommandFailed {
        name: String,
        stdout: String,
        stderr: String,
    },

    #[error("topology '{name}' still listed after {attempts} polls; giving up")]
    Timeout { name: String, attempts: u32 },
}

/// Clear the way for a submission under `name`.
///
/// Without `force` this never issues a kill, whatever the cluster shows.
/// With `force`, a present topology is killed exactly once (with the
/// cluster-side `wait` budget) and the listing is polled until the name
/// is free or the policy's attempt bound runs out.
pub fn kill_existing_if_unsafe(
    runner: &dyn CommandRunner,
    name: &str,
    force: bool,
    wait: Option<u64>,
    endpoint: &Endpoint,
    policy: KillPolicy,
) -> Result<(), KillError> {
    if !force {
        return Ok(());
    }
    if is_safe_to_submit(runner, name, endpoint)? {
        return Ok(());
    }

    println!("Killing current \"{}\" topology.", name);
    NimbusClient::new(runner).kill_topology(name, wait, endpoint)?;

    wait_until_absent(runner, name, endpoint, policy)?;
    println!("Killed.");
    Ok(())
}

/// Poll the listing until `name` no longer blocks submission.
pub fn wait_until_absent(
    runner: &dyn CommandRunner,
    name: &str,
    endpoint: &Endpoint,
    policy: KillPolicy,
) -> Result<(), KillError> {
    for _ in 0..policy.max_poll_attempts {
        if is_safe_to_submit(runner, name, endpoint)? {
            return Ok(());
        }
        println!("Waiting for topology {} to quit...", name);
        std::thread::sleep(policy.poll_interval);
    }
    Err(KillError::Timeout {
        name: name.to_string(),
        attempts: policy.max_poll_attempts,
    })
}
