//! Scripted command runner for tests
//!
//! [`MockRunner`] stands in for the real shell: tests register canned
//! outputs keyed by a substring of the rendered command line, and every
//! invocation is recorded so tests can assert on ordering and arguments.
//! An unscripted command yields a distinctive non-zero exit instead of
//! touching the host system.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::runner::{CommandError, CommandOutput, CommandRunner, CommandSpec};

struct Rule {
    needle: String,
    responses: VecDeque<CommandOutput>,
}

#[derive(Default)]
struct Inner {
    rules: Vec<Rule>,
    invocations: Vec<CommandSpec>,
}

/// In-process command runner with scripted responses
#[derive(Default)]
pub struct MockRunner {
    inner: Mutex<Inner>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for every command whose rendered line contains
    /// `needle`. Rules are matched in registration order.
    pub fn expect(&self, needle: impl Into<String>, response: CommandOutput) {
        self.expect_sequence(needle, vec![response]);
    }

    /// Script successive responses for a command: the first match pops the
    /// first response and so on; the final response repeats. This is how
    /// tests model a listing that changes between polls.
    pub fn expect_sequence(&self, needle: impl Into<String>, responses: Vec<CommandOutput>) {
        let mut inner = self.inner.lock().expect("mock runner lock");
        inner.rules.push(Rule {
            needle: needle.into(),
            responses: responses.into(),
        });
    }

    /// All commands run so far, in order
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.inner.lock().expect("mock runner lock").invocations.clone()
    }

    /// Number of invocations whose rendered line contains `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.inner
            .lock()
            .expect("mock runner lock")
            .invocations
            .iter()
            .filter(|spec| spec.display_line().contains(needle))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let line = spec.display_line();
        let mut inner = self.inner.lock().expect("mock runner lock");
        inner.invocations.push(spec.clone());

        for rule in &mut inner.rules {
            if line.contains(&rule.needle) {
                let response = if rule.responses.len() > 1 {
                    rule.responses
                        .pop_front()
                        .unwrap_or_else(|| CommandOutput::failed(127, "mock rule exhausted"))
                } else {
                    rule.responses
                        .front()
                        .cloned()
                        .unwrap_or_else(|| CommandOutput::failed(127, "mock rule exhausted"))
                };
                return Ok(response);
            }
        }

        Ok(CommandOutput::failed(
            127,
            format!("no mock response configured for: {}", line),
        ))
    }
}
