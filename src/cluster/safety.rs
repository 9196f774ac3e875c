//! Pre-submission safety check
//!
//! A topology name may be reused only once the cluster has fully let go
//! of the previous run: a topology that is ACTIVE, or KILLED but still
//! draining, blocks submission under the same name.

use regex_lite::Regex;

use crate::runner::{CommandError, CommandRunner};

use super::{Endpoint, NimbusClient};

/// Errors from the listing query backing the safety check
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("list command failed\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    CommandFailed { stdout: String, stderr: String },
}

/// Check whether `name` can be submitted right now.
///
/// Queries a fresh listing every call. A failed listing propagates as an
/// error; it is never treated as "safe".
pub fn is_safe_to_submit(
    runner: &dyn CommandRunner,
    name: &str,
    endpoint: &Endpoint,
) -> Result<bool, ListingError> {
    let listing = NimbusClient::new(runner).list_topologies(endpoint)?;
    Ok(!listing_blocks_submit(&listing, name))
}

/// True when the listing shows `name` as ACTIVE or KILLED (mid-removal).
pub fn listing_blocks_submit(listing: &str, name: &str) -> bool {
    // The name is escaped, so the pattern always compiles.
    let pattern = Regex::new(&format!(
        r"{}\s+\|\s+(ACTIVE|KILLED)\s+\|",
        regex_lite::escape(name)
    ))
    .unwrap();
    pattern.is_match(listing)
}
