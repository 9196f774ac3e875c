//! Topology listing interpretation
//!
//! The list command prints one pipe-separated row per topology:
//!
//! ```text
//! wordcount  |  ACTIVE  |  3600  |  4
//! ```
//!
//! Rows are re-parsed on every query. Topology state is never cached
//! across polls; a stale verdict is worse than an extra list call.

use serde::Serialize;

/// State of a named topology, derived from a fresh listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopologyState {
    /// Not present in the listing
    Absent,
    /// Running
    Active,
    /// Kill issued, still draining off the cluster
    KilledPendingRemoval,
}

impl TopologyState {
    /// True while the topology still occupies its name on the cluster
    pub fn blocks_submission(&self) -> bool {
        !matches!(self, TopologyState::Absent)
    }
}

/// One parsed listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub name: String,
    pub status: String,
    /// Remaining columns, site-specific (uptime, workers, ...)
    pub extra: Vec<String>,
}

/// Parse the raw listing into rows, skipping anything that is not a
/// pipe-separated data line (headers, rules, blank lines).
pub fn parse_listing(text: &str) -> Vec<ListingRow> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let mut columns = line.split('|').map(str::trim);
        let (Some(name), Some(status)) = (columns.next(), columns.next()) else {
            continue;
        };
        if name.is_empty() || status.is_empty() {
            continue;
        }
        // Horizontal rules between header and data.
        if name.chars().all(|c| c == '-' || c == '+') {
            continue;
        }
        // Header rows name the columns rather than a topology.
        if name.eq_ignore_ascii_case("topology") || name.eq_ignore_ascii_case("topology_name") {
            continue;
        }
        rows.push(ListingRow {
            name: name.to_string(),
            status: status.to_string(),
            extra: columns.map(str::to_string).collect(),
        });
    }
    rows
}

/// Derive the state of one topology from the raw listing
pub fn state_of(text: &str, name: &str) -> TopologyState {
    for row in parse_listing(text) {
        if row.name != name {
            continue;
        }
        match row.status.as_str() {
            "ACTIVE" => return TopologyState::Active,
            "KILLED" => return TopologyState::KilledPendingRemoval,
            _ => continue,
        }
    }
    TopologyState::Absent
}
