//! Lenient log-routing settings
//!
//! The `[envs.<name>.log]` table is forwarded to the running topology as
//! submission options. Values of the wrong type are skipped rather than
//! rejected, so a config that other tooling still reads keeps working;
//! the typed accessors below are the only way the rest of the crate sees
//! these fields.

use serde::Deserialize;

/// Log routing options, kept as raw TOML values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    path: Option<toml::Value>,
    max_bytes: Option<toml::Value>,
    backup_count: Option<toml::Value>,
    level: Option<toml::Value>,
}

impl LogSettings {
    /// Log directory on the workers, when set to a string
    pub fn path(&self) -> Option<&str> {
        self.path.as_ref().and_then(toml::Value::as_str)
    }

    /// Max log file size in bytes, when set to an integer
    pub fn max_bytes(&self) -> Option<i64> {
        self.max_bytes.as_ref().and_then(toml::Value::as_integer)
    }

    /// Rotated file count, when set to an integer
    pub fn backup_count(&self) -> Option<i64> {
        self.backup_count.as_ref().and_then(toml::Value::as_integer)
    }

    /// Log level, when set to a string; emitted lowercased
    pub fn level(&self) -> Option<&str> {
        self.level.as_ref().and_then(toml::Value::as_str)
    }
}
