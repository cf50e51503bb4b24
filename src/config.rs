//! Settings that control the re-aggregation fix.
//!
//! The enclosing planner owns one [`FixConfig`] and hands it to each
//! [`MvFixContext`](crate::fix::MvFixContext). Settings can be loaded from
//! the `[mv_fix]`-style TOML table the planner keeps in its own config file:
//!
//! ```toml
//! enabled = true
//! edge_case_shortcut = true
//! shortcut_max_tables = 2
//! ```

use crate::error::{MvFixError, MvFixResult};
use serde::Deserialize;

/// Default for `shortcut_max_tables`: the view plus one joined table.
pub const DEFAULT_SHORTCUT_MAX_TABLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixConfig {
    /// Master switch. When off, no view scan is ever rewritten.
    ///
    /// Turning this off makes partitioned views return per-partition
    /// duplicates; it exists for diagnosing plans, not for production.
    pub enabled: bool,

    /// Whether to skip the fix for the restricted query shapes where the
    /// per-partition aggregates already equal the final answer.
    pub edge_case_shortcut: bool,

    /// Largest number of tables a statement may reference and still take
    /// the shortcut.
    pub shortcut_max_tables: usize,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            edge_case_shortcut: true,
            shortcut_max_tables: DEFAULT_SHORTCUT_MAX_TABLES,
        }
    }
}

impl FixConfig {
    /// Parse settings from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(doc: &str) -> MvFixResult<Self> {
        toml::from_str(doc).map_err(|e| MvFixError::InvalidConfig(e.to_string()))
    }

    /// Settings with the shortcut disabled: every qualifying view scan is
    /// rewritten.
    pub fn always_fix() -> Self {
        Self {
            edge_case_shortcut: false,
            ..Self::default()
        }
    }
}
