//! Read-only catalog snapshot consumed by the fix.
//!
//! A [`Catalog`] holds the tables visible to one statement compilation.
//! Each materialized view names the source table it is maintained from
//! (its *materializer*); the source table carries the partition column and
//! the view definition, keyed by view name.
//!
//! Snapshots are plain data and deserialize from JSON, which is how tests
//! and tools feed catalogs without a running cluster.

use crate::error::{MvFixError, MvFixResult};
use crate::expr::{AggFunc, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared position of the column within its table.
    pub index: usize,
    pub value_type: ValueType,
    #[serde(default)]
    pub size: u32,
    /// For a materialized view column, the aggregate that produces it.
    /// `None` for grouping columns and for ordinary table columns.
    #[serde(default)]
    pub aggregate: Option<AggFunc>,
}

/// Definition of a materialized view, stored on its source table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedViewInfo {
    /// Simple group-by: names of source columns, in key order.
    #[serde(default)]
    pub group_by_columns: Vec<String>,
    /// Complex group-by: JSON-encoded expression list. Empty when the view
    /// groups by plain columns only.
    #[serde(default)]
    pub group_by_expressions_json: String,
}

impl MaterializedViewInfo {
    /// Whether the view groups by arbitrary expressions.
    pub fn has_complex_group_by(&self) -> bool {
        !self.group_by_expressions_json.trim().is_empty()
    }
}

/// A table or materialized view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Partition column name; `None` for replicated tables.
    #[serde(default)]
    pub partition_column: Option<String>,
    /// Source table name, for materialized views.
    #[serde(default)]
    pub materializer: Option<String>,
    /// Views maintained from this table, keyed by view name.
    #[serde(default)]
    pub views: BTreeMap<String, MaterializedViewInfo>,
}

impl Table {
    pub fn is_materialized_view(&self) -> bool {
        self.materializer.is_some()
    }

    /// Columns ordered by declared index.
    pub fn sorted_columns(&self) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.index);
        cols
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Immutable set of tables for one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of tables.
    pub fn with_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Catalog {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Load a catalog snapshot from its JSON encoding.
    pub fn from_json(json: &str) -> MvFixResult<Self> {
        let tables: Vec<Table> = serde_json::from_str(json)
            .map_err(|e| MvFixError::InvalidCatalog(e.to_string()))?;
        Ok(Self::with_tables(tables))
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Look up a table that must exist.
    pub fn require_table(&self, name: &str) -> MvFixResult<&Table> {
        self.table(name)
            .ok_or_else(|| MvFixError::NotFound(format!("table {name}")))
    }

    /// The source table of a materialized view, or `None` when `view` is
    /// an ordinary table.
    pub fn materializer_of(&self, view: &Table) -> MvFixResult<Option<&Table>> {
        match &view.materializer {
            Some(source) => self.require_table(source).map(Some),
            None => Ok(None),
        }
    }

    /// The definition of `view` as stored on its source table.
    pub fn view_info<'a>(
        &self,
        source: &'a Table,
        view: &Table,
    ) -> MvFixResult<&'a MaterializedViewInfo> {
        source.views.get(&view.name).ok_or_else(|| {
            MvFixError::NotFound(format!(
                "definition of view {} on table {}",
                view.name, source.name
            ))
        })
    }
}
