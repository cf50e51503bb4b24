//! Re-aggregation fix for scans of materialized views.
//!
//! A materialized view over a partitioned table is itself partitioned:
//! every partition maintains its own rows of the view, holding partial
//! aggregates of the rows that live there. Unless the view groups by the
//! partition column, the same group appears once per partition, and a
//! query reading the view sees each group several times.
//!
//! [`MvFixContext`] decides per view scan whether that matters and, if it
//! does, builds what the plan needs to recombine the partials on the
//! coordinator:
//!
//! 1. an inline projection for the view scan that also emits the view's
//!    grouping columns,
//! 2. a hash aggregate that groups by those columns and recombines each
//!    partial aggregate (`COUNT` partials with `SUM`, `SUM`/`MIN`/`MAX`
//!    partials with themselves),
//! 3. a split of the statement's predicates: conjuncts reading a partial
//!    aggregate run after the recombination as the hash aggregate's
//!    post-predicate, everything else stays with the partitions.
//!
//! The planner then splices the operators into its plan with
//! [`MvFixContext::splice`] (joins) or [`MvFixContext::place_over`]
//! (single-table queries).
//!
//! # Example
//!
//! ```
//! use mv_reagg::catalog::Catalog;
//! use mv_reagg::config::FixConfig;
//! use mv_reagg::expr::{AggFunc, ColumnRef, Expr};
//! use mv_reagg::fix::MvFixContext;
//! use mv_reagg::plan::{NodeSchema, PlanNodeIdGen, SchemaColumn};
//! use mv_reagg::stmt::{JoinNode, ParsedColInfo, ParsedSelectStmt};
//!
//! let catalog = Catalog::from_json(r#"[
//!     {"name": "orders", "partition_column": "customer_id",
//!      "columns": [{"name": "customer_id", "index": 0, "value_type": "INTEGER"},
//!                  {"name": "region", "index": 1, "value_type": "STRING"}],
//!      "views": {"v": {"group_by_columns": ["region"]}}},
//!     {"name": "v", "materializer": "orders",
//!      "columns": [{"name": "region", "index": 0, "value_type": "STRING"},
//!                  {"name": "n", "index": 1, "value_type": "BIGINT", "aggregate": "COUNT_STAR"}]}
//! ]"#)?;
//!
//! // SELECT region, COUNT(n) FROM v GROUP BY region
//! let region = ColumnRef::new("v", "region", 0);
//! let n = ColumnRef::new("v", "n", 1);
//! let mut stmt = ParsedSelectStmt::new(JoinNode::table("v"))
//!     .with_group_by(vec![ParsedColInfo::new("region", Expr::Column(region.clone()))])
//!     .with_display(vec![
//!         ParsedColInfo::new("region", Expr::Column(region.clone())),
//!         ParsedColInfo::new("n", Expr::aggregate(AggFunc::Count, Some(Expr::Column(n.clone())))),
//!     ]);
//! let mut required: NodeSchema = [&region, &n].into_iter().map(SchemaColumn::from_column_ref).collect();
//!
//! let mut ctx = MvFixContext::new(&catalog, FixConfig::default());
//! assert!(ctx.try_fix("v", &mut required, &mut stmt, &mut PlanNodeIdGen::new())?);
//! assert_eq!(ctx.group_by_count(), 1);
//! assert_eq!(ctx.reaggregation().unwrap().aggregates[0].function, AggFunc::Sum);
//! # Ok::<(), mv_reagg::error::MvFixError>(())
//! ```

mod assembler;
mod edge_case;
mod filters;
mod splice;

#[cfg(test)]
pub(crate) mod test_helpers;

use crate::catalog::{Catalog, MaterializedViewInfo};
use crate::config::FixConfig;
use crate::error::{MvFixError, MvFixResult};
use crate::expr::decode_expression_list;
use crate::plan::{AggregateNode, NodeSchema, PlanNode, PlanNodeId, PlanNodeIdGen, ProjectionNode};
use crate::stmt::ParsedSelectStmt;
use assembler::{ViewLayout, build_operators};
use filters::{FilterSplit, split_join_tree};
use tracing::{debug, warn};

/// Fix state for one candidate view scan.
///
/// Owns the built operators until they are spliced into the plan. The
/// located scan is remembered by id only.
#[derive(Debug)]
pub struct MvFixContext<'a> {
    catalog: &'a Catalog,
    config: FixConfig,
    needs_fix: bool,
    view_table: Option<String>,
    group_by_count: usize,
    inline_projection: Option<ProjectionNode>,
    reaggregation: Option<AggregateNode>,
    scan_node: Option<PlanNodeId>,
    edge_case_skip: bool,
}

impl<'a> MvFixContext<'a> {
    pub fn new(catalog: &'a Catalog, config: FixConfig) -> Self {
        MvFixContext {
            catalog,
            config,
            needs_fix: false,
            view_table: None,
            group_by_count: 0,
            inline_projection: None,
            reaggregation: None,
            scan_node: None,
            edge_case_skip: true,
        }
    }

    /// Decide whether the scan of `view_name` needs re-aggregation and, if
    /// so, build the operators for it.
    ///
    /// `required_columns` is the list of columns the scan must produce. On
    /// `Ok(true)` it has the view's grouping columns appended where
    /// missing, and the join tree of `stmt` has every conjunct that reads a
    /// partial aggregate removed (those now form the re-aggregation's
    /// post-predicate). On `Ok(false)` neither argument is modified.
    pub fn try_fix(
        &mut self,
        view_name: &str,
        required_columns: &mut NodeSchema,
        stmt: &mut ParsedSelectStmt,
        ids: &mut PlanNodeIdGen,
    ) -> MvFixResult<bool> {
        if !self.config.enabled {
            debug!(view = view_name, reason = "disabled", "no re-aggregation");
            return Ok(false);
        }
        if let Some(bound) = &self.view_table {
            return Err(MvFixError::internal(format!(
                "fix context for view {bound} reused for view {view_name}"
            )));
        }

        let catalog = self.catalog;
        let view = catalog.require_table(view_name)?;
        let Some(source) = catalog.materializer_of(view)? else {
            debug!(view = view_name, reason = "not a materialized view", "no re-aggregation");
            return Ok(false);
        };
        let Some(partition_column) = source.partition_column.as_deref() else {
            debug!(view = view_name, reason = "source not partitioned", "no re-aggregation");
            return Ok(false);
        };
        let info = catalog.view_info(source, view)?;
        let Some(group_by_count) = grouping_term_count(view_name, info, partition_column)? else {
            debug!(
                view = view_name,
                reason = "grouped by partition column",
                partition_column,
                "no re-aggregation"
            );
            return Ok(false);
        };
        if group_by_count == 0 {
            return Err(MvFixError::internal(format!(
                "view {view_name} has no group-by terms"
            )));
        }

        let layout = ViewLayout::from_view(view, group_by_count)?;
        let mut columns = required_columns.clone();
        layout.add_missing_grouping(&mut columns);
        let (projection, mut reagg) = build_operators(&columns, &layout, ids)?;

        let mut join_tree = stmt.join_tree.clone();
        let mut split = FilterSplit::new(view_name, &layout.aggregates);
        split_join_tree(&mut join_tree, &mut split);
        let shortcut_safe = split.shortcut_safe();
        let deferred = split.deferred().len();
        reagg.post_predicate = split.into_post_predicate();

        self.view_table = Some(view_name.to_string());
        self.group_by_count = group_by_count;
        self.edge_case_skip = shortcut_safe;

        if self.config.edge_case_shortcut
            && edge_case::no_fix_needed(stmt, &layout, shortcut_safe, self.config.shortcut_max_tables)
        {
            debug!(view = view_name, reason = "partials already final", "no re-aggregation");
            return Ok(false);
        }

        debug!(
            view = view_name,
            group_by_count,
            scan_columns = columns.len(),
            deferred,
            "re-aggregation required"
        );
        *required_columns = columns;
        stmt.join_tree = join_tree;
        self.inline_projection = Some(projection);
        self.reaggregation = Some(reagg);
        self.needs_fix = true;
        Ok(true)
    }

    /// Whether the last `try_fix` decided a fix is needed.
    pub fn needed(&self) -> bool {
        self.needs_fix
    }

    pub fn view_table_name(&self) -> Option<&str> {
        self.view_table.as_deref()
    }

    pub fn group_by_count(&self) -> usize {
        self.group_by_count
    }

    /// The projection to inline into the view scan, until spliced.
    pub fn inline_projection(&self) -> Option<&ProjectionNode> {
        self.inline_projection.as_ref()
    }

    /// The re-aggregation node, until taken.
    pub fn reaggregation(&self) -> Option<&AggregateNode> {
        self.reaggregation.as_ref()
    }

    /// Hand the re-aggregation node over, ready to pass to [`splice`](Self::splice).
    pub fn take_reaggregation(&mut self) -> Option<PlanNode> {
        self.reaggregation.take().map(PlanNode::HashAggregate)
    }

    /// The view scan the projection was spliced into.
    pub fn scan_node(&self) -> Option<PlanNodeId> {
        self.scan_node
    }

    /// False once predicate splitting has ruled out the shortcut.
    pub fn edge_case_skip(&self) -> bool {
        self.edge_case_skip
    }
}

/// Number of group-by terms of the view, or `None` when the view groups by
/// the partition column (every group then lives on a single partition).
///
/// Only plain column references among the terms are compared with the
/// partition column.
fn grouping_term_count(
    view_name: &str,
    info: &MaterializedViewInfo,
    partition_column: &str,
) -> MvFixResult<Option<usize>> {
    if info.has_complex_group_by() {
        let terms = decode_expression_list(&info.group_by_expressions_json).map_err(|e| {
            MvFixError::MalformedGroupBy {
                view: view_name.to_string(),
                reason: e.to_string(),
            }
        })?;
        let mut plain_columns = terms.iter().filter_map(|t| t.as_column()).peekable();
        if plain_columns.peek().is_none() {
            warn!(
                view = view_name,
                terms = terms.len(),
                "view groups by expressions only; partition column check skipped"
            );
        }
        if plain_columns.any(|c| c.column_name == partition_column) {
            return Ok(None);
        }
        return Ok(Some(terms.len()));
    }

    if info.group_by_columns.iter().any(|c| c == partition_column) {
        return Ok(None);
    }
    Ok(Some(info.group_by_columns.len()))
}
