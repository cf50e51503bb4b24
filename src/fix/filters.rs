//! Split join-tree predicates between the partitions and the
//! re-aggregation.
//!
//! A conjunct that reads a partial aggregate column of the view cannot be
//! evaluated per partition: it has to see the recombined value, so it
//! moves into the re-aggregation's post-predicate. Everything else stays
//! where it is and keeps being pushed down to the partitions.

use crate::expr::{ColumnRef, Expr, combine};
use crate::stmt::{JoinKind, JoinNode};
use tracing::trace;

/// Accumulates deferred conjuncts while the join tree is rewritten.
#[derive(Debug)]
pub(crate) struct FilterSplit<'a> {
    view: &'a str,
    reagg_columns: &'a [ColumnRef],
    deferred: Vec<Expr>,
    shortcut_safe: bool,
}

impl<'a> FilterSplit<'a> {
    pub fn new(view: &'a str, reagg_columns: &'a [ColumnRef]) -> Self {
        FilterSplit {
            view,
            reagg_columns,
            deferred: Vec::new(),
            shortcut_safe: true,
        }
    }

    /// False once any conjunct has been deferred. Never goes back to true.
    pub fn shortcut_safe(&self) -> bool {
        self.shortcut_safe
    }

    pub fn deferred(&self) -> &[Expr] {
        &self.deferred
    }

    /// The deferred conjuncts ANDed together, in the order they were found.
    pub fn into_post_predicate(self) -> Option<Expr> {
        combine(self.deferred)
    }

    /// Split one predicate. Returns what stays behind, `None` if nothing.
    pub fn split_predicate(&mut self, predicate: Option<Expr>) -> Option<Expr> {
        let predicate = predicate?;
        let mut retained = Vec::new();
        for conjunct in predicate.into_conjuncts() {
            if self.must_defer(&conjunct) {
                self.deferred.push(conjunct);
                self.shortcut_safe = false;
            } else {
                retained.push(conjunct);
            }
        }
        combine(retained)
    }

    fn must_defer(&self, conjunct: &Expr) -> bool {
        let refs = conjunct.base_column_refs();
        let reads_partial = refs.iter().any(|r| self.reagg_columns.contains(r));
        let single_table = refs.windows(2).all(|w| w[0].table_name == w[1].table_name);

        if single_table {
            let on_view = refs.first().is_some_and(|r| r.table_name == self.view);
            trace!(
                conjunct = %conjunct.to_sql(),
                on_view,
                defer = on_view && reads_partial,
                "single-table conjunct"
            );
            on_view && reads_partial
        } else {
            trace!(
                conjunct = %conjunct.to_sql(),
                defer = reads_partial,
                "cross-table conjunct"
            );
            reads_partial
        }
    }
}

/// Rewrite every predicate of `node`'s subtree, children first.
pub(crate) fn split_join_tree(node: &mut JoinNode, split: &mut FilterSplit<'_>) {
    if let JoinKind::Branch { left, right, .. } = &mut node.kind {
        split_join_tree(left, split);
        split_join_tree(right, split);
    }
    node.join_expr = split.split_predicate(node.join_expr.take());
    node.where_expr = split.split_predicate(node.where_expr.take());
}
