//! Query shapes for which the unfixed plan already returns the right
//! answer.
//!
//! If a query groups by (a subset of) the view's own grouping columns and
//! applies to each partial aggregate the very function that recombines
//! it, the query's own aggregation performs the re-aggregation. `SUM` of
//! partial sums, `MIN` of partial minimums and `MAX` of partial maximums
//! are exact; partial counts are not, since the query would count rows
//! instead of adding them up.

use super::assembler::ViewLayout;
use crate::expr::Expr;
use crate::stmt::ParsedSelectStmt;

/// Whether the fix can be skipped for `stmt`.
///
/// `shortcut_safe` is the filter splitter's verdict: once any predicate had
/// to move behind the re-aggregation, the shortcut is off.
pub(crate) fn no_fix_needed(
    stmt: &ParsedSelectStmt,
    layout: &ViewLayout,
    shortcut_safe: bool,
    max_tables: usize,
) -> bool {
    if stmt.has_complex_group_by || stmt.table_list.len() > max_tables || !shortcut_safe {
        return false;
    }

    for gcol in &stmt.group_by_columns {
        let Some(col) = gcol.expression.as_column() else {
            return false;
        };
        if col.table_name == layout.view_name && !layout.grouping.contains(col) {
            return false;
        }
    }

    stmt.display_columns
        .iter()
        .filter(|dcol| !stmt.group_by_columns.contains(dcol))
        .all(|dcol| recombines_itself(&dcol.expression, layout))
}

fn recombines_itself(expr: &Expr, layout: &ViewLayout) -> bool {
    let Expr::Aggregate {
        function,
        distinct,
        argument: Some(arg),
    } = expr
    else {
        return false;
    };
    let Some(col) = arg.as_column() else {
        return false;
    };
    if col.table_name != layout.view_name {
        return true;
    }
    // DISTINCT would collapse equal partials from different partitions.
    function.is_self_combining()
        && !*distinct
        && layout.reaggregate_type(&col.column_name) == Some(*function)
}
