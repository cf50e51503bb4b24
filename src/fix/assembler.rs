//! View column classification and construction of the two operators the
//! fix injects: the scan's inline projection and the coordinator-side
//! re-aggregation.

use crate::catalog::Table;
use crate::error::{MvFixError, MvFixResult};
use crate::expr::{AggFunc, ColumnRef};
use crate::plan::{AggregateNode, NodeSchema, PlanNodeIdGen, ProjectionNode, SchemaColumn};
use std::collections::HashMap;

/// The view's columns split into grouping keys and partial aggregates.
///
/// The first `group_by_count` columns by declared index are the grouping
/// keys; every later column holds a per-partition partial aggregate.
#[derive(Debug, Clone)]
pub(crate) struct ViewLayout {
    pub view_name: String,
    pub grouping: Vec<ColumnRef>,
    pub aggregates: Vec<ColumnRef>,
    reagg_types: HashMap<String, AggFunc>,
}

impl ViewLayout {
    pub fn from_view(view: &Table, group_by_count: usize) -> MvFixResult<Self> {
        let columns = view.sorted_columns();
        if columns.len() < group_by_count {
            return Err(MvFixError::internal(format!(
                "view {} has {} columns but {} group-by terms",
                view.name,
                columns.len(),
                group_by_count
            )));
        }

        let mut grouping = Vec::with_capacity(group_by_count);
        let mut aggregates = Vec::with_capacity(columns.len() - group_by_count);
        let mut reagg_types = HashMap::new();

        for (i, col) in columns.into_iter().enumerate() {
            let col_ref = ColumnRef::new(&view.name, &col.name, i).with_type(col.value_type, col.size);
            if i < group_by_count {
                grouping.push(col_ref);
                continue;
            }
            let reagg = col
                .aggregate
                .and_then(|f| f.reaggregate())
                .ok_or_else(|| MvFixError::UnsupportedAggregate(format!("{}.{}", view.name, col.name)))?;
            reagg_types.insert(col.name.clone(), reagg);
            aggregates.push(col_ref);
        }

        Ok(ViewLayout {
            view_name: view.name.clone(),
            grouping,
            aggregates,
            reagg_types,
        })
    }

    /// Function that recombines partial results of view column `name`.
    pub fn reaggregate_type(&self, name: &str) -> Option<AggFunc> {
        self.reagg_types.get(name).copied()
    }

    /// Whether `col` reads one of the view's grouping columns.
    pub fn is_grouping(&self, col: &SchemaColumn) -> bool {
        col.table_name == self.view_name
            && self.grouping.iter().any(|g| g.column_name == col.column_name)
    }

    /// Append every grouping column `columns` does not already read.
    /// Returns how many were added.
    pub fn add_missing_grouping(&self, columns: &mut NodeSchema) -> usize {
        let mut added = 0;
        for g in &self.grouping {
            let present = columns
                .iter()
                .any(|c| c.table_name == g.table_name && c.column_name == g.column_name);
            if !present {
                columns.add_column(SchemaColumn::from_column_ref(g));
                added += 1;
            }
        }
        added
    }
}

/// Build the inline projection and the re-aggregation node over the
/// finalized scan column list.
///
/// Both operators produce `columns` in the same order, so consumers above
/// the view scan see the same names and aliases as before the rewrite.
pub(crate) fn build_operators(
    columns: &NodeSchema,
    layout: &ViewLayout,
    ids: &mut PlanNodeIdGen,
) -> MvFixResult<(ProjectionNode, AggregateNode)> {
    let projection = ProjectionNode::new(ids.next_id(), columns.clone());
    let mut reagg = AggregateNode::new(ids.next_id());

    for (output_column, col) in columns.iter().enumerate() {
        if layout.is_grouping(col) {
            reagg.add_group_by_expression(col.expression.clone());
        } else {
            let function = layout
                .reaggregate_type(&col.column_name)
                .filter(|_| col.table_name == layout.view_name)
                .ok_or_else(|| {
                    MvFixError::internal(format!(
                        "scan column {}.{} has no reaggregate type on view {}",
                        col.table_name, col.column_name, layout.view_name
                    ))
                })?;
            reagg.add_aggregate(function, false, output_column, col.expression.clone())?;
        }
        reagg.output_schema.add_column(col.clone());
    }

    Ok((projection, reagg))
}
