//! Plan tree nodes touched by the fix.
//!
//! Parents own their children (`Box<PlanNode>`). Nodes that are *inlined*
//! into another node (a scan's projection, the inner scan of a
//! nested-loop-index join) are held in dedicated fields and are never
//! children, so a child search cannot reach them.
//!
//! Every node carries a [`PlanNodeId`], unique within one plan, so that
//! other structures can point at a node without owning it.

use crate::error::{MvFixError, MvFixResult};
use crate::expr::{AggFunc, ColumnRef, Expr};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a plan node, unique within one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out plan node ids for one plan.
#[derive(Debug, Default)]
pub struct PlanNodeIdGen {
    next: u32,
}

impl PlanNodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue numbering after ids the planner already used.
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

// ── Output schemas ─────────────────────────────────────────────────────────

/// One output column of a plan node.
///
/// Equality and hashing use `(table_name, column_name, column_alias)`;
/// the expression producing the column is not part of its identity.
#[derive(Debug, Clone)]
pub struct SchemaColumn {
    pub table_name: String,
    pub column_name: String,
    pub column_alias: String,
    pub expression: Expr,
}

impl SchemaColumn {
    pub fn new(table_name: &str, column_name: &str, column_alias: &str, expression: Expr) -> Self {
        SchemaColumn {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            column_alias: column_alias.to_string(),
            expression,
        }
    }

    /// A schema column that passes `col` through unchanged.
    pub fn from_column_ref(col: &ColumnRef) -> Self {
        SchemaColumn {
            table_name: col.table_name.clone(),
            column_name: col.column_name.clone(),
            column_alias: col.column_alias.clone(),
            expression: Expr::Column(col.clone()),
        }
    }
}

impl PartialEq for SchemaColumn {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name
            && self.column_name == other.column_name
            && self.column_alias == other.column_alias
    }
}

impl Eq for SchemaColumn {}

impl Hash for SchemaColumn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table_name.hash(state);
        self.column_name.hash(state);
        self.column_alias.hash(state);
    }
}

/// Ordered output schema of a plan node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSchema {
    columns: Vec<SchemaColumn>,
}

impl NodeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column(&mut self, col: SchemaColumn) {
        self.columns.push(col);
    }

    /// Append `col` unless an equal column is already present. Returns
    /// whether it was added.
    pub fn add_if_absent(&mut self, col: SchemaColumn) -> bool {
        if self.contains(&col) {
            false
        } else {
            self.columns.push(col);
            true
        }
    }

    pub fn contains(&self, col: &SchemaColumn) -> bool {
        self.columns.contains(col)
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaColumn> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_aliases(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_alias.as_str()).collect()
    }
}

impl FromIterator<SchemaColumn> for NodeSchema {
    fn from_iter<I: IntoIterator<Item = SchemaColumn>>(iter: I) -> Self {
        NodeSchema {
            columns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a NodeSchema {
    type Item = &'a SchemaColumn;
    type IntoIter = std::slice::Iter<'a, SchemaColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

// ── Nodes ──────────────────────────────────────────────────────────────────

/// Sequential scan of a table or view.
#[derive(Debug, Clone)]
pub struct ScanNode {
    pub id: PlanNodeId,
    pub target_table: String,
    pub predicate: Option<Expr>,
    pub output_schema: NodeSchema,
    /// Projection evaluated inside the scan.
    pub inline_projection: Option<ProjectionNode>,
}

impl ScanNode {
    pub fn new(id: PlanNodeId, target_table: &str, output_schema: NodeSchema) -> Self {
        ScanNode {
            id,
            target_table: target_table.to_string(),
            predicate: None,
            output_schema,
            inline_projection: None,
        }
    }
}

/// Projection. `child` is `None` when the projection is inlined.
#[derive(Debug, Clone)]
pub struct ProjectionNode {
    pub id: PlanNodeId,
    pub output_schema: NodeSchema,
    pub child: Option<Box<PlanNode>>,
}

impl ProjectionNode {
    pub fn new(id: PlanNodeId, output_schema: NodeSchema) -> Self {
        ProjectionNode {
            id,
            output_schema,
            child: None,
        }
    }
}

/// One aggregate computed by a hash aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTerm {
    pub function: AggFunc,
    pub distinct: bool,
    /// Position of the result in the node's output schema.
    pub output_column: usize,
    pub input: Expr,
}

/// Hash aggregation with an optional HAVING-style post-predicate.
#[derive(Debug, Clone)]
pub struct AggregateNode {
    pub id: PlanNodeId,
    pub group_by: Vec<Expr>,
    pub aggregates: Vec<AggregateTerm>,
    /// Filter evaluated on aggregated rows.
    pub post_predicate: Option<Expr>,
    pub output_schema: NodeSchema,
    pub child: Option<Box<PlanNode>>,
}

impl AggregateNode {
    pub fn new(id: PlanNodeId) -> Self {
        AggregateNode {
            id,
            group_by: Vec::new(),
            aggregates: Vec::new(),
            post_predicate: None,
            output_schema: NodeSchema::new(),
            child: None,
        }
    }

    pub fn add_group_by_expression(&mut self, expr: Expr) {
        self.group_by.push(expr);
    }

    /// Add an aggregate over a plain column reference.
    ///
    /// Re-aggregation only ever recombines stored partial results, so any
    /// other input shape means the caller built the wrong node.
    pub fn add_aggregate(
        &mut self,
        function: AggFunc,
        distinct: bool,
        output_column: usize,
        input: Expr,
    ) -> MvFixResult<()> {
        if input.as_column().is_none() {
            return Err(MvFixError::internal(format!(
                "re-aggregation input must be a column reference, got {}",
                input.to_sql()
            )));
        }
        self.aggregates.push(AggregateTerm {
            function,
            distinct,
            output_column,
            input,
        });
        Ok(())
    }

    /// Set `child` and wrap as a plan node.
    pub fn with_child(mut self, child: PlanNode) -> PlanNode {
        self.child = Some(Box::new(child));
        PlanNode::HashAggregate(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
        }
    }
}

/// Nested-loop join of two child plans.
#[derive(Debug, Clone)]
pub struct NestLoopNode {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub predicate: Option<Expr>,
    pub outer: Box<PlanNode>,
    pub inner: Box<PlanNode>,
}

/// Nested-loop join probing an index; the inner scan is inlined.
#[derive(Debug, Clone)]
pub struct NestLoopIndexNode {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub predicate: Option<Expr>,
    pub outer: Box<PlanNode>,
    pub inline_scan: ScanNode,
}

/// Partition/coordinator boundary.
#[derive(Debug, Clone)]
pub struct ExchangeNode {
    pub id: PlanNodeId,
    pub child: Box<PlanNode>,
}

/// The plan tree.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Scan(ScanNode),
    Projection(ProjectionNode),
    HashAggregate(AggregateNode),
    NestLoop(NestLoopNode),
    NestLoopIndex(NestLoopIndexNode),
    /// Ships partition results to the coordinator.
    Send(ExchangeNode),
    /// Collects partition results on the coordinator.
    Receive(ExchangeNode),
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Scan(n) => n.id,
            PlanNode::Projection(n) => n.id,
            PlanNode::HashAggregate(n) => n.id,
            PlanNode::NestLoop(n) => n.id,
            PlanNode::NestLoopIndex(n) => n.id,
            PlanNode::Send(n) | PlanNode::Receive(n) => n.id,
        }
    }

    pub fn node_kind(&self) -> &'static str {
        match self {
            PlanNode::Scan(_) => "SEQSCAN",
            PlanNode::Projection(_) => "PROJECTION",
            PlanNode::HashAggregate(_) => "HASHAGGREGATE",
            PlanNode::NestLoop(_) => "NESTLOOP",
            PlanNode::NestLoopIndex(_) => "NESTLOOPINDEX",
            PlanNode::Send(_) => "SEND",
            PlanNode::Receive(_) => "RECEIVE",
        }
    }

    pub fn as_scan(&self) -> Option<&ScanNode> {
        match self {
            PlanNode::Scan(scan) => Some(scan),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateNode> {
        match self {
            PlanNode::HashAggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// Child nodes, outer before inner. Inlined nodes are not children.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Scan(_) => Vec::new(),
            PlanNode::Projection(ProjectionNode { child, .. })
            | PlanNode::HashAggregate(AggregateNode { child, .. }) => {
                child.iter().map(|c| c.as_ref()).collect()
            }
            PlanNode::NestLoop(n) => vec![n.outer.as_ref(), n.inner.as_ref()],
            PlanNode::NestLoopIndex(n) => vec![n.outer.as_ref()],
            PlanNode::Send(n) | PlanNode::Receive(n) => vec![n.child.as_ref()],
        }
    }

    /// Mutable child nodes, in the same order as [`PlanNode::children`].
    pub fn children_mut(&mut self) -> Vec<&mut PlanNode> {
        match self {
            PlanNode::Scan(_) => Vec::new(),
            PlanNode::Projection(ProjectionNode { child, .. })
            | PlanNode::HashAggregate(AggregateNode { child, .. }) => {
                child.iter_mut().map(|c| c.as_mut()).collect()
            }
            PlanNode::NestLoop(n) => vec![n.outer.as_mut(), n.inner.as_mut()],
            PlanNode::NestLoopIndex(n) => vec![n.outer.as_mut()],
            PlanNode::Send(n) | PlanNode::Receive(n) => vec![n.child.as_mut()],
        }
    }

    /// Find a node by id, searching children depth-first.
    pub fn find(&self, id: PlanNodeId) -> Option<&PlanNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    /// Render the tree, one node per line, children indented.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push_str(&format!("{} {}", self.node_kind(), self.id()));
        match self {
            PlanNode::Scan(scan) => {
                explain_scan_detail(out, scan);
                out.push('\n');
                if let Some(proj) = &scan.inline_projection {
                    explain_inline_projection(out, proj, depth + 1);
                }
            }
            PlanNode::Projection(proj) => {
                out.push_str(&format!(": {}\n", proj.output_schema.column_aliases().join(", ")));
            }
            PlanNode::HashAggregate(agg) => {
                let keys: Vec<String> = agg.group_by.iter().map(|e| e.to_sql()).collect();
                let aggs: Vec<String> = agg
                    .aggregates
                    .iter()
                    .map(|t| {
                        let alias = agg
                            .output_schema
                            .columns()
                            .get(t.output_column)
                            .map(|c| c.column_alias.as_str())
                            .unwrap_or("?");
                        format!("{}({}) AS {alias}", t.function.sql_name(), t.input.to_sql())
                    })
                    .collect();
                out.push_str(&format!(
                    " group by [{}] aggregates [{}]",
                    keys.join(", "),
                    aggs.join(", ")
                ));
                if let Some(pred) = &agg.post_predicate {
                    out.push_str(&format!(" having {}", pred.to_sql()));
                }
                out.push('\n');
            }
            PlanNode::NestLoop(n) => {
                out.push_str(&format!(" {}", n.join_type.as_str()));
                if let Some(pred) = &n.predicate {
                    out.push_str(&format!(" on {}", pred.to_sql()));
                }
                out.push('\n');
            }
            PlanNode::NestLoopIndex(n) => {
                out.push_str(&format!(" {}", n.join_type.as_str()));
                if let Some(pred) = &n.predicate {
                    out.push_str(&format!(" on {}", pred.to_sql()));
                }
                out.push('\n');
                out.push_str(&"  ".repeat(depth + 1));
                out.push_str(&format!("inline SEQSCAN {}", n.inline_scan.id));
                explain_scan_detail(out, &n.inline_scan);
                out.push('\n');
            }
            PlanNode::Send(_) | PlanNode::Receive(_) => out.push('\n'),
        }
        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
    }
}

fn explain_scan_detail(out: &mut String, scan: &ScanNode) {
    out.push_str(&format!(" on {}", scan.target_table));
    if let Some(pred) = &scan.predicate {
        out.push_str(&format!(" filter {}", pred.to_sql()));
    }
}

fn explain_inline_projection(out: &mut String, proj: &ProjectionNode, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "inline PROJECTION {}: {}\n",
        proj.id,
        proj.output_schema.column_aliases().join(", ")
    ));
}
