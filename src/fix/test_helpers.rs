//! Shared builders for fix unit tests.
//!
//! The default fixture is an `orders` table partitioned on `customer_id`
//! with a view `v_region` grouping by `region`:
//!
//! | index | column | aggregate  |
//! |-------|--------|------------|
//! | 0     | region | (grouping) |
//! | 1     | cnt    | COUNT(*)   |
//! | 2     | total  | SUM        |
//! | 3     | lo     | MIN        |
//!
//! plus an unpartitioned `customers(customer_id, region, tier)` table for
//! joins.

use crate::catalog::{Catalog, Column, MaterializedViewInfo, Table};
use crate::expr::{AggFunc, ColumnRef, CompareOp, Expr, ValueType};
use crate::plan::{
    ExchangeNode, JoinType, NestLoopNode, NodeSchema, PlanNode, PlanNodeIdGen, ScanNode,
    SchemaColumn,
};
use crate::stmt::{JoinNode, ParsedColInfo, ParsedSelectStmt};
use std::collections::BTreeMap;

pub const SOURCE: &str = "orders";
pub const VIEW: &str = "v_region";
pub const OTHER: &str = "customers";

const REGION_VIEW_COLUMNS: &[(&str, Option<AggFunc>)] = &[
    ("region", None),
    ("cnt", Some(AggFunc::CountStar)),
    ("total", Some(AggFunc::Sum)),
    ("lo", Some(AggFunc::Min)),
];

// ── Catalog builders ────────────────────────────────────────────────────

fn column(name: &str, index: usize, aggregate: Option<AggFunc>) -> Column {
    Column {
        name: name.to_string(),
        index,
        value_type: ValueType::BigInt,
        size: 8,
        aggregate,
    }
}

fn table(name: &str, cols: &[&str]) -> Table {
    Table {
        name: name.to_string(),
        columns: cols
            .iter()
            .enumerate()
            .map(|(i, c)| column(c, i, None))
            .collect(),
        partition_column: None,
        materializer: None,
        views: BTreeMap::new(),
    }
}

/// Catalog with `orders`, `customers` and a view `v_region` whose columns
/// are `view_cols` in declared order.
pub fn build_catalog(
    partition: Option<&str>,
    group_by: &[&str],
    group_by_json: &str,
    view_cols: &[(&str, Option<AggFunc>)],
) -> Catalog {
    let mut source = table(SOURCE, &["order_id", "customer_id", "region", "amount"]);
    source.partition_column = partition.map(str::to_string);
    source.views.insert(
        VIEW.to_string(),
        MaterializedViewInfo {
            group_by_columns: group_by.iter().map(|c| c.to_string()).collect(),
            group_by_expressions_json: group_by_json.to_string(),
        },
    );

    let view = Table {
        name: VIEW.to_string(),
        columns: view_cols
            .iter()
            .enumerate()
            .map(|(i, (name, agg))| column(name, i, *agg))
            .collect(),
        partition_column: None,
        materializer: Some(SOURCE.to_string()),
        views: BTreeMap::new(),
    };

    Catalog::with_tables([source, view, table(OTHER, &["customer_id", "region", "tier"])])
}

/// The default fixture.
pub fn region_catalog() -> Catalog {
    build_catalog(Some("customer_id"), &["region"], "", REGION_VIEW_COLUMNS)
}

/// Default fixture with the view's aggregate columns replaced.
pub fn catalog_with_view_aggregates(
    group_by: &[&str],
    aggs: &[(&str, Option<AggFunc>)],
) -> Catalog {
    let mut cols: Vec<(&str, Option<AggFunc>)> = group_by.iter().map(|g| (*g, None)).collect();
    cols.extend_from_slice(aggs);
    build_catalog(Some("customer_id"), group_by, "", &cols)
}

// ── Expression / schema builders ────────────────────────────────────────

/// Reference to a column of the default view, with its declared index.
pub fn view_col(name: &str) -> ColumnRef {
    let idx = REGION_VIEW_COLUMNS
        .iter()
        .position(|(c, _)| *c == name)
        .unwrap_or_else(|| panic!("no column {name} on {VIEW}"));
    ColumnRef::new(VIEW, name, idx).with_type(ValueType::BigInt, 8)
}

pub fn other_col(name: &str, idx: usize) -> ColumnRef {
    ColumnRef::new(OTHER, name, idx).with_type(ValueType::BigInt, 8)
}

pub fn view_expr(name: &str) -> Expr {
    Expr::Column(view_col(name))
}

pub fn view_schema(names: &[&str]) -> NodeSchema {
    names
        .iter()
        .map(|n| SchemaColumn::from_column_ref(&view_col(n)))
        .collect()
}

pub fn int(v: i64) -> Expr {
    Expr::constant(&v.to_string(), ValueType::BigInt)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::compare(CompareOp::Equal, left, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    Expr::compare(CompareOp::GreaterThan, left, right)
}

pub fn agg(function: AggFunc, arg: Expr) -> Expr {
    Expr::aggregate(function, Some(arg))
}

pub fn info(alias: &str, expr: Expr) -> ParsedColInfo {
    ParsedColInfo::new(alias, expr)
}

// ── Statement builders ──────────────────────────────────────────────────

/// `SELECT region, <f>(<col>) FROM v_region [WHERE ...] GROUP BY region`.
pub fn grouped_view_stmt(function: AggFunc, col: &str, filter: Option<Expr>) -> ParsedSelectStmt {
    let mut leaf = JoinNode::table(VIEW);
    leaf.join_expr = filter;
    ParsedSelectStmt::new(leaf)
        .with_group_by(vec![info("region", view_expr("region"))])
        .with_display(vec![
            info("region", view_expr("region")),
            info(col, agg(function, view_expr(col))),
        ])
}

/// `SELECT ... FROM v_region JOIN customers ON <on>`.
pub fn join_stmt(on: Expr) -> ParsedSelectStmt {
    let tree = JoinNode::branch(JoinType::Inner, JoinNode::table(VIEW), JoinNode::table(OTHER))
        .with_join_expr(on);
    ParsedSelectStmt::new(tree).with_display(vec![
        info("region", view_expr("region")),
        info("tier", Expr::Column(other_col("tier", 2))),
    ])
}

// ── Plan builders ───────────────────────────────────────────────────────

pub fn view_scan(ids: &mut PlanNodeIdGen) -> PlanNode {
    PlanNode::Scan(ScanNode::new(ids.next_id(), VIEW, view_schema(&["region", "cnt"])))
}

pub fn other_scan(ids: &mut PlanNodeIdGen) -> PlanNode {
    let schema = ["customer_id", "region", "tier"]
        .iter()
        .enumerate()
        .map(|(i, c)| SchemaColumn::from_column_ref(&other_col(c, i)))
        .collect();
    PlanNode::Scan(ScanNode::new(ids.next_id(), OTHER, schema))
}

/// `RECEIVE <- SEND <- NESTLOOP(view scan, customers scan)`.
pub fn join_plan(ids: &mut PlanNodeIdGen) -> PlanNode {
    let outer = view_scan(ids);
    let inner = other_scan(ids);
    let join = PlanNode::NestLoop(NestLoopNode {
        id: ids.next_id(),
        join_type: JoinType::Inner,
        predicate: None,
        outer: Box::new(outer),
        inner: Box::new(inner),
    });
    exchange(ids, join)
}

/// `RECEIVE <- SEND <- view scan`.
pub fn single_table_plan(ids: &mut PlanNodeIdGen) -> PlanNode {
    let scan = view_scan(ids);
    exchange(ids, scan)
}

pub fn exchange(ids: &mut PlanNodeIdGen, partition_side: PlanNode) -> PlanNode {
    let send = PlanNode::Send(ExchangeNode {
        id: ids.next_id(),
        child: Box::new(partition_side),
    });
    PlanNode::Receive(ExchangeNode {
        id: ids.next_id(),
        child: Box::new(send),
    })
}
