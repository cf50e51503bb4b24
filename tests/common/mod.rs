//! Shared fixtures for integration tests.
//!
//! The catalog models a sales schema:
//!
//! - `sales(sale_id, store_id, product, region, qty)`, partitioned on
//!   `store_id`, maintaining
//!   - `v_product(product, region, n, units, cheapest, priciest)` grouped by
//!     `(product, region)`,
//!   - `v_store(store_id, n)` grouped by the partition column,
//!   - `v_bucket(product, qty_bucket, n)` grouped by an expression list;
//! - `products(product, category)`, replicated;
//! - `stock(item, qty)`, replicated, maintaining `v_stock(item, total)`.

#![allow(dead_code)]

use mv_reagg::catalog::Catalog;
use mv_reagg::expr::{AggFunc, ColumnRef, CompareOp, Expr, ValueType};
use mv_reagg::plan::{
    ExchangeNode, JoinType, NestLoopNode, NodeSchema, PlanNode, PlanNodeIdGen, ScanNode,
    SchemaColumn,
};
use mv_reagg::stmt::{JoinNode, ParsedColInfo, ParsedSelectStmt};

pub const VIEW: &str = "v_product";

pub const CATALOG_JSON: &str = r#"[
    {
        "name": "sales",
        "partition_column": "store_id",
        "columns": [
            {"name": "sale_id", "index": 0, "value_type": "BIGINT", "size": 8},
            {"name": "store_id", "index": 1, "value_type": "INTEGER", "size": 4},
            {"name": "product", "index": 2, "value_type": "STRING", "size": 64},
            {"name": "region", "index": 3, "value_type": "STRING", "size": 16},
            {"name": "qty", "index": 4, "value_type": "INTEGER", "size": 4}
        ],
        "views": {
            "v_product": {"group_by_columns": ["product", "region"]},
            "v_store": {"group_by_columns": ["store_id"]},
            "v_bucket": {"group_by_expressions_json": "[{\"TYPE\":\"VALUE_TUPLE\",\"TABLE_NAME\":\"sales\",\"COLUMN_NAME\":\"product\",\"COLUMN_INDEX\":2},{\"TYPE\":\"OPERATOR\",\"OP\":\"DIVIDE\",\"LEFT\":{\"TYPE\":\"VALUE_TUPLE\",\"TABLE_NAME\":\"sales\",\"COLUMN_NAME\":\"qty\",\"COLUMN_INDEX\":4},\"RIGHT\":{\"TYPE\":\"VALUE_CONSTANT\",\"VALUE\":\"10\",\"VALUE_TYPE\":\"INTEGER\"}}]"}
        }
    },
    {
        "name": "v_product",
        "materializer": "sales",
        "columns": [
            {"name": "product", "index": 0, "value_type": "STRING", "size": 64},
            {"name": "region", "index": 1, "value_type": "STRING", "size": 16},
            {"name": "n", "index": 2, "value_type": "BIGINT", "size": 8, "aggregate": "COUNT_STAR"},
            {"name": "units", "index": 3, "value_type": "BIGINT", "size": 8, "aggregate": "SUM"},
            {"name": "cheapest", "index": 4, "value_type": "INTEGER", "size": 4, "aggregate": "MIN"},
            {"name": "priciest", "index": 5, "value_type": "INTEGER", "size": 4, "aggregate": "MAX"}
        ]
    },
    {
        "name": "v_store",
        "materializer": "sales",
        "columns": [
            {"name": "store_id", "index": 0, "value_type": "INTEGER", "size": 4},
            {"name": "n", "index": 1, "value_type": "BIGINT", "size": 8, "aggregate": "COUNT_STAR"}
        ]
    },
    {
        "name": "v_bucket",
        "materializer": "sales",
        "columns": [
            {"name": "product", "index": 0, "value_type": "STRING", "size": 64},
            {"name": "qty_bucket", "index": 1, "value_type": "INTEGER", "size": 4},
            {"name": "n", "index": 2, "value_type": "BIGINT", "size": 8, "aggregate": "COUNT"}
        ]
    },
    {
        "name": "products",
        "columns": [
            {"name": "product", "index": 0, "value_type": "STRING", "size": 64},
            {"name": "category", "index": 1, "value_type": "STRING", "size": 32}
        ]
    },
    {
        "name": "stock",
        "columns": [
            {"name": "item", "index": 0, "value_type": "STRING", "size": 64},
            {"name": "qty", "index": 1, "value_type": "INTEGER", "size": 4}
        ],
        "views": {"v_stock": {"group_by_columns": ["item"]}}
    },
    {
        "name": "v_stock",
        "materializer": "stock",
        "columns": [
            {"name": "item", "index": 0, "value_type": "STRING", "size": 64},
            {"name": "total", "index": 1, "value_type": "BIGINT", "size": 8, "aggregate": "SUM"}
        ]
    }
]"#;

/// Aggregate columns of `v_product`, in declared order.
pub const AGGREGATE_COLUMNS: &[&str] = &["n", "units", "cheapest", "priciest"];

pub fn catalog() -> Catalog {
    Catalog::from_json(CATALOG_JSON).expect("fixture catalog")
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Columns and expressions ───────────────────────────────────────────────

/// Column of `v_product` with its declared index.
pub fn vcol(name: &str) -> ColumnRef {
    let idx = ["product", "region", "n", "units", "cheapest", "priciest"]
        .iter()
        .position(|c| *c == name)
        .unwrap_or_else(|| panic!("no column {name} on {VIEW}"));
    ColumnRef::new(VIEW, name, idx)
}

pub fn vexpr(name: &str) -> Expr {
    Expr::Column(vcol(name))
}

pub fn products_col(name: &str) -> ColumnRef {
    let idx = if name == "product" { 0 } else { 1 };
    ColumnRef::new("products", name, idx)
}

pub fn lit(v: i64) -> Expr {
    Expr::constant(&v.to_string(), ValueType::BigInt)
}

pub fn cmp(op: CompareOp, left: Expr, right: Expr) -> Expr {
    Expr::compare(op, left, right)
}

pub fn agg(function: AggFunc, arg: Expr) -> Expr {
    Expr::aggregate(function, Some(arg))
}

pub fn col_info(expr: Expr) -> ParsedColInfo {
    let alias = expr
        .as_column()
        .map(|c| c.column_name.clone())
        .unwrap_or_else(|| expr.to_sql());
    ParsedColInfo::new(&alias, expr)
}

/// Scan columns for `names` of `v_product`.
pub fn scan_columns(names: &[&str]) -> NodeSchema {
    names
        .iter()
        .map(|n| SchemaColumn::from_column_ref(&vcol(n)))
        .collect()
}

// ── Statements ────────────────────────────────────────────────────────────

/// `SELECT product, <f>(<col>) FROM v_product [WHERE filter] GROUP BY product`.
pub fn grouped_query(function: AggFunc, col: &str, filter: Option<Expr>) -> ParsedSelectStmt {
    let mut leaf = JoinNode::table(VIEW);
    leaf.join_expr = filter;
    ParsedSelectStmt::new(leaf)
        .with_group_by(vec![col_info(vexpr("product"))])
        .with_display(vec![col_info(vexpr("product")), col_info(agg(function, vexpr(col)))])
}

/// `SELECT v_product.product, category FROM v_product JOIN products ON <on>`.
pub fn join_query(on: Expr) -> ParsedSelectStmt {
    let tree = JoinNode::branch(JoinType::Inner, JoinNode::table(VIEW), JoinNode::table("products"))
        .with_join_expr(on);
    ParsedSelectStmt::new(tree).with_display(vec![
        col_info(vexpr("product")),
        col_info(Expr::Column(products_col("category"))),
    ])
}

// ── Plans ─────────────────────────────────────────────────────────────────

pub fn scan(ids: &mut PlanNodeIdGen, table: &str, columns: NodeSchema) -> PlanNode {
    PlanNode::Scan(ScanNode::new(ids.next_id(), table, columns))
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

/// `RECEIVE <- SEND <- SEQSCAN v_product`.
pub fn single_table_plan(ids: &mut PlanNodeIdGen, columns: &[&str]) -> PlanNode {
    let scan = scan(ids, VIEW, scan_columns(columns));
    exchange(ids, scan)
}

/// `RECEIVE <- SEND <- NESTLOOP(SEQSCAN v_product, SEQSCAN products)`.
pub fn join_plan(ids: &mut PlanNodeIdGen, columns: &[&str]) -> PlanNode {
    let outer = scan(ids, VIEW, scan_columns(columns));
    let products: NodeSchema = ["product", "category"]
        .iter()
        .map(|c| SchemaColumn::from_column_ref(&products_col(c)))
        .collect();
    let inner = scan(ids, "products", products);
    let join = PlanNode::NestLoop(NestLoopNode {
        id: ids.next_id(),
        join_type: JoinType::Inner,
        predicate: None,
        outer: Box::new(outer),
        inner: Box::new(inner),
    });
    exchange(ids, join)
}
