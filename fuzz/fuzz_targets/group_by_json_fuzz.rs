//! Fuzz target for view group-by expression decoding.
//!
//! Feeds arbitrary text to the decoder, both directly and as the stored
//! definition of a view that a query then scans. Decoding may fail; it
//! must never panic, and a failure must surface as `MalformedGroupBy`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mv_reagg::catalog::{Catalog, Column, MaterializedViewInfo, Table};
use mv_reagg::config::FixConfig;
use mv_reagg::error::MvFixError;
use mv_reagg::expr::{AggFunc, ValueType, decode_expression_list};
use mv_reagg::fix::MvFixContext;
use mv_reagg::plan::{NodeSchema, PlanNodeIdGen};
use mv_reagg::stmt::{JoinNode, ParsedSelectStmt};
use std::collections::BTreeMap;

fn column(name: &str, index: usize, aggregate: Option<AggFunc>) -> Column {
    Column {
        name: name.to_string(),
        index,
        value_type: ValueType::BigInt,
        size: 8,
        aggregate,
    }
}

fn catalog(group_by_json: &str) -> Catalog {
    let mut views = BTreeMap::new();
    views.insert(
        "v".to_string(),
        MaterializedViewInfo {
            group_by_columns: Vec::new(),
            group_by_expressions_json: group_by_json.to_string(),
        },
    );
    let source = Table {
        name: "t".to_string(),
        columns: vec![column("p", 0, None), column("g", 1, None)],
        partition_column: Some("p".to_string()),
        materializer: None,
        views,
    };
    let view = Table {
        name: "v".to_string(),
        columns: vec![column("g", 0, None), column("n", 1, Some(AggFunc::CountStar))],
        partition_column: None,
        materializer: Some("t".to_string()),
        views: BTreeMap::new(),
    };
    Catalog::with_tables([source, view])
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let decoded = decode_expression_list(text);
    if let Ok(exprs) = &decoded {
        for expr in exprs {
            let _ = expr.to_sql();
            let _ = expr.base_column_refs();
        }
    }

    let catalog = catalog(text);
    let mut ctx = MvFixContext::new(&catalog, FixConfig::always_fix());
    let mut stmt = ParsedSelectStmt::new(JoinNode::table("v"));
    let result = ctx.try_fix("v", &mut NodeSchema::new(), &mut stmt, &mut PlanNodeIdGen::new());

    if text.trim().is_empty() {
        return;
    }
    if decoded.is_err() {
        assert!(matches!(result, Err(MvFixError::MalformedGroupBy { .. })));
    }
});
