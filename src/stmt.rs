//! Resolved SELECT statement as handed over by query normalization.
//!
//! Only the parts the fix reads are modelled: the join tree (whose
//! predicates the filter splitter rewrites in place), the referenced
//! tables, the GROUP BY list and the display (select) list.

use crate::expr::Expr;
use crate::plan::JoinType;

/// One entry of the GROUP BY or display list.
///
/// Two entries are equal when their expressions are equal; alias and
/// naming are presentation only.
#[derive(Debug, Clone)]
pub struct ParsedColInfo {
    pub alias: String,
    pub column_name: String,
    pub table_name: String,
    pub expression: Expr,
}

impl ParsedColInfo {
    pub fn new(alias: &str, expression: Expr) -> Self {
        let (table_name, column_name) = match expression.as_column() {
            Some(col) => (col.table_name.clone(), col.column_name.clone()),
            None => (String::new(), alias.to_string()),
        };
        ParsedColInfo {
            alias: alias.to_string(),
            column_name,
            table_name,
            expression,
        }
    }
}

impl PartialEq for ParsedColInfo {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

/// Leaf or branch of the join tree.
#[derive(Debug, Clone)]
pub enum JoinKind {
    Table {
        name: String,
        alias: String,
    },
    Branch {
        join_type: JoinType,
        left: Box<JoinNode>,
        right: Box<JoinNode>,
    },
}

/// A join tree node with its predicates.
///
/// `join_expr` is the ON condition (or, for a single-table leaf, the
/// WHERE clause after normalization). `where_expr` holds filters that must
/// run after an outer join and is `None` for inner joins.
#[derive(Debug, Clone)]
pub struct JoinNode {
    pub kind: JoinKind,
    pub join_expr: Option<Expr>,
    pub where_expr: Option<Expr>,
}

impl JoinNode {
    pub fn table(name: &str) -> Self {
        JoinNode {
            kind: JoinKind::Table {
                name: name.to_string(),
                alias: name.to_string(),
            },
            join_expr: None,
            where_expr: None,
        }
    }

    pub fn branch(join_type: JoinType, left: JoinNode, right: JoinNode) -> Self {
        JoinNode {
            kind: JoinKind::Branch {
                join_type,
                left: Box::new(left),
                right: Box::new(right),
            },
            join_expr: None,
            where_expr: None,
        }
    }

    pub fn with_join_expr(mut self, expr: Expr) -> Self {
        self.join_expr = Some(expr);
        self
    }

    pub fn with_where_expr(mut self, expr: Expr) -> Self {
        self.where_expr = Some(expr);
        self
    }

    /// Table names of the leaves, left to right.
    pub fn table_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_table_names(&mut names);
        names
    }

    fn collect_table_names(&self, names: &mut Vec<String>) {
        match &self.kind {
            JoinKind::Table { name, .. } => names.push(name.clone()),
            JoinKind::Branch { left, right, .. } => {
                left.collect_table_names(names);
                right.collect_table_names(names);
            }
        }
    }
}

/// A resolved SELECT.
#[derive(Debug, Clone)]
pub struct ParsedSelectStmt {
    pub join_tree: JoinNode,
    /// Every table the statement references, one entry per occurrence.
    pub table_list: Vec<String>,
    pub group_by_columns: Vec<ParsedColInfo>,
    pub display_columns: Vec<ParsedColInfo>,
    /// Whether GROUP BY contains anything other than plain columns.
    pub has_complex_group_by: bool,
}

impl ParsedSelectStmt {
    /// A statement over `join_tree` with empty select and group-by lists.
    /// The table list is taken from the join tree leaves.
    pub fn new(join_tree: JoinNode) -> Self {
        let table_list = join_tree.table_names();
        ParsedSelectStmt {
            join_tree,
            table_list,
            group_by_columns: Vec::new(),
            display_columns: Vec::new(),
            has_complex_group_by: false,
        }
    }

    pub fn with_group_by(mut self, cols: Vec<ParsedColInfo>) -> Self {
        self.has_complex_group_by = cols.iter().any(|c| c.expression.as_column().is_none());
        self.group_by_columns = cols;
        self
    }

    pub fn with_display(mut self, cols: Vec<ParsedColInfo>) -> Self {
        self.display_columns = cols;
        self
    }
}
