//! Typed expression trees consumed and produced by the fix.
//!
//! Expressions arrive from the planner already resolved: every column
//! reference knows its owning table, its column index and its value type.
//! The same tree type is also the decoding target for a view's
//! JSON-encoded group-by expression list, so the serde representation
//! follows the catalog's upper-case key convention (`"TYPE"`,
//! `"TABLE_NAME"`, `"COLUMN_INDEX"`, ...).

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Declared value type of a column or constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    #[default]
    Invalid,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    String,
    Timestamp,
    VarBinary,
}

impl ValueType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ValueType::Invalid => "INVALID",
            ValueType::TinyInt => "TINYINT",
            ValueType::SmallInt => "SMALLINT",
            ValueType::Integer => "INTEGER",
            ValueType::BigInt => "BIGINT",
            ValueType::Float => "FLOAT",
            ValueType::Decimal => "DECIMAL",
            ValueType::String => "VARCHAR",
            ValueType::Timestamp => "TIMESTAMP",
            ValueType::VarBinary => "VARBINARY",
        }
    }
}

/// A resolved reference to a column of a base table or view.
///
/// Equality and hashing consider only `(table_name, column_name,
/// column_index)`. Alias, value type and size are carried along for the
/// output schema but never decide identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ColumnRef {
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub column_alias: String,
    #[serde(default)]
    pub column_index: usize,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub value_size: u32,
}

impl ColumnRef {
    pub fn new(table_name: &str, column_name: &str, column_index: usize) -> Self {
        ColumnRef {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            column_alias: column_name.to_string(),
            column_index,
            value_type: ValueType::Invalid,
            value_size: 0,
        }
    }

    pub fn with_type(mut self, value_type: ValueType, value_size: u32) -> Self {
        self.value_type = value_type;
        self.value_size = value_size;
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.column_alias = alias.to_string();
        self
    }
}

impl PartialEq for ColumnRef {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name
            && self.column_name == other.column_name
            && self.column_index == other.column_index
    }
}

impl Eq for ColumnRef {}

impl Hash for ColumnRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table_name.hash(state);
        self.column_name.hash(state);
        self.column_index.hash(state);
    }
}

/// Aggregate function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggFunc {
    Count,
    CountStar,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggFunc {
    /// Name of the aggregate function for SQL generation.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggFunc::Count | AggFunc::CountStar => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
            AggFunc::Avg => "AVG",
        }
    }

    /// The function that recombines per-partition partial results of this
    /// aggregate on the coordinator.
    ///
    /// Partial counts only add up, so `COUNT` and `COUNT(*)` recombine with
    /// `SUM`; `SUM`, `MIN` and `MAX` recombine with themselves. `AVG` has no
    /// recombination from partial averages alone and yields `None`.
    pub fn reaggregate(&self) -> Option<AggFunc> {
        match self {
            AggFunc::Count | AggFunc::CountStar | AggFunc::Sum => Some(AggFunc::Sum),
            AggFunc::Min => Some(AggFunc::Min),
            AggFunc::Max => Some(AggFunc::Max),
            AggFunc::Avg => None,
        }
    }

    /// Whether partial results of this aggregate can be combined with the
    /// same function on the coordinator.
    pub fn is_self_combining(&self) -> bool {
        matches!(self, AggFunc::Sum | AggFunc::Min | AggFunc::Max)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "<>",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArithOp {
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl ArithOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ArithOp::Plus => "+",
            ArithOp::Minus => "-",
            ArithOp::Multiply => "*",
            ArithOp::Divide => "/",
        }
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConjunctionOp {
    And,
    Or,
}

impl ConjunctionOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ConjunctionOp::And => "AND",
            ConjunctionOp::Or => "OR",
        }
    }
}

/// A resolved SQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "TYPE", rename_all_fields = "SCREAMING_SNAKE_CASE")]
pub enum Expr {
    /// A column reference.
    #[serde(rename = "VALUE_TUPLE")]
    Column(ColumnRef),
    /// A literal value, kept as SQL text.
    #[serde(rename = "VALUE_CONSTANT")]
    Constant {
        value: String,
        #[serde(default)]
        value_type: ValueType,
    },
    /// A statement parameter (`?`), by position.
    #[serde(rename = "VALUE_PARAMETER")]
    Parameter { index: usize },
    /// `left op right` for a comparison operator.
    #[serde(rename = "COMPARE")]
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `left op right` for an arithmetic operator.
    #[serde(rename = "OPERATOR")]
    Operator {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `left AND right` / `left OR right`.
    #[serde(rename = "CONJUNCTION")]
    Conjunction {
        op: ConjunctionOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `NOT operand`.
    #[serde(rename = "OPERATOR_NOT")]
    Not { operand: Box<Expr> },
    /// A scalar function call: `name(args...)`.
    #[serde(rename = "FUNCTION")]
    Function { name: String, args: Vec<Expr> },
    /// An aggregate call. `argument` is `None` for `COUNT(*)`.
    #[serde(rename = "AGGREGATE")]
    Aggregate {
        function: AggFunc,
        #[serde(default)]
        distinct: bool,
        #[serde(default)]
        argument: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn constant(value: &str, value_type: ValueType) -> Expr {
        Expr::Constant {
            value: value.to_string(),
            value_type,
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Conjunction {
            op: ConjunctionOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Conjunction {
            op: ConjunctionOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn aggregate(function: AggFunc, argument: Option<Expr>) -> Expr {
        Expr::Aggregate {
            function,
            distinct: false,
            argument: argument.map(Box::new),
        }
    }

    /// The column reference, if this expression is a plain column.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Expr::Column(col) => Some(col),
            _ => None,
        }
    }

    /// Convert expression back to SQL text.
    pub fn to_sql(&self) -> String {
        match self {
            Expr::Column(col) => format!("{}.{}", col.table_name, col.column_name),
            Expr::Constant { value, .. } => value.clone(),
            Expr::Parameter { index } => format!("?{index}"),
            Expr::Compare { op, left, right } => {
                format!("({} {} {})", left.to_sql(), op.sql(), right.to_sql())
            }
            Expr::Operator { op, left, right } => {
                format!("({} {} {})", left.to_sql(), op.sql(), right.to_sql())
            }
            Expr::Conjunction { op, left, right } => {
                format!("({} {} {})", left.to_sql(), op.sql(), right.to_sql())
            }
            Expr::Not { operand } => format!("(NOT {})", operand.to_sql()),
            Expr::Function { name, args } => {
                let arg_strs: Vec<String> = args.iter().map(|a| a.to_sql()).collect();
                format!("{name}({})", arg_strs.join(", "))
            }
            Expr::Aggregate {
                function,
                distinct,
                argument,
            } => {
                let distinct = if *distinct { "DISTINCT " } else { "" };
                match argument {
                    Some(arg) => format!("{}({distinct}{})", function.sql_name(), arg.to_sql()),
                    None => format!("{}(*)", function.sql_name()),
                }
            }
        }
    }

    /// Collect every column reference in this subtree, left to right.
    ///
    /// Duplicates are kept: `a.x = a.x + 1` yields `a.x` twice.
    pub fn base_column_refs(&self) -> Vec<&ColumnRef> {
        let mut refs = Vec::new();
        self.collect_column_refs(&mut refs);
        refs
    }

    fn collect_column_refs<'a>(&'a self, refs: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(col) => refs.push(col),
            Expr::Constant { .. } | Expr::Parameter { .. } => {}
            Expr::Compare { left, right, .. }
            | Expr::Operator { left, right, .. }
            | Expr::Conjunction { left, right, .. } => {
                left.collect_column_refs(refs);
                right.collect_column_refs(refs);
            }
            Expr::Not { operand } => operand.collect_column_refs(refs),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_column_refs(refs);
                }
            }
            Expr::Aggregate { argument, .. } => {
                if let Some(arg) = argument {
                    arg.collect_column_refs(refs);
                }
            }
        }
    }

    /// Split a predicate into its top-level AND conjuncts.
    ///
    /// Nested ANDs are flattened; OR, NOT and everything else is a single
    /// conjunct.
    pub fn into_conjuncts(self) -> Vec<Expr> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expr::Conjunction {
                    op: ConjunctionOp::And,
                    left,
                    right,
                } => {
                    // right first so the left conjunct pops first
                    stack.push(*right);
                    stack.push(*left);
                }
                other => out.push(other),
            }
        }
        out
    }
}

/// Split a predicate into its top-level AND conjuncts.
pub fn uncombine(expr: &Expr) -> Vec<Expr> {
    expr.clone().into_conjuncts()
}

/// AND together a list of conjuncts, left-deep. Empty input yields `None`.
pub fn combine(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::and)
}

/// Decode a JSON-encoded list of expressions, as stored for a view's
/// complex group-by definition.
pub fn decode_expression_list(json: &str) -> Result<Vec<Expr>, serde_json::Error> {
    serde_json::from_str(json)
}
