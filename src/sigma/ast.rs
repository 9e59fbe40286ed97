//! Typed AST for the Sigma condition mini-language.
//!
//! Conditions are parsed into closed sum types so every evaluator is forced
//! to handle every node kind at compile time; there is no "unhandled node
//! type" failure mode at runtime.

use std::fmt;

/// One parsed line of a rule's `condition` field.
///
/// Holds the boolean search expression and an optional aggregation clause.
/// The raw condition text is retained for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub search: SearchExpr,
    pub aggregation: Option<AggregationExpr>,
    /// The condition string this was parsed from.
    pub source: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.aggregation {
            Some(agg) => write!(f, "{} | {}", self.search, agg),
            None => write!(f, "{}", self.search),
        }
    }
}

/// A boolean search expression over named searches.
///
/// Pattern and `them` variants are resolved against the rule's search-name
/// set at evaluation time, never at parse time; the search set may not be
/// known while the condition is being parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchExpr {
    And(Vec<SearchExpr>),
    Or(Vec<SearchExpr>),
    Not(Box<SearchExpr>),
    Identifier(String),
    OneOfIdentifier(String),
    AllOfIdentifier(String),
    OneOfPattern(String),
    AllOfPattern(String),
    OneOfThem,
    AllOfThem,
}

impl fmt::Display for SearchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchExpr::And(nodes) => write_joined(f, nodes, " and "),
            SearchExpr::Or(nodes) => write_joined(f, nodes, " or "),
            SearchExpr::Not(expr) => write!(f, "not {expr}"),
            SearchExpr::Identifier(name) => write!(f, "{name}"),
            SearchExpr::OneOfIdentifier(name) => write!(f, "1 of {name}"),
            SearchExpr::AllOfIdentifier(name) => write!(f, "all of {name}"),
            SearchExpr::OneOfPattern(pattern) => write!(f, "1 of {pattern}"),
            SearchExpr::AllOfPattern(pattern) => write!(f, "all of {pattern}"),
            SearchExpr::OneOfThem => write!(f, "1 of them"),
            SearchExpr::AllOfThem => write!(f, "all of them"),
        }
    }
}

/// A single-element list renders as its sole child; longer lists are
/// parenthesized.
fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[SearchExpr], sep: &str) -> fmt::Result {
    if nodes.len() == 1 {
        return write!(f, "{}", nodes[0]);
    }
    write!(f, "(")?;
    for (idx, node) in nodes.iter().enumerate() {
        if idx > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{node}")?;
    }
    write!(f, ")")
}

/// The six relational operators accepted after an aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanEqual => ">=",
        };
        write!(f, "{op}")
    }
}

/// An aggregation clause following the `|` in a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationExpr {
    Comparison {
        func: AggregationFunc,
        op: ComparisonOp,
        threshold: f64,
    },
    /// Parsed but unsupported at evaluation; compiling it must fail rather
    /// than silently drop the clause.
    Near(SearchExpr),
}

impl fmt::Display for AggregationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationExpr::Comparison {
                func,
                op,
                threshold,
            } => write!(f, "{func} {op} {threshold}"),
            AggregationExpr::Near(condition) => write!(f, "near {condition}"),
        }
    }
}

/// Aggregation functions. `field` and `group_by` are empty when absent,
/// mirroring the rule document syntax (`count() by user`).
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationFunc {
    Count { field: String, group_by: String },
    Min { field: String, group_by: String },
    Max { field: String, group_by: String },
    Avg { field: String, group_by: String },
    Sum { field: String, group_by: String },
}

impl AggregationFunc {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            AggregationFunc::Count { .. } => "count",
            AggregationFunc::Min { .. } => "min",
            AggregationFunc::Max { .. } => "max",
            AggregationFunc::Avg { .. } => "avg",
            AggregationFunc::Sum { .. } => "sum",
        }
    }

    pub(crate) fn field(&self) -> &str {
        match self {
            AggregationFunc::Count { field, .. }
            | AggregationFunc::Min { field, .. }
            | AggregationFunc::Max { field, .. }
            | AggregationFunc::Avg { field, .. }
            | AggregationFunc::Sum { field, .. } => field,
        }
    }

    pub(crate) fn group_by(&self) -> &str {
        match self {
            AggregationFunc::Count { group_by, .. }
            | AggregationFunc::Min { group_by, .. }
            | AggregationFunc::Max { group_by, .. }
            | AggregationFunc::Avg { group_by, .. }
            | AggregationFunc::Sum { group_by, .. } => group_by,
        }
    }
}

impl fmt::Display for AggregationFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.field())?;
        if !self.group_by().is_empty() {
            write!(f, " by {}", self.group_by())?;
        }
        Ok(())
    }
}
