//! Detection rules in the boolean condition language: parsing, config
//! resolution, and query compilation.

pub mod ast;
pub mod config;
pub mod evaluator;
mod lexer;
mod modifiers;
pub mod parser;
pub mod resolver;
pub mod rule;

pub use ast::{AggregationExpr, AggregationFunc, ComparisonOp, Condition, SearchExpr};
pub use config::{parse_config, Config, LogsourceMapping};
pub use evaluator::{CompileOutput, CompiledQuery, RuleEvaluator};
pub use parser::parse_condition;
pub use resolver::{resolve, Resolution};
pub use rule::{parse_rule, Detection, EventMatcher, FieldMatcher, Logsource, Rule, Search};
