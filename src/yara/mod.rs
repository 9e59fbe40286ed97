//! Externally parsed rules: a typed expression AST, config parsing, and
//! query compilation.

pub mod ast;
pub mod config;
pub mod evaluator;
mod modifiers;
mod serializer;

pub use ast::{
    BinaryOp, BytesSequence, Expression, HexToken, IdentifierItem, Iterable, Keyword, Meta,
    MetaValue, OfSet, Quantifier, RegexLiteral, Rule, RuleSet, StringDef, StringModifiers,
    StringSetItem, StringValue, UnaryOp,
};
pub use config::{parse_config, Config};
pub use evaluator::{CompileOutput, RuleEvaluator};
