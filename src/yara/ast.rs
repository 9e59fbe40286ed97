//! Typed AST for externally parsed rule expressions.
//!
//! Callers construct this tree (for example from a YARA-style rule parser)
//! and hand it to the evaluator. Every node kind is a closed enum, so the
//! serializer handles each one exhaustively at compile time.

/// A set of rules compiled together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub imports: Vec<String>,
    pub rules: Vec<Rule>,
}

/// One rule: metadata, string definitions, and a condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub identifier: String,
    pub tags: Vec<String>,
    pub global: bool,
    pub private: bool,
    pub meta: Vec<Meta>,
    pub strings: Vec<StringDef>,
    pub condition: Expression,
}

/// A `meta:` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub key: String,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Number(i64),
    Boolean(bool),
}

/// A `strings:` entry. The identifier is stored without the `$` sigil.
#[derive(Debug, Clone, PartialEq)]
pub struct StringDef {
    pub identifier: String,
    pub value: StringValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringValue {
    Text {
        text: String,
        modifiers: StringModifiers,
    },
    Hex(Vec<HexToken>),
    Regex(RegexLiteral),
}

/// Modifier flags on a text string definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringModifiers {
    pub nocase: bool,
    pub ascii: bool,
    pub wide: bool,
    pub fullword: bool,
    /// XOR key range. `Some((0, 255))` is the unparameterized form;
    /// `Some((k, k))` is a single key.
    pub xor: Option<(u8, u8)>,
    pub base64: bool,
    pub base64wide: bool,
    /// Custom base64 alphabet, if one was given.
    pub base64_alphabet: Option<String>,
}

/// A regex literal with its flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegexLiteral {
    pub text: String,
    pub case_insensitive: bool,
    pub dot_all: bool,
}

/// One token of a hex string pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum HexToken {
    Bytes(BytesSequence),
    /// `[n]`, `[n-m]`, `[n-]`, or `[-m]`.
    Jump {
        start: Option<u64>,
        end: Option<u64>,
    },
    /// `( A | B | ... )`.
    Alternative(Vec<Vec<HexToken>>),
}

/// A run of (possibly masked, possibly negated) bytes.
///
/// `value`, `mask`, and `negated` run in parallel. Masks are `0x00` (both
/// nibbles wild), `0x0F` (high nibble wild), `0xF0` (low nibble wild), or
/// `0xFF` (exact byte).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BytesSequence {
    pub value: Vec<u8>,
    pub mask: Vec<u8>,
    pub negated: Vec<bool>,
}

/// A rule condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Boolean(bool),
    Number(i64),
    Double(f64),
    Text(String),
    Regex(RegexLiteral),
    Keyword(Keyword),
    /// `$name`.
    StringIdentifier(String),
    /// `#name`.
    StringCount(String),
    /// `@name` or `@name[i]`.
    StringOffset {
        identifier: String,
        index: Option<Box<Expression>>,
    },
    /// `!name` or `!name[i]`.
    StringLength {
        identifier: String,
        index: Option<Box<Expression>>,
    },
    /// A dotted identifier with optional subscripts and calls.
    Identifier(Vec<IdentifierItem>),
    Or(Vec<Expression>),
    And(Vec<Expression>),
    Not(Box<Expression>),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `(start..end)`.
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
    },
    /// `for <quantifier> <vars> in <iterable> : (<body>)`.
    ForIn {
        quantifier: Quantifier,
        variables: Vec<String>,
        iterable: Iterable,
        body: Box<Expression>,
    },
    /// `<quantifier> of <set> [in <range>] [at <offset>] [: (<body>)]`.
    ForOf {
        quantifier: Quantifier,
        set: OfSet,
        range: Option<Box<Expression>>,
        at: Option<Box<Expression>>,
        body: Option<Box<Expression>>,
    },
    /// `uint32(addr)` and friends.
    IntegerFunction {
        function: String,
        argument: Box<Expression>,
    },
    /// `<expr>%`, used as a quantifier.
    Percentage(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Entrypoint,
    Filesize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierItem {
    Name(String),
    Index(Expression),
    Call(Vec<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    BitwiseNot,
    Minus,
    Defined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Matches,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IEquals,
    At,
    In,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// The count side of a `for`/`of` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Expr(Box<Expression>),
}

/// The set side of an `of` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum OfSet {
    /// The `them` keyword: every declared string.
    Them,
    /// An explicit string enumeration, possibly with wildcard items.
    Strings(Vec<StringSetItem>),
    /// A rule-name enumeration.
    Rules(Vec<String>),
}

/// One item of a string enumeration, with the `$` sigil included.
#[derive(Debug, Clone, PartialEq)]
pub struct StringSetItem {
    pub identifier: String,
    pub wildcard: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Iterable {
    Enumeration(Vec<Expression>),
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
    },
    Identifier(Vec<IdentifierItem>),
}

pub(crate) const PRECEDENCE_OR: i8 = 1;
pub(crate) const PRECEDENCE_AND: i8 = 2;
pub(crate) const PRECEDENCE_NOT: i8 = 15;
pub(crate) const PRECEDENCE_UNARY: i8 = 15;

impl BinaryOp {
    /// Operator precedence. `At`, `In`, `Matches`, and the string-shape
    /// predicates have none specified; they take the maximum so no
    /// unnecessary parentheses are added around them.
    pub(crate) fn precedence(self) -> i8 {
        match self {
            BinaryOp::BitwiseOr => 3,
            BinaryOp::BitwiseXor => 4,
            BinaryOp::BitwiseAnd => 5,
            BinaryOp::Eq | BinaryOp::Neq => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 10,
            _ => i8::MAX,
        }
    }

    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Matches => "matches",
            BinaryOp::Contains => "contains",
            BinaryOp::IContains => "icontains",
            BinaryOp::StartsWith => "startswith",
            BinaryOp::IStartsWith => "istartswith",
            BinaryOp::EndsWith => "endswith",
            BinaryOp::IEndsWith => "iendswith",
            BinaryOp::IEquals => "iequals",
            BinaryOp::At => "at",
            BinaryOp::In => "in",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "\\",
            BinaryOp::Mod => "%",
        }
    }
}

impl Expression {
    /// Precedence used for parenthesization decisions. Nodes without a
    /// defined precedence take the maximum so they are never wrapped.
    pub(crate) fn precedence(&self) -> i8 {
        match self {
            Expression::Or(_) => PRECEDENCE_OR,
            Expression::And(_) => PRECEDENCE_AND,
            Expression::Not(_) => PRECEDENCE_NOT,
            Expression::Unary { .. } => PRECEDENCE_UNARY,
            Expression::Binary { op, .. } => op.precedence(),
            _ => i8::MAX,
        }
    }
}
