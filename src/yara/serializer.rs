//! Condition-expression and string-pattern serialization.
//!
//! Expressions render back to their source-like text form. A child is
//! wrapped in parentheses when its precedence is strictly lower than the
//! enclosing operator's, so the output never changes the tree's meaning.
//!
//! Plain `of` expressions over string sets do not survive serialization:
//! they expand structurally into boolean combinations of the referenced
//! string identifiers, ready for fragment substitution. An `of` carrying a
//! range, an offset, or a body renders verbatim instead.

use crate::error::{Result, TranspileError};
use crate::glob::glob_match;
use crate::yara::ast::{
    BytesSequence, Expression, HexToken, IdentifierItem, Iterable, Keyword, OfSet, Quantifier,
    RegexLiteral, StringDef, StringSetItem, UnaryOp, PRECEDENCE_NOT,
};

pub(crate) struct ExpressionSerializer<'a> {
    strings: &'a [StringDef],
}

impl<'a> ExpressionSerializer<'a> {
    pub(crate) fn new(strings: &'a [StringDef]) -> Self {
        ExpressionSerializer { strings }
    }

    pub(crate) fn serialize(&self, expression: &Expression) -> Result<String> {
        let mut out = String::new();
        self.write_expression(&mut out, expression)?;
        Ok(out)
    }

    fn write_expression(&self, out: &mut String, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Boolean(value) => out.push_str(if *value { "true" } else { "false" }),
            Expression::Number(value) => out.push_str(&value.to_string()),
            Expression::Double(value) => out.push_str(&format!("{value:.6}")),
            Expression::Text(text) => {
                out.push('"');
                out.push_str(text);
                out.push('"');
            }
            Expression::Regex(regex) => out.push_str(&serialize_regex(regex)),
            Expression::Keyword(keyword) => out.push_str(match keyword {
                Keyword::Entrypoint => "entrypoint",
                Keyword::Filesize => "filesize",
            }),
            Expression::StringIdentifier(name) => {
                out.push('$');
                out.push_str(name);
            }
            Expression::StringCount(name) => {
                out.push('#');
                out.push_str(name);
            }
            Expression::StringOffset { identifier, index } => {
                out.push('@');
                out.push_str(identifier);
                self.write_optional_index(out, index)?;
            }
            Expression::StringLength { identifier, index } => {
                out.push('!');
                out.push_str(identifier);
                self.write_optional_index(out, index)?;
            }
            Expression::Identifier(items) => self.write_identifier(out, items)?,
            Expression::Or(terms) => self.write_terms(out, terms, " or ", expression.precedence())?,
            Expression::And(terms) => {
                self.write_terms(out, terms, " and ", expression.precedence())?
            }
            Expression::Not(operand) => {
                out.push_str("not ");
                let parens = operand.precedence() < PRECEDENCE_NOT;
                if parens {
                    out.push('(');
                }
                self.write_expression(out, operand)?;
                if parens {
                    out.push(')');
                }
            }
            Expression::Unary { op, operand } => {
                out.push_str(match op {
                    UnaryOp::BitwiseNot => "~",
                    UnaryOp::Minus => "-",
                    // "defined" is a word, so it needs the space.
                    UnaryOp::Defined => "defined ",
                });
                self.write_expression(out, operand)?;
            }
            Expression::Binary { op, left, right } => {
                self.write_operand(out, left, op.precedence())?;
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                self.write_operand(out, right, op.precedence())?;
            }
            Expression::Range { start, end } => {
                out.push('(');
                self.write_expression(out, start)?;
                out.push_str("..");
                self.write_expression(out, end)?;
                out.push(')');
            }
            Expression::ForIn {
                quantifier,
                variables,
                iterable,
                body,
            } => {
                out.push_str("for ");
                self.write_quantifier(out, quantifier)?;
                out.push(' ');
                out.push_str(&variables.join(","));
                out.push_str(" in ");
                self.write_iterable(out, iterable)?;
                out.push_str(" : (");
                self.write_expression(out, body)?;
                out.push(')');
            }
            Expression::ForOf {
                quantifier,
                set,
                range,
                at,
                body,
            } => {
                if let Some(expanded) = self.expand_of(quantifier, set, range, at, body)? {
                    out.push_str(&expanded);
                } else {
                    self.write_for_of(out, quantifier, set, range, at, body)?;
                }
            }
            Expression::IntegerFunction { function, argument } => {
                out.push_str(function);
                out.push('(');
                self.write_expression(out, argument)?;
                out.push(')');
            }
            Expression::Percentage(operand) => {
                self.write_expression(out, operand)?;
                out.push('%');
            }
        }
        Ok(())
    }

    fn write_operand(&self, out: &mut String, operand: &Expression, precedence: i8) -> Result<()> {
        let parens = operand.precedence() < precedence;
        if parens {
            out.push('(');
        }
        self.write_expression(out, operand)?;
        if parens {
            out.push(')');
        }
        Ok(())
    }

    fn write_terms(
        &self,
        out: &mut String,
        terms: &[Expression],
        join: &str,
        precedence: i8,
    ) -> Result<()> {
        for (idx, term) in terms.iter().enumerate() {
            if idx > 0 {
                out.push_str(join);
            }
            let parens = term.precedence() < precedence;
            if parens {
                out.push_str("( ");
            }
            self.write_expression(out, term)?;
            if parens {
                out.push_str(" )");
            }
        }
        Ok(())
    }

    fn write_optional_index(
        &self,
        out: &mut String,
        index: &Option<Box<Expression>>,
    ) -> Result<()> {
        if let Some(index) = index {
            out.push('[');
            self.write_expression(out, index)?;
            out.push(']');
        }
        Ok(())
    }

    fn write_identifier(&self, out: &mut String, items: &[IdentifierItem]) -> Result<()> {
        for (idx, item) in items.iter().enumerate() {
            match item {
                IdentifierItem::Name(name) => {
                    if idx > 0 {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                IdentifierItem::Index(index) => {
                    out.push('[');
                    self.write_expression(out, index)?;
                    out.push(']');
                }
                IdentifierItem::Call(arguments) => {
                    out.push('(');
                    for (arg_idx, argument) in arguments.iter().enumerate() {
                        if arg_idx > 0 {
                            out.push_str(", ");
                        }
                        self.write_expression(out, argument)?;
                    }
                    out.push(')');
                }
            }
        }
        Ok(())
    }

    fn write_quantifier(&self, out: &mut String, quantifier: &Quantifier) -> Result<()> {
        match quantifier {
            Quantifier::All => out.push_str("all"),
            Quantifier::Any => out.push_str("any"),
            Quantifier::None => out.push_str("none"),
            Quantifier::Expr(expression) => self.write_expression(out, expression)?,
        }
        Ok(())
    }

    fn write_iterable(&self, out: &mut String, iterable: &Iterable) -> Result<()> {
        match iterable {
            Iterable::Enumeration(values) => {
                out.push('(');
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    self.write_expression(out, value)?;
                }
                out.push(')');
            }
            Iterable::Range { start, end } => {
                out.push('(');
                self.write_expression(out, start)?;
                out.push_str("..");
                self.write_expression(out, end)?;
                out.push(')');
            }
            Iterable::Identifier(items) => self.write_identifier(out, items)?,
        }
        Ok(())
    }

    /// Verbatim rendering for `of` forms the expansion does not cover.
    fn write_for_of(
        &self,
        out: &mut String,
        quantifier: &Quantifier,
        set: &OfSet,
        range: &Option<Box<Expression>>,
        at: &Option<Box<Expression>>,
        body: &Option<Box<Expression>>,
    ) -> Result<()> {
        if body.is_some() {
            out.push_str("for ");
        }
        self.write_quantifier(out, quantifier)?;
        out.push_str(" of ");
        match set {
            OfSet::Them => out.push_str("them"),
            OfSet::Strings(items) => {
                out.push('(');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    if item.wildcard {
                        let matches = self.wildcard_matches(&item.identifier);
                        if matches.is_empty() {
                            out.push_str(&item.identifier);
                        } else {
                            out.push_str(&matches.join(", "));
                        }
                    } else {
                        out.push_str(&item.identifier);
                    }
                }
                out.push(')');
            }
            OfSet::Rules(names) => {
                out.push('(');
                out.push_str(&names.join(", "));
                out.push(')');
            }
        }
        if let Some(range) = range {
            out.push_str(" in ");
            self.write_expression(out, range)?;
        }
        if let Some(at) = at {
            out.push_str(" at ");
            self.write_expression(out, at)?;
        }
        if let Some(body) = body {
            out.push_str(" : (");
            self.write_expression(out, body)?;
            out.push(')');
        }
        Ok(())
    }

    /// Expand a plain `of` over a string set into a boolean combination of
    /// `$identifier` references. Returns `None` for the forms that must
    /// render verbatim: rule sets, non-integer counts, and any `of` carrying
    /// a range, an offset, or a body.
    fn expand_of(
        &self,
        quantifier: &Quantifier,
        set: &OfSet,
        range: &Option<Box<Expression>>,
        at: &Option<Box<Expression>>,
        body: &Option<Box<Expression>>,
    ) -> Result<Option<String>> {
        if range.is_some() || at.is_some() || body.is_some() {
            return Ok(None);
        }
        let identifiers = match set {
            OfSet::Them => self
                .strings
                .iter()
                .map(|def| format!("${}", def.identifier))
                .collect(),
            OfSet::Strings(items) => self.resolve_string_set(items)?,
            OfSet::Rules(_) => return Ok(None),
        };
        if identifiers.is_empty() {
            return Err(TranspileError::Evaluation(
                "'of' string set is empty".to_string(),
            ));
        }

        let expanded = match quantifier {
            Quantifier::Any => or_join(&identifiers),
            Quantifier::All => and_join(&identifiers),
            Quantifier::None => format!("not {}", and_join(&identifiers)),
            Quantifier::Expr(expression) => match expression.as_ref() {
                Expression::Number(count) => {
                    if *count <= 0 {
                        return Err(TranspileError::Evaluation(
                            "'of' count must be greater than 0".to_string(),
                        ));
                    }
                    let count = *count as usize;
                    if count > identifiers.len() {
                        return Err(TranspileError::Evaluation(format!(
                            "'of' count {count} exceeds the {} referenced strings",
                            identifiers.len()
                        )));
                    }
                    if count == 1 {
                        or_join(&identifiers)
                    } else if count == identifiers.len() {
                        and_join(&identifiers)
                    } else {
                        combination_join(count, &identifiers)
                    }
                }
                _ => return Ok(None),
            },
        };
        Ok(Some(expanded))
    }

    /// Resolve an explicit string enumeration to `$identifier` references.
    /// Wildcard items expand against the declared strings; a plain item must
    /// name a declared string.
    fn resolve_string_set(&self, items: &[StringSetItem]) -> Result<Vec<String>> {
        let mut identifiers = Vec::new();
        for item in items {
            if item.wildcard {
                identifiers.extend(self.wildcard_matches(&item.identifier));
            } else {
                let declared = self
                    .strings
                    .iter()
                    .any(|def| format!("${}", def.identifier) == item.identifier);
                if !declared {
                    return Err(TranspileError::Evaluation(format!(
                        "string identifier '{}' is not declared",
                        item.identifier
                    )));
                }
                identifiers.push(item.identifier.clone());
            }
        }
        Ok(identifiers)
    }

    fn wildcard_matches(&self, pattern: &str) -> Vec<String> {
        self.strings
            .iter()
            .map(|def| format!("${}", def.identifier))
            .filter(|identifier| glob_match(pattern, identifier))
            .collect()
    }
}

fn or_join(identifiers: &[String]) -> String {
    format!("({})", identifiers.join(" or "))
}

fn and_join(identifiers: &[String]) -> String {
    format!("({})", identifiers.join(" and "))
}

/// OR of every size-`count` combination, each an AND over identifiers in
/// sorted order. Combinations come out in lexicographic index order.
fn combination_join(count: usize, identifiers: &[String]) -> String {
    let mut sorted: Vec<&String> = identifiers.iter().collect();
    sorted.sort();

    let mut combinations = Vec::new();
    let mut current = Vec::with_capacity(count);
    pick(&sorted, count, 0, &mut current, &mut combinations);

    let groups: Vec<String> = combinations
        .iter()
        .map(|combo| format!("({})", combo.join(" and ")))
        .collect();
    format!("({})", groups.join(" or "))
}

fn pick<'a>(
    sorted: &[&'a String],
    remaining: usize,
    from: usize,
    current: &mut Vec<&'a str>,
    combinations: &mut Vec<Vec<&'a str>>,
) {
    if remaining == 0 {
        combinations.push(current.clone());
        return;
    }
    for idx in from..=sorted.len() - remaining {
        current.push(sorted[idx]);
        pick(sorted, remaining - 1, idx + 1, current, combinations);
        current.pop();
    }
}

/// Render a hex pattern: `{ 4D 5A ?? [2-4] ( 61 | 6?2 ) }` style tokens,
/// each followed by one space.
pub(crate) fn serialize_hex(tokens: &[HexToken]) -> Result<String> {
    let mut out = String::from("{ ");
    write_hex_tokens(&mut out, tokens)?;
    out.push('}');
    Ok(out)
}

fn write_hex_tokens(out: &mut String, tokens: &[HexToken]) -> Result<()> {
    for token in tokens {
        match token {
            HexToken::Bytes(sequence) => write_hex_bytes(out, sequence)?,
            HexToken::Jump { start, end } => {
                out.push('[');
                match (start, end) {
                    (Some(start), Some(end)) if start == end => {
                        out.push_str(&start.to_string());
                    }
                    (start, end) => {
                        if let Some(start) = start {
                            out.push_str(&start.to_string());
                        }
                        out.push('-');
                        if let Some(end) = end {
                            out.push_str(&end.to_string());
                        }
                    }
                }
                out.push_str("] ");
            }
            HexToken::Alternative(alternatives) => {
                out.push_str("( ");
                for (idx, alternative) in alternatives.iter().enumerate() {
                    if idx > 0 {
                        out.push_str("| ");
                    }
                    write_hex_tokens(out, alternative)?;
                }
                out.push_str(") ");
            }
        }
    }
    Ok(())
}

fn write_hex_bytes(out: &mut String, sequence: &BytesSequence) -> Result<()> {
    for (idx, value) in sequence.value.iter().enumerate() {
        if sequence.negated.get(idx).copied().unwrap_or(false) {
            out.push('~');
        }
        match sequence.mask.get(idx).copied().unwrap_or(0xFF) {
            0x00 => out.push_str("?? "),
            0x0F => out.push_str(&format!("?{:X} ", value & 0x0F)),
            0xF0 => out.push_str(&format!("{:X}? ", value >> 4)),
            0xFF => out.push_str(&format!("{value:02X} ")),
            mask => {
                return Err(TranspileError::Evaluation(format!(
                    "unsupported hex byte mask {mask:#04x}"
                )));
            }
        }
    }
    Ok(())
}

/// Render a regex literal with its flags: `/ab+c/is`.
pub(crate) fn serialize_regex(regex: &RegexLiteral) -> String {
    let mut out = format!("/{}/", regex.text);
    if regex.case_insensitive {
        out.push('i');
    }
    if regex.dot_all {
        out.push('s');
    }
    out
}
