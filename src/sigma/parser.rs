//! Recursive-descent parser for the Sigma condition mini-language.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! condition   := disjunction ("|" aggregation)?
//! disjunction := conjunction ("or" conjunction)*
//! conjunction := term ("and" term)*
//! term        := "not" term
//!              | "1 of them" | "all of them"
//!              | "1 of" name | "all of" name
//!              | identifier
//!              | "(" disjunction ")"
//! aggregation := func ("(" identifier? ")")? ("by" identifier)? op number
//!              | "near" disjunction
//! ```
//!
//! Single-child disjunctions and conjunctions collapse to their child so the
//! AST carries no redundant nesting.

use crate::error::{Result, TranspileError};
use crate::sigma::ast::{
    AggregationExpr, AggregationFunc, Condition, SearchExpr,
};
use crate::sigma::lexer::{tokenize, Spanned, Token};

/// Parse one condition string into its AST.
pub fn parse_condition(input: &str) -> Result<Condition> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        input_len: input.len(),
    };

    let search = parser.disjunction()?;
    let aggregation = if parser.eat(&Token::Pipe) {
        Some(parser.aggregation()?)
    } else {
        None
    };
    parser.expect_end()?;

    Ok(Condition {
        search,
        aggregation,
        source: input.to_string(),
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|s| s.position)
            .unwrap_or(self.input_len)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|s| s.token.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Consumes the next token if it equals `expected`.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> TranspileError {
        TranspileError::Grammar {
            message: message.into(),
            position: self.position(),
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected trailing token {token:?}"))),
        }
    }

    fn disjunction(&mut self) -> Result<SearchExpr> {
        let mut nodes = vec![self.conjunction()?];
        while self.eat(&Token::Or) {
            nodes.push(self.conjunction()?);
        }
        if nodes.len() == 1 {
            Ok(nodes.pop().unwrap())
        } else {
            Ok(SearchExpr::Or(nodes))
        }
    }

    fn conjunction(&mut self) -> Result<SearchExpr> {
        let mut nodes = vec![self.term()?];
        while self.eat(&Token::And) {
            nodes.push(self.term()?);
        }
        if nodes.len() == 1 {
            Ok(nodes.pop().unwrap())
        } else {
            Ok(SearchExpr::And(nodes))
        }
    }

    fn term(&mut self) -> Result<SearchExpr> {
        match self.advance() {
            Some(Token::Not) => Ok(SearchExpr::Not(Box::new(self.term()?))),
            Some(Token::OneOfThem) => Ok(SearchExpr::OneOfThem),
            Some(Token::AllOfThem) => Ok(SearchExpr::AllOfThem),
            Some(Token::OneOf) => match self.advance() {
                Some(Token::Identifier(name)) => Ok(SearchExpr::OneOfIdentifier(name)),
                Some(Token::Pattern(pattern)) => Ok(SearchExpr::OneOfPattern(pattern)),
                _ => Err(self.error("expected search name or pattern after '1 of'")),
            },
            Some(Token::AllOf) => match self.advance() {
                Some(Token::Identifier(name)) => Ok(SearchExpr::AllOfIdentifier(name)),
                Some(Token::Pattern(pattern)) => Ok(SearchExpr::AllOfPattern(pattern)),
                _ => Err(self.error("expected search name or pattern after 'all of'")),
            },
            Some(Token::Identifier(name)) => Ok(SearchExpr::Identifier(name)),
            Some(Token::LeftParen) => {
                let inner = self.disjunction()?;
                if self.eat(&Token::RightParen) {
                    Ok(inner)
                } else {
                    Err(self.error("expected ')'"))
                }
            }
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of condition")),
        }
    }

    fn aggregation(&mut self) -> Result<AggregationExpr> {
        let name = match self.advance() {
            Some(Token::Identifier(name)) => name,
            _ => return Err(self.error("expected aggregation function after '|'")),
        };

        if name.eq_ignore_ascii_case("near") {
            return Ok(AggregationExpr::Near(self.disjunction()?));
        }

        let mut field = String::new();
        if self.eat(&Token::LeftParen) {
            if let Some(Token::Identifier(inner)) = self.peek() {
                field = inner.clone();
                self.cursor += 1;
            }
            if !self.eat(&Token::RightParen) {
                return Err(self.error("expected ')' after aggregation field"));
            }
        }

        let mut group_by = String::new();
        if let Some(Token::Identifier(word)) = self.peek() {
            if word.eq_ignore_ascii_case("by") {
                self.cursor += 1;
                match self.advance() {
                    Some(Token::Identifier(grouping)) => group_by = grouping,
                    _ => return Err(self.error("expected group field after 'by'")),
                }
            }
        }

        let func = match name.to_ascii_lowercase().as_str() {
            "count" => AggregationFunc::Count { field, group_by },
            "min" => AggregationFunc::Min { field, group_by },
            "max" => AggregationFunc::Max { field, group_by },
            "avg" => AggregationFunc::Avg { field, group_by },
            "sum" => AggregationFunc::Sum { field, group_by },
            other => {
                return Err(self.error(format!("unknown aggregation function '{other}'")));
            }
        };

        let op = match self.advance() {
            Some(Token::CompOp(op)) => op,
            // The grammar admits a bare aggregation, but nothing downstream
            // can compile one into a query.
            _ => {
                return Err(TranspileError::UnsupportedConstruct(
                    "non-comparison aggregations are not supported".to_string(),
                ));
            }
        };

        let threshold = match self.advance() {
            Some(Token::Number(value)) => value as f64,
            _ => return Err(self.error("expected threshold value after comparison operator")),
        };

        Ok(AggregationExpr::Comparison {
            func,
            op,
            threshold,
        })
    }
}
