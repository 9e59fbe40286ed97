//! Tokenizer for the Sigma condition mini-language.
//!
//! Classification order matters: the multi-word keywords (`1 of them`,
//! `all of them`, `1 of`, `all of`) are matched longest-first before anything
//! else, and a word containing `*` is a search-identifier pattern, never a
//! plain identifier.

use crate::error::{Result, TranspileError};
use crate::sigma::ast::ComparisonOp;

/// Tokens in a Sigma condition expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    OneOfThem,
    AllOfThem,
    OneOf,
    AllOf,
    Identifier(String),
    Pattern(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Pipe,
    CompOp(ComparisonOp),
    Number(u64),
}

/// A token plus the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) position: usize,
}

/// The case-insensitive phrase keywords, longest first.
const PHRASE_KEYWORDS: &[(&str, Token)] = &[
    ("all of them", Token::AllOfThem),
    ("1 of them", Token::OneOfThem),
    ("all of", Token::AllOf),
    ("1 of", Token::OneOf),
];

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '*'
}

fn is_word_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

/// Checks whether `input[pos..]` starts with `phrase` (case-insensitively)
/// followed by a word boundary. Compared as bytes so that a multibyte
/// character straddling `phrase.len()` never slices mid-character.
fn phrase_at(input: &str, pos: usize, phrase: &str) -> bool {
    let rest = &input.as_bytes()[pos..];
    if rest.len() < phrase.len() || !rest[..phrase.len()].eq_ignore_ascii_case(phrase.as_bytes()) {
        return false;
    }
    // The phrase bytes are ASCII, so pos + phrase.len() is a char boundary.
    match input[pos + phrase.len()..].chars().next() {
        Some(ch) => !is_word_char(ch),
        None => true,
    }
}

/// Tokenize a Sigma condition string.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let bytes = input.as_bytes();

    'outer: while pos < input.len() {
        let ch = input[pos..].chars().next().unwrap_or('\0');

        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        for (phrase, token) in PHRASE_KEYWORDS {
            if phrase_at(input, pos, phrase) {
                tokens.push(Spanned {
                    token: token.clone(),
                    position: pos,
                });
                pos += phrase.len();
                continue 'outer;
            }
        }

        match ch {
            '(' => {
                tokens.push(Spanned {
                    token: Token::LeftParen,
                    position: pos,
                });
                pos += 1;
            }
            ')' => {
                tokens.push(Spanned {
                    token: Token::RightParen,
                    position: pos,
                });
                pos += 1;
            }
            '|' => {
                tokens.push(Spanned {
                    token: Token::Pipe,
                    position: pos,
                });
                pos += 1;
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::CompOp(ComparisonOp::NotEqual),
                        position: pos,
                    });
                    pos += 2;
                } else {
                    return Err(TranspileError::Grammar {
                        message: "expected '=' after '!'".to_string(),
                        position: pos,
                    });
                }
            }
            '=' => {
                tokens.push(Spanned {
                    token: Token::CompOp(ComparisonOp::Equal),
                    position: pos,
                });
                pos += 1;
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::CompOp(ComparisonOp::LessThanEqual),
                        position: pos,
                    });
                    pos += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::CompOp(ComparisonOp::LessThan),
                        position: pos,
                    });
                    pos += 1;
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::CompOp(ComparisonOp::GreaterThanEqual),
                        position: pos,
                    });
                    pos += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::CompOp(ComparisonOp::GreaterThan),
                        position: pos,
                    });
                    pos += 1;
                }
            }
            '0'..='9' => {
                let start = pos;
                while pos < input.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                let number: u64 =
                    input[start..pos]
                        .parse()
                        .map_err(|_| TranspileError::Grammar {
                            message: format!("invalid number {}", &input[start..pos]),
                            position: start,
                        })?;
                tokens.push(Spanned {
                    token: Token::Number(number),
                    position: start,
                });
            }
            _ if is_word_start(ch) => {
                let start = pos;
                while pos < input.len() {
                    let ch = input[pos..].chars().next().unwrap_or('\0');
                    if is_word_char(ch) {
                        pos += ch.len_utf8();
                    } else {
                        break;
                    }
                }
                let word = &input[start..pos];
                let token = if word.contains('*') {
                    Token::Pattern(word.to_string())
                } else if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("or") {
                    Token::Or
                } else if word.eq_ignore_ascii_case("not") {
                    Token::Not
                } else {
                    Token::Identifier(word.to_string())
                };
                tokens.push(Spanned {
                    token,
                    position: start,
                });
            }
            _ => {
                return Err(TranspileError::Grammar {
                    message: format!("unexpected character '{ch}'"),
                    position: pos,
                });
            }
        }
    }

    Ok(tokens)
}
