//! Error types for the siemql crate.

use std::fmt;

pub type Result<T> = std::result::Result<T, TranspileError>;

/// Errors produced while parsing detection rules or compiling them into
/// query strings.
///
/// Parse errors abort the offending rule/config document only.
/// Evaluation errors abort the offending condition index only; sibling
/// conditions of the same rule still compile.
#[derive(Debug, Clone, PartialEq)]
pub enum TranspileError {
    /// Malformed condition string, with the byte offset of the offending token.
    Grammar { message: String, position: usize },
    /// A rule construct this compiler does not support (keyword-only
    /// searches, `near` aggregations, unknown modifiers, ...).
    UnsupportedConstruct(String),
    ConfigResolution(String),
    /// A `%placeholder%` value could not be expanded.
    PlaceholderExpansion(String),
    Evaluation(String),
    YamlError(String),
    InvalidRegex(String),
    InvalidCidr(String),
    /// The compile context was cancelled; partial results are discarded.
    Cancelled,
}

impl fmt::Display for TranspileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranspileError::Grammar { message, position } => {
                write!(f, "grammar error at offset {position}: {message}")
            }
            TranspileError::UnsupportedConstruct(msg) => {
                write!(f, "unsupported construct: {msg}")
            }
            TranspileError::ConfigResolution(msg) => {
                write!(f, "config resolution error: {msg}")
            }
            TranspileError::PlaceholderExpansion(msg) => {
                write!(f, "placeholder expansion error: {msg}")
            }
            TranspileError::Evaluation(msg) => write!(f, "evaluation error: {msg}"),
            TranspileError::YamlError(msg) => write!(f, "YAML parsing error: {msg}"),
            TranspileError::InvalidRegex(pattern) => {
                write!(f, "invalid regex pattern: {pattern}")
            }
            TranspileError::InvalidCidr(cidr) => write!(f, "invalid CIDR notation: {cidr}"),
            TranspileError::Cancelled => write!(f, "compilation cancelled"),
        }
    }
}

impl std::error::Error for TranspileError {}

impl From<serde_yaml::Error> for TranspileError {
    fn from(err: serde_yaml::Error) -> Self {
        TranspileError::YamlError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_grammar_error_display() {
        let error = TranspileError::Grammar {
            message: "unexpected token".to_string(),
            position: 7,
        };
        assert_eq!(
            error.to_string(),
            "grammar error at offset 7: unexpected token"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn test_unsupported_construct_display() {
        let error = TranspileError::UnsupportedConstruct("keywords".to_string());
        assert_eq!(error.to_string(), "unsupported construct: keywords");
    }

    #[test]
    fn test_placeholder_expansion_display() {
        let error = TranspileError::PlaceholderExpansion("no expander".to_string());
        assert_eq!(
            error.to_string(),
            "placeholder expansion error: no expander"
        );
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(
            TranspileError::Cancelled.to_string(),
            "compilation cancelled"
        );
    }

    #[test]
    fn test_error_equality() {
        let error1 = TranspileError::InvalidCidr("::1/128".to_string());
        let error2 = TranspileError::InvalidCidr("::1/128".to_string());
        let error3 = TranspileError::InvalidCidr("10.0.0.0/8".to_string());

        assert_eq!(error1, error2);
        assert_ne!(error1, error3);
        assert_ne!(
            TranspileError::Cancelled,
            TranspileError::Evaluation("x".to_string())
        );
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: [").unwrap_err();
        let error: TranspileError = yaml_err.into();
        assert!(matches!(error, TranspileError::YamlError(_)));
    }

    #[test]
    fn test_error_clone() {
        let errors = vec![
            TranspileError::Grammar {
                message: "m".to_string(),
                position: 0,
            },
            TranspileError::UnsupportedConstruct("u".to_string()),
            TranspileError::ConfigResolution("c".to_string()),
            TranspileError::PlaceholderExpansion("p".to_string()),
            TranspileError::Evaluation("e".to_string()),
            TranspileError::YamlError("y".to_string()),
            TranspileError::InvalidRegex("(".to_string()),
            TranspileError::InvalidCidr("bad".to_string()),
            TranspileError::Cancelled,
        ];
        for error in errors {
            assert_eq!(error, error.clone());
        }
    }
}
