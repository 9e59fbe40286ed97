//! Text-string modifier compilation.
//!
//! String modifiers flatten into an ordered name list (`nocase`, `xor(19)`,
//! `fullword`, ...) which compiles into value transforms plus at most one
//! terminal comparator. The default comparator is a case-preserving
//! substring match.
//!
//! Field names are always lower-cased. Only the `i`-prefixed comparators
//! fold the value's case.

use crate::error::{Result, TranspileError};
use crate::yara::ast::StringModifiers;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Flatten modifier flags into the name list the chain parser consumes.
///
/// `fullword` goes last: it is the comparator, and comparators must close
/// the chain.
pub(crate) fn modifier_names(modifiers: &StringModifiers) -> Vec<String> {
    let mut names = Vec::new();
    if modifiers.nocase {
        names.push("nocase".to_string());
    }
    if modifiers.ascii {
        names.push("ascii".to_string());
    }
    if modifiers.wide {
        names.push("wide".to_string());
    }
    if let Some((min, max)) = modifiers.xor {
        if (min, max) == (0, 255) {
            names.push("xor".to_string());
        } else if min == max {
            names.push(format!("xor({min})"));
        } else {
            names.push(format!("xor({min}-{max})"));
        }
    }
    if modifiers.base64 {
        match &modifiers.base64_alphabet {
            Some(alphabet) => names.push(format!("base64({alphabet})")),
            None => names.push("base64".to_string()),
        }
    }
    if modifiers.base64wide {
        match &modifiers.base64_alphabet {
            Some(alphabet) => names.push(format!("base64wide({alphabet})")),
            None => names.push("base64wide".to_string()),
        }
    }
    if modifiers.fullword {
        names.push("fullword".to_string());
    }
    names
}

/// Rewrites the match value before the comparator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValueTransform {
    /// Lower-case the value.
    Nocase,
    /// Identity; the plain single-byte encoding is the default anyway.
    Ascii,
    /// UTF-16LE bytes of the value, carried as a lossy string.
    Wide,
    /// XOR every byte with a single key.
    Xor(u8),
    /// Standard base64 of the value's bytes.
    Base64,
    /// Standard base64 of the UTF-16LE bytes.
    Base64Wide,
}

impl ValueTransform {
    fn apply(&self, value: &str) -> String {
        match self {
            ValueTransform::Nocase => value.to_lowercase(),
            ValueTransform::Ascii => value.to_string(),
            ValueTransform::Wide => String::from_utf8_lossy(&wide_bytes(value)).into_owned(),
            ValueTransform::Xor(key) => {
                let bytes: Vec<u8> = value.bytes().map(|b| b ^ key).collect();
                String::from_utf8_lossy(&bytes).into_owned()
            }
            ValueTransform::Base64 => BASE64.encode(value.as_bytes()),
            ValueTransform::Base64Wide => BASE64.encode(wide_bytes(value)),
        }
    }
}

fn wide_bytes(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// Terminal comparators. `Like` is the default when no comparator is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparator {
    Like,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Ge,
    Lt,
    Le,
    Fullword,
    Eq,
    IEquals,
    Neq,
}

impl Comparator {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "contains" => Some(Comparator::Contains),
            "icontains" => Some(Comparator::IContains),
            "startswith" => Some(Comparator::StartsWith),
            "istartswith" => Some(Comparator::IStartsWith),
            "endswith" => Some(Comparator::EndsWith),
            "iendswith" => Some(Comparator::IEndsWith),
            "gt" => Some(Comparator::Gt),
            "ge" => Some(Comparator::Ge),
            "lt" => Some(Comparator::Lt),
            "le" => Some(Comparator::Le),
            "fullword" => Some(Comparator::Fullword),
            "eq" => Some(Comparator::Eq),
            "iequals" => Some(Comparator::IEquals),
            "neq" => Some(Comparator::Neq),
            _ => None,
        }
    }

    /// Only the `i`-prefixed comparators fold the value's case.
    fn folds_value_case(self) -> bool {
        matches!(
            self,
            Comparator::IContains
                | Comparator::IStartsWith
                | Comparator::IEndsWith
                | Comparator::IEquals
        )
    }

    fn render(self, field: &str, value: &str) -> String {
        match self {
            Comparator::Like | Comparator::Contains | Comparator::IContains => {
                format!("{field} like '%{value}%'")
            }
            Comparator::StartsWith | Comparator::IStartsWith => {
                format!("{field} like '{value}%'")
            }
            Comparator::EndsWith | Comparator::IEndsWith => format!("{field} like '%{value}'"),
            Comparator::Gt => format!("{field} > '{value}'"),
            Comparator::Ge => format!("{field} >= '{value}'"),
            Comparator::Lt => format!("{field} < '{value}'"),
            Comparator::Le => format!("{field} <= '{value}'"),
            Comparator::Fullword | Comparator::Eq | Comparator::IEquals => {
                format!("{field} = '{value}'")
            }
            Comparator::Neq => format!("{field} != '{value}'"),
        }
    }
}

/// A compiled modifier chain for one text string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextModifierChain {
    transforms: Vec<ValueTransform>,
    comparator: Comparator,
}

impl TextModifierChain {
    pub(crate) fn from_modifiers(modifiers: &StringModifiers) -> Result<Self> {
        Self::parse(&modifier_names(modifiers))
    }

    /// Validate and compile a modifier name list.
    ///
    /// Fails on unknown names, on a comparator in a non-final position, on
    /// XOR key ranges, and on custom base64 alphabets.
    pub(crate) fn parse(names: &[String]) -> Result<Self> {
        let mut transforms = Vec::new();
        let mut comparator = Comparator::Like;

        for (idx, name) in names.iter().enumerate() {
            let (base, parameter) = split_parameter(name);
            if let Some(found) = Comparator::from_name(base) {
                if parameter.is_some() {
                    return Err(TranspileError::UnsupportedConstruct(format!(
                        "unknown modifier {name}"
                    )));
                }
                if idx != names.len() - 1 {
                    return Err(TranspileError::UnsupportedConstruct(format!(
                        "comparator modifier {name} must be the last modifier"
                    )));
                }
                comparator = found;
                continue;
            }
            transforms.push(match (base, parameter) {
                ("nocase", None) => ValueTransform::Nocase,
                ("ascii", None) => ValueTransform::Ascii,
                ("wide", None) => ValueTransform::Wide,
                ("xor", None) => ValueTransform::Xor(0x01),
                ("xor", Some(parameter)) => ValueTransform::Xor(xor_key(parameter)?),
                ("base64", None) => ValueTransform::Base64,
                ("base64wide", None) => ValueTransform::Base64Wide,
                ("base64", Some(_)) | ("base64wide", Some(_)) => {
                    return Err(TranspileError::UnsupportedConstruct(
                        "custom base64 alphabets are not supported".to_string(),
                    ));
                }
                _ => {
                    return Err(TranspileError::UnsupportedConstruct(format!(
                        "unknown modifier {name}"
                    )));
                }
            });
        }

        Ok(TextModifierChain {
            transforms,
            comparator,
        })
    }

    /// Emit the comparison expression for one field/value pair.
    pub(crate) fn render(&self, field: &str, value: &str) -> String {
        let field = field.to_ascii_lowercase();
        let mut value = value.to_string();
        for transform in &self.transforms {
            value = transform.apply(&value);
        }
        if self.comparator.folds_value_case() {
            value = value.to_lowercase();
        }
        self.comparator.render(&field, &value)
    }
}

fn split_parameter(name: &str) -> (&str, Option<&str>) {
    match name.split_once('(') {
        Some((base, rest)) => (base, rest.strip_suffix(')')),
        None => (name, None),
    }
}

fn xor_key(parameter: &str) -> Result<u8> {
    if parameter.contains('-') {
        return Err(TranspileError::UnsupportedConstruct(
            "xor key ranges are not supported".to_string(),
        ));
    }
    parameter.parse().map_err(|_| {
        TranspileError::UnsupportedConstruct(format!("invalid xor key {parameter}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> TextModifierChain {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        TextModifierChain::parse(&names).unwrap()
    }

    #[test]
    fn test_default_is_case_preserving_substring() {
        assert_eq!(
            chain(&[]).render("Command", "PowerShell"),
            "command like '%PowerShell%'"
        );
    }

    #[test]
    fn test_nocase_folds_value() {
        assert_eq!(
            chain(&["nocase"]).render("Command", "PowerShell"),
            "command like '%powershell%'"
        );
    }

    #[test]
    fn test_ascii_is_identity() {
        assert_eq!(chain(&["ascii"]).render("f", "AbC"), "f like '%AbC%'");
    }

    #[test]
    fn test_wide_interleaves_nuls() {
        assert_eq!(chain(&["wide"]).render("f", "ab"), "f like '%a\u{0}b\u{0}%'");
    }

    #[test]
    fn test_xor_default_key() {
        // 'a' ^ 0x01 == '`'
        assert_eq!(chain(&["xor"]).render("f", "a"), "f like '%`%'");
    }

    #[test]
    fn test_xor_explicit_key() {
        // 'a' ^ 32 == 'A'
        assert_eq!(chain(&["xor(32)"]).render("f", "a"), "f like '%A%'");
    }

    #[test]
    fn test_xor_range_rejected() {
        let names = vec!["xor(0-255)".to_string()];
        let err = TextModifierChain::parse(&names).unwrap_err();
        assert_eq!(
            err,
            TranspileError::UnsupportedConstruct("xor key ranges are not supported".to_string())
        );
    }

    #[test]
    fn test_base64() {
        assert_eq!(
            chain(&["base64"]).render("Payload", "cmd"),
            format!("payload like '%{}%'", BASE64.encode("cmd"))
        );
    }

    #[test]
    fn test_base64wide_encodes_utf16le() {
        assert_eq!(
            chain(&["base64wide"]).render("Payload", "ab"),
            format!("payload like '%{}%'", BASE64.encode(b"a\0b\0"))
        );
    }

    #[test]
    fn test_base64_custom_alphabet_rejected() {
        let names = vec!["base64(!@#$)".to_string()];
        assert!(matches!(
            TextModifierChain::parse(&names).unwrap_err(),
            TranspileError::UnsupportedConstruct(_)
        ));
    }

    #[test]
    fn test_fullword_is_equality() {
        assert_eq!(chain(&["fullword"]).render("Name", "svchost.exe"), "name = 'svchost.exe'");
    }

    #[test]
    fn test_icontains_folds_value() {
        assert_eq!(
            chain(&["icontains"]).render("f", "AbC"),
            "f like '%abc%'"
        );
    }

    #[test]
    fn test_istartswith_iendswith() {
        assert_eq!(chain(&["istartswith"]).render("f", "AbC"), "f like 'abc%'");
        assert_eq!(chain(&["iendswith"]).render("f", "AbC"), "f like '%abc'");
    }

    #[test]
    fn test_relational_comparators() {
        assert_eq!(chain(&["gt"]).render("Size", "10"), "size > '10'");
        assert_eq!(chain(&["ge"]).render("Size", "10"), "size >= '10'");
        assert_eq!(chain(&["lt"]).render("Size", "10"), "size < '10'");
        assert_eq!(chain(&["le"]).render("Size", "10"), "size <= '10'");
    }

    #[test]
    fn test_eq_neq_iequals() {
        assert_eq!(chain(&["eq"]).render("f", "V"), "f = 'V'");
        assert_eq!(chain(&["neq"]).render("f", "V"), "f != 'V'");
        assert_eq!(chain(&["iequals"]).render("f", "V"), "f = 'v'");
    }

    #[test]
    fn test_comparator_must_be_last() {
        let names = vec!["contains".to_string(), "nocase".to_string()];
        let err = TextModifierChain::parse(&names).unwrap_err();
        match err {
            TranspileError::UnsupportedConstruct(message) => {
                assert!(message.contains("must be the last modifier"));
            }
            other => panic!("expected UnsupportedConstruct, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_modifier() {
        let names = vec!["frobnicate".to_string()];
        assert_eq!(
            TextModifierChain::parse(&names).unwrap_err(),
            TranspileError::UnsupportedConstruct("unknown modifier frobnicate".to_string())
        );
    }

    #[test]
    fn test_name_flattening_order() {
        let modifiers = StringModifiers {
            nocase: true,
            wide: true,
            fullword: true,
            xor: Some((19, 19)),
            ..StringModifiers::default()
        };
        assert_eq!(modifier_names(&modifiers), vec!["nocase", "wide", "xor(19)", "fullword"]);
    }

    #[test]
    fn test_unparameterized_xor_flattens_bare() {
        let modifiers = StringModifiers {
            xor: Some((0, 255)),
            ..StringModifiers::default()
        };
        assert_eq!(modifier_names(&modifiers), vec!["xor"]);
    }
}
