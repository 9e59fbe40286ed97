//! Field-matcher modifier chains and comparison emission.
//!
//! A modifier chain is zero or more value transforms followed by at most one
//! terminal comparator, which must be last. The chain compiles a field name
//! and a raw value into one backend comparison expression.
//!
//! Field names are always lower-cased for emission consistency. Values are
//! lower-cased only in case-insensitive mode, and only for the textual
//! comparators; regex, CIDR, and relational comparisons never fold case.

use crate::error::{Result, TranspileError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::net::Ipv4Addr;

/// Rewrites the comparison value before the comparator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueTransform {
    /// Standard base64 of the value's bytes.
    Base64,
    /// UTF-16LE bytes of the value, carried as a lossy string. ASCII input
    /// becomes NUL-interleaved text.
    Wide,
}

impl ValueTransform {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "base64" => Some(ValueTransform::Base64),
            "wide" => Some(ValueTransform::Wide),
            _ => None,
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            ValueTransform::Base64 => BASE64.encode(value.as_bytes()),
            ValueTransform::Wide => {
                let bytes: Vec<u8> = value
                    .encode_utf16()
                    .flat_map(|unit| unit.to_le_bytes())
                    .collect();
                String::from_utf8_lossy(&bytes).into_owned()
            }
        }
    }
}

/// Terminal comparators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Cidr,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl Comparator {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "contains" => Some(Comparator::Contains),
            "startswith" => Some(Comparator::StartsWith),
            "endswith" => Some(Comparator::EndsWith),
            "re" => Some(Comparator::Regex),
            "cidr" => Some(Comparator::Cidr),
            "gt" => Some(Comparator::GreaterThan),
            "gte" => Some(Comparator::GreaterThanEqual),
            "lt" => Some(Comparator::LessThan),
            "lte" => Some(Comparator::LessThanEqual),
            _ => None,
        }
    }

    /// Textual comparators fold the value's case in case-insensitive mode;
    /// the rest compare the value verbatim.
    fn folds_value_case(self) -> bool {
        matches!(
            self,
            Comparator::Equals
                | Comparator::Contains
                | Comparator::StartsWith
                | Comparator::EndsWith
        )
    }
}

/// A validated modifier chain for one field matcher.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModifierChain {
    transforms: Vec<ValueTransform>,
    comparator: Comparator,
    case_sensitive: bool,
}

impl ModifierChain {
    /// Validate and compile a modifier name list.
    ///
    /// Fails on unknown names and on a comparator in a non-final position.
    pub(crate) fn parse(modifiers: &[String], case_sensitive: bool) -> Result<Self> {
        let mut transforms = Vec::new();
        let mut comparator = Comparator::Equals;

        for (idx, name) in modifiers.iter().enumerate() {
            if let Some(transform) = ValueTransform::from_name(name) {
                transforms.push(transform);
            } else if let Some(found) = Comparator::from_name(name) {
                if idx != modifiers.len() - 1 {
                    return Err(TranspileError::UnsupportedConstruct(format!(
                        "comparator modifier {name} must be the last modifier"
                    )));
                }
                comparator = found;
            } else {
                return Err(TranspileError::UnsupportedConstruct(format!(
                    "unknown modifier {name}"
                )));
            }
        }

        Ok(ModifierChain {
            transforms,
            comparator,
            case_sensitive,
        })
    }

    /// Emit the comparison expression for one field/value pair.
    pub(crate) fn render(&self, field: &str, value: &str) -> Result<String> {
        let field = field.to_ascii_lowercase();

        // A literal null means "field is absent/empty", not the string "null".
        if self.comparator == Comparator::Equals && self.transforms.is_empty() && value == "null" {
            return Ok(format!("{field} = ''"));
        }

        let mut value = value.to_string();
        for transform in &self.transforms {
            value = transform.apply(&value);
        }
        if !self.case_sensitive && self.comparator.folds_value_case() {
            value = value.to_lowercase();
        }

        Ok(match self.comparator {
            Comparator::Equals => format!("{field} = '{value}'"),
            Comparator::Contains => format!("{field} like '%{value}%'"),
            Comparator::StartsWith => format!("{field} like '{value}%'"),
            Comparator::EndsWith => format!("{field} like '%{value}'"),
            Comparator::Regex => format!("{field} rlike '{value}'"),
            Comparator::Cidr => format!("{field} rlike '{}'", cidr_regex(&value)?),
            Comparator::GreaterThan => format!("{field} > '{value}'"),
            Comparator::GreaterThanEqual => format!("{field} >= '{value}'"),
            Comparator::LessThan => format!("{field} < '{value}'"),
            Comparator::LessThanEqual => format!("{field} <= '{value}'"),
        })
    }
}

/// Expand an IPv4 CIDR block into an anchored octet regex.
///
/// Octets fully covered by the mask are emitted literally from the masked
/// network address; the remaining octets match any 1-3 digit run. IPv6 is
/// rejected rather than silently mismatching.
fn cidr_regex(cidr: &str) -> Result<String> {
    let invalid = || TranspileError::InvalidCidr(cidr.to_string());

    if cidr.contains(':') {
        return Err(invalid());
    }
    let (addr, bits) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let bits: u32 = bits.parse().map_err(|_| invalid())?;
    if bits > 32 {
        return Err(invalid());
    }

    let mask: u32 = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    let network = (u32::from(addr) & mask).to_be_bytes();

    let fixed_octets = (bits / 8) as usize;
    let parts: Vec<String> = (0..4)
        .map(|i| {
            if i < fixed_octets {
                network[i].to_string()
            } else {
                "\\d{1,3}".to_string()
            }
        })
        .collect();

    Ok(format!("^{}$", parts.join("\\.")))
}
