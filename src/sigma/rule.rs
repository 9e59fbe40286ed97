//! Sigma rule document parsing.
//!
//! Rules are YAML documents with a `detection` block holding named searches
//! and one or more `condition` strings. Searches are kept in declaration
//! order because `them` and pattern expansion in conditions is
//! order-sensitive.

use crate::error::{Result, TranspileError};
use crate::sigma::ast::Condition;
use crate::sigma::parser::parse_condition;
use serde::Serialize;
use serde_yaml::Value;

/// A parsed Sigma detection rule.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rule {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub level: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub logsource: Logsource,
    #[serde(skip)]
    pub detection: Detection,
}

/// The log source a rule applies to. Empty fields act as wildcards during
/// config resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Logsource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub definition: String,
}

/// The `detection` block of a rule.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Named searches in document declaration order.
    pub searches: Vec<(String, Search)>,
    pub conditions: Vec<Condition>,
    /// Raw `timeframe` value, if present. Carried through for callers; query
    /// compilation does not consume it.
    pub timeframe: Option<String>,
}

impl Detection {
    /// Looks up a search by name.
    pub fn search(&self, name: &str) -> Option<&Search> {
        self.searches
            .iter()
            .find(|(search_name, _)| search_name == name)
            .map(|(_, search)| search)
    }
}

/// One named search of a detection block.
#[derive(Debug, Clone, PartialEq)]
pub enum Search {
    /// A bare list of keyword strings. Parsed for completeness; query
    /// compilation rejects it because keyword matching has no field to
    /// compare against.
    Keywords(Vec<String>),
    /// One or more field-matcher maps. Multiple maps are alternatives
    /// (logical OR).
    EventMatchers(Vec<EventMatcher>),
}

/// A single map of field matchers, all of which must hold (logical AND).
pub type EventMatcher = Vec<FieldMatcher>;

/// A matcher for one field, with its modifier chain and value list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatcher {
    pub field: String,
    /// Modifier names from the `field|mod1|mod2` key syntax, in order.
    pub modifiers: Vec<String>,
    /// Values to match. A scalar becomes a one-element list; multiple values
    /// are alternatives (logical OR) unless an `all` modifier is present.
    pub values: Vec<Value>,
}

impl FieldMatcher {
    fn from_entry(key: &str, value: &Value) -> FieldMatcher {
        let mut parts = key.split('|');
        let field = parts.next().unwrap_or_default().to_string();
        let modifiers = parts.map(str::to_string).collect();
        let values = match value {
            Value::Sequence(seq) => seq.clone(),
            other => vec![other.clone()],
        };
        FieldMatcher {
            field,
            modifiers,
            values,
        }
    }
}

/// Parse a rule from its YAML text.
pub fn parse_rule(input: &str) -> Result<Rule> {
    let document: Value = serde_yaml::from_str(input)?;
    let mapping = document
        .as_mapping()
        .ok_or_else(|| TranspileError::YamlError("rule document is not a mapping".to_string()))?;

    let mut rule = Rule {
        title: string_field(mapping, "title"),
        id: string_field(mapping, "id"),
        status: string_field(mapping, "status"),
        description: string_field(mapping, "description"),
        author: string_field(mapping, "author"),
        level: string_field(mapping, "level"),
        references: string_list_field(mapping, "references"),
        tags: string_list_field(mapping, "tags"),
        ..Rule::default()
    };

    if let Some(logsource) = mapping.get("logsource") {
        rule.logsource = parse_logsource(logsource)?;
    }

    let detection = mapping
        .get("detection")
        .ok_or_else(|| TranspileError::YamlError("rule has no detection block".to_string()))?;
    rule.detection = parse_detection(detection)?;

    Ok(rule)
}

pub(crate) fn parse_logsource(value: &Value) -> Result<Logsource> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| TranspileError::YamlError("logsource is not a mapping".to_string()))?;
    Ok(Logsource {
        category: string_field(mapping, "category"),
        product: string_field(mapping, "product"),
        service: string_field(mapping, "service"),
        definition: string_field(mapping, "definition"),
    })
}

fn parse_detection(value: &Value) -> Result<Detection> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| TranspileError::YamlError("detection is not a mapping".to_string()))?;

    let mut detection = Detection::default();
    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| {
            TranspileError::YamlError("detection keys must be strings".to_string())
        })?;
        match key {
            "condition" => detection.conditions = parse_conditions(value)?,
            "timeframe" => {
                detection.timeframe = value.as_str().map(|s| s.trim().to_string());
            }
            name => {
                detection
                    .searches
                    .push((name.to_string(), parse_search_value(value)?));
            }
        }
    }
    Ok(detection)
}

fn parse_conditions(value: &Value) -> Result<Vec<Condition>> {
    match value {
        Value::String(condition) => Ok(vec![parse_condition(condition)?]),
        Value::Sequence(conditions) => conditions
            .iter()
            .map(|entry| {
                let text = entry.as_str().ok_or_else(|| {
                    TranspileError::YamlError("condition entries must be strings".to_string())
                })?;
                parse_condition(text)
            })
            .collect(),
        _ => Err(TranspileError::YamlError(
            "condition must be a string or a list of strings".to_string(),
        )),
    }
}

pub(crate) fn parse_search_value(value: &Value) -> Result<Search> {
    match value {
        // The common case: a single map of field matchers.
        Value::Mapping(_) => Ok(Search::EventMatchers(vec![parse_event_matcher(value)?])),
        Value::Sequence(entries) => {
            if entries.is_empty() {
                return Err(TranspileError::YamlError(
                    "search list is empty".to_string(),
                ));
            }
            match &entries[0] {
                // A list of scalars is a keyword search.
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    let keywords = entries
                        .iter()
                        .map(|entry| scalar_to_string(entry))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| {
                            TranspileError::YamlError(
                                "keyword search entries must be scalars".to_string(),
                            )
                        })?;
                    Ok(Search::Keywords(keywords))
                }
                Value::Mapping(_) => {
                    let matchers = entries
                        .iter()
                        .map(parse_event_matcher)
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Search::EventMatchers(matchers))
                }
                _ => Err(TranspileError::YamlError(
                    "search list must hold strings or maps".to_string(),
                )),
            }
        }
        _ => Err(TranspileError::YamlError(
            "search must be a map or a list".to_string(),
        )),
    }
}

fn parse_event_matcher(value: &Value) -> Result<EventMatcher> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| TranspileError::YamlError("event matcher is not a mapping".to_string()))?;
    let mut matchers = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| {
            TranspileError::YamlError("field matcher keys must be strings".to_string())
        })?;
        matchers.push(FieldMatcher::from_entry(key, value));
    }
    Ok(matchers)
}

fn string_field(mapping: &serde_yaml::Mapping, key: &str) -> String {
    mapping
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list_field(mapping: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match mapping.get(key) {
        Some(Value::Sequence(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
