//! Backend configuration documents.
//!
//! Configs layer on top of rules: they map abstract rule field names to
//! concrete event field names, route log sources to indexes, rewrite
//! log-source metadata, and define placeholder value lists.

use crate::error::{Result, TranspileError};
use crate::sigma::rule::{parse_logsource, scalar_to_string, Logsource, Search};
use serde_yaml::Value;
use std::collections::HashMap;

/// A parsed backend configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub title: String,
    /// Expansion-order hint. Resolution applies configs in caller-supplied
    /// order; this field is informational only.
    pub order: i64,
    /// Backend names this config is compatible with.
    pub backends: Vec<String>,
    /// Rule field name to target event field names, in declaration order.
    pub field_mappings: Vec<(String, Vec<String>)>,
    pub logsources: Vec<(String, LogsourceMapping)>,
    /// Index used when no logsource mapping matches.
    pub default_index: String,
    pub placeholders: HashMap<String, Vec<String>>,
}

/// Routes rules whose log source matches the category/product/service triple.
/// Empty match fields are wildcards.
#[derive(Debug, Clone, Default)]
pub struct LogsourceMapping {
    pub logsource: Logsource,
    pub indexes: Vec<String>,
    /// Extra search conditions ANDed onto every matching rule.
    pub conditions: Option<Search>,
    /// Overwrites the rule's log-source fields for later configs to match
    /// against. Empty rewrite fields leave the original value in place.
    pub rewrite: Logsource,
}

/// Parse a config from its YAML text.
pub fn parse_config(input: &str) -> Result<Config> {
    let document: Value = serde_yaml::from_str(input)?;
    let mapping = document.as_mapping().ok_or_else(|| {
        TranspileError::YamlError("config document is not a mapping".to_string())
    })?;

    let mut config = Config {
        title: mapping
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        order: mapping.get("order").and_then(Value::as_i64).unwrap_or(0),
        default_index: mapping
            .get("defaultindex")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        ..Config::default()
    };

    if let Some(Value::Sequence(backends)) = mapping.get("backends") {
        config.backends = backends
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }

    if let Some(field_mappings) = mapping.get("fieldmappings") {
        let entries = field_mappings.as_mapping().ok_or_else(|| {
            TranspileError::YamlError("fieldmappings is not a mapping".to_string())
        })?;
        for (field, targets) in entries {
            let field = field.as_str().ok_or_else(|| {
                TranspileError::YamlError("fieldmapping keys must be strings".to_string())
            })?;
            config
                .field_mappings
                .push((field.to_string(), scalar_or_list(targets)?));
        }
    }

    if let Some(logsources) = mapping.get("logsources") {
        let entries = logsources.as_mapping().ok_or_else(|| {
            TranspileError::YamlError("logsources is not a mapping".to_string())
        })?;
        for (name, entry) in entries {
            let name = name.as_str().ok_or_else(|| {
                TranspileError::YamlError("logsource keys must be strings".to_string())
            })?;
            config
                .logsources
                .push((name.to_string(), parse_logsource_mapping(entry)?));
        }
    }

    if let Some(placeholders) = mapping.get("placeholders") {
        let entries = placeholders.as_mapping().ok_or_else(|| {
            TranspileError::YamlError("placeholders is not a mapping".to_string())
        })?;
        for (name, values) in entries {
            let name = name.as_str().ok_or_else(|| {
                TranspileError::YamlError("placeholder keys must be strings".to_string())
            })?;
            config
                .placeholders
                .insert(name.to_string(), scalar_or_list(values)?);
        }
    }

    Ok(config)
}

fn parse_logsource_mapping(value: &Value) -> Result<LogsourceMapping> {
    let mapping = value.as_mapping().ok_or_else(|| {
        TranspileError::YamlError("logsource mapping is not a mapping".to_string())
    })?;

    let mut result = LogsourceMapping {
        logsource: parse_logsource(value)?,
        ..LogsourceMapping::default()
    };

    if let Some(index) = mapping.get("index") {
        result.indexes = scalar_or_list(index)?;
    }
    if let Some(conditions) = mapping.get("conditions") {
        result.conditions = Some(super::rule::parse_search_value(conditions)?);
    }
    if let Some(rewrite) = mapping.get("rewrite") {
        result.rewrite = parse_logsource(rewrite)?;
    }

    Ok(result)
}

/// Accepts either a single scalar or a list of scalars.
pub(crate) fn scalar_or_list(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Sequence(entries) => entries
            .iter()
            .map(|entry| {
                scalar_to_string(entry).ok_or_else(|| {
                    TranspileError::YamlError("expected a scalar list entry".to_string())
                })
            })
            .collect(),
        other => scalar_to_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| TranspileError::YamlError("expected a scalar or list".to_string())),
    }
}
