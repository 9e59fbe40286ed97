//! Backend configuration for externally parsed rule sets.
//!
//! These configs are flatter than the detection-rule ones: field mappings
//! keyed by string identifier, a single log-source label, and placeholder
//! value lists. No log-source routing or rewriting applies here.

use crate::error::{Result, TranspileError};
use crate::sigma::config::scalar_or_list;
use serde_yaml::Value;
use std::collections::HashMap;

/// A parsed configuration document.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub title: String,
    /// Application-order hint; informational only.
    pub order: i64,
    /// Backend names this config is compatible with.
    pub backends: Vec<String>,
    /// String identifier to target event field names, in declaration order.
    pub field_mappings: Vec<(String, Vec<String>)>,
    /// Free-form log source label.
    pub logsource: String,
    pub placeholders: HashMap<String, Vec<String>>,
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
        logsource: mapping
            .get("logsource")
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
        for (identifier, targets) in entries {
            let identifier = identifier.as_str().ok_or_else(|| {
                TranspileError::YamlError("fieldmapping keys must be strings".to_string())
            })?;
            config
                .field_mappings
                .push((identifier.to_string(), scalar_or_list(targets)?));
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

/// Merge the field mappings of an ordered config list. Later configs append;
/// duplicates are kept.
pub(crate) fn merge_field_mappings(configs: &[Config]) -> HashMap<String, Vec<String>> {
    let mut merged: HashMap<String, Vec<String>> = HashMap::new();
    for config in configs {
        for (identifier, targets) in &config.field_mappings {
            merged
                .entry(identifier.clone())
                .or_default()
                .extend(targets.iter().cloned());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_CONFIG: &str = r#"
title: Generic Backend
order: 10
backends:
    - cql
logsource: endpoint
fieldmappings:
    suspicious_path: file_path
    command:
        - command_line
        - process_args
placeholders:
    admins:
        - alice
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = parse_config(BASIC_CONFIG).unwrap();
        assert_eq!(config.title, "Generic Backend");
        assert_eq!(config.order, 10);
        assert_eq!(config.backends, vec!["cql"]);
        assert_eq!(config.logsource, "endpoint");
    }

    #[test]
    fn test_field_mapping_scalar_and_list() {
        let config = parse_config(BASIC_CONFIG).unwrap();
        assert_eq!(
            config.field_mappings,
            vec![
                ("suspicious_path".to_string(), vec!["file_path".to_string()]),
                (
                    "command".to_string(),
                    vec!["command_line".to_string(), "process_args".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_placeholders() {
        let config = parse_config(BASIC_CONFIG).unwrap();
        assert_eq!(
            config.placeholders.get("admins"),
            Some(&vec!["alice".to_string()])
        );
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let first = parse_config("title: A\nfieldmappings:\n    cmd: command_line\n").unwrap();
        let second = parse_config("title: B\nfieldmappings:\n    cmd: command_line\n").unwrap();
        let merged = merge_field_mappings(&[first, second]);
        assert_eq!(
            merged.get("cmd"),
            Some(&vec!["command_line".to_string(), "command_line".to_string()])
        );
    }

    #[test]
    fn test_empty_config() {
        let config = parse_config("title: Empty\n").unwrap();
        assert!(config.field_mappings.is_empty());
        assert!(config.placeholders.is_empty());
        assert!(config.logsource.is_empty());
    }

    #[test]
    fn test_non_mapping_document_is_error() {
        assert!(parse_config("- a\n").is_err());
    }
}
