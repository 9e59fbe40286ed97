//! Layered config resolution.
//!
//! Resolution threads a working copy of the rule's log source through the
//! config list: a mapping matched in an earlier config may rewrite the
//! category/product/service fields, and later configs match against the
//! rewritten values. The parsed rule itself is never modified.

use crate::sigma::config::Config;
use crate::sigma::rule::{Logsource, Rule, Search};
use std::collections::HashMap;

/// The evaluation state derived from a rule and an ordered config list.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// The rule's log source after all matched rewrites.
    pub logsource: Logsource,
    /// Indexes the rule applies to, in config order.
    pub indexes: Vec<String>,
    /// Extra search conditions from matched logsource mappings, ANDed onto
    /// every compiled query.
    pub conditions: Vec<Search>,
    /// Rule field name to target event field names. Later configs append;
    /// duplicates are kept.
    pub field_mappings: HashMap<String, Vec<String>>,
    /// Placeholder value lists merged across configs; later configs win on
    /// name collisions.
    pub placeholders: HashMap<String, Vec<String>>,
}

impl Resolution {
    /// Target field names for a rule field, or the field itself if unmapped.
    pub fn map_field<'a>(&'a self, field: &'a str) -> Vec<&'a str> {
        match self.field_mappings.get(field) {
            Some(targets) if !targets.is_empty() => {
                targets.iter().map(String::as_str).collect()
            }
            _ => vec![field],
        }
    }
}

/// Resolve a rule against an ordered config list.
///
/// An empty config list is a valid mode: the resolution carries the rule's
/// log source verbatim with no indexes or field mappings.
pub fn resolve(rule: &Rule, configs: &[Config]) -> Resolution {
    let mut resolution = Resolution {
        logsource: rule.logsource.clone(),
        ..Resolution::default()
    };

    for config in configs {
        let mut matched = false;

        for (_, mapping) in &config.logsources {
            if !is_relevant(&mapping.logsource, &resolution.logsource) {
                continue;
            }
            matched = true;

            rewrite(&mut resolution.logsource, &mapping.rewrite);
            resolution.indexes.extend(mapping.indexes.iter().cloned());
            if let Some(conditions) = &mapping.conditions {
                resolution.conditions.push(conditions.clone());
            }
        }

        if !matched && !config.default_index.is_empty() {
            resolution.indexes.push(config.default_index.clone());
        }

        for (field, targets) in &config.field_mappings {
            resolution
                .field_mappings
                .entry(field.clone())
                .or_default()
                .extend(targets.iter().cloned());
        }

        for (name, values) in &config.placeholders {
            resolution
                .placeholders
                .insert(name.clone(), values.clone());
        }
    }

    resolution
}

/// A mapping is relevant when each of its non-empty fields equals the rule's
/// current field. Empty mapping fields are wildcards.
fn is_relevant(mapping: &Logsource, current: &Logsource) -> bool {
    (mapping.category.is_empty() || mapping.category == current.category)
        && (mapping.product.is_empty() || mapping.product == current.product)
        && (mapping.service.is_empty() || mapping.service == current.service)
}

/// Non-empty rewrite fields overwrite; empty fields never clear.
fn rewrite(current: &mut Logsource, rewrite: &Logsource) {
    if !rewrite.category.is_empty() {
        current.category = rewrite.category.clone();
    }
    if !rewrite.product.is_empty() {
        current.product = rewrite.product.clone();
    }
    if !rewrite.service.is_empty() {
        current.service = rewrite.service.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigma::config::parse_config;
    use crate::sigma::rule::parse_rule;

    fn windows_rule() -> Rule {
        parse_rule(
            r#"
title: Test Rule
logsource:
    product: windows
    service: sysmon
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_config_list() {
        let rule = windows_rule();
        let resolution = resolve(&rule, &[]);
        assert_eq!(resolution.logsource, rule.logsource);
        assert!(resolution.indexes.is_empty());
        assert_eq!(resolution.map_field("EventID"), vec!["EventID"]);
    }

    #[test]
    fn test_matching_logsource_collects_index() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
logsources:
    sysmon:
        product: windows
        service: sysmon
        index: sysmon_index
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(resolution.indexes, vec!["sysmon_index"]);
    }

    #[test]
    fn test_empty_match_fields_are_wildcards() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
logsources:
    any-windows:
        product: windows
        index: windows_index
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(resolution.indexes, vec!["windows_index"]);
    }

    #[test]
    fn test_non_matching_uses_default_index() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
logsources:
    linux-only:
        product: linux
        index: linux_index
defaultindex: fallback
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(resolution.indexes, vec!["fallback"]);
    }

    #[test]
    fn test_later_config_sees_rewritten_logsource() {
        let rule = windows_rule();
        let first = parse_config(
            r#"
title: First
logsources:
    sysmon:
        product: windows
        service: sysmon
        rewrite:
            service: operational
"#,
        )
        .unwrap();
        let second = parse_config(
            r#"
title: Second
logsources:
    operational:
        service: operational
        index: rewritten_index
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[first, second]);
        assert_eq!(resolution.logsource.service, "operational");
        assert_eq!(resolution.indexes, vec!["rewritten_index"]);
    }

    #[test]
    fn test_rule_not_mutated_by_rewrite() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
logsources:
    sysmon:
        service: sysmon
        rewrite:
            service: other
"#,
        )
        .unwrap();
        let _ = resolve(&rule, &[config]);
        assert_eq!(rule.logsource.service, "sysmon");
    }

    #[test]
    fn test_all_matching_mappings_apply() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
logsources:
    first:
        product: windows
        index: index_a
    second:
        service: sysmon
        index: index_b
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(resolution.indexes, vec!["index_a", "index_b"]);
    }

    #[test]
    fn test_field_mappings_append_without_dedup() {
        let rule = windows_rule();
        let first = parse_config("title: A\nfieldmappings:\n    Image: process_path\n").unwrap();
        let second = parse_config("title: B\nfieldmappings:\n    Image: process_path\n").unwrap();
        let resolution = resolve(&rule, &[first, second]);
        assert_eq!(
            resolution.map_field("Image"),
            vec!["process_path", "process_path"]
        );
    }

    #[test]
    fn test_unmapped_field_is_verbatim() {
        let rule = windows_rule();
        let config = parse_config("title: A\nfieldmappings:\n    Image: process_path\n").unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(resolution.map_field("CommandLine"), vec!["CommandLine"]);
    }

    #[test]
    fn test_placeholders_merged() {
        let rule = windows_rule();
        let config = parse_config(
            r#"
title: C
placeholders:
    admins:
        - alice
"#,
        )
        .unwrap();
        let resolution = resolve(&rule, &[config]);
        assert_eq!(
            resolution.placeholders.get("admins"),
            Some(&vec!["alice".to_string()])
        );
    }
}
