//! Query compilation for externally parsed rules.
//!
//! Compilation runs in three passes: meta entries render to plain strings,
//! string definitions compile to filter fragments, and the condition
//! expression serializes with plain `of` sets expanded. `$identifier`
//! references in the condition are then substituted with their fragments,
//! longest identifier first so `$ab` is never clobbered by `$a`.

use crate::context::CompileContext;
use crate::error::{Result, TranspileError};
use crate::yara::ast::{MetaValue, Rule, StringDef, StringValue};
use crate::yara::config::{merge_field_mappings, Config};
use crate::yara::modifiers::TextModifierChain;
use crate::yara::serializer::{serialize_hex, serialize_regex, ExpressionSerializer};
use std::collections::{BTreeMap, HashMap};

const QUERY_PREFIX: &str = "sourcetype='*' eql select * from _source_ where ";

/// Compiles one rule into a backend query.
pub struct RuleEvaluator<'a> {
    rule: &'a Rule,
    field_mappings: HashMap<String, Vec<String>>,
}

impl<'a> RuleEvaluator<'a> {
    pub fn for_rule(rule: &'a Rule) -> Self {
        RuleEvaluator {
            rule,
            field_mappings: HashMap::new(),
        }
    }

    /// Apply the field mappings of an ordered config list.
    pub fn with_configs(mut self, configs: &[Config]) -> Self {
        self.field_mappings = merge_field_mappings(configs);
        self
    }

    pub fn rule(&self) -> &Rule {
        self.rule
    }

    pub fn compile(&self, ctx: &CompileContext) -> Result<CompileOutput> {
        ctx.check()?;

        let mut output = CompileOutput {
            identifier: self.rule.identifier.clone(),
            ..CompileOutput::default()
        };

        for meta in &self.rule.meta {
            let value = match &meta.value {
                MetaValue::Text(text) => text.clone(),
                MetaValue::Number(number) => number.to_string(),
                MetaValue::Boolean(flag) => flag.to_string(),
            };
            output.meta_results.insert(meta.key.clone(), value);
        }

        for def in &self.rule.strings {
            ctx.check()?;
            let fragment = self.compile_string(def).map_err(|err| {
                TranspileError::Evaluation(format!("string {}: {err}", def.identifier))
            })?;
            output.string_results.insert(def.identifier.clone(), fragment);
        }

        ctx.check()?;
        let serializer = ExpressionSerializer::new(&self.rule.strings);
        let condition = serializer.serialize(&self.rule.condition)?;
        output.condition_result = substitute_fragments(condition, &output.string_results);
        output.query = format!("{QUERY_PREFIX}{}", output.condition_result);

        Ok(output)
    }

    fn compile_string(&self, def: &StringDef) -> Result<String> {
        match &def.value {
            StringValue::Text { text, modifiers } => {
                let chain = TextModifierChain::from_modifiers(modifiers)?;
                let fields = match self.field_mappings.get(&def.identifier) {
                    Some(fields) if !fields.is_empty() => fields.clone(),
                    _ => vec![def.identifier.clone()],
                };
                let comparisons: Vec<String> = fields
                    .iter()
                    .map(|field| chain.render(field, text))
                    .collect();
                if comparisons.len() > 1 {
                    Ok(format!("({})", comparisons.join(" or ")))
                } else {
                    Ok(comparisons.join(" or "))
                }
            }
            StringValue::Hex(tokens) => {
                Ok(format!("{} = {}", def.identifier, serialize_hex(tokens)?))
            }
            StringValue::Regex(regex) => {
                Ok(format!("{} = {}", def.identifier, serialize_regex(regex)))
            }
        }
    }
}

/// Replace `$identifier` references with compiled fragments, longest
/// identifier first.
fn substitute_fragments(condition: String, fragments: &BTreeMap<String, String>) -> String {
    let mut identifiers: Vec<&String> = fragments.keys().collect();
    identifiers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut condition = condition;
    for identifier in identifiers {
        let reference = format!("${identifier}");
        if condition.contains(&reference) {
            condition = condition.replace(&reference, &fragments[identifier]);
        }
    }
    condition
}

/// Everything compilation produced for one rule.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub identifier: String,
    pub meta_results: BTreeMap<String, String>,
    /// String identifier to compiled filter fragment.
    pub string_results: BTreeMap<String, String>,
    /// The condition with all string references substituted.
    pub condition_result: String,
    pub query: String,
}

impl CompileOutput {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "identifier": self.identifier,
            "meta": self.meta_results,
            "strings": self.string_results,
            "condition": self.condition_result,
            "query": self.query,
        })
    }
}
