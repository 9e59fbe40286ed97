//! Rule compilation into backend query strings.
//!
//! Compilation runs in two phases per condition. The search phase turns
//! every named search into a list of filter fragments via the modifier
//! pipeline and the resolved field mappings. The condition phase renders the
//! condition AST into a token stream, substitutes search names with their
//! fragments, and assembles the final query with the aggregation or
//! select-all clause and the log-source prefix.
//!
//! Errors are isolated per condition index: a condition that references a
//! failed search or an unsupported aggregation is recorded as failed while
//! its siblings still compile.

use crate::context::{CompileContext, PlaceholderExpander};
use crate::error::{Result, TranspileError};
use crate::glob::glob_match;
use crate::sigma::ast::{AggregationExpr, AggregationFunc, SearchExpr};
use crate::sigma::config::Config;
use crate::sigma::modifiers::ModifierChain;
use crate::sigma::resolver::{resolve, Resolution};
use crate::sigma::rule::{Rule, Search};
use serde_json::json;
use std::collections::BTreeMap;

/// Compiles one rule against an ordered config list.
pub struct RuleEvaluator<'a> {
    rule: &'a Rule,
    resolution: Resolution,
    case_sensitive: bool,
    expander: Option<&'a dyn PlaceholderExpander>,
}

impl<'a> RuleEvaluator<'a> {
    /// Build an evaluator for a rule with no configs.
    pub fn for_rule(rule: &'a Rule) -> Self {
        RuleEvaluator {
            rule,
            resolution: resolve(rule, &[]),
            case_sensitive: false,
            expander: None,
        }
    }

    /// Resolve the rule against an ordered config list.
    pub fn with_configs(mut self, configs: &[Config]) -> Self {
        self.resolution = resolve(self.rule, configs);
        self
    }

    /// Compare values without case folding.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Install a placeholder expander for `%name%` values.
    pub fn with_placeholder_expander(mut self, expander: &'a dyn PlaceholderExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    /// The indexes this rule applies to, from the resolved configs.
    pub fn indexes(&self) -> &[String] {
        &self.resolution.indexes
    }

    /// Extra search conditions from matched logsource mappings.
    pub fn index_conditions(&self) -> &[Search] {
        &self.resolution.conditions
    }

    /// The rule's log source after config rewrites.
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Compile every condition of the rule.
    ///
    /// Only cancellation aborts the whole compile; per-search and
    /// per-condition failures are recorded in the output.
    pub fn compile(&self, ctx: &CompileContext) -> Result<CompileOutput> {
        let mut output = CompileOutput::default();

        for (name, search) in &self.rule.detection.searches {
            ctx.check()?;
            match self.evaluate_search(ctx, search) {
                Ok(filters) => {
                    output.search_results.insert(name.clone(), filters);
                }
                Err(TranspileError::Cancelled) => return Err(TranspileError::Cancelled),
                Err(err) => {
                    output.search_errors.insert(name.clone(), err);
                }
            }
        }

        for (index, condition) in self.rule.detection.conditions.iter().enumerate() {
            ctx.check()?;

            let tokens = self.render_search_expr(&condition.search, Vec::new(), true);
            output.condition_results.insert(index, tokens.clone());

            let aggregation = match &condition.aggregation {
                Some(aggregation) => match self.render_aggregation(aggregation) {
                    Ok(rendered) => {
                        output.aggregation_results.insert(index, rendered.clone());
                        Some(rendered)
                    }
                    Err(err) => {
                        output.errors.insert(index, err);
                        continue;
                    }
                },
                None => None,
            };

            match self.assemble(
                &tokens,
                aggregation.as_deref(),
                &output.search_results,
                &output.search_errors,
            ) {
                Ok(compiled) => {
                    output.queries.insert(index, compiled);
                }
                Err(err) => {
                    output.errors.insert(index, err);
                }
            }
        }

        Ok(output)
    }

    /// Search phase: one filter fragment per field matcher, event matchers
    /// flattened into the search's fragment list.
    fn evaluate_search(&self, ctx: &CompileContext, search: &Search) -> Result<Vec<String>> {
        let matchers = match search {
            Search::Keywords(_) => {
                return Err(TranspileError::UnsupportedConstruct(
                    "keyword searches are not supported".to_string(),
                ));
            }
            Search::EventMatchers(matchers) => matchers,
        };

        let mut filters = Vec::new();
        for event_matcher in matchers {
            for field_matcher in event_matcher {
                let mut modifiers = field_matcher.modifiers.as_slice();
                let all_values_must_match = modifiers.last().map(String::as_str) == Some("all");
                if all_values_must_match {
                    modifiers = &modifiers[..modifiers.len() - 1];
                }

                let chain = ModifierChain::parse(modifiers, self.case_sensitive)?;
                let values = self.matcher_values(ctx, &field_matcher.values)?;
                let fields = self.resolution.map_field(&field_matcher.field);

                filters.push(self.render_filter(&chain, &fields, &values, all_values_must_match)?);
            }
        }
        Ok(filters)
    }

    /// Resolve raw matcher values, expanding `%placeholder%` entries.
    fn matcher_values(
        &self,
        ctx: &CompileContext,
        values: &[serde_yaml::Value],
    ) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => "null".to_string(),
                other => {
                    return Err(TranspileError::Evaluation(format!(
                        "expected scalar field matching value, got {other:?}"
                    )));
                }
            };

            if value.len() >= 2 && value.starts_with('%') && value.ends_with('%') {
                let name = &value[1..value.len() - 1];
                ctx.check()?;
                resolved.extend(self.expand_placeholder(ctx, name)?);
            } else {
                resolved.push(value);
            }
        }
        Ok(resolved)
    }

    fn expand_placeholder(&self, ctx: &CompileContext, name: &str) -> Result<Vec<String>> {
        if let Some(expander) = self.expander {
            return expander.expand(ctx, name);
        }
        if let Some(values) = self.resolution.placeholders.get(name) {
            return Ok(values.clone());
        }
        Err(TranspileError::PlaceholderExpansion(format!(
            "can't expand %{name}%, no placeholder expander configured"
        )))
    }

    /// Combine values (OR, or AND under `|all`) and mapped fields (OR),
    /// parenthesizing each level only when it has more than one entry.
    fn render_filter(
        &self,
        chain: &ModifierChain,
        fields: &[&str],
        values: &[String],
        all_values_must_match: bool,
    ) -> Result<String> {
        let value_sep = if all_values_must_match { " and " } else { " or " };

        let mut per_field = Vec::with_capacity(fields.len());
        for field in fields {
            let comparisons = values
                .iter()
                .map(|value| chain.render(field, value))
                .collect::<Result<Vec<_>>>()?;
            if comparisons.len() > 1 {
                per_field.push(format!("({})", comparisons.join(value_sep)));
            } else {
                per_field.push(comparisons.join(""));
            }
        }

        if per_field.len() > 1 {
            Ok(format!("({})", per_field.join(" or ")))
        } else {
            Ok(per_field.join(""))
        }
    }

    /// Condition phase: render the AST to a token stream. Search names stay
    /// as bare tokens for the assembly step to substitute.
    fn render_search_expr(
        &self,
        expr: &SearchExpr,
        mut tokens: Vec<String>,
        top_level: bool,
    ) -> Vec<String> {
        match expr {
            SearchExpr::And(nodes) => self.render_list(nodes, " and ", tokens, top_level),
            SearchExpr::Or(nodes) => self.render_list(nodes, " or ", tokens, top_level),
            SearchExpr::Not(inner) => {
                tokens.push(" not ".to_string());
                self.render_search_expr(inner, tokens, false)
            }
            SearchExpr::Identifier(name) => {
                tokens.push(name.clone());
                tokens
            }
            SearchExpr::OneOfThem => self.render_expansion(&self.search_names(), " or ", tokens, top_level),
            SearchExpr::AllOfThem => self.render_expansion(&self.search_names(), " and ", tokens, top_level),
            SearchExpr::OneOfIdentifier(name) | SearchExpr::OneOfPattern(name) => {
                self.render_expansion(&self.matching_names(name), " or ", tokens, top_level)
            }
            SearchExpr::AllOfIdentifier(name) | SearchExpr::AllOfPattern(name) => {
                self.render_expansion(&self.matching_names(name), " and ", tokens, top_level)
            }
        }
    }

    fn render_list(
        &self,
        nodes: &[SearchExpr],
        separator: &str,
        mut tokens: Vec<String>,
        top_level: bool,
    ) -> Vec<String> {
        let parenthesize = !top_level && nodes.len() > 1;
        if parenthesize {
            tokens.push("(".to_string());
        }
        for (idx, node) in nodes.iter().enumerate() {
            if idx > 0 {
                tokens.push(separator.to_string());
            }
            tokens = self.render_search_expr(node, tokens, false);
        }
        if parenthesize {
            tokens.push(")".to_string());
        }
        tokens
    }

    /// Expand a name set (from `them` or a pattern) into separated tokens.
    fn render_expansion(
        &self,
        names: &[String],
        separator: &str,
        mut tokens: Vec<String>,
        top_level: bool,
    ) -> Vec<String> {
        let parenthesize = !top_level && names.len() > 1;
        if parenthesize {
            tokens.push("(".to_string());
        }
        for (idx, name) in names.iter().enumerate() {
            if idx > 0 {
                tokens.push(separator.to_string());
            }
            tokens.push(name.clone());
        }
        if parenthesize {
            tokens.push(")".to_string());
        }
        tokens
    }

    /// All search names in declaration order.
    fn search_names(&self) -> Vec<String> {
        self.rule
            .detection
            .searches
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Search names matching a `1 of`/`all of` argument, in declaration
    /// order. A bare identifier only matches itself.
    fn matching_names(&self, pattern: &str) -> Vec<String> {
        self.rule
            .detection
            .searches
            .iter()
            .filter(|(name, _)| glob_match(pattern, name))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Assemble the final query from the condition tokens.
    fn assemble(
        &self,
        tokens: &[String],
        aggregation: Option<&str>,
        search_results: &BTreeMap<String, Vec<String>>,
        search_errors: &BTreeMap<String, TranspileError>,
    ) -> Result<CompiledQuery> {
        let mut parts = Vec::with_capacity(tokens.len());
        let mut sources = Vec::new();

        for token in tokens {
            if let Some(err) = search_errors.get(token) {
                return Err(TranspileError::Evaluation(format!(
                    "search {token}: {err}"
                )));
            }
            match search_results.get(token) {
                Some(fragments) => {
                    sources.push(token.clone());
                    if tokens.len() > 1 && fragments.len() > 1 {
                        parts.push(format!("({})", fragments.join(" and ")));
                    } else {
                        parts.push(fragments.join(" and "));
                    }
                }
                None => parts.push(token.clone()),
            }
        }
        let body = parts.join("");

        let mut query = match aggregation {
            Some(aggregation) => {
                // The rendered aggregation carries a marker `|` between its
                // select clause and its group/order tail; the condition body
                // goes in between.
                match aggregation.split_once('|') {
                    Some((head, tail)) => format!("{head}{body} {tail}"),
                    None => format!("{aggregation}{body}"),
                }
            }
            None if tokens.len() > 1 => {
                format!("eql select * from _source_ where _condition_ and ({body})")
            }
            None => format!("eql select * from _source_ where _condition_ and {body}"),
        };

        let logsource = &self.resolution.logsource;
        if !logsource.product.is_empty() && !logsource.service.is_empty() {
            query = format!(
                "sourcetype='{}-{}' {}",
                logsource.product, logsource.service, query
            );
        } else if !logsource.product.is_empty() {
            query = format!("sourcetype like '{}-%' {}", logsource.product, query);
        }

        Ok(CompiledQuery { query, sources })
    }

    /// Render an aggregation clause. The result carries a `|` marker where
    /// the condition body will be spliced in.
    fn render_aggregation(&self, aggregation: &AggregationExpr) -> Result<String> {
        let (func, op, threshold) = match aggregation {
            AggregationExpr::Near(_) => {
                return Err(TranspileError::UnsupportedConstruct(
                    "near aggregations are not supported".to_string(),
                ));
            }
            AggregationExpr::Comparison {
                func,
                op,
                threshold,
            } => (func, op, threshold),
        };

        let field = self.first_mapped(func.field());
        let group_by = self.first_mapped(func.group_by());

        let rendered = if let AggregationFunc::Count { .. } = func {
            match (field.is_empty(), group_by.is_empty()) {
                (true, true) => {
                    "eql select count(*) from _source_ where |order by count(*) desc".to_string()
                }
                (true, false) => format!(
                    "eql select {group_by}, count(*) from _source_ where |group by {group_by} order by count(*) desc"
                ),
                (false, true) => format!(
                    "eql select {field}, count(*) from _source_ where |group by {field} order by count(*) desc"
                ),
                (false, false) => format!(
                    "eql select {field}, {group_by}, count(*) from _source_ where |group by {field}, {group_by} order by count(*) desc"
                ),
            }
        } else {
            if field.is_empty() {
                return Err(TranspileError::Evaluation(format!(
                    "aggregation function {} requires a field",
                    func.name()
                )));
            }
            let name = func.name();
            if group_by.is_empty() {
                format!(
                    "eql select {field}, {name}({field}) from _source_ where |group by {field} order by {name}({field}) desc"
                )
            } else {
                format!(
                    "eql select {field}, {group_by}, {name}({field}) from _source_ where |group by {field}, {group_by} order by {name}({field}) desc"
                )
            }
        };

        Ok(format!("{rendered} {op} {}", *threshold as i64))
    }

    /// First mapped target name, or the field itself.
    fn first_mapped<'b>(&'b self, field: &'b str) -> &'b str {
        if field.is_empty() {
            return field;
        }
        self.resolution
            .field_mappings
            .get(field)
            .and_then(|targets| targets.first())
            .map(String::as_str)
            .unwrap_or(field)
    }
}

/// One compiled query and the search names that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub query: String,
    pub sources: Vec<String>,
}

/// The full result of compiling a rule.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Search name to its filter fragments.
    pub search_results: BTreeMap<String, Vec<String>>,
    /// Search name to the error that prevented its evaluation.
    pub search_errors: BTreeMap<String, TranspileError>,
    /// Condition index to its rendered token stream.
    pub condition_results: BTreeMap<usize, Vec<String>>,
    /// Condition index to its rendered aggregation clause.
    pub aggregation_results: BTreeMap<usize, String>,
    /// Condition index to its final query.
    pub queries: BTreeMap<usize, CompiledQuery>,
    /// Condition index to the error that prevented its compilation.
    pub errors: BTreeMap<usize, TranspileError>,
}

impl CompileOutput {
    /// JSON export of the compiled queries and errors.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "queries": self
                .queries
                .iter()
                .map(|(index, compiled)| {
                    json!({
                        "condition": index,
                        "query": compiled.query,
                        "sources": compiled.sources,
                    })
                })
                .collect::<Vec<_>>(),
            "errors": self
                .errors
                .iter()
                .map(|(index, err)| json!({ "condition": index, "error": err.to_string() }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigma::config::parse_config;
    use crate::sigma::rule::parse_rule;

    fn compile(rule_yaml: &str) -> CompileOutput {
        let rule = parse_rule(rule_yaml).unwrap();
        RuleEvaluator::for_rule(&rule)
            .compile(&CompileContext::new())
            .unwrap()
    }

    fn compile_with(rule_yaml: &str, config_yaml: &str) -> CompileOutput {
        let rule = parse_rule(rule_yaml).unwrap();
        let config = parse_config(config_yaml).unwrap();
        RuleEvaluator::for_rule(&rule)
            .with_configs(&[config])
            .compile(&CompileContext::new())
            .unwrap()
    }

    #[test]
    fn test_single_selection_query() {
        let output = compile(
            r#"
title: T
logsource:
    product: windows
    service: sysmon
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "sourcetype='windows-sysmon' eql select * from _source_ where _condition_ and eventid = '1'"
        );
        assert_eq!(output.queries[&0].sources, vec!["selection"]);
    }

    #[test]
    fn test_product_only_prefix() {
        let output = compile(
            r#"
title: T
logsource:
    product: windows
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        );
        assert!(output.queries[&0]
            .query
            .starts_with("sourcetype like 'windows-%' "));
    }

    #[test]
    fn test_no_logsource_prefix() {
        let output = compile(
            r#"
title: T
logsource:
    service: sysmon
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        );
        assert!(output.queries[&0].query.starts_with("eql select"));
    }

    #[test]
    fn test_and_not_condition() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 1
    filter:
        User: SYSTEM
    condition: selection and not filter
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and (eventid = '1' and  not user = 'system')"
        );
    }

    #[test]
    fn test_multi_fragment_search_parenthesized_in_multi_token_body() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 1
        User: admin
    other:
        EventID: 2
    condition: selection or other
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and ((eventid = '1' and user = 'admin') or eventid = '2')"
        );
    }

    #[test]
    fn test_single_token_multi_fragment_not_parenthesized() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 1
        User: admin
    condition: selection
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and eventid = '1' and user = 'admin'"
        );
    }

    #[test]
    fn test_value_list_is_or_parenthesized() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        CommandLine:
            - whoami
            - net user
    condition: selection
"#,
        );
        assert_eq!(
            output.search_results["selection"],
            vec!["(commandline = 'whoami' or commandline = 'net user')"]
        );
    }

    #[test]
    fn test_all_modifier_turns_values_into_and() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        CommandLine|contains|all:
            - -enc
            - -nop
    condition: selection
"#,
        );
        assert_eq!(
            output.search_results["selection"],
            vec!["(commandline like '%-enc%' and commandline like '%-nop%')"]
        );
    }

    #[test]
    fn test_field_mapping_applies() {
        let output = compile_with(
            r#"
title: T
logsource: {}
detection:
    selection:
        Image|contains: powershell
    condition: selection
"#,
            "title: C\nfieldmappings:\n    Image: process_path\n",
        );
        assert_eq!(
            output.search_results["selection"],
            vec!["process_path like '%powershell%'"]
        );
    }

    #[test]
    fn test_multi_field_mapping_is_or_parenthesized() {
        let output = compile_with(
            r#"
title: T
logsource: {}
detection:
    selection:
        Image: cmd.exe
    condition: selection
"#,
            "title: C\nfieldmappings:\n    Image:\n        - path_a\n        - path_b\n",
        );
        assert_eq!(
            output.search_results["selection"],
            vec!["(path_a = 'cmd.exe' or path_b = 'cmd.exe')"]
        );
    }

    #[test]
    fn test_one_of_them_expands_in_declaration_order() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    alpha:
        A: 1
    beta:
        B: 2
    condition: 1 of them
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and (a = '1' or b = '2')"
        );
    }

    #[test]
    fn test_pattern_expansion_excludes_non_matching() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection_a:
        A: 1
    selection_b:
        B: 2
    other:
        C: 3
    condition: 1 of selection_*
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and (a = '1' or b = '2')"
        );
    }

    #[test]
    fn test_all_of_pattern_uses_and() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    filter_a:
        A: 1
    filter_b:
        B: 2
    condition: all of filter_*
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select * from _source_ where _condition_ and (a = '1' and b = '2')"
        );
    }

    #[test]
    fn test_count_aggregation_assembly() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 4625
    condition: selection | count() by user > 10
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select user, count(*) from _source_ where eventid = '4625' group by user order by count(*) desc > 10"
        );
    }

    #[test]
    fn test_count_field_aggregation_uses_field_mapping() {
        let output = compile_with(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 4625
    condition: selection | count(TargetUser) > 5
"#,
            "title: C\nfieldmappings:\n    TargetUser: target_user\n",
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select target_user, count(*) from _source_ where eventid = '4625' group by target_user order by count(*) desc > 5"
        );
    }

    #[test]
    fn test_sum_aggregation() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 5156
    condition: selection | sum(bytes) by host >= 1024
"#,
        );
        assert_eq!(
            output.queries[&0].query,
            "eql select bytes, host, sum(bytes) from _source_ where eventid = '5156' group by bytes, host order by sum(bytes) desc >= 1024"
        );
    }

    #[test]
    fn test_near_aggregation_is_isolated_error() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    a:
        A: 1
    b:
        B: 2
    condition:
        - a | near b
        - a and b
"#,
        );
        assert!(matches!(
            output.errors[&0],
            TranspileError::UnsupportedConstruct(_)
        ));
        assert!(output.queries.contains_key(&1));
        assert!(!output.queries.contains_key(&0));
    }

    #[test]
    fn test_keyword_search_error_isolated_to_referencing_condition() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    keywords:
        - mimikatz
    selection:
        EventID: 1
    condition:
        - keywords
        - selection
"#,
        );
        assert!(matches!(output.errors[&0], TranspileError::Evaluation(_)));
        assert_eq!(
            output.queries[&1].query,
            "eql select * from _source_ where _condition_ and eventid = '1'"
        );
    }

    #[test]
    fn test_placeholder_without_expander_fails() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        User: '%admins%'
    condition: selection
"#,
        );
        assert!(matches!(output.errors[&0], TranspileError::Evaluation(_)));
        assert!(output.errors[&0]
            .to_string()
            .contains("placeholder expansion error"));
    }

    #[test]
    fn test_placeholder_expander_values() {
        let rule = parse_rule(
            r#"
title: T
logsource: {}
detection:
    selection:
        User: '%admins%'
    condition: selection
"#,
        )
        .unwrap();
        let expander = |_: &CompileContext, name: &str| {
            assert_eq!(name, "admins");
            Ok(vec!["alice".to_string(), "bob".to_string()])
        };
        let output = RuleEvaluator::for_rule(&rule)
            .with_placeholder_expander(&expander)
            .compile(&CompileContext::new())
            .unwrap();
        assert_eq!(
            output.search_results["selection"],
            vec!["(user = 'alice' or user = 'bob')"]
        );
    }

    #[test]
    fn test_placeholder_from_config() {
        let output = compile_with(
            r#"
title: T
logsource: {}
detection:
    selection:
        User: '%admins%'
    condition: selection
"#,
            "title: C\nplaceholders:\n    admins:\n        - alice\n",
        );
        assert_eq!(output.search_results["selection"], vec!["user = 'alice'"]);
    }

    #[test]
    fn test_cancellation_aborts_compile() {
        let rule = parse_rule(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        )
        .unwrap();
        let ctx = CompileContext::new();
        ctx.cancel_handle().cancel();
        let err = RuleEvaluator::for_rule(&rule).compile(&ctx).unwrap_err();
        assert_eq!(err, TranspileError::Cancelled);
    }

    #[test]
    fn test_case_sensitive_mode() {
        let rule = parse_rule(
            r#"
title: T
logsource: {}
detection:
    selection:
        Image|contains: PowerShell
    condition: selection
"#,
        )
        .unwrap();
        let output = RuleEvaluator::for_rule(&rule)
            .case_sensitive(true)
            .compile(&CompileContext::new())
            .unwrap();
        assert_eq!(
            output.search_results["selection"],
            vec!["image like '%PowerShell%'"]
        );
    }

    #[test]
    fn test_rewritten_logsource_used_in_prefix() {
        let output = compile_with(
            r#"
title: T
logsource:
    product: windows
    service: sysmon
detection:
    selection:
        EventID: 1
    condition: selection
"#,
            r#"
title: C
logsources:
    sysmon:
        product: windows
        service: sysmon
        rewrite:
            service: operational
"#,
        );
        assert!(output.queries[&0]
            .query
            .starts_with("sourcetype='windows-operational' "));
    }

    #[test]
    fn test_indexes_accessor() {
        let rule = parse_rule(
            r#"
title: T
logsource:
    product: windows
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        )
        .unwrap();
        let config = parse_config(
            r#"
title: C
logsources:
    win:
        product: windows
        index: windows_index
"#,
        )
        .unwrap();
        let evaluator = RuleEvaluator::for_rule(&rule).with_configs(&[config]);
        assert_eq!(evaluator.indexes(), ["windows_index"]);
    }

    #[test]
    fn test_json_export() {
        let output = compile(
            r#"
title: T
logsource: {}
detection:
    selection:
        EventID: 1
    condition: selection
"#,
        );
        let exported = output.to_json();
        assert_eq!(exported["queries"][0]["condition"], 0);
        assert_eq!(
            exported["queries"][0]["query"],
            "eql select * from _source_ where _condition_ and eventid = '1'"
        );
    }
}
