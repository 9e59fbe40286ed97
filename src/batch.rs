//! Parallel batch compilation.
//!
//! Rules compile independently, so batches fan out across a rayon pool.
//! Failures stay per-rule: one bad rule yields an `Err` in its slot while
//! the rest of the batch compiles. Cancelling the shared context stops
//! every in-flight rule at its next checkpoint.

use crate::context::{CompileContext, PlaceholderExpander};
use crate::error::Result;
use crate::{sigma, yara};
use rayon::prelude::*;

/// Per-batch settings shared by every rule.
#[derive(Clone, Copy, Default)]
pub struct BatchOptions<'a> {
    pub case_sensitive: bool,
    pub expander: Option<&'a dyn PlaceholderExpander>,
}

/// Compile a batch of detection rules against one config list.
pub fn compile_rules(
    ctx: &CompileContext,
    rules: &[sigma::Rule],
    configs: &[sigma::Config],
    options: BatchOptions<'_>,
) -> Vec<Result<sigma::CompileOutput>> {
    rules
        .par_iter()
        .map(|rule| {
            let mut evaluator = sigma::RuleEvaluator::for_rule(rule)
                .with_configs(configs)
                .case_sensitive(options.case_sensitive);
            if let Some(expander) = options.expander {
                evaluator = evaluator.with_placeholder_expander(expander);
            }
            evaluator.compile(ctx)
        })
        .collect()
}

/// Compile every rule of an externally parsed rule set.
pub fn compile_rule_set(
    ctx: &CompileContext,
    rule_set: &yara::RuleSet,
    configs: &[yara::Config],
) -> Vec<Result<yara::CompileOutput>> {
    rule_set
        .rules
        .par_iter()
        .map(|rule| {
            yara::RuleEvaluator::for_rule(rule)
                .with_configs(configs)
                .compile(ctx)
        })
        .collect()
}
