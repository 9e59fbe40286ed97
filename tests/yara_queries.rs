//! End-to-end query compilation for externally parsed rules.

use anyhow::Result;
use siemql::yara::{
    parse_config, BinaryOp, BytesSequence, Expression, HexToken, Meta, MetaValue, OfSet,
    Quantifier, RegexLiteral, Rule, RuleEvaluator, RuleSet, StringDef, StringModifiers,
    StringValue,
};
use siemql::CompileContext;

fn text_def(identifier: &str, text: &str, modifiers: StringModifiers) -> StringDef {
    StringDef {
        identifier: identifier.to_string(),
        value: StringValue::Text {
            text: text.to_string(),
            modifiers,
        },
    }
}

fn rule(identifier: &str, strings: Vec<StringDef>, condition: Expression) -> Rule {
    Rule {
        identifier: identifier.to_string(),
        tags: Vec::new(),
        global: false,
        private: false,
        meta: Vec::new(),
        strings,
        condition,
    }
}

#[test]
fn full_rule_with_meta_strings_and_condition() -> Result<()> {
    let mut rule = rule(
        "susp_dropper",
        vec![
            text_def(
                "cmd",
                "cmd.exe /c",
                StringModifiers {
                    nocase: true,
                    ..StringModifiers::default()
                },
            ),
            StringDef {
                identifier: "magic".to_string(),
                value: StringValue::Hex(vec![HexToken::Bytes(BytesSequence {
                    value: vec![0x4D, 0x5A],
                    mask: vec![0xFF, 0xFF],
                    negated: vec![false, false],
                })]),
            },
            StringDef {
                identifier: "url".to_string(),
                value: StringValue::Regex(RegexLiteral {
                    text: "https?://[a-z]+".to_string(),
                    case_insensitive: true,
                    dot_all: false,
                }),
            },
        ],
        Expression::And(vec![
            Expression::StringIdentifier("cmd".to_string()),
            Expression::Or(vec![
                Expression::StringIdentifier("magic".to_string()),
                Expression::StringIdentifier("url".to_string()),
            ]),
        ]),
    );
    rule.meta = vec![Meta {
        key: "author".to_string(),
        value: MetaValue::Text("analyst".to_string()),
    }];

    let output = RuleEvaluator::for_rule(&rule).compile(&CompileContext::new())?;
    assert_eq!(output.meta_results["author"], "analyst");
    assert_eq!(output.string_results["cmd"], "cmd like '%cmd.exe /c%'");
    assert_eq!(output.string_results["magic"], "magic = { 4D 5A }");
    assert_eq!(output.string_results["url"], "url = /https?://[a-z]+/i");
    assert_eq!(
        output.condition_result,
        "cmd like '%cmd.exe /c%' and ( magic = { 4D 5A } or url = /https?://[a-z]+/i )"
    );
    assert_eq!(
        output.query,
        format!(
            "sourcetype='*' eql select * from _source_ where {}",
            output.condition_result
        )
    );
    Ok(())
}

#[test]
fn config_field_mappings_apply_to_text_strings() -> Result<()> {
    let rule = rule(
        "mapped",
        vec![text_def("cmd", "whoami", StringModifiers::default())],
        Expression::StringIdentifier("cmd".to_string()),
    );
    let config = parse_config(
        r#"
title: Endpoint Backend
fieldmappings:
    cmd:
        - command_line
        - process_args
"#,
    )?;
    let output = RuleEvaluator::for_rule(&rule)
        .with_configs(std::slice::from_ref(&config))
        .compile(&CompileContext::new())?;
    assert_eq!(
        output.condition_result,
        "(command_line like '%whoami%' or process_args like '%whoami%')"
    );
    Ok(())
}

#[test]
fn k_of_them_expands_to_combinations() -> Result<()> {
    let rule = rule(
        "combos",
        vec![
            text_def("a", "one", StringModifiers::default()),
            text_def("b", "two", StringModifiers::default()),
            text_def("c", "three", StringModifiers::default()),
        ],
        Expression::ForOf {
            quantifier: Quantifier::Expr(Box::new(Expression::Number(2))),
            set: OfSet::Them,
            range: None,
            at: None,
            body: None,
        },
    );
    let output = RuleEvaluator::for_rule(&rule).compile(&CompileContext::new())?;
    assert_eq!(
        output.condition_result,
        "((a like '%one%' and b like '%two%') or (a like '%one%' and c like '%three%') \
         or (b like '%two%' and c like '%three%'))"
    );
    Ok(())
}

#[test]
fn count_and_offset_references_survive_serialization() -> Result<()> {
    let rule = rule(
        "counted",
        vec![text_def("a", "x", StringModifiers::default())],
        Expression::And(vec![
            Expression::Binary {
                op: BinaryOp::Gt,
                left: Box::new(Expression::StringCount("a".to_string())),
                right: Box::new(Expression::Number(2)),
            },
            Expression::Binary {
                op: BinaryOp::In,
                left: Box::new(Expression::StringIdentifier("a".to_string())),
                right: Box::new(Expression::Range {
                    start: Box::new(Expression::Number(0)),
                    end: Box::new(Expression::Number(100)),
                }),
            },
        ]),
    );
    let output = RuleEvaluator::for_rule(&rule).compile(&CompileContext::new())?;
    assert_eq!(
        output.condition_result,
        "#a > 2 and a like '%x%' in (0..100)"
    );
    Ok(())
}

#[test]
fn rule_set_batch_compilation() -> Result<()> {
    let rule_set = RuleSet {
        imports: vec!["pe".to_string()],
        rules: vec![
            rule(
                "first",
                vec![text_def("a", "alpha", StringModifiers::default())],
                Expression::StringIdentifier("a".to_string()),
            ),
            rule(
                "second",
                vec![text_def(
                    "bad",
                    "x",
                    StringModifiers {
                        xor: Some((1, 5)),
                        ..StringModifiers::default()
                    },
                )],
                Expression::StringIdentifier("bad".to_string()),
            ),
        ],
    };
    let results = siemql::compile_rule_set(&CompileContext::new(), &rule_set, &[]);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    Ok(())
}
