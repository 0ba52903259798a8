//! Integration tests for the dolla directive engine
//!
//! Covers the public surface end to end:
//! - Condition translation and evaluation
//! - Directive validation ($if, :else, $loop)
//! - Output tag transforms
//! - Configuration-driven behavior

use dolla::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashSet;

fn keys(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_translate_then_evaluate() {
    let translated = translate("x eq 3", &keys(&["x"])).unwrap();
    assert_eq!(translated, r#"input["x"] == 3"#);

    let predicate = compile(&translated).unwrap();
    let five = Context::new().with_var("x", 5);
    let three = Context::new().with_var("x", 3);
    assert_eq!(predicate.evaluate(&Scope::new(&five)), Ok(false));
    assert_eq!(predicate.evaluate(&Scope::new(&three)), Ok(true));
}

#[rstest]
#[case("`true`")]
#[case("'a == b'")]
#[case("\"x And y || z\"")]
#[case("`it's \"quoted\"`")]
fn test_literals_survive_translation(#[case] literal: &str) {
    let source = format!("name eq {} Or name -eq {}", literal, literal);
    let translated = translate(&source, &keys(&["name"])).unwrap();
    assert_eq!(
        translated,
        format!(r#"input["name"] == {} || input["name"] != {}"#, literal, literal)
    );
}

#[rstest]
#[case("x eq true")]
#[case("x && y")]
#[case("false")]
#[case("(x !== 1)")]
fn test_disallowed_words(#[case] source: &str) {
    let err = translate(source, &keys(&["x", "y"])).unwrap_err();
    assert!(matches!(err, DirectiveError::DisallowedWord { .. }), "{:?}", err);
}

#[rstest]
#[case("`abc")]
#[case("x eq 'abc")]
#[case("\"abc` eq x")]
fn test_unterminated_literals(#[case] source: &str) {
    let err = translate(source, &keys(&["x"])).unwrap_err();
    assert!(matches!(err, DirectiveError::UnterminatedLiteral { .. }), "{:?}", err);
}

#[rstest]
#[case(&["$loop", "items", "as", "item"], true)]
#[case(&["$Loop", "items", "As", "item"], true)]
#[case(&["$loop", "items", "item"], false)]
#[case(&["$loop", "items", "as", "item", "extra"], false)]
#[case(&["$loop", "count", "as", "n"], false)]
#[case(&["$if", "count", "eq", "2"], true)]
#[case(&["$IF", "count", ">=", "1", "and", "count", "<", "3"], true)]
#[case(&["$if"], false)]
#[case(&[":else"], true)]
#[case(&[":else", "if", "count", "mod", "2", "eq", "0"], true)]
#[case(&[":else", "count"], false)]
#[case(&["$each", "items"], false)]
fn test_validation(#[case] directive: &[&str], #[case] valid: bool) {
    let input = Context::from_json(r#"{"items": [1, 2], "count": 2}"#).unwrap();
    assert_eq!(validate(directive, &input, &Context::new()).is_valid(), valid);
}

#[test]
fn test_flatten_examples() {
    let nested = Value::from(serde_json::json!({"a": {"b": 1, "c": 2}}));
    let flat = flatten(&nested, "root").into_inner();
    assert_eq!(flat.len(), 2);
    assert_eq!(flat["root.a.b"], Value::Number(1.0));
    assert_eq!(flat["root.a.c"], Value::Number(2.0));

    let array = Value::from(serde_json::json!({"a": [1, 2]}));
    let flat = flatten(&array, "root");
    assert_eq!(flat.get("root.a"), Some(&Value::from(serde_json::json!([1, 2]))));
}

#[rstest]
#[case("escape", "<a>&", "&lt;a&gt;&amp;")]
#[case("unescape", "&lt;a&gt;&amp;", "<a>&")]
#[case("#", "\"hi\"", "&quot;hi&quot;")]
#[case("@", "  padded  ", "padded")]
#[case("upper", "mixed Case", "MIXED CASE")]
#[case("lower", "MIXED Case", "mixed case")]
#[case("capitalize", "word", "Word")]
fn test_output_tags(#[case] tag: &str, #[case] input: &str, #[case] expected: &str) {
    assert_eq!(apply(tag, &Value::from(input)).unwrap(), expected);
}

#[test]
fn test_escape_unescape_round_trip() {
    let original = "<p class=\"x\">Tom & Jerry's</p>";
    assert_eq!(unescape(&escape(original)), original);
}

#[test]
fn test_render_pass_loop_then_condition_on_alias() {
    let input = Context::from_json(r#"{"scores": [3, 8, 12], "limit": 5}"#).unwrap();
    let pass = RenderPass::new(input);
    let none = Context::new();

    let Outcome::Loop { alias, items } = pass.directive(&segments("$loop scores as score"), &none)
    else {
        panic!("expected a loop");
    };

    let passed: Vec<bool> = items
        .iter()
        .map(|item| {
            let variables = Context::new().with_var(alias.clone(), item.clone());
            pass.directive(&segments("$if score > limit"), &variables) == Outcome::Branch(true)
        })
        .collect();
    assert_eq!(passed, vec![false, true, true]);
}

#[test]
fn test_render_pass_missing_reference_policy() {
    let strict = RenderPass::new(Context::new());
    assert!(!strict.test_condition("x eq 1 Or True", &Context::new()));
    assert_eq!(
        strict.directive(&segments("$if ghost eq 1"), &Context::new()),
        Outcome::Branch(false)
    );

    let mut config = Config::default();
    config.evaluation.missing_references = MissingReference::Null;
    let lenient = RenderPass::with_config(Context::new(), config);
    let predicate = compile(r#"variables["ghost"] == null"#).unwrap();
    assert!(predicate.test(&lenient.scope(&Context::new())));
}

#[test]
fn test_render_pass_output_failures_are_skipped() {
    let pass = RenderPass::new(Context::from_json(r#"{"n": 4, "tags": ["a", "b"]}"#).unwrap());
    assert_eq!(pass.output_path("n", Some("upper")), None);
    assert_eq!(pass.output_path("n", Some("unknown")), None);
    assert_eq!(pass.output_path("n", None).as_deref(), Some("4"));
    assert_eq!(pass.output_path("tags", Some("upper")).as_deref(), Some(r#"["A","B"]"#));
    assert_eq!(pass.output_path("missing", None), None);
}
