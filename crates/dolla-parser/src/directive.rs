// File: src/directive.rs
// Purpose: Identify and structurally validate directives ($if, $loop, :else)

use crate::context::Context;
use crate::symbols::{lookup_condition, reference};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static NUMBER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

/// Condition used by a bare `:else`
pub const ALWAYS_TRUE: &str = "1 === 1";

/// A structurally valid directive
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    If { condition: String },    // $if x eq 3
    Loop { collection: String, alias: String }, // $loop items as item
    Else { condition: String },  // :else | :else if x eq 3
}

/// Outcome of `validate`; `Invalid` is a sentinel, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(Statement),
    Invalid(&'static str),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn statement(&self) -> Option<&Statement> {
        match self {
            Validation::Valid(statement) => Some(statement),
            Validation::Invalid(_) => None,
        }
    }
}

/// Split directive text into whitespace-delimited segments
pub fn segments(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Validate a directive given as segments, e.g. `["$loop", "items", "as", "item"]`.
///
/// `input` holds the render bindings, `variables` the loop/local bindings.
/// Keywords are matched case-insensitively.
pub fn validate<S: AsRef<str>>(segments: &[S], input: &Context, variables: &Context) -> Validation {
    let Some(command) = segments.first().map(|s| s.as_ref().to_ascii_lowercase()) else {
        return Validation::Invalid("empty directive");
    };

    let result = match command.as_str() {
        "$loop" => validate_loop(segments, input, variables),
        ":else" if segments.len() == 1 => Ok(Statement::Else {
            condition: ALWAYS_TRUE.to_string(),
        }),
        // `:else if ...` is validated as `$if ...`
        ":else" => {
            if !segments[1].as_ref().eq_ignore_ascii_case("if") {
                Err("expected `if` after `:else`")
            } else {
                build_condition(&segments[2..], input, variables)
                    .map(|condition| Statement::Else { condition })
            }
        }
        "$if" => build_condition(&segments[1..], input, variables)
            .map(|condition| Statement::If { condition }),
        _ => Err("unknown directive"),
    };

    match result {
        Ok(statement) => {
            debug!(?statement, "validated directive");
            Validation::Valid(statement)
        }
        Err(reason) => Validation::Invalid(reason),
    }
}

fn validate_loop<S: AsRef<str>>(
    segments: &[S],
    input: &Context,
    variables: &Context,
) -> Result<Statement, &'static str> {
    let [_, collection, keyword, alias] = segments else {
        return Err("a loop takes exactly `$loop <collection> as <alias>`");
    };
    let collection = collection.as_ref();

    if !input.contains_key(collection) && !variables.contains_key(collection) {
        return Err("loop collection is not defined");
    }
    if loop_items(collection, input, variables).is_none() {
        return Err("loop collection is not an array");
    }
    if !keyword.as_ref().eq_ignore_ascii_case("as") {
        return Err("expected `as` in loop");
    }

    Ok(Statement::Loop {
        collection: collection.to_string(),
        alias: alias.as_ref().to_string(),
    })
}

/// Build the evaluator-ready condition for the segments after `$if`
fn build_condition<S: AsRef<str>>(
    segments: &[S],
    input: &Context,
    variables: &Context,
) -> Result<String, &'static str> {
    if segments.is_empty() {
        return Err("missing condition");
    }

    let mut script = String::new();
    let mut in_literal = false;

    for segment in segments {
        let segment = segment.as_ref();

        // Literal segments pass through verbatim until one ends with a quote
        let opens = !in_literal && segment.starts_with('"');
        if in_literal || opens {
            script.push_str(segment);
            script.push(' ');
            let body = if opens { &segment[1..] } else { segment };
            in_literal = !body.ends_with('"');
            continue;
        }

        if let Some(op) = lookup_condition(segment) {
            script.push_str(op);
        } else if NUMBER_LITERAL.is_match(segment) || segment == "true" || segment == "false" {
            script.push_str(segment);
            script.push(' ');
        } else if segment.contains('"') {
            return Err("stray quote in condition");
        } else if input.resolve(segment).is_some() {
            script.push_str(&reference("input", segment));
            script.push(' ');
        } else {
            script.push_str(&reference("variables", segment));
            script.push(' ');
        }
    }

    if in_literal {
        return Err("unterminated string literal");
    }

    Ok(script)
}

/// Items of a loop collection, looked up in `input` first, then `variables`
pub fn loop_items<'a>(collection: &str, input: &'a Context, variables: &'a Context) -> Option<&'a [Value]> {
    input
        .get(collection)
        .and_then(Value::as_array)
        .or_else(|| variables.get(collection).and_then(Value::as_array))
}

impl Statement {
    /// Condition text for `If`/`Else`, `None` for loops
    pub fn condition(&self) -> Option<&str> {
        match self {
            Statement::If { condition } | Statement::Else { condition } => Some(condition),
            Statement::Loop { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items() -> Context {
        Context::new().with_var("items", vec![Value::from(1), Value::from(2)])
    }

    #[test]
    fn test_loop_valid() {
        let result = validate(&["$loop", "items", "as", "item"], &items(), &Context::new());
        assert_eq!(
            result,
            Validation::Valid(Statement::Loop {
                collection: "items".to_string(),
                alias: "item".to_string()
            })
        );
    }

    #[test]
    fn test_loop_keywords_case_insensitive() {
        let result = validate(&["$LOOP", "items", "AS", "item"], &items(), &Context::new());
        assert!(result.is_valid());
    }

    #[test]
    fn test_loop_wrong_arity() {
        let result = validate(&["$loop", "items", "item"], &items(), &Context::new());
        assert!(!result.is_valid());
    }

    #[test]
    fn test_loop_requires_array() {
        let input = Context::new().with_var("items", "nope");
        assert_eq!(
            validate(&["$loop", "items", "as", "item"], &input, &Context::new()),
            Validation::Invalid("loop collection is not an array")
        );
        assert_eq!(
            validate(&["$loop", "other", "as", "item"], &input, &Context::new()),
            Validation::Invalid("loop collection is not defined")
        );
        assert!(!validate(&["$loop", "items", "in", "item"], &items(), &Context::new()).is_valid());
    }

    #[test]
    fn test_loop_over_variables() {
        let variables = Context::new().with_var("rows", vec![Value::from("a")]);
        let result = validate(&["$loop", "rows", "as", "row"], &Context::new(), &variables);
        assert!(result.is_valid());
        assert_eq!(loop_items("rows", &Context::new(), &variables).map(<[Value]>::len), Some(1));
    }

    #[test]
    fn test_if_condition() {
        let input = Context::new().with_var("x", 3);
        let result = validate(&segments("$if x eq 3 and y -EQ 2"), &input, &Context::new());
        assert_eq!(
            result.statement().and_then(Statement::condition),
            Some(r#"input["x"] == 3 && variables["y"] !== 2 "#)
        );
    }

    #[test]
    fn test_if_string_literal_spans_segments() {
        let input = Context::new().with_var("name", "a b");
        let result = validate(&segments(r#"$if name eq "a and b" or name eq "x""#), &input, &Context::new());
        assert_eq!(
            result.statement().and_then(Statement::condition),
            Some(r#"input["name"] == "a and b" || input["name"] == "x" "#)
        );
    }

    #[test]
    fn test_else_forms() {
        let empty = Context::new();
        assert_eq!(
            validate(&[":else"], &empty, &empty),
            Validation::Valid(Statement::Else {
                condition: ALWAYS_TRUE.to_string()
            })
        );
        let input = Context::new().with_var("x", 1);
        assert_eq!(
            validate(&segments(":else if x > 0"), &input, &empty),
            Validation::Valid(Statement::Else {
                condition: r#"input["x"] > 0 "#.to_string()
            })
        );
        assert!(!validate(&segments(":else x > 0"), &input, &empty).is_valid());
    }

    #[test]
    fn test_invalid_forms() {
        let empty = Context::new();
        assert!(!validate::<&str>(&[], &empty, &empty).is_valid());
        assert!(!validate(&["$if"], &empty, &empty).is_valid());
        assert!(!validate(&["$while", "x"], &empty, &empty).is_valid());
        assert!(!validate(&segments(r#"$if x eq "open"#), &empty, &empty).is_valid());
    }
}
