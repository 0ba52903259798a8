// File: src/transform.rs
// Purpose: Output tags - named transforms applied to rendered values

use dolla_parser::Value;
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

/// What a transform accepts besides strings and structured values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Numbers, bools and null are rendered through their display form
    Any,
    /// Only strings (structured values are serialized first)
    Text,
}

/// A registered output transform
#[derive(Debug, Clone, Copy)]
pub struct OutputTag {
    pub name: &'static str,
    pub description: &'static str,
    pub input: InputKind,
    transform: fn(&str) -> String,
}

impl OutputTag {
    pub fn run(&self, text: &str) -> String {
        (self.transform)(text)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("unknown output tag `{0}`")]
    UnknownTag(String),

    #[error("output tag `{tag}` expects a string, got {found}")]
    TypeMismatch { tag: String, found: &'static str },
}

const TAGS: [OutputTag; 6] = [
    OutputTag {
        name: "escape",
        description: "Escape HTML special characters",
        input: InputKind::Any,
        transform: escape,
    },
    OutputTag {
        name: "unescape",
        description: "Decode HTML entities for the escaped characters",
        input: InputKind::Text,
        transform: unescape,
    },
    OutputTag {
        name: "trim",
        description: "Remove leading and trailing whitespace",
        input: InputKind::Any,
        transform: trim,
    },
    OutputTag {
        name: "upper",
        description: "Upper-case every character",
        input: InputKind::Text,
        transform: upper,
    },
    OutputTag {
        name: "lower",
        description: "Lower-case every character",
        input: InputKind::Text,
        transform: lower,
    },
    OutputTag {
        name: "capitalize",
        description: "Upper-case the first character",
        input: InputKind::Text,
        transform: capitalize,
    },
];

/// Short spellings usable directly in template syntax
const SHORT_TAGS: [(&str, &str); 2] = [("#", "escape"), ("@", "trim")];

static OUTPUT_TAGS: Lazy<HashMap<&'static str, OutputTag>> = Lazy::new(|| {
    let mut tags: HashMap<&'static str, OutputTag> =
        TAGS.iter().map(|tag| (tag.name, *tag)).collect();
    for (short, name) in SHORT_TAGS {
        if let Some(tag) = tags.get(name).copied() {
            tags.insert(short, tag);
        }
    }
    tags
});

static ESCAPES: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('>', "&gt;"),
        ('<', "&lt;"),
        ('&', "&amp;"),
        ('\'', "&#39;"),
        ('"', "&quot;"),
    ])
});

static UNESCAPES: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("&lt;", '<'),
        ("&#60;", '<'),
        ("&#x3c;", '<'),
        ("&#x3C;", '<'),
        ("&gt;", '>'),
        ("&#62;", '>'),
        ("&#x3e;", '>'),
        ("&#x3E;", '>'),
        ("&amp;", '&'),
        ("&#38;", '&'),
        ("&#x26;", '&'),
        ("&apos;", '\''),
        ("&#39;", '\''),
        ("&#x27;", '\''),
        ("&quot;", '"'),
        ("&#34;", '"'),
        ("&#x22;", '"'),
    ])
});

/// Look up a tag by name or short spelling
pub fn lookup(tag: &str) -> Option<&'static OutputTag> {
    OUTPUT_TAGS.get(tag)
}

/// All registered tag spellings
pub fn tags() -> impl Iterator<Item = &'static str> {
    OUTPUT_TAGS.keys().copied()
}

/// Apply the transform named by `tag` to a rendered value.
///
/// An empty tag returns the value's display form unchanged. Arrays and
/// objects are serialized to JSON before any transform runs.
pub fn apply(tag: &str, value: &Value) -> Result<String, TransformError> {
    if tag.is_empty() {
        return Ok(value.to_string());
    }

    let output = lookup(tag).ok_or_else(|| TransformError::UnknownTag(tag.to_string()))?;

    let text: Cow<'_, str> = match (value, output.input) {
        (Value::String(s), _) => Cow::Borrowed(s),
        (structured, _) if structured.is_structured() => Cow::Owned(structured.to_canonical()),
        (primitive, InputKind::Any) => Cow::Owned(primitive.to_string()),
        (primitive, InputKind::Text) => {
            return Err(TransformError::TypeMismatch {
                tag: tag.to_string(),
                found: primitive.type_name(),
            })
        }
    };

    Ok(output.run(&text))
}

/// Replace `< > & ' "` with their entities
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match ESCAPES.get(&c) {
            Some(entity) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    escaped
}

/// Decode entities of the escaped characters; unknown `&...;` runs are kept as written.
///
/// A candidate starts at `&` and closes at `;` or the end of the string. A new
/// `&` before the `;` flushes the pending candidate as plain text.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut candidate: Option<String> = None;

    for c in s.chars() {
        if c == '&' {
            if let Some(pending) = candidate.take() {
                out.push_str(&pending);
            }
            candidate = Some(String::from("&"));
        } else if let Some(mut pending) = candidate.take() {
            pending.push(c);
            if c == ';' {
                push_entity(&mut out, &pending);
            } else {
                candidate = Some(pending);
            }
        } else {
            out.push(c);
        }
    }

    if let Some(pending) = candidate {
        push_entity(&mut out, &pending);
    }

    out
}

fn push_entity(out: &mut String, entity: &str) {
    match UNESCAPES.get(entity) {
        Some(c) => out.push(*c),
        None => out.push_str(entity),
    }
}

fn trim(s: &str) -> String {
    s.trim().to_string()
}

fn upper(s: &str) -> String {
    s.to_uppercase()
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(apply("escape", &Value::from("<a>&")).unwrap(), "&lt;a&gt;&amp;");
        assert_eq!(escape(r#"'x' "y""#), "&#39;x&#39; &quot;y&quot;");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(apply("unescape", &Value::from("&lt;a&gt;&amp;")).unwrap(), "<a>&");
        assert_eq!(unescape("&#60;&#x3E;&apos;&#34;"), "<>'\"");
    }

    #[test]
    fn test_unescape_keeps_unknown_entities() {
        assert_eq!(unescape("&nbsp;x &copy;"), "&nbsp;x &copy;");
        assert_eq!(unescape("fish & chips"), "fish & chips");
        assert_eq!(unescape("a &lt"), "a &lt");
    }

    #[test]
    fn test_unescape_adjacent_ampersands() {
        assert_eq!(unescape("&&lt;"), "&<");
        assert_eq!(unescape("&x&amp;y"), "&x&y");
    }

    #[test]
    fn test_escape_round_trip() {
        for original in ["<a href=\"x\">'&'</a>", "&lt; already", "plain", "&&;;"] {
            assert_eq!(unescape(&escape(original)), original);
        }
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(apply("upper", &Value::from("abc")).unwrap(), "ABC");
        assert_eq!(apply("lower", &Value::from("ÀBC")).unwrap(), "àbc");
        assert_eq!(apply("capitalize", &Value::from("élan vital")).unwrap(), "Élan vital");
        assert_eq!(apply("capitalize", &Value::from("")).unwrap(), "");
        assert_eq!(apply("trim", &Value::from("  x \n")).unwrap(), "x");
    }

    #[test]
    fn test_short_tags() {
        assert_eq!(apply("#", &Value::from("<")).unwrap(), "&lt;");
        assert_eq!(apply("@", &Value::from(" y ")).unwrap(), "y");
        assert_eq!(lookup("#").map(|t| t.name), Some("escape"));
        assert_eq!(tags().count(), 8);
    }

    #[test]
    fn test_empty_tag_passes_through() {
        assert_eq!(apply("", &Value::Number(4.0)).unwrap(), "4");
        assert_eq!(apply("", &Value::from(json!([1, "a"]))).unwrap(), r#"[1,"a"]"#);
    }

    #[test]
    fn test_structured_values_are_serialized() {
        let value = Value::from(json!({"tag": "<b>"}));
        assert_eq!(apply("escape", &value).unwrap(), "{&quot;tag&quot;:&quot;&lt;b&gt;&quot;}");
        assert_eq!(apply("upper", &value).unwrap(), r#"{"TAG":"<B>"}"#);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            apply("shout", &Value::from("x")),
            Err(TransformError::UnknownTag("shout".to_string()))
        );
        assert_eq!(
            apply("upper", &Value::Number(1.0)),
            Err(TransformError::TypeMismatch {
                tag: "upper".to_string(),
                found: "number"
            })
        );
        assert_eq!(apply("escape", &Value::Bool(true)).unwrap(), "true");
    }
}
