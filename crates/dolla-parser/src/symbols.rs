// File: src/symbols.rs
// Purpose: Static operator tables shared by the translator and the validator

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// DSL operator spelling to evaluator operator spelling, used by `translate`
pub static SYNTAX: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("eq", "=="),
        ("-eq", "!="),
        ("EQ", "==="),
        ("-EQ", "!=="),
        // math
        ("+", "+"),
        ("-", "-"),
        ("/", "/"),
        ("*", "*"),
        ("%", "%"),
        // logic
        ("And", "&&"),
        ("Or", "||"),
        ("True", "true"),
        ("False", "false"),
        (">", ">"),
        ("<", "<"),
        (">=", ">="),
        ("<=", "<="),
    ])
});

/// Comparison and logic subset used for validated `$if` segments.
/// Every mapped spelling carries its trailing separator.
pub static CONDITION_SYNTAX: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("eq", "== "),
        ("-eq", "!= "),
        ("EQ", "=== "),
        ("-EQ", "!== "),
        ("mod", "% "),
        ("and", "&& "),
        ("or", "|| "),
        (">", "> "),
        ("<", "< "),
        (">=", ">= "),
        ("<=", "<= "),
    ])
});

/// Bare words that collide with translated output and may not be written directly
pub static NOT_ALLOWED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from(["==", "!=", "===", "!==", "&&", "||", "true", "false"])
});

/// Characters that open (and close) a string literal
pub const STRING_DELIMITERS: [char; 3] = ['`', '\'', '"'];

pub fn is_string_delimiter(c: char) -> bool {
    STRING_DELIMITERS.contains(&c)
}

/// Characters that end a candidate identifier during scanning
pub fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ',' | '!')
}

/// Render `scope["name"]`, switching to a delimiter absent from `name`
/// so the reference always lexes back to the same key
pub fn reference(scope: &str, name: &str) -> String {
    let delimiter = STRING_DELIMITERS
        .iter()
        .rev()
        .copied()
        .find(|d| !name.contains(*d))
        .unwrap_or('"');
    format!("{scope}[{delimiter}{name}{delimiter}]")
}

pub fn lookup_syntax(word: &str) -> Option<&'static str> {
    SYNTAX.get(word).copied()
}

pub fn lookup_condition(word: &str) -> Option<&'static str> {
    CONDITION_SYNTAX.get(word).copied()
}

pub fn is_disallowed(word: &str) -> bool {
    NOT_ALLOWED.contains(word)
}
