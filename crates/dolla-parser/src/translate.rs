// File: src/translate.rs
// Purpose: Rewrite directive condition text into evaluator-ready expressions

use crate::context::ContextKeys;
use crate::error::DirectiveError;
use crate::symbols::{is_boundary, is_disallowed, is_string_delimiter, lookup_syntax, reference};
use std::borrow::Cow;
use tracing::debug;

/// What a recognized identifier is rewritten to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A key of the input context, rewritten to `input["<name>"]`
    Input,
    /// A DSL operator, rewritten to the mapped operator spelling
    Symbol(&'static str),
}

/// A recognized identifier with its byte range in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn replacement(&self) -> Cow<'_, str> {
        match self.kind {
            TokenKind::Input => Cow::Owned(reference("input", &self.name)),
            TokenKind::Symbol(op) => Cow::Borrowed(op),
        }
    }
}

/// Translate condition text such as `x eq 3` into `input["x"] == 3`.
///
/// Identifiers are classified in this order: context key, DSL operator,
/// disallowed word (error). Anything else is left as written. Text inside
/// backtick, single or double quoted literals is never touched.
pub fn translate<K>(source: &str, context_keys: &K) -> Result<String, DirectiveError>
where
    K: ContextKeys + ?Sized,
{
    let tokens = scan(source, context_keys)?;
    let translated = rewrite(source, &tokens);
    debug!(source, translated = %translated, tokens = tokens.len(), "translated condition");
    Ok(translated)
}

/// Scan `source` and collect the tokens to substitute, in ascending position order
pub fn scan<K>(source: &str, context_keys: &K) -> Result<Vec<Token>, DirectiveError>
where
    K: ContextKeys + ?Sized,
{
    let mut tokens = Vec::new();
    let mut literal: Option<(char, usize)> = None;
    let mut candidate: Option<usize> = None;

    for (i, c) in source.char_indices() {
        if let Some((delimiter, _)) = literal {
            if c == delimiter {
                literal = None;
            }
            continue;
        }

        if is_string_delimiter(c) {
            if let Some(start) = candidate.take() {
                classify(source, start, i, context_keys, &mut tokens)?;
            }
            literal = Some((c, i));
        } else if is_boundary(c) {
            if let Some(start) = candidate.take() {
                classify(source, start, i, context_keys, &mut tokens)?;
            }
        } else if candidate.is_none() {
            candidate = Some(i);
        }
    }

    if let Some((delimiter, position)) = literal {
        return Err(DirectiveError::UnterminatedLiteral {
            delimiter,
            position,
        });
    }

    if let Some(start) = candidate {
        classify(source, start, source.len(), context_keys, &mut tokens)?;
    }

    Ok(tokens)
}

fn classify<K>(
    source: &str,
    start: usize,
    end: usize,
    context_keys: &K,
    tokens: &mut Vec<Token>,
) -> Result<(), DirectiveError>
where
    K: ContextKeys + ?Sized,
{
    let word = &source[start..end];

    // Context keys shadow operator spellings and reserved words.
    let kind = if context_keys.has_key(word) {
        TokenKind::Input
    } else if let Some(op) = lookup_syntax(word) {
        TokenKind::Symbol(op)
    } else if is_disallowed(word) {
        return Err(DirectiveError::DisallowedWord {
            word: word.to_string(),
            position: start,
        });
    } else {
        return Ok(());
    };

    tokens.push(Token {
        name: word.to_string(),
        kind,
        start,
        end,
    });
    Ok(())
}

/// Copy untouched spans of `source` and splice in each token's replacement.
///
/// `tokens` must be sorted by `start` and non-overlapping, as `scan` returns them.
pub fn rewrite(source: &str, tokens: &[Token]) -> String {
    debug_assert!(tokens.windows(2).all(|w| w[0].end <= w[1].start));

    let mut out = String::with_capacity(source.len() + tokens.len() * 8);
    let mut cursor = 0;
    for token in tokens {
        out.push_str(&source[cursor..token.start]);
        out.push_str(&token.replacement());
        cursor = token.end;
    }
    out.push_str(&source[cursor..]);
    out
}
