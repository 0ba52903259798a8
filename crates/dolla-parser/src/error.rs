// File: src/error.rs
// Purpose: Error types for translation, compilation and evaluation

use thiserror::Error;

/// Raised to the caller of `translate`/`compile`; aborts the directive only
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectiveError {
    #[error("invalid if statement syntax: `{word}` may not be used directly (at byte {position})")]
    DisallowedWord { word: String, position: usize },

    #[error("string literal opened with {delimiter} at byte {position} is never closed")]
    UnterminatedLiteral { delimiter: char, position: usize },

    #[error("cannot parse expression at byte {position}: {message}")]
    Parse { message: String, position: usize },
}

impl DirectiveError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }
}

/// Faults raised while evaluating a compiled predicate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{scope}[\"{name}\"] is not defined")]
    UnresolvedReference { scope: &'static str, name: String },

    #[error("`{0}` is not defined")]
    UnknownIdentifier(String),

    #[error("cannot apply `{op}` to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot apply unary `{op}` to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },
}

pub type EvalResult<T> = Result<T, EvalError>;
