// Dolla parser - directive translation, validation and evaluation
// Turns `$if` / `$loop` / `:else` directives into checked statements and safe predicates

pub mod context;
pub mod directive;
pub mod error;
pub mod expression;
pub mod symbols;
pub mod translate;
pub mod value;

pub use context::{flatten, flatten_context, Context, ContextKeys, FlattenedPaths};
pub use directive::{loop_items, segments, validate, Statement, Validation};
pub use error::{DirectiveError, EvalError, EvalResult};
pub use expression::{compile, MissingReference, Predicate, Scope};
pub use translate::{translate, Token, TokenKind};
pub use value::Value;
