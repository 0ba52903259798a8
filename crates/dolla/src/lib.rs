// Dolla - template directive engine
// `$if` / `$loop` / `:else` directives evaluated safely, plus output-tag transforms

pub mod config;
pub mod engine;
pub mod transform;

// Re-export the parser layer
pub use dolla_parser as parser;
pub use dolla_parser::{
    compile, flatten, flatten_context, segments, translate, validate, Context, DirectiveError,
    EvalError, FlattenedPaths, MissingReference, Predicate, Scope, Statement, Validation, Value,
};

// Re-export framework types
pub use config::Config;
pub use engine::{Outcome, RenderPass};
pub use transform::{apply, escape, unescape, TransformError};
