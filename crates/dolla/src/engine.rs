// File: src/engine.rs
// Purpose: One render pass - directive evaluation and output slots over a single input

use crate::config::Config;
use crate::transform;
use dolla_parser::{
    compile, flatten_context, loop_items, translate, validate, Context, ContextKeys, DirectiveError,
    FlattenedPaths, Predicate, Scope, Statement, Validation, Value,
};
use tracing::{debug, warn};

/// What the renderer should do with a directive
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<'a> {
    /// `$if` / `:else`: render the branch when `true`
    Branch(bool),
    /// `$loop`: render the body once per item with `alias` bound to it
    Loop { alias: String, items: &'a [Value] },
    /// Malformed directive; leave the fragment out and keep rendering
    Skipped,
}

/// Input bindings and derived lookup paths for one render pass
#[derive(Debug, Clone)]
pub struct RenderPass {
    config: Config,
    input: Context,
    paths: FlattenedPaths,
}

/// Identifiers that count as input: top-level bindings and flattened leaf paths
struct PassKeys<'a> {
    input: &'a Context,
    paths: &'a FlattenedPaths,
}

impl ContextKeys for PassKeys<'_> {
    fn has_key(&self, key: &str) -> bool {
        self.input.contains_key(key) || self.paths.contains_key(key)
    }
}

impl RenderPass {
    pub fn new(input: Context) -> Self {
        Self::with_config(input, Config::default())
    }

    pub fn with_config(input: Context, config: Config) -> Self {
        let paths = flatten_context(&input);
        debug!(bindings = paths.len(), "render pass started");
        Self {
            config,
            input,
            paths,
        }
    }

    pub fn input(&self) -> &Context {
        &self.input
    }

    pub fn paths(&self) -> &FlattenedPaths {
        &self.paths
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluation scope over this pass's input and the given loop/local bindings
    pub fn scope<'a>(&'a self, variables: &'a Context) -> Scope<'a> {
        Scope::new(&self.input)
            .with_variables(variables)
            .with_missing_references(self.config.evaluation.missing_references)
    }

    /// Translate and compile free condition text such as `user.age >= 18 And active`
    pub fn condition(&self, text: &str) -> Result<Predicate, DirectiveError> {
        let keys = PassKeys {
            input: &self.input,
            paths: &self.paths,
        };
        let translated = translate(text, &keys)?;
        compile(&translated)
    }

    /// Evaluate condition text; translation and evaluation failures count as `false`
    pub fn test_condition(&self, text: &str, variables: &Context) -> bool {
        match self.condition(text) {
            Ok(predicate) => predicate.test(&self.scope(variables)),
            Err(err) => {
                self.report(text, &err);
                false
            }
        }
    }

    /// Validate a directive and decide how the renderer proceeds
    pub fn directive<'a, S: AsRef<str>>(&'a self, segments: &[S], variables: &'a Context) -> Outcome<'a> {
        let statement = match validate(segments, &self.input, variables) {
            Validation::Valid(statement) => statement,
            Validation::Invalid(reason) => {
                self.report(&join(segments), &reason);
                return Outcome::Skipped;
            }
        };

        match statement {
            Statement::If { condition } | Statement::Else { condition } => match compile(&condition) {
                Ok(predicate) => Outcome::Branch(predicate.test(&self.scope(variables))),
                Err(err) => {
                    self.report(&join(segments), &err);
                    Outcome::Skipped
                }
            },
            Statement::Loop { collection, alias } => {
                match loop_items(&collection, &self.input, variables) {
                    Some(items) => Outcome::Loop { alias, items },
                    None => Outcome::Skipped,
                }
            }
        }
    }

    /// Render a value for an output slot; `None` when the slot must be left empty
    pub fn output(&self, tag: Option<&str>, value: &Value) -> Option<String> {
        let tag = tag.unwrap_or(&self.config.output.default_tag);
        match transform::apply(tag, value) {
            Ok(rendered) => Some(rendered),
            Err(err) => {
                self.report(tag, &err);
                None
            }
        }
    }

    /// Resolve a dotted path and render it through `tag`
    pub fn output_path(&self, path: &str, tag: Option<&str>) -> Option<String> {
        let value = self.input.resolve(path).or_else(|| self.paths.get(path))?;
        self.output(tag, value)
    }

    fn report(&self, fragment: &str, error: &dyn std::fmt::Display) {
        if self.config.output.log_failures {
            warn!(fragment, error = %error, "skipping template fragment");
        }
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
