//! # dynaview: dynamic-view expression and action engine
//!
//! dynaview is the non-visual core of a declarative UI runtime. A view
//! definition carries small expressions, string templates, boolean conditions
//! and trees of actions; this crate evaluates and runs them against a mutable
//! state store and a set of host capabilities.
//!
//! ## Expression Pipeline
//!
//! ```text
//! Source → Tokenizer → Analyzer → Expression AST → Evaluator
//! ```
//!
//! - [`tokenizer`] turns expression text into tokens (nom based).
//! - [`analyzer`] builds an [`ast::Expression`] with parser combinators over the
//!   token slice. Two grammars are provided: the full expression language and
//!   the boolean subset used for conditions.
//! - [`eval`] walks the tree against a [`eval::Context`], applies pipes, fills
//!   `{{ }}` templates and evaluates conditions. Evaluation never fails once an
//!   expression parsed; every boundary maps parse errors to a fallback.
//!
//! All values are [`value::Value`]s, whose coercion helpers define the loose
//! equality, truthiness and `+` semantics of the language.
//!
//! ## State and Actions
//!
//! - [`state_store`] holds one immutable root record. Dot-path writes copy only
//!   the ancestors of the written path.
//! - [`action`] runs declarative action trees: state mutations, capability
//!   calls, fetches, file picking, notifications and intervals, with nested
//!   `onSuccess`/`onError` callbacks bounded by a depth limit.
//! - [`interval`] drives repeating timers whose stop condition is re-read from
//!   live state after every tick.
//!
//! ## Example
//!
//! ```
//! use dynaview::eval::{evaluate, interpolate_string, Context};
//! use dynaview::value::Value;
//! use serde_json::json;
//!
//! let ctx = Context::from(json!({"count": 5, "items": [1, 2, 3]}));
//! assert_eq!(evaluate("count * 2", &ctx).unwrap(), Value::from(10.0));
//! assert_eq!(interpolate_string("{{ items.length }} items", &ctx), Value::from("3 items"));
//! ```

pub mod action;
pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod interval;
pub mod state_store;
pub mod tokenizer;
pub mod value;

// Re-exports
pub use action::{ActionExecutor, ActionSpec, ExecutionContext};
pub use config::EngineConfig;
pub use error::*;
pub use eval::{evaluate, evaluate_condition, interpolate_props, interpolate_string, Context};
pub use interval::IntervalScheduler;
pub use state_store::StateStore;
pub use value::{Record, Value};
