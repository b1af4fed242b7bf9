//! Carlae: a small Lisp with lexical closures and cons lists
//!
//! Source text goes through [`tokenize`] and [`parse`] to become an
//! [`Expr`] tree, which [`evaluate`] walks against an [`Environment`].

pub mod builtins;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod language;
pub mod lexer;
pub mod numeric;
pub mod parser;

// Re-export commonly used items for convenience
pub use environment::{Assignment, Environment};
pub use error::{CarlaeError, ErrorKind, LoadError, Result};
pub use interpreter::{
    apply, evaluate, evaluate_file, make_global_env, result_and_env, run_source, set_max_depth,
};
pub use language::{Closure, Expr, Pair, Value, is_valid_variable_name, list_from_vec, pair};
pub use lexer::{Token, tokenize};
pub use numeric::NumericType;
pub use parser::{parse, parse_source};
