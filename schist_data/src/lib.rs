//! Shared data model for Schist scripts.
//!
//! `schist_script` parses script text into the AST types defined here;
//! `schist_engine` walks and executes them. Keeping the model in one place
//! means a new statement variant breaks both crates at compile time until
//! parsing and execution agree on it.

pub mod ast;
pub mod event;
pub mod timespan;
pub mod validate;
pub mod value;

pub use ast::*;
pub use event::*;
pub use timespan::Timespan;
pub use validate::{ValidationError, validate_trigger};
pub use value::{Value, ValueKind};
