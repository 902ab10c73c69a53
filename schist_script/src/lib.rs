//! schist_script: parser and syntax registry for the Schist trigger language.
//!
//! Scripts are plain text files of trigger blocks:
//!
//! ```text
//! on join:
//!     send "welcome back, %the player%!"
//!     give 3 of bread to the player
//! ```
//!
//! There is no fixed grammar for statement bodies. Every effect, condition,
//! event, and expression is registered in a [`SyntaxRegistry`] as one or more
//! pattern strings ("wait [for] %timespan%"), and the parser matches each
//! script line against the registered candidates. The standard library of
//! elements lives in [`stdlib`]; the engine registers it and freezes the
//! registries before any parsing happens.

pub mod diag;
pub mod loader;
pub mod parser;
pub mod pattern;
pub mod registry;
pub mod stdlib;
pub mod types;

pub use diag::{Diagnostic, ErrorKind, ParseLog, Severity};
pub use loader::{LoadError, ScriptSource, load_file, parse_source};
pub use parser::{ParsedScript, ScriptParser};
pub use pattern::{Pattern, PatternError, SlotSpec};
pub use registry::{BuildCx, BuiltMatch, ExprPriority, RegistryError, StatementKind, SyntaxRegistry};
pub use stdlib::standard_registries;
pub use types::{ClassInfo, TypeRegistry};
