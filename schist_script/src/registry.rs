//! The syntax registry: every statement, event, and expression form the
//! parser can recognize.
//!
//! Registration is append-only until [`SyntaxRegistry::freeze`] and rejected
//! afterwards. Statements and events keep registration order. Expressions
//! are kept grouped by [`ExprPriority`] using a start-index table: inserting
//! an expression shifts the start of every later category up by one and
//! places the new entry at the start of its own category, so candidates
//! iterate categories in ascending priority with the newest registration
//! first inside each.

use schist_data::{EventSpec, Expr, Statement, ValueKind};
use thiserror::Error;

use crate::diag::ParseLog;
use crate::pattern::Pattern;
use crate::types::TypeRegistry;

/// Errors returned by registries when a registration cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("cannot register {what}: registry is frozen")]
    Frozen { what: String },
    #[error("duplicate registration: {what}")]
    Duplicate { what: String },
    #[error("{what} registered with no patterns")]
    NoPatterns { what: String },
}

/// How specific an expression form is; lower categories are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExprPriority {
    /// A fixed form like "the player" that cannot swallow arbitrary text.
    Simple,
    /// Combines sub-expressions behind distinguishing literals.
    Combined,
    /// A property of another expression ("name of %player%").
    Property,
    /// Patterns that are almost all slots, e.g. arithmetic. Tried last.
    PatternMatchesAll,
}

impl ExprPriority {
    pub const COUNT: usize = 4;

    fn ordinal(self) -> usize {
        self as usize
    }
}

/// Everything matched for one pattern: the slot arguments (defaults already
/// applied), the XOR of parse marks, and which of the registered patterns
/// matched.
#[derive(Debug)]
pub struct BuiltMatch {
    pub pattern_index: usize,
    pub args: Vec<Option<Expr>>,
    pub mark: u32,
}

impl BuiltMatch {
    /// Take the argument in slot `index`, leaving `None` behind.
    pub fn take(&mut self, index: usize) -> Option<Expr> {
        self.args.get_mut(index).and_then(Option::take)
    }
}

/// Context handed to builders: the parse log, the event being parsed under
/// (if any), and the type tables.
pub struct BuildCx<'a> {
    pub log: &'a mut ParseLog,
    pub event: Option<&'a EventSpec>,
    pub types: &'a TypeRegistry,
}

impl BuildCx<'_> {
    /// Take a slot the pattern guarantees is filled. A missing value here is
    /// a registration bug (pattern and builder disagree), logged as internal.
    pub fn required(&mut self, m: &mut BuiltMatch, index: usize) -> Option<Expr> {
        let expr = m.take(index);
        if expr.is_none() {
            self.log
                .internal_error(format!("pattern {} has no argument in slot {index}", m.pattern_index));
        }
        expr
    }

    /// Whether the current event carries a payload value of `kind`.
    #[must_use]
    pub fn event_provides(&self, kind: ValueKind) -> bool {
        self.event.is_some_and(|event| event.provides(kind))
    }
}

pub type StatementBuilder = fn(BuiltMatch, &mut BuildCx<'_>) -> Option<Statement>;
pub type EventBuilder = fn(BuiltMatch, &mut BuildCx<'_>) -> Option<EventSpec>;
pub type ExprBuilder = fn(BuiltMatch, &mut BuildCx<'_>) -> Option<Expr>;

/// Distinguishes conditions from effects in listings and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Effect,
    Condition,
}

pub struct StatementInfo {
    pub name: &'static str,
    pub kind: StatementKind,
    pub patterns: Vec<Pattern>,
    pub build: StatementBuilder,
}

pub struct EventInfo {
    pub name: &'static str,
    pub patterns: Vec<Pattern>,
    pub build: EventBuilder,
}

pub struct ExprInfo {
    pub name: &'static str,
    pub returns: ValueKind,
    pub priority: ExprPriority,
    pub patterns: Vec<Pattern>,
    pub build: ExprBuilder,
}

#[derive(Default)]
pub struct SyntaxRegistry {
    statements: Vec<StatementInfo>,
    events: Vec<EventInfo>,
    expressions: Vec<ExprInfo>,
    expr_starts: [usize; ExprPriority::COUNT],
    frozen: bool,
}

impl SyntaxRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stop accepting registrations. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn check_accepting(&self, what: &str) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen { what: what.to_string() });
        }
        Ok(())
    }

    fn compile_patterns(what: &str, patterns: &[&'static str]) -> Result<Vec<Pattern>, RegistryError> {
        if patterns.is_empty() {
            return Err(RegistryError::NoPatterns { what: what.to_string() });
        }
        Ok(patterns.iter().map(|p| Pattern::new(p)).collect())
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or `patterns` is empty.
    pub fn register_effect(
        &mut self,
        name: &'static str,
        patterns: &[&'static str],
        build: StatementBuilder,
    ) -> Result<(), RegistryError> {
        self.register_statement(name, StatementKind::Effect, patterns, build)
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or `patterns` is empty.
    pub fn register_condition(
        &mut self,
        name: &'static str,
        patterns: &[&'static str],
        build: StatementBuilder,
    ) -> Result<(), RegistryError> {
        self.register_statement(name, StatementKind::Condition, patterns, build)
    }

    fn register_statement(
        &mut self,
        name: &'static str,
        kind: StatementKind,
        patterns: &[&'static str],
        build: StatementBuilder,
    ) -> Result<(), RegistryError> {
        self.check_accepting(name)?;
        self.statements.push(StatementInfo {
            name,
            kind,
            patterns: Self::compile_patterns(name, patterns)?,
            build,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or `patterns` is empty.
    pub fn register_event(
        &mut self,
        name: &'static str,
        patterns: &[&'static str],
        build: EventBuilder,
    ) -> Result<(), RegistryError> {
        self.check_accepting(name)?;
        self.events.push(EventInfo {
            name,
            patterns: Self::compile_patterns(name, patterns)?,
            build,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or `patterns` is empty.
    pub fn register_expression(
        &mut self,
        name: &'static str,
        returns: ValueKind,
        priority: ExprPriority,
        patterns: &[&'static str],
        build: ExprBuilder,
    ) -> Result<(), RegistryError> {
        self.check_accepting(name)?;
        let info = ExprInfo {
            name,
            returns,
            priority,
            patterns: Self::compile_patterns(name, patterns)?,
            build,
        };
        for start in &mut self.expr_starts[priority.ordinal() + 1..] {
            *start += 1;
        }
        self.expressions.insert(self.expr_starts[priority.ordinal()], info);
        Ok(())
    }

    #[must_use]
    pub fn statements(&self) -> &[StatementInfo] {
        &self.statements
    }

    #[must_use]
    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    /// All expressions in candidate order.
    #[must_use]
    pub fn expressions(&self) -> &[ExprInfo] {
        &self.expressions
    }

    /// Expressions whose return kind can satisfy one of `wanted`, directly
    /// or through a converter. `Object`-returning expressions always pass;
    /// their concrete values get converted at runtime.
    pub fn expressions_returning<'a>(
        &'a self,
        wanted: &'a [ValueKind],
        types: &'a TypeRegistry,
    ) -> impl Iterator<Item = &'a ExprInfo> + 'a {
        self.expressions.iter().filter(move |info| {
            info.returns == ValueKind::Object
                || wanted.iter().any(|&kind| types.converter_exists(info.returns, kind))
        })
    }
}
