//! The standard element library: every value kind, converter, comparator,
//! event, effect, condition, and expression available to scripts out of the
//! box.
//!
//! Registration order is meaningful. Statements are tried in registration
//! order, so specific conditions (`is online`, `is holding`) come before the
//! generic comparison, which would otherwise swallow them. Expressions are
//! grouped by priority category instead; see
//! [`ExprPriority`](crate::registry::ExprPriority).

mod conditions;
mod effects;
mod events;
mod exprs;
mod types;

use crate::registry::{RegistryError, SyntaxRegistry};
use crate::types::TypeRegistry;

/// Build and freeze the standard registries.
///
/// Freezing also derives transitive converter chains, so the returned type
/// registry answers `converter_exists` queries in constant time.
///
/// # Panics
///
/// Panics if the standard registrations conflict with each other. That is a
/// bug in this module, not a runtime condition.
#[must_use]
pub fn standard_registries() -> (SyntaxRegistry, TypeRegistry) {
    build().expect("standard element registration must not conflict")
}

fn build() -> Result<(SyntaxRegistry, TypeRegistry), RegistryError> {
    let mut type_registry = TypeRegistry::new();
    types::register(&mut type_registry)?;

    let mut syntax = SyntaxRegistry::new();
    events::register(&mut syntax)?;
    effects::register(&mut syntax)?;
    conditions::register(&mut syntax)?;
    exprs::register(&mut syntax)?;

    syntax.freeze();
    type_registry.freeze();
    Ok((syntax, type_registry))
}
