//! Value kinds, literal parsers, converters, and comparators.
//!
//! Every kind a pattern slot can name has a [`ClassInfo`] here. Converters
//! bridge kinds at parse and run time; at freeze the registry derives the
//! transitive closure of all registered converters, so registering item→text
//! and block→item also yields block→text without anyone writing it.

use std::cmp::Ordering;
use std::collections::HashMap;

use schist_data::{Expr, Value, ValueKind};

use crate::registry::RegistryError;

/// Converts a value to another kind, or `None` when this value cannot be.
pub type ConvertFn = fn(&Value) -> Option<Value>;

/// Compares two values; `None` means the pair is not comparable.
pub type CompareFn = fn(&Value, &Value) -> Option<Ordering>;

/// Everything the parser needs to know about one value kind.
pub struct ClassInfo {
    pub kind: ValueKind,
    /// Canonical name used in diagnostics.
    pub name: &'static str,
    /// (singular, plural) spellings accepted in pattern slots.
    pub user_names: &'static [(&'static str, &'static str)],
    /// Parses an unquoted literal of this kind, e.g. "5 seconds" or "stone".
    pub parse_literal: Option<fn(&str) -> Option<Value>>,
    /// Expression used to fill an omitted, non-nullable slot of this kind.
    pub default_expr: Option<fn() -> Expr>,
}

struct ConverterEntry {
    steps: Vec<ConvertFn>,
    derived: bool,
}

impl ConverterEntry {
    fn apply(&self, value: &Value) -> Option<Value> {
        let mut current = value.clone();
        for step in &self.steps {
            current = step(&current)?;
        }
        Some(current)
    }
}

/// Registry of classes, converters, and comparators. Append-only until
/// [`TypeRegistry::freeze`]; the parser only runs against a frozen registry.
#[derive(Default)]
pub struct TypeRegistry {
    classes: Vec<ClassInfo>,
    by_kind: HashMap<ValueKind, usize>,
    names: HashMap<&'static str, (ValueKind, bool)>,
    converters: HashMap<(ValueKind, ValueKind), ConverterEntry>,
    comparators: HashMap<(ValueKind, ValueKind), CompareFn>,
    frozen: bool,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or the kind or one of its user
    /// names is already registered.
    pub fn register_class(&mut self, info: ClassInfo) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen {
                what: format!("class '{}'", info.name),
            });
        }
        if self.by_kind.contains_key(&info.kind) {
            return Err(RegistryError::Duplicate {
                what: format!("class for kind '{}'", info.kind),
            });
        }
        for (singular, plural) in info.user_names {
            if self.names.contains_key(singular) || self.names.contains_key(plural) {
                return Err(RegistryError::Duplicate {
                    what: format!("class name '{singular}'"),
                });
            }
            self.names.insert(singular, (info.kind, false));
            self.names.insert(plural, (info.kind, true));
        }
        self.by_kind.insert(info.kind, self.classes.len());
        self.classes.push(info);
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or a direct converter for the pair
    /// already exists.
    pub fn register_converter(
        &mut self,
        from: ValueKind,
        to: ValueKind,
        convert: ConvertFn,
    ) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen {
                what: format!("converter {from} -> {to}"),
            });
        }
        if self.converters.contains_key(&(from, to)) {
            return Err(RegistryError::Duplicate {
                what: format!("converter {from} -> {to}"),
            });
        }
        self.converters.insert(
            (from, to),
            ConverterEntry {
                steps: vec![convert],
                derived: false,
            },
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when the registry is frozen or the pair already has a
    /// comparator.
    pub fn register_comparator(
        &mut self,
        lhs: ValueKind,
        rhs: ValueKind,
        compare: CompareFn,
    ) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen {
                what: format!("comparator {lhs} / {rhs}"),
            });
        }
        if self.comparators.contains_key(&(lhs, rhs)) {
            return Err(RegistryError::Duplicate {
                what: format!("comparator {lhs} / {rhs}"),
            });
        }
        self.comparators.insert((lhs, rhs), compare);
        Ok(())
    }

    /// Stop accepting registrations and derive the missing converter chains.
    ///
    /// Chains are composed left to right from what is registered; a pair
    /// that already has a direct converter is never overwritten, so direct
    /// registrations always win over derived ones. Calling freeze again is a
    /// no-op.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;
        loop {
            let mut added: Vec<((ValueKind, ValueKind), Vec<ConvertFn>)> = Vec::new();
            for (&(from, mid), first) in &self.converters {
                for (&(mid2, to), second) in &self.converters {
                    if mid != mid2 || from == to {
                        continue;
                    }
                    if self.converters.contains_key(&(from, to))
                        || added.iter().any(|(pair, _)| *pair == (from, to))
                    {
                        continue;
                    }
                    let mut steps = first.steps.clone();
                    steps.extend(&second.steps);
                    added.push(((from, to), steps));
                }
            }
            if added.is_empty() {
                break;
            }
            for (pair, steps) in added {
                self.converters.insert(pair, ConverterEntry { steps, derived: true });
            }
        }
    }

    #[must_use]
    pub fn class(&self, kind: ValueKind) -> Option<&ClassInfo> {
        self.by_kind.get(&kind).map(|&i| &self.classes[i])
    }

    /// Resolve a pattern slot name like "player" or "players" to its kind
    /// and plurality.
    #[must_use]
    pub fn kind_by_user_name(&self, name: &str) -> Option<(ValueKind, bool)> {
        self.names.get(name).copied()
    }

    /// Whether values of `from` can reach `to`, directly or via a derived
    /// chain. Everything reaches itself and `Object`.
    #[must_use]
    pub fn converter_exists(&self, from: ValueKind, to: ValueKind) -> bool {
        from == to
            || to == ValueKind::Object
            || from == ValueKind::Object
            || self.converters.contains_key(&(from, to))
    }

    /// Whether the pair has a derived (multi-step) converter. Diagnostic
    /// introspection, mostly for tests.
    #[must_use]
    pub fn converter_is_derived(&self, from: ValueKind, to: ValueKind) -> bool {
        self.converters.get(&(from, to)).is_some_and(|entry| entry.derived)
    }

    /// Convert a value to the given kind, if a converter path exists.
    #[must_use]
    pub fn convert(&self, value: &Value, to: ValueKind) -> Option<Value> {
        if to == ValueKind::Object || value.kind() == to {
            return Some(value.clone());
        }
        self.converters.get(&(value.kind(), to))?.apply(value)
    }

    /// Compare two values: a registered comparator for the exact kind pair
    /// first, then converting one side to the other's kind and using that
    /// kind's natural ordering.
    #[must_use]
    pub fn compare(&self, lhs: &Value, rhs: &Value) -> Option<Ordering> {
        if let Some(compare) = self.comparators.get(&(lhs.kind(), rhs.kind())) {
            return compare(lhs, rhs);
        }
        if lhs.kind() != rhs.kind() {
            if let Some(converted) = self.convert(rhs, lhs.kind()) {
                if let Some(compare) = self.comparators.get(&(lhs.kind(), lhs.kind())) {
                    return compare(lhs, &converted);
                }
            }
            if let Some(converted) = self.convert(lhs, rhs.kind()) {
                if let Some(compare) = self.comparators.get(&(rhs.kind(), rhs.kind())) {
                    return compare(&converted, rhs);
                }
            }
        }
        None
    }

    /// Equality with conversion fallback, for kinds that have no ordering
    /// (players, items, blocks, positions).
    #[must_use]
    pub fn values_equal(&self, lhs: &Value, rhs: &Value) -> bool {
        if lhs == rhs {
            return true;
        }
        if self.compare(lhs, rhs) == Some(Ordering::Equal) {
            return true;
        }
        if lhs.kind() != rhs.kind() {
            if let Some(converted) = self.convert(rhs, lhs.kind()) {
                return *lhs == converted;
            }
            if let Some(converted) = self.convert(lhs, rhs.kind()) {
                return converted == *rhs;
            }
        }
        false
    }

    /// Try to parse an unquoted literal as the given kind. For `Object`,
    /// every class with a literal parser is tried in registration order.
    #[must_use]
    pub fn parse_literal(&self, text: &str, kind: ValueKind) -> Option<Value> {
        if kind == ValueKind::Object {
            return self
                .classes
                .iter()
                .filter_map(|class| class.parse_literal)
                .find_map(|parse| parse(text));
        }
        let parse = self.class(kind)?.parse_literal?;
        parse(text)
    }

    /// Default expression for omitted slots of the given kind.
    #[must_use]
    pub fn default_expr(&self, kind: ValueKind) -> Option<Expr> {
        let default = self.class(kind)?.default_expr?;
        Some(default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_class() -> ClassInfo {
        ClassInfo {
            kind: ValueKind::Number,
            name: "number",
            user_names: &[("number", "numbers")],
            parse_literal: Some(|text| text.parse().ok().map(Value::Number)),
            default_expr: None,
        }
    }

    fn number_to_boolean(value: &Value) -> Option<Value> {
        value.as_number().map(|n| Value::Boolean(n != 0.0))
    }

    fn boolean_to_text(value: &Value) -> Option<Value> {
        value.as_boolean().map(|b| Value::Text(b.to_string()))
    }

    fn number_to_text(value: &Value) -> Option<Value> {
        value.as_number().map(|n| Value::Text(schist_data::value::fmt_number(n)))
    }

    #[test]
    fn freeze_derives_transitive_chains() {
        let mut types = TypeRegistry::new();
        types
            .register_converter(ValueKind::Number, ValueKind::Boolean, number_to_boolean)
            .unwrap();
        types
            .register_converter(ValueKind::Boolean, ValueKind::Text, boolean_to_text)
            .unwrap();
        assert!(!types.converter_exists(ValueKind::Number, ValueKind::Text));

        types.freeze();
        assert!(types.converter_exists(ValueKind::Number, ValueKind::Text));
        assert!(types.converter_is_derived(ValueKind::Number, ValueKind::Text));
        assert_eq!(
            types.convert(&Value::Number(5.0), ValueKind::Text),
            Some(Value::Text("true".into()))
        );
    }

    #[test]
    fn direct_converter_beats_derived_chain() {
        let mut types = TypeRegistry::new();
        types
            .register_converter(ValueKind::Number, ValueKind::Boolean, number_to_boolean)
            .unwrap();
        types
            .register_converter(ValueKind::Boolean, ValueKind::Text, boolean_to_text)
            .unwrap();
        types
            .register_converter(ValueKind::Number, ValueKind::Text, number_to_text)
            .unwrap();

        types.freeze();
        assert!(!types.converter_is_derived(ValueKind::Number, ValueKind::Text));
        assert_eq!(
            types.convert(&Value::Number(5.0), ValueKind::Text),
            Some(Value::Text("5".into()))
        );
    }

    #[test]
    fn freeze_is_idempotent_and_gates_registration() {
        let mut types = TypeRegistry::new();
        types.register_class(number_class()).unwrap();
        types.freeze();
        types.freeze();
        assert!(types.is_frozen());

        let err = types.register_class(ClassInfo {
            kind: ValueKind::Text,
            name: "text",
            user_names: &[("text", "texts")],
            parse_literal: None,
            default_expr: None,
        });
        assert!(matches!(err, Err(RegistryError::Frozen { .. })));
        assert!(matches!(
            types.register_converter(ValueKind::Number, ValueKind::Text, number_to_text),
            Err(RegistryError::Frozen { .. })
        ));
    }

    #[test]
    fn duplicate_class_names_are_rejected() {
        let mut types = TypeRegistry::new();
        types.register_class(number_class()).unwrap();
        let err = types.register_class(ClassInfo {
            kind: ValueKind::Text,
            name: "amount",
            user_names: &[("number", "amounts")],
            parse_literal: None,
            default_expr: None,
        });
        assert!(matches!(err, Err(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn compare_converts_one_side_when_needed() {
        let mut types = TypeRegistry::new();
        types
            .register_comparator(ValueKind::Number, ValueKind::Number, |a, b| {
                a.as_number()?.partial_cmp(&b.as_number()?)
            })
            .unwrap();
        types
            .register_converter(ValueKind::Boolean, ValueKind::Number, |v| {
                v.as_boolean().map(|b| Value::Number(if b { 1.0 } else { 0.0 }))
            })
            .unwrap();
        types.freeze();

        assert_eq!(
            types.compare(&Value::Number(1.0), &Value::Boolean(true)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            types.compare(&Value::Boolean(false), &Value::Number(0.5)),
            Some(Ordering::Less)
        );
        assert_eq!(types.compare(&Value::Text("x".into()), &Value::Number(1.0)), None);
    }

    #[test]
    fn plural_names_resolve_with_plurality() {
        let mut types = TypeRegistry::new();
        types.register_class(number_class()).unwrap();
        assert_eq!(types.kind_by_user_name("number"), Some((ValueKind::Number, false)));
        assert_eq!(types.kind_by_user_name("numbers"), Some((ValueKind::Number, true)));
        assert_eq!(types.kind_by_user_name("num"), None);
    }
}
