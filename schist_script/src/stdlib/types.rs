//! Standard value kinds, converters, and comparators.

use std::cmp::Ordering;

use schist_data::value::fmt_number;
use schist_data::{BlockKind, Expr, ItemKind, Timespan, Value, ValueKind};

use crate::registry::RegistryError;
use crate::types::{ClassInfo, TypeRegistry};

pub(crate) fn register(types: &mut TypeRegistry) -> Result<(), RegistryError> {
    types.register_class(ClassInfo {
        kind: ValueKind::Object,
        name: "object",
        user_names: &[("object", "objects")],
        parse_literal: None,
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Number,
        name: "number",
        user_names: &[("number", "numbers")],
        parse_literal: Some(parse_number),
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Text,
        name: "text",
        user_names: &[("text", "texts")],
        // Unquoted words are never text; quoting is handled by the parser.
        parse_literal: None,
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Boolean,
        name: "boolean",
        user_names: &[("boolean", "booleans")],
        parse_literal: Some(parse_boolean),
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Timespan,
        name: "timespan",
        user_names: &[("timespan", "timespans")],
        parse_literal: Some(parse_timespan),
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Player,
        name: "player",
        user_names: &[("player", "players")],
        parse_literal: None,
        default_expr: Some(default_player),
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Item,
        name: "item",
        user_names: &[("item", "items")],
        parse_literal: Some(parse_item),
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Block,
        name: "block",
        user_names: &[("block", "blocks")],
        parse_literal: Some(parse_block),
        default_expr: None,
    })?;
    types.register_class(ClassInfo {
        kind: ValueKind::Position,
        name: "position",
        user_names: &[("position", "positions")],
        parse_literal: None,
        default_expr: None,
    })?;

    types.register_converter(ValueKind::Number, ValueKind::Text, |v| {
        v.as_number().map(|n| Value::Text(fmt_number(n)))
    })?;
    types.register_converter(ValueKind::Boolean, ValueKind::Text, |v| {
        v.as_boolean().map(|b| Value::Text(if b { "true".into() } else { "false".into() }))
    })?;
    types.register_converter(ValueKind::Timespan, ValueKind::Text, |v| {
        v.as_timespan().map(|t| Value::Text(t.to_string()))
    })?;
    types.register_converter(ValueKind::Item, ValueKind::Text, |v| match v {
        Value::Item(item) => Some(Value::Text(item.name().to_string())),
        _ => None,
    })?;
    types.register_converter(ValueKind::Position, ValueKind::Text, |v| match v {
        Value::Position(pos) => Some(Value::Text(pos.to_string())),
        _ => None,
    })?;
    // block -> text is deliberately left to the derived chain through item.
    types.register_converter(ValueKind::Block, ValueKind::Item, |v| match v {
        Value::Block(block) => Some(Value::Item(ItemKind::new(block.name()))),
        _ => None,
    })?;

    types.register_comparator(ValueKind::Number, ValueKind::Number, |a, b| {
        a.as_number()?.partial_cmp(&b.as_number()?)
    })?;
    types.register_comparator(ValueKind::Text, ValueKind::Text, |a, b| match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    })?;
    types.register_comparator(ValueKind::Timespan, ValueKind::Timespan, |a, b| {
        Some(a.as_timespan()?.cmp(&b.as_timespan()?))
    })?;
    types.register_comparator(ValueKind::Boolean, ValueKind::Boolean, |a, b| {
        Some(a.as_boolean()?.cmp(&b.as_boolean()?))
    })?;

    Ok(())
}

fn parse_number(text: &str) -> Option<Value> {
    text.parse::<f64>().ok().filter(|n| n.is_finite()).map(Value::Number)
}

fn parse_boolean(text: &str) -> Option<Value> {
    match text {
        "true" => Some(Value::Boolean(true)),
        "false" => Some(Value::Boolean(false)),
        _ => None,
    }
}

fn parse_timespan(text: &str) -> Option<Value> {
    Timespan::parse(text).map(Value::Timespan)
}

/// A bare item or block name: lowercase-able words, no articles, and no list
/// joiners — "iron sword" yes, "bread and butter" no. Joiners must stay free
/// for value-list splitting.
fn kind_name(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let first = tokens.first()?;
    if matches!(*first, "the" | "a" | "an") {
        return None;
    }
    for token in &tokens {
        if matches!(*token, "and" | "or") || !token.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
    }
    Some(tokens.join(" "))
}

fn parse_item(text: &str) -> Option<Value> {
    kind_name(text).map(|name| Value::Item(ItemKind::new(&name)))
}

fn parse_block(text: &str) -> Option<Value> {
    kind_name(text).map(|name| Value::Block(BlockKind::new(&name)))
}

fn default_player() -> Expr {
    Expr::EventValue {
        kind: ValueKind::Player,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_literal_rejects_infinities() {
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("-3.5"), Some(Value::Number(-3.5)));
    }

    #[test]
    fn kind_names_are_plain_words() {
        assert_eq!(kind_name("Oak   Log"), Some("Oak Log".into()));
        assert_eq!(kind_name("grade-a ore"), None);
        assert_eq!(kind_name(""), None);
    }
}
