use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{BlockKind, BlockPos, ItemKind, PlayerId};
use crate::timespan::Timespan;

/// The type tags the parser and converter tables work in terms of.
///
/// `Object` is the catch-all used by untyped slots and variables; every other
/// kind corresponds to exactly one [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Object,
    Number,
    Text,
    Boolean,
    Timespan,
    Player,
    Item,
    Block,
    Position,
}

impl ValueKind {
    /// Every kind, in the order type tables are built.
    pub const ALL: [ValueKind; 9] = [
        ValueKind::Object,
        ValueKind::Number,
        ValueKind::Text,
        ValueKind::Boolean,
        ValueKind::Timespan,
        ValueKind::Player,
        ValueKind::Item,
        ValueKind::Block,
        ValueKind::Position,
    ];

    /// Lowercase name used in diagnostics ("expected a number here").
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Object => "object",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
            ValueKind::Timespan => "timespan",
            ValueKind::Player => "player",
            ValueKind::Item => "item",
            ValueKind::Block => "block",
            ValueKind::Position => "position",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Timespan(Timespan),
    Player(PlayerId),
    Item(ItemKind),
    Block(BlockKind),
    Position(BlockPos),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Timespan(_) => ValueKind::Timespan,
            Value::Player(_) => ValueKind::Player,
            Value::Item(_) => ValueKind::Item,
            Value::Block(_) => ValueKind::Block,
            Value::Position(_) => ValueKind::Position,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timespan(&self) -> Option<Timespan> {
        match self {
            Value::Timespan(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Value::Player(p) => Some(*p),
            _ => None,
        }
    }
}

/// Format a number the way scripts write them: no trailing `.0` on whole
/// values, full precision otherwise.
#[must_use]
pub fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&fmt_number(*n)),
            Value::Text(t) => f.write_str(t),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Timespan(t) => write!(f, "{t}"),
            Value::Player(p) => write!(f, "{p}"),
            Value::Item(i) => write!(f, "{i}"),
            Value::Block(b) => write!(f, "{b}"),
            Value::Position(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::Number(3.0).kind(), ValueKind::Number);
        assert_eq!(Value::Text("hi".into()).kind(), ValueKind::Text);
        assert_eq!(Value::Timespan(Timespan::from_secs(1)).kind(), ValueKind::Timespan);
    }

    #[test]
    fn numbers_display_without_trailing_zero() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(-2.0).to_string(), "-2");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn accessors_reject_other_kinds() {
        assert_eq!(Value::Text("5".into()).as_number(), None);
        assert_eq!(Value::Number(1.0).as_text(), None);
        assert_eq!(Value::Boolean(true).as_boolean(), Some(true));
    }
}
