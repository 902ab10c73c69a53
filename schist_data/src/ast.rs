use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{BlockKind, EventKind, GameEvent};
use crate::timespan::Timespan;
use crate::value::{Value, ValueKind};

/// Where a trigger came from, for diagnostics and reload bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub script: String,
    pub line: usize,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.script, self.line)
    }
}

/// A parsed trigger: one event header plus a flat list of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    pub name: String,
    pub event: EventSpec,
    pub body: Vec<Statement>,
    pub source: SourceRef,
}

/// What a trigger listens for. Parsed from the block header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventSpec {
    Join,
    Quit,
    Chat,
    Damage,
    BlockBreak { filter: Option<BlockKind> },
    BlockPlace { filter: Option<BlockKind> },
    Periodic { period: Timespan },
}

impl EventSpec {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EventSpec::Join => EventKind::Join,
            EventSpec::Quit => EventKind::Quit,
            EventSpec::Chat => EventKind::Chat,
            EventSpec::Damage => EventKind::Damage,
            EventSpec::BlockBreak { .. } => EventKind::BlockBreak,
            EventSpec::BlockPlace { .. } => EventKind::BlockPlace,
            EventSpec::Periodic { .. } => EventKind::Periodic,
        }
    }

    /// Whether triggers for this event see a payload value of `kind`.
    /// Event-value expressions and defaulted slots are checked against this
    /// at parse time, so "send" without a recipient fails to parse in a
    /// periodic trigger instead of failing at runtime.
    #[must_use]
    pub fn provides(&self, kind: ValueKind) -> bool {
        match self {
            EventSpec::Join | EventSpec::Quit => kind == ValueKind::Player,
            EventSpec::Chat => matches!(kind, ValueKind::Player | ValueKind::Text),
            EventSpec::Damage => matches!(kind, ValueKind::Player | ValueKind::Number),
            EventSpec::BlockBreak { .. } | EventSpec::BlockPlace { .. } => {
                matches!(kind, ValueKind::Player | ValueKind::Block | ValueKind::Position)
            },
            EventSpec::Periodic { .. } => kind == ValueKind::Timespan,
        }
    }

    /// Whether a fired host event should reach triggers with this spec.
    /// Periodic triggers never go through here; the scheduler fires them
    /// directly.
    #[must_use]
    pub fn matches(&self, event: &GameEvent) -> bool {
        match (self, event) {
            (EventSpec::Join, GameEvent::Join { .. })
            | (EventSpec::Quit, GameEvent::Quit { .. })
            | (EventSpec::Chat, GameEvent::Chat { .. })
            | (EventSpec::Damage, GameEvent::Damage { .. }) => true,
            (EventSpec::BlockBreak { filter }, GameEvent::BlockBreak { block, .. })
            | (EventSpec::BlockPlace { filter }, GameEvent::BlockPlace { block, .. }) => {
                filter.as_ref().is_none_or(|wanted| wanted == block)
            },
            (EventSpec::Periodic { period }, GameEvent::Periodic { period: fired }) => period == fired,
            _ => false,
        }
    }
}

impl fmt::Display for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSpec::Join => f.write_str("on join"),
            EventSpec::Quit => f.write_str("on quit"),
            EventSpec::Chat => f.write_str("on chat"),
            EventSpec::Damage => f.write_str("on damage"),
            EventSpec::BlockBreak { filter: None } => f.write_str("on break"),
            EventSpec::BlockBreak { filter: Some(block) } => write!(f, "on break of {block}"),
            EventSpec::BlockPlace { filter: None } => f.write_str("on place"),
            EventSpec::BlockPlace { filter: Some(block) } => write!(f, "on place of {block}"),
            EventSpec::Periodic { period } => write!(f, "every {period}"),
        }
    }
}

/// One line of a trigger body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statement {
    Effect(Effect),
    Condition(Condition),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Effect(effect) => write!(f, "{effect}"),
            Statement::Condition(cond) => write!(f, "{cond}"),
        }
    }
}

/// How a change effect modifies its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeMode {
    Set,
    Add,
    Remove,
    Delete,
}

/// An executable statement. Execution lives in `schist_engine`; the match
/// there is exhaustive, so adding a variant without teaching the engine
/// about it will not compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    Message { texts: Expr, recipients: Expr },
    Broadcast { texts: Expr },
    Wait { duration: Expr },
    CancelEvent,
    Kick { players: Expr, reason: Option<Expr> },
    Give { amount: Option<Expr>, items: Expr, players: Expr },
    SetBlock { block: Expr },
    Command { command: Expr },
    Log { messages: Expr },
    WriteFile { texts: Expr, path: Expr },
    Change { mode: ChangeMode, target: Expr, value: Option<Expr> },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Message { texts, recipients } => write!(f, "send {texts} to {recipients}"),
            Effect::Broadcast { texts } => write!(f, "broadcast {texts}"),
            Effect::Wait { duration } => write!(f, "wait for {duration}"),
            Effect::CancelEvent => f.write_str("cancel the event"),
            Effect::Kick { players, reason: None } => write!(f, "kick {players}"),
            Effect::Kick {
                players,
                reason: Some(reason),
            } => write!(f, "kick {players} because of {reason}"),
            Effect::Give {
                amount: None,
                items,
                players,
            } => write!(f, "give {items} to {players}"),
            Effect::Give {
                amount: Some(amount),
                items,
                players,
            } => write!(f, "give {amount} of {items} to {players}"),
            Effect::SetBlock { block } => write!(f, "set the event-block to {block}"),
            Effect::Command { command } => write!(f, "run console command {command}"),
            Effect::Log { messages } => write!(f, "log {messages}"),
            Effect::WriteFile { texts, path } => write!(f, "write {texts} to file {path}"),
            Effect::Change { mode, target, value } => match (mode, value) {
                (ChangeMode::Set, Some(value)) => write!(f, "set {target} to {value}"),
                (ChangeMode::Add, Some(value)) => write!(f, "add {value} to {target}"),
                (ChangeMode::Remove, Some(value)) => write!(f, "remove {value} from {target}"),
                (ChangeMode::Delete, _) => write!(f, "delete {target}"),
                // Set/Add/Remove always carry a value; the parser never
                // builds them without one.
                (_, None) => write!(f, "change {target}"),
            },
        }
    }
}

/// Comparison relations for the generic comparison condition. Inequality is
/// expressed as `Equal` plus the condition's negated flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Relation {
    /// Canonical wording, as written between the two operands.
    #[must_use]
    pub fn phrase(self) -> &'static str {
        match self {
            Relation::Equal => "",
            Relation::Greater => "greater than ",
            Relation::GreaterOrEqual => "at least ",
            Relation::Less => "less than ",
            Relation::LessOrEqual => "at most ",
        }
    }
}

/// A boolean check. A false condition stops the walk of the current trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Compare {
        lhs: Expr,
        relation: Relation,
        rhs: Expr,
        negated: bool,
    },
    Online {
        players: Expr,
        negated: bool,
    },
    HasPermission {
        players: Expr,
        permission: Expr,
        negated: bool,
    },
    Holding {
        players: Expr,
        item: Expr,
        negated: bool,
    },
    Chance {
        percent: Expr,
    },
    Matches {
        text: Expr,
        pattern: Expr,
        negated: bool,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare {
                lhs,
                relation,
                rhs,
                negated,
            } => {
                let not = if *negated { "not " } else { "" };
                write!(f, "{lhs} is {not}{}{rhs}", relation.phrase())
            },
            Condition::Online { players, negated } => {
                write!(f, "{players} is {}", if *negated { "offline" } else { "online" })
            },
            Condition::HasPermission {
                players,
                permission,
                negated,
            } => {
                if *negated {
                    write!(f, "{players} does not have permission {permission}")
                } else {
                    write!(f, "{players} has permission {permission}")
                }
            },
            Condition::Holding { players, item, negated } => {
                let not = if *negated { "not " } else { "" };
                write!(f, "{players} is {not}holding {item}")
            },
            Condition::Chance { percent } => write!(f, "chance of {percent}%"),
            Condition::Matches { text, pattern, negated } => {
                if *negated {
                    write!(f, "{text} does not match {pattern}")
                } else {
                    write!(f, "{text} matches {pattern}")
                }
            },
        }
    }
}

/// Arithmetic operators usable between number expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// One piece of an interpolated string or variable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextPart {
    Text(String),
    Expr(Expr),
}

/// A quoted string with `%...%` interpolation slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTemplate {
    pub parts: Vec<TextPart>,
}

impl fmt::Display for TextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TextPart::Text(text) => f.write_str(&escape_text(text))?,
                TextPart::Expr(expr) => write!(f, "%{expr}%")?,
            }
        }
        Ok(())
    }
}

/// A variable name, possibly with interpolated segments:
/// `{homes::%the player%}` has parts `["homes::", <expr>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarName {
    pub parts: Vec<TextPart>,
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TextPart::Text(text) => f.write_str(text)?,
                TextPart::Expr(expr) => write!(f, "%{expr}%")?,
            }
        }
        Ok(())
    }
}

/// An evaluable expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    Literal(Value),
    List {
        items: Vec<Expr>,
        or: bool,
    },
    Interpolated(TextTemplate),
    Variable {
        name: VarName,
        local: bool,
        list: bool,
    },
    /// Reads a payload value off the current event ("the player").
    EventValue {
        kind: ValueKind,
    },
    NameOf(Box<Expr>),
    HealthOf(Box<Expr>),
    PermissionsOf(Box<Expr>),
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    RandomBetween {
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    Sorted(Box<Expr>),
    CountOf(Box<Expr>),
    /// Runtime conversion shim inserted when an expression's natural kind
    /// differs from what the surrounding slot wants.
    Converted {
        inner: Box<Expr>,
        to: ValueKind,
    },
}

fn escape_text(text: &str) -> String {
    text.replace('"', "\"\"").replace('%', "%%")
}

/// Writes an arithmetic operand, parenthesized when it is itself arithmetic
/// so the printed form re-parses with the same nesting.
fn fmt_operand(expr: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if matches!(expr, Expr::Arithmetic { .. }) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Text(text)) => write!(f, "\"{}\"", escape_text(text)),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::List { items, or } => {
                let sep = if *or { " or " } else { " and " };
                for (i, item) in items.iter().enumerate() {
                    if i + 2 == items.len() {
                        write!(f, "{item}{sep}")?;
                    } else if i + 1 < items.len() {
                        write!(f, "{item}, ")?;
                    } else {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            },
            Expr::Interpolated(template) => write!(f, "\"{template}\""),
            Expr::Variable { name, local, list } => {
                write!(f, "{{")?;
                if *local {
                    write!(f, "_")?;
                }
                write!(f, "{name}")?;
                if *list {
                    write!(f, "::*")?;
                }
                write!(f, "}}")
            },
            Expr::EventValue { kind } => match kind {
                ValueKind::Player => f.write_str("the player"),
                ValueKind::Text => f.write_str("the message"),
                ValueKind::Number => f.write_str("the damage"),
                ValueKind::Block => f.write_str("the event-block"),
                ValueKind::Position => f.write_str("the event-position"),
                ValueKind::Timespan => f.write_str("the period"),
                other => write!(f, "the event-{other}"),
            },
            Expr::NameOf(expr) => write!(f, "the name of {expr}"),
            Expr::HealthOf(expr) => write!(f, "the health of {expr}"),
            Expr::PermissionsOf(expr) => write!(f, "the permissions of {expr}"),
            Expr::Arithmetic { op, lhs, rhs } => {
                fmt_operand(lhs, f)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(rhs, f)
            },
            Expr::RandomBetween { lo, hi } => write!(f, "a random number between {lo} and {hi}"),
            Expr::Sorted(expr) => write!(f, "sorted {expr}"),
            Expr::CountOf(expr) => write!(f, "the number of {expr}"),
            Expr::Converted { inner, .. } => write!(f, "{inner}"),
        }
    }
}

impl Expr {
    /// Literal text helper used all over the tests.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Expr::Literal(Value::Text(text.to_string()))
    }

    #[must_use]
    pub fn number(n: f64) -> Self {
        Expr::Literal(Value::Number(n))
    }

    /// Whether this expression is a literal (or list of literals) that can
    /// be evaluated without an event. Event headers only accept these.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::List { items, .. } => items.iter().all(Expr::is_literal),
            Expr::Converted { inner, .. } => inner.is_literal(),
            _ => false,
        }
    }
}
