use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timespan::Timespan;
use crate::value::{Value, ValueKind, fmt_number};

/// Stable identity of a player, kept across join/quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs; anything user-facing resolves the name instead.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// A named item kind ("bread", "iron sword"). Names are stored lowercase
/// with single spaces so lookups and comparisons are textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKind(String);

impl ItemKind {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(normalize_kind_name(name))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named block kind ("stone", "oak log"). Same normalization as
/// [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKind(String);

impl BlockKind {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(normalize_kind_name(name))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_kind_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[must_use]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// Discriminant for [`GameEvent`], used to index trigger tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Join,
    Quit,
    Chat,
    BlockBreak,
    BlockPlace,
    Damage,
    Periodic,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Join => "join",
            EventKind::Quit => "quit",
            EventKind::Chat => "chat",
            EventKind::BlockBreak => "block break",
            EventKind::BlockPlace => "block place",
            EventKind::Damage => "damage",
            EventKind::Periodic => "periodic",
        };
        f.write_str(name)
    }
}

/// A concrete occurrence in the game world, with its payload.
///
/// One firing of a `GameEvent` produces one trigger walk per matching
/// trigger; the payload is what event-value expressions like "the player"
/// read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameEvent {
    Join { player: PlayerId },
    Quit { player: PlayerId },
    Chat { player: PlayerId, message: String },
    BlockBreak { player: PlayerId, pos: BlockPos, block: BlockKind },
    BlockPlace { player: PlayerId, pos: BlockPos, block: BlockKind },
    Damage { victim: PlayerId, amount: f64 },
    Periodic { period: Timespan },
}

impl GameEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Join { .. } => EventKind::Join,
            GameEvent::Quit { .. } => EventKind::Quit,
            GameEvent::Chat { .. } => EventKind::Chat,
            GameEvent::BlockBreak { .. } => EventKind::BlockBreak,
            GameEvent::BlockPlace { .. } => EventKind::BlockPlace,
            GameEvent::Damage { .. } => EventKind::Damage,
            GameEvent::Periodic { .. } => EventKind::Periodic,
        }
    }

    /// The payload value of the given kind, if this event carries one.
    #[must_use]
    pub fn value_of(&self, kind: ValueKind) -> Option<Value> {
        match (self, kind) {
            (GameEvent::Join { player } | GameEvent::Quit { player }, ValueKind::Player) => {
                Some(Value::Player(*player))
            },
            (GameEvent::Chat { player, .. }, ValueKind::Player) => Some(Value::Player(*player)),
            (GameEvent::Chat { message, .. }, ValueKind::Text) => Some(Value::Text(message.clone())),
            (
                GameEvent::BlockBreak { player, .. } | GameEvent::BlockPlace { player, .. },
                ValueKind::Player,
            ) => Some(Value::Player(*player)),
            (
                GameEvent::BlockBreak { block, .. } | GameEvent::BlockPlace { block, .. },
                ValueKind::Block,
            ) => Some(Value::Block(block.clone())),
            (
                GameEvent::BlockBreak { pos, .. } | GameEvent::BlockPlace { pos, .. },
                ValueKind::Position,
            ) => Some(Value::Position(*pos)),
            (GameEvent::Damage { victim, .. }, ValueKind::Player) => Some(Value::Player(*victim)),
            (GameEvent::Damage { amount, .. }, ValueKind::Number) => Some(Value::Number(*amount)),
            (GameEvent::Periodic { period }, ValueKind::Timespan) => Some(Value::Timespan(*period)),
            _ => None,
        }
    }

    /// Whether this event can be cancelled before the host applies it.
    #[must_use]
    pub fn cancellable(&self) -> bool {
        matches!(
            self,
            GameEvent::Chat { .. }
                | GameEvent::BlockBreak { .. }
                | GameEvent::BlockPlace { .. }
                | GameEvent::Damage { .. }
        )
    }

    /// Short description for walk logs, e.g. "chat by 1f2a9c03".
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            GameEvent::Join { player } => format!("join by {player}"),
            GameEvent::Quit { player } => format!("quit by {player}"),
            GameEvent::Chat { player, .. } => format!("chat by {player}"),
            GameEvent::BlockBreak { player, block, .. } => format!("break of {block} by {player}"),
            GameEvent::BlockPlace { player, block, .. } => format!("place of {block} by {player}"),
            GameEvent::Damage { victim, amount } => {
                format!("damage of {} to {victim}", fmt_number(*amount))
            },
            GameEvent::Periodic { period } => format!("periodic every {period}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_normalize() {
        assert_eq!(ItemKind::new("  Iron   Sword ").name(), "iron sword");
        assert_eq!(BlockKind::new("Oak Log").name(), "oak log");
    }

    #[test]
    fn chat_event_exposes_player_and_message() {
        let player = PlayerId::random();
        let event = GameEvent::Chat {
            player,
            message: "hello".into(),
        };
        assert_eq!(event.value_of(ValueKind::Player), Some(Value::Player(player)));
        assert_eq!(event.value_of(ValueKind::Text), Some(Value::Text("hello".into())));
        assert_eq!(event.value_of(ValueKind::Block), None);
    }

    #[test]
    fn join_is_not_cancellable() {
        let event = GameEvent::Join {
            player: PlayerId::random(),
        };
        assert!(!event.cancellable());
        assert!(
            GameEvent::Chat {
                player: PlayerId::random(),
                message: String::new(),
            }
            .cancellable()
        );
    }
}
