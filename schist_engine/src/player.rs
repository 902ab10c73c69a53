//! Player state for the simulated world.

use std::collections::{BTreeMap, BTreeSet};

use schist_data::{ItemKind, PlayerId};
use serde::{Deserialize, Serialize};

/// Health bounds, in half-hearts like the host game.
pub const MAX_HEALTH: f64 = 20.0;

/// One player. Identity is stable across join/quit; `online` tracks the
/// current session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub online: bool,
    health: f64,
    pub permissions: BTreeSet<String>,
    pub held: Option<ItemKind>,
    pub inventory: BTreeMap<ItemKind, u64>,
}

impl Player {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: PlayerId::random(),
            name: name.to_string(),
            online: true,
            health: MAX_HEALTH,
            permissions: BTreeSet::new(),
            held: None,
            inventory: BTreeMap::new(),
        }
    }

    pub fn health(&self) -> f64 {
        self.health
    }

    /// Set health, clamped into `0..=MAX_HEALTH`.
    pub fn set_health(&mut self, health: f64) {
        self.health = health.clamp(0.0, MAX_HEALTH);
    }

    pub fn has_permission(&self, node: &str) -> bool {
        self.permissions.contains(node)
    }

    /// Add items to the inventory; the first stack given also ends up held.
    pub fn give(&mut self, item: &ItemKind, amount: u64) {
        *self.inventory.entry(item.clone()).or_insert(0) += amount;
        if self.held.is_none() {
            self.held = Some(item.clone());
        }
    }

    pub fn is_holding(&self, item: &ItemKind) -> bool {
        self.held.as_ref() == Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_clamps_at_both_ends() {
        let mut player = Player::new("ada");
        player.set_health(35.0);
        assert_eq!(player.health(), MAX_HEALTH);
        player.set_health(-4.0);
        assert_eq!(player.health(), 0.0);
    }

    #[test]
    fn giving_stacks_and_fills_the_empty_hand() {
        let mut player = Player::new("ada");
        let bread = ItemKind::new("bread");
        player.give(&bread, 3);
        player.give(&bread, 2);
        assert_eq!(player.inventory.get(&bread), Some(&5));
        assert!(player.is_holding(&bread));
    }
}
