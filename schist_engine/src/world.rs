//! The simulated host world: players, placed blocks, and an outbox of
//! everything the engine asked the host to do.
//!
//! The real host would deliver messages and run commands itself; here they
//! accumulate in [`World::outbox`] in execution order so the console can
//! print them and tests can assert on them.

use std::collections::HashMap;

use log::debug;
use schist_data::{BlockKind, BlockPos, PlayerId};
use serde::{Deserialize, Serialize};

use crate::player::Player;

/// One host-facing side effect, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outbound {
    Message { to: String, text: String },
    Broadcast { text: String },
    Kick { name: String, reason: String },
    Command { line: String },
    Log { text: String },
}

#[derive(Debug, Default)]
pub struct World {
    players: HashMap<PlayerId, Player>,
    by_name: HashMap<String, PlayerId>,
    blocks: HashMap<BlockPos, BlockKind>,
    pub outbox: Vec<Outbound>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring a player online, creating them on first join. Names are the
    /// lookup key, so re-joining keeps the old id, permissions, and items.
    pub fn join(&mut self, name: &str) -> PlayerId {
        if let Some(&id) = self.by_name.get(name) {
            if let Some(player) = self.players.get_mut(&id) {
                player.online = true;
            }
            return id;
        }
        let player = Player::new(name);
        let id = player.id;
        self.by_name.insert(name.to_string(), id);
        self.players.insert(id, player);
        debug!("player '{name}' joined as {id}");
        id
    }

    pub fn quit(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.online = false;
        }
    }

    pub fn kick(&mut self, id: PlayerId, reason: &str) {
        if let Some(player) = self.players.get_mut(&id) {
            player.online = false;
            self.outbox.push(Outbound::Kick {
                name: player.name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn find(&self, name: &str) -> Option<PlayerId> {
        self.by_name.get(name).copied()
    }

    /// Display name for logs and message rendering; short id for strangers.
    #[must_use]
    pub fn name_of(&self, id: PlayerId) -> String {
        self.players.get(&id).map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    pub fn send(&mut self, to: PlayerId, text: &str) {
        let to = self.name_of(to);
        self.outbox.push(Outbound::Message {
            to,
            text: text.to_string(),
        });
    }

    pub fn broadcast(&mut self, text: &str) {
        self.outbox.push(Outbound::Broadcast { text: text.to_string() });
    }

    pub fn set_block(&mut self, pos: BlockPos, block: BlockKind) {
        self.blocks.insert(pos, block);
    }

    pub fn block_at(&self, pos: BlockPos) -> Option<&BlockKind> {
        self.blocks.get(&pos)
    }

    pub fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.online).count()
    }

    /// Take everything queued for the host since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }
}
