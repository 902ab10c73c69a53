//! Event bus: one trigger list per host event kind.
//!
//! Fan-out order is registration order, which is script load order and then
//! top-to-bottom order within a script. Periodic triggers are indexed here
//! too, but the scheduler fires them; `matching` never returns them.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use schist_data::{EventKind, GameEvent};

use crate::trigger::Trigger;

#[derive(Default)]
pub struct TriggerBus {
    by_kind: HashMap<EventKind, Vec<Arc<Trigger>>>,
}

impl TriggerBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, trigger: Arc<Trigger>) {
        debug!("registering trigger '{}' ({})", trigger.name, trigger.source);
        self.by_kind.entry(trigger.event.kind()).or_default().push(trigger);
    }

    /// Drop every trigger that came from the named script. In-flight
    /// continuations keep their own `Arc` and are unaffected.
    pub fn unregister_script(&mut self, script: &str) -> usize {
        let mut removed = 0;
        for list in self.by_kind.values_mut() {
            let before = list.len();
            list.retain(|t| t.source.script != script);
            removed += before - list.len();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
    }

    /// Triggers whose spec matches this event, in registration order.
    #[must_use]
    pub fn matching(&self, event: &GameEvent) -> Vec<Arc<Trigger>> {
        self.by_kind
            .get(&event.kind())
            .map(|list| {
                list.iter()
                    .filter(|t| t.event.matches(event))
                    .map(Arc::clone)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Periodic triggers, for (re)arming after a load.
    #[must_use]
    pub fn periodic(&self) -> Vec<Arc<Trigger>> {
        self.by_kind
            .get(&EventKind::Periodic)
            .map(|list| list.iter().map(Arc::clone).collect())
            .unwrap_or_default()
    }

    /// Whether this exact trigger is still registered. Used by the
    /// scheduler's periodic re-arm to notice a reload happened.
    #[must_use]
    pub fn contains(&self, trigger: &Arc<Trigger>) -> bool {
        self.by_kind
            .get(&trigger.event.kind())
            .is_some_and(|list| list.iter().any(|t| Arc::ptr_eq(t, trigger)))
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered triggers, for the console `scripts` listing.
    pub fn all(&self) -> Vec<Arc<Trigger>> {
        let mut all: Vec<Arc<Trigger>> = self.by_kind.values().flatten().map(Arc::clone).collect();
        all.sort_by(|a, b| (&a.source.script, a.source.line).cmp(&(&b.source.script, b.source.line)));
        all
    }
}

#[cfg(test)]
mod tests {
    use schist_data::{
        BlockKind, Effect, EventSpec, Expr, PlayerId, SourceRef, Statement, TriggerDef,
    };

    use super::*;

    fn trigger(script: &str, line: usize, event: EventSpec) -> Arc<Trigger> {
        Trigger::from_def(TriggerDef {
            name: event.to_string(),
            event,
            body: vec![Statement::Effect(Effect::Broadcast {
                texts: Expr::text("hi"),
            })],
            source: SourceRef {
                script: script.into(),
                line,
            },
        })
    }

    #[test]
    fn fan_out_preserves_registration_order() {
        let mut bus = TriggerBus::new();
        let first = trigger("a.sk", 1, EventSpec::Join);
        let second = trigger("b.sk", 1, EventSpec::Join);
        bus.register(Arc::clone(&first));
        bus.register(Arc::clone(&second));
        let event = GameEvent::Join {
            player: PlayerId::random(),
        };
        let hit = bus.matching(&event);
        assert_eq!(hit.len(), 2);
        assert!(Arc::ptr_eq(&hit[0], &first));
        assert!(Arc::ptr_eq(&hit[1], &second));
    }

    #[test]
    fn block_filter_is_applied_at_dispatch() {
        let mut bus = TriggerBus::new();
        bus.register(trigger("a.sk", 1, EventSpec::BlockBreak {
            filter: Some(BlockKind::new("stone")),
        }));
        bus.register(trigger("a.sk", 5, EventSpec::BlockBreak { filter: None }));
        let event = GameEvent::BlockBreak {
            player: PlayerId::random(),
            pos: schist_data::BlockPos::new(0, 64, 0),
            block: BlockKind::new("dirt"),
        };
        assert_eq!(bus.matching(&event).len(), 1);
    }

    #[test]
    fn unregister_script_severs_only_that_script() {
        let mut bus = TriggerBus::new();
        let keep = trigger("keep.sk", 1, EventSpec::Join);
        let drop1 = trigger("drop.sk", 1, EventSpec::Join);
        let drop2 = trigger("drop.sk", 4, EventSpec::Chat);
        bus.register(keep);
        bus.register(Arc::clone(&drop1));
        bus.register(drop2);
        assert_eq!(bus.unregister_script("drop.sk"), 2);
        assert_eq!(bus.len(), 1);
        assert!(!bus.contains(&drop1));
        // the Arc itself is still alive for any in-flight walk
        assert_eq!(Arc::strong_count(&drop1), 1);
    }
}
