//! Per-firing execution context.

use schist_data::{GameEvent, Value, ValueKind};

use crate::vars::VarStore;

/// Everything one firing of a trigger carries across its suspension points.
///
/// Created when an event is dispatched, moved into the continuation on
/// suspend, and dropped when the walk finishes. The `delayed` and
/// `cancelled` flags are explicit state here; nothing else tracks them.
#[derive(Debug)]
pub struct EventCtx {
    /// Payload of the firing event. Periodic firings carry their period.
    pub event: Option<GameEvent>,
    /// Unique id of this firing, for log correlation across suspensions.
    pub execution: u64,
    /// Local (`{_x}`) variables, scoped to this firing.
    pub locals: VarStore,
    /// Set once the walk has passed a delay. A delayed firing can no longer
    /// cancel its event; the host has already applied it.
    pub delayed: bool,
    /// Set by `cancel event`; reported back to the host after the walk's
    /// pre-delay portion finishes.
    pub cancelled: bool,
}

impl EventCtx {
    #[must_use]
    pub fn new(event: GameEvent, execution: u64) -> Self {
        Self {
            event: Some(event),
            execution,
            locals: VarStore::new(),
            delayed: false,
            cancelled: false,
        }
    }

    /// Payload value of the given kind, if the current event carries one.
    #[must_use]
    pub fn value_of(&self, kind: ValueKind) -> Option<Value> {
        self.event.as_ref().and_then(|event| event.value_of(kind))
    }
}

#[cfg(test)]
mod tests {
    use schist_data::PlayerId;

    use super::*;

    #[test]
    fn fresh_context_is_neither_delayed_nor_cancelled() {
        let ctx = EventCtx::new(
            GameEvent::Join {
                player: PlayerId::random(),
            },
            1,
        );
        assert!(!ctx.delayed);
        assert!(!ctx.cancelled);
        assert!(ctx.value_of(ValueKind::Player).is_some());
        assert!(ctx.value_of(ValueKind::Text).is_none());
    }
}
