//! Runtime form of a parsed trigger.
//!
//! The parser hands over a flat statement list; the engine stores it as an
//! item arena with explicit `next` links so a continuation can name "the
//! item after the one that suspended" by index. Triggers are `Arc`-shared:
//! the bus holds one reference, every in-flight continuation another, so
//! unloading a script severs the bus reference without cancelling walks
//! that are already sleeping.

use std::sync::Arc;

use schist_data::{EventSpec, SourceRef, Statement, TriggerDef};

/// One executable node of a trigger.
#[derive(Debug)]
pub struct TriggerItem {
    pub statement: Statement,
    /// Index of the next item, `None` at the end of the trigger.
    pub next: Option<usize>,
}

#[derive(Debug)]
pub struct Trigger {
    pub name: String,
    pub event: EventSpec,
    pub items: Vec<TriggerItem>,
    pub source: SourceRef,
}

impl Trigger {
    /// Build the runtime arena from a parsed definition. Entry point is
    /// item 0; the parser guarantees a non-empty body.
    #[must_use]
    pub fn from_def(def: TriggerDef) -> Arc<Self> {
        let last = def.body.len().saturating_sub(1);
        let items = def
            .body
            .into_iter()
            .enumerate()
            .map(|(i, statement)| TriggerItem {
                statement,
                next: if i == last { None } else { Some(i + 1) },
            })
            .collect();
        Arc::new(Self {
            name: def.name,
            event: def.event,
            items,
            source: def.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use schist_data::{Effect, Expr, ValueKind};

    use super::*;

    fn def(body: Vec<Statement>) -> TriggerDef {
        TriggerDef {
            name: "t".into(),
            event: EventSpec::Join,
            body,
            source: SourceRef {
                script: "test.sk".into(),
                line: 1,
            },
        }
    }

    #[test]
    fn links_form_a_single_chain() {
        let broadcast = Statement::Effect(Effect::Broadcast {
            texts: Expr::text("hi"),
        });
        let trigger = Trigger::from_def(def(vec![broadcast.clone(), broadcast.clone(), broadcast]));
        assert_eq!(trigger.items[0].next, Some(1));
        assert_eq!(trigger.items[1].next, Some(2));
        assert_eq!(trigger.items[2].next, None);
    }

    #[test]
    fn single_item_has_no_next() {
        let stmt = Statement::Effect(Effect::Message {
            texts: Expr::text("hi"),
            recipients: Expr::EventValue {
                kind: ValueKind::Player,
            },
        });
        let trigger = Trigger::from_def(def(vec![stmt]));
        assert_eq!(trigger.items.len(), 1);
        assert_eq!(trigger.items[0].next, None);
    }
}
