//! Statement execution: effects, conditions, and the suspend protocol.
//!
//! `run_statement` is the single dispatch point the walk loop calls per
//! trigger item. Effects act on the world and variable stores; conditions
//! evaluate to a bool that the walk turns into continue-or-stop. Both
//! matches are exhaustive over the AST, so a new statement variant fails to
//! compile here until it can execute.

pub mod eval;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use rand::Rng;
use schist_data::{
    ChangeMode, Condition, Effect, ItemKind, Relation, Statement, Value, ValueKind,
};
use schist_script::TypeRegistry;
use thiserror::Error;

use crate::event::EventCtx;
use crate::sched::Job;
use crate::vars::VarStore;
use crate::world::{Outbound, World};

use eval::{eval, eval_single, quantify, value_to_text, var_key};

/// A runtime failure inside one trigger item. Caught at the walk boundary;
/// never tears down the engine.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("this event carries no {0}")]
    NoEventValue(ValueKind),
    #[error("this event has no block position")]
    NoBlockPosition,
    #[error("expected a {expected}, got '{got}'")]
    WrongKind { expected: ValueKind, got: String },
    #[error("'{0}' has no value here")]
    NoValue(String),
    #[error("invalid regex '{pattern}': {message}")]
    BadRegex { pattern: String, message: String },
    #[error("file path '{0}' escapes the data directory")]
    BadPath(String),
    #[error("'{0}' can't be changed")]
    NotChangeable(String),
    #[error("writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a suspended walk comes back.
pub enum Resume {
    /// Re-enter after this many scheduler ticks.
    AfterTicks(u64),
    /// Run the job on a worker thread, then re-enter on the main thread.
    Worker(Job),
}

/// What one item told the walk loop to do next.
pub enum Outcome {
    Continue,
    Stop,
    Suspend(Resume),
}

/// Everything an item needs to execute. Borrowed fresh for each item so the
/// engine keeps ownership between suspensions.
pub struct ExecCx<'a> {
    pub world: &'a mut World,
    pub globals: &'a mut VarStore,
    pub ctx: &'a mut EventCtx,
    pub types: &'a TypeRegistry,
    pub data_dir: &'a Path,
}

/// Execute one statement. Conditions map false to `Outcome::Stop`.
///
/// # Errors
///
/// Returns [`ExecError`] for runtime failures the parser could not rule
/// out: missing event payloads, bad regexes, unwritable paths.
pub fn run_statement(cx: &mut ExecCx<'_>, statement: &Statement) -> Result<Outcome, ExecError> {
    match statement {
        Statement::Effect(effect) => run_effect(cx, effect),
        Statement::Condition(condition) => {
            if check_condition(cx, condition)? {
                Ok(Outcome::Continue)
            } else {
                Ok(Outcome::Stop)
            }
        },
    }
}

fn run_effect(cx: &mut ExecCx<'_>, effect: &Effect) -> Result<Outcome, ExecError> {
    match effect {
        Effect::Message { texts, recipients } => {
            let texts = rendered_texts(cx, texts)?;
            let recipients = player_ids(cx, recipients)?;
            for id in recipients {
                for text in &texts {
                    cx.world.send(id, text);
                }
            }
            Ok(Outcome::Continue)
        },
        Effect::Broadcast { texts } => {
            for text in rendered_texts(cx, texts)? {
                cx.world.broadcast(&text);
            }
            Ok(Outcome::Continue)
        },
        Effect::Wait { duration } => {
            let value = required(cx, duration)?;
            let Some(span) = value.as_timespan() else {
                return Err(wrong_kind(ValueKind::Timespan, &value));
            };
            cx.ctx.delayed = true;
            // zero-tick waits still yield to the next tick
            Ok(Outcome::Suspend(Resume::AfterTicks(span.ticks().max(1))))
        },
        Effect::CancelEvent => {
            if cx.ctx.delayed {
                warn!("ignoring 'cancel the event' after a delay; the event already ran");
            } else if cx.ctx.event.as_ref().is_some_and(schist_data::GameEvent::cancellable) {
                cx.ctx.cancelled = true;
            } else {
                warn!("ignoring 'cancel the event': this event can't be cancelled");
            }
            Ok(Outcome::Continue)
        },
        Effect::Kick { players, reason } => {
            let reason = match reason {
                Some(expr) => rendered_texts(cx, expr)?.join(" "),
                None => "kicked from the server".to_string(),
            };
            for id in player_ids(cx, players)? {
                cx.world.kick(id, &reason);
            }
            Ok(Outcome::Continue)
        },
        Effect::Give { amount, items, players } => {
            let count = match amount {
                Some(expr) => {
                    let value = required(cx, expr)?;
                    let n = as_number(cx.types, &value)?;
                    if n < 0.0 {
                        return Err(wrong_kind(ValueKind::Number, &value));
                    }
                    n.round() as u64
                },
                None => 1,
            };
            let items = item_kinds(cx, items)?;
            for id in player_ids(cx, players)? {
                if let Some(player) = cx.world.player_mut(id) {
                    for item in &items {
                        player.give(item, count);
                    }
                }
            }
            Ok(Outcome::Continue)
        },
        Effect::SetBlock { block } => {
            let Some(Value::Position(pos)) = cx.ctx.value_of(ValueKind::Position) else {
                return Err(ExecError::NoBlockPosition);
            };
            let value = required(cx, block)?;
            let Value::Block(kind) = value else {
                return Err(wrong_kind(ValueKind::Block, &value));
            };
            cx.world.set_block(pos, kind);
            Ok(Outcome::Continue)
        },
        Effect::Command { command } => {
            for line in rendered_texts(cx, command)? {
                cx.world.outbox.push(Outbound::Command { line });
            }
            Ok(Outcome::Continue)
        },
        Effect::Log { messages } => {
            for text in rendered_texts(cx, messages)? {
                info!(target: "script", "{text}");
                cx.world.outbox.push(Outbound::Log { text });
            }
            Ok(Outcome::Continue)
        },
        Effect::WriteFile { texts, path } => {
            let lines = rendered_texts(cx, texts)?;
            let rel = rendered_texts(cx, path)?.join("");
            let target = resolve_data_path(cx.data_dir, &rel)?;
            // the write happens on a worker; the walk resumes afterwards
            cx.ctx.delayed = true;
            Ok(Outcome::Suspend(Resume::Worker(Box::new(move || {
                append_lines(&target, &lines)
            }))))
        },
        Effect::Change { mode, target, value } => run_change(cx, *mode, target, value.as_ref()),
    }
}

fn run_change(
    cx: &mut ExecCx<'_>,
    mode: ChangeMode,
    target: &schist_data::Expr,
    value: Option<&schist_data::Expr>,
) -> Result<Outcome, ExecError> {
    use schist_data::Expr;
    let new = match value {
        Some(expr) => eval(cx, expr)?.values,
        None => Vec::new(),
    };
    match target {
        Expr::Variable { name, local, list } => {
            let key = var_key(cx, name)?;
            let types = cx.types;
            let store: &mut VarStore = if *local { &mut cx.ctx.locals } else { &mut *cx.globals };
            if *list {
                match mode {
                    ChangeMode::Set => store.set_list(&key, new),
                    ChangeMode::Add => {
                        for value in new {
                            store.push(&key, value);
                        }
                    },
                    ChangeMode::Remove => {
                        for value in &new {
                            store.remove_value(&key, value);
                        }
                    },
                    ChangeMode::Delete => store.delete_list(&key),
                }
            } else {
                match mode {
                    ChangeMode::Set => {
                        if let Some(value) = new.into_iter().next() {
                            store.set(&key, value);
                        } else {
                            store.delete(&key);
                        }
                    },
                    ChangeMode::Add | ChangeMode::Remove => {
                        let current = store.get(&key).and_then(Value::as_number).unwrap_or(0.0);
                        let mut delta = 0.0;
                        for value in &new {
                            delta += as_number(types, value)?;
                        }
                        if mode == ChangeMode::Remove {
                            delta = -delta;
                        }
                        store.set(&key, Value::Number(current + delta));
                    },
                    ChangeMode::Delete => store.delete(&key),
                }
            }
            Ok(Outcome::Continue)
        },
        Expr::HealthOf(inner) => {
            let players = player_ids(cx, inner)?;
            let delta = if matches!(mode, ChangeMode::Delete) {
                0.0
            } else {
                let mut total = 0.0;
                for value in &new {
                    total += as_number(cx.types, value)?;
                }
                total
            };
            for id in players {
                if let Some(player) = cx.world.player_mut(id) {
                    let next = match mode {
                        ChangeMode::Set => delta,
                        ChangeMode::Add => player.health() + delta,
                        ChangeMode::Remove => player.health() - delta,
                        ChangeMode::Delete => 0.0,
                    };
                    player.set_health(next);
                }
            }
            Ok(Outcome::Continue)
        },
        other => Err(ExecError::NotChangeable(other.to_string())),
    }
}

/// Evaluate a condition to its truth value.
///
/// # Errors
///
/// Propagates evaluation failures (missing event payloads, bad regexes).
pub fn check_condition(cx: &mut ExecCx<'_>, condition: &Condition) -> Result<bool, ExecError> {
    let result = match condition {
        Condition::Compare {
            lhs,
            relation,
            rhs,
            negated,
        } => {
            let lhs = eval(cx, lhs)?;
            let rhs = eval(cx, rhs)?;
            let types = cx.types;
            let held = quantify(&lhs, |l| {
                quantify(&rhs, |r| relation_holds(types, l, *relation, r))
            });
            held != *negated
        },
        Condition::Online { players, negated } => {
            let players = eval(cx, players)?;
            let world: &World = cx.world;
            let held = quantify(&players, |value| {
                value
                    .as_player()
                    .and_then(|id| world.player(id))
                    .is_some_and(|p| p.online)
            });
            held != *negated
        },
        Condition::HasPermission {
            players,
            permission,
            negated,
        } => {
            let players = eval(cx, players)?;
            let nodes = eval(cx, permission)?;
            let world: &World = cx.world;
            let held = quantify(&players, |value| {
                let Some(player) = value.as_player().and_then(|id| world.player(id)) else {
                    return false;
                };
                quantify(&nodes, |node| {
                    node.as_text().is_some_and(|n| player.has_permission(n))
                })
            });
            held != *negated
        },
        Condition::Holding { players, item, negated } => {
            let players = eval(cx, players)?;
            let items = item_kinds(cx, item)?;
            let world: &World = cx.world;
            let held = quantify(&players, |value| {
                let Some(player) = value.as_player().and_then(|id| world.player(id)) else {
                    return false;
                };
                items.iter().any(|item| player.is_holding(item))
            });
            held != *negated
        },
        Condition::Chance { percent } => {
            let value = required(cx, percent)?;
            let p = as_number(cx.types, &value)?;
            rand::rng().random_bool((p / 100.0).clamp(0.0, 1.0))
        },
        Condition::Matches { text, pattern, negated } => {
            let texts = eval(cx, text)?;
            let patterns = rendered_texts(cx, pattern)?;
            let mut regexes = Vec::with_capacity(patterns.len());
            for pattern in &patterns {
                regexes.push(eval::cached_regex(pattern)?);
            }
            let world: &World = cx.world;
            let types = cx.types;
            let held = quantify(&texts, |value| {
                let rendered = value_to_text(world, types, value);
                regexes.iter().any(|re| re.is_match(&rendered))
            });
            held != *negated
        },
    };
    Ok(result)
}

fn relation_holds(types: &TypeRegistry, lhs: &Value, relation: Relation, rhs: &Value) -> bool {
    use std::cmp::Ordering;
    match relation {
        Relation::Equal => types.values_equal(lhs, rhs),
        Relation::Greater => types.compare(lhs, rhs) == Some(Ordering::Greater),
        Relation::GreaterOrEqual => {
            matches!(types.compare(lhs, rhs), Some(Ordering::Greater | Ordering::Equal))
        },
        Relation::Less => types.compare(lhs, rhs) == Some(Ordering::Less),
        Relation::LessOrEqual => {
            matches!(types.compare(lhs, rhs), Some(Ordering::Less | Ordering::Equal))
        },
    }
}

fn required(cx: &mut ExecCx<'_>, expr: &schist_data::Expr) -> Result<Value, ExecError> {
    eval_single(cx, expr)?.ok_or_else(|| ExecError::NoValue(expr.to_string()))
}

fn wrong_kind(expected: ValueKind, got: &Value) -> ExecError {
    ExecError::WrongKind {
        expected,
        got: got.to_string(),
    }
}

fn as_number(types: &TypeRegistry, value: &Value) -> Result<f64, ExecError> {
    types
        .convert(value, ValueKind::Number)
        .and_then(|v| v.as_number())
        .ok_or_else(|| wrong_kind(ValueKind::Number, value))
}

fn rendered_texts(cx: &mut ExecCx<'_>, expr: &schist_data::Expr) -> Result<Vec<String>, ExecError> {
    let evaluated = eval(cx, expr)?;
    let world: &World = cx.world;
    Ok(evaluated
        .values
        .iter()
        .map(|value| value_to_text(world, cx.types, value))
        .collect())
}

fn player_ids(cx: &mut ExecCx<'_>, expr: &schist_data::Expr) -> Result<Vec<schist_data::PlayerId>, ExecError> {
    let evaluated = eval(cx, expr)?;
    let mut ids = Vec::with_capacity(evaluated.values.len());
    for value in &evaluated.values {
        match value {
            Value::Player(id) => ids.push(*id),
            other => return Err(wrong_kind(ValueKind::Player, other)),
        }
    }
    Ok(ids)
}

fn item_kinds(cx: &mut ExecCx<'_>, expr: &schist_data::Expr) -> Result<Vec<ItemKind>, ExecError> {
    let evaluated = eval(cx, expr)?;
    let mut items = Vec::with_capacity(evaluated.values.len());
    for value in &evaluated.values {
        match cx.types.convert(value, ValueKind::Item) {
            Some(Value::Item(item)) => items.push(item),
            _ => return Err(wrong_kind(ValueKind::Item, value)),
        }
    }
    Ok(items)
}

/// Join a script-supplied relative path under the data directory.
/// Absolute paths and `..` components are rejected before anything touches
/// the filesystem.
fn resolve_data_path(data_dir: &Path, rel: &str) -> Result<PathBuf, ExecError> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute()
        || rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ExecError::BadPath(rel.to_string()));
    }
    Ok(data_dir.join(rel_path))
}

fn append_lines(path: &Path, lines: &[String]) -> Result<(), ExecError> {
    let io_err = |source| ExecError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).map_err(io_err)?;
    for line in lines {
        writeln!(file, "{line}").map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use schist_data::{Expr, GameEvent, PlayerId, Timespan};
    use schist_script::standard_registries;

    use super::*;

    struct Fixture {
        world: World,
        globals: VarStore,
        ctx: EventCtx,
        types: TypeRegistry,
        player: PlayerId,
    }

    impl Fixture {
        fn new() -> Self {
            let (_, types) = standard_registries();
            let mut world = World::new();
            let player = world.join("ada");
            let ctx = EventCtx::new(GameEvent::Join { player }, 1);
            Self {
                world,
                globals: VarStore::new(),
                ctx,
                types,
                player,
            }
        }

        fn cx(&mut self) -> ExecCx<'_> {
            ExecCx {
                world: &mut self.world,
                globals: &mut self.globals,
                ctx: &mut self.ctx,
                types: &self.types,
                data_dir: Path::new("data"),
            }
        }
    }

    fn player_expr() -> Expr {
        Expr::EventValue {
            kind: ValueKind::Player,
        }
    }

    #[test]
    fn message_lands_in_the_outbox() {
        let mut fx = Fixture::new();
        let effect = Effect::Message {
            texts: Expr::text("hello"),
            recipients: player_expr(),
        };
        let outcome = run_effect(&mut fx.cx(), &effect).unwrap();
        assert!(matches!(outcome, Outcome::Continue));
        assert_eq!(fx.world.drain_outbox(), vec![Outbound::Message {
            to: "ada".into(),
            text: "hello".into(),
        }]);
    }

    #[test]
    fn wait_suspends_and_marks_the_context_delayed() {
        let mut fx = Fixture::new();
        let effect = Effect::Wait {
            duration: Expr::Literal(Value::Timespan(Timespan::from_secs(5))),
        };
        let outcome = run_effect(&mut fx.cx(), &effect).unwrap();
        let Outcome::Suspend(Resume::AfterTicks(ticks)) = outcome else {
            panic!("wait did not suspend");
        };
        assert_eq!(ticks, 100);
        assert!(fx.ctx.delayed);
    }

    #[test]
    fn zero_wait_still_yields_one_tick() {
        let mut fx = Fixture::new();
        let effect = Effect::Wait {
            duration: Expr::Literal(Value::Timespan(Timespan::from_millis(0))),
        };
        let Outcome::Suspend(Resume::AfterTicks(ticks)) = run_effect(&mut fx.cx(), &effect).unwrap()
        else {
            panic!("wait did not suspend");
        };
        assert_eq!(ticks, 1);
    }

    #[test]
    fn cancel_after_delay_is_ignored() {
        let mut fx = Fixture::new();
        fx.ctx.event = Some(GameEvent::Chat {
            player: fx.player,
            message: "hi".into(),
        });
        fx.ctx.delayed = true;
        run_effect(&mut fx.cx(), &Effect::CancelEvent).unwrap();
        assert!(!fx.ctx.cancelled);

        fx.ctx.delayed = false;
        run_effect(&mut fx.cx(), &Effect::CancelEvent).unwrap();
        assert!(fx.ctx.cancelled);
    }

    #[test]
    fn give_defaults_to_one_of_each() {
        let mut fx = Fixture::new();
        let effect = Effect::Give {
            amount: None,
            items: Expr::Literal(Value::Item(ItemKind::new("bread"))),
            players: player_expr(),
        };
        run_effect(&mut fx.cx(), &effect).unwrap();
        let player = fx.world.player(fx.player).unwrap();
        assert_eq!(player.inventory.get(&ItemKind::new("bread")), Some(&1));
    }

    #[test]
    fn compare_with_or_list_takes_any_match() {
        let mut fx = Fixture::new();
        let cond = Condition::Compare {
            lhs: Expr::number(2.0),
            relation: Relation::Equal,
            rhs: Expr::List {
                items: vec![Expr::number(1.0), Expr::number(2.0)],
                or: true,
            },
            negated: false,
        };
        assert!(check_condition(&mut fx.cx(), &cond).unwrap());

        let and_version = Condition::Compare {
            lhs: Expr::number(2.0),
            relation: Relation::Equal,
            rhs: Expr::List {
                items: vec![Expr::number(1.0), Expr::number(2.0)],
                or: false,
            },
            negated: false,
        };
        assert!(!check_condition(&mut fx.cx(), &and_version).unwrap());
    }

    #[test]
    fn compare_converts_mixed_kinds() {
        let mut fx = Fixture::new();
        // number 5 vs text "5": the text side converts through number -> text
        let cond = Condition::Compare {
            lhs: Expr::number(5.0),
            relation: Relation::Equal,
            rhs: Expr::text("5"),
            negated: false,
        };
        assert!(check_condition(&mut fx.cx(), &cond).unwrap());
    }

    #[test]
    fn holding_checks_the_held_stack() {
        let mut fx = Fixture::new();
        fx.world
            .player_mut(fx.player)
            .unwrap()
            .give(&ItemKind::new("iron sword"), 1);
        let cond = Condition::Holding {
            players: player_expr(),
            item: Expr::Literal(Value::Item(ItemKind::new("iron sword"))),
            negated: false,
        };
        assert!(check_condition(&mut fx.cx(), &cond).unwrap());
    }

    #[test]
    fn chance_extremes_are_deterministic() {
        let mut fx = Fixture::new();
        let always = Condition::Chance {
            percent: Expr::number(100.0),
        };
        let never = Condition::Chance {
            percent: Expr::number(0.0),
        };
        assert!(check_condition(&mut fx.cx(), &always).unwrap());
        assert!(!check_condition(&mut fx.cx(), &never).unwrap());
    }

    #[test]
    fn matches_rejects_bad_regexes() {
        let mut fx = Fixture::new();
        let cond = Condition::Matches {
            text: Expr::text("hello"),
            pattern: Expr::text("("),
            negated: false,
        };
        assert!(matches!(
            check_condition(&mut fx.cx(), &cond),
            Err(ExecError::BadRegex { .. })
        ));
    }

    #[test]
    fn change_add_treats_missing_scalar_as_zero() {
        let mut fx = Fixture::new();
        let effect = Effect::Change {
            mode: ChangeMode::Add,
            target: Expr::Variable {
                name: schist_data::VarName {
                    parts: vec![schist_data::TextPart::Text("kills".into())],
                },
                local: false,
                list: false,
            },
            value: Some(Expr::number(3.0)),
        };
        run_effect(&mut fx.cx(), &effect).unwrap();
        run_effect(&mut fx.cx(), &effect).unwrap();
        assert_eq!(fx.globals.get("kills"), Some(&Value::Number(6.0)));
    }

    #[test]
    fn change_health_clamps() {
        let mut fx = Fixture::new();
        let effect = Effect::Change {
            mode: ChangeMode::Add,
            target: Expr::HealthOf(Box::new(player_expr())),
            value: Some(Expr::number(50.0)),
        };
        run_effect(&mut fx.cx(), &effect).unwrap();
        assert_eq!(fx.world.player(fx.player).unwrap().health(), 20.0);
    }

    #[test]
    fn data_paths_cannot_escape() {
        assert!(resolve_data_path(Path::new("data"), "../etc/passwd").is_err());
        assert!(resolve_data_path(Path::new("data"), "/etc/passwd").is_err());
        assert!(resolve_data_path(Path::new("data"), "logs/app.txt").is_ok());
    }

    #[test]
    fn set_block_needs_a_positioned_event() {
        let mut fx = Fixture::new();
        let effect = Effect::SetBlock {
            block: Expr::Literal(Value::Block(schist_data::BlockKind::new("stone"))),
        };
        assert!(matches!(
            run_effect(&mut fx.cx(), &effect),
            Err(ExecError::NoBlockPosition)
        ));

        fx.ctx.event = Some(GameEvent::BlockBreak {
            player: fx.player,
            pos: schist_data::BlockPos::new(1, 64, 1),
            block: schist_data::BlockKind::new("dirt"),
        });
        run_effect(&mut fx.cx(), &effect).unwrap();
        assert_eq!(
            fx.world.block_at(schist_data::BlockPos::new(1, 64, 1)),
            Some(&schist_data::BlockKind::new("stone"))
        );
    }
}
