//! The engine: owns the world, the registries, the bus, and the clock.
//!
//! One `Engine` is the whole runtime. Host events come in through
//! [`Engine::fire`], time advances through [`Engine::tick`], and everything
//! else (suspended walks, periodic firings, worker hop-backs) happens
//! inside those two calls on the calling thread.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error};
use schist_data::{EventSpec, GameEvent};
use schist_script::{Diagnostic, SyntaxRegistry, TypeRegistry, standard_registries};

use crate::bus::TriggerBus;
use crate::config::Config;
use crate::event::EventCtx;
use crate::exec::{ExecCx, Outcome, Resume, run_statement};
use crate::reload::load_dir;
use crate::sched::{Continuation, Scheduler, Task, WorkerDone, WorkerPool};
use crate::trigger::Trigger;
use crate::vars::VarStore;
use crate::world::World;

pub struct Engine {
    pub config: Config,
    pub world: World,
    pub globals: VarStore,
    bus: TriggerBus,
    sched: Scheduler,
    workers: WorkerPool,
    syntax: SyntaxRegistry,
    types: TypeRegistry,
    tick: u64,
    executions: u64,
}

impl Engine {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (syntax, types) = standard_registries();
        let workers = WorkerPool::new(config.workers);
        Self {
            config,
            world: World::new(),
            globals: VarStore::new(),
            bus: TriggerBus::new(),
            sched: Scheduler::new(),
            workers,
            syntax,
            types,
            tick: 0,
            executions: 0,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Frozen syntax registry, for console completion and listings.
    pub fn syntax(&self) -> &SyntaxRegistry {
        &self.syntax
    }

    pub fn triggers(&self) -> Vec<Arc<Trigger>> {
        self.bus.all()
    }

    /// (Re)load every script in the configured directory.
    ///
    /// The bus is rebuilt from scratch; in-flight continuations keep their
    /// `Arc` to the old triggers and finish undisturbed. Armed periodic
    /// entries for old triggers die at their next due tick because the re-arm
    /// check no longer finds them on the bus.
    ///
    /// # Errors
    ///
    /// Fails only on I/O problems; script errors come back as diagnostics.
    pub fn reload(&mut self) -> Result<Vec<Diagnostic>> {
        let outcome = load_dir(&self.config.scripts_dir, &self.syntax, &self.types)?;
        self.bus.clear();
        for trigger in outcome.triggers {
            self.bus.register(trigger);
        }
        self.arm_periodics();
        Ok(outcome.diagnostics)
    }

    fn arm_periodics(&mut self) {
        for trigger in self.bus.periodic() {
            if let EventSpec::Periodic { period } = trigger.event {
                let due = self.tick + period.ticks().max(1);
                self.sched.schedule_at(due, Task::FirePeriodic(trigger));
            }
        }
    }

    /// Dispatch a host event to every matching trigger, in registration
    /// order. Returns true when some trigger cancelled the event before
    /// its first delay; the host should then drop the event.
    pub fn fire(&mut self, event: GameEvent) -> bool {
        let triggers = self.bus.matching(&event);
        debug!("dispatching {} to {} trigger(s)", event.describe(), triggers.len());
        let mut cancelled = false;
        for trigger in triggers {
            self.executions += 1;
            let ctx = EventCtx::new(event.clone(), self.executions);
            if let Some(done) = self.walk(&trigger, 0, ctx) {
                cancelled |= done.cancelled;
            }
        }
        cancelled
    }

    /// Advance the clock one tick: resume due continuations, fire due
    /// periodic triggers, and run walks whose worker job finished.
    pub fn tick(&mut self) {
        self.tick += 1;
        while let Some(task) = self.sched.pop_due(self.tick) {
            match task {
                Task::Placeholder => {},
                Task::Resume(Continuation { trigger, next, ctx }) => {
                    if let Some(index) = next {
                        self.walk(&trigger, index, ctx);
                    }
                },
                Task::FirePeriodic(trigger) => self.fire_periodic(&trigger),
            }
        }
        for done in self.workers.drain_done() {
            self.resume_after_worker(done);
        }
    }

    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Block until all in-flight worker jobs are done and resume their
    /// walks. Tests and shutdown use this; the tick loop never blocks.
    pub fn flush_workers(&mut self) {
        for done in self.workers.drain_blocking(Duration::from_secs(10)) {
            self.resume_after_worker(done);
        }
    }

    fn fire_periodic(&mut self, trigger: &Arc<Trigger>) {
        let EventSpec::Periodic { period } = trigger.event else {
            return;
        };
        // a reload replaced this trigger; let the armed entry die
        if !self.bus.contains(trigger) {
            debug!("periodic trigger '{}' no longer registered; not re-arming", trigger.name);
            return;
        }
        // re-arm first so a runtime error can't stop the clock
        let due = self.tick + period.ticks().max(1);
        self.sched.schedule_at(due, Task::FirePeriodic(Arc::clone(trigger)));

        self.executions += 1;
        let ctx = EventCtx::new(GameEvent::Periodic { period }, self.executions);
        self.walk(trigger, 0, ctx);
    }

    fn resume_after_worker(&mut self, done: WorkerDone) {
        let Continuation { trigger, next, ctx } = done.cont;
        if let Err(err) = done.result {
            error!(
                "background job of trigger '{}' ({}) failed: {err} [no backtrace]",
                trigger.name, trigger.source
            );
            return;
        }
        if let Some(index) = next {
            self.walk(&trigger, index, ctx);
        }
    }

    /// Walk trigger items from `start` until the end, a false condition, a
    /// suspension, or a runtime error. Returns the context when the walk
    /// ran to completion (or stopped), `None` when it suspended.
    fn walk(&mut self, trigger: &Arc<Trigger>, start: usize, mut ctx: EventCtx) -> Option<EventCtx> {
        debug!(
            "walk #{} of '{}' ({}) from item {start}",
            ctx.execution, trigger.name, trigger.source
        );
        let mut index = Some(start);
        while let Some(i) = index {
            let item = &trigger.items[i];
            debug!("  #{} item {i}: {}", ctx.execution, item.statement);
            let mut cx = ExecCx {
                world: &mut self.world,
                globals: &mut self.globals,
                ctx: &mut ctx,
                types: &self.types,
                data_dir: &self.config.data_dir,
            };
            match run_statement(&mut cx, &item.statement) {
                Ok(Outcome::Continue) => index = item.next,
                Ok(Outcome::Stop) => {
                    debug!("  #{} stopped at item {i}", ctx.execution);
                    return Some(ctx);
                },
                Ok(Outcome::Suspend(resume)) => {
                    let cont = Continuation {
                        trigger: Arc::clone(trigger),
                        next: item.next,
                        ctx,
                    };
                    match resume {
                        Resume::AfterTicks(n) => {
                            self.sched.schedule_at(self.tick + n, Task::Resume(cont));
                        },
                        Resume::Worker(job) => self.workers.submit(job, cont),
                    }
                    return None;
                },
                Err(err) => {
                    error!(
                        "error in trigger '{}' ({}) at '{}': {err} [no backtrace]",
                        trigger.name, trigger.source, item.statement
                    );
                    return Some(ctx);
                },
            }
        }
        debug!("walk #{} of '{}' finished", ctx.execution, trigger.name);
        Some(ctx)
    }
}

#[cfg(test)]
mod tests {
    use schist_data::{SourceRef, Statement, TriggerDef};
    use schist_script::{ScriptParser, parse_source};

    use super::*;

    fn engine() -> Engine {
        Engine::new(Config::default())
    }

    fn install(engine: &mut Engine, script: &str) {
        let (source, structural) = parse_source("test.sk", script);
        assert!(structural.is_empty(), "{structural:?}");
        let mut parser = ScriptParser::new(&engine.syntax, &engine.types);
        let parsed = parser.parse_script(&source);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        for def in parsed.triggers {
            engine.bus.register(Trigger::from_def(def));
        }
        engine.arm_periodics();
    }

    fn last_broadcast(engine: &mut Engine) -> Option<String> {
        engine.world.drain_outbox().into_iter().rev().find_map(|o| match o {
            crate::world::Outbound::Broadcast { text } => Some(text),
            _ => None,
        })
    }

    #[test]
    fn fire_reports_cancellation_only_before_a_delay() {
        let mut engine = engine();
        install(&mut engine, "on chat:\n    cancel the event\n");
        let player = engine.world.join("ada");
        assert!(engine.fire(GameEvent::Chat {
            player,
            message: "hi".into(),
        }));

        let mut delayed = self::engine();
        install(
            &mut delayed,
            "on chat:\n    wait a tick\n    cancel the event\n",
        );
        let player = delayed.world.join("bob");
        assert!(!delayed.fire(GameEvent::Chat {
            player,
            message: "hi".into(),
        }));
        // the late cancel is ignored when the walk resumes
        delayed.tick();
    }

    #[test]
    fn delayed_walk_resumes_on_schedule() {
        let mut engine = engine();
        install(
            &mut engine,
            "on join:\n    wait 3 ticks\n    broadcast \"awake\"\n",
        );
        let player = engine.world.join("ada");
        engine.fire(GameEvent::Join { player });
        assert_eq!(last_broadcast(&mut engine), None);
        engine.run_ticks(2);
        assert_eq!(last_broadcast(&mut engine), None);
        engine.tick();
        assert_eq!(last_broadcast(&mut engine), Some("awake".into()));
    }

    #[test]
    fn periodic_triggers_re_arm_on_dispatch() {
        let mut engine = engine();
        install(&mut engine, "every 2 ticks:\n    broadcast \"beat\"\n");
        engine.run_ticks(2);
        assert_eq!(last_broadcast(&mut engine), Some("beat".into()));
        engine.run_ticks(2);
        assert_eq!(last_broadcast(&mut engine), Some("beat".into()));
    }

    #[test]
    fn runtime_error_abandons_only_that_firing() {
        let mut engine = engine();
        // "the message" has no value in a join event at runtime; force it
        // via a hand-built trigger so the parser can't reject it.
        let def = TriggerDef {
            name: "broken".into(),
            event: schist_data::EventSpec::Join,
            body: vec![
                Statement::Effect(schist_data::Effect::Broadcast {
                    texts: schist_data::Expr::EventValue {
                        kind: schist_data::ValueKind::Text,
                    },
                }),
                Statement::Effect(schist_data::Effect::Broadcast {
                    texts: schist_data::Expr::text("unreachable"),
                }),
            ],
            source: SourceRef {
                script: "broken.sk".into(),
                line: 1,
            },
        };
        engine.bus.register(Trigger::from_def(def));
        install(&mut engine, "on join:\n    broadcast \"healthy\"\n");

        let player = engine.world.join("ada");
        engine.fire(GameEvent::Join { player });
        let outbox = engine.world.drain_outbox();
        let texts: Vec<_> = outbox
            .iter()
            .filter_map(|o| match o {
                crate::world::Outbound::Broadcast { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["healthy"]);
    }

    #[test]
    fn conditions_stop_the_rest_of_the_trigger() {
        let mut engine = engine();
        install(
            &mut engine,
            "on join:\n    the player has permission \"vip\"\n    broadcast \"vip joined\"\n",
        );
        let player = engine.world.join("ada");
        engine.fire(GameEvent::Join { player });
        assert_eq!(last_broadcast(&mut engine), None);

        engine.world.player_mut(player).unwrap().permissions.insert("vip".into());
        engine.fire(GameEvent::Join { player });
        assert_eq!(last_broadcast(&mut engine), Some("vip joined".into()));
    }

    #[test]
    fn locals_survive_a_delay_globals_are_shared() {
        let mut engine = engine();
        install(
            &mut engine,
            "on join:\n    set {_who} to the name of the player\n    wait a tick\n    broadcast \"%{_who}% is here\"\n",
        );
        let player = engine.world.join("ada");
        engine.fire(GameEvent::Join { player });
        engine.tick();
        assert_eq!(last_broadcast(&mut engine), Some("ada is here".into()));
        // the local never leaked into the globals
        assert!(engine.globals.is_empty());
    }
}
