//! End-to-end runtime tests: scripts on disk, through reload, fire, tick.

use std::fs;
use std::path::Path;

use schist_data::GameEvent;
use schist_engine::config::Config;
use schist_engine::world::Outbound;
use schist_engine::Engine;

fn engine_with(dir: &Path, script: &str) -> Engine {
    let scripts_dir = dir.join("scripts");
    fs::create_dir_all(&scripts_dir).unwrap();
    fs::write(scripts_dir.join("test.sk"), script).unwrap();
    let mut engine = Engine::new(Config {
        scripts_dir,
        data_dir: dir.join("data"),
        workers: 1,
    });
    let diagnostics = engine.reload().unwrap();
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    engine
}

fn broadcasts(engine: &mut Engine) -> Vec<String> {
    engine
        .world
        .drain_outbox()
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Broadcast { text } => Some(text),
            _ => None,
        })
        .collect()
}

#[test]
fn join_script_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        r#"
on join:
    add 1 to {visits::%the player%}
    set {_n} to {visits::%the player%}
    send "welcome, %the player%! visit %{_n}%"
    give 2 of bread to the player
"#,
    );
    let player = engine.world.join("ada");
    engine.fire(GameEvent::Join { player });
    engine.fire(GameEvent::Join { player });

    let messages: Vec<String> = engine
        .world
        .drain_outbox()
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Message { to, text } => {
                assert_eq!(to, "ada");
                Some(text)
            },
            _ => None,
        })
        .collect();
    assert_eq!(messages, vec!["welcome, ada! visit 1", "welcome, ada! visit 2"]);
    let bread = schist_data::ItemKind::new("bread");
    assert_eq!(engine.world.player(player).unwrap().inventory.get(&bread), Some(&4));
}

#[test]
fn chat_cancellation_reaches_the_host() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        r#"
on chat:
    the message matches "(?i).*badword.*"
    cancel the event
    send "watch it" to the player
"#,
    );
    let player = engine.world.join("ada");
    assert!(engine.fire(GameEvent::Chat {
        player,
        message: "BADWORD!".into(),
    }));
    assert!(!engine.fire(GameEvent::Chat {
        player,
        message: "good morning".into(),
    }));
}

#[test]
fn worker_effect_hops_back_before_the_walk_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        r#"
on join:
    broadcast "before"
    write "entry for %the player%" to file "logs/joins.txt"
    broadcast "after"
"#,
    );
    let player = engine.world.join("ada");
    engine.fire(GameEvent::Join { player });
    // the walk is parked on the worker; "after" must not have run yet
    assert_eq!(broadcasts(&mut engine), vec!["before"]);

    engine.flush_workers();
    assert_eq!(broadcasts(&mut engine), vec!["after"]);

    let written = fs::read_to_string(dir.path().join("data/logs/joins.txt")).unwrap();
    assert_eq!(written, "entry for ada\n");
}

#[test]
fn reload_keeps_in_flight_walks_alive() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        "on join:\n    wait 2 ticks\n    broadcast \"old\"\n",
    );
    let player = engine.world.join("ada");
    engine.fire(GameEvent::Join { player });

    fs::write(
        dir.path().join("scripts/test.sk"),
        "on join:\n    broadcast \"new\"\n",
    )
    .unwrap();
    engine.reload().unwrap();

    // the suspended walk still finishes against the unloaded trigger
    engine.run_ticks(2);
    assert_eq!(broadcasts(&mut engine), vec!["old"]);

    // fresh events hit only the new trigger
    engine.fire(GameEvent::Join { player });
    assert_eq!(broadcasts(&mut engine), vec!["new"]);
}

#[test]
fn periodic_trigger_fires_on_its_period_and_re_arms() {
    let dir = tempfile::tempdir().unwrap();
    // 3 ticks = 150ms
    let mut engine = engine_with(
        dir.path(),
        "every 150 milliseconds:\n    broadcast \"beat %the period%\"\n",
    );
    engine.run_ticks(2);
    assert!(broadcasts(&mut engine).is_empty());
    engine.tick();
    assert_eq!(broadcasts(&mut engine), vec!["beat 3 ticks"]);
    engine.run_ticks(3);
    assert_eq!(broadcasts(&mut engine), vec!["beat 3 ticks"]);
}

#[test]
fn periodic_stops_after_its_script_is_unloaded() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        "every 2 ticks:\n    broadcast \"beat\"\n",
    );
    engine.run_ticks(2);
    assert_eq!(broadcasts(&mut engine), vec!["beat"]);

    fs::write(dir.path().join("scripts/test.sk"), "on join:\n    broadcast \"quiet\"\n").unwrap();
    engine.reload().unwrap();
    engine.run_ticks(8);
    assert!(broadcasts(&mut engine).is_empty());
}

#[test]
fn fan_out_order_follows_script_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let scripts_dir = dir.path().join("scripts");
    fs::create_dir_all(&scripts_dir).unwrap();
    fs::write(scripts_dir.join("a.sk"), "on join:\n    broadcast \"first\"\n").unwrap();
    fs::write(scripts_dir.join("b.sk"), "on join:\n    broadcast \"second\"\n").unwrap();
    let mut engine = Engine::new(Config {
        scripts_dir,
        data_dir: dir.path().join("data"),
        workers: 1,
    });
    engine.reload().unwrap();

    let player = engine.world.join("ada");
    engine.fire(GameEvent::Join { player });
    assert_eq!(broadcasts(&mut engine), vec!["first", "second"]);
}

#[test]
fn damage_gate_filters_small_hits() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_with(
        dir.path(),
        r#"
on damage:
    the damage is at least 5
    broadcast "%the player% took %the damage% damage"
"#,
    );
    let victim = engine.world.join("ada");
    engine.fire(GameEvent::Damage { victim, amount: 3.0 });
    assert!(broadcasts(&mut engine).is_empty());
    engine.fire(GameEvent::Damage { victim, amount: 7.5 });
    assert_eq!(broadcasts(&mut engine), vec!["ada took 7.5 damage"]);
}

#[test]
fn script_errors_surface_as_diagnostics_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let scripts_dir = dir.path().join("scripts");
    fs::create_dir_all(&scripts_dir).unwrap();
    fs::write(
        scripts_dir.join("bad.sk"),
        "on join:\n    summon a dragon\n\non join:\n    broadcast \"fine\"\n",
    )
    .unwrap();
    let mut engine = Engine::new(Config {
        scripts_dir,
        data_dir: dir.path().join("data"),
        workers: 1,
    });
    let diagnostics = engine.reload().unwrap();
    assert!(!diagnostics.is_empty());
    assert_eq!(engine.triggers().len(), 1);
}
