use schist_data::{
    ChangeMode, Condition, Effect, EventSpec, Expr, Relation, Statement, Timespan, Value, ValueKind,
};
use schist_script::{ScriptParser, parse_source, standard_registries};

fn parse(src: &str) -> schist_script::ParsedScript {
    let (syntax, types) = standard_registries();
    let mut parser = ScriptParser::new(&syntax, &types);
    let (source, structural) = parse_source("test.sk", src);
    assert!(structural.is_empty(), "structural diags: {structural:?}");
    parser.parse_script(&source)
}

#[test]
fn welcome_script_parses_end_to_end() {
    let src = r#"
# greet players and hand out bread
on join:
    send "welcome back, %the player%!"
    give 3 of bread to the player
    wait for 5 seconds
    broadcast "%the name of the player% has settled in"

on quit:
    broadcast "%the name of the player% left"
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.triggers.len(), 2);

    let join = &parsed.triggers[0];
    assert_eq!(join.event, EventSpec::Join);
    assert_eq!(join.body.len(), 4);
    assert!(matches!(join.body[2], Statement::Effect(Effect::Wait { .. })));
    assert_eq!(join.source.script, "test.sk");
    assert_eq!(join.source.line, 3);
}

#[test]
fn chat_moderation_script() {
    let src = r#"
on chat:
    the message matches "(?i).*badword.*"
    cancel the event
    send "watch your language" to the player
    add 1 to {warnings::%the player%}
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let body = &parsed.triggers[0].body;
    assert!(matches!(
        body[0],
        Statement::Condition(Condition::Matches { negated: false, .. })
    ));
    assert!(matches!(body[1], Statement::Effect(Effect::CancelEvent)));
    let Statement::Effect(Effect::Change {
        mode: ChangeMode::Add,
        target: Expr::Variable { ref name, .. },
        ..
    }) = body[3]
    else {
        panic!("expected an add to a variable, got {:?}", body[3]);
    };
    assert_eq!(name.parts.len(), 2);
}

#[test]
fn periodic_trigger_with_explicit_recipients() {
    let src = r#"
every 10 minutes:
    broadcast "the server restarts daily at midnight"
    write "heartbeat at %the period%" to file "logs/heartbeat.txt"
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.triggers[0].event, EventSpec::Periodic {
        period: Timespan::from_secs(600)
    });
}

#[test]
fn block_filter_and_event_block() {
    let src = r#"
on break of diamond ore:
    the player does not have permission "mine.diamond"
    cancel the event
    set the event-block to stone
    send "that vein is protected" to the player
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let trigger = &parsed.triggers[0];
    let EventSpec::BlockBreak { filter: Some(ref block) } = trigger.event else {
        panic!("wrong event: {:?}", trigger.event);
    };
    assert_eq!(block.name(), "diamond ore");
    assert!(matches!(
        trigger.body[0],
        Statement::Condition(Condition::HasPermission { negated: true, .. })
    ));
    assert!(matches!(trigger.body[2], Statement::Effect(Effect::SetBlock { .. })));
}

#[test]
fn damage_gate_with_comparison_and_chance() {
    let src = r#"
on damage:
    the damage is at least 5
    chance of 25%
    send "ouch, that was %the damage% hearts" to the player
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let body = &parsed.triggers[0].body;
    let Statement::Condition(Condition::Compare { ref relation, .. }) = body[0] else {
        panic!("expected a comparison, got {:?}", body[0]);
    };
    assert_eq!(*relation, Relation::GreaterOrEqual);
    let Statement::Condition(Condition::Chance { ref percent }) = body[1] else {
        panic!("expected a chance, got {:?}", body[1]);
    };
    assert_eq!(*percent, Expr::number(25.0));
}

#[test]
fn kick_with_or_list_of_reason_texts() {
    let src = r#"
on chat:
    the message is "spam"
    kick the player because of "spamming"
"#;
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let body = &parsed.triggers[0].body;
    assert!(matches!(
        body[0],
        Statement::Condition(Condition::Compare {
            relation: Relation::Equal,
            negated: false,
            ..
        })
    ));
    let Statement::Effect(Effect::Kick { reason: Some(ref reason), .. }) = body[1] else {
        panic!("expected a kick with reason, got {:?}", body[1]);
    };
    assert_eq!(*reason, Expr::text("spamming"));
}

#[test]
fn bad_trigger_does_not_block_neighbors() {
    let src = r#"
on join:
    rocket jump the player

on join:
    send "hi"
"#;
    let parsed = parse(src);
    assert_eq!(parsed.triggers.len(), 1);
    assert!(parsed.has_errors());
}

#[test]
fn zero_period_is_rejected_after_parsing() {
    let parsed = parse("every 0 ticks:\n    broadcast \"tick\"\n");
    assert!(parsed.triggers.is_empty());
    assert!(
        parsed
            .diagnostics
            .iter()
            .any(|d| d.message.contains("at least one tick")),
        "{:?}",
        parsed.diagnostics
    );
}

#[test]
fn dumped_triggers_round_trip_through_ron() {
    let src = "on join:\n    send \"hi\" to the player\n";
    let parsed = parse(src);
    let ron = ron::ser::to_string_pretty(&parsed.triggers, ron::ser::PrettyConfig::default()).unwrap();
    let back: Vec<schist_data::TriggerDef> = ron::from_str(&ron).unwrap();
    assert_eq!(back, parsed.triggers);
}

#[test]
fn converted_shim_appears_where_kinds_differ() {
    let src = "on damage:\n    send the damage to the player\n";
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let Statement::Effect(Effect::Message { ref texts, .. }) = parsed.triggers[0].body[0] else {
        panic!("not a message");
    };
    let Expr::Converted { ref inner, to } = *texts else {
        panic!("expected a conversion shim, got {texts:?}");
    };
    assert_eq!(to, ValueKind::Text);
    assert_eq!(
        **inner,
        Expr::EventValue {
            kind: ValueKind::Number
        }
    );
}

#[test]
fn sorted_and_count_compose_over_list_variables() {
    let src = "on join:\n    send the number of {scores::*} to the player\n    broadcast sorted {scores::*}\n";
    let parsed = parse(src);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    let body = &parsed.triggers[0].body;
    let Statement::Effect(Effect::Message { ref texts, .. }) = body[0] else {
        panic!("not a message");
    };
    let Expr::Converted { ref inner, .. } = *texts else {
        panic!("expected a conversion shim, got {texts:?}");
    };
    assert!(matches!(**inner, Expr::CountOf(_)));
    let Statement::Effect(Effect::Broadcast { ref texts }) = body[1] else {
        panic!("not a broadcast");
    };
    assert!(matches!(*texts, Expr::Sorted(_)));
}

#[test]
fn timespan_literal_forms_match_the_spec_wording() {
    for (text, millis) in [
        ("wait for 5 seconds", 5_000),
        ("wait 2 minutes", 120_000),
        ("wait a tick", 50),
        ("wait for 1 hour", 3_600_000),
    ] {
        let parsed = parse(&format!("on join:\n    {text}\n"));
        assert!(parsed.diagnostics.is_empty(), "{text}: {:?}", parsed.diagnostics);
        let Statement::Effect(Effect::Wait { ref duration }) = parsed.triggers[0].body[0] else {
            panic!("{text}: not a wait");
        };
        assert_eq!(
            *duration,
            Expr::Literal(Value::Timespan(Timespan::from_millis(millis))),
            "{text}"
        );
    }
}
