//! Standard effects.
//!
//! "set the event-block" is registered before the generic change effects so
//! that `set the event-block to stone` never reaches `set %~objects% to ...`.

use schist_data::{ChangeMode, Effect, EventKind, Expr, Statement, ValueKind};

use crate::diag::ErrorKind;
use crate::registry::{BuildCx, BuiltMatch, RegistryError, SyntaxRegistry};

pub(crate) fn register(reg: &mut SyntaxRegistry) -> Result<(), RegistryError> {
    reg.register_effect("message", &["(message|send) %texts% [to %players%]"], build_message)?;
    reg.register_effect("broadcast", &["broadcast %texts%"], build_broadcast)?;
    reg.register_effect("wait", &["(wait|halt) [for] %timespan%"], build_wait)?;
    reg.register_effect("cancel event", &["cancel [the] event"], build_cancel)?;
    reg.register_effect(
        "kick",
        &["kick %players% [(because [of]|by reason of|due to) %-texts%]"],
        build_kick,
    )?;
    reg.register_effect("give", &["give [%-number% [of]] %items% to %players%"], build_give)?;
    reg.register_effect(
        "set event-block",
        &["set [the] [event(-| )]block to %block%"],
        build_set_block,
    )?;
    reg.register_effect("console command", &["(run|execute) [console] command %texts%"], build_command)?;
    reg.register_effect("script log", &["log %texts%"], build_log)?;
    reg.register_effect(
        "write to file",
        &["(write|append) %texts% to [the] file %texts%"],
        build_write_file,
    )?;
    reg.register_effect("change: set", &["set %~objects% to %objects%"], build_change_set)?;
    reg.register_effect("change: add", &["add %objects% to %~objects%"], build_change_add)?;
    reg.register_effect("change: remove", &["remove %objects% from %~objects%"], build_change_remove)?;
    reg.register_effect("change: delete", &["(delete|clear) %~objects%"], build_change_delete)?;
    Ok(())
}

fn build_message(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Message {
        texts: cx.required(&mut m, 0)?,
        recipients: cx.required(&mut m, 1)?,
    }))
}

fn build_broadcast(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Broadcast {
        texts: cx.required(&mut m, 0)?,
    }))
}

fn build_wait(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Wait {
        duration: cx.required(&mut m, 0)?,
    }))
}

fn build_cancel(_: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    if let Some(event) = cx.event {
        let cancellable = matches!(
            event.kind(),
            EventKind::Chat | EventKind::BlockBreak | EventKind::BlockPlace | EventKind::Damage
        );
        if !cancellable {
            cx.log
                .error(ErrorKind::Semantic, format!("a '{event}' event can't be cancelled"));
            return None;
        }
    }
    Some(Statement::Effect(Effect::CancelEvent))
}

fn build_kick(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Kick {
        players: cx.required(&mut m, 0)?,
        reason: m.take(1),
    }))
}

fn build_give(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let amount = m.take(0);
    Some(Statement::Effect(Effect::Give {
        amount,
        items: cx.required(&mut m, 1)?,
        players: cx.required(&mut m, 2)?,
    }))
}

fn build_set_block(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    if cx.event.is_some() && !cx.event_provides(ValueKind::Block) {
        cx.log
            .error(ErrorKind::Semantic, "there is no event-block to set in this trigger");
        return None;
    }
    Some(Statement::Effect(Effect::SetBlock {
        block: cx.required(&mut m, 0)?,
    }))
}

fn build_command(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Command {
        command: cx.required(&mut m, 0)?,
    }))
}

fn build_log(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::Log {
        messages: cx.required(&mut m, 0)?,
    }))
}

fn build_write_file(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Effect(Effect::WriteFile {
        texts: cx.required(&mut m, 0)?,
        path: cx.required(&mut m, 1)?,
    }))
}

/// Whether an expression can be written to. Variables always can; player
/// health is the one changeable property in the standard library.
fn changeable(expr: &Expr) -> bool {
    matches!(expr, Expr::Variable { .. } | Expr::HealthOf(_))
}

fn change_target(expr: Expr, cx: &mut BuildCx<'_>) -> Option<Expr> {
    if changeable(&expr) {
        Some(expr)
    } else {
        cx.log
            .error(ErrorKind::Semantic, format!("'{expr}' can't be changed"));
        None
    }
}

fn build_change_set(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let target = change_target(cx.required(&mut m, 0)?, cx)?;
    Some(Statement::Effect(Effect::Change {
        mode: ChangeMode::Set,
        target,
        value: Some(cx.required(&mut m, 1)?),
    }))
}

fn build_change_add(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let value = cx.required(&mut m, 0)?;
    let target = change_target(cx.required(&mut m, 1)?, cx)?;
    Some(Statement::Effect(Effect::Change {
        mode: ChangeMode::Add,
        target,
        value: Some(value),
    }))
}

fn build_change_remove(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let value = cx.required(&mut m, 0)?;
    let target = change_target(cx.required(&mut m, 1)?, cx)?;
    Some(Statement::Effect(Effect::Change {
        mode: ChangeMode::Remove,
        target,
        value: Some(value),
    }))
}

fn build_change_delete(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let target = change_target(cx.required(&mut m, 0)?, cx)?;
    Some(Statement::Effect(Effect::Change {
        mode: ChangeMode::Delete,
        target,
        value: None,
    }))
}
