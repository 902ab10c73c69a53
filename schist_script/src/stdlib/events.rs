//! Standard event forms. Event headers are matched in literal mode, so every
//! slot here only ever receives literal expressions.

use schist_data::{BlockKind, EventSpec, Expr, Value};

use crate::diag::ErrorKind;
use crate::registry::{BuildCx, BuiltMatch, RegistryError, SyntaxRegistry};

pub(crate) fn register(reg: &mut SyntaxRegistry) -> Result<(), RegistryError> {
    reg.register_event("on join", &["on [player] join[ing]"], |_, _| Some(EventSpec::Join))?;
    reg.register_event("on quit", &["on [player] (quit[ting]|disconnect[ing]|leav(e|ing))"], |_, _| {
        Some(EventSpec::Quit)
    })?;
    reg.register_event("on chat", &["on [player] chat[ting]"], |_, _| Some(EventSpec::Chat))?;
    reg.register_event("on damage", &["on damag(e|ing)"], |_, _| Some(EventSpec::Damage))?;
    reg.register_event(
        "on block break",
        &["on [block] (break[ing]|min(e|ing)) [[of] %*block%]"],
        build_break,
    )?;
    reg.register_event(
        "on block place",
        &["on [block] (plac(e|ing)|build[ing]) [[of] %*block%]"],
        build_place,
    )?;
    reg.register_event("periodical", &["every %*timespan%"], build_periodic)?;
    Ok(())
}

fn build_break(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<EventSpec> {
    Some(EventSpec::BlockBreak {
        filter: block_filter(m.take(0), cx)?,
    })
}

fn build_place(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<EventSpec> {
    Some(EventSpec::BlockPlace {
        filter: block_filter(m.take(0), cx)?,
    })
}

/// `Some(None)` means "no filter, listen to every block".
fn block_filter(arg: Option<Expr>, cx: &mut BuildCx<'_>) -> Option<Option<BlockKind>> {
    match arg {
        None => Some(None),
        Some(Expr::Literal(Value::Block(block))) => Some(Some(block)),
        Some(other) => {
            cx.log
                .error(ErrorKind::Semantic, format!("'{other}' is not a block kind"));
            None
        },
    }
}

fn build_periodic(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<EventSpec> {
    match cx.required(&mut m, 0)? {
        Expr::Literal(Value::Timespan(period)) => Some(EventSpec::Periodic { period }),
        other => {
            cx.log
                .error(ErrorKind::Semantic, format!("'{other}' is not a fixed timespan"));
            None
        },
    }
}
