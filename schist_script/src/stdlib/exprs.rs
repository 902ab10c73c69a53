//! Standard expressions, grouped by priority category.

use schist_data::{ArithOp, BlockPos, Expr, Value, ValueKind};

use crate::diag::ErrorKind;
use crate::registry::{BuildCx, BuiltMatch, ExprPriority, RegistryError, SyntaxRegistry};

pub(crate) fn register(reg: &mut SyntaxRegistry) -> Result<(), RegistryError> {
    reg.register_expression(
        "event player",
        ValueKind::Player,
        ExprPriority::Simple,
        &["[the] player"],
        |m, cx| event_value(ValueKind::Player, &m, cx),
    )?;
    reg.register_expression(
        "chat message",
        ValueKind::Text,
        ExprPriority::Simple,
        &["[the] [chat] message"],
        |m, cx| event_value(ValueKind::Text, &m, cx),
    )?;
    reg.register_expression(
        "event damage",
        ValueKind::Number,
        ExprPriority::Simple,
        &["[the] damage"],
        |m, cx| event_value(ValueKind::Number, &m, cx),
    )?;
    reg.register_expression(
        "event block",
        ValueKind::Block,
        ExprPriority::Simple,
        &["[the] event(-| )block"],
        |m, cx| event_value(ValueKind::Block, &m, cx),
    )?;
    reg.register_expression(
        "event position",
        ValueKind::Position,
        ExprPriority::Simple,
        &["[the] event(-| )position"],
        |m, cx| event_value(ValueKind::Position, &m, cx),
    )?;
    reg.register_expression(
        "event period",
        ValueKind::Timespan,
        ExprPriority::Simple,
        &["[the] period"],
        |m, cx| event_value(ValueKind::Timespan, &m, cx),
    )?;

    reg.register_expression(
        "random number",
        ValueKind::Number,
        ExprPriority::Combined,
        &["[a] random number (between|from) %number% (and|to) %number%"],
        build_random,
    )?;
    reg.register_expression(
        "position at",
        ValueKind::Position,
        ExprPriority::Combined,
        &["[the] position [at] %number%, %number%, %number%"],
        build_position,
    )?;
    reg.register_expression(
        "sorted",
        ValueKind::Object,
        ExprPriority::Combined,
        &["sorted %objects%"],
        build_sorted,
    )?;

    reg.register_expression(
        "name of",
        ValueKind::Text,
        ExprPriority::Property,
        &["[the] name[s] of %players%"],
        build_name_of,
    )?;
    reg.register_expression(
        "health of",
        ValueKind::Number,
        ExprPriority::Property,
        &["[the] health of %players%"],
        build_health_of,
    )?;
    reg.register_expression(
        "permissions of",
        ValueKind::Text,
        ExprPriority::Property,
        &["[the] permission[s] of %players%"],
        build_permissions_of,
    )?;
    reg.register_expression(
        "count of",
        ValueKind::Number,
        ExprPriority::Property,
        &["[the] (number|amount) of %objects%"],
        build_count_of,
    )?;

    reg.register_expression(
        "arithmetic",
        ValueKind::Number,
        ExprPriority::PatternMatchesAll,
        &["%number% (1:+|2:-|3:*|4:/) %number%"],
        build_arithmetic,
    )?;
    Ok(())
}

/// Event-value expressions only parse under an event that carries the value.
/// With no event at hand (bare expression parsing in tests and tools) they
/// are allowed through.
fn event_value(kind: ValueKind, _m: &BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    if cx.event.is_some() && !cx.event_provides(kind) {
        cx.log
            .error(ErrorKind::Semantic, format!("this event has no {kind}"));
        return None;
    }
    Some(Expr::EventValue { kind })
}

fn build_random(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::RandomBetween {
        lo: Box::new(cx.required(&mut m, 0)?),
        hi: Box::new(cx.required(&mut m, 1)?),
    })
}

fn build_position(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    let mut coords = [0i32; 3];
    for (i, coord) in coords.iter_mut().enumerate() {
        match cx.required(&mut m, i)? {
            Expr::Literal(Value::Number(n)) if n.fract() == 0.0 && f64::from(n as i32) == n => {
                *coord = n as i32;
            },
            other => {
                cx.log.error(
                    ErrorKind::Semantic,
                    format!("'{other}' is not a whole-number coordinate"),
                );
                return None;
            },
        }
    }
    Some(Expr::Literal(Value::Position(BlockPos::new(
        coords[0], coords[1], coords[2],
    ))))
}

fn build_sorted(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::Sorted(Box::new(cx.required(&mut m, 0)?)))
}

fn build_name_of(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::NameOf(Box::new(cx.required(&mut m, 0)?)))
}

fn build_health_of(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::HealthOf(Box::new(cx.required(&mut m, 0)?)))
}

fn build_permissions_of(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::PermissionsOf(Box::new(cx.required(&mut m, 0)?)))
}

fn build_count_of(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    Some(Expr::CountOf(Box::new(cx.required(&mut m, 0)?)))
}

fn build_arithmetic(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Expr> {
    let op = match m.mark {
        1 => ArithOp::Add,
        2 => ArithOp::Sub,
        3 => ArithOp::Mul,
        4 => ArithOp::Div,
        other => {
            cx.log.internal_error(format!("arithmetic pattern produced mark {other}"));
            return None;
        },
    };
    Some(Expr::Arithmetic {
        op,
        lhs: Box::new(cx.required(&mut m, 0)?),
        rhs: Box::new(cx.required(&mut m, 1)?),
    })
}
