//! Standard conditions. The generic comparison is registered last so the
//! specific forms ("is online", "is holding") win on lines they both match.

use schist_data::{Condition, Relation, Statement};

use crate::registry::{BuildCx, BuiltMatch, RegistryError, SyntaxRegistry};

pub(crate) fn register(reg: &mut SyntaxRegistry) -> Result<(), RegistryError> {
    reg.register_condition(
        "is online",
        &["%players% (is|are) [1:not] (online|2:offline)"],
        build_online,
    )?;
    reg.register_condition(
        "has permission",
        &[
            "%players% (has|have) [the] permission %texts%",
            "%players% (do[es] not|do[es]n't) have [the] permission %texts%",
        ],
        build_has_permission,
    )?;
    reg.register_condition(
        "is holding",
        &["%players% (is|are) [1:not] holding %item%"],
        build_holding,
    )?;
    reg.register_condition("chance", &["chance of %number%[\\%]"], build_chance)?;
    reg.register_condition(
        "matches",
        &[
            "%texts% match[es] %texts%",
            "%texts% (do[es] not|do[es]n't) match %texts%",
        ],
        build_matches,
    )?;
    // Longer relation wordings first so "or equal to" is never left dangling
    // on the right-hand side.
    reg.register_condition(
        "compare",
        &[
            "%objects% (is|are) [1:not] (greater|more|bigger) than or equal to %objects%",
            "%objects% (is|are) [1:not] at least %objects%",
            "%objects% (is|are) [1:not] (greater|more|bigger) than %objects%",
            "%objects% (is|are) [1:not] (less|smaller) than or equal to %objects%",
            "%objects% (is|are) [1:not] at most %objects%",
            "%objects% (is|are) [1:not] (less|smaller) than %objects%",
            "%objects% (is|are) [1:not] [(equal to|the same as)] %objects%",
        ],
        build_compare,
    )?;
    Ok(())
}

fn build_online(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    // "is not offline" is online again.
    let negated = (m.mark & 1 != 0) != (m.mark & 2 != 0);
    Some(Statement::Condition(Condition::Online {
        players: cx.required(&mut m, 0)?,
        negated,
    }))
}

fn build_has_permission(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let negated = m.pattern_index == 1;
    Some(Statement::Condition(Condition::HasPermission {
        players: cx.required(&mut m, 0)?,
        permission: cx.required(&mut m, 1)?,
        negated,
    }))
}

fn build_holding(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let negated = m.mark == 1;
    Some(Statement::Condition(Condition::Holding {
        players: cx.required(&mut m, 0)?,
        item: cx.required(&mut m, 1)?,
        negated,
    }))
}

fn build_chance(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    Some(Statement::Condition(Condition::Chance {
        percent: cx.required(&mut m, 0)?,
    }))
}

fn build_matches(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let negated = m.pattern_index == 1;
    Some(Statement::Condition(Condition::Matches {
        text: cx.required(&mut m, 0)?,
        pattern: cx.required(&mut m, 1)?,
        negated,
    }))
}

fn build_compare(mut m: BuiltMatch, cx: &mut BuildCx<'_>) -> Option<Statement> {
    let relation = match m.pattern_index {
        0 | 1 => Relation::GreaterOrEqual,
        2 => Relation::Greater,
        3 | 4 => Relation::LessOrEqual,
        5 => Relation::Less,
        _ => Relation::Equal,
    };
    Some(Statement::Condition(Condition::Compare {
        lhs: cx.required(&mut m, 0)?,
        relation,
        rhs: cx.required(&mut m, 1)?,
        negated: m.mark == 1,
    }))
}
