use std::fmt;

use crate::*;

/// Structural problem found in a programmatically built trigger.
///
/// The parser cannot produce most of these, but triggers can also be built
/// straight from the AST types (tests, tooling), so the engine validates
/// before registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyBody { trigger: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyBody { trigger } => {
                write!(f, "trigger '{trigger}' has an empty body")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate basic invariants of a single trigger definition.
pub fn validate_trigger(def: &TriggerDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if def.body.is_empty() {
        errors.push(ValidationError::EmptyBody {
            trigger: def.name.clone(),
        });
    }

    if let EventSpec::Periodic { period } = &def.event {
        if period.is_zero() {
            errors.push(ValidationError::InvalidValue {
                context: format!("trigger '{}': period must be at least one tick", def.name),
            });
        }
    }

    for statement in &def.body {
        validate_statement(statement, &def.name, &mut errors);
        for_each_expr(statement, &mut |expr| {
            validate_expr(expr, &def.name, &mut errors);
        });
    }

    errors
}

fn validate_statement(statement: &Statement, trigger: &str, errors: &mut Vec<ValidationError>) {
    match statement {
        Statement::Effect(Effect::Change { mode, value: None, .. })
            if !matches!(mode, ChangeMode::Delete) =>
        {
            errors.push(ValidationError::InvalidValue {
                context: format!("trigger '{trigger}': change without a value"),
            });
        },
        Statement::Effect(Effect::Give {
            amount: Some(Expr::Literal(Value::Number(n))),
            ..
        }) if *n < 1.0 => {
            errors.push(ValidationError::InvalidValue {
                context: format!("trigger '{trigger}': give amount below one"),
            });
        },
        Statement::Condition(Condition::Chance {
            percent: Expr::Literal(Value::Number(n)),
        }) if !(*n > 0.0 && *n <= 100.0) => {
            errors.push(ValidationError::InvalidValue {
                context: format!("trigger '{trigger}': chance percent out of range ({n})"),
            });
        },
        _ => {},
    }
}

fn validate_expr(expr: &Expr, trigger: &str, errors: &mut Vec<ValidationError>) {
    match expr {
        Expr::Variable { name, .. } => {
            let empty = name.parts.is_empty()
                || name
                    .parts
                    .iter()
                    .all(|part| matches!(part, TextPart::Text(text) if text.trim().is_empty()));
            if empty {
                errors.push(ValidationError::InvalidValue {
                    context: format!("trigger '{trigger}': empty variable name"),
                });
            }
        },
        Expr::List { items, .. } if items.is_empty() => {
            errors.push(ValidationError::InvalidValue {
                context: format!("trigger '{trigger}': empty value list"),
            });
        },
        _ => {},
    }
}

/// Depth-first visit of every expression in a statement, including nested
/// ones and those inside interpolated text and variable names.
pub fn for_each_expr(statement: &Statement, visit: &mut impl FnMut(&Expr)) {
    let mut roots: Vec<&Expr> = Vec::new();
    match statement {
        Statement::Effect(effect) => match effect {
            Effect::Message { texts, recipients } => roots.extend([texts, recipients]),
            Effect::Broadcast { texts } => roots.push(texts),
            Effect::Wait { duration } => roots.push(duration),
            Effect::CancelEvent => {},
            Effect::Kick { players, reason } => {
                roots.push(players);
                roots.extend(reason.as_ref());
            },
            Effect::Give { amount, items, players } => {
                roots.extend(amount.as_ref());
                roots.extend([items, players]);
            },
            Effect::SetBlock { block } => roots.push(block),
            Effect::Command { command } => roots.push(command),
            Effect::Log { messages } => roots.push(messages),
            Effect::WriteFile { texts, path } => roots.extend([texts, path]),
            Effect::Change { target, value, .. } => {
                roots.push(target);
                roots.extend(value.as_ref());
            },
        },
        Statement::Condition(cond) => match cond {
            Condition::Compare { lhs, rhs, .. } => roots.extend([lhs, rhs]),
            Condition::Online { players, .. } => roots.push(players),
            Condition::HasPermission { players, permission, .. } => {
                roots.extend([players, permission]);
            },
            Condition::Holding { players, item, .. } => roots.extend([players, item]),
            Condition::Chance { percent } => roots.push(percent),
            Condition::Matches { text, pattern, .. } => roots.extend([text, pattern]),
        },
    }
    for root in roots {
        visit_expr(root, visit);
    }
}

fn visit_expr(expr: &Expr, visit: &mut impl FnMut(&Expr)) {
    visit(expr);
    match expr {
        Expr::Literal(_) | Expr::EventValue { .. } => {},
        Expr::List { items, .. } => {
            for item in items {
                visit_expr(item, visit);
            }
        },
        Expr::Interpolated(template) => {
            for part in &template.parts {
                if let TextPart::Expr(inner) = part {
                    visit_expr(inner, visit);
                }
            }
        },
        Expr::Variable { name, .. } => {
            for part in &name.parts {
                if let TextPart::Expr(inner) = part {
                    visit_expr(inner, visit);
                }
            }
        },
        Expr::NameOf(inner)
        | Expr::HealthOf(inner)
        | Expr::PermissionsOf(inner)
        | Expr::Sorted(inner)
        | Expr::CountOf(inner)
        | Expr::Converted { inner, .. } => visit_expr(inner, visit),
        Expr::Arithmetic { lhs, rhs, .. } | Expr::RandomBetween { lo: lhs, hi: rhs } => {
            visit_expr(lhs, visit);
            visit_expr(rhs, visit);
        },
    }
}
