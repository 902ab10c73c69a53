//! Expression evaluation.
//!
//! Everything evaluates to zero or more values: scalars give one, lists
//! give several, an unset variable gives none. The `or` flag rides along so
//! conditions can tell "1 and 2" from "1 or 2" apart.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::debug;
use rand::Rng;
use regex::Regex;
use schist_data::{ArithOp, Expr, TextPart, Value, ValueKind, VarName};
use schist_script::TypeRegistry;

use super::{ExecCx, ExecError, player_ids};
use crate::world::World;

lazy_static! {
    static ref REGEX_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Compile a regex once per distinct pattern text.
pub fn cached_regex(pattern: &str) -> Result<Regex, ExecError> {
    let mut cache = REGEX_CACHE.lock().expect("regex cache lock poisoned");
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| ExecError::BadRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// The result of evaluating one expression.
#[derive(Debug)]
pub struct Evaluated {
    pub values: Vec<Value>,
    /// True for disjunctive ("or") lists. Scalars and "and" lists are false.
    pub or: bool,
}

impl Evaluated {
    fn one(value: Value) -> Self {
        Self {
            values: vec![value],
            or: false,
        }
    }

    fn many(values: Vec<Value>) -> Self {
        Self { values, or: false }
    }
}

/// Apply a predicate across an evaluation: all values for "and" lists, any
/// value for "or" lists. No values at all is false either way.
pub fn quantify(evaluated: &Evaluated, mut pred: impl FnMut(&Value) -> bool) -> bool {
    if evaluated.values.is_empty() {
        return false;
    }
    if evaluated.or {
        evaluated.values.iter().any(|v| pred(v))
    } else {
        evaluated.values.iter().all(|v| pred(v))
    }
}

/// Render a value for message text: players by display name, everything
/// else through the converter table or its natural display form.
pub fn value_to_text(world: &World, types: &TypeRegistry, value: &Value) -> String {
    match value {
        Value::Player(id) => world.name_of(*id),
        other => match types.convert(other, ValueKind::Text) {
            Some(Value::Text(text)) => text,
            _ => other.to_string(),
        },
    }
}

fn join_values(world: &World, types: &TypeRegistry, values: &[Value]) -> String {
    let rendered: Vec<String> = values.iter().map(|v| value_to_text(world, types, v)).collect();
    match rendered.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, init)) => format!("{} and {last}", init.join(", ")),
    }
}

/// Resolve a variable name to its concrete store key, evaluating any
/// interpolated segments ("homes::%the player%").
pub fn var_key(cx: &mut ExecCx<'_>, name: &VarName) -> Result<String, ExecError> {
    let mut key = String::new();
    for part in &name.parts {
        match part {
            TextPart::Text(text) => key.push_str(text),
            TextPart::Expr(expr) => {
                let evaluated = eval(cx, expr)?;
                key.push_str(&join_values(cx.world, cx.types, &evaluated.values));
            },
        }
    }
    Ok(key)
}

/// Evaluate an expression to its values.
///
/// # Errors
///
/// Returns [`ExecError`] when the current event lacks a payload the
/// expression reads, or an operand has the wrong kind. An unset variable is
/// not an error; it evaluates to no values.
pub fn eval(cx: &mut ExecCx<'_>, expr: &Expr) -> Result<Evaluated, ExecError> {
    match expr {
        Expr::Literal(value) => Ok(Evaluated::one(value.clone())),
        Expr::List { items, or } => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.extend(eval(cx, item)?.values);
            }
            Ok(Evaluated { values, or: *or })
        },
        Expr::Interpolated(template) => {
            let mut out = String::new();
            for part in &template.parts {
                match part {
                    TextPart::Text(text) => out.push_str(text),
                    TextPart::Expr(expr) => {
                        let evaluated = eval(cx, expr)?;
                        out.push_str(&join_values(cx.world, cx.types, &evaluated.values));
                    },
                }
            }
            Ok(Evaluated::one(Value::Text(out)))
        },
        Expr::Variable { name, local, list } => {
            let key = var_key(cx, name)?;
            let store = if *local { &cx.ctx.locals } else { &*cx.globals };
            if *list {
                Ok(Evaluated::many(store.list(&key).to_vec()))
            } else {
                Ok(Evaluated {
                    values: store.get(&key).cloned().into_iter().collect(),
                    or: false,
                })
            }
        },
        Expr::EventValue { kind } => cx
            .ctx
            .value_of(*kind)
            .map(Evaluated::one)
            .ok_or(ExecError::NoEventValue(*kind)),
        Expr::NameOf(inner) => {
            let ids = player_ids(cx, inner)?;
            let world: &World = cx.world;
            Ok(Evaluated::many(
                ids.iter().map(|&id| Value::Text(world.name_of(id))).collect(),
            ))
        },
        Expr::HealthOf(inner) => {
            let ids = player_ids(cx, inner)?;
            let world: &World = cx.world;
            Ok(Evaluated::many(
                ids.iter()
                    .filter_map(|&id| world.player(id))
                    .map(|p| Value::Number(p.health()))
                    .collect(),
            ))
        },
        Expr::PermissionsOf(inner) => {
            let ids = player_ids(cx, inner)?;
            let world: &World = cx.world;
            let mut values = Vec::new();
            for id in ids {
                if let Some(player) = world.player(id) {
                    values.extend(player.permissions.iter().map(|node| Value::Text(node.clone())));
                }
            }
            Ok(Evaluated::many(values))
        },
        Expr::Arithmetic { op, lhs, rhs } => {
            let l = eval_number(cx, lhs)?;
            let r = eval_number(cx, rhs)?;
            let result = match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => l / r,
            };
            Ok(Evaluated::one(Value::Number(result)))
        },
        Expr::RandomBetween { lo, hi } => {
            let mut lo = eval_number(cx, lo)?;
            let mut hi = eval_number(cx, hi)?;
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
            // whole bounds draw whole numbers, inclusive on both ends
            let n = if lo.fract() == 0.0 && hi.fract() == 0.0 {
                rand::rng().random_range(lo as i64..=hi as i64) as f64
            } else {
                rand::rng().random_range(lo..=hi)
            };
            Ok(Evaluated::one(Value::Number(n)))
        },
        Expr::Sorted(inner) => {
            let mut values = eval(cx, inner)?.values;
            let world: &World = cx.world;
            let types = cx.types;
            values.sort_by(|a, b| {
                types.compare(a, b).unwrap_or_else(|| {
                    value_to_text(world, types, a).cmp(&value_to_text(world, types, b))
                })
            });
            Ok(Evaluated::many(values))
        },
        Expr::CountOf(inner) => {
            let count = eval(cx, inner)?.values.len();
            Ok(Evaluated::one(Value::Number(count as f64)))
        },
        Expr::Converted { inner, to } => {
            let evaluated = eval(cx, inner)?;
            let mut values = Vec::with_capacity(evaluated.values.len());
            for value in &evaluated.values {
                match cx.types.convert(value, *to) {
                    Some(converted) => values.push(converted),
                    None => debug!("dropping '{value}': no conversion to {to}"),
                }
            }
            Ok(Evaluated {
                values,
                or: evaluated.or,
            })
        },
    }
}

/// First value of an evaluation, if any.
pub fn eval_single(cx: &mut ExecCx<'_>, expr: &Expr) -> Result<Option<Value>, ExecError> {
    Ok(eval(cx, expr)?.values.into_iter().next())
}

fn eval_number(cx: &mut ExecCx<'_>, expr: &Expr) -> Result<f64, ExecError> {
    let value = eval_single(cx, expr)?.ok_or_else(|| ExecError::NoValue(expr.to_string()))?;
    cx.types
        .convert(&value, ValueKind::Number)
        .and_then(|v| v.as_number())
        .ok_or_else(|| ExecError::WrongKind {
            expected: ValueKind::Number,
            got: value.to_string(),
        })
}
