//! Syntax patterns and the matcher behind every registered statement,
//! expression, and event form.
//!
//! A pattern string like `wait [for] %timespan%` is compiled once, lazily,
//! into a small element tree. Matching walks that tree over the input with
//! backtracking: optional groups try their branches before elision, choices
//! try branches in order, and typed slots hand candidate spans back to the
//! parser (via [`SlotHandler`]) shortest-first until one parses and the rest
//! of the pattern fits.

use std::sync::OnceLock;

use pest::Parser;
use pest_derive::Parser as PestParser;
use schist_data::Expr;
use thiserror::Error;

use crate::types::TypeRegistry;

#[derive(PestParser)]
#[grammar = "src/grammar.pest"]
struct PatternParser;

/// Errors produced while compiling a pattern string.
///
/// These indicate a broken registration, not bad script input, so callers
/// log them as internal errors and skip the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("malformed pattern '{pattern}': {detail}")]
    Malformed { pattern: String, detail: String },
    #[error("pattern '{pattern}' names unknown kind '{name}'")]
    UnknownKind { pattern: String, name: String },
}

/// One kind a slot accepts, with its plurality as written (`%player%` vs
/// `%players%`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: schist_data::ValueKind,
    pub plural: bool,
}

/// A typed `%...%` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub kinds: Vec<KindSpec>,
    /// `%-kind%`: an omitted slot stays empty instead of taking the kind's
    /// default expression.
    pub nullable: bool,
    /// `%*kind%`: only literals may fill the slot (event headers).
    pub literal_only: bool,
    /// `%~kind%`: only non-literal expressions may fill the slot (change
    /// targets).
    pub expr_only: bool,
}

impl SlotSpec {
    /// Whether any accepted kind is plural.
    #[must_use]
    pub fn accepts_many(&self) -> bool {
        self.kinds.iter().any(|k| k.plural)
    }
}

/// A compiled pattern element.
#[derive(Debug, Clone, PartialEq)]
pub enum PatElem {
    Text(String),
    Optional(Vec<PatBranch>),
    Choice(Vec<PatBranch>),
    /// Index into [`Compiled::slots`].
    Slot(usize),
}

/// One alternative inside an optional or choice group.
#[derive(Debug, Clone, PartialEq)]
pub struct PatBranch {
    pub mark: u32,
    pub elems: Vec<PatElem>,
}

/// The compiled form of a pattern: its element tree plus the slot table in
/// left-to-right order.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    elems: Vec<PatElem>,
    slots: Vec<SlotSpec>,
}

/// A successful match: one argument per slot (in slot order, `None` where an
/// optional group containing the slot was elided) and the XOR of all parse
/// marks on the branches taken.
#[derive(Debug)]
pub struct PatternMatch {
    pub args: Vec<Option<Expr>>,
    pub mark: u32,
}

/// Callback the matcher uses to fill typed slots. Implemented by the parser;
/// returning `None` rejects this particular split and the matcher moves on.
pub trait SlotHandler {
    fn parse_slot(&mut self, spec: &SlotSpec, text: &str) -> Option<Expr>;
}

impl<F: FnMut(&SlotSpec, &str) -> Option<Expr>> SlotHandler for F {
    fn parse_slot(&mut self, spec: &SlotSpec, text: &str) -> Option<Expr> {
        self(spec, text)
    }
}

/// A registered pattern string, compiled on first use and cached.
#[derive(Debug)]
pub struct Pattern {
    source: &'static str,
    compiled: OnceLock<Result<Compiled, PatternError>>,
}

impl Pattern {
    #[must_use]
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Compile this pattern, resolving slot kind names against the type
    /// registry. Repeated calls return the same cached artifact (or the same
    /// cached error).
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern text is malformed or names a
    /// kind the registry does not know.
    pub fn compiled(&self, types: &TypeRegistry) -> Result<&Compiled, PatternError> {
        match self.compiled.get_or_init(|| compile(self.source, types)) {
            Ok(compiled) => Ok(compiled),
            Err(err) => Err(err.clone()),
        }
    }
}

impl Compiled {
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> &SlotSpec {
        &self.slots[index]
    }

    /// Match `input` against this pattern. `input` must already be trimmed;
    /// the whole of it has to be consumed for the match to succeed.
    pub fn match_input(&self, input: &str, handler: &mut dyn SlotHandler) -> Option<PatternMatch> {
        let mut out = PatternMatch {
            args: vec![None; self.slots.len()],
            mark: 0,
        };
        if match_here(self, input, handler, &self.elems, &Rest::Nil, 0, &mut out) {
            Some(out)
        } else {
            None
        }
    }
}

/// Stack of element slices still to match after the current one, kept as a
/// borrowed cons list so backtracking is just returning from a call.
enum Rest<'a> {
    Nil,
    Cons(&'a [PatElem], &'a Rest<'a>),
}

fn match_here(
    compiled: &Compiled,
    input: &str,
    handler: &mut dyn SlotHandler,
    elems: &[PatElem],
    rest: &Rest<'_>,
    pos: usize,
    out: &mut PatternMatch,
) -> bool {
    let Some((head, tail)) = elems.split_first() else {
        return match rest {
            Rest::Nil => pos == input.len(),
            Rest::Cons(elems, tail) => match_here(compiled, input, handler, elems, tail, pos, out),
        };
    };
    match head {
        PatElem::Text(text) => match match_literal(input, pos, text) {
            Some(next) => match_here(compiled, input, handler, tail, rest, next, out),
            None => false,
        },
        PatElem::Optional(branches) => {
            for branch in branches {
                out.mark ^= branch.mark;
                let rest = Rest::Cons(tail, rest);
                if match_here(compiled, input, handler, &branch.elems, &rest, pos, out) {
                    return true;
                }
                out.mark ^= branch.mark;
            }
            match_here(compiled, input, handler, tail, rest, pos, out)
        },
        PatElem::Choice(branches) => {
            for branch in branches {
                out.mark ^= branch.mark;
                let rest = Rest::Cons(tail, rest);
                if match_here(compiled, input, handler, &branch.elems, &rest, pos, out) {
                    return true;
                }
                out.mark ^= branch.mark;
            }
            false
        },
        PatElem::Slot(index) => {
            let spec = &compiled.slots[*index];
            if input[pos..].starts_with(' ') {
                return false;
            }
            for end in span_ends(input, pos) {
                let Some(expr) = handler.parse_slot(spec, &input[pos..end]) else {
                    continue;
                };
                out.args[*index] = Some(expr);
                if match_here(compiled, input, handler, tail, rest, end, out) {
                    return true;
                }
                out.args[*index] = None;
            }
            false
        },
    }
}

/// Candidate end offsets for a slot starting at `pos`: every char boundary
/// after it, shortest first, skipping ends that would leave the span with
/// trailing whitespace.
fn span_ends(input: &str, pos: usize) -> impl Iterator<Item = usize> + '_ {
    input[pos..]
        .char_indices()
        .map(move |(i, c)| (pos + i + c.len_utf8(), c))
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(end, _)| end)
}

/// Match a pattern text element at `pos`, case-insensitively. A literal space
/// consumes a run of whitespace, or nothing when the input is already at a
/// word boundary (start, end, or just after whitespace) — that is what lets
/// `wait [for] %timespan%` accept both "wait for 5 seconds" and
/// "wait 5 seconds".
fn match_literal(input: &str, mut pos: usize, text: &str) -> Option<usize> {
    for expected in text.chars() {
        if expected == ' ' {
            let run: usize = input[pos..]
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(char::len_utf8)
                .sum();
            if run > 0 {
                pos += run;
            } else {
                let at_boundary = pos == 0
                    || pos == input.len()
                    || input[..pos].chars().next_back().is_some_and(char::is_whitespace);
                if !at_boundary {
                    return None;
                }
            }
        } else {
            let got = input[pos..].chars().next()?;
            if got.to_ascii_lowercase() != expected.to_ascii_lowercase() {
                return None;
            }
            pos += got.len_utf8();
        }
    }
    Some(pos)
}

fn compile(source: &str, types: &TypeRegistry) -> Result<Compiled, PatternError> {
    let mut pairs = PatternParser::parse(Rule::pattern, source).map_err(|err| PatternError::Malformed {
        pattern: source.to_string(),
        detail: err.to_string(),
    })?;
    let pattern = pairs.next().ok_or_else(|| PatternError::Malformed {
        pattern: source.to_string(),
        detail: "empty parse".to_string(),
    })?;
    let mut slots = Vec::new();
    let mut elems = Vec::new();
    for pair in pattern.into_inner() {
        match pair.as_rule() {
            Rule::elems => {
                elems = compile_elems(pair, source, types, &mut slots)?;
            },
            Rule::EOI => {},
            other => {
                return Err(PatternError::Malformed {
                    pattern: source.to_string(),
                    detail: format!("unexpected rule {other:?}"),
                });
            },
        }
    }
    Ok(Compiled { elems, slots })
}

fn compile_elems(
    pair: pest::iterators::Pair<'_, Rule>,
    source: &str,
    types: &TypeRegistry,
    slots: &mut Vec<SlotSpec>,
) -> Result<Vec<PatElem>, PatternError> {
    let mut elems = Vec::new();
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::text => elems.push(PatElem::Text(unescape(child.as_str()))),
            Rule::optional => {
                elems.push(PatElem::Optional(compile_branches(child, source, types, slots)?));
            },
            Rule::choice => {
                elems.push(PatElem::Choice(compile_branches(child, source, types, slots)?));
            },
            Rule::slot => {
                let index = slots.len();
                slots.push(compile_slot(child, source, types)?);
                elems.push(PatElem::Slot(index));
            },
            other => {
                return Err(PatternError::Malformed {
                    pattern: source.to_string(),
                    detail: format!("unexpected rule {other:?}"),
                });
            },
        }
    }
    Ok(elems)
}

fn compile_branches(
    pair: pest::iterators::Pair<'_, Rule>,
    source: &str,
    types: &TypeRegistry,
    slots: &mut Vec<SlotSpec>,
) -> Result<Vec<PatBranch>, PatternError> {
    let mut branches = Vec::new();
    for branch in pair.into_inner() {
        let mut mark = 0;
        let mut elems = Vec::new();
        for part in branch.into_inner() {
            match part.as_rule() {
                Rule::mark => {
                    let digits = part.as_str().trim_end_matches(':');
                    mark = digits.parse().map_err(|_| PatternError::Malformed {
                        pattern: source.to_string(),
                        detail: format!("bad parse mark '{digits}'"),
                    })?;
                },
                Rule::elems => {
                    elems = compile_elems(part, source, types, slots)?;
                },
                other => {
                    return Err(PatternError::Malformed {
                        pattern: source.to_string(),
                        detail: format!("unexpected rule {other:?}"),
                    });
                },
            }
        }
        branches.push(PatBranch { mark, elems });
    }
    Ok(branches)
}

fn compile_slot(
    pair: pest::iterators::Pair<'_, Rule>,
    source: &str,
    types: &TypeRegistry,
) -> Result<SlotSpec, PatternError> {
    let mut spec = SlotSpec {
        kinds: Vec::new(),
        nullable: false,
        literal_only: false,
        expr_only: false,
    };
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::slot_flag => match part.as_str() {
                "-" => spec.nullable = true,
                "*" => spec.literal_only = true,
                "~" => spec.expr_only = true,
                _ => {},
            },
            Rule::kind_name => {
                let name = part.as_str();
                let (kind, plural) =
                    types.kind_by_user_name(name).ok_or_else(|| PatternError::UnknownKind {
                        pattern: source.to_string(),
                        name: name.to_string(),
                    })?;
                spec.kinds.push(KindSpec { kind, plural });
            },
            other => {
                return Err(PatternError::Malformed {
                    pattern: source.to_string(),
                    detail: format!("unexpected rule {other:?}"),
                });
            },
        }
    }
    Ok(spec)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use schist_data::{Value, ValueKind};

    use super::*;
    use crate::stdlib::standard_registries;

    fn types() -> TypeRegistry {
        let (_, types) = standard_registries();
        types
    }

    /// Handler that fills number slots from digit spans and rejects others.
    fn number_handler(spec: &SlotSpec, text: &str) -> Option<Expr> {
        if spec.kinds.iter().all(|k| k.kind != ValueKind::Number) {
            return None;
        }
        text.parse::<f64>().ok().map(Expr::number)
    }

    fn timespan_handler(spec: &SlotSpec, text: &str) -> Option<Expr> {
        if spec.kinds.iter().all(|k| k.kind != ValueKind::Timespan) {
            return None;
        }
        schist_data::Timespan::parse(text).map(|t| Expr::Literal(Value::Timespan(t)))
    }

    #[test]
    fn compiles_slots_in_order() {
        let types = types();
        let pattern = Pattern::new("give %number% of %items% to %players%");
        let compiled = pattern.compiled(&types).unwrap();
        assert_eq!(compiled.slot_count(), 3);
        assert!(!compiled.slot(0).accepts_many());
        assert!(compiled.slot(1).accepts_many());
        assert!(compiled.slot(2).accepts_many());
    }

    #[test]
    fn compile_is_idempotent() {
        let types = types();
        let pattern = Pattern::new("wait [for] %timespan%");
        let first = pattern.compiled(&types).unwrap() as *const Compiled;
        let second = pattern.compiled(&types).unwrap() as *const Compiled;
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let types = types();
        let pattern = Pattern::new("summon %dragon%");
        assert!(matches!(
            pattern.compiled(&types),
            Err(PatternError::UnknownKind { name, .. }) if name == "dragon"
        ));
    }

    #[test]
    fn optional_group_elides() {
        let types = types();
        let pattern = Pattern::new("wait [for] %timespan%");
        let compiled = pattern.compiled(&types).unwrap();
        for input in ["wait for 5 seconds", "wait 5 seconds", "WAIT FOR 5 SECONDS"] {
            let m = compiled
                .match_input(input, &mut timespan_handler)
                .unwrap_or_else(|| panic!("no match for {input:?}"));
            assert_eq!(
                m.args[0],
                Some(Expr::Literal(Value::Timespan(schist_data::Timespan::from_secs(5)))),
                "input {input:?}"
            );
        }
        assert!(compiled.match_input("wait five seconds", &mut timespan_handler).is_none());
    }

    #[test]
    fn optional_branch_with_space_alternative() {
        let types = types();
        let pattern = Pattern::new("off[(-| )]hand");
        let compiled = pattern.compiled(&types).unwrap();
        let mut reject = |_: &SlotSpec, _: &str| -> Option<Expr> { None };
        assert!(compiled.match_input("offhand", &mut reject).is_some());
        assert!(compiled.match_input("off-hand", &mut reject).is_some());
        assert!(compiled.match_input("off hand", &mut reject).is_some());
        assert!(compiled.match_input("off_hand", &mut reject).is_none());
    }

    #[test]
    fn parse_marks_xor_across_groups() {
        let types = types();
        let pattern = Pattern::new("is [1:not] (online|2:offline)");
        let compiled = pattern.compiled(&types).unwrap();
        let mut reject = |_: &SlotSpec, _: &str| -> Option<Expr> { None };
        assert_eq!(compiled.match_input("is online", &mut reject).unwrap().mark, 0);
        assert_eq!(compiled.match_input("is not online", &mut reject).unwrap().mark, 1);
        assert_eq!(compiled.match_input("is offline", &mut reject).unwrap().mark, 2);
        assert_eq!(compiled.match_input("is not offline", &mut reject).unwrap().mark, 3);
    }

    #[test]
    fn escaped_percent_is_literal() {
        let types = types();
        let pattern = Pattern::new("chance of %number%\\%");
        let compiled = pattern.compiled(&types).unwrap();
        let m = compiled.match_input("chance of 10%", &mut number_handler).unwrap();
        assert_eq!(m.args[0], Some(Expr::number(10.0)));
        assert!(compiled.match_input("chance of 10", &mut number_handler).is_none());
    }

    #[test]
    fn slot_backtracks_until_rest_of_pattern_fits() {
        let types = types();
        let pattern = Pattern::new("%number% then %number%");
        let compiled = pattern.compiled(&types).unwrap();
        let m = compiled.match_input("12 then 7", &mut number_handler).unwrap();
        assert_eq!(m.args[0], Some(Expr::number(12.0)));
        assert_eq!(m.args[1], Some(Expr::number(7.0)));
    }

    #[test]
    fn omitted_slot_stays_none() {
        let types = types();
        let pattern = Pattern::new("kick [%number%] now");
        let compiled = pattern.compiled(&types).unwrap();
        let m = compiled.match_input("kick now", &mut number_handler).unwrap();
        assert_eq!(m.args[0], None);
        let m = compiled.match_input("kick 3 now", &mut number_handler).unwrap();
        assert_eq!(m.args[0], Some(Expr::number(3.0)));
    }

    #[test]
    fn whole_input_must_be_consumed() {
        let types = types();
        let pattern = Pattern::new("stop");
        let compiled = pattern.compiled(&types).unwrap();
        let mut reject = |_: &SlotSpec, _: &str| -> Option<Expr> { None };
        assert!(compiled.match_input("stop", &mut reject).is_some());
        assert!(compiled.match_input("stop now", &mut reject).is_none());
        assert!(compiled.match_input("sto", &mut reject).is_none());
    }
}
