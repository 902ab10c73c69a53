//! Expression parsing for pattern slots.
//!
//! Slots are untyped spans of text until something here claims them. The
//! order of attempts matters: grouping parens, variables, and quoted text
//! are unambiguous by their first character; registered expressions come
//! before literals so "the name of ..." is never read as an item called
//! "name"; literals come before list splitting so "1 minute and 30 seconds"
//! stays one timespan.

use schist_data::{EventSpec, Expr, TextPart, TextTemplate, Value, ValueKind, VarName};

use crate::diag::{ErrorKind, ParseLog};
use crate::pattern::{KindSpec, SlotHandler, SlotSpec};
use crate::registry::{BuildCx, ExprInfo};
use crate::types::TypeRegistry;

use super::ScriptParser;

/// Bridges the pattern matcher's slot callbacks back into the parser.
///
/// Each candidate span gets a fresh log; errors from spans that end up
/// rejected still compete for best-error via [`ParseLog::merge`].
pub(super) struct SlotCx<'p, 'a> {
    pub(super) parser: &'p mut ScriptParser<'a>,
    pub(super) log: &'p mut ParseLog,
    pub(super) event: Option<&'p EventSpec>,
    pub(super) literal_mode: bool,
}

impl SlotHandler for SlotCx<'_, '_> {
    fn parse_slot(&mut self, spec: &SlotSpec, text: &str) -> Option<Expr> {
        let mut attempt = ParseLog::new();
        let expr = self
            .parser
            .parse_expr(spec, text, self.event, self.literal_mode, &mut attempt);
        if expr.is_some() {
            self.log.merge_warnings(attempt);
        } else {
            self.log.merge(attempt);
        }
        expr
    }
}

impl<'a> ScriptParser<'a> {
    /// Parse a standalone expression with no event context. Any kind is
    /// accepted; lists are allowed.
    pub fn parse_expression(&mut self, text: &str, log: &mut ParseLog) -> Option<Expr> {
        self.parse_expr(&any_object_spec(), text, None, false, log)
    }

    pub(super) fn parse_expr(
        &mut self,
        spec: &SlotSpec,
        text: &str,
        event: Option<&EventSpec>,
        literal_mode: bool,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if literal_mode || spec.literal_only {
            if let Some(value) = self.literal_value(spec, text) {
                return Some(Expr::Literal(value));
            }
            return self.parse_list(spec, text, event, true, log);
        }

        if let Some(inner) = strip_parens(text) {
            return self.parse_expr(spec, inner, event, false, log);
        }
        if text.starts_with('{') && matching_brace(text) == Some(text.len()) {
            return self.parse_variable(spec, text, event, log);
        }
        if text.starts_with('"') && quoted_end(text) == Some(text.len()) {
            return self.parse_quoted(spec, text, event, log);
        }

        if let Some(expr) = self.parse_registry_expr(spec, text, event, log) {
            return Some(expr);
        }

        if spec.expr_only {
            // A literal here would have parsed; name it in the error instead
            // of falling back to "can't understand".
            if let Some(value) = self.literal_value(spec, text) {
                log.error(
                    ErrorKind::Semantic,
                    format!("'{value}' is a fixed value that can't be changed"),
                );
                return None;
            }
        } else if let Some(value) = self.literal_value(spec, text) {
            return Some(Expr::Literal(value));
        }

        self.parse_list(spec, text, event, false, log)
    }

    fn literal_value(&self, spec: &SlotSpec, text: &str) -> Option<Value> {
        spec.kinds
            .iter()
            .find_map(|k| self.types.parse_literal(text, k.kind))
    }

    /// Try every registered expression whose return kind can reach one of
    /// the slot's kinds. The active-set guard stops an expression from
    /// re-entering itself on the very same span, which is how patterns like
    /// arithmetic stay finite while their operands recurse.
    fn parse_registry_expr(
        &mut self,
        spec: &SlotSpec,
        text: &str,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        let expressions = self.syntax.expressions();
        let types = self.types;
        let wanted: Vec<ValueKind> = spec.kinds.iter().map(|k| k.kind).collect();
        for (index, info) in expressions.iter().enumerate() {
            let reachable = info.returns == ValueKind::Object
                || wanted.iter().any(|&kind| types.converter_exists(info.returns, kind));
            if !reachable {
                continue;
            }
            let key = (index, text.to_string());
            if self.active.contains(&key) {
                continue;
            }
            self.active.insert(key.clone());
            let built = self.try_expr_candidate(info, text, event, log);
            self.active.remove(&key);
            if let Some(expr) = built {
                return Some(wrap_converted(expr, info.returns, &wanted, types));
            }
        }
        None
    }

    fn try_expr_candidate(
        &mut self,
        info: &ExprInfo,
        text: &str,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        for (pattern_index, pattern) in info.patterns.iter().enumerate() {
            let Some(built) = self.match_pattern(pattern, pattern_index, text, event, false, log)
            else {
                continue;
            };
            let mut attempt = ParseLog::new();
            let mut cx = BuildCx {
                log: &mut attempt,
                event,
                types: self.types,
            };
            match (info.build)(built, &mut cx) {
                Some(expr) => {
                    log.merge_warnings(attempt);
                    return Some(expr);
                },
                None => log.merge(attempt),
            }
        }
        None
    }

    fn parse_variable(
        &mut self,
        spec: &SlotSpec,
        text: &str,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        let mut inner = text[1..text.len() - 1].trim();
        let mut local = false;
        let mut list = false;
        if let Some(rest) = inner.strip_prefix('_') {
            local = true;
            inner = rest;
        }
        if let Some(rest) = inner.strip_suffix("::*") {
            list = true;
            inner = rest;
        }
        if inner.trim().is_empty() {
            log.error(ErrorKind::Semantic, "variable name is empty");
            return None;
        }
        if list && !spec.accepts_many() {
            log.error(
                ErrorKind::Semantic,
                format!("'{text}' is a list variable, but only a single value fits here"),
            );
            return None;
        }
        let parts = self.parse_text_parts(inner, event, log)?;
        Some(Expr::Variable {
            name: VarName { parts },
            local,
            list,
        })
    }

    fn parse_quoted(
        &mut self,
        spec: &SlotSpec,
        text: &str,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        let fits = spec
            .kinds
            .iter()
            .any(|k| matches!(k.kind, ValueKind::Text | ValueKind::Object));
        if !fits {
            let wanted = spec.kinds.first().map_or("value", |k| k.kind.label());
            log.error(ErrorKind::Semantic, format!("expected a {wanted} here, not a text"));
            return None;
        }
        let parts = self.parse_text_parts(&text[1..text.len() - 1], event, log)?;
        if parts.is_empty() {
            return Some(Expr::text(""));
        }
        if let [TextPart::Text(t)] = parts.as_slice() {
            return Some(Expr::text(t));
        }
        Some(Expr::Interpolated(TextTemplate { parts }))
    }

    /// Split text with `%...%` interpolation slots into parts. Doubled `""`
    /// and `%%` are escapes for the literal characters.
    fn parse_text_parts(
        &mut self,
        inner: &str,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> Option<Vec<TextPart>> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = inner.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    if matches!(chars.peek(), Some((_, '"'))) {
                        chars.next();
                    }
                    current.push('"');
                },
                '%' => {
                    if matches!(chars.peek(), Some((_, '%'))) {
                        chars.next();
                        current.push('%');
                        continue;
                    }
                    let rest = &inner[i + 1..];
                    let Some(end) = rest.find('%') else {
                        log.error(
                            ErrorKind::Semantic,
                            "unclosed '%' in text; write '%%' for a literal percent",
                        );
                        return None;
                    };
                    let span = &rest[..end];
                    let mut attempt = ParseLog::new();
                    let expr = self.parse_expr(&any_object_spec(), span, event, false, &mut attempt);
                    let Some(expr) = expr else {
                        if attempt.best_error().is_none() {
                            attempt.error(ErrorKind::Semantic, format!("can't understand '%{span}%'"));
                        }
                        log.merge(attempt);
                        return None;
                    };
                    log.merge_warnings(attempt);
                    if !current.is_empty() {
                        parts.push(TextPart::Text(std::mem::take(&mut current)));
                    }
                    parts.push(TextPart::Expr(expr));
                    let close = i + 1 + end;
                    while chars.peek().is_some_and(|&(j, _)| j <= close) {
                        chars.next();
                    }
                },
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            parts.push(TextPart::Text(current));
        }
        Some(parts)
    }

    fn parse_list(
        &mut self,
        spec: &SlotSpec,
        text: &str,
        event: Option<&EventSpec>,
        literal_mode: bool,
        log: &mut ParseLog,
    ) -> Option<Expr> {
        let split = split_list(text)?;
        if !spec.accepts_many() {
            log.error(
                ErrorKind::Semantic,
                format!("'{text}' is a list, but only a single value fits here"),
            );
            return None;
        }
        let mut items = Vec::with_capacity(split.items.len());
        for item in &split.items {
            items.push(self.parse_expr(spec, item, event, literal_mode, log)?);
        }
        if split.mixed {
            log.warn(format!("'{text}' mixes 'and' and 'or'; treating it as 'or'"));
        }
        Some(Expr::List {
            items,
            or: split.or,
        })
    }
}

/// Grouping parens around the whole span, quote-aware.
fn strip_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || !text.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        if in_quotes {
            if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1 == text.len()).then(|| &text[1..i]);
                }
            },
            _ => {},
        }
    }
    None
}

/// Byte offset just past the `}` closing the brace at offset 0.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            },
            _ => {},
        }
    }
    None
}

/// Byte offset just past the quote closing the one at offset 0, honoring
/// `""` doubling.
fn quoted_end(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '"' {
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
            } else {
                return Some(i + 1);
            }
        }
    }
    None
}

struct ListSplit<'t> {
    items: Vec<&'t str>,
    or: bool,
    mixed: bool,
}

/// Split on top-level `,`, ` and `, ` or `. Separators inside quotes,
/// parens, or braces don't count. `None` when there is nothing to split.
fn split_list(text: &str) -> Option<ListSplit<'_>> {
    let mut raw = Vec::new();
    let mut saw_and = false;
    let mut saw_or = false;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0;
    let mut i = 0;
    while i < text.len() {
        let c = text[i..].chars().next()?;
        if in_quotes {
            if c == '"' {
                in_quotes = false;
            }
            i += c.len_utf8();
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                raw.push(&text[start..i]);
                start = i + 1;
            },
            ' ' if depth == 0 => {
                if text[i..].starts_with(" and ") {
                    raw.push(&text[start..i]);
                    saw_and = true;
                    start = i + 5;
                    i = start;
                    continue;
                }
                if text[i..].starts_with(" or ") {
                    raw.push(&text[start..i]);
                    saw_or = true;
                    start = i + 4;
                    i = start;
                    continue;
                }
            },
            _ => {},
        }
        i += c.len_utf8();
    }
    raw.push(&text[start..]);
    if raw.len() < 2 {
        return None;
    }

    let mut items = Vec::with_capacity(raw.len());
    for piece in raw {
        let mut item = piece.trim();
        // Oxford joiner after a comma: "a, b, and c".
        if let Some(rest) = item.strip_prefix("and ") {
            saw_and = true;
            item = rest.trim_start();
        } else if let Some(rest) = item.strip_prefix("or ") {
            saw_or = true;
            item = rest.trim_start();
        }
        if item.is_empty() {
            return None;
        }
        items.push(item);
    }
    Some(ListSplit {
        items,
        or: saw_or,
        mixed: saw_and && saw_or,
    })
}

fn any_object_spec() -> SlotSpec {
    SlotSpec {
        kinds: vec![KindSpec {
            kind: ValueKind::Object,
            plural: true,
        }],
        nullable: false,
        literal_only: false,
        expr_only: false,
    }
}

fn wrap_converted(expr: Expr, returns: ValueKind, wanted: &[ValueKind], types: &TypeRegistry) -> Expr {
    if returns == ValueKind::Object
        || wanted.iter().any(|&k| k == returns || k == ValueKind::Object)
    {
        return expr;
    }
    match wanted.iter().copied().find(|&k| types.converter_exists(returns, k)) {
        Some(to) => Expr::Converted {
            inner: Box::new(expr),
            to,
        },
        None => expr,
    }
}

#[cfg(test)]
mod tests {
    use schist_data::Timespan;

    use super::*;
    use crate::stdlib::standard_registries;

    fn parse(text: &str) -> Option<Expr> {
        let (syntax, types) = standard_registries();
        let mut parser = ScriptParser::new(&syntax, &types);
        let mut log = ParseLog::new();
        parser.parse_expression(text, &mut log)
    }

    #[test]
    fn split_respects_quotes_and_braces() {
        let split = split_list("\"a, b\" and {x::1, 2}").unwrap();
        assert_eq!(split.items, vec!["\"a, b\"", "{x::1, 2}"]);
        assert!(!split.or);
    }

    #[test]
    fn oxford_comma_joins_cleanly() {
        let split = split_list("1, 2, and 3").unwrap();
        assert_eq!(split.items, vec!["1", "2", "3"]);
        assert!(!split.or);
        assert!(!split.mixed);
    }

    #[test]
    fn or_list_is_flagged() {
        let split = split_list("1 or 2").unwrap();
        assert!(split.or);
    }

    #[test]
    fn single_value_does_not_split() {
        assert!(split_list("oak log").is_none());
        assert!(split_list("\"a and b\"").is_none());
    }

    #[test]
    fn timespans_swallow_their_joiners() {
        assert_eq!(
            parse("1 minute and 30 seconds"),
            Some(Expr::Literal(Value::Timespan(Timespan::from_secs(90))))
        );
    }

    #[test]
    fn nested_variables_interpolate() {
        let Some(Expr::Variable { name, local, list }) = parse("{homes::%{owner}%}") else {
            panic!("did not parse as a variable");
        };
        assert!(!local);
        assert!(!list);
        assert_eq!(name.parts.len(), 2);
        assert!(matches!(&name.parts[1], TextPart::Expr(Expr::Variable { .. })));
    }

    #[test]
    fn deep_arithmetic_terminates() {
        let Some(expr) = parse("1 + 2 * 3 - 4") else {
            panic!("no parse");
        };
        assert!(matches!(expr, Expr::Arithmetic { .. }));
    }

    #[test]
    fn random_between_parses_both_wordings() {
        for text in ["a random number between 1 and 10", "random number from 1 to 10"] {
            assert!(
                matches!(parse(text), Some(Expr::RandomBetween { .. })),
                "failed: {text:?}"
            );
        }
    }
}
