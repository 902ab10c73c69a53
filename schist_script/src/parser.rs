//! The script parser: turns loaded blocks into trigger definitions by trying
//! registered syntax candidates in order.
//!
//! Candidate failures are cheap and expected; the parse log keeps the most
//! informative error across all of them (see [`crate::diag`]). Statements are
//! tried in registration order, expressions in priority-category order.

use std::collections::HashSet;

use schist_data::{validate_trigger, EventSpec, SourceRef, Statement, TriggerDef};

use crate::diag::{Diagnostic, ErrorKind, ParseLog};
use crate::loader::{Line, ScriptSource};
use crate::pattern::Compiled;
use crate::registry::{BuildCx, BuiltMatch, SyntaxRegistry};
use crate::types::TypeRegistry;

mod expr;

/// The result of parsing one script: every trigger that parsed cleanly, plus
/// all errors and warnings encountered along the way.
#[derive(Debug)]
pub struct ParsedScript {
    pub triggers: Vec<TriggerDef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedScript {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::diag::Severity::Error)
    }
}

/// Parses scripts against a pair of frozen registries.
///
/// Holds a recursion guard across calls, so one parser instance must not be
/// shared between threads mid-parse; make one per load.
pub struct ScriptParser<'a> {
    syntax: &'a SyntaxRegistry,
    types: &'a TypeRegistry,
    /// (expression index, input span) pairs currently being tried, to stop
    /// an expression from recursing into itself on the same span.
    active: HashSet<(usize, String)>,
}

impl<'a> ScriptParser<'a> {
    /// # Panics
    ///
    /// Panics if either registry is not frozen. Parsing against a registry
    /// that is still accepting registrations is a setup bug, caught here
    /// rather than as misparses later.
    #[must_use]
    pub fn new(syntax: &'a SyntaxRegistry, types: &'a TypeRegistry) -> Self {
        assert!(syntax.is_frozen(), "syntax registry must be frozen before parsing");
        assert!(types.is_frozen(), "type registry must be frozen before parsing");
        Self {
            syntax,
            types,
            active: HashSet::new(),
        }
    }

    /// Parse a whole script source into triggers.
    pub fn parse_script(&mut self, source: &ScriptSource) -> ParsedScript {
        let mut triggers = Vec::new();
        let mut diagnostics = Vec::new();

        for block in &source.blocks {
            let mut header_log = ParseLog::new();
            let event = self.parse_event(&block.header.text, &mut header_log);
            drain_log(
                header_log,
                event.is_none(),
                &mut diagnostics,
                &source.name,
                &block.header,
            );
            let Some(event) = event else { continue };

            let mut body = Vec::new();
            let mut failed = false;
            for line in &block.body {
                let mut log = ParseLog::new();
                let statement = self.parse_statement(&line.text, &event, &mut log);
                drain_log(log, statement.is_none(), &mut diagnostics, &source.name, line);
                match statement {
                    Some(statement) => body.push(statement),
                    None => failed = true,
                }
            }
            if failed {
                continue;
            }

            let trigger = TriggerDef {
                name: block.header.text.clone(),
                event,
                body,
                source: SourceRef {
                    script: source.name.clone(),
                    line: block.header.number,
                },
            };
            let problems = validate_trigger(&trigger);
            if problems.is_empty() {
                triggers.push(trigger);
            } else {
                for problem in problems {
                    diagnostics.push(Diagnostic::error(
                        problem.to_string(),
                        &source.name,
                        block.header.number,
                    ));
                }
            }
        }

        ParsedScript { triggers, diagnostics }
    }

    /// Parse an event header like "on join" or "every 5 seconds".
    ///
    /// Headers are matched in literal mode: slots only accept literals, and
    /// omitted slots are left empty instead of defaulted.
    pub fn parse_event(&mut self, text: &str, log: &mut ParseLog) -> Option<EventSpec> {
        let text = text.trim();
        let events = self.syntax.events();
        for info in events {
            for (pattern_index, pattern) in info.patterns.iter().enumerate() {
                let Some(built) = self.match_pattern(pattern, pattern_index, text, None, true, log)
                else {
                    continue;
                };
                let mut attempt = ParseLog::new();
                let mut cx = BuildCx {
                    log: &mut attempt,
                    event: None,
                    types: self.types,
                };
                match (info.build)(built, &mut cx) {
                    Some(event) => {
                        log.merge_warnings(attempt);
                        return Some(event);
                    },
                    None => log.merge(attempt),
                }
            }
        }
        log.error(ErrorKind::Syntax, format!("'{text}' is not a known event"));
        None
    }

    /// Parse one body line under the given event.
    pub fn parse_statement(
        &mut self,
        text: &str,
        event: &EventSpec,
        log: &mut ParseLog,
    ) -> Option<Statement> {
        let text = text.trim();
        let statements = self.syntax.statements();
        for info in statements {
            for (pattern_index, pattern) in info.patterns.iter().enumerate() {
                let Some(built) =
                    self.match_pattern(pattern, pattern_index, text, Some(event), false, log)
                else {
                    continue;
                };
                let mut attempt = ParseLog::new();
                let mut cx = BuildCx {
                    log: &mut attempt,
                    event: Some(event),
                    types: self.types,
                };
                match (info.build)(built, &mut cx) {
                    Some(statement) => {
                        log.merge_warnings(attempt);
                        return Some(statement);
                    },
                    None => log.merge(attempt),
                }
            }
        }
        log.error(
            ErrorKind::Syntax,
            format!("can't understand this statement: '{text}'"),
        );
        None
    }

    /// Run one pattern over the input: compile, match with slot parsing, and
    /// fill omitted slots with defaults. `None` means this candidate is out;
    /// its errors have been merged into `log`.
    fn match_pattern(
        &mut self,
        pattern: &crate::pattern::Pattern,
        pattern_index: usize,
        text: &str,
        event: Option<&EventSpec>,
        literal_mode: bool,
        log: &mut ParseLog,
    ) -> Option<BuiltMatch> {
        let compiled = match pattern.compiled(self.types) {
            Ok(compiled) => compiled,
            Err(err) => {
                log.internal_error(err.to_string());
                return None;
            },
        };
        let mut attempt = ParseLog::new();
        let matched = {
            let mut slots = expr::SlotCx {
                parser: self,
                log: &mut attempt,
                event,
                literal_mode,
            };
            compiled.match_input(text, &mut slots)
        };
        let Some(matched) = matched else {
            log.merge(attempt);
            return None;
        };
        let mut built = BuiltMatch {
            pattern_index,
            args: matched.args,
            mark: matched.mark,
        };
        if !literal_mode && !self.apply_defaults(compiled, &mut built, event, &mut attempt) {
            log.merge(attempt);
            return None;
        }
        log.merge_warnings(attempt);
        Some(built)
    }

    /// Fill every omitted, non-nullable slot with its kind's default
    /// expression. A default that reads an event value the current event does
    /// not carry fails the candidate; that is how "send" without a recipient
    /// is rejected in a periodic trigger.
    fn apply_defaults(
        &self,
        compiled: &Compiled,
        built: &mut BuiltMatch,
        event: Option<&EventSpec>,
        log: &mut ParseLog,
    ) -> bool {
        for index in 0..compiled.slot_count() {
            let spec = compiled.slot(index);
            if built.args[index].is_some() || spec.nullable {
                continue;
            }
            let Some(default) = spec.kinds.iter().find_map(|k| self.types.default_expr(k.kind)) else {
                let kind = spec.kinds.first().map_or("value", |k| k.kind.label());
                log.error(ErrorKind::Semantic, format!("the {kind} can't be left out here"));
                return false;
            };
            if let schist_data::Expr::EventValue { kind } = &default {
                if event.is_some_and(|e| !e.provides(*kind)) {
                    log.error(
                        ErrorKind::Semantic,
                        format!("this event has no {kind}; name one explicitly"),
                    );
                    return false;
                }
            }
            built.args[index] = Some(default);
        }
        true
    }
}

/// Turn one line's parse log into user-facing diagnostics.
fn drain_log(
    log: ParseLog,
    failed: bool,
    diagnostics: &mut Vec<Diagnostic>,
    script: &str,
    line: &Line,
) {
    if failed {
        if let Some((_, message)) = log.best_error() {
            diagnostics.push(Diagnostic::error(message, script, line.number).with_snippet(&line.text));
        }
    }
    for warning in log.warnings() {
        diagnostics.push(Diagnostic::warning(warning.clone(), script, line.number));
    }
    for internal in log.internal() {
        diagnostics.push(
            Diagnostic::error(format!("internal error: {internal}"), script, line.number)
                .with_snippet(&line.text),
        );
    }
}
