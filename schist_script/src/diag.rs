//! Parse-time logging and user-facing diagnostics.
//!
//! While the parser tries candidates, most errors are speculative: a span
//! that fails to parse as one form may parse fine as the next. [`ParseLog`]
//! therefore collects errors by grade and only the best one survives to be
//! shown, so "expected a player here" wins over a generic "can't understand
//! this" from an unrelated candidate.

use std::fmt;

use colored::Colorize;

/// Grade of a parse error, ascending by how informative it is.
///
/// `Syntax` is "this doesn't look like anything"; `Semantic` means the shape
/// matched but the meaning is wrong (bad type, missing event value), which
/// is the more useful thing to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    None,
    Syntax,
    Semantic,
}

#[derive(Debug, Clone)]
struct BestError {
    kind: ErrorKind,
    message: String,
}

/// Error collector for one parse attempt (or sub-attempt).
///
/// A new error replaces the stored one only when its grade is strictly
/// higher, so the earliest error of the highest grade wins.
#[derive(Debug, Default)]
pub struct ParseLog {
    best: Option<BestError>,
    warnings: Vec<String>,
    internal: Vec<String>,
}

impl ParseLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        if kind == ErrorKind::None {
            return;
        }
        if self.best.as_ref().is_none_or(|best| kind > best.kind) {
            self.best = Some(BestError {
                kind,
                message: message.into(),
            });
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record an invariant violation (registration bug, not bad input).
    /// These always surface, independent of best-error selection.
    pub fn internal_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("internal parser error: {message}");
        self.internal.push(message);
    }

    #[must_use]
    pub fn best_error(&self) -> Option<(ErrorKind, &str)> {
        self.best.as_ref().map(|best| (best.kind, best.message.as_str()))
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.best.is_some() || !self.internal.is_empty()
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn internal(&self) -> &[String] {
        &self.internal
    }

    /// Fold a failed sub-attempt into this log: its best error competes
    /// under the same grading rule, warnings and internal errors carry over.
    pub fn merge(&mut self, child: ParseLog) {
        if let Some(best) = child.best {
            self.error(best.kind, best.message);
        }
        self.warnings.extend(child.warnings);
        self.internal.extend(child.internal);
    }

    /// Fold a successful sub-attempt: speculative errors are dropped, only
    /// warnings and internal errors survive.
    pub fn merge_warnings(&mut self, child: ParseLog) {
        self.warnings.extend(child.warnings);
        self.internal.extend(child.internal);
    }
}

/// How serious a surfaced diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A user-facing message tied to a script line.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub script: String,
    pub line: usize,
    /// The offending source line, when available.
    pub snippet: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(message: impl Into<String>, script: &str, line: usize) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            script: script.to_string(),
            line,
            snippet: None,
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>, script: &str, line: usize) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            script: script.to_string(),
            line,
            snippet: None,
        }
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: &str) -> Self {
        self.snippet = Some(snippet.to_string());
        self
    }

    /// Terminal rendering with color; plain [`Display`](fmt::Display) is the
    /// uncolored fallback for logs and tests.
    #[must_use]
    pub fn render(&self) -> String {
        let tag = match self.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        let location = format!("{}:{}", self.script, self.line).dimmed();
        let mut out = format!("{tag}: {} ({location})", self.message);
        if let Some(snippet) = &self.snippet {
            out.push_str(&format!("\n    {}", snippet.dimmed()));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {} ({}:{})", self.message, self.script, self.line)?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n    {snippet}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_grade_replaces_lower() {
        let mut log = ParseLog::new();
        log.error(ErrorKind::Syntax, "can't understand this");
        log.error(ErrorKind::Semantic, "expected a player");
        assert_eq!(log.best_error(), Some((ErrorKind::Semantic, "expected a player")));
    }

    #[test]
    fn equal_grade_keeps_first() {
        let mut log = ParseLog::new();
        log.error(ErrorKind::Semantic, "first");
        log.error(ErrorKind::Semantic, "second");
        assert_eq!(log.best_error(), Some((ErrorKind::Semantic, "first")));
    }

    #[test]
    fn none_grade_is_ignored() {
        let mut log = ParseLog::new();
        log.error(ErrorKind::None, "noise");
        assert!(!log.has_error());
    }

    #[test]
    fn merge_competes_merge_warnings_drops_error() {
        let mut log = ParseLog::new();
        log.error(ErrorKind::Syntax, "outer");

        let mut failed = ParseLog::new();
        failed.error(ErrorKind::Semantic, "inner");
        failed.warn("odd spacing");
        log.merge(failed);
        assert_eq!(log.best_error(), Some((ErrorKind::Semantic, "inner")));
        assert_eq!(log.warnings().len(), 1);

        let mut succeeded = ParseLog::new();
        succeeded.error(ErrorKind::Semantic, "speculative");
        succeeded.warn("kept");
        let mut fresh = ParseLog::new();
        fresh.merge_warnings(succeeded);
        assert!(!fresh.has_error());
        assert_eq!(fresh.warnings(), ["kept"]);
    }

    #[test]
    fn diagnostic_display_includes_location_and_snippet() {
        let diag = Diagnostic::error("unknown effect", "join.sk", 3).with_snippet("frobnicate the player");
        let text = diag.to_string();
        assert!(text.contains("error: unknown effect (join.sk:3)"));
        assert!(text.contains("frobnicate the player"));
    }
}
