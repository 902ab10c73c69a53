//! Script file loading: comment stripping, line continuations, and the
//! header/body block structure.
//!
//! A script is a sequence of blocks. A block starts with an unindented
//! header line ending in `:` and its body is every following line indented
//! by one consistent unit. Bodies are flat; deeper indentation is an error
//! rather than a nested section.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::diag::Diagnostic;

/// Errors reading script files from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read script '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One logical line (continuations already joined), trimmed, with the
/// 1-based number of its first physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub number: usize,
}

/// A block: header line plus flat body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub header: Line,
    pub body: Vec<Line>,
}

/// A whole script file, split into blocks but not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub name: String,
    pub blocks: Vec<RawBlock>,
}

/// Read and split a script file.
///
/// # Errors
///
/// Returns [`LoadError`] only for I/O failures; malformed content becomes
/// diagnostics instead.
pub fn load_file(path: &Path) -> Result<(ScriptSource, Vec<Diagnostic>), LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(parse_source(&name, &content))
}

/// Split script text into blocks, collecting structural diagnostics.
pub fn parse_source(name: &str, content: &str) -> (ScriptSource, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for line in logical_lines(content) {
        let stripped = strip_comment(&line.text);
        let text = stripped.trim_end();
        if text.trim().is_empty() {
            continue;
        }
        let indent_len = text.len() - text.trim_start().len();
        let (indent, body_text) = text.split_at(indent_len);

        if indent.is_empty() {
            close_block(&mut open, &mut blocks, &mut diags, name);
            if let Some(header) = body_text.strip_suffix(':') {
                if header.trim().is_empty() {
                    diags.push(
                        Diagnostic::error("empty block header", name, line.number).with_snippet(body_text),
                    );
                } else {
                    open = Some(OpenBlock {
                        header: Line {
                            text: header.trim().to_string(),
                            number: line.number,
                        },
                        indent: None,
                        body: Vec::new(),
                    });
                }
            } else {
                diags.push(
                    Diagnostic::error(
                        "expected an event header ending with ':' at the top level",
                        name,
                        line.number,
                    )
                    .with_snippet(body_text),
                );
            }
            continue;
        }

        let Some(block) = open.as_mut() else {
            diags.push(
                Diagnostic::error("indented line outside of a trigger", name, line.number)
                    .with_snippet(body_text),
            );
            continue;
        };
        match &block.indent {
            None => block.indent = Some(indent.to_string()),
            Some(unit) if indent == unit => {},
            Some(unit) if indent.starts_with(unit.as_str()) => {
                diags.push(
                    Diagnostic::error("nested sections are not supported", name, line.number)
                        .with_snippet(body_text),
                );
                continue;
            },
            Some(unit) => {
                diags.push(
                    Diagnostic::error(
                        format!(
                            "inconsistent indentation: block uses {} but this line uses {}",
                            describe_indent(unit),
                            describe_indent(indent)
                        ),
                        name,
                        line.number,
                    )
                    .with_snippet(body_text),
                );
                continue;
            },
        }
        block.body.push(Line {
            text: body_text.to_string(),
            number: line.number,
        });
    }
    close_block(&mut open, &mut blocks, &mut diags, name);

    (
        ScriptSource {
            name: name.to_string(),
            blocks,
        },
        diags,
    )
}

struct OpenBlock {
    header: Line,
    indent: Option<String>,
    body: Vec<Line>,
}

fn close_block(
    open: &mut Option<OpenBlock>,
    blocks: &mut Vec<RawBlock>,
    diags: &mut Vec<Diagnostic>,
    name: &str,
) {
    if let Some(block) = open.take() {
        if block.body.is_empty() {
            diags.push(Diagnostic::warning(
                format!("trigger '{}' has an empty body and was skipped", block.header.text),
                name,
                block.header.number,
            ));
        } else {
            blocks.push(RawBlock {
                header: block.header,
                body: block.body,
            });
        }
    }
}

/// Physical lines joined on trailing backslashes, numbered by first line.
fn logical_lines(content: &str) -> Vec<Line> {
    let mut out: Vec<Line> = Vec::new();
    let mut pending: Option<Line> = None;
    for (i, raw) in content.lines().enumerate() {
        let number = i + 1;
        match pending.take() {
            Some(mut line) => {
                line.text.push(' ');
                line.text.push_str(raw.trim_start());
                pending = Some(line);
            },
            None => {
                pending = Some(Line {
                    text: raw.to_string(),
                    number,
                });
            },
        }
        let line = pending.as_mut().filter(|line| line.text.ends_with('\\'));
        match line {
            Some(line) => {
                line.text.pop();
            },
            None => {
                if let Some(line) = pending.take() {
                    out.push(line);
                }
            },
        }
    }
    if let Some(line) = pending.take() {
        out.push(line);
    }
    out
}

/// Cut an unquoted `#` comment off the end of a line. Quote state tracks
/// doubled quotes naturally: `""` toggles twice and stays inside the string.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {},
        }
    }
    line
}

fn describe_indent(ws: &str) -> String {
    let tabs = ws.chars().filter(|&c| c == '\t').count();
    let spaces = ws.chars().filter(|&c| c == ' ').count();
    match (tabs, spaces) {
        (0, n) => format!("{n} space{}", if n == 1 { "" } else { "s" }),
        (n, 0) => format!("{n} tab{}", if n == 1 { "" } else { "s" }),
        _ => "mixed tabs and spaces".to_string(),
    }
}
