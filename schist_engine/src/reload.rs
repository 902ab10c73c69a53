//! Script (re)loading: files → parsed triggers, with diagnostics.
//!
//! Loading never aborts on script errors; bad triggers are skipped and
//! their diagnostics returned for the console to print. Only I/O failures
//! on the directory itself are hard errors.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use schist_script::{Diagnostic, ScriptParser, SyntaxRegistry, TypeRegistry, load_file};

use crate::trigger::Trigger;

pub struct LoadOutcome {
    pub triggers: Vec<Arc<Trigger>>,
    pub diagnostics: Vec<Diagnostic>,
    pub scripts: usize,
}

/// Parse every `*.sk` file in `dir`, in file-name order so trigger
/// registration order is stable across loads.
///
/// # Errors
///
/// Fails only when the directory or a file in it cannot be read.
pub fn load_dir(dir: &Path, syntax: &SyntaxRegistry, types: &TypeRegistry) -> Result<LoadOutcome> {
    let mut paths = Vec::new();
    if dir.exists() {
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading script dir {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "sk") {
                paths.push(path);
            }
        }
        paths.sort();
    } else {
        warn!("script directory {} does not exist", dir.display());
    }

    let mut outcome = LoadOutcome {
        triggers: Vec::new(),
        diagnostics: Vec::new(),
        scripts: paths.len(),
    };
    for path in paths {
        let (source, mut structural) =
            load_file(&path).with_context(|| format!("reading script {}", path.display()))?;
        outcome.diagnostics.append(&mut structural);

        let mut parser = ScriptParser::new(syntax, types);
        let mut parsed = parser.parse_script(&source);
        outcome.diagnostics.append(&mut parsed.diagnostics);
        for def in parsed.triggers {
            outcome.triggers.push(Trigger::from_def(def));
        }
    }
    info!(
        "loaded {} trigger(s) from {} script(s), {} diagnostic(s)",
        outcome.triggers.len(),
        outcome.scripts,
        outcome.diagnostics.len()
    );
    Ok(outcome)
}
