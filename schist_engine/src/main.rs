#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Schist engine **
//! Loads config and scripts, then hands control to the interactive console.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;

use schist_engine::config::{CONFIG_FILE, Config};
use schist_engine::console::run_console;
use schist_engine::{Engine, SCHIST_VERSION};

fn main() -> Result<()> {
    env_logger::init();
    info!("Start: loading Schist engine...");

    let config = Config::load(Path::new(CONFIG_FILE)).context("while loading schist.toml")?;
    let mut engine = Engine::new(config);

    let diagnostics = engine.reload().context("while loading scripts")?;
    for diag in &diagnostics {
        eprintln!("{}", diag.render());
    }

    println!(
        "{:^60}",
        format!("SCHIST ENGINE v{SCHIST_VERSION}").bright_yellow().underline()
    );
    println!(
        "{} trigger(s) from {}\n",
        engine.triggers().len(),
        engine.config.scripts_dir.display()
    );

    run_console(&mut engine)
}
