//! Interactive console: a stand-in for the host server.
//!
//! Commands simulate host events (`join`, `chat`, `break`) and drive the
//! tick clock by hand, so scripts can be exercised end to end without a
//! game attached. Everything a trigger asked the host to do is printed
//! after each command.

mod input;

use anyhow::Result;
use colored::Colorize;
use log::info;
use schist_data::{BlockKind, BlockPos, GameEvent, ItemKind};
use schist_script::SyntaxRegistry;

use crate::engine::Engine;
use crate::world::Outbound;

use input::{InputEvent, InputManager};

/// Control flow signal used by handlers to exit the console.
enum Control {
    Continue,
    Quit,
}

const COMMANDS: &[&str] = &[
    "help", "tick", "join", "quit", "chat", "break", "place", "damage", "perm", "hold", "scripts",
    "vars", "reload", "exit",
];

/// Words that are pattern glue, not worth completing.
const EXCLUDED_TERMS: &[&str] = &[
    "a", "an", "and", "at", "because", "by", "due", "for", "from", "in", "is", "it", "not", "of",
    "on", "or", "the", "to",
];

/// Completion terms: console commands plus the literal words of every
/// registered statement and event pattern.
fn completion_terms(syntax: &SyntaxRegistry) -> Vec<String> {
    let mut terms: Vec<String> = COMMANDS.iter().map(ToString::to_string).collect();
    let sources = syntax
        .statements()
        .iter()
        .flat_map(|s| s.patterns.iter())
        .chain(syntax.events().iter().flat_map(|e| e.patterns.iter()))
        .map(schist_script::Pattern::source);
    for source in sources {
        for word in source.split(|c: char| !c.is_ascii_alphabetic()) {
            let word = word.to_lowercase();
            if word.len() > 1 && !EXCLUDED_TERMS.contains(&word.as_str()) {
                terms.push(word);
            }
        }
    }
    terms.sort_unstable();
    terms.dedup();
    terms
}

/// Run the console until `exit` or end of input.
///
/// # Errors
///
/// Propagates reload I/O failures and unrecoverable input errors.
pub fn run_console(engine: &mut Engine) -> Result<()> {
    let mut input = InputManager::new(completion_terms(engine.syntax()));
    println!("{}", "type 'help' for commands".dimmed());
    loop {
        let prompt = format!(
            "[tick {} | {} online]> ",
            engine.current_tick(),
            engine.world.online_count()
        )
        .bright_blue()
        .to_string();

        let line = match input.read_line(&prompt)? {
            InputEvent::Line(line) => line,
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                println!("{}", "(interrupted; 'exit' quits)".dimmed());
                continue;
            },
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match dispatch(engine, line)? {
            Control::Quit => break,
            Control::Continue => print_outbox(engine),
        }
    }
    info!("console session ended");
    Ok(())
}

fn dispatch(engine: &mut Engine, line: &str) -> Result<Control> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    match command {
        "exit" => return Ok(Control::Quit),
        "help" => help(),
        "tick" => {
            let n: u64 = args.first().and_then(|a| a.parse().ok()).unwrap_or(1);
            engine.run_ticks(n);
            println!("advanced to tick {}", engine.current_tick());
        },
        "join" => {
            if let Some(name) = args.first() {
                let player = engine.world.join(name);
                engine.fire(GameEvent::Join { player });
            } else {
                usage("join <name>");
            }
        },
        "quit" => {
            if let Some(&name) = args.first() {
                match engine.world.find(name) {
                    Some(player) => {
                        engine.fire(GameEvent::Quit { player });
                        engine.world.quit(player);
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("quit <name>");
            }
        },
        "chat" => {
            if let (Some(&name), rest) = (args.first(), args.get(1..).unwrap_or(&[])) {
                match engine.world.find(name) {
                    Some(player) => {
                        let message = rest.join(" ");
                        let cancelled = engine.fire(GameEvent::Chat {
                            player,
                            message: message.clone(),
                        });
                        if cancelled {
                            println!("{}", format!("<{name}> {message} (cancelled)").strikethrough());
                        } else {
                            println!("<{name}> {message}");
                        }
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("chat <name> <message>");
            }
        },
        "break" | "place" => {
            if let (Some(&name), rest) = (args.first(), args.get(1..).unwrap_or(&[])) {
                match engine.world.find(name) {
                    Some(player) => {
                        let block = BlockKind::new(&rest.join(" "));
                        let pos = BlockPos::new(0, 64, 0);
                        let event = if command == "break" {
                            GameEvent::BlockBreak { player, pos, block: block.clone() }
                        } else {
                            GameEvent::BlockPlace { player, pos, block: block.clone() }
                        };
                        if engine.fire(event) {
                            println!("{}", format!("{command} of {block} cancelled").yellow());
                        } else if command == "place" {
                            engine.world.set_block(pos, block);
                        }
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("break|place <name> <block>");
            }
        },
        "damage" => {
            if let (Some(&name), Some(amount)) = (args.first(), args.get(1)) {
                let Ok(amount) = amount.parse::<f64>() else {
                    usage("damage <name> <amount>");
                    return Ok(Control::Continue);
                };
                match engine.world.find(name) {
                    Some(victim) => {
                        let cancelled = engine.fire(GameEvent::Damage { victim, amount });
                        if !cancelled {
                            if let Some(player) = engine.world.player_mut(victim) {
                                player.set_health(player.health() - amount);
                            }
                        }
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("damage <name> <amount>");
            }
        },
        "perm" => {
            if let (Some(&name), Some(node)) = (args.first(), args.get(1)) {
                match engine.world.find(name) {
                    Some(id) => {
                        if let Some(player) = engine.world.player_mut(id) {
                            player.permissions.insert((*node).to_string());
                        }
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("perm <name> <node>");
            }
        },
        "hold" => {
            if let (Some(&name), rest) = (args.first(), args.get(1..).unwrap_or(&[])) {
                match engine.world.find(name) {
                    Some(id) => {
                        if let Some(player) = engine.world.player_mut(id) {
                            player.held = Some(ItemKind::new(&rest.join(" ")));
                        }
                    },
                    None => unknown_player(name),
                }
            } else {
                usage("hold <name> <item>");
            }
        },
        "scripts" => {
            let triggers = engine.triggers();
            if triggers.is_empty() {
                println!("no triggers registered");
            }
            for trigger in triggers {
                println!("  {} {}", trigger.source.to_string().dimmed(), trigger.name);
            }
        },
        "vars" => {
            if engine.globals.is_empty() {
                println!("no variables set");
            }
            for (name, value) in engine.globals.scalars() {
                println!("  {{{name}}} = {value}");
            }
            for (name, values) in engine.globals.lists() {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                println!("  {{{name}::*}} = [{}]", rendered.join(", "));
            }
        },
        "reload" => {
            let diagnostics = engine.reload()?;
            for diag in &diagnostics {
                eprintln!("{}", diag.render());
            }
            println!(
                "{}",
                format!("reloaded: {} trigger(s) registered", engine.triggers().len()).green()
            );
        },
        other => {
            println!("{}", format!("unknown command '{other}'; try 'help'").red());
        },
    }
    Ok(Control::Continue)
}

fn help() {
    let text = "\
help                      show this text
tick [n]                  advance the clock n ticks (default 1)
join <name>               bring a player online (fires 'on join')
quit <name>               send a player offline (fires 'on quit')
chat <name> <message>     say something (fires 'on chat', cancellable)
break <name> <block>      break a block (fires 'on break')
place <name> <block>      place a block (fires 'on place')
damage <name> <amount>    hurt a player (fires 'on damage')
perm <name> <node>        grant a permission node
hold <name> <item>        put an item in the player's hand
scripts                   list registered triggers
vars                      list global variables
reload                    re-read the scripts directory
exit                      leave the console";
    println!("{}", textwrap::indent(text, "  "));
}

fn usage(text: &str) {
    println!("{}", format!("usage: {text}").yellow());
}

fn unknown_player(name: &str) {
    println!("{}", format!("no player named '{name}'; 'join {name}' first").red());
}

fn print_outbox(engine: &mut Engine) {
    for item in engine.world.drain_outbox() {
        match item {
            Outbound::Message { to, text } => println!("  {} {text}", format!("[-> {to}]").cyan()),
            Outbound::Broadcast { text } => println!("  {} {text}", "[broadcast]".bright_yellow()),
            Outbound::Kick { name, reason } => {
                println!("  {} {name}: {reason}", "[kick]".red());
            },
            Outbound::Command { line } => println!("  {} {line}", "[console]".magenta()),
            Outbound::Log { text } => println!("  {} {text}", "[log]".dimmed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use schist_script::standard_registries;

    use super::*;

    #[test]
    fn completion_includes_commands_and_pattern_words() {
        let (syntax, _) = standard_registries();
        let terms = completion_terms(&syntax);
        assert!(terms.iter().any(|t| t == "reload"));
        assert!(terms.iter().any(|t| t == "broadcast"));
        assert!(terms.iter().any(|t| t == "permission"));
    }

    #[test]
    fn completion_excludes_articles_and_glue() {
        let (syntax, _) = standard_registries();
        let terms = completion_terms(&syntax);
        assert!(!terms.iter().any(|t| t == "the"));
        assert!(!terms.iter().any(|t| t == "to"));
    }
}
