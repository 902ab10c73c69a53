//! CLI entry point for schist_script.
//! Usage: cargo run -p schist_script -- check scripts/welcome.sk

use std::path::Path;
use std::{env, fs, process};

use schist_script::{ScriptParser, load_file, standard_registries};

fn main() {
    let args: Vec<String> = env::args().collect();

    // Accept either:
    // 1) cargo run: <bin> -- <cmd> <args>
    // 2) direct:    <bin> <cmd> <args>
    let rest: Vec<String> = match args.as_slice() {
        [_, flag, cmd, tail @ ..] if flag == "--" && (cmd == "check" || cmd == "dump") => {
            let mut v = vec![cmd.clone()];
            v.extend_from_slice(tail);
            v
        },
        [_, cmd, tail @ ..] if cmd == "check" || cmd == "dump" => {
            let mut v = vec![cmd.clone()];
            v.extend_from_slice(tail);
            v
        },
        _ => {
            eprintln!(
                "Usage:\n  schist_script check <file.sk>...\n  schist_script dump <file.sk> [--out <out.ron>]"
            );
            process::exit(2);
        },
    };
    let cmd = &rest[0];
    if cmd == "check" {
        run_check(&rest[1..]);
    } else {
        run_dump(&rest[1..]);
    }
}

fn parse_path(path: &str) -> schist_script::ParsedScript {
    let (source, structural) = load_file(Path::new(path)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let (syntax, types) = standard_registries();
    let mut parser = ScriptParser::new(&syntax, &types);
    let mut parsed = parser.parse_script(&source);
    let mut diagnostics = structural;
    diagnostics.append(&mut parsed.diagnostics);
    parsed.diagnostics = diagnostics;
    parsed
}

fn run_check(args: &[String]) {
    if args.is_empty() {
        eprintln!("Usage: schist_script check <file.sk>...");
        process::exit(2);
    }
    let mut failed = false;
    for path in args {
        let parsed = parse_path(path);
        for diag in &parsed.diagnostics {
            eprintln!("{}", diag.render());
        }
        if parsed.has_errors() {
            failed = true;
        } else {
            println!(
                "{path}: {} trigger{} ok",
                parsed.triggers.len(),
                if parsed.triggers.len() == 1 { "" } else { "s" }
            );
        }
    }
    if failed {
        process::exit(1);
    }
}

fn run_dump(args: &[String]) {
    let mut path: Option<String> = None;
    let mut out_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--out" {
            if i + 1 >= args.len() {
                eprintln!("--out requires a filepath");
                process::exit(2);
            }
            out_path = Some(args[i + 1].clone());
            i += 2;
            continue;
        }
        if path.is_none() {
            path = Some(args[i].clone());
        }
        i += 1;
    }
    let Some(path) = path else {
        eprintln!("Usage: schist_script dump <file.sk> [--out <out.ron>]");
        process::exit(2);
    };

    let parsed = parse_path(&path);
    for diag in &parsed.diagnostics {
        eprintln!("{}", diag.render());
    }
    if parsed.has_errors() {
        process::exit(1);
    }
    let ron = ron::ser::to_string_pretty(&parsed.triggers, ron::ser::PrettyConfig::default())
        .unwrap_or_else(|e| {
            eprintln!("error: serializing triggers: {e}");
            process::exit(1);
        });
    if let Some(out) = out_path {
        fs::write(&out, ron).unwrap_or_else(|e| {
            eprintln!("error: writing '{out}': {e}");
            process::exit(1);
        });
    } else {
        println!("{ron}");
    }
}
