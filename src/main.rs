//! Simple FB2 to KFX fragment converter CLI

use std::env;
use std::process;

use fb2kfx::{Options, convert, fb2};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <input.fb2> [stylesheet.css]", args[0]);
        eprintln!("Writes the KFX fragment dump to stdout.");
        process::exit(1);
    }

    let xml = match std::fs::read_to_string(&args[1]) {
        Ok(xml) => xml,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args[1], e);
            process::exit(1);
        }
    };

    let css = args.get(2).map(|path| {
        std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Failed to read {path}: {e}");
            process::exit(1);
        })
    });

    let document = match fb2::parse_document(&xml) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", args[1], e);
            process::exit(1);
        }
    };

    let result = convert(&document, css.as_deref(), &Options::default());
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    print!("{}", result.fragments.dump());
}
