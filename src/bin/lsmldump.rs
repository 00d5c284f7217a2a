//! Parses LSML files and dumps their structure, reporting every
//! recovered syntax error with its line number.
//!
//! ```text
//! lsmldump [-v...] [--sections N] FILE...
//! ```

use std::env;
use std::fs::File;
use std::ops::ControlFlow;
use std::process;

use lsml::{Document, Error, IoSource, ParseOptions, SectionKind};

fn usage() -> ! {
    eprintln!("usage: lsmldump [-v...] [--sections N] FILE...");
    process::exit(2);
}

fn dump(doc: &Document) {
    for (id, kind) in doc.sections() {
        let name = doc.section_name(id).unwrap_or(b"");
        match kind {
            SectionKind::Table => {
                println!("{{{}}}", String::from_utf8_lossy(name));
                if let Ok(entries) = doc.table_entries(id) {
                    for (key, value) in entries {
                        println!(
                            "  {} = {}",
                            String::from_utf8_lossy(doc.resolve(key)),
                            String::from_utf8_lossy(doc.resolve(value)),
                        );
                    }
                }
            }
            SectionKind::Array => {
                let (rows, cols) = doc.array_size_2d(id, true).unwrap_or((0, 0));
                println!(
                    "[{}] ({} rows, up to {} columns)",
                    String::from_utf8_lossy(name),
                    rows,
                    cols,
                );
                if let Ok(items) = doc.array_items_2d(id) {
                    for ((row, col), value) in items {
                        if col == 0 && row > 0 {
                            println!();
                        }
                        if col == 0 {
                            print!("  ");
                        } else {
                            print!(", ");
                        }
                        print!("{}", String::from_utf8_lossy(doc.resolve(value)));
                    }
                    println!();
                }
            }
        }
    }
}

fn main() {
    let mut verbosity = 0;
    let mut max_sections = 0usize;
    let mut files = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-h" || arg == "--help" {
            usage();
        } else if arg == "--sections" {
            match args.next().and_then(|n| n.parse().ok()) {
                Some(n) => max_sections = n,
                None => usage(),
            }
        } else if arg.starts_with("-v") && arg[1..].bytes().all(|b| b == b'v') {
            verbosity += arg.len() - 1;
        } else {
            files.push(arg);
        }
    }
    if files.is_empty() {
        usage();
    }
    stderrlog::new()
        .verbosity(verbosity)
        .init()
        .expect("logger init");

    let mut failures = 0usize;
    for path in &files {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("{}: {}", path, err);
                failures += 1;
                continue;
            }
        };
        let size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
        // Rule of thumb: interned strings, nodes and buckets together
        // stay well under 4x the input size plus a fixed floor.
        let mut doc = match Document::with_capacity(size * 4 + 16 * 1024) {
            Ok(doc) => doc,
            Err(err) => {
                eprintln!("{}: {}", path, err);
                failures += 1;
                continue;
            }
        };
        let mut diagnostics = 0usize;
        let mut logger = |err: Error, line: u32| {
            eprintln!("{}:{}: {}", path, line, err);
            diagnostics += 1;
            ControlFlow::<()>::Continue(())
        };
        let options = ParseOptions::new()
            .with_max_sections(max_sections)
            .with_error_logger(&mut logger);
        let result = doc.parse(IoSource::new(file), options);
        match result {
            Ok(()) => {
                dump(&doc);
                if diagnostics > 0 {
                    eprintln!("{}: {} recovered errors", path, diagnostics);
                    failures += 1;
                }
                log::info!(
                    "{}: arena {} / {} bytes",
                    path,
                    doc.arena_used(),
                    doc.arena_capacity()
                );
            }
            Err(err) => {
                eprintln!("{}: {}", path, err);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        process::exit(1);
    }
}
