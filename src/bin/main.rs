//! Command-line frontend: decode blackbox logs and export them to CSV, with
//! optional JSON event dumps.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bbl_decode::{Parser, Reader, ReaderOptions};
use clap::{Arg, ArgAction, Command};
use glob::glob;

fn main() -> Result<()> {
    let matches = Command::new("bbl_decode")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Decode blackbox flight logs and export frame data")
        .arg(
            Arg::new("files")
                .help("Blackbox log files (.BBL, .BFL, .TXT; globs are expanded)")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .short('i')
                .value_parser(clap::value_parser!(usize))
                .help("Decode only this 1-based log session (default: all sessions)"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .action(ArgAction::SetTrue)
                .help("Write one .NN.csv file per decoded session"),
        )
        .arg(
            Arg::new("events")
                .long("events")
                .action(ArgAction::SetTrue)
                .help("Write one .NN.events.json file per decoded session"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for output files (default: next to the input)"),
        )
        .arg(
            Arg::new("allow-invalid-header")
                .long("allow-invalid-header")
                .action(ArgAction::SetTrue)
                .help("Skip malformed header lines instead of failing"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity (repeatable)"),
        )
        .get_matches();

    stderrlog::new()
        .verbosity(matches.get_count("verbose") as usize + 1)
        .init()?;

    let export_csv = matches.get_flag("csv");
    let export_events = matches.get_flag("events");
    let only_index = matches.get_one::<usize>("index").copied();
    let output_dir = matches.get_one::<String>("output-dir").map(PathBuf::from);
    let options = ReaderOptions {
        allow_invalid_header: matches.get_flag("allow-invalid-header"),
    };

    let mut paths = Vec::new();
    for pattern in matches.get_many::<String>("files").unwrap() {
        if pattern.contains('*') || pattern.contains('?') {
            for entry in glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))? {
                paths.push(entry?);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    if paths.is_empty() {
        anyhow::bail!("no input files matched");
    }

    for path in &paths {
        process_file(path, options, only_index, export_csv, export_events, &output_dir)
            .with_context(|| format!("failed to decode {}", path.display()))?;
    }
    Ok(())
}

fn process_file(
    path: &Path,
    options: ReaderOptions,
    only_index: Option<usize>,
    export_csv: bool,
    export_events: bool,
    output_dir: &Option<PathBuf>,
) -> Result<()> {
    let reader = Reader::open_with(path, options)?;
    let mut parser = Parser::new(reader);
    let count = parser.log_count();
    println!("{}: {} log session(s)", path.display(), count);

    let indices: Vec<usize> = match only_index {
        Some(index) => vec![index],
        None => (1..=count).collect(),
    };

    for index in indices {
        parser.set_log_index(index)?;

        if export_csv {
            let out_path = output_path(path, output_dir, index, "csv");
            let file = File::create(&out_path)
                .with_context(|| format!("cannot create {}", out_path.display()))?;
            bbl_decode::export::write_csv(&mut parser, BufWriter::new(file))?;
            println!("  wrote {}", out_path.display());
        } else {
            // drain the session so stats and events are complete
            for _frame in parser.frames() {}
        }

        #[cfg(feature = "json")]
        if export_events {
            let out_path = output_path(path, output_dir, index, "events.json");
            let file = File::create(&out_path)
                .with_context(|| format!("cannot create {}", out_path.display()))?;
            bbl_decode::export::write_events_json(&parser, BufWriter::new(file))?;
            println!("  wrote {}", out_path.display());
        }
        #[cfg(not(feature = "json"))]
        if export_events {
            anyhow::bail!("event export requires the `json` feature");
        }

        let stats = parser.stats();
        println!(
            "  session {}: {} frames, {} parsed, {} invalid ({:.2}%), {} events",
            index,
            stats.total,
            stats.parsed,
            stats.invalid,
            stats.invalid_percent,
            parser.events().len(),
        );
    }
    Ok(())
}

fn output_path(
    input: &Path,
    output_dir: &Option<PathBuf>,
    index: usize,
    extension: &str,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let file_name = format!("{}.{:02}.{}", stem, index, extension);
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
