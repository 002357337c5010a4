//! Purpose: Map a mode code onto exactly one store operation and report the result.
//! Exports: `dispatch_mode`, `Mode`.
//! Role: Keep `main.rs` focused on parse/bootstrap; this module owns the store session.
//! Invariants: The store is opened only for recognised modes and closed on every path.
//! Invariants: Human output goes to stdout as plain lines; `--json` swaps in one JSON document.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;
use tracing::info;

use super::*;
use staffdb::age::age_today;
use staffdb::core::record::Worker;
use staffdb::core::store::{BulkOptions, Store};
use staffdb::synth::WorkerGenerator;

const SEARCH_SAMPLE: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    Clear,
    Init,
    Add,
    List,
    Fill,
    Search,
    Index,
}

impl Mode {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "0" | "clear" => Some(Self::Clear),
            "1" | "init" => Some(Self::Init),
            "2" | "add" => Some(Self::Add),
            "3" | "list" => Some(Self::List),
            "4" | "fill" => Some(Self::Fill),
            "5" | "search" => Some(Self::Search),
            "6" | "index" => Some(Self::Index),
            _ => None,
        }
    }
}

pub(super) fn dispatch_mode(cli: &Cli, db_path: PathBuf) -> Result<RunOutcome, Error> {
    let Some(mode) = Mode::parse(&cli.mode) else {
        if cli.json {
            emit_json(json!({ "unknown_mode": cli.mode }));
        } else {
            println!("unknown mode: {}", cli.mode);
        }
        return Ok(RunOutcome::ok());
    };

    if mode == Mode::Add && cli.args.len() != 3 {
        println!("usage: staffdb 2 \"<Surname Firstname Patronymic>\" <YYYY-MM-DD> <sex>");
        return Ok(RunOutcome::ok());
    }

    let mut store = Store::open_at(&db_path)?;
    info!(?mode, path = %db_path.display(), "dispatching");
    run_mode(mode, cli, &mut store)?;
    store.close()?;
    Ok(RunOutcome::ok())
}

fn run_mode(mode: Mode, cli: &Cli, store: &mut Store) -> Result<(), Error> {
    match mode {
        Mode::Clear => {
            let removed = store.clear_table()?;
            store.compact()?;
            if cli.json {
                emit_json(json!({ "cleared": { "rows": removed, "compacted": true } }));
            } else {
                println!("workers table cleared ({removed} rows) and database compacted");
            }
        }
        Mode::Init => {
            if cli.json {
                emit_json(json!({ "ready": { "path": store.path().display().to_string() } }));
            } else {
                println!("ready: {}", store.path().display());
            }
        }
        Mode::Add => {
            let worker = Worker::new(&cli.args[0], &cli.args[1], &cli.args[2]);
            store.insert_one(&worker)?;
            if cli.json {
                emit_json(json!({ "added": worker }));
            } else {
                println!("added: {worker}");
            }
        }
        Mode::List => {
            let workers = store.list_distinct()?;
            if cli.json {
                let rows = workers
                    .iter()
                    .map(|worker| {
                        json!({
                            "name": worker.name,
                            "dob": worker.dob,
                            "sex": worker.sex,
                            "age": age_today(&worker.dob).ok(),
                        })
                    })
                    .collect::<Vec<_>>();
                emit_json(json!({ "workers": rows }));
            } else {
                for worker in &workers {
                    match age_today(&worker.dob) {
                        Ok(age) => println!("{worker}, {age} years"),
                        Err(_) => println!("{worker}, age unknown"),
                    }
                }
            }
        }
        Mode::Fill => {
            let options = BulkOptions {
                chunk_rows: cli.chunk_rows,
            };
            let removed = store.clear_table()?;
            if !cli.json {
                println!("generating {} workers...", cli.rows);
            }
            let population = store.insert_many_with(
                WorkerGenerator::population(cli.rows, cli.seed),
                options,
            )?;
            if !cli.json {
                println!("adding {} special workers...", cli.special_rows);
            }
            let special_seed = cli.seed.map(|seed| seed.wrapping_add(1));
            let special = store.insert_many_with(
                WorkerGenerator::special(cli.special_rows, special_seed),
                options,
            )?;
            if cli.json {
                emit_json(json!({
                    "filled": {
                        "cleared": removed,
                        "rows": population.rows,
                        "special_rows": special.rows,
                        "commits": population.commits + special.commits,
                    }
                }));
            } else {
                println!(
                    "done: {} rows in {} commits",
                    population.rows + special.rows,
                    population.commits + special.commits
                );
            }
        }
        Mode::Search => {
            let start = Instant::now();
            let found = store.find_by_sex_and_name_prefix(cli.sex.as_str(), &cli.prefix)?;
            let elapsed = start.elapsed();
            if cli.json {
                emit_json(json!({
                    "found": found.len(),
                    "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
                    "workers": found,
                }));
            } else {
                println!("found: {}", found.len());
                for worker in found.iter().take(SEARCH_SAMPLE) {
                    println!("{worker}");
                }
                if found.len() > SEARCH_SAMPLE {
                    println!("...and {} more", found.len() - SEARCH_SAMPLE);
                }
                println!("time: {:.3} s", elapsed.as_secs_f64());
            }
        }
        Mode::Index => {
            let report = bench::run_index_bench(store, cli.sex.as_str(), &cli.prefix)?;
            if cli.json {
                emit_json(bench::report_json(&report, env!("CARGO_PKG_VERSION")));
            } else {
                println!("{}", bench::report_table(&report));
            }
        }
    }
    Ok(())
}
