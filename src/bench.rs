// Before/after benchmark for the composite search index.
//
// Purpose:
// - Time the (sex, name-prefix) search, create the index, and time it again.
// - Emit machine-readable JSON on stdout, or a human-readable table.
//
// Design notes:
// - Single run per side; numbers are for comparing access paths, not lab-grade profiling.
// - Query plans are captured alongside timings so a reader can see which path was taken.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use staffdb::core::error::{Error, ErrorKind};
use staffdb::core::store::{SEARCH_INDEX_NAME, Store};

#[derive(Clone, Debug)]
pub struct SearchTiming {
    pub duration: Duration,
    pub matches: usize,
    pub plan: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct BenchReport {
    pub sex: String,
    pub prefix: String,
    pub rows: u64,
    pub index: String,
    pub index_created: bool,
    pub before: SearchTiming,
    pub after: SearchTiming,
}

impl BenchReport {
    pub fn speedup(&self) -> f64 {
        let after = self.after.duration.as_secs_f64().max(1e-9);
        self.before.duration.as_secs_f64() / after
    }
}

pub fn run_index_bench(store: &mut Store, sex: &str, prefix: &str) -> Result<BenchReport, Error> {
    let rows = store.row_count()?;
    let before = timed_search(store, sex, prefix)?;
    let index_created = store.ensure_search_index()?;
    let index = store
        .search_index_name()?
        .unwrap_or_else(|| SEARCH_INDEX_NAME.to_string());
    let after = timed_search(store, sex, prefix)?;

    if before.matches != after.matches {
        return Err(Error::new(ErrorKind::Internal)
            .with_message(format!(
                "search index changed result count ({} before, {} after)",
                before.matches, after.matches
            ))
            .with_path(store.path()));
    }

    Ok(BenchReport {
        sex: sex.to_string(),
        prefix: prefix.to_string(),
        rows,
        index,
        index_created,
        before,
        after,
    })
}

fn timed_search(store: &Store, sex: &str, prefix: &str) -> Result<SearchTiming, Error> {
    let plan = store.search_plan(sex, prefix)?;
    let start = Instant::now();
    let found = store.find_by_sex_and_name_prefix(sex, prefix)?;
    let duration = start.elapsed();
    Ok(SearchTiming {
        duration,
        matches: found.len(),
        plan,
    })
}

pub fn report_json(report: &BenchReport, program_version: &str) -> Value {
    json!({
        "name": "staffdb",
        "version": program_version,
        "ts": rfc3339_now(SystemTime::now()),
        "system": system_json(),
        "params": {
            "sex": report.sex,
            "prefix": report.prefix,
            "rows": report.rows,
            "index": report.index,
            "debug_build": cfg!(debug_assertions),
        },
        "index_created": report.index_created,
        "before": timing_json(&report.before),
        "after": timing_json(&report.after),
        "speedup": report.speedup(),
    })
}

pub fn report_table(report: &BenchReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "search: sex = {:?}, name prefix {:?} over {} rows",
        report.sex, report.prefix, report.rows
    ));
    lines.push(format!(
        "{:>8}  {:>10}  {:>8}  plan",
        "run", "seconds", "matches"
    ));
    for (label, timing) in [("before", &report.before), ("after", &report.after)] {
        lines.push(format!(
            "{:>8}  {:>10.3}  {:>8}  {}",
            label,
            timing.duration.as_secs_f64(),
            timing.matches,
            timing.plan.join("; ")
        ));
    }
    let index_note = if report.index_created {
        "created"
    } else {
        "already present"
    };
    lines.push(format!("index {}: {index_note}", report.index));
    lines.push(format!("speedup: {:.1}x", report.speedup()));
    lines.join("\n")
}

fn timing_json(timing: &SearchTiming) -> Value {
    json!({
        "duration_ms": timing.duration.as_secs_f64() * 1000.0,
        "matches": timing.matches,
        "plan": timing.plan,
    })
}

fn system_json() -> Value {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpus": cpus,
    })
}

fn rfc3339_now(ts: SystemTime) -> String {
    let dur = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs() as i64;
    let nsec = dur.subsec_nanos();
    let tm = time::OffsetDateTime::from_unix_timestamp(secs).unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    let tm = tm.replace_nanosecond(nsec).unwrap_or(tm);
    tm.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
