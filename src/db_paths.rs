//! Purpose: Resolve the backing database path for the CLI.
//! Exports: `default_db_path`, `db_path_from_env`.
//! Invariants: `STAFFDB_PATH` wins when set and non-empty; otherwise `staff.db` in the cwd.

use std::ffi::OsString;
use std::path::PathBuf;

pub(crate) const DB_PATH_ENV: &str = "STAFFDB_PATH";
const DEFAULT_DB_FILE: &str = "staff.db";

pub(crate) fn default_db_path() -> PathBuf {
    db_path_from_env(std::env::var_os(DB_PATH_ENV))
}

pub(crate) fn db_path_from_env(value: Option<OsString>) -> PathBuf {
    match value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_DB_FILE),
    }
}
