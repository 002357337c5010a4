//! Purpose: Shape of one worker record and how it lands in the `workers` table.
//! Exports: `Worker`, `Sex`.
//! Role: Leaf module; the store drives commits, records only write rows.
//! Invariants: Fields are opaque text; no validation happens on construction.
//! Invariants: `persist` writes exactly one row in (name, dob, sex) order and never commits.
use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, sqlite_error};

pub(crate) const INSERT_SQL: &str = "INSERT INTO workers (name, dob, sex) VALUES (?1, ?2, ?3)";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    pub dob: String,
    pub sex: String,
}

impl Worker {
    pub fn new(name: impl Into<String>, dob: impl Into<String>, sex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dob: dob.into(),
            sex: sex.into(),
        }
    }

    /// Writes this record as one row through `conn`, which may be a plain
    /// connection or an open transaction. Committing is left to the caller.
    pub fn persist(&self, conn: &Connection) -> Result<(), Error> {
        let mut stmt = conn
            .prepare_cached(INSERT_SQL)
            .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to prepare insert"))?;
        stmt.execute((&self.name, &self.dob, &self.sex))
            .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to insert worker"))?;
        Ok(())
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.name, self.dob, self.sex)
    }
}

/// Validated form of the `sex` column for callers that want it. The table
/// itself stores any text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "Male" => Ok(Sex::Male),
            "Female" => Ok(Sex::Female),
            _ => Err(Error::new(ErrorKind::MalformedInput)
                .with_message(format!("invalid sex value: {input:?}"))
                .with_hint("Use Male or Female.")),
        }
    }
}
