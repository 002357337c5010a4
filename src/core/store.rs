//! Purpose: Own the backing SQLite file and expose table-level operations on `workers`.
//! Exports: `Store`, `StoreState`, `BulkOptions`, `InsertReport`, `SEARCH_INDEX_NAME`.
//! Role: Leaf storage layer; the CLI opens one store per invocation and drives one operation.
//! Invariants: Schema and index creation are idempotent (create-if-absent).
//! Invariants: Data operations are only valid while the store is `Open`.
//! Invariants: `insert_one` commits per call; `insert_many` commits once per batch or chunk.
//! Invariants: Any index on `workers(sex, name)` counts as the search index, whatever its name.
//! Invariants: The backing file itself is flock'ed from `open` until `close` or drop.
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::core::error::{Error, ErrorKind, sqlite_error};
use crate::core::record::Worker;

pub const SEARCH_INDEX_NAME: &str = "speed_search";
const SEARCH_INDEX_COLUMNS: [&str; 2] = ["sex", "name"];

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS workers (
    name TEXT,
    dob TEXT,
    sex TEXT
)";
const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS speed_search ON workers(sex, name)";
const LIST_DISTINCT_SQL: &str =
    "SELECT DISTINCT name, dob, sex FROM workers ORDER BY name, dob, sex";
const SEARCH_BOUNDED_SQL: &str =
    "SELECT name, dob, sex FROM workers WHERE sex = ?1 AND name >= ?2 AND name < ?3";
const SEARCH_OPEN_ENDED_SQL: &str =
    "SELECT name, dob, sex FROM workers WHERE sex = ?1 AND name >= ?2";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreState {
    Unopened,
    Open,
    Closed,
}

/// Commit policy for bulk inserts. `chunk_rows: None` commits the whole
/// batch once; `Some(n)` commits every `n` rows so the journal stays bounded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BulkOptions {
    pub chunk_rows: Option<usize>,
}

impl BulkOptions {
    pub fn chunked(chunk_rows: usize) -> Self {
        Self {
            chunk_rows: Some(chunk_rows),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InsertReport {
    pub rows: u64,
    pub commits: u64,
}

// Fields drop in order: the connection closes before the lock handle.
struct Session {
    conn: Connection,
    _lock: SessionLock,
}

struct SessionLock {
    file: File,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub struct Store {
    path: PathBuf,
    state: StoreState,
    session: Option<Session>,
    commits: u64,
}

impl Store {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: StoreState::Unopened,
            session: None,
            commits: 0,
        }
    }

    /// Constructs and opens a store in one step.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut store = Self::new(path);
        store.open()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Data commits performed during this session.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn open(&mut self) -> Result<(), Error> {
        match self.state {
            StoreState::Open => return Ok(()),
            StoreState::Closed => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("store is closed")
                    .with_path(&self.path)
                    .with_hint("Construct a new store to open the file again."));
            }
            StoreState::Unopened => {}
        }

        let lock = acquire_session_lock(&self.path)?;
        let conn = Connection::open(&self.path).map_err(|err| {
            Error::new(ErrorKind::Connectivity)
                .with_message("failed to open store")
                .with_path(&self.path)
                .with_source(err)
        })?;
        ensure_schema(&conn).map_err(|err| err.with_path(&self.path))?;

        self.session = Some(Session { conn, _lock: lock });
        self.state = StoreState::Open;
        info!(path = %self.path.display(), "store opened");
        Ok(())
    }

    /// Releases the session. A no-op unless the store is open.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.state != StoreState::Open {
            return Ok(());
        }
        self.state = StoreState::Closed;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let Session { conn, _lock } = session;
        let result = conn.close().map_err(|(_, err)| {
            sqlite_error(err, ErrorKind::Io, "failed to close store").with_path(&self.path)
        });
        info!(path = %self.path.display(), commits = self.commits, "store closed");
        result
    }

    pub fn insert_one(&mut self, worker: &Worker) -> Result<(), Error> {
        let conn = self.conn_mut()?;
        let tx = begin_write(conn)?;
        worker.persist(&tx)?;
        commit(tx)?;
        self.commits += 1;
        debug!(name = %worker.name, "inserted worker");
        Ok(())
    }

    pub fn insert_many<I>(&mut self, workers: I) -> Result<InsertReport, Error>
    where
        I: IntoIterator<Item = Worker>,
    {
        self.insert_many_with(workers, BulkOptions::default())
    }

    /// Streams `workers` into the table. Rows are never committed one by
    /// one; on failure the chunk in flight rolls back and earlier chunks
    /// stay committed.
    pub fn insert_many_with<I>(
        &mut self,
        workers: I,
        options: BulkOptions,
    ) -> Result<InsertReport, Error>
    where
        I: IntoIterator<Item = Worker>,
    {
        let chunk_rows = options.chunk_rows.filter(|rows| *rows > 0);
        let mut report = InsertReport::default();
        let result = {
            let conn = self.conn_mut()?;
            bulk_insert(conn, workers, chunk_rows, &mut report)
        };
        self.commits += report.commits;
        result?;

        info!(rows = report.rows, commits = report.commits, "bulk insert committed");
        Ok(report)
    }

    /// Unique (name, dob, sex) triples ordered by name in byte order.
    pub fn list_distinct(&self) -> Result<Vec<Worker>, Error> {
        let conn = self.conn()?;
        let workers = query_workers(conn, LIST_DISTINCT_SQL, [])?;
        debug!(count = workers.len(), "listed distinct workers");
        Ok(workers)
    }

    /// Rows whose `sex` equals `sex` and whose `name` starts with `prefix`.
    /// Matching is case-sensitive; result order is unspecified.
    pub fn find_by_sex_and_name_prefix(
        &self,
        sex: &str,
        prefix: &str,
    ) -> Result<Vec<Worker>, Error> {
        let conn = self.conn()?;
        let workers = match prefix_upper_bound(prefix) {
            Some(upper) => query_workers(conn, SEARCH_BOUNDED_SQL, (sex, prefix, upper.as_str()))?,
            None => query_workers(conn, SEARCH_OPEN_ENDED_SQL, (sex, prefix))?,
        };
        debug!(sex, prefix, count = workers.len(), "searched workers");
        Ok(workers)
    }

    /// Query-plan detail lines the engine reports for the prefix search.
    pub fn search_plan(&self, sex: &str, prefix: &str) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        match prefix_upper_bound(prefix) {
            Some(upper) => explain(conn, SEARCH_BOUNDED_SQL, (sex, prefix, upper.as_str())),
            None => explain(conn, SEARCH_OPEN_ENDED_SQL, (sex, prefix)),
        }
    }

    /// Creates the composite (sex, name) index unless an index on those
    /// columns already exists. Returns whether this call created it.
    pub fn ensure_search_index(&mut self) -> Result<bool, Error> {
        if let Some(existing) = self.search_index_name()? {
            debug!(index = %existing, "search index already present");
            return Ok(false);
        }
        let conn = self.conn()?;
        conn.execute(CREATE_INDEX_SQL, [])
            .map_err(|err| sqlite_error(err, ErrorKind::Schema, "failed to create search index"))?;
        info!(index = SEARCH_INDEX_NAME, "search index created");
        Ok(true)
    }

    pub fn has_search_index(&self) -> Result<bool, Error> {
        Ok(self.search_index_name()?.is_some())
    }

    /// Name of the first full (non-partial) index whose key is exactly
    /// `(sex, name)`. Files written by other tools may use another name.
    pub fn search_index_name(&self) -> Result<Option<String>, Error> {
        let conn = self.conn()?;
        let schema_error = |err: rusqlite::Error| {
            sqlite_error(err, ErrorKind::Schema, "failed to read index metadata")
        };
        let mut list = conn
            .prepare("SELECT name FROM pragma_index_list('workers') WHERE partial = 0 ORDER BY name")
            .map_err(schema_error)?;
        let names = list
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(schema_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(schema_error)?;

        let mut info = conn
            .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
            .map_err(schema_error)?;
        for name in names {
            let columns = info
                .query_map([name.as_str()], |row| row.get::<_, Option<String>>(0))
                .map_err(schema_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(schema_error)?;
            let matches = columns.len() == SEARCH_INDEX_COLUMNS.len()
                && columns
                    .iter()
                    .zip(SEARCH_INDEX_COLUMNS)
                    .all(|(column, wanted)| column.as_deref() == Some(wanted));
            if matches {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    /// Names of the explicit indexes defined on `workers`.
    pub fn index_names(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = 'workers' AND sql IS NOT NULL
                 ORDER BY name",
            )
            .map_err(|err| sqlite_error(err, ErrorKind::Schema, "failed to read schema"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| sqlite_error(err, ErrorKind::Schema, "failed to read schema"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| sqlite_error(err, ErrorKind::Schema, "failed to read schema"))
    }

    /// Raw row count, duplicates included.
    pub fn row_count(&self) -> Result<u64, Error> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM workers", [], |row| row.get(0))
            .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to count workers"))?;
        Ok(count.max(0) as u64)
    }

    /// Rewrites the backing file to reclaim free pages. Blocks until done.
    pub fn compact(&mut self) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute_batch("VACUUM")
            .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to compact store"))?;
        info!(path = %self.path.display(), "store compacted");
        Ok(())
    }

    /// Deletes every row; schema and indexes stay in place.
    pub fn clear_table(&mut self) -> Result<u64, Error> {
        let conn = self.conn_mut()?;
        let tx = begin_write(conn)?;
        let removed = tx
            .execute("DELETE FROM workers", [])
            .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to clear workers"))?;
        commit(tx)?;
        self.commits += 1;
        info!(removed, "workers table cleared");
        Ok(removed as u64)
    }

    fn conn(&self) -> Result<&Connection, Error> {
        match &self.session {
            Some(session) if self.state == StoreState::Open => Ok(&session.conn),
            _ => Err(self.not_open()),
        }
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, Error> {
        if self.state != StoreState::Open {
            return Err(self.not_open());
        }
        let path = self.path.clone();
        match &mut self.session {
            Some(session) => Ok(&mut session.conn),
            None => Err(Error::new(ErrorKind::Internal)
                .with_message("open store has no session")
                .with_path(path)),
        }
    }

    fn not_open(&self) -> Error {
        Error::new(ErrorKind::Usage)
            .with_message(format!("store is not open ({:?})", self.state))
            .with_path(&self.path)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close store on drop");
        }
    }
}

fn ensure_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute(CREATE_TABLE_SQL, [])
        .map_err(|err| sqlite_error(err, ErrorKind::Schema, "failed to create workers table"))?;
    Ok(())
}

fn bulk_insert<I>(
    conn: &mut Connection,
    workers: I,
    chunk_rows: Option<usize>,
    report: &mut InsertReport,
) -> Result<(), Error>
where
    I: IntoIterator<Item = Worker>,
{
    let mut tx = begin_write(conn)?;
    let mut pending = 0usize;
    for worker in workers {
        worker.persist(&tx)?;
        report.rows += 1;
        pending += 1;
        if chunk_rows.is_some_and(|limit| pending >= limit) {
            commit(tx)?;
            report.commits += 1;
            debug!(rows = report.rows, "bulk insert chunk committed");
            tx = begin_write(conn)?;
            pending = 0;
        }
    }
    if pending > 0 || report.commits == 0 {
        commit(tx)?;
        report.commits += 1;
    }
    Ok(())
}

fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>, Error> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to begin transaction"))
}

fn commit(tx: Transaction<'_>) -> Result<(), Error> {
    tx.commit()
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to commit transaction"))
}

fn query_workers<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Worker>, Error> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to prepare query"))?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(Worker {
                name: row.get(0)?,
                dob: row.get(1)?,
                sex: row.get(2)?,
            })
        })
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to query workers"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to read worker row"))
}

fn explain<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>, Error> {
    let mut stmt = conn
        .prepare(&format!("EXPLAIN QUERY PLAN {sql}"))
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to prepare query plan"))?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, String>(3))
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to read query plan"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| sqlite_error(err, ErrorKind::Io, "failed to read query plan"))
}

/// Smallest string greater than every string that starts with `prefix`, or
/// `None` when no such bound exists (empty prefix or all chars at `char::MAX`).
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = next_char(last) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn next_char(c: char) -> Option<char> {
    let mut code = c as u32 + 1;
    if (0xD800..=0xDFFF).contains(&code) {
        code = 0xE000;
    }
    char::from_u32(code)
}

/// Opens the backing file (creating it empty if missing) and flocks it.
/// flock and SQLite's POSIX record locks are independent on Unix, so the
/// session lock never blocks the connection it guards. A file that can
/// only be read is locked through a read-only handle.
fn acquire_session_lock(path: &Path) -> Result<SessionLock, Error> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .or_else(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => OpenOptions::new().read(true).open(path),
            _ => Err(err),
        })
        .map_err(|err| {
            Error::new(ErrorKind::Connectivity)
                .with_message("failed to open store")
                .with_path(path)
                .with_source(err)
        })?;
    file.try_lock_exclusive().map_err(|err| {
        let kind = lock_error_kind(&err);
        let mut out = Error::new(kind)
            .with_message("failed to lock store")
            .with_path(path);
        if kind == ErrorKind::Busy {
            out = out.with_hint("Another staffdb process is using this file; retry when it exits.");
        }
        out.with_source(err)
    })?;
    Ok(SessionLock { file })
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BulkOptions, SEARCH_INDEX_NAME, Store, StoreState, lock_error_kind, prefix_upper_bound,
    };
    use crate::core::error::ErrorKind;
    use crate::core::record::Worker;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open_at(dir.path().join("staff.db")).expect("open store");
        (dir, store)
    }

    fn names(workers: &[Worker]) -> Vec<&str> {
        workers.iter().map(|worker| worker.name.as_str()).collect()
    }

    #[test]
    fn open_is_idempotent_across_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("staff.db");

        let mut first = Store::open_at(&path).expect("first open");
        first
            .insert_one(&Worker::new("Smith John Ivanovich", "1990-05-17", "Male"))
            .expect("insert");
        first.close().expect("close");

        let second = Store::open_at(&path).expect("second open");
        assert_eq!(second.row_count().expect("count"), 1);
        let tables: i64 = second
            .conn()
            .expect("conn")
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'workers'",
                [],
                |row| row.get(0),
            )
            .expect("tables");
        assert_eq!(tables, 1);
    }

    #[test]
    fn insert_one_round_trips_through_list_distinct() {
        let (_dir, mut store) = temp_store();
        store
            .insert_one(&Worker::new("Smith John Ivanovich", "1990-05-17", "Male"))
            .expect("insert");
        assert_eq!(store.commits(), 1);

        let listed = store.list_distinct().expect("list");
        assert_eq!(
            listed,
            vec![Worker::new("Smith John Ivanovich", "1990-05-17", "Male")]
        );
    }

    #[test]
    fn duplicates_collapse_in_listing_but_not_in_storage() {
        let (_dir, mut store) = temp_store();
        let worker = Worker::new("Jones David Petrovich", "1975-02-28", "Female");
        store
            .insert_many(vec![worker.clone(), worker.clone()])
            .expect("insert many");

        assert_eq!(store.list_distinct().expect("list"), vec![worker]);
        assert_eq!(store.row_count().expect("count"), 2);
    }

    #[test]
    fn listing_orders_by_name_bytewise() {
        let (_dir, mut store) = temp_store();
        store
            .insert_many(vec![
                Worker::new("Brown", "1980-01-01", "Male"),
                Worker::new("adams", "1980-01-01", "Male"),
                Worker::new("Adams", "1980-01-01", "Male"),
                Worker::new("Curtis", "1980-01-01", "Female"),
            ])
            .expect("insert many");

        let listed = store.list_distinct().expect("list");
        assert_eq!(names(&listed), vec!["Adams", "Brown", "Curtis", "adams"]);
    }

    #[test]
    fn prefix_search_filters_on_sex_and_case_sensitive_prefix() {
        let (_dir, mut store) = temp_store();
        store
            .insert_many(vec![
                Worker::new("Fox James X", "1970-03-03", "Male"),
                Worker::new("Foxtrot Y", "1971-04-04", "Female"),
                Worker::new("Amos Z", "1972-05-05", "Male"),
                Worker::new("fox lower", "1973-06-06", "Male"),
                Worker::new("Gable F", "1974-07-07", "Male"),
            ])
            .expect("insert many");

        let found = store.find_by_sex_and_name_prefix("Male", "F").expect("find");
        assert_eq!(names(&found), vec!["Fox James X"]);

        let none = store.find_by_sex_and_name_prefix("male", "F").expect("find");
        assert!(none.is_empty());

        let all_male = store.find_by_sex_and_name_prefix("Male", "").expect("find");
        assert_eq!(all_male.len(), 4);
    }

    #[test]
    fn search_index_is_idempotent_and_preserves_results() {
        let (_dir, mut store) = temp_store();
        store
            .insert_many(vec![
                Worker::new("Fox James X", "1970-03-03", "Male"),
                Worker::new("Field Fred Y", "1980-03-03", "Male"),
                Worker::new("Foxtrot Y", "1971-04-04", "Female"),
                Worker::new("Amos Z", "1972-05-05", "Male"),
            ])
            .expect("insert many");

        let mut before = store.find_by_sex_and_name_prefix("Male", "F").expect("before");
        before.sort_by(|a, b| a.name.cmp(&b.name));

        assert!(!store.has_search_index().expect("has index"));
        assert!(store.ensure_search_index().expect("first ensure"));
        assert!(!store.ensure_search_index().expect("second ensure"));
        assert_eq!(
            store.index_names().expect("indexes"),
            vec![SEARCH_INDEX_NAME.to_string()]
        );

        let mut after = store.find_by_sex_and_name_prefix("Male", "F").expect("after");
        after.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(before, after);

        let plan = store.search_plan("Male", "F").expect("plan").join("\n");
        assert!(plan.contains(SEARCH_INDEX_NAME), "plan: {plan}");
    }

    #[test]
    fn clear_table_empties_rows_and_keeps_schema() {
        let (_dir, mut store) = temp_store();
        store
            .insert_many(vec![
                Worker::new("Brown", "1980-01-01", "Male"),
                Worker::new("Adams", "1980-01-01", "Male"),
            ])
            .expect("insert many");
        store.ensure_search_index().expect("index");

        assert_eq!(store.clear_table().expect("clear"), 2);
        assert!(store.list_distinct().expect("list").is_empty());
        assert_eq!(store.clear_table().expect("clear again"), 0);
        assert!(store.has_search_index().expect("has index"));

        store
            .insert_one(&Worker::new("Curtis", "1980-01-01", "Female"))
            .expect("insert after clear");
        assert_eq!(store.row_count().expect("count"), 1);
        store.compact().expect("compact");
        assert_eq!(store.row_count().expect("count"), 1);
    }

    #[test]
    fn existing_sex_name_index_under_another_name_is_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("staff.db");
        {
            let conn = rusqlite::Connection::open(&path).expect("raw open");
            conn.execute_batch(
                "CREATE TABLE workers (name TEXT, dob TEXT, sex TEXT);
                 CREATE INDEX workers_by_sex_name ON workers(sex, name);
                 CREATE INDEX workers_by_name ON workers(name);",
            )
            .expect("legacy schema");
        }

        let mut store = Store::open_at(&path).expect("open");
        assert_eq!(
            store.search_index_name().expect("lookup").as_deref(),
            Some("workers_by_sex_name")
        );
        assert!(!store.ensure_search_index().expect("first ensure"));
        assert!(!store.ensure_search_index().expect("second ensure"));
        assert_eq!(
            store.index_names().expect("indexes"),
            vec!["workers_by_name".to_string(), "workers_by_sex_name".to_string()]
        );
    }

    #[test]
    fn name_first_index_does_not_count_as_search_index() {
        let (_dir, mut store) = temp_store();
        store
            .conn()
            .expect("conn")
            .execute("CREATE INDEX workers_name_sex ON workers(name, sex)", [])
            .expect("reversed index");

        assert!(!store.has_search_index().expect("has index"));
        assert!(store.ensure_search_index().expect("ensure"));
        assert_eq!(
            store.search_index_name().expect("lookup").as_deref(),
            Some(SEARCH_INDEX_NAME)
        );
    }

    #[test]
    fn compact_shrinks_the_file_after_clear() {
        let (dir, mut store) = temp_store();
        let path = dir.path().join("staff.db");
        let batch = (0..20_000).map(|i| {
            Worker::new(format!("Williams Michael Dmitrievich {i:05}"), "1990-01-01", "Male")
        });
        store.insert_many(batch).expect("insert many");
        store.clear_table().expect("clear");

        let before = std::fs::metadata(&path).expect("metadata").len();
        store.compact().expect("compact");
        let after = std::fs::metadata(&path).expect("metadata").len();
        assert!(after < before / 4, "before {before} bytes, after {after} bytes");
        assert_eq!(store.row_count().expect("count"), 0);
    }

    #[test]
    fn session_leaves_only_the_database_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("staff.db");
        let mut store = Store::open_at(&path).expect("open");
        store
            .insert_one(&Worker::new("Smith John Ivanovich", "1990-05-17", "Male"))
            .expect("insert");
        store.close().expect("close");

        let entries: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["staff.db".to_string()]);
    }

    #[test]
    fn bulk_insert_commits_once_for_any_batch_size() {
        let (_dir, mut store) = temp_store();
        let batch = (0..5_000).map(|i| Worker::new(format!("Worker {i:05}"), "1990-01-01", "Male"));

        let report = store.insert_many(batch).expect("insert many");
        assert_eq!(report.rows, 5_000);
        assert_eq!(report.commits, 1);
        assert_eq!(store.commits(), 1);
        assert_eq!(store.row_count().expect("count"), 5_000);
    }

    #[test]
    fn chunked_bulk_insert_commits_per_chunk() {
        let (_dir, mut store) = temp_store();
        let batch = (0..1_000).map(|i| Worker::new(format!("Worker {i:04}"), "1990-01-01", "Female"));

        let report = store
            .insert_many_with(batch, BulkOptions::chunked(250))
            .expect("insert many");
        assert_eq!(report.rows, 1_000);
        assert_eq!(report.commits, 4);
        assert_eq!(store.row_count().expect("count"), 1_000);

        let empty = store.insert_many(Vec::new()).expect("empty batch");
        assert_eq!(empty, super::InsertReport { rows: 0, commits: 1 });
    }

    #[test]
    fn operations_require_open_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = Store::new(dir.path().join("staff.db"));
        assert_eq!(store.state(), StoreState::Unopened);
        store.close().expect("close unopened is a no-op");

        let err = store.list_distinct().expect_err("unopened");
        assert_eq!(err.kind(), ErrorKind::Usage);

        store.open().expect("open");
        assert_eq!(store.state(), StoreState::Open);
        store.close().expect("close");
        store.close().expect("second close is a no-op");
        assert_eq!(store.state(), StoreState::Closed);

        let err = store.row_count().expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = store.open().expect_err("reopen after close");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn second_session_on_same_file_is_busy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("staff.db");

        let first = Store::open_at(&path).expect("first");
        let err = match Store::open_at(&path) {
            Ok(_) => panic!("expected busy error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Busy);

        drop(first);
        Store::open_at(&path).expect("open after drop");
    }

    #[test]
    fn unopenable_path_is_a_connectivity_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("staff.db");
        let err = match Store::open_at(&path) {
            Ok(_) => panic!("expected connectivity error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn non_database_file_is_a_schema_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("staff.db");
        std::fs::write(&path, vec![0x42u8; 4096]).expect("write junk");
        let err = match Store::open_at(&path) {
            Ok(_) => panic!("expected schema error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn prefix_upper_bound_increments_last_char() {
        assert_eq!(prefix_upper_bound("F").as_deref(), Some("G"));
        assert_eq!(prefix_upper_bound("Fo").as_deref(), Some("Fp"));
        assert_eq!(prefix_upper_bound(""), None);
        assert_eq!(
            prefix_upper_bound("a\u{10FFFF}").as_deref(),
            Some("b")
        );
        assert_eq!(prefix_upper_bound("\u{D7FF}").as_deref(), Some("\u{E000}"));
    }

    #[test]
    fn lock_errors_map_to_expected_kinds() {
        let err = std::io::Error::from_raw_os_error(libc::EWOULDBLOCK);
        assert_eq!(lock_error_kind(&err), ErrorKind::Busy);

        let err = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(lock_error_kind(&err), ErrorKind::Permission);

        let err = std::io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(lock_error_kind(&err), ErrorKind::Io);
    }
}
