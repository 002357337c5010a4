// Core modules: record shape, the SQLite-backed store, and error modeling.
pub mod error;
pub mod record;
pub mod store;
