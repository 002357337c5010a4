//! Purpose: Library crate behind the `staffdb` CLI and its tests.
//! Exports: `core` (records, store, errors), `age`, `synth`.
//! Role: Persistence and query core plus the pure collaborators the CLI composes.
//! Invariants: The store is the only module that touches the backing file.
//! Invariants: Modules take explicit handles; there is no ambient session state.
pub mod age;
pub mod core;
pub mod synth;
