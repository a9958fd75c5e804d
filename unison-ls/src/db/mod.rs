//! Database access layer for unison-ls
//!
//! Schema creation lives in `unison_common::db`; the modules here hold the
//! per-entity queries.

pub mod lyrics;
pub mod reports;
pub mod voters;
pub mod votes;

pub use unison_common::db::init_database;
