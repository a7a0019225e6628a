//! Persistent hash → filename index (SQLite via sqlx).
//!
//! An entry is proof that a verified copy of that content sits in the
//! complete store; uploads whose hash is indexed skip transfer entirely.

mod db;
mod entries;
mod import;

pub use db::HashIndex;
pub use entries::IndexEntry;
