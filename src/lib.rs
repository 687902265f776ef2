//! Financial news feed ingestion.
//!
//! Fetches a fixed set of publisher feeds, normalizes their items into one
//! canonical record shape, and stores each item exactly once per
//! `(source, guid)` in SQLite.

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
