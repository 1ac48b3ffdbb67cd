//! Concurrent RSS/Atom aggregation: fetch many feeds, normalize their
//! entries, drop duplicates, and merge them newest first.

pub mod config;
pub mod feed;
pub mod sources;
pub mod util;
