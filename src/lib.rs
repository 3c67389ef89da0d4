#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod backup_opts;
pub mod config;
pub mod copy_tool;
pub mod credentials;
pub mod error;
pub mod naming;
pub mod storage;

use time::OffsetDateTime;

/// Wall clock time used to stamp every destination container of a run.
///
/// Falls back to UTC when the local offset can't be determined (e.g. once
/// other threads are running).
#[must_use]
pub fn run_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
