//! Statement logging.
//!
//! Statements are logged at `trace`; with the `debug` connection flag they
//! are raised to `info` so they show up under a default subscriber.

use crate::result::ResultSet;

/// Log a statement about to be sent.
pub fn statement(debug: bool, origin: &'static str, sql: &str) {
    if debug {
        tracing::info!(origin, sql = %sql, "Executing statement");
    } else {
        tracing::trace!(origin, sql = %sql, "Executing statement");
    }
}

/// Log the summary of a finished statement.
pub fn outcome(debug: bool, origin: &'static str, sets: &[ResultSet]) {
    let rows: usize = sets.iter().map(|set| set.len()).sum();
    let affected: u64 = sets.iter().map(ResultSet::affected_rows).sum();
    if debug {
        tracing::info!(
            origin,
            result_sets = sets.len(),
            rows,
            affected,
            "Statement finished"
        );
    } else {
        tracing::trace!(
            origin,
            result_sets = sets.len(),
            rows,
            affected,
            "Statement finished"
        );
    }
}
