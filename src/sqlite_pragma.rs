//! Shared SQLite tuning applied to every relational connection

use rusqlite::Connection;

/// Apply WAL + tuned PRAGMAs
///
/// - `journal_mode = WAL` so readers never block the single writer
/// - `synchronous = NORMAL` (safe with WAL)
/// - `temp_store = MEMORY`
/// - `mmap_size` 256MB, `cache_size` ~64MB
/// - `wal_autocheckpoint = 1000` pages
/// - `foreign_keys = ON`
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns the resulting mode as a row
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        log::debug!("SQLite journal_mode is '{}' (WAL unavailable for this database)", mode);
    }

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 268_435_456i64)?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1000i64)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}
