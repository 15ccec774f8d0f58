//! Relational schema (idempotent)
//!
//! Timestamps are INTEGER unix milliseconds. Absent riding/province on
//! `poll_turnout` are stored as '' so the composite key stays unique.

use rusqlite::Connection;

const CREATE_CONTACTS: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    account_id TEXT NOT NULL,
    id TEXT NOT NULL,
    first_name TEXT,
    last_name TEXT,
    name TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    city TEXT,
    province TEXT,
    postal_code TEXT,
    poll_number TEXT,
    riding TEXT,
    categories TEXT NOT NULL DEFAULT '[]',
    category TEXT,
    custom_fields TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER,
    deleted_at INTEGER,
    PRIMARY KEY (account_id, id)
);
CREATE INDEX IF NOT EXISTS idx_contacts_poll ON contacts(account_id, poll_number);
CREATE INDEX IF NOT EXISTS idx_contacts_created ON contacts(account_id, created_at DESC);
";

const CREATE_INTERACTIONS: &str = "
CREATE TABLE IF NOT EXISTS interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    contact_id TEXT NOT NULL,
    user_id TEXT,
    interaction_type TEXT NOT NULL,
    interaction_method TEXT NOT NULL,
    support_likelihood INTEGER CHECK (support_likelihood IS NULL OR support_likelihood BETWEEN 0 AND 100),
    notes TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interactions_contact ON interactions(account_id, contact_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_interactions_created ON interactions(account_id, created_at DESC);
CREATE TRIGGER IF NOT EXISTS interactions_no_update BEFORE UPDATE ON interactions
BEGIN
    SELECT RAISE(ABORT, 'interactions is append-only: updates are not allowed');
END;
CREATE TRIGGER IF NOT EXISTS interactions_no_delete BEFORE DELETE ON interactions
BEGIN
    SELECT RAISE(ABORT, 'interactions is append-only: deletes are not allowed');
END;
";

const CREATE_VOTE_MARKS: &str = "
CREATE TABLE IF NOT EXISTS vote_marks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    account_id TEXT NOT NULL,
    contact_id TEXT NOT NULL,
    poll_number TEXT NOT NULL,
    riding TEXT,
    province TEXT,
    marked_by TEXT,
    verification_code TEXT NOT NULL UNIQUE,
    notes TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    marked_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_vote_marks_poll ON vote_marks(account_id, poll_number, marked_at DESC);
CREATE TRIGGER IF NOT EXISTS vote_marks_no_update BEFORE UPDATE ON vote_marks
BEGIN
    SELECT RAISE(ABORT, 'vote_marks is immutable: updates are not allowed');
END;
CREATE TRIGGER IF NOT EXISTS vote_marks_no_delete BEFORE DELETE ON vote_marks
BEGIN
    SELECT RAISE(ABORT, 'vote_marks is immutable: deletes are not allowed');
END;
";

const CREATE_POLL_TURNOUT: &str = "
CREATE TABLE IF NOT EXISTS poll_turnout (
    account_id TEXT NOT NULL,
    poll_number TEXT NOT NULL,
    riding TEXT NOT NULL DEFAULT '',
    province TEXT NOT NULL DEFAULT '',
    total_voters INTEGER NOT NULL DEFAULT 0,
    votes_cast INTEGER NOT NULL DEFAULT 0,
    updated_by TEXT,
    last_updated_at INTEGER NOT NULL,
    UNIQUE (account_id, poll_number, riding, province)
);
";

const CREATE_ELECTION_LISTS: &str = "
CREATE TABLE IF NOT EXISTS election_lists (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    user_id TEXT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    filter_config TEXT NOT NULL,
    is_shared INTEGER NOT NULL DEFAULT 0,
    contact_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_election_lists_account ON election_lists(account_id, created_at DESC);
";

const CREATE_VOTED_TALLY: &str = "
CREATE TABLE IF NOT EXISTS voted_tally (
    account_id TEXT NOT NULL,
    contact_id TEXT NOT NULL,
    voted_at INTEGER NOT NULL,
    marked_by TEXT,
    UNIQUE (account_id, contact_id)
);
";

/// Create every table, index and trigger that does not exist yet
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    for (name, sql) in [
        ("contacts", CREATE_CONTACTS),
        ("interactions", CREATE_INTERACTIONS),
        ("vote_marks", CREATE_VOTE_MARKS),
        ("poll_turnout", CREATE_POLL_TURNOUT),
        ("election_lists", CREATE_ELECTION_LISTS),
        ("voted_tally", CREATE_VOTED_TALLY),
    ] {
        conn.execute_batch(sql)?;
        log::debug!("   ├─ schema ready: {}", name);
    }
    Ok(())
}
