//! SQL schema of the identity database.

/// Executed on every start-up; idempotent thanks to `IF NOT EXISTS`.
///
/// Usernames are case-insensitive on Telegram, hence `COLLATE NOCASE` on the key.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    handle      TEXT PRIMARY KEY NOT NULL COLLATE NOCASE,
    chat_id     INTEGER NOT NULL,
    first_name  TEXT,
    last_name   TEXT
);
";
