use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            is_verified     INTEGER NOT NULL DEFAULT 0,
            otp_code        TEXT,
            otp_expires_at  TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One board per user, created lazily on first access.
        -- Patches are stored as a JSON array; the sequence is always
        -- replaced wholesale, never updated per-patch.
        CREATE TABLE IF NOT EXISTS boards (
            user_id     TEXT PRIMARY KEY REFERENCES users(id),
            image_url   TEXT NOT NULL DEFAULT '',
            patches     TEXT NOT NULL DEFAULT '[]',
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
