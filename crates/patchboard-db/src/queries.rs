use crate::Database;
use crate::models::{BoardRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    /// Insert a new account. Returns `false` when the email is already
    /// taken, so callers racing past an existence pre-check see a clean
    /// conflict instead of a constraint error.
    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        otp_code: &str,
        otp_expires_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password, otp_code, otp_expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, name, email, password_hash, otp_code, otp_expires_at],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Overwrite the pending OTP. Any previously issued code stops being
    /// valid the moment this lands.
    pub fn set_otp(&self, user_id: &str, code: &str, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_code = ?2, otp_expires_at = ?3 WHERE id = ?1",
                rusqlite::params![user_id, code, expires_at],
            )?;
            Ok(())
        })
    }

    /// Flip the account to verified and clear the OTP in one statement.
    pub fn mark_verified(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_verified = 1, otp_code = NULL, otp_expires_at = NULL
                 WHERE id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }

    // -- Boards --

    /// Fetch the user's board, creating an empty one on first access.
    pub fn get_or_create_board(&self, user_id: &str) -> Result<BoardRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO boards (user_id) VALUES (?1)",
                [user_id],
            )?;
            query_board(conn, user_id)
        })
    }

    /// Partial update: a `None` field leaves the stored value untouched, a
    /// `Some` field fully replaces it. Runs under the connection lock so the
    /// replace is atomic with respect to concurrent updates; whichever call
    /// takes the lock last wins.
    pub fn update_board(
        &self,
        user_id: &str,
        image_url: Option<&str>,
        patches_json: Option<&str>,
    ) -> Result<BoardRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO boards (user_id) VALUES (?1)",
                [user_id],
            )?;
            if let Some(url) = image_url {
                conn.execute(
                    "UPDATE boards SET image_url = ?2 WHERE user_id = ?1",
                    rusqlite::params![user_id, url],
                )?;
            }
            if let Some(patches) = patches_json {
                conn.execute(
                    "UPDATE boards SET patches = ?2 WHERE user_id = ?1",
                    rusqlite::params![user_id, patches],
                )?;
            }
            conn.execute(
                "UPDATE boards SET updated_at = datetime('now') WHERE user_id = ?1",
                [user_id],
            )?;
            query_board(conn, user_id)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is a compile-time constant from the callers above, never input.
    let sql = format!(
        "SELECT id, name, email, password, is_verified, otp_code, otp_expires_at, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                is_verified: row.get::<_, i64>(4)? != 0,
                otp_code: row.get(5)?,
                otp_expires_at: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_board(conn: &Connection, user_id: &str) -> Result<BoardRow> {
    let row = conn.query_row(
        "SELECT user_id, image_url, patches, updated_at FROM boards WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(BoardRow {
                user_id: row.get(0)?,
                image_url: row.get(1)?,
                patches: row.get(2)?,
                updated_at: row.get(3)?,
            })
        },
    )?;
    Ok(row)
}
