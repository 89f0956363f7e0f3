use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        otp: &str,
        otp_expires_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, otp, otp_expires_at, otp_verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                rusqlite::params![id, username, email, password_hash, otp, otp_expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Overwrite the pending OTP for an unverified user (resend path).
    /// Last write wins for concurrent signups on the same email.
    pub fn set_otp(&self, email: &str, otp: &str, otp_expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp = ?2, otp_expires_at = ?3 WHERE email = ?1",
                rusqlite::params![email, otp, otp_expires_at],
            )?;
            Ok(())
        })
    }

    /// Mark a user verified and clear OTP state so the code cannot be replayed.
    pub fn mark_verified(&self, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp = NULL, otp_expires_at = NULL, otp_verified = 1 WHERE email = ?1",
                [email],
            )?;
            Ok(())
        })
    }

    /// All users except the given one, for the chat partner list.
    pub fn list_users_except(&self, id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, email, password, otp, otp_expires_at, otp_verified, created_at
                 FROM users WHERE id != ?1 ORDER BY username",
            )?;

            let rows = stmt
                .query_map([id], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        ciphertext: &[u8],
        nonce: &[u8],
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, ciphertext, nonce, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, sender_id, receiver_id, ciphertext, nonce, created_at],
            )?;
            Ok(())
        })
    }

    /// Fetch a page of the conversation between two users, matched as an
    /// unordered pair, newest first. `before` is a created_at cursor for
    /// older pages. Callers reverse the page to present ascending order.
    pub fn get_conversation(
        &self,
        user_id: &str,
        other_user_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation(conn, user_id, other_user_id, limit, before))
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always a fixed identifier supplied by this module.
    let sql = format!(
        "SELECT id, username, email, password, otp, otp_expires_at, otp_verified, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt.query_row([value], map_user_row).optional()?;

    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        otp: row.get(4)?,
        otp_expires_at: row.get(5)?,
        otp_verified: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_conversation(
    conn: &Connection,
    user_id: &str,
    other_user_id: &str,
    limit: u32,
    before: Option<&str>,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, ciphertext, nonce, created_at
         FROM messages
         WHERE ((sender_id = ?1 AND receiver_id = ?2)
             OR (sender_id = ?2 AND receiver_id = ?1))
           AND (?3 IS NULL OR created_at < ?3)
         ORDER BY created_at DESC, id DESC
         LIMIT ?4",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, other_user_id, before, limit], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                ciphertext: row.get(3)?,
                nonce: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
