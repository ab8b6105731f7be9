use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::auth::users::{self, USER_COLUMNS};
use crate::db::models::{Session, User};
use crate::db::{from_millis, now_millis};

/// A freshly issued session. `token` is the raw cookie value and is never stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// Create a new session for a user, persisting only the token hash.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    ttl: chrono::Duration,
) -> Result<IssuedSession, rusqlite::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_millis();
    let expires_at = now + ttl.num_milliseconds();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, token_hash, expires_at, now],
    )?;

    Ok(IssuedSession {
        token,
        session: Session {
            id,
            user_id: user_id.to_string(),
            token_hash,
            expires_at: from_millis(expires_at),
        },
    })
}

/// Look up the session for a raw token. Unknown or expired tokens yield `None`.
pub fn resolve_session(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<(Session, User)>, rusqlite::Error> {
    let token_hash = hash_token(token);
    let sql = format!(
        "SELECT s.id, s.user_id, s.token_hash, s.expires_at, {USER_COLUMNS}
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ?1"
    );

    let found = conn
        .query_row(&sql, params![token_hash], |row| {
            let session = Session {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token_hash: row.get(2)?,
                expires_at: from_millis(row.get(3)?),
            };
            let user = users::user_from_row(row, 4)?;
            Ok((session, user))
        })
        .optional()?;

    Ok(found.filter(|(session, _)| !session.is_expired(now)))
}

/// Delete a session by id.
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// SHA-256 of the raw token, hex encoded. This is the only form persisted.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
