use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Role, User};
use crate::db::{from_millis, now_millis};

/// Column list for [`user_from_row`]; queries alias `users` as `u`.
pub const USER_COLUMNS: &str = "u.id, u.email, u.username, u.password_hash, u.role, \
     u.display_name, u.avatar_url, u.school, u.created_at";

/// Reads a [`User`] whose columns start at `offset`.
pub fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        email: row.get(offset + 1)?,
        username: row.get(offset + 2)?,
        password_hash: row.get(offset + 3)?,
        role: row.get(offset + 4)?,
        display_name: row.get(offset + 5)?,
        avatar_url: row.get(offset + 6)?,
        school: row.get(offset + 7)?,
        created_at: from_millis(row.get(offset + 8)?),
    })
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub school: Option<String>,
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
        params![id],
        |row| user_from_row(row, 0),
    )
    .optional()
}

/// Finds a user whose email or username equals `login`.
pub fn find_by_login(conn: &Connection, login: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.email = ?1 OR u.username = ?1
             ORDER BY u.email = ?1 DESC LIMIT 1"
        ),
        params![login],
        |row| user_from_row(row, 0),
    )
    .optional()
}

/// Returns the first user clashing with either identifier.
pub fn find_conflict(
    conn: &Connection,
    email: &str,
    username: &str,
) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.email = ?1 OR u.username = ?2 LIMIT 1"
        ),
        params![email, username],
        |row| user_from_row(row, 0),
    )
    .optional()
}

pub fn insert(conn: &Connection, new: &NewUser<'_>) -> rusqlite::Result<User> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_millis();
    conn.execute(
        "INSERT INTO users (id, email, username, password_hash, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![id, new.email, new.username, new.password_hash, Role::User, now],
    )?;

    Ok(User {
        id,
        email: new.email.to_string(),
        username: new.username.to_string(),
        password_hash: new.password_hash.to_string(),
        role: Role::User,
        display_name: None,
        avatar_url: None,
        school: None,
        created_at: from_millis(now),
    })
}

/// Applies the provided profile fields; `None` leaves a field untouched.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    update: &ProfileUpdate,
) -> rusqlite::Result<Option<User>> {
    conn.execute(
        "UPDATE users SET
           display_name = COALESCE(?1, display_name),
           avatar_url = COALESCE(?2, avatar_url),
           school = COALESCE(?3, school),
           updated_at = ?4
         WHERE id = ?5",
        params![
            update.display_name,
            update.avatar_url,
            update.school,
            now_millis(),
            id
        ],
    )?;
    find_by_id(conn, id)
}

pub fn set_role(conn: &Connection, id: &str, role: Role) -> rusqlite::Result<Option<User>> {
    let changed = conn.execute(
        "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
        params![role, now_millis(), id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    find_by_id(conn, id)
}
