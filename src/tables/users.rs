use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult};

pub type UserId = i64;

#[derive(Serialize, Deserialize, FromRow, Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

/// Users are provisioned on first sight of their identity; the staff flag follows the config.
pub async fn upsert_user(conn: &mut SqliteConnection, username: &str, email: Option<&str>, is_staff: bool) -> AppResult<UserRecord> {
    let user = sqlx::query_as::<_, UserRecord>(
        "INSERT INTO users (username, email, is_staff) VALUES (?, ?, ?) \
         ON CONFLICT(username) DO UPDATE SET \
            email = CASE WHEN excluded.email = '' THEN users.email ELSE excluded.email END, \
            is_staff = excluded.is_staff \
         RETURNING id, username, email, is_staff")
        .bind(username)
        .bind(email.unwrap_or_default())
        .bind(is_staff)
        .fetch_one(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn load_user(conn: &mut SqliteConnection, user_id: UserId) -> AppResult<UserRecord> {
    sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id=?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User id={user_id}")))
}

/// Members of one of the join relations (`run_masters`, `game_creators`, ...) keyed by `key_column`.
pub(crate) async fn load_members(conn: &mut SqliteConnection, table: &str, key_column: &str, key: i64) -> AppResult<Vec<UserId>> {
    let ids = sqlx::query_as::<_, (UserId,)>(&format!("SELECT user_id FROM {table} WHERE {key_column}=? ORDER BY user_id"))
        .bind(key)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();
    Ok(ids)
}

pub(crate) async fn add_member(conn: &mut SqliteConnection, table: &str, key_column: &str, key: i64, user_id: UserId) -> AppResult<()> {
    load_user(conn, user_id).await?;
    sqlx::query(&format!("INSERT OR IGNORE INTO {table} ({key_column}, user_id) VALUES (?, ?)"))
        .bind(key)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn remove_member(conn: &mut SqliteConnection, table: &str, key_column: &str, key: i64, user_id: UserId) -> AppResult<()> {
    let res = sqlx::query(&format!("DELETE FROM {table} WHERE {key_column}=? AND user_id=?"))
        .bind(key)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Member id={user_id} of {table}")));
    }
    Ok(())
}
