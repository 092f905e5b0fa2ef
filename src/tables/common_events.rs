use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::datetime::{parse_naive_datetime, LocalDateTime};
use crate::error::{AppError, AppResult, RuleError};
use crate::rules::dates::check_within_event;
use crate::tables::conventions::{load_convention_event, ConventionEventId};
use crate::tables::places::{load_city, load_room, RoomId};

/// Programme item of a convention event that is not a game session: opening, lecture, party.
#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct CommonEventRecord {
    pub id: i64,
    pub convention_event_id: Option<ConventionEventId>,
    pub room_id: Option<RoomId>,
    pub title: String,
    pub description: String,
    pub date: LocalDateTime,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

fn default_duration() -> i64 { 60 }

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommonEventForm {
    pub convention_event_id: ConventionEventId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Local wall-clock time in the convention event's city.
    pub date: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
}

pub async fn list_common_events(conn: &mut SqliteConnection, convention_event_id: ConventionEventId) -> AppResult<Vec<CommonEventRecord>> {
    Ok(sqlx::query_as::<_, CommonEventRecord>("SELECT * FROM common_events WHERE convention_event_id=? ORDER BY date, id")
        .bind(convention_event_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn load_common_event(conn: &mut SqliteConnection, common_event_id: i64) -> AppResult<CommonEventRecord> {
    sqlx::query_as::<_, CommonEventRecord>("SELECT * FROM common_events WHERE id=?")
        .bind(common_event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Common event id={common_event_id}")))
}

pub async fn insert_common_event(conn: &mut SqliteConnection, form: &CommonEventForm) -> AppResult<CommonEventRecord> {
    if form.title.trim().is_empty() {
        return Err(RuleError::Invalid("Common event title must be set".to_string()).into());
    }
    if form.duration_minutes <= 0 {
        return Err(RuleError::Invalid("Common event duration must be positive".to_string()).into());
    }
    let event = load_convention_event(conn, form.convention_event_id).await?;
    let city = load_city(conn, event.city_id).await?;
    if let Some(room_id) = form.room_id {
        load_room(conn, room_id).await?;
    }
    let local = parse_naive_datetime(&form.date)
        .ok_or_else(|| RuleError::Invalid(format!("Unrecognized date-time string: {}", form.date)))?;
    let date = LocalDateTime::from_local_timezone(local, city.utc_offset_minutes)
        .ok_or_else(|| RuleError::Invalid(format!("Cannot resolve {} in city {}", form.date, city.name)))?;
    check_within_event(date.date_naive(), event.date_start, event.date_end)?;
    let common_event = sqlx::query_as::<_, CommonEventRecord>("INSERT INTO common_events \
            (convention_event_id, room_id, title, description, date, duration_minutes, created_at) \
            VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *")
        .bind(form.convention_event_id)
        .bind(form.room_id)
        .bind(form.title.trim())
        .bind(&form.description)
        .bind(date.to_iso_string())
        .bind(form.duration_minutes)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
    info!("Common event created, id: {}, title: {}", common_event.id, common_event.title);
    Ok(common_event)
}

pub async fn delete_common_event(conn: &mut SqliteConnection, common_event_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM common_events WHERE id=?")
        .bind(common_event_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
