use std::fmt::{Display, Formatter};
use std::str::FromStr;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult, RuleError};
use crate::tables::conventions::{load_convention_event_context, ConventionEventId};
use crate::tables::users::UserId;

#[derive(Serialize, Deserialize, sqlx::Type, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ConventionRegistrationStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}
impl Display for ConventionRegistrationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConventionRegistrationStatus::Pending => "pending",
            ConventionRegistrationStatus::Confirmed => "confirmed",
            ConventionRegistrationStatus::Rejected => "rejected",
            ConventionRegistrationStatus::Cancelled => "cancelled",
        })
    }
}
impl FromStr for ConventionRegistrationStatus {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConventionRegistrationStatus::Pending),
            "confirmed" => Ok(ConventionRegistrationStatus::Confirmed),
            "rejected" => Ok(ConventionRegistrationStatus::Rejected),
            "cancelled" => Ok(ConventionRegistrationStatus::Cancelled),
            _ => Err(RuleError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug, PartialEq)]
pub struct ConventionEventRegistrationRecord {
    pub id: i64,
    pub event_id: ConventionEventId,
    pub user_id: UserId,
    pub status: ConventionRegistrationStatus,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct ConventionRegistrationRequest {
    #[serde(default)]
    pub comment: String,
}

pub async fn list_event_registrations(conn: &mut SqliteConnection, event_id: ConventionEventId) -> AppResult<Vec<ConventionEventRegistrationRecord>> {
    Ok(sqlx::query_as::<_, ConventionEventRegistrationRecord>("SELECT * FROM convention_event_registrations WHERE event_id=? ORDER BY created_at, id")
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn find_event_registration(conn: &mut SqliteConnection, event_id: ConventionEventId, user_id: UserId) -> AppResult<Option<ConventionEventRegistrationRecord>> {
    Ok(sqlx::query_as::<_, ConventionEventRegistrationRecord>("SELECT * FROM convention_event_registrations WHERE event_id=? AND user_id=?")
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn register_for_event(conn: &mut SqliteConnection, event_id: ConventionEventId, user_id: UserId, request: &ConventionRegistrationRequest) -> AppResult<ConventionEventRegistrationRecord> {
    let ctx = load_convention_event_context(conn, event_id).await?;
    let status = ctx.state().admit(user_id)?;
    let registration = sqlx::query_as::<_, ConventionEventRegistrationRecord>("INSERT INTO convention_event_registrations \
            (event_id, user_id, status, comment, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *")
        .bind(event_id)
        .bind(user_id)
        .bind(status)
        .bind(&request.comment)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
    info!("Convention event id: {event_id}, user id: {user_id} registered with status: {status}");
    Ok(registration)
}

pub async fn unregister_from_event(conn: &mut SqliteConnection, event_id: ConventionEventId, user_id: UserId) -> AppResult<ConventionEventRegistrationRecord> {
    let ctx = load_convention_event_context(conn, event_id).await?;
    let removed = ctx.state().registration_of(user_id)?.clone();
    sqlx::query("DELETE FROM convention_event_registrations WHERE id=?")
        .bind(removed.id)
        .execute(&mut *conn)
        .await?;
    info!("Convention event id: {event_id}, user id: {user_id} unregistered, was: {}", removed.status);
    Ok(removed)
}

pub async fn update_event_registration_status(conn: &mut SqliteConnection, event_id: ConventionEventId, registration_id: i64, new_status: &str) -> AppResult<ConventionEventRegistrationRecord> {
    let status = ConventionRegistrationStatus::from_str(new_status)?;
    let ctx = load_convention_event_context(conn, event_id).await?;
    let state = ctx.state();
    let registration = ctx.registrations.iter()
        .find(|r| r.id == registration_id)
        .ok_or_else(|| AppError::not_found(format!("Registration id={registration_id} of convention event id={event_id}")))?;
    state.check_status_change(registration, status)?;
    let registration = sqlx::query_as::<_, ConventionEventRegistrationRecord>("UPDATE convention_event_registrations SET status=? WHERE id=? RETURNING *")
        .bind(status)
        .bind(registration_id)
        .fetch_one(&mut *conn)
        .await?;
    info!("Convention event id: {event_id}, registration id: {registration_id} status set to: {status}");
    Ok(registration)
}

#[test]
fn test_status_from_str() {
    assert_eq!(ConventionRegistrationStatus::from_str("rejected"), Ok(ConventionRegistrationStatus::Rejected));
    assert_eq!(ConventionRegistrationStatus::from_str("waitlist"), Err(RuleError::InvalidStatus("waitlist".to_string())));
    assert_eq!(ConventionRegistrationStatus::Confirmed.to_string(), "confirmed");
}
