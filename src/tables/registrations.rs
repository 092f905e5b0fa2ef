use std::fmt::{Display, Formatter};
use std::str::FromStr;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult, RuleError};
use crate::rules::runs::ConventionGate;
use crate::tables::convention_registrations::{find_event_registration, ConventionRegistrationStatus};
use crate::tables::runs::{load_run_context, RunId};
use crate::tables::users::UserId;

pub type RegistrationId = i64;

#[derive(Serialize, Deserialize, sqlx::Type, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Waitlist,
}
impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Waitlist => "waitlist",
        }
    }
    /// Pending registrations hold their slot while the master decides.
    pub fn reserves_slot(self) -> bool {
        matches!(self, RegistrationStatus::Pending | RegistrationStatus::Confirmed)
    }
}
impl Display for RegistrationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for RegistrationStatus {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "waitlist" => Ok(RegistrationStatus::Waitlist),
            _ => Err(RuleError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, sqlx::Type, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RolePreference {
    #[default]
    Any,
    Female,
    Male,
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug, PartialEq)]
pub struct RegistrationRecord {
    pub id: RegistrationId,
    pub run_id: RunId,
    pub user_id: UserId,
    pub role_preference: RolePreference,
    pub is_technician: bool,
    pub status: RegistrationStatus,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub role_preference: RolePreference,
    #[serde(default)]
    pub is_technician: bool,
    #[serde(default)]
    pub comment: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationChangeKind {
    Created,
    StatusChanged,
    Removed,
    Promoted,
}

/// One entry of the per-run registration change feed.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationChange {
    pub kind: RegistrationChangeKind,
    pub registration: RegistrationRecord,
}
impl RegistrationChange {
    pub fn new(kind: RegistrationChangeKind, registration: &RegistrationRecord) -> Self {
        Self { kind, registration: registration.clone() }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UnregisterOutcome {
    pub removed: RegistrationRecord,
    pub promoted: Option<RegistrationRecord>,
}

pub async fn list_run_registrations(conn: &mut SqliteConnection, run_id: RunId) -> AppResult<Vec<RegistrationRecord>> {
    Ok(sqlx::query_as::<_, RegistrationRecord>("SELECT * FROM registrations WHERE run_id=? ORDER BY created_at, id")
        .bind(run_id)
        .fetch_all(&mut *conn)
        .await?)
}

async fn convention_gate(conn: &mut SqliteConnection, event_id: Option<i64>, user_id: UserId) -> AppResult<ConventionGate> {
    let Some(event_id) = event_id else {
        return Ok(ConventionGate::NotRequired);
    };
    let registration = find_event_registration(conn, event_id, user_id).await?;
    Ok(match registration {
        Some(reg) if reg.status == ConventionRegistrationStatus::Confirmed => ConventionGate::Confirmed,
        _ => ConventionGate::NotConfirmed,
    })
}

/// Signs `user_id` up for the run. The caller is expected to pass a transaction.
pub async fn attempt_register(conn: &mut SqliteConnection, run_id: RunId, user_id: UserId, request: &RegistrationRequest) -> AppResult<RegistrationRecord> {
    let ctx = load_run_context(conn, run_id).await?;
    let gate = convention_gate(conn, ctx.run.convention_event_id, user_id).await?;
    let status = ctx.state().admit(user_id, request.is_technician, gate)?;
    let registration = sqlx::query_as::<_, RegistrationRecord>("INSERT INTO registrations \
            (run_id, user_id, role_preference, is_technician, status, comment, created_at) \
            VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *")
        .bind(run_id)
        .bind(user_id)
        .bind(request.role_preference)
        .bind(request.is_technician)
        .bind(status)
        .bind(&request.comment)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
    info!("Run id: {run_id}, user id: {user_id} registered with status: {status}");
    Ok(registration)
}

/// Removes the user's registration and, when a confirmed player slot was freed, moves the head of the waitlist to pending.
pub async fn unregister(conn: &mut SqliteConnection, run_id: RunId, user_id: UserId) -> AppResult<UnregisterOutcome> {
    let ctx = load_run_context(conn, run_id).await?;
    let state = ctx.state();
    let removed = state.registration_of(user_id)?.clone();
    let promote_id = state.promotion_after_removal(&removed);
    sqlx::query("DELETE FROM registrations WHERE id=?")
        .bind(removed.id)
        .execute(&mut *conn)
        .await?;
    info!("Run id: {run_id}, user id: {user_id} unregistered, was: {}", removed.status);
    let promoted = match promote_id {
        Some(registration_id) => {
            let promoted = set_status(conn, registration_id, RegistrationStatus::Pending).await?;
            info!("Run id: {run_id}, registration id: {registration_id} promoted from waitlist");
            Some(promoted)
        }
        None => None,
    };
    Ok(UnregisterOutcome { removed, promoted })
}

async fn set_status(conn: &mut SqliteConnection, registration_id: RegistrationId, status: RegistrationStatus) -> AppResult<RegistrationRecord> {
    sqlx::query_as::<_, RegistrationRecord>("UPDATE registrations SET status=? WHERE id=? RETURNING *")
        .bind(status)
        .bind(registration_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Registration id={registration_id}")))
}

/// Master/staff decision on a registration. Never cascades to other registrations.
pub async fn update_registration_status(conn: &mut SqliteConnection, run_id: RunId, registration_id: RegistrationId, new_status: &str) -> AppResult<RegistrationRecord> {
    let status = RegistrationStatus::from_str(new_status)?;
    let belongs_to_run = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM registrations WHERE id=? AND run_id=?")
        .bind(registration_id)
        .bind(run_id)
        .fetch_one(&mut *conn)
        .await?.0 > 0;
    if !belongs_to_run {
        return Err(AppError::not_found(format!("Registration id={registration_id} of run id={run_id}")));
    }
    let registration = set_status(conn, registration_id, status).await?;
    info!("Run id: {run_id}, registration id: {registration_id} status set to: {status}");
    Ok(registration)
}

#[test]
fn test_status_from_str() {
    assert_eq!(RegistrationStatus::from_str("waitlist"), Ok(RegistrationStatus::Waitlist));
    assert_eq!(RegistrationStatus::from_str("confirmed"), Ok(RegistrationStatus::Confirmed));
    assert_eq!(RegistrationStatus::from_str("rejected"), Err(RuleError::InvalidStatus("rejected".to_string())));
    assert_eq!(RegistrationStatus::from_str("Pending"), Err(RuleError::InvalidStatus("Pending".to_string())));
}

#[test]
fn test_request_defaults() {
    let request: RegistrationRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(request.role_preference, RolePreference::Any);
    assert!(!request.is_technician);
    let request: RegistrationRequest = serde_json::from_str(r#"{"role_preference": "female", "comment": "hi"}"#).unwrap();
    assert_eq!(request.role_preference, RolePreference::Female);
    assert_eq!(request.comment, "hi");
}
