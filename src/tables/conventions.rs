use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult, RuleError};
use crate::rules::conventions::ConventionEventState;
use crate::datetime::LocalDateTime;
use crate::rules::dates::{check_date_range, check_within_event};
use crate::tables::convention_registrations::{list_event_registrations, ConventionEventRegistrationRecord};
use crate::tables::places::{load_city, load_venue, CityId, VenueId};
use crate::tables::users::{add_member, load_members, UserId};

pub type ConventionId = i64;
pub type ConventionEventId = i64;

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct ConventionRecord {
    pub id: ConventionId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConventionForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct ConventionLinkRecord {
    pub id: i64,
    pub convention_id: ConventionId,
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConventionLinkForm {
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct ConventionEventRecord {
    pub id: ConventionEventId,
    pub convention_id: ConventionId,
    pub city_id: CityId,
    pub venue_id: Option<VenueId>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub registration_open: bool,
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConventionEventForm {
    pub convention_id: ConventionId,
    pub city_id: CityId,
    #[serde(default)]
    pub venue_id: Option<VenueId>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    #[serde(default = "default_true")]
    pub registration_open: bool,
    #[serde(default)]
    pub capacity: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConventionEventSummary {
    #[serde(flatten)]
    pub event: ConventionEventRecord,
    pub convention_name: String,
    pub organizers: Vec<UserId>,
    pub confirmed_count: i64,
    pub available_slots: Option<i64>,
    pub unlimited: bool,
}

pub struct ConventionEventContext {
    pub event: ConventionEventRecord,
    pub convention_name: String,
    pub organizers: Vec<UserId>,
    pub convention_organizers: Vec<UserId>,
    pub registrations: Vec<ConventionEventRegistrationRecord>,
}
impl ConventionEventContext {
    pub fn state(&self) -> ConventionEventState<'_> {
        ConventionEventState {
            registration_open: self.event.registration_open,
            capacity: self.event.capacity,
            registrations: &self.registrations,
        }
    }
    pub fn summary(&self) -> ConventionEventSummary {
        let state = self.state();
        ConventionEventSummary {
            event: self.event.clone(),
            convention_name: self.convention_name.clone(),
            organizers: self.organizers.clone(),
            confirmed_count: state.confirmed_count(),
            available_slots: state.available_slots(),
            unlimited: self.event.capacity.is_none(),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct InheritOrganizersReport {
    pub updated: Vec<ConventionEventId>,
    pub skipped: Vec<ConventionEventId>,
    pub dry_run: bool,
}

pub async fn load_convention(conn: &mut SqliteConnection, convention_id: ConventionId) -> AppResult<ConventionRecord> {
    sqlx::query_as::<_, ConventionRecord>("SELECT * FROM conventions WHERE id=?")
        .bind(convention_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Convention id={convention_id}")))
}

pub async fn list_conventions(conn: &mut SqliteConnection) -> AppResult<Vec<ConventionRecord>> {
    Ok(sqlx::query_as::<_, ConventionRecord>("SELECT * FROM conventions ORDER BY name")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn load_convention_organizers(conn: &mut SqliteConnection, convention_id: ConventionId) -> AppResult<Vec<UserId>> {
    load_members(conn, "convention_organizers", "convention_id", convention_id).await
}

pub async fn save_convention(conn: &mut SqliteConnection, convention_id: Option<ConventionId>, form: &ConventionForm, creator: UserId) -> AppResult<ConventionRecord> {
    if form.name.trim().is_empty() {
        return Err(RuleError::Invalid("Convention name must be set".to_string()).into());
    }
    let convention = if let Some(convention_id) = convention_id {
        sqlx::query_as::<_, ConventionRecord>("UPDATE conventions SET name=?, description=? WHERE id=? RETURNING *")
            .bind(form.name.trim())
            .bind(&form.description)
            .bind(convention_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Convention id={convention_id}")))?
    } else {
        let convention = sqlx::query_as::<_, ConventionRecord>("INSERT INTO conventions (name, description, created_at) VALUES (?, ?, ?) RETURNING *")
            .bind(form.name.trim())
            .bind(&form.description)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        add_member(conn, "convention_organizers", "convention_id", convention.id, creator).await?;
        info!("Convention created, id: {}, name: {}", convention.id, convention.name);
        convention
    };
    Ok(convention)
}

pub async fn delete_convention(conn: &mut SqliteConnection, convention_id: ConventionId) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM conventions WHERE id=?")
        .bind(convention_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Convention id={convention_id}")));
    }
    info!("Convention deleted, id: {convention_id}");
    Ok(())
}

pub async fn list_convention_links(conn: &mut SqliteConnection, convention_id: ConventionId) -> AppResult<Vec<ConventionLinkRecord>> {
    Ok(sqlx::query_as::<_, ConventionLinkRecord>("SELECT * FROM convention_links WHERE convention_id=? ORDER BY id")
        .bind(convention_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert_convention_link(conn: &mut SqliteConnection, convention_id: ConventionId, form: &ConventionLinkForm) -> AppResult<ConventionLinkRecord> {
    if !(form.url.starts_with("http://") || form.url.starts_with("https://")) {
        return Err(RuleError::Invalid(format!("Link URL must be http(s): {}", form.url)).into());
    }
    Ok(sqlx::query_as::<_, ConventionLinkRecord>("INSERT INTO convention_links (convention_id, title, url) VALUES (?, ?, ?) RETURNING *")
        .bind(convention_id)
        .bind(&form.title)
        .bind(&form.url)
        .fetch_one(&mut *conn)
        .await?)
}

pub async fn load_convention_event(conn: &mut SqliteConnection, event_id: ConventionEventId) -> AppResult<ConventionEventRecord> {
    sqlx::query_as::<_, ConventionEventRecord>("SELECT * FROM convention_events WHERE id=?")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Convention event id={event_id}")))
}

pub async fn load_event_organizers(conn: &mut SqliteConnection, event_id: ConventionEventId) -> AppResult<Vec<UserId>> {
    load_members(conn, "convention_event_organizers", "event_id", event_id).await
}

pub async fn load_convention_event_context(conn: &mut SqliteConnection, event_id: ConventionEventId) -> AppResult<ConventionEventContext> {
    let event = load_convention_event(conn, event_id).await?;
    let convention = load_convention(conn, event.convention_id).await?;
    let organizers = load_event_organizers(conn, event_id).await?;
    let convention_organizers = load_convention_organizers(conn, event.convention_id).await?;
    let registrations = list_event_registrations(conn, event_id).await?;
    Ok(ConventionEventContext {
        event,
        convention_name: convention.name,
        organizers,
        convention_organizers,
        registrations,
    })
}

pub async fn list_convention_events(conn: &mut SqliteConnection, convention_id: Option<ConventionId>) -> AppResult<Vec<ConventionEventSummary>> {
    let ids = sqlx::query_as::<_, (ConventionEventId,)>("SELECT id FROM convention_events \
            WHERE (?1 IS NULL OR convention_id=?1) ORDER BY date_start, id")
        .bind(convention_id)
        .fetch_all(&mut *conn)
        .await?;
    let mut events = Vec::with_capacity(ids.len());
    for (event_id,) in ids {
        events.push(load_convention_event_context(conn, event_id).await?.summary());
    }
    Ok(events)
}

/// New events start with the organizers of their convention.
pub async fn save_convention_event(conn: &mut SqliteConnection, event_id: Option<ConventionEventId>, form: &ConventionEventForm) -> AppResult<ConventionEventRecord> {
    check_date_range(form.date_start, form.date_end)?;
    if form.capacity.is_some_and(|c| c < 0) {
        return Err(RuleError::Invalid("Convention event capacity cannot be negative".to_string()).into());
    }
    load_convention(conn, form.convention_id).await?;
    load_city(conn, form.city_id).await?;
    if let Some(venue_id) = form.venue_id {
        let venue = load_venue(conn, venue_id).await?;
        if venue.city_id != form.city_id {
            return Err(RuleError::Invalid(format!("Venue {} is not in city id={}", venue.name, form.city_id)).into());
        }
    }
    let event = if let Some(event_id) = event_id {
        check_scheduled_items(conn, event_id, form.date_start, form.date_end).await?;
        sqlx::query_as::<_, ConventionEventRecord>("UPDATE convention_events SET convention_id=?, city_id=?, venue_id=?, \
                date_start=?, date_end=?, registration_open=?, capacity=? WHERE id=? RETURNING *")
            .bind(form.convention_id)
            .bind(form.city_id)
            .bind(form.venue_id)
            .bind(form.date_start)
            .bind(form.date_end)
            .bind(form.registration_open)
            .bind(form.capacity)
            .bind(event_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Convention event id={event_id}")))?
    } else {
        let event = sqlx::query_as::<_, ConventionEventRecord>("INSERT INTO convention_events \
                (convention_id, city_id, venue_id, date_start, date_end, registration_open, capacity, created_at) \
                VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *")
            .bind(form.convention_id)
            .bind(form.city_id)
            .bind(form.venue_id)
            .bind(form.date_start)
            .bind(form.date_end)
            .bind(form.registration_open)
            .bind(form.capacity)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        copy_convention_organizers(conn, event.id, event.convention_id).await?;
        info!("Convention event created, id: {}, {} .. {}", event.id, event.date_start, event.date_end);
        event
    };
    Ok(event)
}

/// Runs and common events already scheduled must stay inside the new date range.
async fn check_scheduled_items(conn: &mut SqliteConnection, event_id: ConventionEventId, date_start: NaiveDate, date_end: NaiveDate) -> AppResult<()> {
    let dates = sqlx::query_as::<_, (LocalDateTime,)>("SELECT date FROM runs WHERE convention_event_id=?1 \
            UNION ALL SELECT date FROM common_events WHERE convention_event_id=?1")
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?;
    for (date,) in dates {
        check_within_event(date.date_naive(), date_start, date_end)?;
    }
    Ok(())
}

async fn copy_convention_organizers(conn: &mut SqliteConnection, event_id: ConventionEventId, convention_id: ConventionId) -> AppResult<u64> {
    let res = sqlx::query("INSERT OR IGNORE INTO convention_event_organizers (event_id, user_id) \
            SELECT ?, user_id FROM convention_organizers WHERE convention_id=?")
        .bind(event_id)
        .bind(convention_id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_convention_event(conn: &mut SqliteConnection, event_id: ConventionEventId) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM convention_events WHERE id=?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Convention event id={event_id}")));
    }
    info!("Convention event deleted, id: {event_id}");
    Ok(())
}

/// Fills organizers of events that have none (every event with `force`) from their convention.
pub async fn inherit_organizers(conn: &mut SqliteConnection, force: bool, dry_run: bool) -> AppResult<InheritOrganizersReport> {
    let events = sqlx::query_as::<_, (ConventionEventId, ConventionId, i64)>("SELECT e.id, e.convention_id, \
            (SELECT COUNT(*) FROM convention_event_organizers o WHERE o.event_id = e.id) \
            FROM convention_events e ORDER BY e.id")
        .fetch_all(&mut *conn)
        .await?;
    let mut report = InheritOrganizersReport { dry_run, ..Default::default() };
    for (event_id, convention_id, organizer_count) in events {
        let convention_organizers = load_convention_organizers(conn, convention_id).await?;
        if (organizer_count > 0 && !force) || convention_organizers.is_empty() {
            report.skipped.push(event_id);
            continue;
        }
        if !dry_run {
            if force {
                sqlx::query("DELETE FROM convention_event_organizers WHERE event_id=?")
                    .bind(event_id)
                    .execute(&mut *conn)
                    .await?;
            }
            copy_convention_organizers(conn, event_id, convention_id).await?;
        }
        info!("Convention event id: {event_id} organizers {} {}",
            if dry_run { "would be set to" } else { "set to" },
            convention_organizers.iter().join(", "));
        report.updated.push(event_id);
    }
    Ok(report)
}
