use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::datetime::{parse_naive_datetime, LocalDateTime};
use crate::error::{AppError, AppResult, RuleError};
use crate::rules::dates::check_within_event;
use crate::rules::runs::RunState;
use crate::tables::conventions::{load_convention_event, load_event_organizers, ConventionEventId};
use crate::tables::games::{load_game, GameId};
use crate::tables::places::{load_city, load_room, CityId, RoomId};
use crate::tables::registrations::{list_run_registrations, RegistrationRecord};
use crate::tables::users::{add_member, load_members, UserId};

pub type RunId = i64;

pub const DEFAULT_DURATION_MINUTES: i64 = 240;

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct RunRecord {
    pub id: RunId,
    pub game_id: GameId,
    pub city_id: CityId,
    pub room_id: Option<RoomId>,
    pub convention_event_id: Option<ConventionEventId>,
    pub date: LocalDateTime,
    pub duration_minutes: i64,
    /// Overrides the game's `players_max` when set.
    pub max_players: Option<i64>,
    pub registration_open: bool,
    pub created_at: DateTime<Utc>,
}

fn default_duration() -> i64 { DEFAULT_DURATION_MINUTES }
fn default_true() -> bool { true }

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunForm {
    pub game_id: GameId,
    pub city_id: CityId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub convention_event_id: Option<ConventionEventId>,
    /// Local wall-clock time in the run's city, e.g. `2025-05-01T18:30`.
    pub date: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub max_players: Option<i64>,
    #[serde(default = "default_true")]
    pub registration_open: bool,
}

/// Run as presented to clients, with the capacity figures resolved.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunSummary {
    #[serde(flatten)]
    pub run: RunRecord,
    pub game_name: String,
    pub masters: Vec<UserId>,
    pub effective_max_players: i64,
    pub registered_count: i64,
    pub available_slots: i64,
    pub is_full: bool,
}

/// Everything the registration rules need to know about one run.
pub struct RunContext {
    pub run: RunRecord,
    pub game_name: String,
    pub game_players_max: i64,
    pub masters: Vec<UserId>,
    pub event_organizers: Vec<UserId>,
    pub registrations: Vec<RegistrationRecord>,
}
impl RunContext {
    pub fn state(&self) -> RunState<'_> {
        RunState {
            registration_open: self.run.registration_open,
            max_players: self.run.max_players,
            game_players_max: self.game_players_max,
            masters: &self.masters,
            registrations: &self.registrations,
        }
    }
    pub fn summary(&self) -> RunSummary {
        let state = self.state();
        RunSummary {
            run: self.run.clone(),
            game_name: self.game_name.clone(),
            masters: self.masters.clone(),
            effective_max_players: state.effective_max_players(),
            registered_count: state.registered_count(),
            available_slots: state.available_slots(),
            is_full: state.is_full(),
        }
    }
}

pub async fn load_run(conn: &mut SqliteConnection, run_id: RunId) -> AppResult<RunRecord> {
    sqlx::query_as::<_, RunRecord>("SELECT * FROM runs WHERE id=?")
        .bind(run_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Run id={run_id}")))
}

pub async fn load_run_masters(conn: &mut SqliteConnection, run_id: RunId) -> AppResult<Vec<UserId>> {
    load_members(conn, "run_masters", "run_id", run_id).await
}

pub async fn load_run_context(conn: &mut SqliteConnection, run_id: RunId) -> AppResult<RunContext> {
    let run = load_run(conn, run_id).await?;
    let game = load_game(conn, run.game_id).await?;
    let masters = load_run_masters(conn, run_id).await?;
    let event_organizers = match run.convention_event_id {
        Some(event_id) => load_event_organizers(conn, event_id).await?,
        None => vec![],
    };
    let registrations = list_run_registrations(conn, run_id).await?;
    Ok(RunContext {
        run,
        game_name: game.name,
        game_players_max: game.players_max,
        masters,
        event_organizers,
        registrations,
    })
}

pub async fn list_runs(conn: &mut SqliteConnection, convention_event_id: Option<ConventionEventId>, game_id: Option<GameId>) -> AppResult<Vec<RunSummary>> {
    let ids = sqlx::query_as::<_, (RunId,)>("SELECT id FROM runs \
            WHERE (?1 IS NULL OR convention_event_id=?1) AND (?2 IS NULL OR game_id=?2) \
            ORDER BY date, id")
        .bind(convention_event_id)
        .bind(game_id)
        .fetch_all(&mut *conn)
        .await?;
    let mut runs = Vec::with_capacity(ids.len());
    for (run_id,) in ids {
        runs.push(load_run_context(conn, run_id).await?.summary());
    }
    Ok(runs)
}

/// Resolves the form's local time in the city's offset and checks it against the parent convention event.
async fn validate_run_form(conn: &mut SqliteConnection, form: &RunForm) -> AppResult<LocalDateTime> {
    load_game(conn, form.game_id).await?;
    let city = load_city(conn, form.city_id).await?;
    if let Some(room_id) = form.room_id {
        load_room(conn, room_id).await?;
    }
    if form.max_players.is_some_and(|n| n < 0) {
        return Err(RuleError::Invalid("Run max players cannot be negative".to_string()).into());
    }
    if form.duration_minutes <= 0 {
        return Err(RuleError::Invalid("Run duration must be positive".to_string()).into());
    }
    let local = parse_naive_datetime(&form.date)
        .ok_or_else(|| RuleError::Invalid(format!("Unrecognized date-time string: {}", form.date)))?;
    let date = LocalDateTime::from_local_timezone(local, city.utc_offset_minutes)
        .ok_or_else(|| RuleError::Invalid(format!("Cannot resolve {} in city {}", form.date, city.name)))?;
    if let Some(event_id) = form.convention_event_id {
        let event = load_convention_event(conn, event_id).await?;
        check_within_event(date.date_naive(), event.date_start, event.date_end)?;
    }
    Ok(date)
}

pub async fn save_run(conn: &mut SqliteConnection, run_id: Option<RunId>, form: &RunForm, creator: UserId) -> AppResult<RunRecord> {
    let date = validate_run_form(conn, form).await?;
    let run = if let Some(run_id) = run_id {
        sqlx::query_as::<_, RunRecord>("UPDATE runs SET game_id=?, city_id=?, room_id=?, convention_event_id=?, date=?, \
                duration_minutes=?, max_players=?, registration_open=? WHERE id=? RETURNING *")
            .bind(form.game_id)
            .bind(form.city_id)
            .bind(form.room_id)
            .bind(form.convention_event_id)
            .bind(date.to_iso_string())
            .bind(form.duration_minutes)
            .bind(form.max_players)
            .bind(form.registration_open)
            .bind(run_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Run id={run_id}")))?
    } else {
        let run = sqlx::query_as::<_, RunRecord>("INSERT INTO runs (game_id, city_id, room_id, convention_event_id, date, \
                duration_minutes, max_players, registration_open, created_at) \
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *")
            .bind(form.game_id)
            .bind(form.city_id)
            .bind(form.room_id)
            .bind(form.convention_event_id)
            .bind(date.to_iso_string())
            .bind(form.duration_minutes)
            .bind(form.max_players)
            .bind(form.registration_open)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        add_member(conn, "run_masters", "run_id", run.id, creator).await?;
        info!("Run created, id: {}, game id: {}, date: {}", run.id, run.game_id, run.date.to_iso_string());
        run
    };
    Ok(run)
}

pub async fn delete_run(conn: &mut SqliteConnection, run_id: RunId) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM runs WHERE id=?")
        .bind(run_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Run id={run_id}")));
    }
    info!("Run deleted, id: {run_id}");
    Ok(())
}
