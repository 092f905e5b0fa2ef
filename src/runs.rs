use rocket::response::status::Custom;
use rocket::response::stream::{Event, EventStream};
use rocket::tokio::sync::broadcast;
use rocket::tokio::sync::broadcast::error::RecvError;
use rocket::serde::json::{self, Json};
use rocket::serde::{Deserialize, Serialize};
use rocket::{Build, Rocket, State};
use sqlx::SqliteConnection;
use crate::auth::CurrentUser;
use crate::authz::{require, Capability, Resource};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, RuleError};
use crate::tables::conventions::{load_convention_event_context, ConventionEventId};
use crate::tables::games::GameId;
use crate::tables::registrations::{attempt_register, unregister, update_registration_status, RegistrationChange, RegistrationChangeKind, RegistrationId, RegistrationRecord, RegistrationRequest, UnregisterOutcome};
use crate::tables::runs::{delete_run, list_runs, load_run_context, save_run, RunForm, RunId, RunSummary};
use crate::tables::users::{add_member, remove_member, UserId};
use crate::AppState;

#[derive(Serialize, Deserialize, Debug)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MemberRef {
    pub user_id: UserId,
}

/// Skips over changes a slow listener missed, `None` once the sender is gone.
async fn next_change<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> Option<T> {
    loop {
        match receiver.recv().await {
            Ok(chng) => return Some(chng),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Registration change listener lagged, {skipped} changes skipped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// An empty body means all defaults, anything unparsable is refused.
pub(crate) fn body_or_default<T: Default>(body: Result<Json<T>, json::Error<'_>>) -> AppResult<T> {
    match body {
        Ok(body) => Ok(body.into_inner()),
        Err(json::Error::Parse(raw, _)) if raw.trim().is_empty() => Ok(T::default()),
        Err(e) => Err(RuleError::Invalid(format!("Malformed request body: {e}")).into()),
    }
}

async fn require_on_run(conn: &mut SqliteConnection, run_id: RunId, user: &CurrentUser, capability: Capability) -> AppResult<()> {
    let ctx = load_run_context(conn, run_id).await?;
    require(&user.actor(), &Resource::Run { masters: &ctx.masters, event_organizers: &ctx.event_organizers }, capability)
}

/// Scheduling a run into a convention event is up to that event's organizers.
async fn require_on_event(conn: &mut SqliteConnection, event_id: Option<ConventionEventId>, user: &CurrentUser) -> AppResult<()> {
    let Some(event_id) = event_id else {
        return Ok(());
    };
    let ctx = load_convention_event_context(conn, event_id).await?;
    require(&user.actor(), &Resource::ConventionEvent {
        organizers: &ctx.organizers,
        convention_organizers: &ctx.convention_organizers,
    }, Capability::Edit)
}

#[get("/api/runs?<convention_event_id>&<game_id>")]
async fn get_runs(convention_event_id: Option<ConventionEventId>, game_id: Option<GameId>, db: &State<DbPool>) -> Result<Json<Vec<RunSummary>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_runs(&mut conn, convention_event_id, game_id).await?))
}

#[get("/api/runs/<run_id>")]
async fn get_run(run_id: RunId, db: &State<DbPool>) -> Result<Json<RunSummary>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(load_run_context(&mut conn, run_id).await?.summary()))
}

#[post("/api/runs", data = "<form>")]
async fn post_run(form: Json<RunForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<RunSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, form.convention_event_id, &user).await?;
    let run = save_run(&mut tx, None, &form, user.id).await?;
    let summary = load_run_context(&mut tx, run.id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[put("/api/runs/<run_id>", data = "<form>")]
async fn put_run(run_id: RunId, form: Json<RunForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<RunSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    let ctx = load_run_context(&mut tx, run_id).await?;
    require(&user.actor(), &Resource::Run { masters: &ctx.masters, event_organizers: &ctx.event_organizers }, Capability::Edit)?;
    if form.convention_event_id != ctx.run.convention_event_id {
        require_on_event(&mut tx, form.convention_event_id, &user).await?;
    }
    save_run(&mut tx, Some(run_id), &form, user.id).await?;
    let summary = load_run_context(&mut tx, run_id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[delete("/api/runs/<run_id>")]
async fn remove_run(run_id: RunId, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_run(&mut tx, run_id, &user, Capability::Delete).await?;
    delete_run(&mut tx, run_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

#[post("/api/runs/<run_id>/masters", data = "<member>")]
async fn post_run_master(run_id: RunId, member: Json<MemberRef>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<RunSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_run(&mut tx, run_id, &user, Capability::Edit).await?;
    add_member(&mut tx, "run_masters", "run_id", run_id, member.user_id).await?;
    let summary = load_run_context(&mut tx, run_id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[delete("/api/runs/<run_id>/masters/<user_id>")]
async fn remove_run_master(run_id: RunId, user_id: UserId, user: CurrentUser, db: &State<DbPool>) -> Result<Json<RunSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_run(&mut tx, run_id, &user, Capability::Edit).await?;
    remove_member(&mut tx, "run_masters", "run_id", run_id, user_id).await?;
    let summary = load_run_context(&mut tx, run_id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[post("/api/runs/<run_id>/register", data = "<request>")]
async fn post_register(run_id: RunId, request: Result<Json<RegistrationRequest>, json::Error<'_>>, user: CurrentUser, state: &State<AppState>, db: &State<DbPool>) -> Result<Json<RegistrationRecord>, Custom<String>> {
    let request = body_or_default(request)?;
    let mut tx = db.begin().await?;
    let registration = attempt_register(&mut tx, run_id, user.id, &request).await?;
    tx.commit().await.map_err(AppError::from)?;
    state.broadcast_registration_change(RegistrationChange::new(RegistrationChangeKind::Created, &registration));
    Ok(Json(registration))
}

#[delete("/api/runs/<run_id>/register")]
async fn delete_register(run_id: RunId, user: CurrentUser, state: &State<AppState>, db: &State<DbPool>) -> Result<Json<UnregisterOutcome>, Custom<String>> {
    let mut tx = db.begin().await?;
    let outcome = unregister(&mut tx, run_id, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    state.broadcast_registration_change(RegistrationChange::new(RegistrationChangeKind::Removed, &outcome.removed));
    if let Some(promoted) = &outcome.promoted {
        state.broadcast_registration_change(RegistrationChange::new(RegistrationChangeKind::Promoted, promoted));
    }
    Ok(Json(outcome))
}

#[get("/api/runs/<run_id>/registrations")]
async fn get_registrations(run_id: RunId, user: CurrentUser, db: &State<DbPool>) -> Result<Json<Vec<RegistrationRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    let ctx = load_run_context(&mut conn, run_id).await?;
    require(&user.actor(), &Resource::Run { masters: &ctx.masters, event_organizers: &ctx.event_organizers }, Capability::ViewRegistrations)?;
    Ok(Json(ctx.registrations))
}

#[put("/api/runs/<run_id>/registrations/<registration_id>/status", data = "<change>")]
async fn put_registration_status(run_id: RunId, registration_id: RegistrationId, change: Json<StatusChange>, user: CurrentUser, state: &State<AppState>, db: &State<DbPool>) -> Result<Json<RegistrationRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_run(&mut tx, run_id, &user, Capability::ManageRegistrations).await?;
    let registration = update_registration_status(&mut tx, run_id, registration_id, &change.status).await?;
    tx.commit().await.map_err(AppError::from)?;
    state.broadcast_registration_change(RegistrationChange::new(RegistrationChangeKind::StatusChanged, &registration));
    Ok(Json(registration))
}

#[get("/api/runs/<run_id>/registrations/sse")]
fn registrations_sse(run_id: RunId, state: &State<AppState>) -> EventStream![] {
    let mut chng_receiver = state.registration_changes.subscribe();
    EventStream! {
        while let Some(change) = next_change(&mut chng_receiver).await {
            if change.registration.run_id == run_id {
                match serde_json::to_string(&change) {
                    Ok(data) => {
                        yield Event::data(data);
                    }
                    Err(e) => {
                        error!("Serde error: {e}");
                        break;
                    }
                }
            }
        }
    }
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
            get_runs,
            get_run,
            post_run,
            put_run,
            remove_run,
            post_run_master,
            remove_run_master,
            post_register,
            delete_register,
            get_registrations,
            put_registration_status,
            registrations_sse,
        ])
}

#[rocket::async_test]
async fn test_next_change_survives_lag() {
    let (sender, mut receiver) = broadcast::channel(2);
    for n in 1..=5 {
        sender.send(n).unwrap();
    }
    assert_eq!(next_change(&mut receiver).await, Some(4));
    assert_eq!(next_change(&mut receiver).await, Some(5));
    drop(sender);
    assert_eq!(next_change(&mut receiver).await, None);
}
