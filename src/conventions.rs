use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use rocket::{Build, Rocket, State};
use sqlx::SqliteConnection;
use crate::auth::CurrentUser;
use crate::authz::{require, Capability, Resource};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::runs::{body_or_default, MemberRef, StatusChange};
use crate::tables::common_events::{delete_common_event, insert_common_event, list_common_events, load_common_event, CommonEventForm, CommonEventRecord};
use crate::tables::convention_registrations::{register_for_event, unregister_from_event, update_event_registration_status, ConventionEventRegistrationRecord, ConventionRegistrationRequest};
use crate::tables::conventions::{delete_convention, delete_convention_event, inherit_organizers, insert_convention_link, list_convention_events, list_convention_links, list_conventions, load_convention, load_convention_event_context, load_convention_organizers, save_convention, save_convention_event, ConventionEventForm, ConventionEventId, ConventionEventSummary, ConventionForm, ConventionId, ConventionLinkForm, ConventionLinkRecord, ConventionRecord, InheritOrganizersReport};
use crate::tables::users::add_member;

async fn require_on_convention(conn: &mut SqliteConnection, convention_id: ConventionId, user: &CurrentUser, capability: Capability) -> AppResult<()> {
    load_convention(conn, convention_id).await?;
    let organizers = load_convention_organizers(conn, convention_id).await?;
    require(&user.actor(), &Resource::Convention { organizers: &organizers }, capability)
}

async fn require_on_event(conn: &mut SqliteConnection, event_id: ConventionEventId, user: &CurrentUser, capability: Capability) -> AppResult<()> {
    let ctx = load_convention_event_context(conn, event_id).await?;
    require(&user.actor(), &Resource::ConventionEvent {
        organizers: &ctx.organizers,
        convention_organizers: &ctx.convention_organizers,
    }, capability)
}

#[get("/api/conventions")]
async fn get_conventions(db: &State<DbPool>) -> Result<Json<Vec<ConventionRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_conventions(&mut conn).await?))
}

#[get("/api/conventions/<convention_id>")]
async fn get_convention(convention_id: ConventionId, db: &State<DbPool>) -> Result<Json<ConventionRecord>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(load_convention(&mut conn, convention_id).await?))
}

#[post("/api/conventions", data = "<form>")]
async fn post_convention(form: Json<ConventionForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    let convention = save_convention(&mut tx, None, &form, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(convention))
}

#[put("/api/conventions/<convention_id>", data = "<form>")]
async fn put_convention(convention_id: ConventionId, form: Json<ConventionForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_convention(&mut tx, convention_id, &user, Capability::Edit).await?;
    let convention = save_convention(&mut tx, Some(convention_id), &form, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(convention))
}

#[delete("/api/conventions/<convention_id>")]
async fn remove_convention(convention_id: ConventionId, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_convention(&mut tx, convention_id, &user, Capability::Delete).await?;
    delete_convention(&mut tx, convention_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

#[post("/api/conventions/<convention_id>/organizers", data = "<member>")]
async fn post_convention_organizer(convention_id: ConventionId, member: Json<MemberRef>, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_convention(&mut tx, convention_id, &user, Capability::Edit).await?;
    add_member(&mut tx, "convention_organizers", "convention_id", convention_id, member.user_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

#[get("/api/conventions/<convention_id>/links")]
async fn get_convention_links(convention_id: ConventionId, db: &State<DbPool>) -> Result<Json<Vec<ConventionLinkRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    load_convention(&mut conn, convention_id).await?;
    Ok(Json(list_convention_links(&mut conn, convention_id).await?))
}

#[post("/api/conventions/<convention_id>/links", data = "<form>")]
async fn post_convention_link(convention_id: ConventionId, form: Json<ConventionLinkForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionLinkRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_convention(&mut tx, convention_id, &user, Capability::Edit).await?;
    let link = insert_convention_link(&mut tx, convention_id, &form).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(link))
}

#[get("/api/convention-events?<convention_id>")]
async fn get_convention_events(convention_id: Option<ConventionId>, db: &State<DbPool>) -> Result<Json<Vec<ConventionEventSummary>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_convention_events(&mut conn, convention_id).await?))
}

#[get("/api/convention-events/<event_id>")]
async fn get_convention_event(event_id: ConventionEventId, db: &State<DbPool>) -> Result<Json<ConventionEventSummary>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(load_convention_event_context(&mut conn, event_id).await?.summary()))
}

#[post("/api/convention-events", data = "<form>")]
async fn post_convention_event(form: Json<ConventionEventForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_convention(&mut tx, form.convention_id, &user, Capability::Edit).await?;
    let event = save_convention_event(&mut tx, None, &form).await?;
    let summary = load_convention_event_context(&mut tx, event.id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[put("/api/convention-events/<event_id>", data = "<form>")]
async fn put_convention_event(event_id: ConventionEventId, form: Json<ConventionEventForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, event_id, &user, Capability::Edit).await?;
    save_convention_event(&mut tx, Some(event_id), &form).await?;
    let summary = load_convention_event_context(&mut tx, event_id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[delete("/api/convention-events/<event_id>")]
async fn remove_convention_event(event_id: ConventionEventId, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, event_id, &user, Capability::Delete).await?;
    delete_convention_event(&mut tx, event_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

#[post("/api/convention-events/<event_id>/organizers", data = "<member>")]
async fn post_event_organizer(event_id: ConventionEventId, member: Json<MemberRef>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventSummary>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, event_id, &user, Capability::Edit).await?;
    add_member(&mut tx, "convention_event_organizers", "event_id", event_id, member.user_id).await?;
    let summary = load_convention_event_context(&mut tx, event_id).await?.summary();
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

#[post("/api/convention-events/inherit-organizers?<force>&<dry_run>")]
async fn post_inherit_organizers(force: Option<bool>, dry_run: Option<bool>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<InheritOrganizersReport>, Custom<String>> {
    if !user.is_staff {
        return Err(AppError::Forbidden(format!("User {} is not staff", user.username)).into());
    }
    let mut tx = db.begin().await?;
    let report = inherit_organizers(&mut tx, force.unwrap_or(false), dry_run.unwrap_or(false)).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(report))
}

#[post("/api/convention-events/<event_id>/register", data = "<request>")]
async fn post_event_register(event_id: ConventionEventId, request: Result<Json<ConventionRegistrationRequest>, json::Error<'_>>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventRegistrationRecord>, Custom<String>> {
    let request = body_or_default(request)?;
    let mut tx = db.begin().await?;
    let registration = register_for_event(&mut tx, event_id, user.id, &request).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(registration))
}

#[delete("/api/convention-events/<event_id>/register")]
async fn delete_event_register(event_id: ConventionEventId, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventRegistrationRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    let removed = unregister_from_event(&mut tx, event_id, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(removed))
}

#[get("/api/convention-events/<event_id>/registrations")]
async fn get_event_registrations(event_id: ConventionEventId, user: CurrentUser, db: &State<DbPool>) -> Result<Json<Vec<ConventionEventRegistrationRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    let ctx = load_convention_event_context(&mut conn, event_id).await?;
    require(&user.actor(), &Resource::ConventionEvent {
        organizers: &ctx.organizers,
        convention_organizers: &ctx.convention_organizers,
    }, Capability::ViewRegistrations)?;
    Ok(Json(ctx.registrations))
}

#[put("/api/convention-events/<event_id>/registrations/<registration_id>/status", data = "<change>")]
async fn put_event_registration_status(event_id: ConventionEventId, registration_id: i64, change: Json<StatusChange>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<ConventionEventRegistrationRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, event_id, &user, Capability::ManageRegistrations).await?;
    let registration = update_event_registration_status(&mut tx, event_id, registration_id, &change.status).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(registration))
}

#[get("/api/convention-events/<event_id>/common-events")]
async fn get_common_events(event_id: ConventionEventId, db: &State<DbPool>) -> Result<Json<Vec<CommonEventRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_common_events(&mut conn, event_id).await?))
}

#[post("/api/common-events", data = "<form>")]
async fn post_common_event(form: Json<CommonEventForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<CommonEventRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    require_on_event(&mut tx, form.convention_event_id, &user, Capability::Edit).await?;
    let common_event = insert_common_event(&mut tx, &form).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(common_event))
}

#[delete("/api/common-events/<common_event_id>")]
async fn remove_common_event(common_event_id: i64, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    let common_event = load_common_event(&mut tx, common_event_id).await?;
    match common_event.convention_event_id {
        Some(event_id) => require_on_event(&mut tx, event_id, &user, Capability::Delete).await?,
        // orphaned by a deleted convention event
        None if user.is_staff => {}
        None => return Err(AppError::Forbidden(format!("User {} is not staff", user.username)).into()),
    }
    delete_common_event(&mut tx, common_event_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
            get_conventions,
            get_convention,
            post_convention,
            put_convention,
            remove_convention,
            post_convention_organizer,
            get_convention_links,
            post_convention_link,
            get_convention_events,
            get_convention_event,
            post_convention_event,
            put_convention_event,
            remove_convention_event,
            post_event_organizer,
            post_inherit_organizers,
            post_event_register,
            delete_event_register,
            get_event_registrations,
            put_event_registration_status,
            get_common_events,
            post_common_event,
            remove_common_event,
        ])
}
