use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::error::AppError;
use crate::tables::places::{insert_city, insert_room, insert_venue, list_cities, list_rooms, list_venues, load_venue, CityForm, CityId, CityRecord, RoomForm, RoomRecord, VenueForm, VenueId, VenueRecord};

// cities, venues and rooms are reference data kept by staff
fn require_staff(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("User {} is not staff", user.username)))
    }
}

#[get("/api/cities")]
async fn get_cities(db: &State<DbPool>) -> Result<Json<Vec<CityRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_cities(&mut conn).await?))
}

#[post("/api/cities", data = "<form>")]
async fn post_city(form: Json<CityForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<CityRecord>, Custom<String>> {
    require_staff(&user)?;
    let mut conn = db.acquire().await?;
    Ok(Json(insert_city(&mut conn, &form).await?))
}

#[get("/api/venues?<city_id>")]
async fn get_venues(city_id: Option<CityId>, db: &State<DbPool>) -> Result<Json<Vec<VenueRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_venues(&mut conn, city_id).await?))
}

#[post("/api/venues", data = "<form>")]
async fn post_venue(form: Json<VenueForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<VenueRecord>, Custom<String>> {
    require_staff(&user)?;
    let mut conn = db.acquire().await?;
    Ok(Json(insert_venue(&mut conn, &form).await?))
}

#[get("/api/venues/<venue_id>/rooms")]
async fn get_rooms(venue_id: VenueId, db: &State<DbPool>) -> Result<Json<Vec<RoomRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    load_venue(&mut conn, venue_id).await?;
    Ok(Json(list_rooms(&mut conn, venue_id).await?))
}

#[post("/api/rooms", data = "<form>")]
async fn post_room(form: Json<RoomForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<RoomRecord>, Custom<String>> {
    require_staff(&user)?;
    let mut conn = db.acquire().await?;
    Ok(Json(insert_room(&mut conn, &form).await?))
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
            get_cities,
            post_city,
            get_venues,
            post_venue,
            get_rooms,
            post_room,
        ])
}
