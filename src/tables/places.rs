use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult, RuleError};

pub type CityId = i64;
pub type VenueId = i64;
pub type RoomId = i64;

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct CityRecord {
    pub id: CityId,
    pub name: String,
    pub region: String,
    /// Fixed offset used to resolve local wall-clock times of runs held in the city.
    pub utc_offset_minutes: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CityForm {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}
impl CityForm {
    fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::Invalid("City name must be set".to_string()));
        }
        // real world offsets stay within -12:00 .. +14:00
        if !(-12 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
            return Err(RuleError::Invalid(format!("UTC offset {} minutes is out of range", self.utc_offset_minutes)));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct VenueRecord {
    pub id: VenueId,
    pub city_id: CityId,
    pub name: String,
    pub address: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VenueForm {
    pub city_id: CityId,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct RoomRecord {
    pub id: RoomId,
    pub venue_id: VenueId,
    pub name: String,
    pub capacity: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoomForm {
    pub venue_id: VenueId,
    pub name: String,
    #[serde(default)]
    pub capacity: Option<i64>,
}

pub async fn load_city(conn: &mut SqliteConnection, city_id: CityId) -> AppResult<CityRecord> {
    sqlx::query_as::<_, CityRecord>("SELECT * FROM cities WHERE id=?")
        .bind(city_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("City id={city_id}")))
}

pub async fn list_cities(conn: &mut SqliteConnection) -> AppResult<Vec<CityRecord>> {
    Ok(sqlx::query_as::<_, CityRecord>("SELECT * FROM cities ORDER BY name")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert_city(conn: &mut SqliteConnection, form: &CityForm) -> AppResult<CityRecord> {
    form.validate()?;
    let city = sqlx::query_as::<_, CityRecord>("INSERT INTO cities (name, region, utc_offset_minutes) VALUES (?, ?, ?) RETURNING *")
        .bind(form.name.trim())
        .bind(&form.region)
        .bind(form.utc_offset_minutes)
        .fetch_one(&mut *conn)
        .await?;
    info!("City created, id: {}, name: {}", city.id, city.name);
    Ok(city)
}

pub async fn load_venue(conn: &mut SqliteConnection, venue_id: VenueId) -> AppResult<VenueRecord> {
    sqlx::query_as::<_, VenueRecord>("SELECT * FROM venues WHERE id=?")
        .bind(venue_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Venue id={venue_id}")))
}

pub async fn list_venues(conn: &mut SqliteConnection, city_id: Option<CityId>) -> AppResult<Vec<VenueRecord>> {
    let venues = match city_id {
        Some(city_id) => sqlx::query_as::<_, VenueRecord>("SELECT * FROM venues WHERE city_id=? ORDER BY name")
            .bind(city_id)
            .fetch_all(&mut *conn)
            .await?,
        None => sqlx::query_as::<_, VenueRecord>("SELECT * FROM venues ORDER BY name")
            .fetch_all(&mut *conn)
            .await?,
    };
    Ok(venues)
}

pub async fn insert_venue(conn: &mut SqliteConnection, form: &VenueForm) -> AppResult<VenueRecord> {
    if form.name.trim().is_empty() {
        return Err(RuleError::Invalid("Venue name must be set".to_string()).into());
    }
    load_city(conn, form.city_id).await?;
    Ok(sqlx::query_as::<_, VenueRecord>("INSERT INTO venues (city_id, name, address) VALUES (?, ?, ?) RETURNING *")
        .bind(form.city_id)
        .bind(form.name.trim())
        .bind(&form.address)
        .fetch_one(&mut *conn)
        .await?)
}

pub async fn load_room(conn: &mut SqliteConnection, room_id: RoomId) -> AppResult<RoomRecord> {
    sqlx::query_as::<_, RoomRecord>("SELECT * FROM rooms WHERE id=?")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Room id={room_id}")))
}

pub async fn list_rooms(conn: &mut SqliteConnection, venue_id: VenueId) -> AppResult<Vec<RoomRecord>> {
    Ok(sqlx::query_as::<_, RoomRecord>("SELECT * FROM rooms WHERE venue_id=? ORDER BY name")
        .bind(venue_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn insert_room(conn: &mut SqliteConnection, form: &RoomForm) -> AppResult<RoomRecord> {
    if form.name.trim().is_empty() {
        return Err(RuleError::Invalid("Room name must be set".to_string()).into());
    }
    if form.capacity.is_some_and(|c| c < 0) {
        return Err(RuleError::Invalid("Room capacity cannot be negative".to_string()).into());
    }
    load_venue(conn, form.venue_id).await?;
    Ok(sqlx::query_as::<_, RoomRecord>("INSERT INTO rooms (venue_id, name, capacity) VALUES (?, ?, ?) RETURNING *")
        .bind(form.venue_id)
        .bind(form.name.trim())
        .bind(form.capacity)
        .fetch_one(&mut *conn)
        .await?)
}
