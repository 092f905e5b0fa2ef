use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use crate::auth::CurrentUser;
use crate::authz::{require, Capability, Resource};
use crate::db::DbPool;
use crate::error::AppError;
use crate::tables::games::{delete_game, list_games, load_game, load_game_creators, save_game, GameForm, GameId, GameRecord};

#[get("/api/games")]
async fn get_games(db: &State<DbPool>) -> Result<Json<Vec<GameRecord>>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(list_games(&mut conn).await?))
}

#[get("/api/games/<game_id>")]
async fn get_game(game_id: GameId, db: &State<DbPool>) -> Result<Json<GameRecord>, Custom<String>> {
    let mut conn = db.acquire().await?;
    Ok(Json(load_game(&mut conn, game_id).await?))
}

#[post("/api/games", data = "<form>")]
async fn post_game(form: Json<GameForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<GameRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    let game = save_game(&mut tx, None, &form, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(game))
}

#[put("/api/games/<game_id>", data = "<form>")]
async fn put_game(game_id: GameId, form: Json<GameForm>, user: CurrentUser, db: &State<DbPool>) -> Result<Json<GameRecord>, Custom<String>> {
    let mut tx = db.begin().await?;
    load_game(&mut tx, game_id).await?;
    let creators = load_game_creators(&mut tx, game_id).await?;
    require(&user.actor(), &Resource::Game { creators: &creators }, Capability::Edit)?;
    let game = save_game(&mut tx, Some(game_id), &form, user.id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(Json(game))
}

#[delete("/api/games/<game_id>")]
async fn remove_game(game_id: GameId, user: CurrentUser, db: &State<DbPool>) -> Result<(), Custom<String>> {
    let mut tx = db.begin().await?;
    load_game(&mut tx, game_id).await?;
    let creators = load_game_creators(&mut tx, game_id).await?;
    require(&user.actor(), &Resource::Game { creators: &creators }, Capability::Delete)?;
    delete_game(&mut tx, game_id).await?;
    tx.commit().await.map_err(AppError::from)?;
    Ok(())
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
            get_games,
            get_game,
            post_game,
            put_game,
            remove_game,
        ])
}
