use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use crate::error::{AppError, AppResult, RuleError};
use crate::tables::users::{add_member, load_members, UserId};

pub type GameId = i64;

pub const DEFAULT_PLAYERS_MIN: i64 = 1;
pub const DEFAULT_PLAYERS_MAX: i64 = 10;

#[derive(Serialize, Deserialize, FromRow, Clone, Debug)]
pub struct GameRecord {
    pub id: GameId,
    pub name: String,
    pub announcement: String,
    pub red_flags: String,
    pub players_min: i64,
    pub players_max: i64,
    pub female_roles_min: i64,
    pub female_roles_max: i64,
    pub male_roles_min: i64,
    pub male_roles_max: i64,
    /// Declared technician headcount. Informational, technician signups are not capacity gated.
    pub technicians: i64,
    pub created_at: DateTime<Utc>,
}

fn default_players_min() -> i64 { DEFAULT_PLAYERS_MIN }
fn default_players_max() -> i64 { DEFAULT_PLAYERS_MAX }

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GameForm {
    pub name: String,
    #[serde(default)]
    pub announcement: String,
    #[serde(default)]
    pub red_flags: String,
    #[serde(default = "default_players_min")]
    pub players_min: i64,
    #[serde(default = "default_players_max")]
    pub players_max: i64,
    #[serde(default)]
    pub female_roles_min: i64,
    #[serde(default)]
    pub female_roles_max: i64,
    #[serde(default)]
    pub male_roles_min: i64,
    #[serde(default)]
    pub male_roles_max: i64,
    #[serde(default)]
    pub technicians: i64,
}
impl GameForm {
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::Invalid("Game name must be set".to_string()));
        }
        for (what, min, max) in [
            ("players", self.players_min, self.players_max),
            ("female roles", self.female_roles_min, self.female_roles_max),
            ("male roles", self.male_roles_min, self.male_roles_max),
        ] {
            if min < 0 || max < 0 {
                return Err(RuleError::Invalid(format!("Count of {what} cannot be negative")));
            }
            if min > max {
                return Err(RuleError::Invalid(format!("Minimum of {what} ({min}) is greater than maximum ({max})")));
            }
        }
        if self.technicians < 0 {
            return Err(RuleError::Invalid("Count of technicians cannot be negative".to_string()));
        }
        Ok(())
    }
}

pub async fn load_game(conn: &mut SqliteConnection, game_id: GameId) -> AppResult<GameRecord> {
    sqlx::query_as::<_, GameRecord>("SELECT * FROM games WHERE id=?")
        .bind(game_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Game id={game_id}")))
}

pub async fn list_games(conn: &mut SqliteConnection) -> AppResult<Vec<GameRecord>> {
    Ok(sqlx::query_as::<_, GameRecord>("SELECT * FROM games ORDER BY created_at DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn load_game_creators(conn: &mut SqliteConnection, game_id: GameId) -> AppResult<Vec<UserId>> {
    load_members(conn, "game_creators", "game_id", game_id).await
}

pub async fn save_game(conn: &mut SqliteConnection, game_id: Option<GameId>, form: &GameForm, creator: UserId) -> AppResult<GameRecord> {
    form.validate()?;
    let game = if let Some(game_id) = game_id {
        sqlx::query_as::<_, GameRecord>("UPDATE games SET name=?, announcement=?, red_flags=?, players_min=?, players_max=?, \
                female_roles_min=?, female_roles_max=?, male_roles_min=?, male_roles_max=?, technicians=? \
                WHERE id=? RETURNING *")
            .bind(form.name.trim())
            .bind(&form.announcement)
            .bind(&form.red_flags)
            .bind(form.players_min)
            .bind(form.players_max)
            .bind(form.female_roles_min)
            .bind(form.female_roles_max)
            .bind(form.male_roles_min)
            .bind(form.male_roles_max)
            .bind(form.technicians)
            .bind(game_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Game id={game_id}")))?
    } else {
        let game = sqlx::query_as::<_, GameRecord>("INSERT INTO games (name, announcement, red_flags, players_min, players_max, \
                female_roles_min, female_roles_max, male_roles_min, male_roles_max, technicians, created_at) \
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *")
            .bind(form.name.trim())
            .bind(&form.announcement)
            .bind(&form.red_flags)
            .bind(form.players_min)
            .bind(form.players_max)
            .bind(form.female_roles_min)
            .bind(form.female_roles_max)
            .bind(form.male_roles_min)
            .bind(form.male_roles_max)
            .bind(form.technicians)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
        add_member(conn, "game_creators", "game_id", game.id, creator).await?;
        info!("Game created, id: {}, name: {}", game.id, game.name);
        game
    };
    Ok(game)
}

pub async fn delete_game(conn: &mut SqliteConnection, game_id: GameId) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM games WHERE id=?")
        .bind(game_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Game id={game_id}")));
    }
    info!("Game deleted, id: {game_id}");
    Ok(())
}
