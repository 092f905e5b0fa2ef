use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Build, Rocket};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::migrate::Migrator;
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use crate::error::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("db/migrations");

pub struct DbPool(pub SqlitePool);
impl DbPool {
    pub async fn acquire(&self) -> AppResult<PoolConnection<Sqlite>> {
        Ok(self.0.acquire().await?)
    }
    /// Each registration change runs in one transaction, see `tables::registrations`.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        Ok(self.0.begin().await?)
    }
}

pub struct DbPoolFairing();
#[rocket::async_trait]
impl Fairing for DbPoolFairing {
    fn info(&self) -> Info {
        Info {
            name: "SQLite Database Pool with Migrations",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let database_url = if cfg!(test) {
            "sqlite::memory:".to_string()
        } else {
            let figment = rocket.figment();
            let Ok(database_url) = figment.extract_inner::<String>("database_url") else {
                error!("Config key database_url is not set");
                return Err(rocket);
            };
            if let Some(db_path) = database_url.strip_prefix("sqlite://") {
                if !Path::new(db_path).exists() {
                    info!("Creating database file: {db_path}");
                    if let Err(err) = std::fs::File::create(db_path) {
                        error!("Failed to create SQLite database file {db_path}: {err}");
                        return Err(rocket);
                    }
                }
            }
            database_url
        };

        info!("Opening database: {database_url}");
        let opts = match SqliteConnectOptions::from_str(&database_url) {
            Ok(opts) => opts
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true),
            Err(err) => {
                error!("Invalid database url {database_url}: {err}");
                return Err(rocket);
            }
        };
        // every connection to sqlite::memory: sees its own database, keep exactly one alive
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = match pool_options.connect_with(opts).await {
            Ok(pool) => pool,
            Err(err) => {
                error!("Database connection error: {:?}", err);
                return Err(rocket);
            }
        };

        match MIGRATOR.run(&pool).await {
            Ok(_) => info!("Migrations applied successfully!"),
            Err(err) => {
                error!("Migration error: {:?}", err);
                return Err(rocket);
            }
        };

        Ok(rocket.manage(DbPool(pool)))
    }
}
