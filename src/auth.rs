use rocket::http::Status;
use rocket::request::{self, FromRequest};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::{Build, Request, Rocket};
use crate::authz::Actor;
use crate::db::DbPool;
use crate::tables::users::{upsert_user, UserId};
use crate::AppConfig;

/// Identity established by the authenticating reverse proxy in front of the service.
pub const USER_HEADER: &str = "x-langed-user";
pub const EMAIL_HEADER: &str = "x-langed-email";

#[derive(Clone, Debug, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}
impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor { user_id: self.id, is_staff: self.is_staff }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = String;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<CurrentUser, String> {
        let Some(username) = request.headers().get_one(USER_HEADER).map(str::trim).filter(|s| !s.is_empty()) else {
            return request::Outcome::Forward(Status::Unauthorized);
        };
        let email = request.headers().get_one(EMAIL_HEADER);
        let Some(db) = request.rocket().state::<DbPool>() else {
            return request::Outcome::Error((Status::InternalServerError, "database pool not managed".to_string()));
        };
        let is_staff = request.rocket().state::<AppConfig>()
            .is_some_and(|cfg| cfg.staff_users.iter().any(|u| u == username));
        let mut conn = match db.0.acquire().await {
            Ok(conn) => conn,
            Err(e) => return request::Outcome::Error((Status::InternalServerError, e.to_string())),
        };
        match upsert_user(&mut conn, username, email, is_staff).await {
            Ok(user) => request::Outcome::Success(CurrentUser {
                id: user.id,
                username: user.username,
                email: user.email,
                is_staff: user.is_staff,
            }),
            Err(e) => request::Outcome::Error((Status::InternalServerError, e.to_string())),
        }
    }
}

#[get("/api/auth/user")]
fn current_user(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
            current_user,
        ])
}
