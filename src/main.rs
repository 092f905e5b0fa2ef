#[macro_use] extern crate rocket;

use rocket::fairing::AdHoc;
use rocket::fs::FileServer;
use rocket::response::status::Custom;
use rocket::State;
use rocket::tokio::sync::broadcast;
use rocket_dyn_templates::{Template, context, handlebars};
use rocket_dyn_templates::handlebars::{Handlebars, Helper};
use serde::Deserialize;
use crate::datetime::dtstr;
use crate::db::{DbPool, DbPoolFairing};
use crate::tables::conventions::list_convention_events;
use crate::tables::registrations::RegistrationChange;
use crate::tables::runs::list_runs;

#[cfg(test)]
mod tests;
mod auth;
mod authz;
mod conventions;
mod datetime;
mod db;
mod error;
mod games;
mod places;
mod rules;
mod runs;
mod tables;

/// Extracted from the Rocket figment (`Rocket.toml`, `ROCKET_*` env).
#[derive(Deserialize, Default, Debug)]
struct AppConfig {
    #[serde(default)]
    staff_users: Vec<String>,
}

struct AppState {
    registration_changes: broadcast::Sender<RegistrationChange>,
}
impl AppState {
    fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(64);
        Self {
            registration_changes: sender,
        }
    }
    fn broadcast_registration_change(&self, change: RegistrationChange) {
        // no subscribers is the common case
        if self.registration_changes.send(change).is_err() {
            debug!("Registration change dropped, no listeners");
        }
    }
}

#[get("/")]
async fn index(db: &State<DbPool>) -> Result<Template, Custom<String>> {
    let mut conn = db.acquire().await?;
    let events = list_convention_events(&mut conn, None).await?;
    let runs = list_runs(&mut conn, None, None).await?;
    Ok(Template::render("index", context! {
        events,
        runs,
    }))
}

#[launch]
fn rocket() -> _ {
    let rocket = rocket::build()
        .attach(Template::custom(|engines| {
            let handlebars = &mut engines.handlebars;
            handlebars.register_helper("dtstr",
                                       Box::new(|h: &Helper, _r: &Handlebars, _: &handlebars::Context, _rc: &mut handlebars::RenderContext, out: &mut dyn handlebars::Output| -> handlebars::HelperResult {
                                           let val = h.param(0).ok_or(handlebars::RenderErrorReason::ParamNotFoundForIndex("dtstr", 0))?.value();
                                           let s = dtstr(val.as_str());
                                           out.write(&s)?;
                                           Ok(())
                                       }));
        }))
        .attach(DbPoolFairing())
        .attach(AdHoc::config::<AppConfig>())
        .mount("/", FileServer::from("./static"))
        .mount("/", routes![
            index,
        ]);
    let rocket = auth::extend(rocket);
    let rocket = games::extend(rocket);
    let rocket = places::extend(rocket);
    let rocket = conventions::extend(rocket);
    let rocket = runs::extend(rocket);

    rocket.manage(AppState::new())
}
