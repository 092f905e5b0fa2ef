use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalRequest};
use serde_json::{json, Value};
use crate::auth::USER_HEADER;

const STAFF: &str = "admin";

fn create_test_server() -> Client {
    let figment = rocket::Config::figment()
        .merge(("staff_users", vec![STAFF]));
    Client::tracked(super::rocket().configure(figment)).unwrap()
}

fn as_user<'c>(req: LocalRequest<'c>, username: &str) -> LocalRequest<'c> {
    req.header(Header::new(USER_HEADER, username.to_string()))
}

fn user_id(client: &Client, username: &str) -> i64 {
    let resp = as_user(client.get("/api/auth/user"), username).dispatch();
    assert_eq!(resp.status(), Status::Ok);
    resp.into_json::<Value>().unwrap()["id"].as_i64().unwrap()
}

fn post_ok(client: &Client, username: &str, uri: &str, body: Value) -> Value {
    let resp = as_user(client.post(uri.to_string()), username).json(&body).dispatch();
    assert_eq!(resp.status(), Status::Ok, "POST {uri}");
    resp.into_json::<Value>().unwrap()
}

fn create_city(client: &Client) -> i64 {
    post_ok(client, STAFF, "/api/cities", json!({"name": "Praha", "utc_offset_minutes": 60}))["id"].as_i64().unwrap()
}

fn create_game(client: &Client, creator: &str, players_max: i64) -> i64 {
    post_ok(client, creator, "/api/games", json!({"name": "Dune", "players_max": players_max}))["id"].as_i64().unwrap()
}

fn create_run(client: &Client, master: &str, run: Value) -> Value {
    post_ok(client, master, "/api/runs", run)
}

fn register(client: &Client, username: &str, run_id: i64) -> (Status, Value) {
    let resp = as_user(client.post(format!("/api/runs/{run_id}/register")), username).dispatch();
    let status = resp.status();
    let body = if status == Status::Ok { resp.into_json::<Value>().unwrap() } else { Value::Null };
    (status, body)
}

struct RunFixture {
    client: Client,
    run_id: i64,
}

fn run_with_capacity(max_players: i64) -> RunFixture {
    let client = create_test_server();
    let city_id = create_city(&client);
    let game_id = create_game(&client, "gm", 10);
    let run = create_run(&client, "gm", json!({
        "game_id": game_id,
        "city_id": city_id,
        "date": "2025-05-01T18:30",
        "max_players": max_players,
    }));
    let run_id = run["id"].as_i64().unwrap();
    RunFixture { client, run_id }
}

fn set_run_status(client: &Client, run_id: i64, registration_id: i64, status: &str) -> Status {
    as_user(client.put(format!("/api/runs/{run_id}/registrations/{registration_id}/status")), "gm")
        .json(&json!({"status": status}))
        .dispatch()
        .status()
}

#[test]
fn current_user_requires_identity() {
    let client = create_test_server();
    let resp = client.get("/api/auth/user").dispatch();
    assert_eq!(resp.status(), Status::Unauthorized);

    let resp = as_user(client.get("/api/auth/user"), STAFF).dispatch();
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.content_type(), Some(ContentType::JSON));
    let user = resp.into_json::<Value>().unwrap();
    assert_eq!(user["username"], "admin");
    assert_eq!(user["is_staff"], true);

    let user = as_user(client.get("/api/auth/user"), "p1").dispatch().into_json::<Value>().unwrap();
    assert_eq!(user["is_staff"], false);
}

#[test]
fn register_without_identity() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let resp = client.post(format!("/api/runs/{run_id}/register")).dispatch();
    assert_eq!(resp.status(), Status::Unauthorized);
}

#[test]
fn third_player_goes_to_waitlist() {
    let RunFixture { client, run_id } = run_with_capacity(2);

    let (status, reg) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Ok);
    assert_eq!(reg["status"], "pending");
    assert_eq!(set_run_status(&client, run_id, reg["id"].as_i64().unwrap(), "confirmed"), Status::Ok);
    let (_, reg) = register(&client, "p2", run_id);
    assert_eq!(reg["status"], "pending");
    assert_eq!(set_run_status(&client, run_id, reg["id"].as_i64().unwrap(), "confirmed"), Status::Ok);
    let (status, reg) = register(&client, "p3", run_id);
    assert_eq!(status, Status::Ok);
    assert_eq!(reg["status"], "waitlist");

    let run = client.get(format!("/api/runs/{run_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(run["effective_max_players"], 2);
    assert_eq!(run["registered_count"], 2);
    assert_eq!(run["available_slots"], 0);
    assert_eq!(run["is_full"], true);
}

#[test]
fn technician_ignores_capacity() {
    let RunFixture { client, run_id } = run_with_capacity(1);
    register(&client, "p1", run_id);
    let resp = as_user(client.post(format!("/api/runs/{run_id}/register")), "tech")
        .json(&json!({"is_technician": true}))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let reg = resp.into_json::<Value>().unwrap();
    assert_eq!(reg["status"], "pending");
    assert_eq!(reg["is_technician"], true);

    let run = client.get(format!("/api/runs/{run_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(run["registered_count"], 1);
}

#[test]
fn confirmed_leave_promotes_oldest_waitlisted() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let (_, first) = register(&client, "p1", run_id);
    register(&client, "p2", run_id);
    let (_, third) = register(&client, "p3", run_id);
    let (_, fourth) = register(&client, "p4", run_id);
    assert_eq!(third["status"], "waitlist");
    assert_eq!(fourth["status"], "waitlist");

    assert_eq!(set_run_status(&client, run_id, first["id"].as_i64().unwrap(), "confirmed"), Status::Ok);

    let resp = as_user(client.delete(format!("/api/runs/{run_id}/register")), "p1").dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let outcome = resp.into_json::<Value>().unwrap();
    assert_eq!(outcome["removed"]["status"], "confirmed");
    assert_eq!(outcome["promoted"]["id"], third["id"]);
    assert_eq!(outcome["promoted"]["status"], "pending");

    let regs = as_user(client.get(format!("/api/runs/{run_id}/registrations")), "gm").dispatch().into_json::<Value>().unwrap();
    let statuses: Vec<(i64, String)> = regs.as_array().unwrap().iter()
        .map(|r| (r["id"].as_i64().unwrap(), r["status"].as_str().unwrap().to_string()))
        .collect();
    assert!(statuses.contains(&(third["id"].as_i64().unwrap(), "pending".to_string())));
    assert!(statuses.contains(&(fourth["id"].as_i64().unwrap(), "waitlist".to_string())));
}

#[test]
fn waitlisted_leave_promotes_nobody() {
    let RunFixture { client, run_id } = run_with_capacity(1);
    let (_, first) = register(&client, "p1", run_id);
    register(&client, "p2", run_id);
    let (_, third) = register(&client, "p3", run_id);
    set_run_status(&client, run_id, first["id"].as_i64().unwrap(), "confirmed");

    let outcome = as_user(client.delete(format!("/api/runs/{run_id}/register")), "p2").dispatch().into_json::<Value>().unwrap();
    assert_eq!(outcome["removed"]["status"], "waitlist");
    assert_eq!(outcome["promoted"], Value::Null);

    let regs = as_user(client.get(format!("/api/runs/{run_id}/registrations")), "gm").dispatch().into_json::<Value>().unwrap();
    let third_now = regs.as_array().unwrap().iter().find(|r| r["id"] == third["id"]).unwrap();
    assert_eq!(third_now["status"], "waitlist");
}

#[test]
fn pending_leave_promotes_nobody() {
    let RunFixture { client, run_id } = run_with_capacity(1);
    register(&client, "p1", run_id);
    register(&client, "p2", run_id);
    let outcome = as_user(client.delete(format!("/api/runs/{run_id}/register")), "p1").dispatch().into_json::<Value>().unwrap();
    assert_eq!(outcome["removed"]["status"], "pending");
    assert_eq!(outcome["promoted"], Value::Null);
}

#[test]
fn unregister_without_registration() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let resp = as_user(client.delete(format!("/api/runs/{run_id}/register")), "p1").dispatch();
    assert_eq!(resp.status(), Status::NotFound);
}

#[test]
fn duplicate_registration_rejected() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let (status, _) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Ok);
    let (status, _) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Conflict);
}

#[test]
fn master_cannot_register() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let (status, _) = register(&client, "gm", run_id);
    assert_eq!(status, Status::Conflict);
}

#[test]
fn closed_run_rejects_registration() {
    let client = create_test_server();
    let city_id = create_city(&client);
    let game_id = create_game(&client, "gm", 10);
    let run = create_run(&client, "gm", json!({
        "game_id": game_id,
        "city_id": city_id,
        "date": "2025-05-01T18:30",
        "registration_open": false,
    }));
    let (status, _) = register(&client, "p1", run["id"].as_i64().unwrap());
    assert_eq!(status, Status::Conflict);
}

#[test]
fn run_capacity_override() {
    let client = create_test_server();
    let city_id = create_city(&client);
    let game_id = create_game(&client, "gm", 10);

    let run = create_run(&client, "gm", json!({
        "game_id": game_id,
        "city_id": city_id,
        "date": "2025-05-01T18:30",
        "max_players": 5,
    }));
    assert_eq!(run["effective_max_players"], 5);
    assert_eq!(run["available_slots"], 5);

    let run = create_run(&client, "gm", json!({
        "game_id": game_id,
        "city_id": city_id,
        "date": "2025-05-02T18:30",
    }));
    assert_eq!(run["max_players"], Value::Null);
    assert_eq!(run["effective_max_players"], 10);
    assert_eq!(run["game_name"], "Dune");
    assert_eq!(run["masters"], json!([user_id(&client, "gm")]));
}

#[test]
fn invalid_status_rejected() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let (_, reg) = register(&client, "p1", run_id);
    let reg_id = reg["id"].as_i64().unwrap();
    assert_eq!(set_run_status(&client, run_id, reg_id, "bogus"), Status::UnprocessableEntity);
    assert_eq!(set_run_status(&client, run_id, reg_id, "cancelled"), Status::Ok);
}

#[test]
fn only_masters_manage_registrations() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let (_, reg) = register(&client, "p1", run_id);

    let resp = as_user(client.get(format!("/api/runs/{run_id}/registrations")), "p2").dispatch();
    assert_eq!(resp.status(), Status::Forbidden);
    let resp = as_user(client.put(format!("/api/runs/{run_id}/registrations/{}/status", reg["id"])), "p1")
        .json(&json!({"status": "confirmed"}))
        .dispatch();
    assert_eq!(resp.status(), Status::Forbidden);

    let resp = as_user(client.get(format!("/api/runs/{run_id}/registrations")), STAFF).dispatch();
    assert_eq!(resp.status(), Status::Ok);
}

#[test]
fn second_master_added() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let co_id = user_id(&client, "co");
    let run = post_ok(&client, "gm", &format!("/api/runs/{run_id}/masters"), json!({"user_id": co_id}));
    assert!(run["masters"].as_array().unwrap().contains(&json!(co_id)));
    let (status, _) = register(&client, "co", run_id);
    assert_eq!(status, Status::Conflict);

    let resp = as_user(client.delete(format!("/api/runs/{run_id}/masters/{co_id}")), "gm").dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let (status, _) = register(&client, "co", run_id);
    assert_eq!(status, Status::Ok);
}

struct EventFixture {
    client: Client,
    city_id: i64,
    game_id: i64,
    convention_id: i64,
    event_id: i64,
}

fn convention_event(capacity: Option<i64>) -> EventFixture {
    let client = create_test_server();
    let city_id = create_city(&client);
    let game_id = create_game(&client, "gm", 10);
    let convention = post_ok(&client, STAFF, "/api/conventions", json!({"name": "Krakon"}));
    let convention_id = convention["id"].as_i64().unwrap();
    let event = post_ok(&client, STAFF, "/api/convention-events", json!({
        "convention_id": convention_id,
        "city_id": city_id,
        "date_start": "2025-05-01",
        "date_end": "2025-05-03",
        "capacity": capacity,
    }));
    let event_id = event["id"].as_i64().unwrap();
    EventFixture { client, city_id, game_id, convention_id, event_id }
}

#[test]
fn convention_gate() {
    let EventFixture { client, city_id, game_id, event_id, .. } = convention_event(None);
    let run = create_run(&client, STAFF, json!({
        "game_id": game_id,
        "city_id": city_id,
        "convention_event_id": event_id,
        "date": "2025-05-02T10:00",
    }));
    let run_id = run["id"].as_i64().unwrap();

    let (status, _) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Forbidden);

    let event_reg = post_ok(&client, "p1", &format!("/api/convention-events/{event_id}/register"), json!({"comment": "first time"}));
    assert_eq!(event_reg["status"], "pending");
    let (status, _) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Forbidden);

    let resp = as_user(client.put(format!("/api/convention-events/{event_id}/registrations/{}/status", event_reg["id"])), STAFF)
        .json(&json!({"status": "confirmed"}))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);

    let (status, reg) = register(&client, "p1", run_id);
    assert_eq!(status, Status::Ok);
    assert_eq!(reg["status"], "pending");
}

#[test]
fn run_outside_event_dates() {
    let EventFixture { client, city_id, game_id, event_id, .. } = convention_event(None);
    let resp = as_user(client.post("/api/runs"), STAFF)
        .json(&json!({
            "game_id": game_id,
            "city_id": city_id,
            "convention_event_id": event_id,
            "date": "2025-05-05T10:00",
        }))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);

    // last day is inclusive
    let run = create_run(&client, STAFF, json!({
        "game_id": game_id,
        "city_id": city_id,
        "convention_event_id": event_id,
        "date": "2025-05-03T23:00",
    }));
    assert_eq!(run["convention_event_id"], event_id);
}

#[test]
fn run_in_event_requires_organizer() {
    let EventFixture { client, city_id, game_id, event_id, .. } = convention_event(None);
    let resp = as_user(client.post("/api/runs"), "gm")
        .json(&json!({
            "game_id": game_id,
            "city_id": city_id,
            "convention_event_id": event_id,
            "date": "2025-05-02T10:00",
        }))
        .dispatch();
    assert_eq!(resp.status(), Status::Forbidden);
}

#[test]
fn event_capacity() {
    let EventFixture { client, event_id, .. } = convention_event(Some(1));
    let first = post_ok(&client, "p1", &format!("/api/convention-events/{event_id}/register"), json!({}));
    let resp = as_user(client.post(format!("/api/convention-events/{event_id}/register")), "p2").dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let second = resp.into_json::<Value>().unwrap();

    let confirm = |reg: &Value| {
        as_user(client.put(format!("/api/convention-events/{event_id}/registrations/{}/status", reg["id"])), STAFF)
            .json(&json!({"status": "confirmed"}))
            .dispatch()
            .status()
    };
    assert_eq!(confirm(&first), Status::Ok);
    assert_eq!(confirm(&second), Status::Conflict);

    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["confirmed_count"], 1);
    assert_eq!(event["available_slots"], 0);

    let resp = as_user(client.post(format!("/api/convention-events/{event_id}/register")), "p3").dispatch();
    assert_eq!(resp.status(), Status::Conflict);
}

#[test]
fn event_dates_validated() {
    let EventFixture { client, city_id, convention_id, .. } = convention_event(None);
    let resp = as_user(client.post("/api/convention-events"), STAFF)
        .json(&json!({
            "convention_id": convention_id,
            "city_id": city_id,
            "date_start": "2025-05-03",
            "date_end": "2025-05-01",
        }))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);
}

#[test]
fn inherit_event_organizers() {
    let EventFixture { client, convention_id, event_id, .. } = convention_event(None);
    let admin_id = user_id(&client, STAFF);
    let org_id = user_id(&client, "org2");
    post_ok(&client, STAFF, &format!("/api/conventions/{convention_id}/organizers"), json!({"user_id": org_id}));

    let resp = as_user(client.post("/api/convention-events/inherit-organizers"), "org2").dispatch();
    assert_eq!(resp.status(), Status::Forbidden);

    let report = post_ok(&client, STAFF, "/api/convention-events/inherit-organizers", json!({}));
    assert_eq!(report["updated"], json!([]));
    assert_eq!(report["skipped"], json!([event_id]));

    let report = post_ok(&client, STAFF, "/api/convention-events/inherit-organizers?force=true&dry_run=true", json!({}));
    assert_eq!(report["updated"], json!([event_id]));
    assert_eq!(report["dry_run"], true);
    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["organizers"], json!([admin_id]));

    post_ok(&client, STAFF, "/api/convention-events/inherit-organizers?force=true", json!({}));
    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["organizers"], json!([admin_id, org_id]));
}

#[test]
fn common_events_within_event() {
    let EventFixture { client, event_id, .. } = convention_event(None);
    let common = post_ok(&client, STAFF, "/api/common-events", json!({
        "convention_event_id": event_id,
        "title": "Opening",
        "date": "2025-05-01 09:00",
    }));
    assert_eq!(common["duration_minutes"], 60);

    let resp = as_user(client.post("/api/common-events"), STAFF)
        .json(&json!({
            "convention_event_id": event_id,
            "title": "Afterparty",
            "date": "2025-05-04T22:00",
        }))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);

    let list = client.get(format!("/api/convention-events/{event_id}/common-events")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[test]
fn game_edit_rights() {
    let client = create_test_server();
    let game_id = create_game(&client, "gm", 6);
    let resp = as_user(client.put(format!("/api/games/{game_id}")), "p1")
        .json(&json!({"name": "Dune II"}))
        .dispatch();
    assert_eq!(resp.status(), Status::Forbidden);

    let resp = as_user(client.put(format!("/api/games/{game_id}")), "gm")
        .json(&json!({"name": "Dune II", "players_min": 8, "players_max": 4}))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);

    let resp = as_user(client.delete(format!("/api/games/{game_id}")), STAFF).dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let resp = client.get(format!("/api/games/{game_id}")).dispatch();
    assert_eq!(resp.status(), Status::NotFound);
}

#[test]
fn places_are_staff_only() {
    let client = create_test_server();
    let resp = as_user(client.post("/api/cities"), "p1")
        .json(&json!({"name": "Brno"}))
        .dispatch();
    assert_eq!(resp.status(), Status::Forbidden);

    let city_id = create_city(&client);
    let venue = post_ok(&client, STAFF, "/api/venues", json!({"city_id": city_id, "name": "Lucerna"}));
    post_ok(&client, STAFF, "/api/rooms", json!({"venue_id": venue["id"], "name": "Hall", "capacity": 40}));
    let rooms = client.get(format!("/api/venues/{}/rooms", venue["id"])).dispatch().into_json::<Value>().unwrap();
    assert_eq!(rooms[0]["name"], "Hall");
}

#[test]
fn index_lists_runs() {
    let RunFixture { client, run_id } = run_with_capacity(3);
    register(&client, "p1", run_id);
    let resp = client.get("/").dispatch();
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.content_type(), Some(ContentType::HTML));
    let html = resp.into_string().unwrap();
    assert!(html.contains("Dune"));
    assert!(html.contains("2025-05-01 18:30"));
    assert!(html.contains("1 / 3"));
}

#[test]
fn deleting_convention_detaches_runs() {
    let EventFixture { client, city_id, game_id, convention_id, event_id } = convention_event(None);
    let run = create_run(&client, STAFF, json!({
        "game_id": game_id,
        "city_id": city_id,
        "convention_event_id": event_id,
        "date": "2025-05-02T10:00",
    }));
    let resp = as_user(client.delete(format!("/api/conventions/{convention_id}")), "p1").dispatch();
    assert_eq!(resp.status(), Status::Forbidden);
    let resp = as_user(client.delete(format!("/api/conventions/{convention_id}")), STAFF).dispatch();
    assert_eq!(resp.status(), Status::Ok);

    let resp = client.get(format!("/api/convention-events/{event_id}")).dispatch();
    assert_eq!(resp.status(), Status::NotFound);
    let run = client.get(format!("/api/runs/{}", run["id"])).dispatch().into_json::<Value>().unwrap();
    assert_eq!(run["convention_event_id"], Value::Null);
}

#[test]
fn shrinking_event_keeps_scheduled_runs_inside() {
    let EventFixture { client, city_id, game_id, convention_id, event_id } = convention_event(None);
    let run = create_run(&client, STAFF, json!({
        "game_id": game_id,
        "city_id": city_id,
        "convention_event_id": event_id,
        "date": "2025-05-03T10:00",
    }));
    let event_form = |date_end: &str| json!({
        "convention_id": convention_id,
        "city_id": city_id,
        "date_start": "2025-05-01",
        "date_end": date_end,
    });

    let resp = as_user(client.put(format!("/api/convention-events/{event_id}")), STAFF)
        .json(&event_form("2025-05-01"))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);
    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["date_end"], "2025-05-03");

    // common events hold the range too
    as_user(client.delete(format!("/api/runs/{}", run["id"])), STAFF).dispatch();
    post_ok(&client, STAFF, "/api/common-events", json!({
        "convention_event_id": event_id,
        "title": "Closing",
        "date": "2025-05-02T20:00",
    }));
    let resp = as_user(client.put(format!("/api/convention-events/{event_id}")), STAFF)
        .json(&event_form("2025-05-01"))
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);

    let resp = as_user(client.put(format!("/api/convention-events/{event_id}")), STAFF)
        .json(&event_form("2025-05-02"))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.into_json::<Value>().unwrap()["date_end"], "2025-05-02");
}

#[test]
fn malformed_registration_body_rejected() {
    let RunFixture { client, run_id } = run_with_capacity(2);
    let resp = as_user(client.post(format!("/api/runs/{run_id}/register")), "p1")
        .header(ContentType::JSON)
        .body(r#"{"is_technician": "yes", "role_preference": "femal"}"#)
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);
    let run = client.get(format!("/api/runs/{run_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(run["registered_count"], 0);

    let resp = as_user(client.post(format!("/api/runs/{run_id}/register")), "p1")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch();
    assert_ne!(resp.status(), Status::Ok);

    let reg = post_ok(&client, "p1", &format!("/api/runs/{run_id}/register"), json!({"role_preference": "female"}));
    assert_eq!(reg["role_preference"], "female");
    assert_eq!(reg["is_technician"], false);
}

#[test]
fn malformed_event_registration_body_rejected() {
    let EventFixture { client, event_id, .. } = convention_event(None);
    let resp = as_user(client.post(format!("/api/convention-events/{event_id}/register")), "p1")
        .header(ContentType::JSON)
        .body(r#"{"comment": 42}"#)
        .dispatch();
    assert_eq!(resp.status(), Status::UnprocessableEntity);
    let resp = as_user(client.post(format!("/api/convention-events/{event_id}/register")), "p1").dispatch();
    assert_eq!(resp.status(), Status::Ok);
}

#[test]
fn leave_convention_event() {
    let EventFixture { client, event_id, .. } = convention_event(Some(2));
    let registration = post_ok(&client, "p1", &format!("/api/convention-events/{event_id}/register"), json!({}));
    let resp = as_user(client.put(format!("/api/convention-events/{event_id}/registrations/{}/status", registration["id"])), STAFF)
        .json(&json!({"status": "confirmed"}))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["confirmed_count"], 1);
    assert_eq!(event["available_slots"], 1);

    let resp = as_user(client.delete(format!("/api/convention-events/{event_id}/register")), "p1").dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let removed = resp.into_json::<Value>().unwrap();
    assert_eq!(removed["id"], registration["id"]);
    assert_eq!(removed["status"], "confirmed");

    let event = client.get(format!("/api/convention-events/{event_id}")).dispatch().into_json::<Value>().unwrap();
    assert_eq!(event["confirmed_count"], 0);
    assert_eq!(event["available_slots"], 2);

    let resp = as_user(client.delete(format!("/api/convention-events/{event_id}/register")), "p1").dispatch();
    assert_eq!(resp.status(), Status::NotFound);
}

#[test]
fn index_shows_zero_capacity_event_as_full() {
    let EventFixture { client, .. } = convention_event(Some(0));
    let event = client.get("/api/convention-events").dispatch().into_json::<Value>().unwrap();
    assert_eq!(event[0]["unlimited"], false);
    assert_eq!(event[0]["available_slots"], 0);
    let html = client.get("/").dispatch().into_string().unwrap();
    assert!(html.contains("Krakon"));
    assert!(!html.contains("unlimited"));
}
