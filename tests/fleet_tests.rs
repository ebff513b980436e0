mod common;

use axum::http::StatusCode;
use bustrack::types::Role;
use common::{ADMIN, TestApp, error_code};
use serde_json::{Value, json};

struct Fleet {
    admin: String,
    route_id: i64,
    first_stop: i64,
    second_stop: i64,
    bus_id: i64,
    driver_id: i64,
}

async fn create_driver(t: &TestApp, admin: &str, username: &str) -> i64 {
    let (status, body) = t
        .post(
            "/api/drivers",
            admin,
            json!({
                "username": username,
                "password": "password123",
                "full_name": "Driver",
                "license_number": format!("DL-{username}"),
                "years_experience": 4
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "driver");
    assert_eq!(body["profile"]["years_experience"], 4);
    body["id"].as_i64().unwrap()
}

async fn create_bus(t: &TestApp, admin: &str, number: &str) -> i64 {
    let (status, body) = t
        .post(
            "/api/buses",
            admin,
            json!({ "bus_number": number, "license_plate": format!("DHK-{number}") }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["capacity"], 50);
    body["id"].as_i64().unwrap()
}

async fn create_route(t: &TestApp, admin: &str, name: &str) -> i64 {
    let (status, body) = t
        .post(
            "/api/routes",
            admin,
            json!({ "name": name, "is_published": true, "service_days": "sat_thu" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

fn assignment(bus_id: i64, driver_id: i64, route_id: i64) -> Value {
    json!({
        "bus_id": bus_id,
        "driver_id": driver_id,
        "route_id": route_id,
        "date": "2025-03-01",
        "shift_start": "07:00:00",
        "shift_end": "15:00:00"
    })
}

async fn setup(t: &TestApp) -> Fleet {
    let admin = t.login(ADMIN.0, ADMIN.1).await;
    let route_id = create_route(t, &admin, "Uttara Loop").await;

    let (status, first) = t
        .post(
            &format!("/api/routes/{route_id}/stops"),
            &admin,
            json!({
                "name": "Main Gate",
                "latitude": 23.8859,
                "longitude": 90.4071,
                "stop_order": 1,
                "scheduled_time": "08:00:00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let (status, second) = t
        .post(
            &format!("/api/routes/{route_id}/stops"),
            &admin,
            json!({
                "name": "House Building",
                "latitude": 23.8740,
                "longitude": 90.4000,
                "stop_order": 2,
                "scheduled_time": "08:25:00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{second}");

    let bus_id = create_bus(t, &admin, "B-101").await;
    let driver_id = create_driver(t, &admin, "driver1").await;
    Fleet {
        admin,
        route_id,
        first_stop: first["id"].as_i64().unwrap(),
        second_stop: second["id"].as_i64().unwrap(),
        bus_id,
        driver_id,
    }
}

#[tokio::test]
async fn stop_order_is_unique_per_route() {
    let t = TestApp::new("stop-order").await;
    let f = setup(&t).await;
    let (status, body) = t
        .post(
            &format!("/api/routes/{}/stops", f.route_id),
            &f.admin,
            json!({ "name": "Dup", "latitude": 23.9, "longitude": 90.4, "stop_order": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (status, stops) = t
        .get(&format!("/api/routes/{}/stops", f.route_id), &f.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = stops
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Main Gate", "House Building"]);
}

#[tokio::test]
async fn assignment_generates_schedules_and_is_exclusive() {
    let t = TestApp::new("assign").await;
    let f = setup(&t).await;

    let (status, body) = t
        .post(
            "/api/assignments",
            &f.admin,
            assignment(f.bus_id, f.driver_id, f.route_id),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["is_active"], true);

    let (_, bus) = t.get(&format!("/api/buses/{}", f.bus_id), &f.admin).await;
    assert_eq!(bus["current_route_id"], f.route_id);

    // no trips, so one slot from the first and last stop times, on six service days
    let (status, schedules) = t
        .get(&format!("/api/schedules?route_id={}", f.route_id), &f.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let schedules = schedules.as_array().unwrap();
    assert_eq!(schedules.len(), 6);
    assert!(schedules.iter().all(|s| s["departure_time"] == "08:00:00"));
    assert!(schedules.iter().all(|s| s["arrival_time"] == "08:25:00"));
    assert!(schedules.iter().all(|s| s["day_of_week"] != "fri"));

    // same driver on another bus and route
    let other_bus = create_bus(&t, &f.admin, "B-202").await;
    let other_route = create_route(&t, &f.admin, "Mirpur Express").await;
    let (status, body) = t
        .post(
            "/api/assignments",
            &f.admin,
            assignment(other_bus, f.driver_id, other_route),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains("driver1"));

    // same bus with another driver
    let other_driver = create_driver(&t, &f.admin, "driver2").await;
    let (status, _) = t
        .post(
            "/api/assignments",
            &f.admin,
            assignment(f.bus_id, other_driver, other_route),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // clearing frees the bus and hides its schedules
    let (status, cleared) = t
        .call(
            "POST",
            &format!("/api/buses/{}/assignment/clear", f.bus_id),
            Some(&f.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["is_active"], false);
    let (_, schedules) = t
        .get(&format!("/api/schedules?route_id={}", f.route_id), &f.admin)
        .await;
    assert!(schedules.as_array().unwrap().is_empty());
    let (_, bus) = t.get(&format!("/api/buses/{}", f.bus_id), &f.admin).await;
    assert!(bus["current_route_id"].is_null());

    let (status, _) = t
        .post(
            "/api/assignments",
            &f.admin,
            assignment(f.bus_id, other_driver, other_route),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn eta_becomes_available_once_the_driver_reports() {
    let t = TestApp::new("eta").await;
    let f = setup(&t).await;
    let driver = t.login("driver1", "password123").await;

    // no assignment yet
    let (status, _) = t
        .post(
            "/api/locations",
            &driver,
            json!({ "latitude": 23.8859, "longitude": 90.3971 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    t.post(
        "/api/assignments",
        &f.admin,
        assignment(f.bus_id, f.driver_id, f.route_id),
    )
    .await;

    let (status, eta) = t
        .get(
            &format!("/api/buses/{}/eta/{}", f.bus_id, f.first_stop),
            &driver,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eta["eta"]["status"], "unavailable");
    let (status, _) = t.get(&format!("/api/buses/{}/location", f.bus_id), &driver).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, loc) = t
        .post(
            "/api/locations",
            &driver,
            json!({ "latitude": 23.8859, "longitude": 90.3971 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{loc}");
    assert_eq!(loc["bus_id"], f.bus_id);
    assert_eq!(loc["is_simulated"], false);

    let (status, eta) = t
        .get(
            &format!("/api/buses/{}/eta/{}", f.bus_id, f.first_stop),
            &driver,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eta["eta"]["status"], "available");
    assert_eq!(eta["eta"]["minutes"], 2);
    assert_eq!(eta["eta"]["speed_kmh"], 30.0);

    let (status, route_eta) = t
        .get(&format!("/api/routes/{}/eta", f.route_id), &driver)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route_eta["bus_id"], f.bus_id);
    let stops = route_eta["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 2);
    assert_eq!(stops[1]["stop"]["id"], f.second_stop);
    assert_eq!(stops[1]["eta"]["status"], "available");

    let (status, live) = t.get(&format!("/api/buses/{}/location", f.bus_id), &driver).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["latitude"], 23.8859);

    let (_, active) = t.get("/api/locations/active", &driver).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    let (_, sim) = t.get("/api/locations/status", &driver).await;
    assert_eq!(sim["real_buses"], 1);
    assert_eq!(sim["simulation_mode"], false);
}

#[tokio::test]
async fn crawling_speed_leaves_eta_unavailable() {
    let t = TestApp::new("eta-crawl").await;
    let f = setup(&t).await;
    let driver = t.login("driver1", "password123").await;
    t.post(
        "/api/assignments",
        &f.admin,
        assignment(f.bus_id, f.driver_id, f.route_id),
    )
    .await;

    let (status, loc) = t
        .post(
            "/api/locations",
            &driver,
            json!({ "latitude": 23.8859, "longitude": 90.3971, "speed_kmh": 1e-12 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{loc}");

    let (status, eta) = t
        .get(
            &format!("/api/buses/{}/eta/{}", f.bus_id, f.first_stop),
            &driver,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eta["eta"]["status"], "unavailable");

    let (status, route_eta) = t
        .get(&format!("/api/routes/{}/eta", f.route_id), &driver)
        .await;
    assert_eq!(status, StatusCode::OK);
    for stop in route_eta["stops"].as_array().unwrap() {
        assert_eq!(stop["eta"]["status"], "unavailable");
    }
}

#[tokio::test]
async fn driver_delay_alert_reaches_riders() {
    let t = TestApp::new("delay").await;
    let f = setup(&t).await;
    t.user("rider", "password123", Role::Student).await;
    let driver = t.login("driver1", "password123").await;
    let rider = t.login("rider", "password123").await;

    let (status, _) = t
        .post("/api/locations/delay", &rider, json!({ "delay_minutes": 5 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .post("/api/locations/delay", &driver, json!({ "delay_minutes": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    t.post(
        "/api/assignments",
        &f.admin,
        assignment(f.bus_id, f.driver_id, f.route_id),
    )
    .await;

    let (status, alert) = t
        .post(
            "/api/locations/delay",
            &driver,
            json!({ "reason": "Traffic at Airport Road" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{alert}");
    assert_eq!(alert["notification"]["title"], "Delay Alert: Uttara Loop");
    assert_eq!(alert["notification"]["priority"], "warning");
    assert_eq!(
        alert["notification"]["message"],
        "Bus B-101 on route Uttara Loop is delayed by approximately 10 minutes. \
         Traffic at Airport Road"
    );
    // admin, authority, driver and rider
    assert_eq!(alert["recipients"], 4);

    let (_, inbox) = t.get("/api/notifications/inbox", &rider).await;
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["title"], "Delay Alert: Uttara Loop");
    assert_eq!(inbox[0]["is_read"], false);
    let (_, inbox) = t.get("/api/notifications/inbox", &f.admin).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);

    let (status, _) = t
        .post("/api/locations/delay", &driver, json!({ "delay_minutes": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_shift_start_and_end() {
    let t = TestApp::new("shift").await;
    let f = setup(&t).await;
    let driver = t.login("driver1", "password123").await;

    let (status, mine) = t.get("/api/assignments/mine", &driver).await;
    assert_eq!(status, StatusCode::OK);
    assert!(mine.is_null());

    t.post(
        "/api/assignments",
        &f.admin,
        assignment(f.bus_id, f.driver_id, f.route_id),
    )
    .await;

    let (status, _) = t
        .call("POST", "/api/assignments/mine/end", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, started) = t
        .call("POST", "/api/assignments/mine/start", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!started["started_at"].is_null());

    let (status, ended) = t
        .call("POST", "/api/assignments/mine/end", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ended["ended_at"].is_null());

    let (status, dash) = t.get("/api/dashboard", &driver).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["panel"], "driver");
    assert_eq!(dash["bus"]["bus_number"], "B-101");
    assert_eq!(dash["route"]["name"], "Uttara Loop");
}

#[tokio::test]
async fn riders_only_see_published_routes() {
    let t = TestApp::new("published").await;
    let admin = t.login(ADMIN.0, ADMIN.1).await;
    let (_, draft) = t
        .post("/api/routes", &admin, json!({ "name": "Draft Route" }))
        .await;
    let draft_id = draft["id"].as_i64().unwrap();
    let published = create_route(&t, &admin, "Live Route").await;

    t.user("rider", "password123", bustrack::types::Role::Student)
        .await;
    let rider = t.login("rider", "password123").await;

    let (_, routes) = t.get("/api/routes", &rider).await;
    let ids: Vec<_> = routes
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [published]);

    let (status, _) = t.get(&format!("/api/routes/{draft_id}"), &rider).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.get(&format!("/api/routes/{draft_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
}
