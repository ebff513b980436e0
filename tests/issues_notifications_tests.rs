mod common;

use axum::http::StatusCode;
use bustrack::types::Role;
use common::{ADMIN, AUTHORITY, TestApp, error_code};
use serde_json::json;

#[tokio::test]
async fn issue_lifecycle_follows_the_state_machine() {
    let t = TestApp::new("issues").await;
    t.user("driver1", "password123", Role::Driver).await;
    t.user("rider", "password123", Role::Faculty).await;
    let driver = t.login("driver1", "password123").await;
    let rider = t.login("rider", "password123").await;
    let admin = t.login(ADMIN.0, ADMIN.1).await;
    let authority = t.login(AUTHORITY.0, AUTHORITY.1).await;

    let (status, body) = t
        .post(
            "/api/issues",
            &rider,
            json!({ "issue_type": "traffic", "description": "Jam" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, issue) = t
        .post(
            "/api/issues",
            &driver,
            json!({
                "issue_type": "mechanical",
                "description": "Brake warning light on",
                "priority": "high"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{issue}");
    assert_eq!(issue["status"], "pending");
    assert!(issue["bus_id"].is_null());
    let id = issue["id"].as_i64().unwrap();

    let (_, riders_view) = t.get("/api/issues", &rider).await;
    assert!(riders_view.as_array().unwrap().is_empty());
    let (status, _) = t.get(&format!("/api/issues/{id}"), &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, drivers_view) = t.get("/api/issues?status=pending", &driver).await;
    assert_eq!(drivers_view.as_array().unwrap().len(), 1);
    let (_, filtered) = t.get("/api/issues?issue_type=traffic", &authority).await;
    assert!(filtered.as_array().unwrap().is_empty());

    let (status, assigned) = t
        .call("POST", &format!("/api/issues/{id}/assign"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["status"], "in_progress");
    assert!(assigned["assigned_to"].is_i64());

    let (status, comment) = t
        .post(
            &format!("/api/issues/{id}/comments"),
            &driver,
            json!({ "body": "Light still on after restart" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{comment}");

    let (status, resolved) = t
        .post(
            &format!("/api/issues/{id}/resolve"),
            &admin,
            json!({ "resolution_notes": "Brake pads replaced" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");
    assert!(!resolved["resolved_at"].is_null());

    // resolved is terminal
    let (status, body) = t
        .patch(&format!("/api/issues/{id}"), &authority, json!({ "status": "pending" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_TRANSITION");

    let (_, comments) = t.get(&format!("/api/issues/{id}/comments"), &admin).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pending_issue_can_be_cancelled_but_not_reopened() {
    let t = TestApp::new("issue-cancel").await;
    t.user("driver1", "password123", Role::Driver).await;
    let driver = t.login("driver1", "password123").await;
    let authority = t.login(AUTHORITY.0, AUTHORITY.1).await;

    let (_, issue) = t
        .post(
            "/api/issues",
            &driver,
            json!({ "issue_type": "weather", "description": "Flooded underpass" }),
        )
        .await;
    let id = issue["id"].as_i64().unwrap();

    let (status, body) = t
        .patch(&format!("/api/issues/{id}"), &driver, json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, cancelled) = t
        .patch(&format!("/api/issues/{id}"), &authority, json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["resolved_at"].is_null());

    let (status, _) = t
        .patch(&format!("/api/issues/{id}"), &authority, json!({ "status": "in_progress" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notifications_fan_out_to_their_audience() {
    let t = TestApp::new("notify").await;
    t.user("driver1", "password123", Role::Driver).await;
    t.user("rider", "password123", Role::Student).await;
    let driver = t.login("driver1", "password123").await;
    let rider = t.login("rider", "password123").await;
    let authority = t.login(AUTHORITY.0, AUTHORITY.1).await;

    let (status, _) = t
        .post(
            "/api/notifications",
            &rider,
            json!({ "title": "Hi", "message": "no" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = t
        .post(
            "/api/notifications",
            &authority,
            json!({
                "title": "Depot briefing",
                "message": "All drivers report at 07:00",
                "priority": "warning",
                "audience": "drivers"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["recipients"], 1);
    let driver_note = created["notification"]["id"].as_i64().unwrap();

    let (_, created) = t
        .post(
            "/api/notifications",
            &authority,
            json!({ "title": "Holiday", "message": "No service on Friday" }),
        )
        .await;
    // admin, authority, driver and rider
    assert_eq!(created["recipients"], 4);

    let (_, count) = t.get("/api/notifications/unread-count", &driver).await;
    assert_eq!(count["count"], 2);
    let (_, count) = t.get("/api/notifications/unread-count", &rider).await;
    assert_eq!(count["count"], 1);

    let (_, feed) = t.get("/api/notifications", &rider).await;
    let titles: Vec<_> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Holiday"]);

    // riders cannot touch a drivers-only notification
    let (status, _) = t
        .call(
            "POST",
            &format!("/api/notifications/{driver_note}/read"),
            Some(&rider),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .call(
            "POST",
            &format!("/api/notifications/{driver_note}/read"),
            Some(&driver),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, unread) = t.get("/api/notifications/unread", &driver).await;
    assert_eq!(unread.as_array().unwrap().len(), 1);

    let (_, marked) = t
        .call("POST", "/api/notifications/read-all", Some(&driver), None)
        .await;
    assert_eq!(marked["marked"], 1);
    let (_, inbox) = t.get("/api/notifications/inbox", &driver).await;
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| n["is_read"] == true));
}

#[tokio::test]
async fn route_notifications_need_a_target_route() {
    let t = TestApp::new("notify-route").await;
    let admin = t.login(ADMIN.0, ADMIN.1).await;
    let (status, body) = t
        .post(
            "/api/notifications",
            &admin,
            json!({ "title": "Detour", "message": "Road works", "audience": "route" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn feedback_and_reports() {
    let t = TestApp::new("reports").await;
    t.user("rider", "password123", Role::Staff).await;
    let rider = t.login("rider", "password123").await;
    let admin = t.login(ADMIN.0, ADMIN.1).await;

    let (status, _) = t
        .post(
            "/api/feedback",
            &rider,
            json!({ "category": "timing", "rating": 6 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for rating in [4, 2] {
        let (status, _) = t
            .post(
                "/api/feedback",
                &rider,
                json!({ "category": "timing", "rating": rating, "comment": "ok" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = t.get("/api/reports/feedback", &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, summary) = t.get("/api/reports/feedback", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["average_rating"], 3.0);
    assert_eq!(summary["by_category"][0]["category"], "timing");

    let (status, rows) = t.get("/api/reports/export?type=feedback", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 2);
    let (status, body) = t.get("/api/reports/export?type=pdf", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    let (status, _) = t.get("/api/reports/routes?days=0", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recompute_counts_on_time_trips() {
    let t = TestApp::new("recompute").await;
    let admin = t.login(ADMIN.0, ADMIN.1).await;
    let (_, route) = t
        .post("/api/routes", &admin, json!({ "name": "Campus Shuttle" }))
        .await;
    let route_id = route["id"].as_i64().unwrap();
    let (_, bus) = t
        .post(
            "/api/buses",
            &admin,
            json!({ "bus_number": "S-1", "license_plate": "DHK-S1" }),
        )
        .await;
    let bus_id = bus["id"].as_i64().unwrap();

    let trips = [("08:00:00", "08:05:00", 30), ("09:00:00", "09:20:00", 12)];
    for (scheduled, actual, passengers) in trips {
        let (status, body) = t
            .post(
                "/api/trip-logs",
                &admin,
                json!({
                    "bus_id": bus_id,
                    "route_id": route_id,
                    "date": "2025-03-01",
                    "scheduled_departure": scheduled,
                    "actual_departure": actual,
                    "scheduled_arrival": "10:00:00",
                    "passenger_count": passengers,
                    "is_completed": true
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, rows) = t
        .post(
            "/api/reports/analytics/recompute",
            &admin,
            json!({ "date": "2025-03-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["total_trips"], 2);
    assert_eq!(rows[0]["on_time_trips"], 1);
    assert_eq!(rows[0]["delayed_trips"], 1);
    assert_eq!(rows[0]["total_passengers"], 42);
    assert_eq!(rows[0]["average_delay_mins"], 12.5);

    let (status, logs) = t
        .get("/api/trip-logs?from=2025-03-01&to=2025-03-01", &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 2);
}
