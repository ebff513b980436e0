#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use bustrack::config::Config;
use bustrack::db::Storage;
use bustrack::db::users::NewUser;
use bustrack::router::{AppState, app_router};
use bustrack::service::password::hash_password;
use bustrack::service::seed::seed_defaults;
use bustrack::types::{ApprovalStatus, Role};
use serde_json::Value;
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin", "admin123");
pub const AUTHORITY: (&str, &str) = ("authority", "authority123");

/// Router over a throwaway SQLite file with the default accounts seeded.
pub struct TestApp {
    pub app: Router,
    pub storage: Storage,
    pub config: Config,
    path: PathBuf,
}

pub fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "bustrack-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    path
}

impl TestApp {
    pub async fn new(tag: &str) -> Self {
        let path = temp_db_path(tag);
        let storage = Storage::connect(&format!("sqlite:{}", path.display()))
            .await
            .expect("failed to open test database");

        let mut config = Config::default();
        config.basic.insecure_cookie = true;
        config.auth.login_per_minute = 1000;
        seed_defaults(&storage, &config.seed)
            .await
            .expect("seeding failed");

        let state = AppState::new(storage.clone(), &config).expect("failed to build state");
        Self {
            app: app_router(state),
            storage,
            config,
            path,
        }
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let resp = self.app.clone().oneshot(req).await.expect("request failed");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(cookie), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, cookie: &str, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", uri, Some(cookie), Some(body)).await
    }

    /// Log in and return the `name=value` pair to send back as a cookie.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "username": username, "password": password }).to_string(),
            ))
            .expect("failed to build request");
        let resp = self.app.clone().oneshot(req).await.expect("request failed");
        assert_eq!(resp.status(), StatusCode::OK, "login failed for {username}");
        let set_cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .expect("login did not set a cookie")
            .to_str()
            .expect("set-cookie was not ascii");
        set_cookie
            .split(';')
            .next()
            .expect("empty set-cookie")
            .to_string()
    }

    /// Approved, active account created straight in storage.
    pub async fn user(&self, username: &str, password: &str, role: Role) -> i64 {
        self.storage
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: hash_password(password).expect("hashing failed"),
                full_name: username.to_string(),
                email: None,
                phone: None,
                role,
                university_id: None,
                employee_id: None,
                approval_status: ApprovalStatus::Approved,
                is_active: true,
            })
            .await
            .expect("failed to create user")
            .id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
