#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use campus_shuttle::entity::{user, Role};
use campus_shuttle::migration::{Migrator, MigratorTrait};
use campus_shuttle::password::MIN_COST;
use campus_shuttle::storage::NewUser;
use campus_shuttle::{app, AppState, Config, PasswordHasher};
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl TestResponse {
    /// The `name=value` pair of the session cookie.
    pub fn cookie(&self) -> String {
        self.set_cookie
            .as_deref()
            .and_then(|raw| raw.split(';').next())
            .expect("response sets no cookie")
            .to_string()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opt).await.unwrap();
        Migrator::up(&conn, None).await.unwrap();

        let config =
            Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "sqlite::memory:".into()))
                .unwrap();
        let state = AppState::new(conn, PasswordHasher::new(MIN_COST));
        let router = app(state.clone(), &config).unwrap();
        Self { router, state }
    }

    pub async fn user(&self, email: &str, password: &str, role: Role) -> user::Model {
        self.state
            .storage
            .create_user(NewUser {
                full_name: email.split('@').next().unwrap().to_string(),
                email: email.to_string(),
                password_hash: self.state.hasher.hash(password).await.unwrap(),
                phone_number: None,
                role,
                is_active: true,
                institution: None,
                pickup_address: None,
            })
            .await
            .unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            set_cookie,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, cookie, Some(body)).await
    }

    /// Logs in and returns the session cookie.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.cookie()
    }
}
