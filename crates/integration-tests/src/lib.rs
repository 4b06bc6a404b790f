//! Integration test harness for the pizza service.
//!
//! [`TestApp`] drives the full router in-process with the in-memory
//! backend. Order fulfillment goes through the real [`FactoryClient`] to a
//! [`FakeFactory`] bound to `127.0.0.1:0`, which checks the bearer key and
//! request signature on every call.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pizza-integration-tests
//! ```
//!
//! No database or network access beyond loopback is needed.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use pizza_core::{Email, Role, RoleSet};
use pizza_service::config::{FactoryConfig, ServiceConfig, TelemetryConfig};
use pizza_service::db::{Database, MemoryDatabase, UserDirectory};
use pizza_service::factory::{FactoryClient, SIGNATURE_HEADER, TIMESTAMP_HEADER, sign_payload};
use pizza_service::models::NewUser;
use pizza_service::services::auth::hash_password;
use pizza_service::state::AppState;
use pizza_service::telemetry::{self, Telemetry, TelemetryTasks, TracingSink};

/// API key the fake factory expects.
pub const FACTORY_API_KEY: &str = "factory-key-7f3a9c1e5b2d8460";
/// Signing secret shared with the fake factory.
pub const SIGNING_SECRET: &str = "signing-secret-4c8e2a6f0b9d1357e3a5c7f9";
/// Report URL the fake factory returns on failure.
pub const REPORT_URL: &str = "https://factory.test/report/42";

/// An order as received by the fake factory.
#[derive(Debug, Clone)]
pub struct ReceivedOrder {
    pub body: Value,
}

/// How the fake factory answers correctly signed orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FactoryMode {
    /// `200` with a ticket.
    #[default]
    Accept,
    /// `500` with a report URL.
    Fail,
    /// `200 {}`: success status without a ticket.
    NoTicket,
    /// Hold the request for [`FakeFactory::STALL`] before accepting.
    Stall,
}

#[derive(Default)]
struct FactoryState {
    orders: Mutex<Vec<ReceivedOrder>>,
    mode: Mutex<FactoryMode>,
    rejected_signatures: AtomicUsize,
}

/// In-process stand-in for the external pizza factory.
#[derive(Clone)]
pub struct FakeFactory {
    addr: SocketAddr,
    state: Arc<FactoryState>,
}

impl FakeFactory {
    /// How long [`FactoryMode::Stall`] holds a request.
    pub const STALL: Duration = Duration::from_secs(3);

    /// Bind to an ephemeral loopback port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(FactoryState::default());
        let router = Router::new()
            .route("/api/order", post(fake_order))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Change how every following order is answered.
    pub fn set_mode(&self, mode: FactoryMode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    /// Orders accepted for processing, in arrival order.
    #[must_use]
    pub fn orders(&self) -> Vec<ReceivedOrder> {
        self.state.orders.lock().unwrap().clone()
    }

    #[must_use]
    pub fn rejected_signatures(&self) -> usize {
        self.state.rejected_signatures.load(Ordering::SeqCst)
    }
}

async fn fake_order(
    State(state): State<Arc<FactoryState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    let expected_auth = format!("Bearer {FACTORY_API_KEY}");
    let timestamp = header_str(TIMESTAMP_HEADER);
    let expected_signature = sign_payload(SIGNING_SECRET.as_bytes(), &timestamp, &body).unwrap();
    if header_str(header::AUTHORIZATION.as_str()) != expected_auth
        || header_str(SIGNATURE_HEADER) != expected_signature
    {
        state.rejected_signatures.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid signature" })),
        )
            .into_response();
    }

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let number = {
        let mut orders = state.orders.lock().unwrap();
        orders.push(ReceivedOrder { body });
        orders.len()
    };

    let mode = *state.mode.lock().unwrap();
    match mode {
        FactoryMode::Accept => {}
        FactoryMode::Fail => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "oven on fire", "reportUrl": REPORT_URL })),
            )
                .into_response();
        }
        FactoryMode::NoTicket => return Json(json!({})).into_response(),
        FactoryMode::Stall => tokio::time::sleep(FakeFactory::STALL).await,
    }

    Json(json!({ "jwt": format!("factory-jwt-{number}"), "reportUrl": REPORT_URL })).into_response()
}

/// Build a configuration pointing at `factory_url`.
#[must_use]
pub fn test_config(factory_url: &str) -> ServiceConfig {
    ServiceConfig {
        database_url: SecretString::from("memory"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        factory: FactoryConfig {
            url: url::Url::parse(factory_url).unwrap(),
            api_key: SecretString::from(FACTORY_API_KEY),
            signing_secret: SecretString::from(SIGNING_SECRET),
            timeout_secs: 5,
        },
        list_per_page: 2,
        expose_error_detail: false,
        telemetry: TelemetryConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A response with its body parsed as JSON (`Null` for an empty body).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The service under test.
pub struct TestApp {
    pub db: Arc<MemoryDatabase>,
    pub factory: FakeFactory,
    pub telemetry: Telemetry,
    router: Router,
    tasks: Option<TelemetryTasks>,
}

impl TestApp {
    /// Start a fresh app with an empty in-memory database.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Start a fresh app after adjusting the default test configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let factory = FakeFactory::start().await;
        let mut config = test_config(&factory.url());
        configure(&mut config);

        let db = Arc::new(MemoryDatabase::new());
        let client = FactoryClient::new(&config.factory).unwrap();
        let (telemetry, tasks) =
            telemetry::start_with_sink(Arc::new(TracingSink), Duration::from_secs(60), 64);

        let database: Arc<dyn Database> = Arc::clone(&db) as Arc<dyn Database>;
        let state = AppState::new(config, database, Arc::new(client), telemetry.clone());

        Self {
            db,
            factory,
            telemetry,
            router: pizza_service::app(state),
            tasks: Some(tasks),
        }
    }

    /// A handle to the router, for requests the helpers don't cover.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Send a request through the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register a diner and return `(user, token)`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> (Value, String) {
        let response = self
            .post(
                "/auth",
                None,
                json!({ "name": name, "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

        let token = response.body["token"].as_str().unwrap().to_string();
        (response.body["user"].clone(), token)
    }

    /// Create a global admin directly in the directory and log them in.
    pub async fn admin(&self, email: &str) -> (Value, String) {
        self.db
            .create_user(NewUser {
                name: "Pizza Admin".to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: hash_password("admin").unwrap(),
                roles: [Role::Admin].into_iter().collect::<RoleSet>(),
            })
            .await
            .unwrap();
        self.login(email, "admin").await
    }

    /// Log in and return `(user, token)`.
    pub async fn login(&self, email: &str, password: &str) -> (Value, String) {
        let response = self
            .put("/auth", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

        let token = response.body["token"].as_str().unwrap().to_string();
        (response.body["user"].clone(), token)
    }

    /// Add a menu item as `admin_token`; returns the new item's id.
    pub async fn add_menu_item(&self, admin_token: &str, title: &str, price: f64) -> i64 {
        let response = self
            .put(
                "/order/menu",
                Some(admin_token),
                json!({ "title": title, "description": "test", "image": "pizza.png", "price": price }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

        response.body.as_array().unwrap().iter().find(|item| item["title"] == title).unwrap()["id"]
            .as_i64()
            .unwrap()
    }

    /// Create a franchise with one store; returns `(franchise_id, store_id)`.
    pub async fn franchise_with_store(
        &self,
        admin_token: &str,
        name: &str,
        admins: &[&str],
    ) -> (i64, i64) {
        let admins: Vec<Value> = admins.iter().map(|email| json!({ "email": email })).collect();
        let franchise = self
            .post(
                "/franchise",
                Some(admin_token),
                json!({ "name": name, "admins": admins }),
            )
            .await;
        assert_eq!(franchise.status, StatusCode::OK, "{:?}", franchise.body);
        let franchise_id = franchise.body["id"].as_i64().unwrap();

        let store = self
            .post(
                &format!("/franchise/{franchise_id}/store"),
                Some(admin_token),
                json!({ "name": format!("{name} Main St") }),
            )
            .await;
        assert_eq!(store.status, StatusCode::OK, "{:?}", store.body);

        (franchise_id, store.body["id"].as_i64().unwrap())
    }

    /// Stop the background telemetry tasks, flushing what they hold.
    pub async fn shutdown(mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.stop().await;
        }
    }
}
