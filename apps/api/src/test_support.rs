//! Shared fixtures for router tests.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use emporium_core::{NewProduct, Product, ProductCategory, User};
use emporium_db::{Database, DbConfig};

use crate::auth::hash_password;
use crate::config::ApiConfig;
use crate::email::{Mailer, OutboxMailer};
use crate::kv::KvStore;
use crate::state::AppState;

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

pub struct TestApp {
    pub state: AppState,
    pub outbox: OutboxMailer,
    pub router: Router,
}

pub async fn test_app() -> TestApp {
    test_app_with_mailer(OutboxMailer::new()).await
}

pub async fn test_app_with_mailer(outbox: OutboxMailer) -> TestApp {
    test_app_with(outbox, test_config()).await
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        jwt_secret: "router-test-secret".to_string(),
        razorpay_key_id: "rzp_test_key".to_string(),
        razorpay_key_secret: KEY_SECRET.to_string(),
        razorpay_webhook_secret: WEBHOOK_SECRET.to_string(),
        // Unroutable, so an accidental gateway call fails fast
        razorpay_api_base: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    }
}

pub async fn test_app_with(outbox: OutboxMailer, config: ApiConfig) -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let state = AppState::new(db, KvStore::memory(), Mailer::Outbox(outbox.clone()), config);
    let router = crate::app(state.clone());
    TestApp {
        state,
        outbox,
        router,
    }
}

impl TestApp {
    /// Sends a JSON request and returns the status with the parsed body
    /// (`Value::Null` for an empty body).
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    /// A verified, active customer and a bearer token for it.
    pub async fn customer(&self, email: &str) -> (User, String) {
        let hash = hash_password("secret123").unwrap();
        let user = self
            .state
            .db
            .users()
            .upsert_verified("Customer", email, &hash)
            .await
            .unwrap();
        let token = self.state.jwt.generate_token(&user).unwrap();
        (user, token)
    }

    pub async fn admin(&self) -> (User, String) {
        let hash = hash_password("admin123").unwrap();
        let user = self
            .state
            .db
            .users()
            .upsert_admin("Admin", "admin@example.com", &hash)
            .await
            .unwrap();
        let token = self.state.jwt.generate_token(&user).unwrap();
        (user, token)
    }

    pub async fn product(&self, name: &str, price_cents: i64, stock: i64) -> Product {
        self.state
            .db
            .products()
            .insert(&NewProduct {
                name: name.to_string(),
                description: format!("{name} description"),
                price_cents,
                category: ProductCategory::Home,
                brand: None,
                images: vec![format!("https://img.example.com/{price_cents}.jpg")],
                stock,
                tags: Vec::new(),
            })
            .await
            .unwrap()
    }

    /// The six digit code from the latest email sent to `email`.
    pub fn last_code(&self, email: &str) -> String {
        let mail = self.outbox.last_to(email).unwrap();
        mail.body
            .split(|c: char| !c.is_ascii_digit())
            .find(|word| word.len() == 6)
            .unwrap()
            .to_string()
    }
}

pub fn shipping_address() -> Value {
    serde_json::json!({
        "street": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "zipCode": "560001",
        "country": "India"
    })
}
