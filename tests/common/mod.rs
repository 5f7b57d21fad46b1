#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use tourbook_api::auth::{PasswordError, PasswordHasher};
use tourbook_api::config::AppConfig;
use tourbook_api::database::models::{tour, user};
use tourbook_api::database::{document, document_id, MemoryStore, Store};
use tourbook_api::services::email::{Email, MailError, Mailer};
use tourbook_api::{router, AppState};

pub const PASSWORD: &str = "pass1234";

/// Captures outgoing mail; optionally refuses every send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn last(&self) -> Option<Email> {
        self.sent.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::SendFailed("relay unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

/// Argon2 is slow in debug builds; the HTTP flows only need a stable mapping.
struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(format!("plain${}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        Ok(hash == format!("plain${}", password))
    }
}

pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub client: reqwest::Client,
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(RecordingMailer::default()).await
}

/// Serves the full router on an ephemeral port backed by the in-memory store.
pub async fn spawn_app_with(mailer: RecordingMailer) -> Result<TestApp> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mailer = Arc::new(mailer);
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;

    let state = AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        mailer.clone(),
        Arc::new(PlainHasher),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;
    let app = router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestApp {
        base_url: format!("http://{}", addr),
        state,
        mailer,
        client: reqwest::Client::new(),
    })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Signs up through the API and returns `(token, user id)`.
    pub async fn signup(&self, name: &str, email: &str) -> Result<(String, String)> {
        let resp = self
            .client
            .post(self.url("/api/v1/users/signup"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == 201, "signup failed with {}", resp.status());

        let body: Value = resp.json().await?;
        let token = body["token"].as_str().context("token missing")?.to_string();
        let id = body["data"]["user"]["id"].as_str().context("id missing")?.to_string();
        Ok((token, id))
    }

    /// Signs up and then sets the role directly in the store.
    pub async fn signup_as(&self, role: &str, email: &str) -> Result<(String, String)> {
        let (token, id) = self.signup("Staff Member", email).await?;
        self.store()
            .update_by_id(user::collection(), &id, document(json!({ "role": role })))
            .await?
            .context("user vanished")?;
        Ok((token, id))
    }

    /// Inserts a tour straight into the store and returns its id.
    pub async fn insert_tour(&self, name: &str, price: u32) -> Result<String> {
        let doc = self
            .store()
            .create(
                tour::collection(),
                document(json!({
                    "name": name,
                    "duration": 5,
                    "maxGroupSize": 10,
                    "difficulty": "easy",
                    "price": price,
                    "summary": "A day out",
                    "imageCover": "cover.jpg",
                })),
            )
            .await?;
        Ok(document_id(&doc).context("id missing")?.to_string())
    }
}
