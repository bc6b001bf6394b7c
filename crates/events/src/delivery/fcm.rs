//! Firebase Cloud Messaging HTTP v1 client.
//!
//! Sends one message per registration token and classifies the response so
//! the caller can tell a dead token (deactivate it) from a provider outage
//! (retry the whole event later).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use rollcall_core::outbox::PushText;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use yup_oauth2::{AccessToken, ServiceAccountAuthenticator, ServiceAccountKey};

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum FcmError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Missing configuration: {0}")]
    Config(String),

    /// The provider no longer accepts this registration token.
    #[error("Registration token rejected ({code})")]
    TokenRejected { code: String },

    #[error("FCM API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl FcmError {
    /// Worth retrying later with the same token.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Auth(_) | Self::Request(_) => true,
            Self::Api { status, .. } => *status == 401 || *status == 429 || *status >= 500,
            Self::Config(_) | Self::TokenRejected { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub service_account_key: PathBuf,
    pub base_url: String,
}

impl FcmConfig {
    /// Read `FCM_PROJECT_ID` and `FCM_SERVICE_ACCOUNT_KEY`.
    ///
    /// Returns `None` when either is unset; push delivery is then disabled.
    pub fn from_env() -> Option<Self> {
        let project_id = std::env::var("FCM_PROJECT_ID").ok().filter(|v| !v.is_empty())?;
        let key = std::env::var("FCM_SERVICE_ACCOUNT_KEY")
            .ok()
            .filter(|v| !v.is_empty())?;
        let base_url =
            std::env::var("FCM_BASE_URL").unwrap_or_else(|_| DEFAULT_FCM_BASE_URL.to_string());
        Some(Self {
            project_id,
            service_account_key: PathBuf::from(key),
            base_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Access tokens
// ---------------------------------------------------------------------------

/// Supplies OAuth2 bearer tokens for the FCM API.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn bearer(&self) -> Result<String, FcmError>;

    /// Forget any cached token after the API refused it.
    async fn invalidate(&self) {}
}

/// Service-account credentials, with the current token cached until expiry.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountTokenSource {
    pub async fn from_file(path: &std::path::Path) -> Result<Self, FcmError> {
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .map_err(|e| FcmError::Config(format!("{}: {e}", path.display())))?;
        Ok(Self {
            key,
            cached: Mutex::new(None),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn bearer(&self) -> Result<String, FcmError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            if let Some(value) = token.token() {
                return Ok(value.to_string());
            }
        }

        let auth = ServiceAccountAuthenticator::builder(self.key.clone())
            .build()
            .await
            .map_err(|e| FcmError::Auth(e.to_string()))?;
        let token = auth
            .token(&[FCM_SCOPE])
            .await
            .map_err(|e| FcmError::Auth(e.to_string()))?;
        let value = token
            .token()
            .map(str::to_string)
            .ok_or_else(|| FcmError::Auth("no access token returned".into()))?;
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Fixed bearer token, for tests and local emulators.
pub struct StaticTokenSource(pub String);

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn bearer(&self) -> Result<String, FcmError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: Notification<'a>,
    data: &'a HashMap<String, String>,
    android: AndroidConfig,
    apns: ApnsConfig,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct AndroidConfig {
    priority: &'static str,
    notification: AndroidNotification,
}

#[derive(Debug, Serialize)]
struct AndroidNotification {
    sound: &'static str,
}

#[derive(Debug, Serialize)]
struct ApnsConfig {
    payload: ApnsPayload,
}

#[derive(Debug, Serialize)]
struct ApnsPayload {
    aps: Aps,
}

#[derive(Debug, Serialize)]
struct Aps {
    sound: &'static str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Map a non-success response to an error.
fn classify_failure(status: StatusCode, body: &str) -> FcmError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;
    let code = error
        .details
        .iter()
        .find_map(|d| d.error_code.clone())
        .unwrap_or_else(|| error.status.clone());

    let rejected = matches!(code.as_str(), "UNREGISTERED" | "SENDER_ID_MISMATCH")
        || status == StatusCode::NOT_FOUND
        || (code == "INVALID_ARGUMENT" && error.message.to_lowercase().contains("token"));
    if rejected {
        return FcmError::TokenRejected {
            code: if code.is_empty() { status.as_str().to_string() } else { code },
        };
    }

    let message = if error.message.is_empty() {
        body.chars().take(200).collect()
    } else {
        error.message
    };
    FcmError::Api {
        status: status.as_u16(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct FcmClient {
    http: reqwest::Client,
    send_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FcmClient {
    pub fn new(
        project_id: &str,
        base_url: &str,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            send_url: format!(
                "{}/v1/projects/{project_id}/messages:send",
                base_url.trim_end_matches('/')
            ),
            tokens,
        }
    }

    /// Build a client from service-account configuration.
    pub async fn from_config(config: &FcmConfig) -> Result<Self, FcmError> {
        let source = ServiceAccountTokenSource::from_file(&config.service_account_key).await?;
        Ok(Self::new(&config.project_id, &config.base_url, Arc::new(source)))
    }

    /// Send a notification to one registration token.
    ///
    /// Returns the provider's message name.
    pub async fn send(
        &self,
        token: &str,
        text: &PushText,
        data: &HashMap<String, String>,
    ) -> Result<String, FcmError> {
        if token.trim().is_empty() {
            return Err(FcmError::TokenRejected {
                code: "EMPTY_TOKEN".into(),
            });
        }

        let bearer = self.tokens.bearer().await?;
        let request = SendRequest {
            message: Message {
                token,
                notification: Notification {
                    title: &text.title,
                    body: &text.body,
                },
                data,
                android: AndroidConfig {
                    priority: "high",
                    notification: AndroidNotification { sound: "default" },
                },
                apns: ApnsConfig {
                    payload: ApnsPayload {
                        aps: Aps { sound: "default" },
                    },
                },
            },
        };

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(bearer)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response.json().await?;
            return Ok(body.name);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        Err(classify_failure(status, &body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
