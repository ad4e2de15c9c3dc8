//! Bluesky transport
//!
//! Logs in with a handle and app password (`com.atproto.server.createSession`)
//! and publishes each notice as an `app.bsky.feed.post` record.

use crate::{Transport, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Bluesky rejects posts longer than this
pub const MAX_POST_CHARS: usize = 300;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bluesky transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    /// PDS base URL
    #[serde(default = "default_service")]
    pub service: String,
    /// Post language tags
    #[serde(default = "default_langs")]
    pub langs: Vec<String>,
}

fn default_service() -> String {
    "https://bsky.social".to_string()
}

fn default_langs() -> Vec<String> {
    vec!["en".to_string(), "fr".to_string()]
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            langs: default_langs(),
        }
    }
}

/// Account credentials, in the `secrets/credentials.json` layout
#[derive(Clone, Deserialize)]
pub struct BlueskyCredentials {
    #[serde(rename = "BLUESKY_USERNAME")]
    pub username: String,
    #[serde(rename = "BLUESKY_PASSWORD")]
    pub password: String,
}

impl std::fmt::Debug for BlueskyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueskyCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BlueskyCredentials {
    pub fn from_file(path: &Path) -> Result<Self, TransportError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TransportError::Auth(format!("cannot read credentials {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            TransportError::Auth(format!("invalid credentials {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

/// XRPC error body
#[derive(Debug, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Posts notices to a Bluesky account
pub struct BlueskyTransport {
    client: Client,
    config: BlueskyConfig,
    credentials: BlueskyCredentials,
    session: Mutex<Option<Session>>,
}

impl BlueskyTransport {
    pub fn new(
        config: BlueskyConfig,
        credentials: BlueskyCredentials,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Http(format!("HTTP client: {}", e)))?;
        info!("Creating Bluesky transport for {} on {}", credentials.username, config.service);
        Ok(Self {
            client,
            config,
            credentials,
            session: Mutex::new(None),
        })
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.config.service.trim_end_matches('/'), method)
    }

    async fn login(&self) -> Result<Session, TransportError> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({
                "identifier": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            return Err(TransportError::Auth(format!(
                "createSession returned {}: {}",
                status, detail
            )));
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| TransportError::Auth(format!("session response: {}", e)))?;
        debug!("Bluesky session created for {}", session.did);
        Ok(session)
    }

    /// Current session, logging in if none is cached
    async fn session(&self) -> Result<Session, TransportError> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok(session.clone());
        }
        let session = self.login().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    async fn forget_session(&self) {
        *self.session.lock().await = None;
    }
}

#[async_trait]
impl Transport for BlueskyTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let length = text.chars().count();
        if length > MAX_POST_CHARS {
            return Err(TransportError::Rejected(format!(
                "post is {} characters, limit is {}",
                length, MAX_POST_CHARS
            )));
        }

        let session = self.session().await?;
        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": text,
                    "langs": self.config.langs,
                    "createdAt": Utc::now().to_rfc3339(),
                },
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Posted {} characters to Bluesky", length);
            return Ok(());
        }

        let detail = error_detail(response).await;
        if status == StatusCode::UNAUTHORIZED || detail.contains("ExpiredToken") {
            // Next send logs in again
            warn!("Bluesky session rejected, dropping cached session");
            self.forget_session().await;
            return Err(TransportError::Auth(format!(
                "createRecord returned {}: {}",
                status, detail
            )));
        }
        if status == StatusCode::BAD_REQUEST {
            return Err(TransportError::Rejected(detail));
        }
        Err(TransportError::Http(format!("createRecord returned {}: {}", status, detail)))
    }

    fn describe(&self) -> String {
        format!("bluesky:{}", self.credentials.username)
    }
}

async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<XrpcError>(&body) {
        Ok(e) if !e.error.is_empty() => format!("{}: {}", e.error, e.message),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> BlueskyTransport {
        BlueskyTransport::new(
            BlueskyConfig {
                service: "http://127.0.0.1:9/".to_string(),
                ..Default::default()
            },
            BlueskyCredentials {
                username: "cnl-alerts.bsky.social".to_string(),
                password: "app-password".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_credentials_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"BLUESKY_USERNAME": "cnl-alerts.bsky.social", "BLUESKY_PASSWORD": "secret"}"#,
        )
        .unwrap();

        let credentials = BlueskyCredentials::from_file(&path).unwrap();
        assert_eq!(credentials.username, "cnl-alerts.bsky.social");
        assert!(!format!("{:?}", credentials).contains("secret"));
    }

    #[test]
    fn test_xrpc_url() {
        assert_eq!(
            transport().xrpc("com.atproto.server.createSession"),
            "http://127.0.0.1:9/xrpc/com.atproto.server.createSession"
        );
    }

    #[tokio::test]
    async fn test_oversized_post_is_rejected_before_login() {
        let text = "x".repeat(MAX_POST_CHARS + 1);
        let result = transport().send(&text).await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }
}
