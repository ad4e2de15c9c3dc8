//! Google Sheets values API source

use crate::error::SourceError;
use crate::DataSource;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use row_normalizer::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Service account key file, as downloaded from the Google console
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read a key file from disk
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SourceError::Auth(format!("cannot read service account key {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SourceError::Auth(format!("invalid service account key {}: {}", path.display(), e))
        })
    }
}

/// How requests to the Sheets API are authorized
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    /// OAuth bearer token obtained with a signed JWT assertion
    ServiceAccount(ServiceAccountKey),
    /// API key; only works for sheets shared publicly
    ApiKey(String),
}

/// Which cells to read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// A1 range; without a sheet name it targets the first worksheet
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    "A:Z".to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the status sheet through the Sheets v4 `values` endpoint
pub struct SheetsSource {
    client: Client,
    config: SheetsConfig,
    auth: SheetsAuth,
}

impl SheetsSource {
    pub fn new(config: SheetsConfig, auth: SheetsAuth) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("HTTP client: {}", e)))?;
        info!("Creating Sheets source for spreadsheet {}", config.spreadsheet_id);
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, SourceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &key.client_email,
            scope: READONLY_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SourceError::Auth(format!("service account private key: {}", e)))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| SourceError::Auth(format!("signing token request: {}", e)))?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!("token exchange returned {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Auth(format!("token response: {}", e)))?;
        debug!("Obtained Sheets access token for {}", key.client_email);
        Ok(token.access_token)
    }

    fn values_url(&self) -> Result<Url, SourceError> {
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| SourceError::Unavailable(format!("Sheets API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable("Sheets API URL cannot take a path".to_string()))?
            .extend([self.config.spreadsheet_id.as_str(), "values", self.config.range.as_str()]);
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");
        if let SheetsAuth::ApiKey(api_key) = &self.auth {
            url.query_pairs_mut().append_pair("key", api_key);
        }
        Ok(url)
    }
}

#[async_trait]
impl DataSource for SheetsSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRecord>, SourceError> {
        let mut request = self.client.get(self.values_url()?);
        if let SheetsAuth::ServiceAccount(key) = &self.auth {
            request = request.bearer_auth(self.access_token(key).await?);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::Auth(format!("Sheets API returned {}", status)));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("Sheets API returned {}", status)));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let records = records_from_values(range.values);
        debug!("Fetched {} rows from spreadsheet {}", records.len(), self.config.spreadsheet_id);
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("sheets:{}!{}", self.config.spreadsheet_id, self.config.range)
    }
}

/// Turn a header row plus data rows into records. Short rows leave their
/// trailing columns absent; blank header cells are dropped.
pub fn records_from_values(values: Vec<Vec<Value>>) -> Vec<RawRecord> {
    let mut rows = values.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header
        .iter()
        .map(|cell| match cell {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();

    rows.map(|row| {
        header
            .iter()
            .zip(row)
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, cell)| (name.clone(), cell))
            .collect()
    })
    .collect()
}
