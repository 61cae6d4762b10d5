//! Credential providers that hand an access token to new sessions.
//!
//! Interactive authorization and writing tokens to disk happen outside this
//! crate. [`FileCredentialProvider`] only reads what that flow persisted, and
//! refreshes an expired token in memory when a refresh token is available.
//! Providers are asked for a token on every remote call, so they must be
//! cheap to call while the current token is still valid.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use testledger_core::{Config, LedgerError, LedgerResult};
use tracing::{debug, info};

/// Token endpoint used when the credential description does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_MS: i64 = 60_000;

/// Bearer token for the remote API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Source of access tokens, consulted before each remote call.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain a token valid for the remote API.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Credential` if credential material is missing or malformed.
    async fn access_token(&self) -> LedgerResult<AccessToken>;
}

/// Provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    token: AccessToken,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self) -> LedgerResult<AccessToken> {
        Ok(self.token.clone())
    }
}

/// Client description as downloaded from the provider console.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Token persisted by the authorization flow.
#[derive(Debug, Deserialize)]
struct PersistedToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    expiry_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Seconds until the new token expires.
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token handed out last, with its expiry in milliseconds since the Unix epoch.
#[derive(Debug)]
struct CachedToken {
    token: AccessToken,
    expires_at: Option<i64>,
}

impl CachedToken {
    fn is_stale(&self, now_ms: i64) -> bool {
        is_expired(self.expires_at, now_ms)
    }
}

fn is_expired(expires_at: Option<i64>, now_ms: i64) -> bool {
    expires_at.is_some_and(|expiry| expiry - EXPIRY_MARGIN_MS <= now_ms)
}

/// Reads the client description and persisted token from the configuration directory.
///
/// The token is kept in memory until it is within a minute of expiry, then
/// the files are read again and the token refreshed if needed.
#[derive(Debug)]
pub struct FileCredentialProvider {
    credential_path: PathBuf,
    token_path: PathBuf,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl FileCredentialProvider {
    pub fn new(credential_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .unwrap_or_default();

        Self {
            credential_path: credential_path.into(),
            token_path: token_path.into(),
            client,
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.credential_path(), config.token_path())
    }

    fn read_secrets(&self) -> LedgerResult<ClientSecrets> {
        let content = read_credential_file(&self.credential_path, "credential description")?;
        let file: CredentialFile = serde_json::from_str(&content).map_err(|e| {
            LedgerError::Credential(format!(
                "malformed credential description {}: {e}",
                self.credential_path.display()
            ))
        })?;

        file.installed.or(file.web).ok_or_else(|| {
            LedgerError::Credential(format!(
                "credential description {} has no 'installed' or 'web' client",
                self.credential_path.display()
            ))
        })
    }

    fn read_token(&self) -> LedgerResult<PersistedToken> {
        let content = read_credential_file(&self.token_path, "token")?;
        serde_json::from_str(&content).map_err(|e| {
            LedgerError::Credential(format!(
                "malformed token file {}: {e}",
                self.token_path.display()
            ))
        })
    }

    async fn refresh(&self, secrets: &ClientSecrets, refresh_token: &str) -> LedgerResult<CachedToken> {
        let token_uri = secrets.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        info!(token_uri, "refreshing expired access token");

        let response = self
            .client
            .post(token_uri)
            .json(&json!({
                "client_id": secrets.client_id,
                "client_secret": secrets.client_secret,
                "refresh_token": refresh_token,
                "grant_type": "refresh_token",
            }))
            .send()
            .await
            .map_err(|e| LedgerError::Credential(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LedgerError::Credential(format!(
                "token refresh failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Credential(format!("malformed token refresh response: {e}")))?;
        Ok(CachedToken {
            token: AccessToken::new(body.access_token),
            expires_at: body
                .expires_in
                .map(|secs| Utc::now().timestamp_millis() + secs * 1000),
        })
    }

    async fn load(&self) -> LedgerResult<CachedToken> {
        // The client description must exist even when a token is already persisted.
        let secrets = self.read_secrets()?;
        let token = self.read_token()?;

        if !is_expired(token.expiry_date, Utc::now().timestamp_millis()) {
            debug!(path = %self.token_path.display(), "loaded persisted token");
            return Ok(CachedToken {
                token: AccessToken::new(token.access_token),
                expires_at: token.expiry_date,
            });
        }

        match token.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(&secrets, refresh_token).await,
            None => Err(LedgerError::Credential(format!(
                "token in {} expired and has no refresh token",
                self.token_path.display()
            ))),
        }
    }
}

fn read_credential_file(path: &Path, what: &str) -> LedgerResult<String> {
    if !path.exists() {
        return Err(LedgerError::Credential(format!(
            "{what} file not found: {}; authorize this client first",
            path.display()
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| LedgerError::Credential(format!("cannot read {}: {e}", path.display())))
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn access_token(&self) -> LedgerResult<AccessToken> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp_millis();
        if let Some(current) = cached.as_ref().filter(|c| !c.is_stale(now)) {
            return Ok(current.token.clone());
        }

        let fresh = self.load().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
