use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::config::AuthPaths;
use crate::error::{GmailError, Result};

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Tokens this close to expiry are refreshed ahead of time.
const REFRESH_BUFFER_SECS: i64 = 60;

/// Authorized-user token material, stored in the same JSON shape Google's
/// client libraries write to `token.json`.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct Credential {
    #[serde(rename = "token")]
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    token_uri: String,
    client_id: String,
    client_secret: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
}

impl Credential {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + Duration::seconds(REFRESH_BUFFER_SECS),
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

// Persistence seam so tests don't touch the filesystem
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> io::Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> io::Result<Option<Credential>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn save(&self, credential: &Credential) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

// Interactive consent seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential>;
}

/// Installed-application flow with a loopback redirect, driven by yup-oauth2.
pub struct InstalledOAuthFlow;

#[async_trait]
impl OAuthFlow for InstalledOAuthFlow {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential> {
        let captured = CapturedRefreshToken::default();
        let auth = InstalledFlowAuthenticator::builder(
            secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .flow_delegate(Box::new(BrowserDelegate))
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| GmailError::AuthFlow(e.to_string()))?;

        let scopes_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        let token = auth
            .token(&scopes_refs)
            .await
            .map_err(|e| GmailError::AuthFlow(e.to_string()))?;

        let access_token = token
            .token()
            .ok_or_else(|| GmailError::AuthFlow("no access token was issued".to_string()))?
            .to_string();
        let expiry = token
            .expiration_time()
            .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0));

        Ok(Credential {
            access_token,
            refresh_token: captured.take(),
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes,
            expiry,
        })
    }
}

// yup-oauth2 only hands the refresh token to its storage backend, so capture it there.
#[derive(Clone, Default)]
struct CapturedRefreshToken(Arc<StdMutex<Option<String>>>);

impl CapturedRefreshToken {
    fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl TokenStorage for CapturedRefreshToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        if let Ok(mut slot) = self.0.lock() {
            *slot = token.refresh_token;
        }
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

// Stdout belongs to the MCP transport, so the consent URL goes to the log and the browser.
struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            info!(%url, "Authorize Gmail read-only access in your browser");
            if let Err(e) = open::that(url) {
                warn!(error = %e, "Could not launch a browser; open the URL manually");
            }
            Ok(String::new())
        })
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

async fn refresh_credential(
    http: &reqwest::Client,
    current: &Credential,
    refresh_token: &str,
) -> Result<Credential> {
    let response = http
        .post(&current.token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", current.client_id.as_str()),
            ("client_secret", current.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(GmailError::AuthFlow(format!(
            "token refresh rejected ({}): {}",
            status, error_text
        )));
    }

    let refreshed: RefreshResponse = response.json().await?;
    Ok(Credential {
        access_token: refreshed.access_token,
        refresh_token: refreshed
            .refresh_token
            .or_else(|| Some(refresh_token.to_string())),
        expiry: refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
        ..current.clone()
    })
}

/// Something that can hand out a bearer token for the Gmail API.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Loads, refreshes, or mints the user's OAuth credential, persisting every new one.
pub struct CredentialProvider<S: CredentialStore, F: OAuthFlow> {
    store: S,
    flow: F,
    client_secret_path: PathBuf,
    http: reqwest::Client,
    cached: Mutex<Option<Credential>>,
}

impl CredentialProvider<FileCredentialStore, InstalledOAuthFlow> {
    pub fn from_paths(paths: &AuthPaths, http: reqwest::Client) -> Self {
        Self::new(
            FileCredentialStore::new(&paths.token),
            InstalledOAuthFlow,
            &paths.client_secret,
            http,
        )
    }
}

impl<S: CredentialStore, F: OAuthFlow> CredentialProvider<S, F> {
    pub fn new(
        store: S,
        flow: F,
        client_secret_path: impl Into<PathBuf>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            store,
            flow,
            client_secret_path: client_secret_path.into(),
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a live credential. Only runs the consent flow when there is
    /// nothing cached that is valid or refreshable.
    pub async fn obtain(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = match self.store.load() {
                Ok(credential) => credential,
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable token cache");
                    None
                }
            };
        }

        if let Some(credential) = cached.as_ref() {
            if !credential.is_expired(Utc::now()) {
                return Ok(credential.clone());
            }
        }

        let credential = match cached.as_ref() {
            Some(current) => match current.refresh_token.as_deref() {
                Some(refresh_token) => {
                    debug!("Access token expired, refreshing");
                    refresh_credential(&self.http, current, refresh_token).await?
                }
                None => self.run_consent_flow().await?,
            },
            None => self.run_consent_flow().await?,
        };

        if let Err(e) = self.store.save(&credential) {
            warn!(error = %e, "Failed to persist OAuth token");
        }
        *cached = Some(credential.clone());
        Ok(credential)
    }

    async fn run_consent_flow(&self) -> Result<Credential> {
        let secret = yup_oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|source| GmailError::AuthConfig {
                path: self.client_secret_path.clone(),
                source,
            })?;

        info!("No usable token cached, starting OAuth consent flow");
        let credential = self
            .flow
            .perform_flow(secret, vec![GMAIL_READONLY_SCOPE.to_string()])
            .await?;
        info!("OAuth consent completed");
        Ok(credential)
    }
}

#[async_trait]
impl<S: CredentialStore, F: OAuthFlow> AccessTokenSource for CredentialProvider<S, F> {
    async fn access_token(&self) -> Result<String> {
        self.obtain()
            .await
            .map(|credential| credential.access_token)
    }
}
