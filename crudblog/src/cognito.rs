//! User-pool sign-in over the identity provider's JSON API, with the session
//! persisted to disk so a login survives restarts.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, Session, SessionTokens};
use crate::error::{BlogError, Result};
use crate::token;

const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// User-pool settings needed for sign-in
#[derive(Debug, Clone)]
pub struct UserPoolConfig {
    /// Region of the pool, e.g. "us-east-1"
    pub region: String,
    /// Pool id, e.g. "us-east-1_AbCdEf"
    pub user_pool_id: String,
    /// App client id without a secret
    pub client_id: String,
    /// Override of the identity provider endpoint
    pub endpoint: Option<String>,
    pub request_timeout_ms: u64,
}

impl UserPoolConfig {
    pub fn new(region: impl Into<String>, user_pool_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            endpoint: None,
            request_timeout_ms: 30_000,
        }
    }

    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

/// JSON file holding the last signed-in session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// A missing file means anonymous. So does an unreadable one, which is
    /// removed so the next sign-in starts clean.
    pub async fn load(&self) -> Result<Session> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Session::anonymous()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("Discarding unreadable session file {}: {}", self.path.display(), e);
                self.clear().await?;
                Ok(Session::anonymous())
            }
        }
    }

    /// Write the session next to its final path, then rename it into place
    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        tokio::fs::write(&staging, serde_json::to_vec_pretty(session)?).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: HashMap<&'static str, &'a str>,
}

/// Authenticator backed by a hosted user pool
pub struct CognitoAuthenticator {
    config: UserPoolConfig,
    client: reqwest::Client,
    store: SessionStore,
    session: RwLock<Option<Session>>,
}

impl CognitoAuthenticator {
    pub fn new(config: UserPoolConfig, store: SessionStore) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(BlogError::config_error("User pool client id is not set"));
        }
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BlogError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            store,
            session: RwLock::new(None),
        })
    }

    /// Build the `InitiateAuth` HTTP request
    fn build_initiate_auth(&self, flow: &'static str, parameters: HashMap<&'static str, &str>) -> Result<reqwest::Request> {
        let body = InitiateAuthRequest {
            auth_flow: flow,
            client_id: &self.config.client_id,
            auth_parameters: parameters,
        };

        Ok(self
            .client
            .post(self.config.endpoint_url())
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(serde_json::to_vec(&body)?)
            .build()
            .map_err(|e| BlogError::config_error(format!("Invalid user pool endpoint: {}", e)))?)
    }

    async fn initiate_auth(&self, flow: &'static str, parameters: HashMap<&'static str, &str>) -> Result<AuthenticationResult> {
        let request = self.build_initiate_auth(flow, parameters)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let provider: ProviderError = serde_json::from_slice(&body).unwrap_or(ProviderError {
                kind: None,
                message: None,
            });
            let message = provider
                .message
                .unwrap_or_else(|| format!("sign-in failed with HTTP {}", status.as_u16()));
            if status.is_server_error() {
                return Err(BlogError::http_status(status.as_u16(), message));
            }
            return Err(BlogError::auth_error(match provider.kind {
                Some(kind) => format!("{}: {}", kind, message),
                None => message,
            }));
        }

        let parsed: InitiateAuthResponse = serde_json::from_slice(&body)?;
        match (parsed.authentication_result, parsed.challenge_name) {
            (Some(result), _) => Ok(result),
            (None, Some(challenge)) => Err(BlogError::auth_error(format!(
                "Sign-in requires the {} challenge, which this client does not support",
                challenge
            ))),
            (None, None) => Err(BlogError::auth_error("Sign-in response carried no tokens")),
        }
    }

    fn session_from(result: AuthenticationResult, previous_refresh: Option<String>) -> Result<Session> {
        let claims = token::parse_id_token(&result.id_token)?;
        let identity = claims
            .identity()
            .ok_or_else(|| BlogError::auth_error("Id token has no user name"))?
            .to_string();
        let expires_at = claims
            .expires_at()
            .unwrap_or_else(|| Utc::now() + Duration::seconds(result.expires_in));

        Ok(Session::authenticated(
            identity,
            SessionTokens {
                id_token: result.id_token,
                access_token: result.access_token,
                refresh_token: result.refresh_token.or(previous_refresh),
                expires_at,
            },
        ))
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let refresh_token = session
            .tokens()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| BlogError::auth_error("Session expired and has no refresh token"))?;

        debug!("Refreshing user-pool session");
        let mut parameters = HashMap::new();
        parameters.insert("REFRESH_TOKEN", refresh_token.as_str());
        let result = self.initiate_auth("REFRESH_TOKEN_AUTH", parameters).await?;
        // The provider does not rotate refresh tokens on this flow.
        Self::session_from(result, Some(refresh_token.clone()))
    }

    async fn remember(&self, session: Session) -> Result<Session> {
        self.store.save(&session).await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}

#[async_trait]
impl Authenticator for CognitoAuthenticator {
    async fn current_session(&self) -> Result<Session> {
        let cached = self.session.read().await.clone();
        let session = match cached {
            Some(session) => session,
            None => self.store.load().await?,
        };

        if !session.is_expired(Utc::now()) {
            *self.session.write().await = Some(session.clone());
            return Ok(session);
        }

        match self.refresh(&session).await {
            Ok(refreshed) => {
                info!("🔄 Session refreshed for {}", refreshed.identity().unwrap_or("unknown"));
                self.remember(refreshed).await
            }
            Err(e @ BlogError::Auth(_)) => {
                warn!("Session expired and the provider refused to refresh it: {}", e);
                self.store.clear().await?;
                *self.session.write().await = Some(Session::anonymous());
                Ok(Session::anonymous())
            }
            Err(e) => {
                // Refresh token kept on disk; the next call tries again.
                warn!("Session expired and could not be refreshed right now: {}", e);
                *self.session.write().await = None;
                Ok(Session::anonymous())
            }
        }
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(BlogError::auth_error("User name and password are required"));
        }

        info!("🔐 Signing in {} against pool {}", username, self.config.user_pool_id);
        let mut parameters = HashMap::new();
        parameters.insert("USERNAME", username.trim());
        parameters.insert("PASSWORD", password);
        let result = self.initiate_auth("USER_PASSWORD_AUTH", parameters).await?;

        let session = self.remember(Self::session_from(result, None)?).await?;
        info!("✅ Signed in as {}", session.identity().unwrap_or(username));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.store.clear().await?;
        *self.session.write().await = Some(Session::anonymous());
        info!("👋 Signed out");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CognitoAuthenticator"
    }
}

impl std::fmt::Debug for CognitoAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoAuthenticator")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::IdTokenClaims;

    fn authenticator(dir: &Path) -> CognitoAuthenticator {
        CognitoAuthenticator::new(
            UserPoolConfig::new("us-east-1", "us-east-1_Pool", "client123"),
            SessionStore::new(dir.join("session.json")),
        )
        .unwrap()
    }

    fn session_for(username: &str, expires_in: Duration, refresh: Option<&str>) -> Session {
        let expires_at = Utc::now() + expires_in;
        let id_token = token::encode_unsigned(&IdTokenClaims {
            username: Some(username.into()),
            exp: Some(expires_at.timestamp()),
            ..Default::default()
        })
        .unwrap();
        Session::authenticated(
            username,
            SessionTokens {
                id_token,
                access_token: "access".into(),
                refresh_token: refresh.map(str::to_string),
                expires_at,
            },
        )
    }

    #[test]
    fn test_default_endpoint_follows_region() {
        let config = UserPoolConfig::new("eu-west-1", "eu-west-1_X", "c");
        assert_eq!(config.endpoint_url(), "https://cognito-idp.eu-west-1.amazonaws.com/");
    }

    #[test]
    fn test_initiate_auth_request_shape() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        let mut parameters = HashMap::new();
        parameters.insert("USERNAME", "alice");
        parameters.insert("PASSWORD", "pw");

        let request = auth.build_initiate_auth("USER_PASSWORD_AUTH", parameters).unwrap();
        assert_eq!(request.headers()["X-Amz-Target"], INITIATE_AUTH_TARGET);
        assert_eq!(request.headers()[CONTENT_TYPE], AMZ_JSON);

        let body: serde_json::Value =
            serde_json::from_slice(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(body["AuthFlow"], "USER_PASSWORD_AUTH");
        assert_eq!(body["ClientId"], "client123");
        assert_eq!(body["AuthParameters"]["USERNAME"], "alice");
    }

    #[test]
    fn test_session_from_authentication_result() {
        let result = AuthenticationResult {
            id_token: token::encode_unsigned(&IdTokenClaims {
                username: Some("alice".into()),
                exp: Some(4_000_000_000),
                ..Default::default()
            })
            .unwrap(),
            access_token: "access".into(),
            refresh_token: None,
            expires_in: 3600,
        };

        let session = CognitoAuthenticator::session_from(result, Some("old-refresh".into())).unwrap();
        assert_eq!(session.identity(), Some("alice"));
        let tokens = session.tokens().unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(tokens.expires_at.timestamp(), 4_000_000_000);
    }

    #[test]
    fn test_missing_client_id_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CognitoAuthenticator::new(
            UserPoolConfig::new("us-east-1", "pool", ""),
            SessionStore::new(dir.path().join("s.json")),
        );
        assert!(matches!(result, Err(BlogError::Config(_))));
    }

    #[tokio::test]
    async fn test_session_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().await.unwrap(), Session::anonymous());

        let session = session_for("alice", Duration::hours(1), Some("r"));
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), session);

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), Session::anonymous());
    }

    #[tokio::test]
    async fn test_current_session_reads_persisted_login() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        let session = session_for("alice", Duration::hours(1), None);
        auth.store.save(&session).await.unwrap();

        assert_eq!(auth.current_session().await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_signs_out() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        auth.store
            .save(&session_for("alice", Duration::hours(-1), None))
            .await
            .unwrap();

        assert!(!auth.current_session().await.unwrap().is_authenticated());
        assert!(!auth.store.path().exists());
    }

    #[tokio::test]
    async fn test_unreachable_provider_keeps_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UserPoolConfig::new("us-east-1", "us-east-1_Pool", "client123");
        config.endpoint = Some("http://127.0.0.1:1/".into());
        config.request_timeout_ms = 2_000;
        let auth = CognitoAuthenticator::new(config, SessionStore::new(dir.path().join("session.json"))).unwrap();
        let expired = session_for("alice", Duration::hours(-1), Some("valid-refresh"));
        auth.store.save(&expired).await.unwrap();

        assert!(!auth.current_session().await.unwrap().is_authenticated());
        assert_eq!(auth.store.load().await.unwrap(), expired);
    }

    #[tokio::test]
    async fn test_corrupt_session_file_reads_as_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        tokio::fs::write(auth.store.path(), b"{not json").await.unwrap();

        assert_eq!(auth.current_session().await.unwrap(), Session::anonymous());
        assert!(!auth.store.path().exists());
    }

    #[tokio::test]
    async fn test_save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&session_for("alice", Duration::hours(1), None)).await.unwrap();
        store.save(&session_for("bob", Duration::hours(1), None)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
        assert_eq!(store.load().await.unwrap().identity(), Some("bob"));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UserPoolConfig::new("us-east-1", "us-east-1_Pool", "client123");
        config.endpoint = Some("not a url".into());
        let auth = CognitoAuthenticator::new(config, SessionStore::new(dir.path().join("s.json"))).unwrap();

        let result = auth.build_initiate_auth("USER_PASSWORD_AUTH", HashMap::new());
        match result {
            Err(e @ BlogError::Config(_)) => assert!(!e.is_recoverable()),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_sign_in_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        assert!(matches!(auth.sign_in("alice", "").await, Err(BlogError::Auth(_))));
    }

    #[tokio::test]
    async fn test_sign_out_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        auth.store
            .save(&session_for("alice", Duration::hours(1), None))
            .await
            .unwrap();

        auth.sign_out().await.unwrap();
        assert!(!auth.store.path().exists());
        assert_eq!(auth.current_session().await.unwrap(), Session::anonymous());
    }
}
