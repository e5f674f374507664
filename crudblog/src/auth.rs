use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{BlogError, Result};
use crate::model::Post;
use crate::token::{self, IdTokenClaims};

/// Credential mode accepted by the GraphQL API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// Anonymous access with the shared API key
    ApiKey,
    /// Signed-in access with a user-pool id token
    #[serde(rename = "AMAZON_COGNITO_USER_POOLS")]
    UserPool,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey => f.write_str("API_KEY"),
            Self::UserPool => f.write_str("AMAZON_COGNITO_USER_POOLS"),
        }
    }
}

/// Credentials attached to a single API call
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    UserPool { id_token: String },
}

impl Credentials {
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::ApiKey(_) => AuthMode::ApiKey,
            Self::UserPool { .. } => AuthMode::UserPool,
        }
    }
}

// Keys and tokens stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credentials").field(&self.mode()).finish()
    }
}

/// Tokens issued by the user pool on sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionTokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Authentication status and identity, owned by the [`Authenticator`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    identity: Option<String>,
    tokens: Option<SessionTokens>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: impl Into<String>, tokens: SessionTokens) -> Self {
        Self {
            identity: Some(identity.into()),
            tokens: Some(tokens),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.tokens.is_some()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    /// True once the id token has expired; anonymous sessions never expire
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.tokens.as_ref().map(|t| t.is_expired(now)).unwrap_or(false)
    }
}

/// Pick the credentials for the next call from the session alone.
///
/// Evaluated per call: signed-in sessions use their id token, everyone else
/// reads with the API key.
pub fn select_credentials(session: &Session, api_key: &str) -> Credentials {
    match session.tokens() {
        Some(tokens) if session.is_authenticated() => Credentials::UserPool {
            id_token: tokens.id_token.clone(),
        },
        _ => Credentials::ApiKey(api_key.to_string()),
    }
}

/// Whether the session may update or delete `post`
pub fn can_modify(session: &Session, post: &Post) -> bool {
    session.is_authenticated()
        && session
            .identity()
            .map(|identity| post.is_owned_by(identity))
            .unwrap_or(false)
}

/// External authentication collaborator
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Current session; expired sessions report as anonymous
    async fn current_session(&self) -> Result<Session>;

    async fn sign_in(&self, username: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Get authenticator name for debugging
    fn name(&self) -> &'static str {
        "Authenticator"
    }
}

/// Authenticator that signs in any non-empty user name without a user pool.
///
/// It mints unsigned id tokens, which only the in-memory backend accepts.
#[derive(Debug, Default)]
pub struct LocalAuthenticator {
    session: RwLock<Session>,
    token_lifetime: Option<Duration>,
}

impl LocalAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the one-hour token lifetime
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = Some(lifetime);
        self
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn current_session(&self) -> Result<Session> {
        let session = self.session.read().await;
        if session.is_expired(Utc::now()) {
            debug!("Local session expired");
            return Ok(Session::anonymous());
        }
        Ok(session.clone())
    }

    async fn sign_in(&self, username: &str, _password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BlogError::auth_error("User name is required"));
        }

        let expires_at = Utc::now() + self.token_lifetime.unwrap_or_else(|| Duration::hours(1));
        let claims = IdTokenClaims {
            sub: Some(format!("local-{}", username)),
            username: Some(username.to_string()),
            email: None,
            exp: Some(expires_at.timestamp()),
        };
        let id_token = token::encode_unsigned(&claims)?;
        let session = Session::authenticated(
            username,
            SessionTokens {
                access_token: id_token.clone(),
                id_token,
                refresh_token: None,
                expires_at,
            },
        );

        *self.session.write().await = session.clone();
        info!("🔐 Signed in locally as {}", username);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.write().await = Session::anonymous();
        info!("👋 Signed out");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LocalAuthenticator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PostId;

    fn post_owned_by(owner: Option<&str>) -> Post {
        Post {
            id: PostId::new("p1"),
            title: "t".into(),
            content: "c".into(),
            owner: owner.map(str::to_string),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn tokens() -> SessionTokens {
        SessionTokens {
            id_token: "id.jwt.sig".into(),
            access_token: "access".into(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_anonymous_session_reads_with_api_key() {
        let credentials = select_credentials(&Session::anonymous(), "da2-key");
        assert_eq!(credentials, Credentials::ApiKey("da2-key".into()));
        assert_eq!(credentials.mode(), AuthMode::ApiKey);
    }

    #[test]
    fn test_authenticated_session_uses_id_token() {
        let session = Session::authenticated("alice", tokens());
        let credentials = select_credentials(&session, "da2-key");
        assert_eq!(
            credentials,
            Credentials::UserPool {
                id_token: "id.jwt.sig".into()
            }
        );
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let rendered = format!("{:?}", Credentials::ApiKey("da2-secret".into()));
        assert!(!rendered.contains("da2-secret"));
        assert!(rendered.contains("ApiKey"));
    }

    #[test]
    fn test_only_owner_can_modify() {
        let alice = Session::authenticated("alice", tokens());
        assert!(can_modify(&alice, &post_owned_by(Some("alice"))));
        assert!(!can_modify(&alice, &post_owned_by(Some("bob"))));
        assert!(!can_modify(&alice, &post_owned_by(None)));
        assert!(!can_modify(&Session::anonymous(), &post_owned_by(Some("alice"))));
    }

    #[test]
    fn test_auth_mode_wire_names() {
        assert_eq!(AuthMode::UserPool.to_string(), "AMAZON_COGNITO_USER_POOLS");
        assert_eq!(
            serde_json::to_value(AuthMode::ApiKey).unwrap(),
            serde_json::json!("API_KEY")
        );
    }

    #[tokio::test]
    async fn test_local_sign_in_and_out() {
        let auth = LocalAuthenticator::new();
        assert!(!auth.current_session().await.unwrap().is_authenticated());

        let session = auth.sign_in("alice", "").await.unwrap();
        assert_eq!(session.identity(), Some("alice"));

        let claims = token::parse_id_token(&session.tokens().unwrap().id_token).unwrap();
        assert_eq!(claims.identity(), Some("alice"));

        auth.sign_out().await.unwrap();
        assert_eq!(auth.current_session().await.unwrap(), Session::anonymous());
    }

    #[tokio::test]
    async fn test_local_sign_in_requires_user_name() {
        let auth = LocalAuthenticator::new();
        assert!(matches!(auth.sign_in("  ", "pw").await, Err(BlogError::Auth(_))));
    }

    #[tokio::test]
    async fn test_expired_local_session_reports_anonymous() {
        let auth = LocalAuthenticator::new().with_token_lifetime(Duration::seconds(-1));
        auth.sign_in("alice", "").await.unwrap();
        assert!(!auth.current_session().await.unwrap().is_authenticated());
    }
}
