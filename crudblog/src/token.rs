//! User-pool id token claims and JWT payload parsing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BlogError, Result};

/// Claims read from a user-pool id token.
///
/// The signature is not verified here; the API verifies every token it
/// receives and these claims only drive what the client displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Stable subject identifier
    #[serde(default)]
    pub sub: Option<String>,

    /// User name; the backend writes this into each post's `owner`
    #[serde(rename = "cognito:username", default)]
    pub username: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Expiry as seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

impl IdTokenClaims {
    /// Identity used for ownership checks: user name, falling back to subject
    pub fn identity(&self) -> Option<&str> {
        self.username.as_deref().or(self.sub.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

/// Parse an id token JWT and extract claims.
pub fn parse_id_token(jwt: &str) -> Result<IdTokenClaims> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(BlogError::auth_error("JWT must have 3 parts"));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| BlogError::auth_error(format!("base64 decode failed: {e}")))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| BlogError::auth_error(format!("JSON parse failed: {e}")))
}

/// Encode claims into an unsigned JWT.
///
/// Only the in-memory backend accepts these.
pub fn encode_unsigned(claims: &IdTokenClaims) -> Result<String> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    Ok(format!("{header}.{payload}.unsigned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cognito_claims() {
        let payload = URL_SAFE_NO_PAD.encode(
            br#"{"sub":"1234-abcd","cognito:username":"alice","email":"a@example.com","exp":1700000000,"token_use":"id"}"#,
        );
        let jwt = format!("eyJhbGciOiJSUzI1NiJ9.{payload}.sig");

        let claims = parse_id_token(&jwt).unwrap();
        assert_eq!(claims.identity(), Some("alice"));
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_identity_falls_back_to_subject() {
        let claims = IdTokenClaims {
            sub: Some("sub-only".into()),
            ..Default::default()
        };
        assert_eq!(claims.identity(), Some("sub-only"));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(parse_id_token("not-a-jwt"), Err(BlogError::Auth(_))));
        assert!(matches!(parse_id_token("a.!!!.c"), Err(BlogError::Auth(_))));
    }

    #[test]
    fn test_unsigned_tokens_parse_back() {
        let claims = IdTokenClaims {
            username: Some("bob".into()),
            exp: Some(4_000_000_000),
            ..Default::default()
        };
        let jwt = encode_unsigned(&claims).unwrap();
        assert_eq!(parse_id_token(&jwt).unwrap(), claims);
    }
}
