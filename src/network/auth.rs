//! ID Token Validation
//!
//! Players sign in with an external identity provider. The portal never
//! issues or stores credentials; it only validates the provider's ID token
//! and reads the user's uid (the `sub` claim) from it.

use jsonwebtoken::{decode, DecodingKey, Validation, Algorithm, TokenData};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Digest};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Authentication configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format (preferred for external providers).
    pub public_key_pem: Option<String>,
    /// HS256 secret (fallback for simple setups).
    pub secret: Option<String>,
    /// Whether to skip expiry validation (for testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Overlay `AUTH_*` variables, read through `var`, onto this config.
    pub fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("AUTH_ISSUER") {
            self.issuer = Some(v);
        }
        if let Some(v) = var("AUTH_AUDIENCE") {
            self.audience = Some(v);
        }
        if let Some(v) = var("AUTH_PUBLIC_KEY_PEM") {
            self.public_key_pem = Some(v);
        }
        if let Some(v) = var("AUTH_SECRET") {
            self.secret = Some(v);
        }
        if let Some(v) = var("AUTH_SKIP_EXPIRY") {
            self.skip_expiry = v == "true" || v == "1";
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_vars(|key| std::env::var(key).ok());
        config
    }

    /// Check if authentication is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Claims we read from the provider's ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the provider uid.
    pub sub: String,
    /// Expiry timestamp (Unix seconds).
    #[serde(default)]
    pub exp: u64,
    /// Issued at timestamp.
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Provider uid, matched against `User::firebase_uid` in the store.
    pub fn uid(&self) -> &str {
        &self.sub
    }

    /// Short stable fingerprint of the uid, for logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"arcade-uid:");
        hasher.update(self.sub.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication not configured")]
    NotConfigured,
    #[error("invalid token format")]
    InvalidFormat,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Validate an ID token and extract its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    if !config.is_configured() {
        return Err(AuthError::NotConfigured);
    }

    let algorithm = if config.public_key_pem.is_some() {
        Algorithm::RS256
    } else {
        Algorithm::HS256
    };

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = std::collections::HashSet::new();

    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    if config.skip_expiry {
        validation.validate_exp = false;
    }

    let token_data: TokenData<TokenClaims> = if let Some(ref pem) = config.public_key_pem {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::DecodeError(format!("invalid public key: {}", e)))?;
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else if let Some(ref secret) = config.secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else {
        return Err(AuthError::NotConfigured);
    };

    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    // The library skips exp when the claim is absent from required_spec_claims
    if !config.skip_expiry && claims.exp > 0 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        if now > claims.exp {
            return Err(AuthError::Expired);
        }
    }

    Ok(claims)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "portal-test-secret-0123456789ab";

    fn sign(claims: &TokenClaims, secret: &str) -> String {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&header, claims, &key).unwrap()
    }

    fn claims_for(uid: &str) -> TokenClaims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        TokenClaims {
            sub: uid.into(),
            exp: now + 3600,
            iat: now,
            iss: Some("https://securetoken.example.com/arcade".into()),
            aud: Some(serde_json::json!("arcade")),
            email: Some("player@example.com".into()),
        }
    }

    fn secret_config() -> AuthConfig {
        AuthConfig {
            secret: Some(SECRET.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_token_yields_uid() {
        let token = sign(&claims_for("uid-123"), SECRET);
        let claims = validate_token(&token, &secret_config()).unwrap();
        assert_eq!(claims.uid(), "uid-123");
        assert_eq!(claims.email.as_deref(), Some("player@example.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = claims_for("uid-123");
        claims.exp = 1;
        let token = sign(&claims, SECRET);

        assert!(matches!(validate_token(&token, &secret_config()), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign(&claims_for("uid-123"), "some-other-secret-entirely!!");
        assert!(matches!(
            validate_token(&token, &secret_config()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_sub_rejected() {
        let token = sign(&claims_for(""), SECRET);
        assert!(matches!(
            validate_token(&token, &secret_config()),
            Err(AuthError::MissingClaim(_))
        ));
    }

    #[test]
    fn test_issuer_checked() {
        let token = sign(&claims_for("uid-123"), SECRET);
        let config = AuthConfig {
            issuer: Some("https://elsewhere.example.com".into()),
            ..secret_config()
        };
        assert!(matches!(validate_token(&token, &config), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn test_audience_checked() {
        let token = sign(&claims_for("uid-123"), SECRET);

        let config = AuthConfig {
            audience: Some("arcade".into()),
            ..secret_config()
        };
        assert!(validate_token(&token, &config).is_ok());

        let config = AuthConfig {
            audience: Some("other-app".into()),
            ..secret_config()
        };
        assert!(matches!(validate_token(&token, &config), Err(AuthError::InvalidAudience)));
    }

    #[test]
    fn test_garbage_token() {
        assert!(validate_token("not-a-jwt", &secret_config()).is_err());
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = claims_for("uid-123");
        let b = claims_for("uid-456");
        assert_eq!(a.fingerprint(), claims_for("uid-123").fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_not_configured() {
        let result = validate_token("some.jwt.token", &AuthConfig::default());
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[test]
    fn test_skip_expiry() {
        let mut claims = claims_for("uid-123");
        claims.exp = 1;
        let token = sign(&claims, SECRET);

        let config = AuthConfig {
            skip_expiry: true,
            ..secret_config()
        };
        assert!(validate_token(&token, &config).is_ok());
    }
}
