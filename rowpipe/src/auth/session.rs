//! JWT bearer token creation and verification (§4.4, §6 `auth.jwt_secret`).

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.jwt_expiry;
        Self {
            sub: user.id,
            email: user.email.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, config);
    let secret = config.auth.jwt_secret.as_ref().ok_or_else(|| Error::Internal {
        operation: "JWT: auth.jwt_secret is required".to_string(),
    })?;

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verifies a bearer token and returns the identity it carries.
pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let secret = config.auth.jwt_secret.as_ref().ok_or_else(|| Error::Internal {
        operation: "JWT: auth.jwt_secret is required".to_string(),
    })?;

    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<SessionClaims>(token, &key, &Validation::default()).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    Ok(CurrentUser {
        id: token_data.claims.sub,
        email: token_data.claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            auth: crate::config::AuthConfig {
                jwt_secret: Some("test-secret".to_string()),
                jwt_expiry: Duration::from_secs(3600),
            },
            ..Default::default()
        }
    }

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: 1,
            email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn round_trips_identity() {
        let config = test_config();
        let user = test_user();
        let token = create_session_token(&user, &config).unwrap();
        let decoded = verify_session_token(&token, &config).unwrap();
        assert_eq!(decoded.id, user.id);
        assert_eq!(decoded.email, user.email);
    }

    #[test]
    fn rejects_wrong_secret() {
        let config = test_config();
        let token = create_session_token(&test_user(), &config).unwrap();

        let mut other_config = config;
        other_config.auth.jwt_secret = Some("different-secret".to_string());

        let result = verify_session_token(&token, &other_config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn rejects_expired_token() {
        let config = test_config();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: 1,
            email: "test@example.com".to_string(),
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        };
        let secret = config.auth.jwt_secret.as_ref().unwrap();
        let key = EncodingKey::from_secret(secret.as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_session_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn rejects_malformed_token() {
        let config = test_config();
        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let result = verify_session_token(token, &config);
            assert!(matches!(result, Err(Error::Unauthenticated { .. })), "token: {token}");
        }
    }
}
