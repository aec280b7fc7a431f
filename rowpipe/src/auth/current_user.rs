//! User extraction from request authentication (§4.4, §7).
//!
//! All endpoints except `/health` require `Authorization: Bearer <jwt>`
//! (§6); this crate only verifies tokens issued elsewhere, it does not
//! authenticate passwords on every request (login does that once, at
//! `POST /authentication/login`, to mint the token).

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::{errors::DbError, handlers::Repository as _},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::instrument;

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or(Error::Unauthenticated { message: None })?;

        let auth_str = auth_header.to_str().map_err(|_| Error::Unauthenticated { message: None })?;

        let token = auth_str.strip_prefix("Bearer ").ok_or(Error::Unauthenticated { message: None })?;

        let claimed = session::verify_session_token(token, &state.config)?;

        // Verify the user still exists and is active; a deactivated user's
        // existing tokens must stop working immediately (§3 soft-deactivation).
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
        let mut users = crate::db::handlers::Users::new(&mut conn);
        let user = users
            .get_by_id(claimed.id)
            .await?
            .filter(|u| u.active)
            .ok_or(Error::Unauthenticated {
                message: Some("User no longer exists or is deactivated".to_string()),
            })?;

        Ok(CurrentUser { id: user.id, email: user.email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use sqlx::PgPool;

    fn test_parts(auth_header: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/test");
        if let Some(value) = auth_header {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[sqlx::test]
    async fn missing_header_is_unauthenticated(pool: PgPool) {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("test-secret".to_string());
        let state = AppState::for_tests(pool, config);

        let mut parts = test_parts(None);
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    async fn valid_token_for_active_user_succeeds(pool: PgPool) {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("test-secret".to_string());
        let state = AppState::for_tests(pool.clone(), config.clone());

        let mut conn = pool.acquire().await.unwrap();
        let mut users = crate::db::handlers::Users::new(&mut conn);
        let created = users
            .create(&crate::db::models::users::UserCreateDBRequest {
                email: "auth@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let token = session::create_session_token(
            &CurrentUser {
                id: created.id,
                email: created.email.clone(),
            },
            &config,
        )
        .unwrap();

        let mut parts = test_parts(Some(&format!("Bearer {token}")));
        let result = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(result.id, created.id);
    }
}
