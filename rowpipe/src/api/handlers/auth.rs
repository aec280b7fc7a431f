//! `POST /auth/login`: exchanges an email/password for a bearer token.
//!
//! Token issuance for the wider deployment is external (§1) — this endpoint
//! exists only to authenticate the bootstrapped admin user (§3, `admin_email`
//! / `admin_password`) so an operator has a way to obtain a first token
//! without a separate identity provider.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    AppState,
    api::models::users::{LoginRequest, LoginResponse},
    auth::{password, session},
    db::{errors::DbError, handlers::{Repository, Users}},
    errors::{Error, Result},
};

#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
    let mut users = Users::new(&mut conn);

    let user = users
        .get_by_email(&request.email)
        .await?
        .filter(|u| u.active)
        .ok_or(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        })?;

    if !password::verify_string(&request.password, &user.password_hash)? {
        return Err(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        });
    }

    let current = crate::api::models::users::CurrentUser {
        id: user.id,
        email: user.email,
    };
    let token = session::create_session_token(&current, &state.config)?;
    Ok(Json(LoginResponse { token }))
}
