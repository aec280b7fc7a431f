//! API-facing user models.

use crate::types::UserId;
use serde::{Deserialize, Serialize};

/// The authenticated caller, extracted from a verified bearer token (§4.4).
/// Every handler that touches tenant data takes this as an extractor so the
/// Tenancy Guard always has an `owner` to scope queries by.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}
