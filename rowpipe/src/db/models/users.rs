//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub password_hash: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
