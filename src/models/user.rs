// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
/// Users are identified towards assessments by their device id.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    /// Unique id of the device the user plays on.
    pub device_id: String,

    pub name: String,

    /// User status: 'active' or 'disabled'.
    pub status: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// User data before it has been assigned an id by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub device_id: String,
    pub name: String,
    pub status: String,
}

impl NewUser {
    pub fn active(device_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            status: "active".to_string(),
        }
    }
}

/// DTO for registering a device.
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(
        min = 1,
        max = 128,
        message = "Device id length must be between 1 and 128 characters."
    ))]
    pub device_id: String,
    #[validate(length(
        min = 1,
        max = 50,
        message = "Name length must be between 1 and 50 characters."
    ))]
    pub name: String,
}
