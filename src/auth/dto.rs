use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::stores::dto::StoreInput;
use crate::users::repo::{Role, User};

/// Request body for registration: the account and its first store arrive
/// together.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    pub store: StoreInput,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Response returned after login; flags accounts still on a temporary
/// password so the client can force a change.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
    pub is_temp_password: bool,
}

/// Authenticated profile view. The credential hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub is_temp_password: bool,
    pub created_at: OffsetDateTime,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            role: user.role,
            is_temp_password: user.is_temp_password,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serialization_omits_credential() {
        let profile = UserProfile {
            id: 1,
            username: "alice".into(),
            name: Some("Alice".into()),
            email: None,
            role: Role::Standard,
            is_temp_password: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"alice\""));
        assert!(json.contains("\"standard\""));
        assert!(!json.contains("password_hash"));
    }
}
