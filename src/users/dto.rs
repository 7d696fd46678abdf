use serde::Serialize;
use time::OffsetDateTime;

use crate::users::repo::UserWithStores;

/// One row of the administrative user listing.
#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub is_temp_password: bool,
    pub store_count: i64,
    pub store_names: Vec<String>,
}

impl From<UserWithStores> for UserListItem {
    fn from(user: UserWithStores) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            is_temp_password: user.is_temp_password,
            store_count: user.store_count,
            store_names: user.store_names,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}
