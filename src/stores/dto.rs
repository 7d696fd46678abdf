use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::stores::repo::StoreWithOwner;

/// Store fields accepted from clients; shared by creation, update and the
/// registration flow.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreInput {
    pub name: String,
    pub address: String,
    pub road_address: Option<String>,
    pub lot_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl StoreInput {
    /// Trim required text fields and normalise blank optionals to NULL.
    /// Runs before any storage call.
    pub fn validated(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        self.address = self.address.trim().to_string();
        if self.name.is_empty() || self.address.is_empty() {
            return Err("store name and address are required".into());
        }
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err("latitude and longitude must be numeric".into());
        }
        self.road_address = blank_to_none(self.road_address);
        self.lot_address = blank_to_none(self.lot_address);
        self.phone = blank_to_none(self.phone);
        self.email = blank_to_none(self.email);
        self.category = blank_to_none(self.category);
        self.description = blank_to_none(self.description);
        Ok(self)
    }
}

pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    #[serde(flatten)]
    pub store: StoreInput,
    /// Admin-only: also update the owner's display name.
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub address: String,
    pub road_address: Option<String>,
    pub lot_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub owner_username: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

impl From<StoreWithOwner> for StoreResponse {
    fn from(row: StoreWithOwner) -> Self {
        let store = row.store;
        Self {
            id: store.id,
            user_id: store.user_id,
            name: store.name,
            address: store.address,
            road_address: store.road_address,
            lot_address: store.lot_address,
            latitude: store.latitude,
            longitude: store.longitude,
            phone: store.phone,
            email: store.email,
            category: store.category,
            description: store.description,
            created_at: store.created_at,
            updated_at: store.updated_at,
            owner_username: row.owner_username,
            owner_name: row.owner_name,
            owner_email: row.owner_email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> StoreInput {
        StoreInput {
            name: "  Alice's Cafe  ".into(),
            address: "1 Main St".into(),
            road_address: Some("".into()),
            lot_address: None,
            latitude: 37.56,
            longitude: 126.97,
            phone: Some("  ".into()),
            email: Some("cafe@example.com".into()),
            category: Some("cafe".into()),
            description: None,
        }
    }

    #[test]
    fn validated_trims_and_normalises_blanks() {
        let out = input().validated().expect("valid input");
        assert_eq!(out.name, "Alice's Cafe");
        assert_eq!(out.road_address, None);
        assert_eq!(out.phone, None);
        assert_eq!(out.email.as_deref(), Some("cafe@example.com"));
    }

    #[test]
    fn validated_rejects_missing_name() {
        let mut bad = input();
        bad.name = "   ".into();
        assert!(bad.validated().is_err());
    }

    #[test]
    fn validated_rejects_non_finite_coordinates() {
        let mut bad = input();
        bad.latitude = f64::NAN;
        assert!(bad.validated().is_err());
    }
}
