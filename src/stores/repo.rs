use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::error::RepoError;
use crate::stores::dto::StoreInput;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Store {
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
}

/// Store row joined with the owner's public columns for display.
#[derive(Debug, Clone, FromRow)]
pub struct StoreWithOwner {
    #[sqlx(flatten)]
    pub store: Store,
    pub owner_username: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

/// Ownership constraint applied to store operations.
///
/// `Unconstrained` is the admin override: the operation ignores ownership
/// entirely, including rows with no owner. `OwnedBy` restricts the operation
/// to rows owned by that user; a row owned by anyone else behaves exactly
/// like a missing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Unconstrained,
    OwnedBy(i64),
}

const SELECT_WITH_OWNER: &str = r#"
SELECT
    stores.id, stores.user_id, stores.name, stores.address,
    stores.road_address, stores.lot_address,
    stores.latitude, stores.longitude,
    stores.phone, stores.email, stores.category, stores.description,
    stores.created_at, stores.updated_at,
    users.username AS owner_username,
    users.name AS owner_name,
    users.email AS owner_email
FROM stores
LEFT JOIN users ON stores.user_id = users.id
"#;

/// List stores with owner info, newest first.
pub async fn list(db: &SqlitePool, scope: StoreScope) -> Result<Vec<StoreWithOwner>, RepoError> {
    let rows = match scope {
        StoreScope::Unconstrained => {
            let sql =
                format!("{SELECT_WITH_OWNER} ORDER BY stores.created_at DESC, stores.id DESC");
            sqlx::query_as::<_, StoreWithOwner>(&sql).fetch_all(db).await?
        }
        StoreScope::OwnedBy(owner) => {
            let sql = format!(
                "{SELECT_WITH_OWNER} WHERE stores.user_id = ? \
                 ORDER BY stores.created_at DESC, stores.id DESC"
            );
            sqlx::query_as::<_, StoreWithOwner>(&sql)
                .bind(owner)
                .fetch_all(db)
                .await?
        }
    };
    Ok(rows)
}

/// Fetch one store with owner info. Unscoped: the detail view is public.
pub async fn get(db: &SqlitePool, id: i64) -> Result<StoreWithOwner, RepoError> {
    let sql = format!("{SELECT_WITH_OWNER} WHERE stores.id = ?");
    sqlx::query_as::<_, StoreWithOwner>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(RepoError::NotFound)
}

/// Insert a store on an existing connection, so callers can compose it into
/// a larger transaction. The owner is attached as-is and may be NULL.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    input: &StoreInput,
    owner: Option<i64>,
) -> sqlx::Result<Store> {
    sqlx::query_as::<_, Store>(
        r#"
        INSERT INTO stores (user_id, name, address, road_address, lot_address,
                            latitude, longitude, phone, email, category, description)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, user_id, name, address, road_address, lot_address,
                  latitude, longitude, phone, email, category, description,
                  created_at, updated_at
        "#,
    )
    .bind(owner)
    .bind(&input.name)
    .bind(&input.address)
    .bind(input.road_address.as_deref())
    .bind(input.lot_address.as_deref())
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.phone.as_deref())
    .bind(input.email.as_deref())
    .bind(input.category.as_deref())
    .bind(input.description.as_deref())
    .fetch_one(&mut *conn)
    .await
}

pub async fn create(
    db: &SqlitePool,
    input: &StoreInput,
    owner: Option<i64>,
) -> Result<Store, RepoError> {
    let mut conn = db.acquire().await?;
    Ok(insert(&mut *conn, input, owner).await?)
}

/// Update a store within the given scope. Zero rows changed means the store
/// does not exist within that scope, whatever the reason.
pub async fn update(
    db: &SqlitePool,
    id: i64,
    input: &StoreInput,
    scope: StoreScope,
) -> Result<(), RepoError> {
    let sql = match scope {
        StoreScope::Unconstrained => {
            "UPDATE stores
             SET name = ?, address = ?, road_address = ?, lot_address = ?,
                 latitude = ?, longitude = ?, phone = ?, email = ?,
                 category = ?, description = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?"
        }
        StoreScope::OwnedBy(_) => {
            "UPDATE stores
             SET name = ?, address = ?, road_address = ?, lot_address = ?,
                 latitude = ?, longitude = ?, phone = ?, email = ?,
                 category = ?, description = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND user_id = ?"
        }
    };

    let mut query = sqlx::query(sql)
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.road_address.as_deref())
        .bind(input.lot_address.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(input.category.as_deref())
        .bind(input.description.as_deref())
        .bind(id);
    if let StoreScope::OwnedBy(owner) = scope {
        query = query.bind(owner);
    }

    let result = query.execute(db).await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

/// Delete a store within the given scope; same indistinguishability rule as
/// [`update`].
pub async fn delete(db: &SqlitePool, id: i64, scope: StoreScope) -> Result<(), RepoError> {
    let result = match scope {
        StoreScope::Unconstrained => {
            sqlx::query("DELETE FROM stores WHERE id = ?")
                .bind(id)
                .execute(db)
                .await?
        }
        StoreScope::OwnedBy(owner) => {
            sqlx::query("DELETE FROM stores WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner)
                .execute(db)
                .await?
        }
    };
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}
