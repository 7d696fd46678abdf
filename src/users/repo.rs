use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;
use tracing::error;

use crate::error::RepoError;
use crate::stores::dto::StoreInput;
use crate::stores::repo::Store;

/// Username reserved for the bootstrap administrator account.
pub const ADMIN_USERNAME: &str = "admin";

/// Privilege level stored on the user row. Assigned at account creation and
/// never derived from the username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub is_temp_password: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// One entry of the administrative user listing: the user plus a summary of
/// the stores it owns.
#[derive(Debug, Clone)]
pub struct UserWithStores {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub is_temp_password: bool,
    pub store_count: i64,
    pub store_names: Vec<String>,
}

const USER_COLUMNS: &str =
    "id, username, password_hash, email, name, role, \
     COALESCE(is_temp_password, 0) AS is_temp_password, created_at";

fn map_unique(e: sqlx::Error) -> RepoError {
    if e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        RepoError::DuplicateUsername
    } else {
        RepoError::Storage(e)
    }
}

impl User {
    pub async fn create(
        db: &SqlitePool,
        new: NewUser<'_>,
        role: Role,
    ) -> Result<User, RepoError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, email, name, role)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(new.username)
            .bind(new.password_hash)
            .bind(new.email)
            .bind(new.name)
            .bind(role)
            .fetch_one(db)
            .await
            .map_err(map_unique)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?)
    }

    pub async fn update_password(
        db: &SqlitePool,
        id: i64,
        password_hash: &str,
        is_temp: bool,
    ) -> Result<(), RepoError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, is_temp_password = ? WHERE id = ?")
                .bind(password_hash)
                .bind(is_temp)
                .bind(id)
                .execute(db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub async fn update_email(
        db: &SqlitePool,
        id: i64,
        email: Option<&str>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub async fn update_name(
        db: &SqlitePool,
        id: i64,
        name: Option<&str>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE users SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    /// Create the administrator account if it does not exist yet. Returns
    /// whether the account was created. Called once at process start.
    pub async fn ensure_admin(db: &SqlitePool, password_hash: &str) -> Result<bool, RepoError> {
        if User::find_by_username(db, ADMIN_USERNAME).await?.is_some() {
            return Ok(false);
        }
        User::create(
            db,
            NewUser {
                username: ADMIN_USERNAME,
                password_hash,
                email: None,
                name: None,
            },
            Role::Admin,
        )
        .await?;
        Ok(true)
    }

    /// Registration: the user and its first store are inserted in one
    /// transaction so a half-registered account can never be observed.
    pub async fn register_with_store(
        db: &SqlitePool,
        new: NewUser<'_>,
        store: &StoreInput,
    ) -> Result<(User, Store), RepoError> {
        let mut tx = db.begin().await?;

        let sql = format!(
            "INSERT INTO users (username, password_hash, email, name, role)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(new.username)
            .bind(new.password_hash)
            .bind(new.email)
            .bind(new.name)
            .bind(Role::Standard)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_unique)?;

        let store = crate::stores::repo::insert(&mut *tx, store, Some(user.id)).await?;

        tx.commit().await?;
        Ok((user, store))
    }

    /// Delete a user and every store it owns, atomically. A missing user
    /// rolls the whole transaction back; a partial cascade is never
    /// observable.
    pub async fn delete_cascading(db: &SqlitePool, user_id: i64) -> Result<(), RepoError> {
        let mut tx = db.begin().await.map_err(RepoError::Transaction)?;

        sqlx::query("DELETE FROM stores WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::Transaction)?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::Transaction)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(RepoError::Transaction)?;
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(RepoError::Transaction)?;
        Ok(())
    }

    /// Administrative listing: all users, newest first, each with the count
    /// and names of its stores. The aggregate is fetched in one grouped
    /// query over the collected id set; if that query fails the listing
    /// still succeeds with empty summaries.
    pub async fn list_with_stores(db: &SqlitePool) -> Result<Vec<UserWithStores>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(db).await?;
        if users.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(Debug, FromRow)]
        struct StoreAggRow {
            user_id: i64,
            store_count: i64,
            store_names: Option<String>,
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT user_id, COUNT(*) AS store_count, \
             GROUP_CONCAT(name, ', ') AS store_names \
             FROM stores WHERE user_id IN (",
        );
        let mut separated = qb.separated(", ");
        for user in &users {
            separated.push_bind(user.id);
        }
        qb.push(") GROUP BY user_id");

        let aggregates: HashMap<i64, StoreAggRow> =
            match qb.build_query_as::<StoreAggRow>().fetch_all(db).await {
                Ok(rows) => rows.into_iter().map(|r| (r.user_id, r)).collect(),
                Err(e) => {
                    error!(error = %e, "store aggregate query failed; listing users without store summaries");
                    HashMap::new()
                }
            };

        Ok(users
            .into_iter()
            .map(|user| {
                let agg = aggregates.get(&user.id);
                UserWithStores {
                    id: user.id,
                    username: user.username,
                    name: user.name,
                    email: user.email,
                    created_at: user.created_at,
                    is_temp_password: user.is_temp_password,
                    store_count: agg.map_or(0, |a| a.store_count),
                    store_names: agg
                        .and_then(|a| a.store_names.as_deref())
                        .map(|names| {
                            names
                                .split(", ")
                                .filter(|n| !n.trim().is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect())
    }
}
