use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::OptionalAuthUser,
    error::AppError,
    identity,
    state::AppState,
    stores::dto::{blank_to_none, DeletedResponse, StoreInput, StoreResponse, UpdateStoreRequest},
    stores::repo,
    users::repo::User,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores", get(list_stores).post(create_store))
        .route(
            "/stores/:id",
            get(get_store).put(update_store).delete(delete_store),
        )
}

#[instrument(skip(state))]
pub async fn list_stores(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
) -> Result<Json<Vec<StoreResponse>>, AppError> {
    let principal = identity::resolve(&state.db, session).await?;
    let rows = repo::list(&state.db, principal.list_scope()).await?;
    Ok(Json(rows.into_iter().map(StoreResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoreResponse>, AppError> {
    let row = repo::get(&state.db, id)
        .await
        .map_err(|e| e.or_not_found("store not found"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, input))]
pub async fn create_store(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
    Json(input): Json<StoreInput>,
) -> Result<(StatusCode, Json<StoreResponse>), AppError> {
    let input = input.validated().map_err(AppError::Validation)?;

    // The owner is whoever is signed in; anonymous submissions create an
    // ownerless store, which only an administrator can manage afterwards.
    let principal = identity::resolve(&state.db, session).await?;
    let owner = principal.user_id();

    let store = repo::create(&state.db, &input, owner).await?;
    let row = repo::get(&state.db, store.id).await?;

    info!(store_id = store.id, ?owner, "store created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_store(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStoreRequest>,
) -> Result<Json<StoreResponse>, AppError> {
    let input = payload.store.validated().map_err(AppError::Validation)?;

    let principal = identity::resolve(&state.db, session).await?;
    let scope = principal
        .write_scope()
        .ok_or(AppError::Unauthorized("sign-in required"))?;

    // Administrators may correct the owner's display name from the store
    // edit form.
    if principal.is_admin() {
        if let Some(user_name) = payload.user_name {
            let existing = repo::get(&state.db, id)
                .await
                .map_err(|e| e.or_not_found("store not found"))?;
            if let Some(owner_id) = existing.store.user_id {
                let name = blank_to_none(Some(user_name));
                User::update_name(&state.db, owner_id, name.as_deref()).await?;
            }
        }
    }

    repo::update(&state.db, id, &input, scope)
        .await
        .map_err(|e| e.or_not_found("store not found"))?;
    let row = repo::get(&state.db, id).await?;

    info!(store_id = id, "store updated");
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn delete_store(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    let principal = identity::resolve(&state.db, session).await?;
    let scope = principal
        .write_scope()
        .ok_or(AppError::Unauthorized("sign-in required"))?;

    repo::delete(&state.db, id, scope)
        .await
        .map_err(|e| e.or_not_found("store not found"))?;

    info!(store_id = id, "store deleted");
    Ok(Json(DeletedResponse {
        message: "store deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::repo::StoreScope;
    use crate::users::repo::{NewUser, Role, ADMIN_USERNAME};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_state() -> AppState {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        crate::schema::apply(&db).await.expect("apply schema");
        AppState::fake(db)
    }

    async fn seed_user(state: &AppState, username: &str) -> i64 {
        User::create(
            &state.db,
            NewUser {
                username,
                password_hash: "x",
                email: None,
                name: None,
            },
            Role::Standard,
        )
        .await
        .expect("create user")
        .id
    }

    fn sample_input(name: &str) -> StoreInput {
        StoreInput {
            name: name.into(),
            address: "1 Main St".into(),
            road_address: None,
            lot_address: None,
            latitude: 37.56,
            longitude: 126.97,
            phone: None,
            email: None,
            category: Some("cafe".into()),
            description: None,
        }
    }

    #[tokio::test]
    async fn anonymous_creation_yields_ownerless_store() {
        let state = test_state().await;
        let (status, Json(store)) = create_store(
            State(state.clone()),
            OptionalAuthUser(None),
            Json(sample_input("Orphan")),
        )
        .await
        .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(store.user_id, None);
        assert_eq!(store.owner_username, None);
    }

    #[tokio::test]
    async fn authenticated_creation_attaches_owner() {
        let state = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let (_, Json(store)) = create_store(
            State(state.clone()),
            OptionalAuthUser(Some(alice)),
            Json(sample_input("Alice's Cafe")),
        )
        .await
        .expect("create");
        assert_eq!(store.user_id, Some(alice));
        assert_eq!(store.owner_username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn anonymous_writes_are_rejected() {
        let state = test_state().await;
        let (_, Json(store)) = create_store(
            State(state.clone()),
            OptionalAuthUser(None),
            Json(sample_input("Orphan")),
        )
        .await
        .expect("create");

        let err = delete_store(State(state.clone()), OptionalAuthUser(None), Path(store.id))
            .await
            .expect_err("anonymous delete is rejected");
        assert!(matches!(err, AppError::Unauthorized(_)));

        assert!(get_store(State(state), Path(store.id)).await.is_ok());
    }

    #[tokio::test]
    async fn owner_misses_foreign_store_but_admin_deletes_it() {
        let state = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        User::ensure_admin(&state.db, "hash").await.expect("bootstrap");
        let admin = User::find_by_username(&state.db, ADMIN_USERNAME)
            .await
            .expect("lookup")
            .expect("admin exists")
            .id;

        let store = repo::create(&state.db, &sample_input("Bob's Books"), Some(bob))
            .await
            .expect("seed store");

        let err = delete_store(
            State(state.clone()),
            OptionalAuthUser(Some(alice)),
            Path(store.id),
        )
        .await
        .expect_err("alice must not delete bob's store");
        assert!(matches!(err, AppError::NotFound(_)));

        delete_store(
            State(state.clone()),
            OptionalAuthUser(Some(admin)),
            Path(store.id),
        )
        .await
        .expect("admin override");

        let listing = repo::list(&state.db, StoreScope::Unconstrained)
            .await
            .expect("list");
        assert!(listing.iter().all(|s| s.store.id != store.id));
    }

    #[tokio::test]
    async fn listing_scopes_by_principal() {
        let state = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        repo::create(&state.db, &sample_input("Alice's Cafe"), Some(alice))
            .await
            .expect("seed");
        repo::create(&state.db, &sample_input("Bob's Books"), Some(bob))
            .await
            .expect("seed");

        let Json(everyone) = list_stores(State(state.clone()), OptionalAuthUser(None))
            .await
            .expect("anonymous browsing");
        assert_eq!(everyone.len(), 2);

        let Json(own) = list_stores(State(state), OptionalAuthUser(Some(alice)))
            .await
            .expect("owner listing");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].name, "Alice's Cafe");
    }
}
