use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::OptionalAuthUser,
    error::AppError,
    identity::{self, Principal},
    state::AppState,
    users::dto::{DeletedResponse, UserListItem},
    users::repo::User,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
}

fn require_admin(principal: Principal) -> Result<i64, AppError> {
    match principal {
        Principal::Admin(id) => Ok(id),
        Principal::Owner(_) => Err(AppError::Forbidden("administrator access required")),
        Principal::Anonymous => Err(AppError::Unauthorized("sign-in required")),
    }
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
) -> Result<Json<Vec<UserListItem>>, AppError> {
    let principal = identity::resolve(&state.db, session).await?;
    require_admin(principal)?;

    let users = User::list_with_stores(&state.db).await?;
    Ok(Json(users.into_iter().map(UserListItem::from).collect()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    OptionalAuthUser(session): OptionalAuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    let principal = identity::resolve(&state.db, session).await?;
    let admin_id = require_admin(principal)?;

    if admin_id == user_id {
        return Err(AppError::Validation(
            "you cannot delete your own account".into(),
        ));
    }

    User::delete_cascading(&state.db, user_id)
        .await
        .map_err(|e| e.or_not_found("user not found"))?;

    info!(user_id, "user deleted together with owned stores");
    Ok(Json(DeletedResponse {
        message: "user deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
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

    async fn bootstrap_admin(state: &AppState) -> i64 {
        User::ensure_admin(&state.db, "hash").await.expect("bootstrap");
        User::find_by_username(&state.db, ADMIN_USERNAME)
            .await
            .expect("lookup")
            .expect("admin exists")
            .id
    }

    #[tokio::test]
    async fn listing_requires_admin() {
        let state = test_state().await;

        let err = list_users(State(state.clone()), OptionalAuthUser(None))
            .await
            .expect_err("anonymous must not list users");
        assert!(matches!(err, AppError::Unauthorized(_)));

        let alice = User::create(
            &state.db,
            NewUser {
                username: "alice",
                password_hash: "x",
                email: None,
                name: None,
            },
            Role::Standard,
        )
        .await
        .expect("create alice");
        let err = list_users(State(state.clone()), OptionalAuthUser(Some(alice.id)))
            .await
            .expect_err("standard users must not list users");
        assert!(matches!(err, AppError::Forbidden(_)));

        let admin_id = bootstrap_admin(&state).await;
        let Json(listing) = list_users(State(state), OptionalAuthUser(Some(admin_id)))
            .await
            .expect("admin listing");
        assert_eq!(listing.len(), 2);
    }

    #[tokio::test]
    async fn admin_cannot_delete_itself() {
        let state = test_state().await;
        let admin_id = bootstrap_admin(&state).await;

        let err = delete_user(
            State(state.clone()),
            OptionalAuthUser(Some(admin_id)),
            Path(admin_id),
        )
        .await
        .expect_err("self-deletion must be rejected");
        assert!(matches!(err, AppError::Validation(_)));

        assert!(User::find_by_id(&state.db, admin_id)
            .await
            .expect("lookup")
            .is_some());
    }

    #[tokio::test]
    async fn admin_delete_cascades_and_misses_unknown_users() {
        let state = test_state().await;
        let admin_id = bootstrap_admin(&state).await;
        let alice = User::create(
            &state.db,
            NewUser {
                username: "alice",
                password_hash: "x",
                email: None,
                name: None,
            },
            Role::Standard,
        )
        .await
        .expect("create alice");

        delete_user(
            State(state.clone()),
            OptionalAuthUser(Some(admin_id)),
            Path(alice.id),
        )
        .await
        .expect("admin deletes alice");
        assert!(User::find_by_id(&state.db, alice.id)
            .await
            .expect("lookup")
            .is_none());

        let err = delete_user(
            State(state),
            OptionalAuthUser(Some(admin_id)),
            Path(9999),
        )
        .await
        .expect_err("unknown user id");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
