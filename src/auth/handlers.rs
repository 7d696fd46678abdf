use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
            LoginResponse, MessageResponse, PublicUser, RegisterRequest, UpdateProfileRequest,
            UserProfile,
        },
        jwt::{AuthUser, JwtKeys},
        password::{generate_temp_password, hash_password, verify_password},
    },
    error::AppError,
    state::AppState,
    stores::dto::blank_to_none,
    users::repo::{NewUser, User},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/change-password", post(change_password))
        .route("/auth/update-profile", post(update_profile))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let name = payload.name.trim();
    let username = payload.username.trim();
    if name.is_empty() || username.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "name, username and password are required".into(),
        ));
    }
    if username.chars().count() < 3 {
        warn!(%username, "username too short");
        return Err(AppError::Validation(
            "username must be at least 3 characters".into(),
        ));
    }
    if payload.password.chars().count() < 4 {
        warn!("password too short");
        return Err(AppError::Validation(
            "password must be at least 4 characters".into(),
        ));
    }

    let store = payload.store.validated().map_err(AppError::Validation)?;
    if store.category.is_none() {
        return Err(AppError::Validation("store category is required".into()));
    }

    let hash = hash_password(&payload.password)?;
    // The account email is taken from the store contact, as entered in the
    // registration form.
    let email = store.email.clone();

    let (user, _store) = User::register_with_store(
        &state.db,
        NewUser {
            username,
            password_hash: &hash,
            email: email.as_deref(),
            name: Some(name),
        },
        &store,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser {
                id: user.id,
                username: user.username,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".into(),
        ));
    }

    let user = match User::find_by_username(&state.db, username).await? {
        Some(user) => user,
        None => {
            warn!(%username, "login with unknown username");
            return Err(AppError::Unauthorized("invalid username or password"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with invalid password");
        return Err(AppError::Unauthorized("invalid username or password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
        is_temp_password: user.is_temp_password,
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized("user no longer exists"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }

    let Some(mailer) = state.mailer.clone() else {
        warn!("forgot-password requested but SMTP is not configured");
        return Err(AppError::MailUnavailable);
    };

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(AppError::NotFound("no account registered with that email"))?;

    let temp_password = generate_temp_password();
    let temp_hash = hash_password(&temp_password)?;
    let previous_hash = user.password_hash.clone();
    let previous_flag = user.is_temp_password;

    User::update_password(&state.db, user.id, &temp_hash, true).await?;

    if let Err(e) = mailer
        .send_temp_password(email, &user.username, &temp_password)
        .await
    {
        error!(error = %e, user_id = user.id, "temporary password mail failed; restoring previous credential");
        if let Err(restore) =
            User::update_password(&state.db, user.id, &previous_hash, previous_flag).await
        {
            error!(error = %restore, user_id = user.id, "failed to restore previous credential");
        }
        return Err(AppError::Mail(e));
    }

    info!(user_id = user.id, "temporary password issued");
    Ok(Json(MessageResponse {
        message: "a temporary password has been sent to your email",
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::Validation(
            "current and new password are required".into(),
        ));
    }
    if payload.new_password.chars().count() < 4 {
        return Err(AppError::Validation(
            "new password must be at least 4 characters".into(),
        ));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized("user no longer exists"))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id, "password change with wrong current password");
        return Err(AppError::Unauthorized("current password is incorrect"));
    }

    let hash = hash_password(&payload.new_password)?;
    // Changing the password always clears the temporary flag.
    User::update_password(&state.db, user_id, &hash, false).await?;

    info!(user_id, "password changed");
    Ok(Json(MessageResponse {
        message: "password changed",
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some(email) = payload.email.as_deref() {
        let email = email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            return Err(AppError::Validation("invalid email address".into()));
        }
    }

    if let Some(name) = payload.name {
        let name = blank_to_none(Some(name));
        User::update_name(&state.db, user_id, name.as_deref())
            .await
            .map_err(|e| e.or_not_found("user not found"))?;
    }
    if let Some(email) = payload.email {
        let email = blank_to_none(Some(email));
        User::update_email(&state.db, user_id, email.as_deref())
            .await
            .map_err(|e| e.or_not_found("user not found"))?;
    }

    info!(user_id, "profile updated");
    Ok(Json(MessageResponse {
        message: "profile updated",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::dto::StoreInput;
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

    fn register_payload() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            username: "alice".into(),
            password: "pass1234".into(),
            store: StoreInput {
                name: "Alice's Cafe".into(),
                address: "1 Main St".into(),
                road_address: None,
                lot_address: None,
                latitude: 37.56,
                longitude: 126.97,
                phone: None,
                email: Some("alice@example.com".into()),
                category: Some("cafe".into()),
                description: None,
            },
        }
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let state = test_state().await;

        let (status, Json(created)) = register(State(state.clone()), Json(register_payload()))
            .await
            .expect("register");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.user.username, "alice");
        assert!(!created.token.is_empty());

        let Json(logged_in) = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "alice".into(),
                password: "pass1234".into(),
            }),
        )
        .await
        .expect("login");
        assert!(!logged_in.is_temp_password);
        assert_eq!(logged_in.user.id, created.user.id);

        let err = login(
            State(state),
            Json(LoginRequest {
                username: "alice".into(),
                password: "wrong".into(),
            }),
        )
        .await
        .expect_err("wrong password must be rejected");
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = test_state().await;
        register(State(state.clone()), Json(register_payload()))
            .await
            .expect("first registration");
        let err = register(State(state), Json(register_payload()))
            .await
            .expect_err("second registration must fail");
        assert!(matches!(err, AppError::DuplicateUsername));
    }

    #[tokio::test]
    async fn register_rejects_short_credentials() {
        let state = test_state().await;

        let mut short_username = register_payload();
        short_username.username = "ab".into();
        let err = register(State(state.clone()), Json(short_username))
            .await
            .expect_err("short username");
        assert!(matches!(err, AppError::Validation(_)));

        let mut short_password = register_payload();
        short_password.password = "abc".into();
        let err = register(State(state), Json(short_password))
            .await
            .expect_err("short password");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn forgot_password_without_smtp_is_unavailable() {
        let state = test_state().await;
        let err = forgot_password(
            State(state),
            Json(ForgotPasswordRequest {
                email: "alice@example.com".into(),
            }),
        )
        .await
        .expect_err("mailer disabled");
        assert!(matches!(err, AppError::MailUnavailable));
    }

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("a lice@example.com"));
    }

    #[test]
    fn auth_response_serialization() {
        let response = AuthResponse {
            token: "token".into(),
            user: PublicUser {
                id: 1,
                username: "alice".into(),
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"token\""));
        assert!(json.contains("\"alice\""));
    }
}
