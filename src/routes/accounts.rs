use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::auth::{login_user, logout_user, AuthUser};
use crate::credentials;
use crate::error::AppError;
use crate::models::{Identity, User};
use crate::AppState;

#[derive(Deserialize)]
pub struct SignupForm {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AccountView {
    #[serde(flatten)]
    identity: Identity,
    is_admin: bool,
}

impl AccountView {
    fn new(state: &AppState, identity: Identity) -> Self {
        let is_admin = state.admins.contains(&identity.email);
        Self { identity, is_admin }
    }
}

fn validate_signup(form: &SignupForm) -> Result<(), AppError> {
    if form.name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if !form.email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if form.password.chars().count() < 8 {
        return Err(AppError::validation("Password must be at least 8 characters"));
    }
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse, AppError> {
    validate_signup(&form)?;
    let email = form.email.trim().to_lowercase();

    let (taken,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if taken {
        return Err(AppError::validation("An account with that email already exists"));
    }

    let user = User::new(
        form.name.trim().to_string(),
        email,
        credentials::hash_password(&form.password).await?,
    );

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&state.db)
    .await?;

    let identity = Identity::from(&user);
    login_user(&session, identity.clone()).await?;
    tracing::info!(user_id = %user.id, "account created");

    Ok((StatusCode::CREATED, Json(AccountView::new(&state, identity))))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(form.email.trim().to_lowercase())
        .fetch_optional(&state.db)
        .await?;

    let Some(user) = user else {
        return Err(AppError::InvalidCredentials);
    };
    let matched = credentials::first_match(&form.password, vec![user.password_hash.clone()]).await?;
    if matched.is_none() {
        return Err(AppError::InvalidCredentials);
    }

    let identity = Identity::from(&user);
    login_user(&session, identity.clone()).await?;
    Ok(Json(AccountView::new(&state, identity)))
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<AccountView> {
    Json(AccountView::new(&state, user))
}
