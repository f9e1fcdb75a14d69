use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::Identity;
use crate::AppState;

const USER_KEY: &str = "user";
const GALLERY_KEY: &str = "gallery_id";

async fn session_from<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<Session, AppError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|_| AppError::AuthRequired)
}

/// A signed-in customer account, or nobody. Handlers that must decide for
/// themselves what an anonymous caller may do take this instead of [`AuthUser`].
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts, state).await?;
        let user: Option<Identity> = session.get(USER_KEY).await.ok().flatten();
        Ok(MaybeUser(user))
    }
}

pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or(AppError::AuthRequired)
    }
}

/// A signed-in account whose email is on the administrator allow-list.
pub struct AdminUser(pub Identity);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if state.admins.contains(&user.email) {
            Ok(AdminUser(user))
        } else {
            tracing::warn!(user_id = %user.id, "non-administrator refused");
            Err(AppError::Forbidden)
        }
    }
}

/// The gallery a client unlocked with its access password.
pub struct GalleryClient(pub String);

impl<S> FromRequestParts<S> for GalleryClient
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts, state).await?;
        let gallery_id: Option<String> = session.get(GALLERY_KEY).await.ok().flatten();
        gallery_id.map(GalleryClient).ok_or(AppError::AuthRequired)
    }
}

pub async fn login_user(session: &Session, user: Identity) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(USER_KEY, user).await
}

/// Signs the account out but keeps the rest of the session, so a pending
/// booking cart survives.
pub async fn logout_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<Identity>(USER_KEY).await?;
    Ok(())
}

pub async fn login_gallery_client(
    session: &Session,
    gallery_id: String,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(GALLERY_KEY, gallery_id).await
}

pub async fn logout_gallery_client(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(GALLERY_KEY).await?;
    Ok(())
}
