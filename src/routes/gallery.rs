use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::auth::{login_gallery_client, logout_gallery_client, GalleryClient};
use crate::error::AppError;
use crate::models::{FavoriteQuota, Gallery, GalleryImage, ImageView};
use crate::AppState;

#[derive(Deserialize)]
pub struct GalleryLoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    view: ImageView,
}

#[derive(Deserialize)]
pub struct ToggleForm {
    /// The selection state the client currently shows.
    selected: bool,
}

#[derive(Serialize)]
struct FavoriteListView {
    id: String,
    name: String,
    selections: Vec<String>,
    quota: FavoriteQuota,
}

#[derive(Serialize)]
struct ClientGalleryView {
    id: String,
    client_name: String,
    cover_url: Option<String>,
    view: ImageView,
    selected_count: usize,
    images: Vec<GalleryImage>,
    favorite_lists: Vec<FavoriteListView>,
}

impl ClientGalleryView {
    fn new(gallery: &Gallery, view: ImageView) -> Self {
        Self {
            id: gallery.id.clone(),
            client_name: gallery.client_name.clone(),
            cover_url: gallery.cover_url().map(str::to_string),
            view,
            selected_count: gallery.selected_count(),
            images: gallery.images_in(view).into_iter().cloned().collect(),
            favorite_lists: gallery
                .favorite_lists
                .iter()
                .map(|list| FavoriteListView {
                    id: list.id.clone(),
                    name: list.name.clone(),
                    selections: list.selections.clone(),
                    quota: list.quota(),
                })
                .collect(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gallery/login", post(login))
        .route("/gallery/logout", post(logout))
        .route("/gallery", get(show_gallery))
        .route("/gallery/images/{image_id}/toggle", post(toggle_image))
        .route("/gallery/favorites/{list_id}", get(favorite_quota))
        .route(
            "/gallery/favorites/{list_id}/images/{image_id}",
            post(select_favorite).delete(deselect_favorite),
        )
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<GalleryLoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let gallery = state
        .galleries
        .client_login(&form.email, &form.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    login_gallery_client(&session, gallery.id.clone()).await?;
    Ok(Json(ClientGalleryView::new(&gallery, ImageView::All)))
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_gallery_client(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn show_gallery(
    State(state): State<AppState>,
    GalleryClient(gallery_id): GalleryClient,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let gallery = state.galleries.get(&gallery_id).await?;
    Ok(Json(ClientGalleryView::new(&gallery, query.view)))
}

async fn toggle_image(
    State(state): State<AppState>,
    GalleryClient(gallery_id): GalleryClient,
    Path(image_id): Path<String>,
    Json(form): Json<ToggleForm>,
) -> Result<Json<GalleryImage>, AppError> {
    let image = state
        .galleries
        .toggle_image_selection(&gallery_id, &image_id, form.selected)
        .await?;
    Ok(Json(image))
}

async fn favorite_quota(
    State(state): State<AppState>,
    GalleryClient(gallery_id): GalleryClient,
    Path(list_id): Path<String>,
) -> Result<Json<FavoriteQuota>, AppError> {
    Ok(Json(state.galleries.favorite_quota(&gallery_id, &list_id).await?))
}

async fn select_favorite(
    State(state): State<AppState>,
    GalleryClient(gallery_id): GalleryClient,
    Path((list_id, image_id)): Path<(String, String)>,
) -> Result<Json<FavoriteQuota>, AppError> {
    let quota = state
        .galleries
        .select_favorite(&gallery_id, &list_id, &image_id)
        .await?;
    Ok(Json(quota))
}

async fn deselect_favorite(
    State(state): State<AppState>,
    GalleryClient(gallery_id): GalleryClient,
    Path((list_id, image_id)): Path<(String, String)>,
) -> Result<Json<FavoriteQuota>, AppError> {
    let quota = state
        .galleries
        .deselect_favorite(&gallery_id, &list_id, &image_id)
        .await?;
    Ok(Json(quota))
}
