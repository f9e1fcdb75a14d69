use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::gallery::Upload;
use crate::models::{Booking, BookingStatus, FavoriteList, Gallery, GalleryImage};
use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Deserialize)]
pub struct GalleryForm {
    client_name: String,
    client_email: String,
}

#[derive(Deserialize)]
pub struct CoverForm {
    image_id: String,
}

#[derive(Deserialize)]
pub struct FavoriteListForm {
    name: String,
    limit: i64,
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: BookingStatus,
    reason: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/galleries", get(list_galleries).post(create_gallery))
        .route("/admin/galleries/stream", get(gallery_stream))
        .route("/admin/galleries/{id}", get(show_gallery).delete(delete_gallery))
        .route("/admin/galleries/{id}/images", post(add_images))
        .route(
            "/admin/galleries/{id}/images/{image_id}/edited",
            post(upload_edited),
        )
        .route("/admin/galleries/{id}/cover", post(set_cover))
        .route("/admin/galleries/{id}/favorite-lists", post(add_favorite_list))
        .route("/admin/bookings", get(list_bookings))
        .route("/admin/bookings/{id}/status", post(update_status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        uploads.push(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

async fn list_galleries(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Vec<Gallery>> {
    Json(state.galleries.snapshot().to_vec())
}

/// Server-sent events: the current gallery list on connect, then a fresh list
/// after every change. The subscription is released when the client goes away.
async fn gallery_stream(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.galleries.subscribe();
    let events = stream::unfold((subscription, true), |(mut subscription, first)| async move {
        let snapshot = if first {
            subscription.current()
        } else {
            subscription.changed().await?
        };
        let event = Event::default()
            .event("galleries")
            .json_data(snapshot.as_ref());
        Some((event, (subscription, false)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn create_gallery(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(form): Json<GalleryForm>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .galleries
        .create_gallery(&form.client_name, &form.client_email)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn show_gallery(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Gallery>, AppError> {
    Ok(Json(state.galleries.get(&id).await?))
}

async fn delete_gallery(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.galleries.delete_gallery(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_images(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let uploads = read_uploads(multipart).await?;
    let images: Vec<GalleryImage> = state.galleries.add_images(&id, uploads).await?;
    Ok((StatusCode::CREATED, Json(images)))
}

async fn upload_edited(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, image_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<GalleryImage>, AppError> {
    let upload = read_uploads(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::validation("no file uploaded"))?;
    let image = state
        .galleries
        .upload_edited_image(&id, &image_id, upload)
        .await?;
    Ok(Json(image))
}

async fn set_cover(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(form): Json<CoverForm>,
) -> Result<StatusCode, AppError> {
    state.galleries.set_cover_photo(&id, &form.image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_favorite_list(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(form): Json<FavoriteListForm>,
) -> Result<impl IntoResponse, AppError> {
    let list: FavoriteList = state
        .galleries
        .add_favorite_list(&id, &form.name, form.limit)
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn list_bookings(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.fetch_all_bookings().await?))
}

async fn update_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(form): Json<StatusForm>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .update_booking_status(&id, form.status, form.reason.as_deref())
        .await?;
    Ok(Json(booking))
}
