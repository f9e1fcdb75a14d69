use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_sessions::Session;

use crate::auth::{AuthUser, MaybeUser};
use crate::bookings::Checkout;
use crate::cart::BookingCart;
use crate::error::AppError;
use crate::models::Booking;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(checkout))
        .route("/bookings", get(my_bookings))
}

async fn checkout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    session: Session,
    Json(form): Json<Checkout>,
) -> Result<impl IntoResponse, AppError> {
    let mut cart = BookingCart::load(session).await?;
    let receipt = state
        .bookings
        .create_booking(user.as_ref(), &mut cart, form)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.fetch_user_bookings(&user).await?))
}
