use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::cart::BookingCart;
use crate::error::AppError;
use crate::models::BookingCartItem;
use crate::AppState;

#[derive(Deserialize)]
pub struct AddItemForm {
    package_id: String,
    tier_id: Option<String>,
    #[serde(default)]
    addon_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct CartView {
    items: Vec<BookingCartItem>,
    total: i64,
}

impl CartView {
    fn of(cart: &BookingCart<Session>) -> Self {
        Self {
            items: cart.items().to_vec(),
            total: cart.total(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show_cart))
        .route("/cart", delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/{cart_id}", delete(remove_item))
}

async fn show_cart(session: Session) -> Result<Json<CartView>, AppError> {
    let cart = BookingCart::load(session).await?;
    Ok(Json(CartView::of(&cart)))
}

async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddItemForm>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.catalog.price_selection(
        &form.package_id,
        form.tier_id.as_deref(),
        &form.addon_ids,
    )?;

    let mut cart = BookingCart::load(session).await?;
    cart.add(item).await?;
    Ok((StatusCode::CREATED, Json(CartView::of(&cart))))
}

async fn remove_item(
    session: Session,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    let mut cart = BookingCart::load(session).await?;
    if !cart.remove(&cart_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(CartView::of(&cart)))
}

async fn clear_cart(session: Session) -> Result<Json<CartView>, AppError> {
    let mut cart = BookingCart::load(session).await?;
    cart.clear().await?;
    Ok(Json(CartView::of(&cart)))
}
