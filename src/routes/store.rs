use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::gallery::Upload;
use crate::models::{parse_price_cents, Product, ProductCategory};
use crate::store::{NewProduct, StoreCart, StoreCartLine};
use crate::AppState;

const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Deserialize)]
pub struct AddLineForm {
    product_id: String,
}

#[derive(Deserialize)]
pub struct QuantityForm {
    delta: i64,
}

#[derive(Serialize)]
pub struct StoreCartView {
    lines: Vec<StoreCartLine>,
    total_cents: i64,
    count: i64,
}

impl StoreCartView {
    fn of(cart: &StoreCart<Session>) -> Self {
        Self {
            lines: cart.lines().to_vec(),
            total_cents: cart.total_cents(),
            count: cart.count(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/products", get(list_products))
        .route(
            "/admin/products",
            post(create_product).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/store/cart", get(show_cart).delete(clear_cart))
        .route("/store/cart/items", post(add_line))
        .route(
            "/store/cart/items/{product_id}",
            patch(update_quantity).delete(remove_line),
        )
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list().await?))
}

/// Multipart form: `name`, `price` (euros), `category` and an optional
/// `image` file.
async fn read_product_form(mut multipart: Multipart) -> Result<NewProduct, AppError> {
    let mut name = None;
    let mut price = None;
    let mut category = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            if field_name == "image" && !bytes.is_empty() {
                image = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        match field_name.as_str() {
            "name" => name = Some(value),
            "price" => price = Some(parse_price_cents(&value)?),
            "category" => category = Some(value.parse::<ProductCategory>()?),
            _ => {}
        }
    }

    Ok(NewProduct {
        name: name.ok_or_else(|| AppError::validation("product name is required"))?,
        price_cents: price.ok_or_else(|| AppError::validation("price is required"))?,
        category: category.ok_or_else(|| AppError::validation("category is required"))?,
        image,
    })
}

async fn create_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_product_form(multipart).await?;
    let product = state.products.add_product(form).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn show_cart(session: Session) -> Result<Json<StoreCartView>, AppError> {
    let cart = StoreCart::load(session).await?;
    Ok(Json(StoreCartView::of(&cart)))
}

async fn add_line(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddLineForm>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.get(&form.product_id).await?;
    let mut cart = StoreCart::load(session).await?;
    cart.add(&product).await?;
    Ok((StatusCode::CREATED, Json(StoreCartView::of(&cart))))
}

async fn update_quantity(
    session: Session,
    Path(product_id): Path<String>,
    Json(form): Json<QuantityForm>,
) -> Result<Json<StoreCartView>, AppError> {
    let mut cart = StoreCart::load(session).await?;
    if !cart.update_quantity(&product_id, form.delta).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(StoreCartView::of(&cart)))
}

async fn remove_line(
    session: Session,
    Path(product_id): Path<String>,
) -> Result<Json<StoreCartView>, AppError> {
    let mut cart = StoreCart::load(session).await?;
    if !cart.remove(&product_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(StoreCartView::of(&cart)))
}

async fn clear_cart(session: Session) -> Result<Json<StoreCartView>, AppError> {
    let mut cart = StoreCart::load(session).await?;
    cart.clear().await?;
    Ok(Json(StoreCartView::of(&cart)))
}
