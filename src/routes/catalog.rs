use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::catalog::Package;
use crate::error::AppError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/packages", get(list_packages))
        .route("/packages/{id}", get(show_package))
}

async fn list_packages(State(state): State<AppState>) -> Json<Vec<Package>> {
    Json(state.catalog.packages().to_vec())
}

async fn show_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Package>, AppError> {
    state
        .catalog
        .package(&id)
        .cloned()
        .map(Json)
        .ok_or(AppError::NotFound)
}
