pub mod assets;
pub mod auth;
pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod gallery;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod store;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use time::Duration;
use tower_http::{
    services::ServeDir,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::assets::{AssetHost, DiskAssetHost};
use crate::bookings::BookingManager;
use crate::catalog::Catalog;
use crate::config::AdminAllowList;
use crate::error::AppError;
use crate::gallery::GalleryService;
use crate::notifier::Notifier;
use crate::store::ProductStore;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub galleries: GalleryService,
    pub bookings: BookingManager,
    pub products: ProductStore,
    pub catalog: Arc<Catalog>,
    pub admins: Arc<AdminAllowList>,
}

impl AppState {
    /// Wire the core components to their collaborators. Migrations must
    /// already have run on `db`.
    pub async fn new(
        db: SqlitePool,
        assets: Arc<dyn AssetHost>,
        notifier: Arc<dyn Notifier>,
        admins: AdminAllowList,
    ) -> Result<Self, AppError> {
        let products = ProductStore::new(db.clone(), assets.clone());
        let galleries = GalleryService::start(db.clone(), assets).await?;
        let bookings = BookingManager::new(db.clone(), notifier);
        let catalog = Catalog::bundled()?;
        Ok(Self {
            db,
            galleries,
            bookings,
            products,
            catalog: Arc::new(catalog),
            admins: Arc::new(admins),
        })
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Build the full Axum application router.
///
/// Sets up the session store (and migrates its table), serves uploaded
/// assets when their base URL is a local path, and assembles all route
/// modules.
pub async fn build_app(
    state: AppState,
    assets: &DiskAssetHost,
    secure_cookies: bool,
) -> Result<Router, AppError> {
    let session_store = SqliteStore::new(state.db.clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(30)))
        .with_secure(secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax);

    let mut router = Router::new()
        .route("/health", get(health))
        .merge(routes::accounts::router())
        .merge(routes::catalog::router())
        .merge(routes::cart::router())
        .merge(routes::bookings::router())
        .merge(routes::gallery::router())
        .merge(routes::admin::router())
        .merge(routes::store::router());

    if assets.base_url().starts_with('/') {
        router = router.nest_service(assets.base_url(), ServeDir::new(assets.root()));
    }

    Ok(router
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state))
}
