use std::sync::Arc;

use studio_gallery::assets::DiskAssetHost;
use studio_gallery::config::Config;
use studio_gallery::notifier::OutboxNotifier;
use studio_gallery::{build_app, cli, db, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: studio-gallery [serve | create-gallery <name> <email> | import-galleries <file>]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let [command, file] = args.as_slice() {
        if command == "import-galleries" {
            return cli::import_galleries(&pool, file).await;
        }
    }

    let assets = DiskAssetHost::new(&config.asset_dir, &config.asset_base_url);
    let notifier = OutboxNotifier::new(pool.clone(), config.studio_email.clone());
    let state = AppState::new(
        pool,
        Arc::new(assets.clone()),
        Arc::new(notifier),
        config.admin_emails.clone(),
    )
    .await?;

    match args.as_slice() {
        [] => {}
        [command] if command == "serve" => {}
        [command, name, email] if command == "create-gallery" => {
            return cli::create_gallery(&state.galleries, name, email).await;
        }
        _ => return Err(USAGE.into()),
    }

    if config.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; admin routes will refuse everyone");
    }

    let app = build_app(state, &assets, config.secure_cookies).await?;
    let listener = TcpListener::bind(config.bind_addr).await?;

    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
