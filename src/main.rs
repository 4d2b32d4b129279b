#[cfg(feature = "http-server")]
mod api;
mod config;
mod error;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::{AuthHandler, MealHandler};
use services::{AIService, AuthService, Database, ImageStore, OpenRouterService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the logger reads RUST_LOG
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting Calorie Tracking API...");

    let config = Config::from_env()?;

    let db = Arc::new(Database::new(&config.database_url).await?);
    log::info!("✅ PostgreSQL database initialized");

    let openrouter = OpenRouterService::with_base_url(
        config.openrouter_api_key.clone(),
        config.openrouter_model.clone(),
        config.openrouter_base_url.clone(),
    );
    log::info!("✅ OpenRouter service initialized with model: {}", openrouter.model());
    let ai: Arc<dyn AIService> = Arc::new(openrouter);

    let images = Arc::new(ImageStore::new(&config.upload_dir, &config.public_base_url));
    log::info!("✅ Image store at {}", images.upload_dir().display());

    let auth = Arc::new(AuthService::new(config.secret_key.clone()));

    let auth_handler = Arc::new(AuthHandler::new(db.clone(), auth.clone()));
    let meal_handler = Arc::new(MealHandler::new(db.clone(), ai, images.clone()));
    log::info!("✅ Handlers initialized");

    #[cfg(feature = "http-server")]
    {
        use api::{create_router, AppState};

        let state = AppState {
            auth_handler,
            meal_handler,
            auth,
        };
        let app = create_router(state, images.upload_dir(), config.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!("🌐 Server listening on {}", config.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("🛑 Shutting down...");
            })
            .await?;
    }

    #[cfg(not(feature = "http-server"))]
    {
        let _ = (auth_handler, meal_handler, auth);
        log::warn!("⚠️ Built without the http-server feature, nothing to serve");
    }

    Ok(())
}
