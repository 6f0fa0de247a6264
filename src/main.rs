//! Election Cart - E-commerce backend for election campaign services

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use electioncart::{
    api::{self, AppState, RequestStats},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCartRepository, SqlxCatalogRepository, SqlxOrderRepository, SqlxUserRepository,
        },
    },
    payment::RazorpayGateway,
    services::{
        AnalyticsService, AuthService, CartService, CatalogService, LoginRateLimiter,
        OrderService, TokenService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "electioncart=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Election Cart backend...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    // Create repositories
    let user_repo = SqlxUserRepository::shared(pool.clone());
    let catalog_repo = SqlxCatalogRepository::shared(pool.clone());
    let cart_repo = SqlxCartRepository::shared(pool.clone());
    let order_repo = SqlxOrderRepository::shared(pool.clone());

    // Create services
    let tokens = Arc::new(TokenService::new(&config.auth));
    let rate_limiter = Arc::new(LoginRateLimiter::new());
    let auth_service = Arc::new(AuthService::new(
        user_repo.clone(),
        tokens.clone(),
        rate_limiter.clone(),
    ));
    let catalog_service = Arc::new(CatalogService::new(catalog_repo, cache.clone()));
    let cart_service = Arc::new(CartService::new(cart_repo, catalog_service.clone()));
    let gateway = Arc::new(RazorpayGateway::new(&config.payment));
    let order_service = Arc::new(OrderService::new(
        order_repo.clone(),
        user_repo,
        cart_service.clone(),
        gateway,
        cache.clone(),
        config.payment.currency.clone(),
    ));
    let analytics_service = Arc::new(AnalyticsService::new(order_repo, cache));

    let state = AppState {
        pool,
        tokens,
        auth_service,
        catalog_service,
        cart_service,
        order_service,
        analytics_service,
        request_stats: Arc::new(RequestStats::new()),
    };

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
