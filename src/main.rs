use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use orcid_plus_plus::config::{self, AppConfig};
use orcid_plus_plus::database::{schema, DatabaseManager};
use orcid_plus_plus::handlers::{protected, public};
use orcid_plus_plus::is_production;
use orcid_plus_plus::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, ORCID_CLIENT_ID, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting ORCID++ API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        if is_production!() {
            tracing::error!("JWT_SECRET is not set; sign-in and all protected routes will fail");
        } else {
            tracing::warn!("JWT_SECRET is empty; protected routes will reject every token");
        }
    }

    if config.database.auto_migrate {
        match DatabaseManager::pool().await {
            Ok(pool) => {
                if let Err(e) = schema::migrate(&pool).await {
                    tracing::warn!("Schema migration skipped: {}", e);
                }
            }
            Err(e) => tracing::warn!("Database not available for migration: {}", e),
        }
    }

    let app = app(config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("ORCID++ API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server");

    DatabaseManager::close().await;
}

fn app(config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/orcid/callback", post(public::orcid_callback))
        .merge(orcid_routes())
        .merge(catalog_routes())
        // Protected (JWT)
        .merge(protected_routes())
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn orcid_routes() -> Router {
    use public::orcid;

    Router::new()
        .route("/api/orcid/search", get(orcid::search))
        .route("/api/orcid/search/all", get(orcid::search_all))
        .route("/api/orcid/:orcid", get(orcid::profile))
        .route("/api/orcid/:orcid/works", get(orcid::works))
        .route("/api/orcid/:orcid/works/:put_code", get(orcid::work))
        .route("/api/orcid/:orcid/fundings", get(orcid::fundings))
        .route("/api/orcid/:orcid/fundings/:put_code", get(orcid::funding))
}

fn catalog_routes() -> Router {
    use public::catalog;

    Router::new()
        .route("/api/researchers", get(catalog::list_researchers))
        .route("/api/researchers/:orcid", get(catalog::get_researcher))
        .route("/api/researchers/:orcid/publications", get(catalog::list_publications))
        .route("/api/researchers/:orcid/projects", get(catalog::list_projects))
        .route("/api/publications/:id", get(catalog::get_publication))
        .route("/api/projects/:id", get(catalog::get_project))
        .route("/api/projects/:id/publications", get(catalog::project_publications))
}

fn protected_routes() -> Router {
    use protected::{projects, publications, researchers};

    Router::new()
        .route("/api/researchers", post(researchers::create))
        .route("/api/researchers/:orcid", put(researchers::update).delete(researchers::delete))
        .route("/api/researchers/:orcid/sync", post(researchers::sync))
        .route("/api/researchers/:orcid/publications", post(publications::create))
        .route("/api/publications/:id", put(publications::update).delete(publications::delete))
        .route("/api/researchers/:orcid/projects", post(projects::create))
        .route("/api/projects/:id", put(projects::update).delete(projects::delete))
        .route("/api/projects/:id/members", post(projects::add_member))
        .route("/api/projects/:id/members/:orcid", axum::routing::delete(projects::remove_member))
        .route(
            "/api/projects/:id/publications/:work_id",
            put(projects::link_publication).delete(projects::unlink_publication),
        )
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
