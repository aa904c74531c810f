use axum::Router;
use axum::routing::get;
use log::info;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chat_service::state::AppState;
use chat_service::{integration, message, room};

#[tokio::main]
async fn main() {
    let config = integration::Config::default();

    let state = match AppState::init(&config).await {
        Ok(state) => state,
        Err(e) => panic!("Failed to initialize app state: {e}"),
    };

    let router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(room::api(state.clone()))
        .merge(message::api(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(config.env.allow_origin())
                        .allow_methods(config.env.allow_methods())
                        .allow_headers(config.env.allow_headers()),
                ),
        );

    let addr = config.env.addr();
    info!("Starting chat service on {addr}");

    let served = match config.env.ssl_config() {
        Some(ssl_config) => {
            axum_server::bind_openssl(addr, ssl_config)
                .serve(router.into_make_service())
                .await
        }
        None => {
            axum_server::bind(addr)
                .serve(router.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        panic!("Failed to start server: {e}")
    }
}
