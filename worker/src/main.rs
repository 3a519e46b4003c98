//! Processing Worker (§4.3): stateless batch language detection,
//! translation, and embedding, run as a pool of sibling processes
//! behind one port.

mod error;
mod models;
mod routes;
mod state;

use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use models::Models;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let target_language =
        std::env::var("TARGET_LANGUAGE").unwrap_or_else(|_| "eng_Latn".to_string());
    let port: u16 = std::env::var("WORKER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8001);

    let state = AppState::new(Models::new(target_language));
    state.spawn_model_load();

    let app = Router::new()
        .route("/health", post(routes::health))
        .route("/detect-language", post(routes::detect_language))
        .route("/translate", post(routes::translate))
        .route("/embed", post(routes::embed))
        .route("/process-batch", post(routes::process_batch))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "processing worker listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind worker address");
    axum::serve(listener, app)
        .await
        .expect("worker server error");
}
