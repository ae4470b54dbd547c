use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::catch_panic::CatchPanicLayer;

use shipchat::services::fanout::ChatRegistry;
use shipchat::web::middleware::auth as auth_middleware;
use shipchat::web::routes;
use shipchat::{database, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://shipchat.db".to_string());
    tracing::info!(db_url = %db_url, "connecting to database");

    let pool = SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .expect("cannot connect to database");

    database::init_schema(&pool)
        .await
        .expect("schema bootstrap failed");

    let state = AppState {
        pool,
        registry: Arc::new(ChatRegistry::new()),
    };

    let app = Router::new()
        .nest("/api/v3/chats", routes::chat_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ))
        .layer(CatchPanicLayer::new())
        .with_state(state);

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("cannot parse host/port");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(addr = %addr, error = %e, "bind failed, trying fallback port");
            let fallback: SocketAddr = format!("{}:{}", host, port + 1)
                .parse()
                .expect("cannot parse fallback address");
            tokio::net::TcpListener::bind(fallback)
                .await
                .expect("cannot bind fallback port")
        }
    };

    let bound_addr = listener.local_addr().expect("listener has no local addr");
    tracing::info!(addr = %bound_addr, "shipchat listening");

    axum::serve(listener, app).await.expect("server error");
}
