use axum::http::{header, HeaderValue, Method};
use codecanvas_agent::{create_router, AgentConfig, BoxedError};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), BoxedError> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::from_env()?;
    let workflow = config.build_workflow();

    let app = create_router(workflow).layer(
        CorsLayer::new()
            .allow_origin(config.app_url.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        code_model = %config.code_model,
        allowed_origin = %config.app_url,
        "server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
