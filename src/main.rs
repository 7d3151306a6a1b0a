use std::sync::Arc;

use axum::{
  http::{header, Method},
  response::IntoResponse,
  routing::{get, post},
  Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod download;
mod error;
mod extractor;
mod info;
mod media;
#[cfg(test)]
mod mock;
mod oembed;
mod resolver;
mod util;

pub use error::{Error, Result};

use config::Config;
use extractor::Ytdlp;
use oembed::Oembed;
use resolver::Resolver;

pub struct AppState {
  pub resolver: Resolver,
  pub ytdlp: Ytdlp,
  pub oembed: Oembed,
}

impl AppState {
  pub fn new(config: &Config) -> Self {
    Self {
      resolver: Resolver::from_config(config),
      ytdlp: Ytdlp::new(config),
      oembed: Oembed::new(config),
    }
  }
}

pub fn app(state: Arc<AppState>) -> Router {
  // answers every OPTIONS request itself and stamps the origin header on
  // everything else, error responses included
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::POST, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

  Router::new()
    .route("/health", get(health))
    .route(
      "/api/video-download",
      post(download::video_download).fallback(method_not_allowed),
    )
    .route(
      "/api/video-info",
      post(info::video_info).fallback(method_not_allowed),
    )
    .layer(cors)
    .with_state(state)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  info!(
    "{} cobalt mirrors, innertube clients {:?}",
    config.cobalt_endpoints.len(),
    config.innertube_clients
  );

  let state = Arc::new(AppState::new(&config));

  info!("Listening on {}", config.listen_addr);
  axum::Server::bind(&config.listen_addr)
    .serve(app(state).into_make_service())
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_err() {
    // no signal handler available, run until killed
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

async fn method_not_allowed() -> impl IntoResponse {
  ([(header::ALLOW, "POST")], Error::MethodNotAllowed)
}
