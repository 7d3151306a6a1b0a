use axum::{
  response::{IntoResponse, Response},
  Json,
};
use reqwest::StatusCode;
use serde_json::json;

use crate::extractor::ErrorLog;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
  InvalidJson,
  InvalidUrl,
  MethodNotAllowed,
  VideoNotFound,
  DownloadProcessingFailed(ErrorLog),
  VideoInfoFailed(String),
  Internal(anyhow::Error),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::InvalidJson | Error::InvalidUrl => StatusCode::BAD_REQUEST,
      Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
      Error::VideoNotFound => StatusCode::NOT_FOUND,
      Error::DownloadProcessingFailed(_) | Error::VideoInfoFailed(_) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Error::InvalidJson => "INVALID_JSON",
      Error::InvalidUrl => "INVALID_URL",
      Error::MethodNotAllowed => "METHOD_NOT_ALLOWED",
      Error::VideoNotFound => "VIDEO_NOT_FOUND",
      Error::DownloadProcessingFailed(_) => "DOWNLOAD_PROCESSING_FAILED",
      Error::VideoInfoFailed(_) => "VIDEO_INFO_FAILED",
      Error::Internal(_) => "INTERNAL_ERROR",
    }
  }

  pub fn message(&self) -> String {
    match self {
      Error::InvalidJson => "Invalid JSON body".to_string(),
      Error::InvalidUrl => "Invalid YouTube URL".to_string(),
      Error::MethodNotAllowed => "Method not allowed".to_string(),
      Error::VideoNotFound => "Video not found".to_string(),
      Error::DownloadProcessingFailed(errors) => {
        format!("Could not process video. Errors: {errors}")
      }
      Error::VideoInfoFailed(reason) => {
        format!("Failed to get video info: {reason}")
      }
      Error::Internal(err) => format!("Internal Server Error: {err}"),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    if let Error::Internal(err) = &self {
      tracing::error!("internal error: {err:#}");
    }

    let body = json!({ "error": self.message(), "code": self.code() });
    (self.status(), Json(body)).into_response()
  }
}

impl<E> From<E> for Error
where
  E: Into<anyhow::Error>,
{
  fn from(err: E) -> Self {
    Error::Internal(err.into())
  }
}
