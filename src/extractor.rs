mod cobalt;
mod innertube;
mod ytdlp;

use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::resolver::ResolutionRequest;

pub use cobalt::{Cobalt, BROWSER_USER_AGENT};
pub use innertube::{video_id, Innertube};
pub use ytdlp::{VideoInfo, Ytdlp};

/// A resolved direct media url plus whatever metadata the strategy that
/// produced it could supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
  pub url: String,
  pub title: Option<String>,
  pub thumbnail: Option<String>,
  pub author: Option<String>,
}

/// Ordered diagnostics collected from failed strategy, mirror and
/// profile attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog(Vec<String>);

impl ErrorLog {
  pub fn single(msg: impl Into<String>) -> Self {
    Self(vec![msg.into()])
  }

  pub fn push(&mut self, msg: impl Into<String>) {
    self.0.push(msg.into());
  }

  pub fn append(&mut self, other: ErrorLog) {
    self.0.extend(other.0);
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn entries(&self) -> &[String] {
    &self.0
  }
}

impl fmt::Display for ErrorLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join("; "))
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
  #[error("{0}")]
  Io(#[from] std::io::Error),
  #[error("{0}")]
  Http(#[from] reqwest::Error),
  #[error("invalid json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("unexpected status {0}")]
  Status(StatusCode),
  #[error("timed out after {0}s")]
  Timeout(u64),
  #[error("{0}")]
  Ytdlp(String),
  #[error("not a youtube url: {0}")]
  UnsupportedUrl(String),
  #[error("video unplayable: {0}")]
  Unplayable(String),
  #[error("player response not found in watch page")]
  PlayerResponseMissing,
  #[error("no download url in response")]
  NoUrl,
  #[error("no suitable stream")]
  NoStream,
}

/// One independent way of turning a page url into a direct media url.
///
/// Implementations never unwind: every failure is reported as diagnostics
/// so the resolver can carry on with the next strategy.
#[async_trait]
pub trait Extractor: Send + Sync {
  fn name(&self) -> &'static str;

  async fn extract(
    &self,
    req: &ResolutionRequest,
  ) -> Result<Extraction, ErrorLog>;
}

/// Metadata fields are best-effort; an empty string is as good as none.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}
