use std::sync::Arc;

use tracing::{info, warn};

use crate::{
  config::Config,
  extractor::{
    non_empty, Cobalt, ErrorLog, Extraction, Extractor, Innertube, Ytdlp,
  },
  media::{self, Format},
  Error, Result,
};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
  pub url: String,
  pub quality: String,
  pub format: Format,
}

impl ResolutionRequest {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      quality: media::DEFAULT_QUALITY.to_string(),
      format: Format::default(),
    }
  }

  pub fn with_quality(self, quality: impl Into<String>) -> Self {
    Self {
      quality: quality.into(),
      ..self
    }
  }

  pub fn with_format(self, format: Format) -> Self {
    Self { format, ..self }
  }

  pub fn target_height(&self) -> u32 {
    media::target_height(&self.quality)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
  pub title: String,
  pub thumbnail: Option<String>,
  pub author: String,
  pub download_url: String,
  pub quality_requested: String,
  pub quality_resolved: String,
}

/// Runs the strategies one after another until one of them produces a
/// direct url. Only the winner's metadata is used.
pub struct Resolver {
  local: Arc<dyn Extractor>,
  remote: Arc<dyn Extractor>,
  secondary: Arc<dyn Extractor>,
}

impl Resolver {
  pub fn new(
    local: Arc<dyn Extractor>,
    remote: Arc<dyn Extractor>,
    secondary: Arc<dyn Extractor>,
  ) -> Self {
    Self {
      local,
      remote,
      secondary,
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(
      Arc::new(Ytdlp::new(config)),
      Arc::new(Cobalt::new(config)),
      Arc::new(Innertube::new(config)),
    )
  }

  // audio goes to the remote converter first: it can extract audio on the
  // server side, the local tools can't without ffmpeg.
  fn chain(&self, format: Format) -> [&dyn Extractor; 3] {
    if format.is_audio() {
      [&*self.remote, &*self.local, &*self.secondary]
    } else {
      [&*self.local, &*self.remote, &*self.secondary]
    }
  }

  pub async fn resolve(
    &self,
    req: &ResolutionRequest,
  ) -> Result<ResolutionResult> {
    if req.url.trim().is_empty() {
      return Err(Error::InvalidUrl);
    }

    let target_height = req.target_height();
    let mut errors = ErrorLog::default();

    for extractor in self.chain(req.format) {
      info!("trying {} for {}", extractor.name(), req.url);
      match extractor.extract(req).await {
        Ok(extraction) if !extraction.url.is_empty() => {
          info!("resolved {} via {}", req.url, extractor.name());
          return Ok(into_result(extraction, req, target_height));
        }
        Ok(_) => {
          errors.push(format!("{}: empty download url", extractor.name()));
        }
        Err(log) => {
          warn!("{} failed for {}: {}", extractor.name(), req.url, log);
          errors.append(log);
        }
      }
    }

    Err(Error::DownloadProcessingFailed(errors))
  }
}

fn into_result(
  extraction: Extraction,
  req: &ResolutionRequest,
  target_height: u32,
) -> ResolutionResult {
  ResolutionResult {
    title: non_empty(extraction.title)
      .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    thumbnail: non_empty(extraction.thumbnail),
    author: non_empty(extraction.author)
      .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
    download_url: extraction.url,
    quality_requested: req.quality.clone(),
    quality_resolved: format!("{target_height}p"),
  }
}
