use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
  config::Config,
  media::{self, CandidateStream, Format},
  resolver::ResolutionRequest,
  util::redact_credentials,
};

use super::{non_empty, ErrorLog, ExtractError, Extraction, Extractor};

// run yt-dlp command line to get a direct media url.
// requires yt-dlp executable to be in PATH, or YTDLP_BIN to point at it.
pub struct Ytdlp {
  bin: String,
  proxy: Option<String>,
  timeout: Duration,
}

#[derive(Deserialize, Debug, Default)]
pub struct VideoInfo {
  pub id: Option<String>,
  pub title: Option<String>,
  pub thumbnail: Option<String>,
  pub uploader: Option<String>,
  pub channel: Option<String>,
  // set when the format selector settled on a single format
  pub url: Option<String>,
  #[serde(default)]
  pub formats: Vec<YtdlpFormat>,
}

#[derive(Deserialize, Debug, Default)]
pub struct YtdlpFormat {
  format_id: Option<String>,
  url: Option<String>,
  ext: Option<String>,
  vcodec: Option<String>,
  acodec: Option<String>,
  height: Option<u32>,
  abr: Option<f64>,
}

impl YtdlpFormat {
  fn into_candidate(self) -> Option<CandidateStream> {
    // a missing codec means "unknown", only an explicit "none" rules the
    // track out
    let has_video = self.vcodec.as_deref() != Some("none");
    let has_audio = self.acodec.as_deref() != Some("none");

    Some(CandidateStream {
      url: non_empty(self.url)?,
      format_id: non_empty(self.format_id),
      extension: self.ext.unwrap_or_default(),
      has_video,
      has_audio,
      height: self.height.unwrap_or(0),
      audio_bitrate: self.abr.unwrap_or(0.0) as u32,
    })
  }
}

impl VideoInfo {
  /// Move the usable formats out, leaving the metadata in place.
  pub fn take_candidates(&mut self) -> Vec<CandidateStream> {
    std::mem::take(&mut self.formats)
      .into_iter()
      .filter_map(YtdlpFormat::into_candidate)
      .collect()
  }

  fn pick_url(mut self, format: Format, target_height: u32) -> Option<String> {
    if let Some(url) = non_empty(self.url.take()) {
      return Some(url);
    }

    let candidates = self.take_candidates();
    media::select_stream(&candidates, format, target_height)
      .map(|stream| stream.url.clone())
  }
}

impl Ytdlp {
  pub fn new(config: &Config) -> Self {
    Self {
      bin: config.ytdlp_bin.clone(),
      proxy: config.ytdlp_proxy.clone(),
      timeout: config.ytdlp_timeout,
    }
  }

  /// Dump the metadata of a single video as json, without downloading it.
  pub async fn video_info(
    &self,
    url: &str,
    format_selector: Option<&str>,
  ) -> Result<VideoInfo, ExtractError> {
    let mut cmd = Command::new(&self.bin);
    cmd
      .arg("-J")
      .arg("--no-playlist")
      .arg("--no-warnings")
      .arg("--no-check-certificates")
      .arg("--force-ipv4");

    if let Some(selector) = format_selector {
      cmd.arg("-f").arg(selector);
    }

    if let Some(proxy) = &self.proxy {
      debug!("using proxy: {}", redact_credentials(proxy));
      cmd.arg("--proxy").arg(proxy);
    }

    cmd.arg("--").arg(url).kill_on_drop(true);

    let output = tokio::time::timeout(self.timeout, cmd.output())
      .await
      .map_err(|_| ExtractError::Timeout(self.timeout.as_secs()))??;

    if !output.status.success() {
      return Err(ExtractError::Ytdlp(stderr_summary(&output.stderr)));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  fn name(&self) -> &'static str {
    "yt-dlp"
  }

  async fn extract(
    &self,
    req: &ResolutionRequest,
  ) -> Result<Extraction, ErrorLog> {
    let target_height = req.target_height();
    let selector = format_selector(req.format, target_height);

    let info = self
      .video_info(&req.url, Some(&selector))
      .await
      .map_err(|e| ErrorLog::single(format!("yt-dlp error: {e}")))?;

    let title = info.title.clone();
    let thumbnail = info.thumbnail.clone();
    let author = info.uploader.clone();

    let url = info.pick_url(req.format, target_height).ok_or_else(|| {
      ErrorLog::single(format!("yt-dlp error: {}", ExtractError::NoStream))
    })?;

    Ok(Extraction {
      url,
      title,
      thumbnail,
      author,
    })
  }
}

fn format_selector(format: Format, target_height: u32) -> String {
  if format.is_audio() {
    return "bestaudio/best".to_string();
  }

  let ext = format.stream_ext();
  let h = target_height;
  format!(
    "best[ext={ext}][height<={h}][vcodec!=none][acodec!=none]\
     /best[height<={h}]/best"
  )
}

// yt-dlp prints its fatal error as the last "ERROR:" line
fn stderr_summary(stderr: &[u8]) -> String {
  let s = String::from_utf8_lossy(stderr);
  s.lines()
    .rev()
    .find(|line| line.contains("ERROR:"))
    .or_else(|| s.lines().rev().find(|line| !line.trim().is_empty()))
    .map(|line| line.trim().to_string())
    .unwrap_or_else(|| "yt-dlp exited without output".to_string())
}
