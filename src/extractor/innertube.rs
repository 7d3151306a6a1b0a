use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  config::Config,
  media::{self, CandidateStream, Format},
  resolver::ResolutionRequest,
};

use super::{
  cobalt::BROWSER_USER_AGENT, non_empty, ErrorLog, ExtractError, Extraction,
  Extractor,
};

static VIDEO_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/|/v/)([A-Za-z0-9_-]{11})",
  )
  .unwrap()
});

static PLAYER_RESPONSE_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"ytInitialPlayerResponse\s*=\s*(\{.+?\})\s*;\s*(?:var\s|</script>)",
  )
  .unwrap()
});

/// Simulated client the player endpoint is queried as. Stream
/// availability differs between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
  Android,
  Web,
  WebCreator,
}

impl ClientProfile {
  pub fn from_name(name: &str) -> Option<Self> {
    match name.trim().to_ascii_uppercase().as_str() {
      "ANDROID" => Some(Self::Android),
      "WEB" => Some(Self::Web),
      "WEB_CREATOR" => Some(Self::WebCreator),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Android => "ANDROID",
      Self::Web => "WEB",
      Self::WebCreator => "WEB_CREATOR",
    }
  }

  fn version(self) -> &'static str {
    match self {
      Self::Android => "20.10.38",
      Self::Web => "2.20240726.00.00",
      Self::WebCreator => "1.20240723.03.00",
    }
  }

  // value of the X-YouTube-Client-Name header
  fn id(self) -> &'static str {
    match self {
      Self::Android => "3",
      Self::Web => "1",
      Self::WebCreator => "62",
    }
  }

  fn user_agent(self) -> &'static str {
    match self {
      Self::Android => {
        "com.google.android.youtube/20.10.38 (Linux; U; Android 11) gzip"
      }
      Self::Web | Self::WebCreator => BROWSER_USER_AGENT,
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRequest<'a> {
  video_id: &'a str,
  context: PlayerContext,
  content_check_ok: bool,
  racy_check_ok: bool,
}

#[derive(Serialize)]
struct PlayerContext {
  client: ClientInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
  client_name: &'static str,
  client_version: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  android_sdk_version: Option<u32>,
  hl: &'static str,
  time_zone: &'static str,
  utc_offset_minutes: i32,
}

impl<'a> PlayerRequest<'a> {
  fn new(video_id: &'a str, profile: ClientProfile) -> Self {
    Self {
      video_id,
      context: PlayerContext {
        client: ClientInfo {
          client_name: profile.name(),
          client_version: profile.version(),
          android_sdk_version: (profile == ClientProfile::Android)
            .then_some(30),
          hl: "en",
          time_zone: "UTC",
          utc_offset_minutes: 0,
        },
      },
      content_check_ok: true,
      racy_check_ok: true,
    }
  }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
  playability_status: Option<PlayabilityStatus>,
  video_details: Option<VideoDetails>,
  streaming_data: Option<StreamingData>,
}

#[derive(Deserialize, Debug, Default)]
struct PlayabilityStatus {
  status: String,
  reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct VideoDetails {
  title: Option<String>,
  author: Option<String>,
  thumbnail: Option<Thumbnails>,
}

#[derive(Deserialize, Debug, Default)]
struct Thumbnails {
  #[serde(default)]
  thumbnails: Vec<Thumbnail>,
}

#[derive(Deserialize, Debug, Default)]
struct Thumbnail {
  url: String,
  #[serde(default)]
  width: u32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
  // progressive, audio and video muxed together
  #[serde(default)]
  formats: Vec<StreamFormat>,
  // one track each
  #[serde(default)]
  adaptive_formats: Vec<StreamFormat>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct StreamFormat {
  // absent when the stream is only reachable through a signature cipher
  url: Option<String>,
  itag: Option<u32>,
  #[serde(default)]
  mime_type: String,
  #[serde(default)]
  bitrate: u64,
  average_bitrate: Option<u64>,
  height: Option<u32>,
}

impl StreamFormat {
  fn into_candidate(self, progressive: bool) -> Option<CandidateStream> {
    let (kind, subtype) = self
      .mime_type
      .split(';')
      .next()
      .and_then(|mime| mime.trim().split_once('/'))?;
    let is_video = kind == "video";
    let is_audio = kind == "audio";
    let extension = match (kind, subtype) {
      ("audio", "mp4") => "m4a".to_string(),
      (_, subtype) => subtype.to_string(),
    };
    let bitrate = self.average_bitrate.unwrap_or(self.bitrate);

    Some(CandidateStream {
      url: non_empty(self.url)?,
      format_id: self.itag.map(|itag| itag.to_string()),
      extension,
      has_video: is_video,
      has_audio: is_audio || (is_video && progressive),
      height: self.height.unwrap_or(0),
      audio_bitrate: (bitrate / 1000) as u32,
    })
  }
}

impl PlayerResponse {
  fn into_extraction(self, format: Format) -> Result<Extraction, ExtractError> {
    if let Some(status) = &self.playability_status {
      if status.status != "OK" {
        let reason = status.reason.clone().unwrap_or(status.status.clone());
        return Err(ExtractError::Unplayable(reason));
      }
    }

    let streaming = self.streaming_data.unwrap_or_default();
    let candidates: Vec<_> = streaming
      .formats
      .into_iter()
      .filter_map(|f| f.into_candidate(true))
      .chain(
        streaming
          .adaptive_formats
          .into_iter()
          .filter_map(|f| f.into_candidate(false)),
      )
      .collect();

    let stream = if format.is_audio() {
      media::best_audio(&candidates)
    } else {
      media::best_progressive(&candidates, Some(format.stream_ext()), None)
    }
    .ok_or(ExtractError::NoStream)?;

    let details = self.video_details.unwrap_or_default();
    let thumbnail = details.thumbnail.and_then(|t| {
      t.thumbnails
        .into_iter()
        .max_by_key(|t| t.width)
        .map(|t| t.url)
    });

    Ok(Extraction {
      url: stream.url.clone(),
      title: details.title,
      thumbnail,
      author: details.author,
    })
  }
}

pub fn video_id(url: &str) -> Option<String> {
  let url = url.trim();
  let is_bare_id = url.len() == 11
    && url
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if is_bare_id {
    return Some(url.to_string());
  }

  VIDEO_ID_REGEX
    .captures(url)
    .map(|caps| caps[1].to_string())
}

/// YouTube's internal player API, asked as several client profiles in turn.
pub struct Innertube {
  client: reqwest::Client,
  base_url: String,
  profiles: Vec<ClientProfile>,
  timeout: Duration,
}

impl Innertube {
  pub fn new(config: &Config) -> Self {
    let profiles = config
      .innertube_clients
      .iter()
      .filter_map(|name| {
        let profile = ClientProfile::from_name(name);
        if profile.is_none() {
          warn!("ignoring unknown innertube client profile: {name}");
        }
        profile
      })
      .collect();

    Self {
      client: reqwest::Client::new(),
      base_url: config.innertube_base_url.trim_end_matches('/').to_string(),
      profiles,
      timeout: config.innertube_timeout,
    }
  }

  async fn player(
    &self,
    video_id: &str,
    profile: ClientProfile,
  ) -> Result<PlayerResponse, ExtractError> {
    let url = format!("{}/youtubei/v1/player?prettyPrint=false", self.base_url);
    let resp = self
      .client
      .post(url)
      .header(header::USER_AGENT, profile.user_agent())
      .header("X-YouTube-Client-Name", profile.id())
      .header("X-YouTube-Client-Version", profile.version())
      .timeout(self.timeout)
      .json(&PlayerRequest::new(video_id, profile))
      .send()
      .await?;

    if resp.status() != StatusCode::OK {
      return Err(ExtractError::Status(resp.status()));
    }

    Ok(resp.json().await?)
  }

  // no profile override: whatever the plain watch page embeds
  async fn watch_page(
    &self,
    video_id: &str,
  ) -> Result<PlayerResponse, ExtractError> {
    let url = format!("{}/watch?v={}", self.base_url, video_id);
    let resp = self
      .client
      .get(url)
      .header(header::USER_AGENT, BROWSER_USER_AGENT)
      .header(header::COOKIE, "CONSENT=YES+cb; SOCS=CAI")
      .timeout(self.timeout)
      .send()
      .await?;

    if resp.status() != StatusCode::OK {
      return Err(ExtractError::Status(resp.status()));
    }

    let html = resp.text().await?;
    parse_watch_page(&html)
  }
}

fn parse_watch_page(html: &str) -> Result<PlayerResponse, ExtractError> {
  let caps = PLAYER_RESPONSE_REGEX
    .captures(html)
    .ok_or(ExtractError::PlayerResponseMissing)?;
  Ok(serde_json::from_str(&caps[1])?)
}

#[async_trait]
impl Extractor for Innertube {
  fn name(&self) -> &'static str {
    "innertube"
  }

  async fn extract(
    &self,
    req: &ResolutionRequest,
  ) -> Result<Extraction, ErrorLog> {
    let video_id = video_id(&req.url).ok_or_else(|| {
      let err = ExtractError::UnsupportedUrl(req.url.clone());
      ErrorLog::single(format!("Innertube error: {err}"))
    })?;

    for profile in &self.profiles {
      let attempt = self.player(&video_id, *profile).await;
      match attempt.and_then(|resp| resp.into_extraction(req.format)) {
        Ok(extraction) => return Ok(extraction),
        Err(e) => debug!("innertube {} failed: {}", profile.name(), e),
      }
    }

    let attempt = self.watch_page(&video_id).await;
    attempt
      .and_then(|resp| resp.into_extraction(req.format))
      .map_err(|e| {
        ErrorLog::single(format!(
          "Innertube error: all client profiles failed, last attempt: {e}"
        ))
      })
  }
}
