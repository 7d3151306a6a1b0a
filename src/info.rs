use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  download::{parse_json, str_field},
  extractor::{non_empty, video_id, ExtractError, VideoInfo},
  media::{self, CandidateStream},
  oembed::{thumbnail_url, OembedInfo},
  AppState, Error, Result,
};

// quality ladder offered to clients before they pick a download
const OFFERED_HEIGHTS: &[u32] = &[360, 720, 1080];

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
  title: String,
  thumbnail: Option<String>,
  video_id: Option<String>,
  author: String,
  channel: String,
  available_formats: Vec<AvailableFormat>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableFormat {
  quality: String,
  format_id: Option<String>,
  ext: String,
  height: u32,
}

impl From<VideoInfo> for InfoResponse {
  fn from(mut info: VideoInfo) -> Self {
    let available_formats = available_formats(&info.take_candidates());
    let author = info
      .uploader
      .clone()
      .or_else(|| info.channel.clone())
      .unwrap_or_else(|| "Unknown".to_string());
    let channel = info
      .channel
      .or(info.uploader)
      .unwrap_or_else(|| "Unknown".to_string());

    Self {
      title: info.title.unwrap_or_else(|| "Unknown".to_string()),
      thumbnail: info.thumbnail,
      video_id: info.id,
      author,
      channel,
      available_formats,
    }
  }
}

impl InfoResponse {
  fn from_oembed(video_id: String, info: OembedInfo) -> Self {
    let author =
      non_empty(info.author_name).unwrap_or_else(|| "Unknown".to_string());

    Self {
      title: non_empty(info.title).unwrap_or_else(|| "Untitled".to_string()),
      thumbnail: Some(thumbnail_url(&video_id)),
      video_id: Some(video_id),
      channel: author.clone(),
      author,
      available_formats: vec![],
    }
  }
}

/// Best progressive stream at or below each offered height.
fn available_formats(candidates: &[CandidateStream]) -> Vec<AvailableFormat> {
  // a stream of unknown height can't be placed on the ladder
  let sized: Vec<_> = candidates
    .iter()
    .filter(|c| c.height > 0)
    .cloned()
    .collect();

  OFFERED_HEIGHTS
    .iter()
    .filter_map(|&height| {
      let best = media::best_progressive(&sized, None, Some(height))?;
      // mp4 wins a tie at the same height
      let stream = media::best_progressive(&sized, Some("mp4"), Some(height))
        .filter(|mp4| mp4.height == best.height)
        .unwrap_or(best);

      let ext = if stream.extension.is_empty() {
        "mp4".to_string()
      } else {
        stream.extension.clone()
      };

      Some(AvailableFormat {
        quality: format!("{height}p"),
        format_id: stream.format_id.clone(),
        ext,
        height: stream.height,
      })
    })
    .collect()
}

// yt-dlp missing or hanging, as opposed to yt-dlp rejecting the video
fn ytdlp_unavailable(err: &ExtractError) -> bool {
  match err {
    ExtractError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
    ExtractError::Timeout(_) => true,
    _ => false,
  }
}

pub async fn video_info(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<InfoResponse>> {
  let body = parse_json(&body)?;
  let url = str_field(&body, "url").ok_or(Error::InvalidUrl)?;

  match state.ytdlp.video_info(url, None).await {
    Ok(info) => Ok(Json(info.into())),
    Err(e) if ytdlp_unavailable(&e) => {
      info!("yt-dlp unavailable ({}), asking oembed for {}", e, url);
      oembed_info(&state, url).await.map(Json)
    }
    Err(e) => {
      warn!("video info failed for {}: {}", url, e);
      Err(Error::VideoInfoFailed(e.to_string()))
    }
  }
}

async fn oembed_info(state: &AppState, url: &str) -> Result<InfoResponse> {
  let video_id = video_id(url).ok_or(Error::InvalidUrl)?;

  match state.oembed.lookup(&video_id).await {
    Ok(info) => Ok(InfoResponse::from_oembed(video_id, info)),
    Err(ExtractError::Status(status)) => {
      warn!("oembed answered {} for {}", status, video_id);
      Err(Error::VideoNotFound)
    }
    Err(e) => {
      warn!("oembed failed for {}: {}", video_id, e);
      Err(Error::VideoInfoFailed(e.to_string()))
    }
  }
}
