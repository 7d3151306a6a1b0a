use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{config::Config, resolver::ResolutionRequest};

use super::{non_empty, ErrorLog, ExtractError, Extraction, Extractor};

pub const BROWSER_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
   AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// audio is transcoded on the mirror
const VIDEO_TIMEOUT: Duration = Duration::from_secs(6);
const AUDIO_TIMEOUT: Duration = Duration::from_secs(15);

/// Public cobalt-style conversion API, tried mirror by mirror.
pub struct Cobalt {
  client: reqwest::Client,
  endpoints: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct CobaltRequest<'a> {
  url: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  video_quality: Option<&'static str>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  is_audio_only: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  a_format: Option<&'static str>,
  filename_style: &'static str,
  v_codec: &'static str,
}

impl<'a> CobaltRequest<'a> {
  fn new(req: &'a ResolutionRequest) -> Self {
    let audio = req.format.is_audio();
    Self {
      url: &req.url,
      video_quality: (!audio).then(|| cobalt_quality(&req.quality)),
      is_audio_only: audio,
      a_format: audio.then_some("mp3"),
      filename_style: "pretty",
      v_codec: "h264",
    }
  }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct CobaltResponse {
  url: Option<String>,
  download_url: Option<String>,
  data: Option<CobaltData>,
  picker: Option<Vec<PickerItem>>,
}

#[derive(Deserialize, Debug, Default)]
struct CobaltData {
  url: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct PickerItem {
  url: Option<String>,
}

impl CobaltResponse {
  fn into_url(self) -> Option<String> {
    non_empty(self.url)
      .or_else(|| non_empty(self.download_url))
      .or_else(|| self.data.and_then(|d| non_empty(d.url)))
      .or_else(|| {
        self
          .picker
          .unwrap_or_default()
          .into_iter()
          .find_map(|item| non_empty(item.url))
      })
  }
}

fn cobalt_quality(quality: &str) -> &'static str {
  match quality {
    "360p" => "360",
    "720p" => "720",
    "1080p" => "1080",
    "2160p" | "4k" => "2160",
    _ => "720",
  }
}

impl Cobalt {
  pub fn new(config: &Config) -> Self {
    Self::with_endpoints(config.cobalt_endpoints.clone())
  }

  pub fn with_endpoints(endpoints: Vec<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      endpoints,
    }
  }

  async fn convert_at(
    &self,
    endpoint: &str,
    req: &ResolutionRequest,
  ) -> Result<String, ExtractError> {
    let timeout = if req.format.is_audio() {
      AUDIO_TIMEOUT
    } else {
      VIDEO_TIMEOUT
    };

    let resp = self
      .client
      .post(endpoint)
      .header(header::ACCEPT, "application/json")
      .header(header::USER_AGENT, BROWSER_USER_AGENT)
      .timeout(timeout)
      .json(&CobaltRequest::new(req))
      .send()
      .await?;

    if resp.status() != StatusCode::OK {
      return Err(ExtractError::Status(resp.status()));
    }

    resp
      .json::<CobaltResponse>()
      .await?
      .into_url()
      .ok_or(ExtractError::NoUrl)
  }
}

#[async_trait]
impl Extractor for Cobalt {
  fn name(&self) -> &'static str {
    "cobalt"
  }

  async fn extract(
    &self,
    req: &ResolutionRequest,
  ) -> Result<Extraction, ErrorLog> {
    let mut errors = ErrorLog::default();

    for endpoint in &self.endpoints {
      debug!("posting {} to {}", req.url, endpoint);
      match self.convert_at(endpoint, req).await {
        Ok(url) => {
          info!("cobalt mirror {} resolved {}", endpoint, req.url);
          return Ok(Extraction {
            url,
            ..Default::default()
          });
        }
        Err(e) => errors.push(format!("Cobalt {endpoint} error: {e}")),
      }
    }

    if errors.is_empty() {
      errors.push("Cobalt error: no endpoints configured");
    }

    Err(errors)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use axum::{extract::State, routing::post, Json, Router};
  use serde_json::{json, Value};

  use super::*;
  use crate::{media::Format, mock};

  #[test]
  fn test_quality_map() {
    assert_eq!(cobalt_quality("360p"), "360");
    assert_eq!(cobalt_quality("1080p"), "1080");
    assert_eq!(cobalt_quality("4k"), "2160");
    assert_eq!(cobalt_quality("2160p"), "2160");
    assert_eq!(cobalt_quality("480p"), "720");
  }

  #[test]
  fn test_request_body() {
    let req = ResolutionRequest::new("https://youtu.be/x").with_quality("4k");
    assert_eq!(
      serde_json::to_value(CobaltRequest::new(&req)).unwrap(),
      json!({
        "url": "https://youtu.be/x",
        "videoQuality": "2160",
        "filenameStyle": "pretty",
        "vCodec": "h264",
      })
    );

    let req = req.with_format(Format::Mp3);
    assert_eq!(
      serde_json::to_value(CobaltRequest::new(&req)).unwrap(),
      json!({
        "url": "https://youtu.be/x",
        "isAudioOnly": true,
        "aFormat": "mp3",
        "filenameStyle": "pretty",
        "vCodec": "h264",
      })
    );
  }

  #[test]
  fn test_picker_skips_entries_without_url() {
    let resp: CobaltResponse = serde_json::from_value(json!({
      "status": "picker",
      "picker": [{"url": null, "type": "photo"}, {"url": "Y"}, {"url": "Z"}]
    }))
    .unwrap();
    assert_eq!(resp.into_url().as_deref(), Some("Y"));

    let resp: CobaltResponse =
      serde_json::from_value(json!({"data": {"url": "D"}})).unwrap();
    assert_eq!(resp.into_url().as_deref(), Some("D"));

    let resp: CobaltResponse =
      serde_json::from_value(json!({"status": "error", "picker": null}))
        .unwrap();
    assert_eq!(resp.into_url(), None);
  }

  async fn reply(
    State((hits, body)): State<(Arc<AtomicUsize>, Value)>,
  ) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(body)
  }

  async fn broken(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
  }

  #[tokio::test]
  async fn test_first_working_mirror_wins() {
    let broken_hits = Arc::new(AtomicUsize::new(0));
    let good_hits = Arc::new(AtomicUsize::new(0));
    let spare_hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
      .route("/broken", post(broken).with_state(broken_hits.clone()))
      .route(
        "/good",
        post(reply).with_state((good_hits.clone(), json!({"url": "X"}))),
      )
      .route(
        "/spare",
        post(reply).with_state((spare_hits.clone(), json!({"url": "S"}))),
      );
    let base = mock::serve(app).await;

    let cobalt = Cobalt::with_endpoints(vec![
      format!("{base}/broken"),
      format!("{base}/good"),
      format!("{base}/spare"),
    ]);
    let req = ResolutionRequest::new("https://youtu.be/dQw4w9WgXcQ");
    let extraction = cobalt.extract(&req).await.unwrap();

    assert_eq!(extraction.url, "X");
    assert_eq!(broken_hits.load(Ordering::SeqCst), 1);
    assert_eq!(good_hits.load(Ordering::SeqCst), 1);
    assert_eq!(spare_hits.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_every_mirror_failure_is_logged() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
      .route("/down", post(broken).with_state(hits.clone()))
      .route(
        "/empty",
        post(reply).with_state((hits.clone(), json!({"status": "error"}))),
      );
    let base = mock::serve(app).await;

    let cobalt = Cobalt::with_endpoints(vec![
      format!("{base}/down"),
      format!("{base}/empty"),
      // nothing listens on port 9 locally
      "http://127.0.0.1:9/api/json".to_string(),
    ]);
    let req = ResolutionRequest::new("https://youtu.be/dQw4w9WgXcQ");
    let log = cobalt.extract(&req).await.unwrap_err();

    assert_eq!(log.entries().len(), 3);
    assert!(log.entries()[0].contains("/down error: unexpected status 503"));
    assert!(log.entries()[1].contains("/empty error: no download url"));
    assert!(log.entries()[2].starts_with("Cobalt http://127.0.0.1:9/api/json"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }
}
