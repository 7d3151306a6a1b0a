use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::{
  media::Format,
  resolver::{ResolutionRequest, ResolutionResult},
  AppState, Error, Result,
};

const FORMAT_ID: &str = "python-processed";
const EXPIRES_NOTE: &str = "Download URL may expire quickly.";

// placeholders kept for clients that still read them, nothing is metered
const TOKEN_COST: u32 = 0;
const TOKENS_REMAINING: u32 = 9999;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
  title: String,
  thumbnail: Option<String>,
  author: String,
  quality_requested: String,
  quality_resolved: String,
  format_id: &'static str,
  download_url: String,
  expires_note: &'static str,
  token_cost: u32,
  tokens_remaining: u32,
}

impl From<ResolutionResult> for DownloadResponse {
  fn from(r: ResolutionResult) -> Self {
    Self {
      title: r.title,
      thumbnail: r.thumbnail,
      author: r.author,
      quality_requested: r.quality_requested,
      quality_resolved: r.quality_resolved,
      format_id: FORMAT_ID,
      download_url: r.download_url,
      expires_note: EXPIRES_NOTE,
      token_cost: TOKEN_COST,
      tokens_remaining: TOKENS_REMAINING,
    }
  }
}

pub async fn video_download(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<DownloadResponse>> {
  let req = parse_request(&body)?;
  let result = state.resolver.resolve(&req).await?;
  Ok(Json(result.into()))
}

pub(crate) fn parse_json(body: &[u8]) -> Result<Value> {
  serde_json::from_slice(body).map_err(|_| Error::InvalidJson)
}

/// A non-blank string field of a json object body.
pub(crate) fn str_field<'a>(body: &'a Value, name: &str) -> Option<&'a str> {
  body
    .get(name)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

fn parse_request(body: &[u8]) -> Result<ResolutionRequest> {
  let body = parse_json(body)?;
  let url = str_field(&body, "url").ok_or(Error::InvalidUrl)?;

  let mut req = ResolutionRequest::new(url);
  if let Some(quality) = str_field(&body, "quality") {
    req = req.with_quality(quality);
  }
  if let Some(format) = str_field(&body, "format") {
    req = req.with_format(Format::parse(format));
  }

  Ok(req)
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Arc;

  use reqwest::{header, Method, StatusCode};
  use serde_json::{json, Value};

  use super::*;
  use crate::{
    config::Config,
    extractor::{Extraction, Ytdlp},
    mock,
    oembed::Oembed,
    resolver::{tests::Fake, Resolver},
  };

  pub fn state(
    local: &Arc<Fake>,
    remote: &Arc<Fake>,
    secondary: &Arc<Fake>,
  ) -> Arc<AppState> {
    let config = Config {
      ytdlp_bin: "/nonexistent/yt-dlp".to_string(),
      ..Default::default()
    };
    state_with(&config, local, remote, secondary)
  }

  pub fn state_with(
    config: &Config,
    local: &Arc<Fake>,
    remote: &Arc<Fake>,
    secondary: &Arc<Fake>,
  ) -> Arc<AppState> {
    Arc::new(AppState {
      resolver: Resolver::new(
        local.clone(),
        remote.clone(),
        secondary.clone(),
      ),
      ytdlp: Ytdlp::new(config),
      oembed: Oembed::new(config),
    })
  }

  async fn post(
    state: Arc<AppState>,
    body: &str,
  ) -> (StatusCode, header::HeaderMap, Value) {
    let base = mock::serve(crate::app(state)).await;
    let resp = reqwest::Client::new()
      .post(format!("{base}/api/video-download"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(body.to_string())
      .send()
      .await
      .unwrap();

    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.json().await.unwrap();
    (status, headers, body)
  }

  #[test]
  fn test_parse_request_defaults() {
    let req = parse_request(br#"{"url": " https://youtu.be/x "}"#).unwrap();
    assert_eq!(req.url, "https://youtu.be/x");
    assert_eq!(req.quality, "720p");
    assert_eq!(req.format, Format::Mp4);

    let req = parse_request(
      br#"{"url": "https://youtu.be/x", "quality": "4k", "format": "mkv"}"#,
    )
    .unwrap();
    assert_eq!(req.quality, "4k");
    assert_eq!(req.format, Format::Mkv);
  }

  #[test]
  fn test_parse_request_errors() {
    assert!(matches!(parse_request(b"{not json"), Err(Error::InvalidJson)));
    assert!(matches!(parse_request(b""), Err(Error::InvalidJson)));
    assert!(matches!(parse_request(b"{}"), Err(Error::InvalidUrl)));
    assert!(matches!(
      parse_request(br#"{"url": ""}"#),
      Err(Error::InvalidUrl)
    ));
    assert!(matches!(parse_request(b"[1, 2]"), Err(Error::InvalidUrl)));
  }

  #[tokio::test]
  async fn test_success_response() {
    let local = Fake::with(
      "local",
      Ok(Extraction {
        url: "https://cdn/video.mp4".into(),
        title: Some("Clip".into()),
        author: Some("Uploader".into()),
        ..Default::default()
      }),
    );
    let remote = Fake::ok("remote", "https://remote");
    let secondary = Fake::ok("secondary", "https://secondary");

    let (status, headers, body) = post(
      state(&local, &remote, &secondary),
      r#"{"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "1080p"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
      body,
      json!({
        "title": "Clip",
        "thumbnail": null,
        "author": "Uploader",
        "qualityRequested": "1080p",
        "qualityResolved": "1080p",
        "formatId": "python-processed",
        "downloadUrl": "https://cdn/video.mp4",
        "expiresNote": "Download URL may expire quickly.",
        "tokenCost": 0,
        "tokensRemaining": 9999,
      })
    );
  }

  #[tokio::test]
  async fn test_invalid_json() {
    let local = Fake::ok("local", "https://local");
    let (status, headers, body) =
      post(state(&local, &local, &local), "{oops").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(body["code"], "INVALID_JSON");
    assert_eq!(local.calls(), 0);
  }

  #[tokio::test]
  async fn test_missing_url() {
    let local = Fake::ok("local", "https://local");
    let remote = Fake::ok("remote", "https://remote");
    let secondary = Fake::ok("secondary", "https://secondary");

    let (status, _, body) = post(
      state(&local, &remote, &secondary),
      r#"{"quality": "720p"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_URL");
    assert_eq!(local.calls() + remote.calls() + secondary.calls(), 0);
  }

  #[tokio::test]
  async fn test_all_strategies_failed() {
    let local = Fake::failing("local", "yt-dlp error: HTTP Error 403");
    let remote = Fake::failing("remote", "Cobalt https://a error: 500");
    let secondary =
      Fake::failing("secondary", "Innertube error: all client profiles failed");

    let (status, headers, body) = post(
      state(&local, &remote, &secondary),
      r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(body["code"], "DOWNLOAD_PROCESSING_FAILED");

    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Could not process video. Errors: "));
    assert!(message.contains("yt-dlp error: HTTP Error 403"));
    assert!(message.contains("Cobalt https://a error: 500"));
    assert!(message.contains("Innertube error: all client profiles failed"));
  }

  // header lists compare as sets of lowercase tokens
  fn tokens(value: &header::HeaderValue) -> Vec<String> {
    let mut tokens: Vec<_> = value
      .to_str()
      .unwrap()
      .split(',')
      .map(|t| t.trim().to_ascii_lowercase())
      .collect();
    tokens.sort();
    tokens
  }

  async fn options(path: &str) -> reqwest::Response {
    let local = Fake::ok("local", "https://local");
    let base = mock::serve(crate::app(state(&local, &local, &local))).await;

    let resp = reqwest::Client::new()
      .request(Method::OPTIONS, format!("{base}{path}"))
      .body("this is not json")
      .send()
      .await
      .unwrap();
    assert_eq!(local.calls(), 0);
    resp
  }

  #[tokio::test]
  async fn test_preflight() {
    let resp = options("/api/video-download").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
      tokens(&headers[header::ACCESS_CONTROL_ALLOW_METHODS]),
      ["options", "post"]
    );
    assert_eq!(
      tokens(&headers[header::ACCESS_CONTROL_ALLOW_HEADERS]),
      ["authorization", "content-type"]
    );
    assert!(resp.text().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_preflight_on_any_route() {
    for path in ["/health", "/api/video-info"] {
      let resp = options(path).await;
      assert_eq!(resp.status(), StatusCode::OK, "{path}");
      assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
      assert!(resp
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
      assert!(resp.text().await.unwrap().is_empty());
    }
  }

  #[tokio::test]
  async fn test_wrong_method() {
    let local = Fake::ok("local", "https://local");
    let base = mock::serve(crate::app(state(&local, &local, &local))).await;

    let resp = reqwest::get(format!("{base}/api/video-download"))
      .await
      .unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers()[header::ALLOW], "POST");
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
      body,
      json!({ "error": "Method not allowed", "code": "METHOD_NOT_ALLOWED" })
    );
    assert_eq!(local.calls(), 0);
  }
}
