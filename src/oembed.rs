use std::time::Duration;

use reqwest::header;
use serde::Deserialize;

use crate::{
  config::Config,
  extractor::{ExtractError, BROWSER_USER_AGENT},
};

const TIMEOUT: Duration = Duration::from_secs(8);

/// YouTube's oEmbed endpoint. Only title and author, but it needs neither
/// yt-dlp nor a player request.
pub struct Oembed {
  client: reqwest::Client,
  base_url: String,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct OembedInfo {
  pub title: Option<String>,
  pub author_name: Option<String>,
}

pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={video_id}")
}

pub fn thumbnail_url(video_id: &str) -> String {
  format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")
}

impl Oembed {
  pub fn new(config: &Config) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: config.innertube_base_url.clone(),
    }
  }

  pub async fn lookup(
    &self,
    video_id: &str,
  ) -> Result<OembedInfo, ExtractError> {
    let resp = self
      .client
      .get(format!("{}/oembed", self.base_url))
      .query(&[("url", watch_url(video_id).as_str()), ("format", "json")])
      .header(header::USER_AGENT, BROWSER_USER_AGENT)
      .timeout(TIMEOUT)
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(ExtractError::Status(resp.status()));
    }

    Ok(resp.json().await?)
  }
}
