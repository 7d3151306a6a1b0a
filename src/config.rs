use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

// public cobalt mirrors, tried in this order
pub const DEFAULT_COBALT_ENDPOINTS: &[&str] = &[
  "https://api.cobalt.tools/api/json",
  "https://co.wuk.sh/api/json",
  "https://cobalt.api.red/",
  "https://api.wuk.sh/",
  "https://cobalt.tools/api/json",
  "https://api.douyin.wtf/api/json",
];

// mobile, web, creator studio
pub const DEFAULT_INNERTUBE_CLIENTS: &[&str] =
  &["ANDROID", "WEB", "WEB_CREATOR"];

pub const DEFAULT_INNERTUBE_BASE_URL: &str = "https://www.youtube.com";

#[derive(Clone, Debug)]
pub struct Config {
  pub listen_addr: SocketAddr,
  pub ytdlp_bin: String,
  pub ytdlp_proxy: Option<String>,
  pub ytdlp_timeout: Duration,
  pub cobalt_endpoints: Vec<String>,
  pub innertube_clients: Vec<String>,
  pub innertube_base_url: String,
  pub innertube_timeout: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
      ytdlp_bin: "yt-dlp".to_string(),
      ytdlp_proxy: None,
      ytdlp_timeout: Duration::from_secs(30),
      cobalt_endpoints: to_owned_list(DEFAULT_COBALT_ENDPOINTS),
      innertube_clients: to_owned_list(DEFAULT_INNERTUBE_CLIENTS),
      innertube_base_url: DEFAULT_INNERTUBE_BASE_URL.to_string(),
      innertube_timeout: Duration::from_secs(10),
    }
  }
}

impl Config {
  /// Read the configuration from the environment, falling back to the
  /// defaults for anything unset.
  pub fn from_env() -> anyhow::Result<Self> {
    let mut config = Self::default();

    if let Some(addr) = env("LISTEN_ADDR") {
      config.listen_addr = addr
        .parse()
        .with_context(|| format!("invalid LISTEN_ADDR: {addr}"))?;
    }
    if let Some(bin) = env("YTDLP_BIN") {
      config.ytdlp_bin = bin;
    }
    config.ytdlp_proxy = env("YTDLP_PROXY");
    if let Some(secs) = env_secs("YTDLP_TIMEOUT_SECS")? {
      config.ytdlp_timeout = secs;
    }
    if let Some(endpoints) = env("COBALT_ENDPOINTS") {
      config.cobalt_endpoints = parse_list(&endpoints);
    }
    if let Some(clients) = env("INNERTUBE_CLIENTS") {
      config.innertube_clients = parse_list(&clients);
    }
    if let Some(base) = env("INNERTUBE_BASE_URL") {
      config.innertube_base_url = base.trim_end_matches('/').to_string();
    }
    if let Some(secs) = env_secs("INNERTUBE_TIMEOUT_SECS")? {
      config.innertube_timeout = secs;
    }

    Ok(config)
  }
}

fn env(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(name: &str) -> anyhow::Result<Option<Duration>> {
  env(name)
    .map(|v| {
      v.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .with_context(|| format!("invalid {name}: {v}"))
    })
    .transpose()
}

fn parse_list(s: &str) -> Vec<String> {
  s.split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(String::from)
    .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}
