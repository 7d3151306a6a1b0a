use itertools::Itertools;

pub const DEFAULT_QUALITY: &str = "720p";
pub const DEFAULT_HEIGHT: u32 = 720;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
  #[default]
  Mp4,
  Mp3,
  Mkv,
}

impl Format {
  // unrecognised formats fall back to mp4, like unknown qualities fall
  // back to 720p
  pub fn parse(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "mp3" => Format::Mp3,
      "mkv" => Format::Mkv,
      _ => Format::Mp4,
    }
  }

  pub fn is_audio(self) -> bool {
    self == Format::Mp3
  }

  /// Container extension to look for among the source's streams. Sites
  /// rarely serve true mkv, webm is the closest thing they do serve.
  pub fn stream_ext(self) -> &'static str {
    match self {
      Format::Mp4 => "mp4",
      Format::Mp3 => "mp3",
      Format::Mkv => "webm",
    }
  }
}

/// "4k"/"2160p" map to 2160, otherwise the number before the trailing "p".
pub fn target_height(quality: &str) -> u32 {
  let quality = quality.trim();
  if quality.eq_ignore_ascii_case("4k") || quality == "2160p" {
    return 2160;
  }

  quality
    .trim_end_matches('p')
    .parse()
    .unwrap_or(DEFAULT_HEIGHT)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateStream {
  pub url: String,
  // yt-dlp format id or youtube itag
  pub format_id: Option<String>,
  pub extension: String,
  pub has_video: bool,
  pub has_audio: bool,
  pub height: u32,
  // kbps
  pub audio_bitrate: u32,
}

impl CandidateStream {
  fn is_audio_only(&self) -> bool {
    self.has_audio && !self.has_video
  }

  fn is_progressive(&self) -> bool {
    self.has_audio && self.has_video
  }
}

/// Highest bitrate stream without a video track.
pub fn best_audio(candidates: &[CandidateStream]) -> Option<&CandidateStream> {
  candidates
    .iter()
    .filter(|c| c.is_audio_only())
    .sorted_by_key(|c| std::cmp::Reverse(c.audio_bitrate))
    .next()
}

/// Tallest progressive stream matching `ext`, optionally capped at
/// `max_height`.
pub fn best_progressive<'a>(
  candidates: &'a [CandidateStream],
  ext: Option<&str>,
  max_height: Option<u32>,
) -> Option<&'a CandidateStream> {
  candidates
    .iter()
    .filter(|c| c.is_progressive())
    .filter(|c| ext.map_or(true, |ext| c.extension == ext))
    .filter(|c| max_height.map_or(true, |max| c.height <= max))
    .sorted_by_key(|c| std::cmp::Reverse(c.height))
    .next()
}

/// Selection used when a local extractor hands back a stream list instead
/// of an already chosen url.
pub fn select_stream(
  candidates: &[CandidateStream],
  format: Format,
  target_height: u32,
) -> Option<&CandidateStream> {
  if format.is_audio() {
    return best_audio(candidates);
  }

  best_progressive(candidates, Some(format.stream_ext()), Some(target_height))
    .or_else(|| best_progressive(candidates, None, None))
}
