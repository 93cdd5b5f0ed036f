use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";
pub const DEFAULT_VIMEO_OEMBED_URL: &str = "https://vimeo.com/api/oembed.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoProvider {
    YouTube,
    Vimeo,
}

impl VideoProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoProvider::YouTube => "youtube",
            VideoProvider::Vimeo => "vimeo",
        }
    }
}

/// A recognised hosted-video URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub provider: VideoProvider,
    pub video_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub provider: VideoProvider,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    thumbnail_url: Option<String>,
    duration: Option<i64>,
}

fn youtube_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/)|youtu\.be/)([A-Za-z0-9_-]{11})",
        )
        .expect("valid YouTube regex")
    })
}

fn vimeo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.|player\.)?vimeo\.com/(?:video/)?(\d+)").expect("valid Vimeo regex")
    })
}

/// Recognise YouTube and Vimeo links; anything else is not fetched
pub fn detect_provider(url: &str) -> Option<VideoReference> {
    let url = url.trim();
    if let Some(captures) = youtube_pattern().captures(url) {
        return Some(VideoReference {
            provider: VideoProvider::YouTube,
            video_id: captures[1].to_string(),
        });
    }
    if let Some(captures) = vimeo_pattern().captures(url) {
        return Some(VideoReference {
            provider: VideoProvider::Vimeo,
            video_id: captures[1].to_string(),
        });
    }
    None
}

/// Fetches title, thumbnail and duration through the providers' oEmbed endpoints
#[derive(Debug, Clone)]
pub struct VideoMetadataService {
    client: Client,
    youtube_oembed_url: String,
    vimeo_oembed_url: String,
}

impl VideoMetadataService {
    pub fn new(youtube_oembed_url: String, vimeo_oembed_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            youtube_oembed_url,
            vimeo_oembed_url,
        })
    }

    /// `Ok(None)` when the URL is not a recognised video link
    pub async fn fetch(&self, url: &str) -> Result<Option<VideoMetadata>> {
        let Some(reference) = detect_provider(url) else {
            return Ok(None);
        };

        let endpoint = match reference.provider {
            VideoProvider::YouTube => &self.youtube_oembed_url,
            VideoProvider::Vimeo => &self.vimeo_oembed_url,
        };

        let response = self
            .client
            .get(endpoint)
            .query(&[("url", url.trim()), ("format", "json")])
            .send()
            .await
            .context("Failed to send oEmbed request")?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = reference.provider.as_str(), %status, "oEmbed lookup failed");
            anyhow::bail!("oEmbed lookup failed: {}", status);
        }

        let body = response
            .json::<OEmbedResponse>()
            .await
            .context("Failed to parse oEmbed response")?;

        info!(provider = reference.provider.as_str(), video_id = %reference.video_id, "Fetched video metadata");

        Ok(Some(VideoMetadata {
            provider: reference.provider,
            title: body.title.filter(|t| !t.trim().is_empty()),
            thumbnail_url: body.thumbnail_url,
            duration_seconds: body.duration.and_then(|d| i32::try_from(d).ok()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_youtube_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            let reference = detect_provider(url).unwrap();
            assert_eq!(reference.provider, VideoProvider::YouTube, "{}", url);
            assert_eq!(reference.video_id, "dQw4w9WgXcQ");
        }
    }

    #[test]
    fn test_detect_vimeo_forms() {
        let reference = detect_provider("https://vimeo.com/76979871").unwrap();
        assert_eq!(reference.provider, VideoProvider::Vimeo);
        assert_eq!(reference.video_id, "76979871");

        let player = detect_provider("https://player.vimeo.com/video/76979871").unwrap();
        assert_eq!(player.video_id, "76979871");
    }

    #[test]
    fn test_unrecognised_urls() {
        assert_eq!(detect_provider("https://example.com/video.mp4"), None);
        assert_eq!(detect_provider("https://www.youtube.com/channel/abc"), None);
        assert_eq!(detect_provider("not a url"), None);
    }
}
