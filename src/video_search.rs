//! YouTube search for lesson video suggestions

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::VideoSearchConfig;

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, thiserror::Error)]
pub enum VideoSearchError {
    #[error("YouTube API key not configured")]
    NotConfigured,

    #[error("Query parameter is required")]
    EmptyQuery,

    #[error("YouTube API quota exceeded")]
    QuotaExceeded,

    #[error("YouTube API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One video returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub channel: String,
    pub url: String,
    /// Player URL for an embedded iframe
    pub embed_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    /// Channel and playlist hits carry no video id and are skipped
    fn into_video(self) -> Option<VideoResult> {
        let id = self.id.video_id?;
        let snippet = self.snippet;
        let thumbnails = snippet.thumbnails;
        let thumbnail = thumbnails
            .high
            .or(thumbnails.medium)
            .or(thumbnails.default)
            .map(|t| t.url)
            .unwrap_or_default();

        Some(VideoResult {
            url: format!("https://www.youtube.com/watch?v={}", id),
            embed_url: format!("https://www.youtube.com/embed/{}", id),
            id,
            title: snippet.title,
            description: snippet.description,
            thumbnail,
            channel: snippet.channel_title,
        })
    }
}

/// Client for the YouTube Data API search endpoint
#[derive(Clone)]
pub struct VideoSearchClient {
    client: Client,
    config: VideoSearchConfig,
}

impl VideoSearchClient {
    pub fn new(config: VideoSearchConfig) -> Result<Self, VideoSearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }

    /// Search for embeddable videos matching `query`
    pub async fn search(&self, query: &str) -> Result<Vec<VideoResult>, VideoSearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VideoSearchError::EmptyQuery);
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(VideoSearchError::NotConfigured)?;

        let endpoint = self.config.endpoint.as_deref().unwrap_or(YOUTUBE_SEARCH_URL);
        let max_results = self.config.max_results.to_string();

        debug!("Searching YouTube for: {}", query);

        let response = self
            .client
            .get(endpoint)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("videoEmbeddable", "true"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let body: SearchResponse = response.json().await?;
        let videos = parse_items(body);

        info!("🎬 Found {} videos for \"{}\"", videos.len(), query);
        Ok(videos)
    }
}

fn parse_items(body: SearchResponse) -> Vec<VideoResult> {
    body.items.into_iter().filter_map(SearchItem::into_video).collect()
}

fn classify_status(status: StatusCode, body: String) -> VideoSearchError {
    if status == StatusCode::FORBIDDEN && body.contains("quotaExceeded") {
        return VideoSearchError::QuotaExceeded;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return VideoSearchError::QuotaExceeded;
    }
    VideoSearchError::Api {
        status: status.as_u16(),
        message: body,
    }
}
