//! YouTube ID extraction and metadata retrieval.
//!
//! The video ID is an 11-character token carried by every URL shape
//! (watch, short link, shorts, embed). Metadata comes from the
//! `youtubei/v1/player` description endpoint queried with a fixed Android
//! client identity, and is parsed into the typed [`Metadata`] model at the
//! boundary.

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::media::{FormatCandidate, Metadata, StreamKind};

/// Description endpoint for one video.
const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";

/// Fixed client identity the player endpoint requires. The Android client
/// is served direct, non-throttled stream URLs.
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "19.09.37";
const ANDROID_SDK_VERSION: u32 = 30;

/// Extract the 11-character video ID from any supported URL shape.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    let re = Regex::new(r"(?:v=|youtu\.be/|/shorts/|/embed/|/live/)([A-Za-z0-9_-]{11})").ok()?;
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fetch the description of one video and parse it into [`Metadata`].
///
/// # Errors
///
/// Returns [`FetchError::MalformedResponse`] on an unparsable body,
/// [`FetchError::NotFound`] when the returned video does not match the
/// requested ID, and [`FetchError::Unplayable`] when upstream refuses to
/// serve the post.
pub async fn fetch_metadata(client: &Client, id: &str) -> Result<Metadata> {
    let body = serde_json::json!({
        "context": {
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "androidSdkVersion": ANDROID_SDK_VERSION,
                "hl": "en",
            }
        },
        "videoId": id,
    });

    let response = client
        .post(PLAYER_ENDPOINT)
        .json(&body)
        .send()
        .await
        .map_err(FetchError::Request)?;

    let text = response.text().await.map_err(FetchError::Request)?;
    let metadata = parse_player_response(&text, id)?;
    debug!(id, formats = metadata.formats.len(), "youtube metadata fetched");
    Ok(metadata)
}

/// Parse a raw player response body into [`Metadata`]. Pure; all
/// upstream-shape handling lives here.
fn parse_player_response(body: &str, id: &str) -> std::result::Result<Metadata, FetchError> {
    let response: PlayerResponse =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            reason: e.to_string(),
        })?;

    if let Some(status) = &response.playability_status
        && status.status.as_deref() != Some("OK")
    {
        return Err(FetchError::Unplayable {
            reason: status
                .reason
                .clone()
                .or_else(|| status.status.clone())
                .unwrap_or_else(|| "unknown".to_string()),
        });
    }

    let details = response.video_details.ok_or(FetchError::NotFound)?;
    if details.video_id.as_deref() != Some(id) {
        return Err(FetchError::NotFound);
    }

    let streaming = response
        .streaming_data
        .ok_or_else(|| FetchError::MalformedResponse {
            reason: "streamingData is missing".to_string(),
        })?;

    let formats = streaming
        .formats
        .into_iter()
        .chain(streaming.adaptive_formats)
        .filter_map(candidate_from_format)
        .collect();

    Ok(Metadata {
        id: id.to_string(),
        title: details.title.unwrap_or_else(|| format!("youtube_{id}")),
        duration_secs: details.length_seconds.and_then(|s| s.parse().ok()),
        formats,
        images: Vec::new(),
    })
}

/// Map one upstream format entry into a candidate, dropping entries
/// without a direct URL or a recognizable mime type.
fn candidate_from_format(format: RawFormat) -> Option<FormatCandidate> {
    let url = format.url?;
    let mime = format.mime_type?;

    let kind = if mime.starts_with("audio") {
        StreamKind::Audio
    } else if mime.starts_with("video") {
        StreamKind::Video
    } else {
        return None;
    };

    Some(FormatCandidate {
        kind,
        url,
        bitrate: format.bitrate,
        content_length: format.content_length.and_then(|len| len.parse().ok()),
    })
}

// ---------------------------------------------------------------------------
// Player response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    video_details: Option<VideoDetails>,
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    video_id: Option<String>,
    title: Option<String>,
    length_seconds: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    url: Option<String>,
    mime_type: Option<String>,
    bitrate: Option<u64>,
    content_length: Option<String>,
}
