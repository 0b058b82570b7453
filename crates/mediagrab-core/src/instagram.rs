//! Instagram reel resolution through a snapsave-style resolver.
//!
//! Like Twitter, Instagram exposes no public description endpoint; the post
//! URL is submitted to a resolver service and the first direct media
//! address is scraped out of the response.

use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::media::{FormatCandidate, Metadata, StreamKind};

/// Resolver endpoint accepting the post URL as a form field.
const RESOLVER_ENDPOINT: &str = "https://snapsave.app/action.php";

/// Fetch the description of one reel and parse it into [`Metadata`].
///
/// # Errors
///
/// Returns [`FetchError::NotFound`] when the resolver response carries no
/// direct media address (commonly a private account).
pub async fn fetch_metadata(client: &Client, url: &str) -> Result<Metadata> {
    let response = client
        .post(RESOLVER_ENDPOINT)
        .form(&[("url", url)])
        .send()
        .await
        .map_err(FetchError::Request)?;

    let body = response.text().await.map_err(FetchError::Request)?;
    let metadata = parse_resolver_response(&body, url)?;
    debug!(url, "instagram video resolved");
    Ok(metadata)
}

/// Parse the resolver response into [`Metadata`]. Pure.
fn parse_resolver_response(body: &str, url: &str) -> std::result::Result<Metadata, FetchError> {
    let video_url = extract_media_url(body).ok_or(FetchError::NotFound)?;

    let id = shortcode(url).unwrap_or_else(|| url.to_string());

    Ok(Metadata {
        id: id.clone(),
        title: format!("instagram_{id}"),
        duration_secs: None,
        formats: vec![FormatCandidate {
            kind: StreamKind::Video,
            url: video_url,
            bitrate: None,
            content_length: None,
        }],
        images: Vec::new(),
    })
}

/// First direct mp4 address in the resolver response.
fn extract_media_url(body: &str) -> Option<String> {
    let re = Regex::new(r#"https://[^"'\\\s]+\.mp4[^"'\\\s]*"#).ok()?;
    re.find(body).map(|m| m.as_str().to_string())
}

/// Post shortcode from a reel or post URL, used as the content identifier.
fn shortcode(url: &str) -> Option<String> {
    let re = Regex::new(r"/(?:reel|reels|p)/([A-Za-z0-9_-]+)").ok()?;
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
