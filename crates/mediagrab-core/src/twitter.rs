//! Twitter/X video resolution through the twitsave resolver.
//!
//! Twitter serves no public description endpoint, so the post URL is handed
//! to a resolver service and the direct video address is scraped out of the
//! response page.

use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::media::{FormatCandidate, Metadata, StreamKind};

/// Resolver endpoint that returns a page embedding the direct video URL.
const RESOLVER_ENDPOINT: &str = "https://twitsave.com/info";

/// Marker the resolver renders when the tweet carries no accessible video.
const NO_VIDEO_MARKER: &str = "Sorry, we could not find any video on this tweet";

/// Fetch the description of one tweet and parse it into [`Metadata`].
///
/// # Errors
///
/// Returns [`FetchError::NotFound`] when the tweet has no accessible video
/// (commonly a private account) and [`FetchError::MalformedResponse`] when
/// the resolver page carries no video address.
pub async fn fetch_metadata(client: &Client, url: &str) -> Result<Metadata> {
    let response = client
        .get(RESOLVER_ENDPOINT)
        .query(&[("url", url)])
        .send()
        .await
        .map_err(FetchError::Request)?;

    let body = response.text().await.map_err(FetchError::Request)?;
    let metadata = parse_resolver_page(&body, url)?;
    debug!(url, "twitter video resolved");
    Ok(metadata)
}

/// Parse the resolver page into [`Metadata`]. Pure.
fn parse_resolver_page(body: &str, url: &str) -> std::result::Result<Metadata, FetchError> {
    if body.contains(NO_VIDEO_MARKER) {
        return Err(FetchError::NotFound);
    }

    let video_url =
        extract_video_src(body).ok_or_else(|| FetchError::MalformedResponse {
            reason: "no video tag in resolver response".to_string(),
        })?;

    let id = status_id(url).unwrap_or_else(|| url.to_string());

    Ok(Metadata {
        id: id.clone(),
        title: format!("twitter_{id}"),
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

/// First `<video src>` attribute in the page.
fn extract_video_src(body: &str) -> Option<String> {
    let re = Regex::new(r#"<video[^>]*\ssrc\s*=\s*"([^"]+)""#).ok()?;
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Numeric status ID from a tweet URL, used as the content identifier.
fn status_id(url: &str) -> Option<String> {
    let re = Regex::new(r"/status/(\d+)").ok()?;
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_source_from_page() {
        let body = r#"<div><video class="w-full" src="https://video.twimg.com/vid/720/clip.mp4?tag=12" controls></video></div>"#;
        let metadata =
            parse_resolver_page(body, "https://x.com/user/status/1234567890").expect("parses");
        assert_eq!(metadata.id, "1234567890");
        assert_eq!(metadata.formats.len(), 1);
        assert_eq!(
            metadata.formats[0].url,
            "https://video.twimg.com/vid/720/clip.mp4?tag=12"
        );
    }

    #[test]
    fn no_video_marker_is_not_found() {
        let body = "<p>Sorry, we could not find any video on this tweet</p>";
        let err = parse_resolver_page(body, "https://x.com/user/status/1").expect_err("must fail");
        assert!(matches!(err, FetchError::NotFound));
    }

    #[test]
    fn page_without_video_tag_is_malformed() {
        let err = parse_resolver_page("<html><body>ad wall</body></html>", "https://x.com/u/status/1")
            .expect_err("must fail");
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
    }

    #[test]
    fn status_id_extraction() {
        assert_eq!(
            status_id("https://twitter.com/user/status/99887766?s=20"),
            Some("99887766".to_string())
        );
        assert_eq!(status_id("https://x.com/user"), None);
    }
}
