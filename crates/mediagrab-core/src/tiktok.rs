//! TikTok ID resolution and metadata retrieval.
//!
//! Three-step resolution: mobile `vm.` short links embed the canonical
//! desktop URL in the page body, `/t/` share links resolve through one
//! redirect hop, and the canonical URL carries the numeric post ID after a
//! `/video/` or `/photo/` marker. Metadata comes from the `aweme/v1/feed`
//! description endpoint and is parsed into the typed [`Metadata`] model at
//! the boundary; nothing downstream touches the raw payload.

use regex::Regex;
use reqwest::{Client, Method};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{FetchError, ResolveError, Result};
use crate::media::{FormatCandidate, Metadata, StreamKind};

/// Description endpoint for one post.
const FEED_ENDPOINT: &str = "https://api22-normal-c-alisg.tiktokv.com/aweme/v1/feed/";

/// Fixed client-identity parameters the feed endpoint requires.
const CLIENT_IDENTITY: &[(&str, &str)] = &[
    ("iid", "7318518857994389254"),
    ("device_id", "7318517321748022790"),
    ("channel", "googleplay"),
    ("app_name", "musical_ly"),
    ("version_code", "300904"),
    ("device_platform", "android"),
    ("device_type", "ASUS_Z01QD"),
    ("version", "9"),
];

/// Response-body marker for upstream throttling.
const RATE_LIMIT_MARKER: &str = "ratelimit triggered";

/// Post IDs are numeric and at most this long.
const ID_LENGTH: usize = 19;

/// Resolve a normalized TikTok URL to its canonical post ID.
///
/// Mobile `vm.` links are fetched once to read the embedded canonical URL;
/// `/t/` share links are resolved through their redirect without reading
/// the target body.
///
/// # Errors
///
/// Returns a [`ResolveError`] when the canonical marker is absent, the
/// redirect does not resolve, or no content marker is present in the final
/// path.
pub async fn resolve_id(client: &Client, url: &str) -> Result<String> {
    let mut url = url.to_string();

    // Mobile link: fetch the desktop link first.
    if url.starts_with("https://vm.") {
        let body = client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ResolveError::ShortLinkFetch {
                reason: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| ResolveError::ShortLinkFetch {
                reason: e.to_string(),
            })?;

        url = extract_canonical_url(&body).ok_or(ResolveError::CanonicalMissing)?;
        debug!(canonical = %url, "resolved mobile link");
    }

    // Share link: one redirect hop, final location only.
    if url.contains("/t/") {
        let response = client.get(&url).send().await.map_err(|e| {
            ResolveError::RedirectFailed {
                reason: e.to_string(),
            }
        })?;
        url = response.url().to_string();
        debug!(resolved = %url, "followed share-link redirect");
    }

    let id = extract_content_id(&url)?;
    Ok(id)
}

/// Pull the canonical desktop URL out of a mobile page body and decode any
/// escaped unicode sequences in it.
fn extract_canonical_url(body: &str) -> Option<String> {
    let re = Regex::new(r#""canonical":\s*"([^"]+)""#).ok()?;
    let raw = re.captures(body)?.get(1)?.as_str();
    Some(decode_unicode_escapes(raw))
}

/// Decode `\uXXXX` escape sequences embedded in a JSON-ish string value.
fn decode_unicode_escapes(input: &str) -> String {
    let Ok(re) = Regex::new(r"\\u([0-9A-Fa-f]{4})") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(String::new, |c| c.to_string())
    })
    .into_owned()
}

/// Extract the numeric post ID following the `/video/` or `/photo/` path
/// marker. IDs are digits only and capped at [`ID_LENGTH`] characters, so a
/// trailing query string is never picked up.
fn extract_content_id(url: &str) -> std::result::Result<String, ResolveError> {
    let start = ["/video/", "/photo/"]
        .iter()
        .find_map(|marker| url.find(marker).map(|pos| pos + marker.len()))
        .ok_or(ResolveError::MissingContentMarker)?;

    let id: String = url[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .take(ID_LENGTH)
        .collect();

    if id.is_empty() {
        return Err(ResolveError::MalformedId {
            url: url.to_string(),
        });
    }

    Ok(id)
}

/// Fetch the description of one post and parse it into [`Metadata`].
///
/// The feed endpoint answers an OPTIONS request carrying the post ID plus
/// the fixed client-identity parameters.
///
/// # Errors
///
/// Returns [`FetchError::RateLimited`] on the throttle marker,
/// [`FetchError::MalformedResponse`] on an unparsable body and
/// [`FetchError::NotFound`] when the returned post does not match the
/// requested ID.
pub async fn fetch_metadata(client: &Client, id: &str) -> Result<Metadata> {
    let response = client
        .request(Method::OPTIONS, FEED_ENDPOINT)
        .query(&[("aweme_id", id)])
        .query(CLIENT_IDENTITY)
        .send()
        .await
        .map_err(FetchError::Request)?;

    let body = response.text().await.map_err(FetchError::Request)?;
    let metadata = parse_feed(&body, id)?;
    Ok(metadata)
}

/// Parse a raw feed body into [`Metadata`]. Pure; all upstream-shape
/// handling lives here.
fn parse_feed(body: &str, id: &str) -> std::result::Result<Metadata, FetchError> {
    if body.contains(RATE_LIMIT_MARKER) {
        return Err(FetchError::RateLimited);
    }

    let feed: FeedResponse =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let aweme = feed.aweme_list.first().ok_or(FetchError::NotFound)?;
    let reported_id = aweme.aweme_id.as_ref().map(IdValue::as_string);
    if reported_id.as_deref() != Some(id) {
        return Err(FetchError::NotFound);
    }

    let title = if aweme.desc.is_empty() {
        format!("tiktok_{id}")
    } else {
        aweme.desc.clone()
    };

    if let Some(post) = &aweme.image_post_info {
        let images: Vec<String> = post
            .images
            .iter()
            .filter_map(|entry| {
                let list = &entry.display_image.as_ref()?.url_list;
                // url_list[0] is a webp, url_list[1] a jpeg.
                list.get(1).or_else(|| list.first()).cloned()
            })
            .collect();

        return Ok(Metadata {
            id: id.to_string(),
            title,
            duration_secs: None,
            formats: Vec::new(),
            images,
        });
    }

    let Some(video) = &aweme.video else {
        return Err(FetchError::MalformedResponse {
            reason: "video or image_post_info is missing in the aweme object".to_string(),
        });
    };

    let mut formats = Vec::new();

    // The bit_rate ladder carries watermark-free play addresses.
    for entry in video.bit_rate.as_deref().unwrap_or_default() {
        if let Some(url) = entry
            .play_addr
            .as_ref()
            .and_then(|addr| addr.url_list.first())
        {
            formats.push(FormatCandidate {
                kind: StreamKind::Video,
                url: url.clone(),
                bitrate: entry.bit_rate,
                content_length: None,
            });
        }
    }

    // Ordered fallbacks when the ladder is empty or unusable.
    for addr in [&video.download_addr, &video.play_addr].into_iter().flatten() {
        if let Some(url) = addr.url_list.first() {
            formats.push(FormatCandidate {
                kind: StreamKind::Video,
                url: url.clone(),
                bitrate: None,
                content_length: None,
            });
        }
    }

    if formats.is_empty() {
        warn!(id, "aweme video object carries no usable address");
    }

    Ok(Metadata {
        id: id.to_string(),
        title,
        duration_secs: video.duration_ms.map(|ms| ms / 1000),
        formats,
        images: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Feed response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    aweme_list: Vec<Aweme>,
}

#[derive(Debug, Deserialize)]
struct Aweme {
    aweme_id: Option<IdValue>,
    #[serde(default)]
    desc: String,
    image_post_info: Option<ImagePostInfo>,
    video: Option<VideoStreams>,
}

/// Post IDs arrive as strings or numbers depending on endpoint version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(u64),
}

impl IdValue {
    fn as_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagePostInfo {
    #[serde(default)]
    images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    display_image: Option<AddrList>,
}

#[derive(Debug, Deserialize)]
struct AddrList {
    #[serde(default)]
    url_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoStreams {
    #[serde(rename = "duration")]
    duration_ms: Option<u64>,
    bit_rate: Option<Vec<BitRateEntry>>,
    download_addr: Option<AddrList>,
    play_addr: Option<AddrList>,
}

#[derive(Debug, Deserialize)]
struct BitRateEntry {
    bit_rate: Option<u64>,
    play_addr: Option<AddrList>,
}
