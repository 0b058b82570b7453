//! Shared media model and format selection.
//!
//! Upstream description endpoints are parsed into [`Metadata`] at the
//! network boundary; everything downstream of that parse works on typed
//! values only. [`select_format`] picks the streams to download for a given
//! size budget.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FormatError;

/// Absolute transport ceiling for a delivered artifact (50 MiB).
pub const TRANSPORT_CEILING_BYTES: u64 = 50 * 1024 * 1024;

/// Default size budget in MiB when the caller does not specify one.
pub const DEFAULT_BUDGET_MIB: u64 = 20;

/// Kind of a downloadable stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Audio-only stream.
    Audio,
    /// Video stream. May carry its own audio track when the platform only
    /// serves combined streams.
    Video,
}

/// One downloadable representation of a post's audio or video track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCandidate {
    /// Stream kind.
    pub kind: StreamKind,
    /// Direct fetch URL.
    pub url: String,
    /// Average bitrate in bits per second, when reported.
    pub bitrate: Option<u64>,
    /// Exact payload size in bytes, when reported.
    pub content_length: Option<u64>,
}

impl FormatCandidate {
    /// Estimate the payload size in bytes.
    ///
    /// A reported content length wins; otherwise the size is derived from
    /// bitrate × duration ⁄ 8. Returns `None` when neither is known.
    #[must_use]
    pub fn estimated_size_bytes(&self, duration_secs: Option<u64>) -> Option<u64> {
        if let Some(len) = self.content_length {
            return Some(len);
        }

        match (self.bitrate, duration_secs) {
            (Some(bitrate), Some(secs)) => Some(bitrate.saturating_mul(secs) / 8),
            _ => None,
        }
    }
}

/// Upstream-reported description of one post.
///
/// Fetched fresh per request and never cached across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Canonical content identifier the metadata was fetched for.
    pub id: String,
    /// Post title or caption; used to name the delivered artifact.
    pub title: String,
    /// Media duration in seconds, when applicable.
    pub duration_secs: Option<u64>,
    /// Downloadable stream candidates.
    pub formats: Vec<FormatCandidate>,
    /// Ordered image URLs when the post is a slideshow rather than a video.
    pub images: Vec<String>,
}

impl Metadata {
    /// Whether this post is an image slideshow rather than a single video.
    #[must_use]
    pub fn is_image_post(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Requested maximum artifact size, clamped to the transport ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget(u64);

impl SizeBudget {
    /// Build a budget from a caller-supplied MiB count, clamped to the
    /// absolute platform ceiling.
    #[must_use]
    pub fn from_mib(mib: u64) -> Self {
        Self((mib * 1024 * 1024).min(TRANSPORT_CEILING_BYTES))
    }

    /// Budget in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::from_mib(DEFAULT_BUDGET_MIB)
    }
}

/// How the selected streams will be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Separate audio and video streams, combined before delivery.
    /// Both legs are mandatory.
    Muxed,
    /// Audio track only; the video leg and the mux step are skipped.
    AudioOnly,
    /// One combined stream delivered as-is (platforms that never serve
    /// separate audio).
    SingleStream,
}

/// Streams chosen to satisfy the size budget.
///
/// When both legs are present they must be muxed before delivery; a single
/// present leg is delivered as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFormat {
    /// Video leg, absent in audio-only mode.
    pub video: Option<FormatCandidate>,
    /// Audio leg, absent for combined-stream platforms.
    pub audio: Option<FormatCandidate>,
}

/// Result of format selection: streams to download, or image URLs that
/// bypass downloading entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Streams to feed into the download engine.
    Streams(SelectedFormat),
    /// Ordered image URLs of a slideshow post.
    Images(Vec<String>),
}

/// Pick the streams to download for `metadata` under `budget`.
///
/// Image posts short-circuit to [`Selection::Images`]. Video selection
/// prefers the smallest bitrate that still fits strictly under the budget;
/// when nothing fits, the globally smallest-bitrate candidate is returned
/// and the caller implicitly accepts the oversize risk (the engine's final
/// ceiling check still applies). Audio selection always takes the highest
/// bitrate.
///
/// # Errors
///
/// Returns [`FormatError::NoAudio`] when a mode that needs audio has no
/// audio candidate, and [`FormatError::NoVideo`] when a video mode has no
/// video candidate at all.
pub fn select_format(
    metadata: &Metadata,
    budget: SizeBudget,
    mode: SelectionMode,
) -> Result<Selection, FormatError> {
    if metadata.is_image_post() {
        debug!(id = %metadata.id, count = metadata.images.len(), "image post, bypassing stream selection");
        return Ok(Selection::Images(metadata.images.clone()));
    }

    let audio_pick = best_audio(&metadata.formats);
    let video_pick = best_video(&metadata.formats, budget, metadata.duration_secs);

    match mode {
        SelectionMode::AudioOnly => {
            let audio = audio_pick.ok_or(FormatError::NoAudio)?;
            Ok(Selection::Streams(SelectedFormat {
                video: None,
                audio: Some(audio.clone()),
            }))
        }
        SelectionMode::Muxed => {
            let audio = audio_pick.ok_or(FormatError::NoAudio)?;
            let video = video_pick.ok_or(FormatError::NoVideo)?;
            Ok(Selection::Streams(SelectedFormat {
                video: Some(video.clone()),
                audio: Some(audio.clone()),
            }))
        }
        SelectionMode::SingleStream => {
            let video = video_pick.ok_or(FormatError::NoVideo)?;
            Ok(Selection::Streams(SelectedFormat {
                video: Some(video.clone()),
                audio: None,
            }))
        }
    }
}

/// Highest-bitrate audio candidate. Audio is small; quality wins over size.
fn best_audio(formats: &[FormatCandidate]) -> Option<&FormatCandidate> {
    formats
        .iter()
        .filter(|f| f.kind == StreamKind::Audio)
        .max_by_key(|f| f.bitrate.unwrap_or(0))
}

/// Smallest-bitrate video candidate strictly under the budget, falling back
/// to the smallest-bitrate candidate overall when nothing qualifies.
fn best_video(
    formats: &[FormatCandidate],
    budget: SizeBudget,
    duration_secs: Option<u64>,
) -> Option<&FormatCandidate> {
    let videos = || formats.iter().filter(|f| f.kind == StreamKind::Video);

    let qualifying = videos()
        .filter(|f| {
            f.estimated_size_bytes(duration_secs)
                .is_some_and(|size| size < budget.bytes())
        })
        .min_by_key(|f| f.bitrate.unwrap_or(u64::MAX));

    if let Some(pick) = qualifying {
        return Some(pick);
    }

    let fallback = videos().min_by_key(|f| f.bitrate.unwrap_or(u64::MAX));
    if let Some(pick) = fallback {
        debug!(url = %pick.url, "no candidate under budget, falling back to smallest bitrate");
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(url: &str, bitrate: Option<u64>, content_length: Option<u64>) -> FormatCandidate {
        FormatCandidate {
            kind: StreamKind::Video,
            url: url.to_string(),
            bitrate,
            content_length,
        }
    }

    fn audio(url: &str, bitrate: Option<u64>, content_length: Option<u64>) -> FormatCandidate {
        FormatCandidate {
            kind: StreamKind::Audio,
            url: url.to_string(),
            bitrate,
            content_length,
        }
    }

    fn meta(formats: Vec<FormatCandidate>, duration_secs: Option<u64>) -> Metadata {
        Metadata {
            id: "123".to_string(),
            title: "clip".to_string(),
            duration_secs,
            formats,
            images: Vec::new(),
        }
    }

    #[test]
    fn budget_clamped_to_ceiling() {
        assert_eq!(SizeBudget::from_mib(20).bytes(), 20 * 1024 * 1024);
        assert_eq!(SizeBudget::from_mib(500).bytes(), TRANSPORT_CEILING_BYTES);
    }

    #[test]
    fn estimate_prefers_content_length() {
        let f = video("v", Some(8_000_000), Some(1_000));
        assert_eq!(f.estimated_size_bytes(Some(60)), Some(1_000));
    }

    #[test]
    fn estimate_derives_from_bitrate_and_duration() {
        // 8 Mbit/s over 60 s = 60 MB.
        let f = video("v", Some(8_000_000), None);
        assert_eq!(f.estimated_size_bytes(Some(60)), Some(60_000_000));
        assert_eq!(f.estimated_size_bytes(None), None);
    }

    #[test]
    fn image_post_bypasses_stream_selection() {
        let m = Metadata {
            images: vec!["a.jpg".to_string(), "b.jpg".to_string()],
            ..meta(vec![], None)
        };
        let selection = select_format(&m, SizeBudget::default(), SelectionMode::SingleStream)
            .expect("image post selects");
        assert_eq!(
            selection,
            Selection::Images(vec!["a.jpg".to_string(), "b.jpg".to_string()])
        );
    }

    #[test]
    fn smallest_qualifying_video_wins() {
        let m = meta(
            vec![
                video("big", Some(4_000_000), Some(30 * 1024 * 1024)),
                video("small", Some(1_000_000), Some(8 * 1024 * 1024)),
                video("mid", Some(2_000_000), Some(15 * 1024 * 1024)),
                audio("a", Some(128_000), Some(1024)),
            ],
            Some(60),
        );
        let selection = select_format(&m, SizeBudget::from_mib(20), SelectionMode::Muxed)
            .expect("selection succeeds");
        let Selection::Streams(picked) = selection else {
            panic!("expected streams");
        };
        assert_eq!(picked.video.expect("video").url, "small");
    }

    #[test]
    fn never_picks_over_budget_when_a_candidate_fits() {
        let m = meta(
            vec![
                video("over", Some(500_000), Some(40 * 1024 * 1024)),
                video("fits", Some(3_000_000), Some(9 * 1024 * 1024)),
                audio("a", Some(128_000), Some(1024)),
            ],
            Some(60),
        );
        let budget = SizeBudget::from_mib(10);
        let Selection::Streams(picked) =
            select_format(&m, budget, SelectionMode::Muxed).expect("selection succeeds")
        else {
            panic!("expected streams");
        };
        let video = picked.video.expect("video");
        assert_eq!(video.url, "fits");
        assert!(video.estimated_size_bytes(m.duration_secs).expect("size") < budget.bytes());
    }

    #[test]
    fn falls_back_to_smallest_bitrate_when_nothing_fits() {
        let m = meta(
            vec![
                video("huge", Some(9_000_000), Some(45 * 1024 * 1024)),
                video("large", Some(6_000_000), Some(40 * 1024 * 1024)),
                audio("a", Some(128_000), Some(1024)),
            ],
            Some(60),
        );
        let Selection::Streams(picked) =
            select_format(&m, SizeBudget::from_mib(10), SelectionMode::Muxed)
                .expect("fallback still selects")
        else {
            panic!("expected streams");
        };
        assert_eq!(picked.video.expect("video").url, "large");
    }

    #[test]
    fn unknown_size_candidates_do_not_qualify() {
        // Without a content length or duration there is no size estimate,
        // so the budget filter rejects everything and the fallback applies.
        let m = meta(
            vec![
                video("ladder-low", Some(700_000), None),
                video("ladder-high", Some(2_500_000), None),
            ],
            None,
        );
        let Selection::Streams(picked) =
            select_format(&m, SizeBudget::from_mib(20), SelectionMode::SingleStream)
                .expect("fallback selects")
        else {
            panic!("expected streams");
        };
        assert_eq!(picked.video.expect("video").url, "ladder-low");
        assert!(picked.audio.is_none());
    }

    #[test]
    fn audio_picks_highest_bitrate() {
        let m = meta(
            vec![
                audio("low", Some(64_000), Some(500_000)),
                audio("high", Some(256_000), Some(2_000_000)),
                audio("mid", Some(128_000), Some(1_000_000)),
            ],
            Some(60),
        );
        let Selection::Streams(picked) =
            select_format(&m, SizeBudget::default(), SelectionMode::AudioOnly)
                .expect("selection succeeds")
        else {
            panic!("expected streams");
        };
        assert_eq!(picked.audio.expect("audio").url, "high");
        assert!(picked.video.is_none());
    }

    #[test]
    fn muxed_mode_requires_audio() {
        let m = meta(vec![video("v", Some(1_000_000), Some(1024))], Some(60));
        let err = select_format(&m, SizeBudget::default(), SelectionMode::Muxed)
            .expect_err("missing audio must fail");
        assert!(matches!(err, FormatError::NoAudio));
    }

    #[test]
    fn video_modes_require_a_video_candidate() {
        let m = meta(vec![audio("a", Some(128_000), Some(1024))], Some(60));
        let err = select_format(&m, SizeBudget::default(), SelectionMode::Muxed)
            .expect_err("missing video must fail");
        assert!(matches!(err, FormatError::NoVideo));

        let err = select_format(&m, SizeBudget::default(), SelectionMode::SingleStream)
            .expect_err("missing video must fail");
        assert!(matches!(err, FormatError::NoVideo));
    }

    #[test]
    fn single_stream_mode_does_not_require_audio() {
        let m = meta(vec![video("v", Some(900_000), None)], None);
        let Selection::Streams(picked) =
            select_format(&m, SizeBudget::default(), SelectionMode::SingleStream)
                .expect("selection succeeds")
        else {
            panic!("expected streams");
        };
        assert!(picked.audio.is_none());
        assert_eq!(picked.video.expect("video").url, "v");
    }
}
