//! Error types for Mediagrab core operations.
//!
//! Every pipeline stage has its own error enum; `Error` is the top-level
//! sum returned to the dispatch layer. Display strings are user-facing and
//! surfaced verbatim by the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Mediagrab core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input URL was malformed or not recognized as a supported platform.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A canonical content identifier could not be derived.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The upstream description endpoint failed or returned garbage.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// No downloadable format satisfied the mandatory constraints.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Downloading, muxing or size verification failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input URL validation failures. Never retried.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The input does not match any supported platform pattern.
    #[error("Please provide a valid TikTok, YouTube, Twitter or Instagram URL.")]
    Unrecognized,

    /// The input matched a platform domain but not a downloadable shape.
    #[error("Please provide a valid {platform} URL.")]
    InvalidShape {
        /// Platform whose pattern the input almost matched.
        platform: &'static str,
    },
}

/// Canonical-ID resolution failures. Never retried.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A mobile short link did not embed a canonical URL marker.
    #[error("Failed to fetch tiktok video, URL is not available.")]
    CanonicalMissing,

    /// A mobile short link could not be fetched at all.
    #[error("Failed to fetch tiktok url, error: {reason}")]
    ShortLinkFetch {
        /// Underlying transport failure.
        reason: String,
    },

    /// A share link did not resolve to a final location.
    #[error("Failed to resolve share link: {reason}")]
    RedirectFailed {
        /// Underlying transport failure.
        reason: String,
    },

    /// Neither a video nor an image-post marker was present in the path.
    #[error("Invalid TikTok URL")]
    MissingContentMarker,

    /// The identifier after the content marker was empty or malformed.
    #[error("Invalid content id in URL: {url}")]
    MalformedId {
        /// URL the identifier was extracted from.
        url: String,
    },
}

/// Metadata fetch failures. Retried by the surrounding policy, then surfaced.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream throttling detected through a response-body marker.
    #[error("Rate limit triggered. Please try again later.")]
    RateLimited,

    /// The response body could not be parsed into the expected shape.
    #[error("Failed to parse upstream response: {reason}")]
    MalformedResponse {
        /// Parse failure detail.
        reason: String,
    },

    /// The post does not exist, was deleted, or is not public.
    #[error("Video not found or deleted.")]
    NotFound,

    /// Upstream refused to serve the post (geo block, age gate, takedown).
    #[error("Video is not playable: {reason}")]
    Unplayable {
        /// Upstream-reported status reason.
        reason: String,
    },

    /// Transport-level request failure.
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Format selection failures. Never retried.
#[derive(Debug, Error)]
pub enum FormatError {
    /// No audio candidate exists; audio is mandatory for muxed delivery.
    #[error("No suitable format found.")]
    NoAudio,

    /// No video candidate exists at all.
    #[error("No suitable format found.")]
    NoVideo,
}

/// Download, mux and size-verification failures.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A download leg failed at the transport level.
    #[error("Failed to fetch media: {0}")]
    Request(#[from] reqwest::Error),

    /// A download leg received a non-success status.
    #[error("Failed to fetch media, error: {status} - {url}")]
    HttpStatus {
        /// HTTP status code returned by the media host.
        status: u16,
        /// Media URL that failed.
        url: String,
    },

    /// The external combiner exited unsuccessfully.
    #[error("Failed to mux audio and video: {reason}")]
    Mux {
        /// Exit status or stderr tail from the combiner.
        reason: String,
    },

    /// The final artifact exceeds the transport ceiling.
    #[error("The video is too large to send. Try specifying a smaller size.")]
    ArtifactTooLarge {
        /// Actual artifact size in bytes.
        size_bytes: u64,
        /// Transport ceiling in bytes.
        limit_bytes: u64,
    },

    /// Writing a temp file failed.
    #[error("Failed to write temp file at {path}: {reason}")]
    TempWrite {
        /// Path of the temp file.
        path: PathBuf,
        /// Underlying IO failure.
        reason: String,
    },
}
