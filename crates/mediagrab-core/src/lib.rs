//! Mediagrab Core Library
//!
//! This crate provides the core functionality for the Mediagrab application:
//! - URL classification for TikTok, YouTube, Twitter/X and Instagram posts
//! - Canonical content-ID resolution through short links and redirects
//! - Metadata retrieval with a bounded retry policy
//! - Format selection under a size budget
//! - Concurrent stream download, ffmpeg muxing and temp-file hygiene
//! - Chunked, rate-paced delivery planning for image posts

pub mod chunk;
pub mod classify;
pub mod config;
pub mod download;
pub mod error;
pub mod instagram;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

pub use chunk::{ImageDelivery, plan_delivery};
pub use classify::{Classified, Platform, classify};
pub use config::AppConfig;
pub use download::{DownloadEngine, MediaArtifact};
pub use error::{
    DownloadError, Error, FetchError, FormatError, ResolveError, Result, ValidationError,
};
pub use media::{
    FormatCandidate, Metadata, Selection, SelectedFormat, SelectionMode, SizeBudget, StreamKind,
    select_format,
};
pub use pipeline::{Delivery, MediaRequest, Pipeline};
pub use retry::RetryPolicy;
