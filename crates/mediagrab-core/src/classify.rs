//! URL classification and validation.
//!
//! Pure, synchronous step: raw text in, platform tag plus normalized URL
//! out. Nothing downstream ever sees an unvalidated URL.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::youtube;

/// Supported source platform of a post URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Short-form video and image slideshows (tiktok.com).
    TikTok,
    /// Long-form video host (youtube.com / youtu.be).
    YouTube,
    /// Microblog-hosted video (x.com / twitter.com).
    Twitter,
    /// Reels (instagram.com).
    Instagram,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TikTok => write!(f, "TikTok"),
            Self::YouTube => write!(f, "YouTube"),
            Self::Twitter => write!(f, "Twitter"),
            Self::Instagram => write!(f, "Instagram"),
        }
    }
}

/// A validated input: platform tag plus normalized URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Platform the URL belongs to.
    pub platform: Platform,
    /// Normalized URL, safe to hand to the platform's resolver.
    pub url: String,
}

/// Classify raw input text into a platform tag and normalized URL.
///
/// TikTok `vt.` short links are rewritten to the `vm.` variant: `vt.` links
/// are served to the Asia region and cannot be downloaded.
///
/// # Errors
///
/// Returns [`ValidationError::Unrecognized`] when the input matches no
/// supported platform, and [`ValidationError::InvalidShape`] when a
/// platform domain is present but the path shape is not downloadable.
pub fn classify(text: &str) -> Result<Classified, ValidationError> {
    let input = text.trim();

    if input.contains("tiktok.com") {
        return classify_tiktok(input);
    }

    if input.contains("youtube.com") || input.contains("youtu.be") {
        return classify_youtube(input);
    }

    if input.starts_with("https://x.com") || input.starts_with("https://twitter.com") {
        return Ok(Classified {
            platform: Platform::Twitter,
            url: input.to_string(),
        });
    }

    if input.contains("instagram.com") && input.starts_with("https://") {
        return Ok(Classified {
            platform: Platform::Instagram,
            url: input.to_string(),
        });
    }

    Err(ValidationError::Unrecognized)
}

fn classify_tiktok(input: &str) -> Result<Classified, ValidationError> {
    let recognized = ["https://vm.tiktok.com", "https://vt.tiktok.com", "https://www.tiktok.com"]
        .iter()
        .any(|prefix| input.starts_with(prefix));

    if !recognized {
        return Err(ValidationError::InvalidShape { platform: "TikTok" });
    }

    // vt. links are region-restricted; the vm. variant serves the same post.
    let url = input.replacen("https://vt.", "https://vm.", 1);

    Ok(Classified {
        platform: Platform::TikTok,
        url,
    })
}

fn classify_youtube(input: &str) -> Result<Classified, ValidationError> {
    if !input.starts_with("https://") && !input.starts_with("http://") {
        return Err(ValidationError::InvalidShape {
            platform: "YouTube",
        });
    }

    if youtube::extract_video_id(input).is_none() {
        return Err(ValidationError::InvalidShape {
            platform: "YouTube",
        });
    }

    Ok(Classified {
        platform: Platform::YouTube,
        url: input.to_string(),
    })
}
