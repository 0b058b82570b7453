//! Download and mux engine.
//!
//! Selected streams are fetched into uniquely-named temp files (audio and
//! video legs run concurrently), combined with an external `ffmpeg` in
//! lossless stream-copy mode, and checked against the transport ceiling.
//! Every temp file is owned by a scope guard, so any failure branch leaves
//! the filesystem clean; the returned artifact carries an explicit
//! `cleanup()` the caller invokes once after consuming the stream.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{DownloadError, Error, FormatError, Result};
use crate::media::{SelectedFormat, TRANSPORT_CEILING_BYTES};

/// Per-process counter folded into temp names; together with the process
/// ID and a timestamp it keeps names collision-free across concurrent
/// requests.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A delivered media artifact backed by a temp file.
///
/// Call [`MediaArtifact::cleanup`] exactly once after fully consuming the
/// stream. If the artifact is dropped without cleanup (an error on the
/// consuming side), the backing files are still removed best-effort.
#[derive(Debug)]
pub struct MediaArtifact {
    title: String,
    final_path: PathBuf,
    guard: TempGuard,
}

impl MediaArtifact {
    /// Title of the post, suitable for naming the delivered file.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Path of the final artifact on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Open the final artifact for reading.
    pub async fn stream(&self) -> Result<File> {
        File::open(&self.final_path).await.map_err(Error::Io)
    }

    /// Delete the final artifact and, if created, both intermediate temp
    /// files.
    pub async fn cleanup(self) -> Result<()> {
        self.guard.cleanup().await
    }
}

/// Fetches selected streams and produces the final artifact.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: Client,
    temp_dir: PathBuf,
    ffmpeg_path: PathBuf,
    ceiling_bytes: u64,
}

impl DownloadEngine {
    /// Build an engine from the application configuration.
    #[must_use]
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            temp_dir: config.temp_dir.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            ceiling_bytes: TRANSPORT_CEILING_BYTES,
        }
    }

    /// Download the selected streams, mux when both legs are present, and
    /// verify the final size against the transport ceiling.
    ///
    /// Single-leg selections (audio-only requests, platforms serving
    /// combined streams) skip the mux step; the downloaded file is the
    /// final artifact directly.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when a leg fails, the combiner exits
    /// unsuccessfully, or the artifact exceeds the ceiling. Temp files
    /// created before the failure are removed before the error propagates.
    pub async fn fetch_and_mux(
        &self,
        selection: &SelectedFormat,
        id: &str,
        title: &str,
    ) -> Result<MediaArtifact> {
        let stem = unique_stem(id);
        let mut guard = TempGuard::default();

        let final_path = match (&selection.video, &selection.audio) {
            (Some(video), Some(audio)) => {
                let video_path = self.temp_dir.join(format!("{stem}.mp4"));
                let audio_path = self.temp_dir.join(format!("{stem}.m4a"));
                let final_path = self.temp_dir.join(format!("{stem}_result.mp4"));
                guard.track(video_path.clone());
                guard.track(audio_path.clone());

                // Both legs must succeed before muxing begins.
                tokio::try_join!(
                    self.download_to_file(&video.url, &video_path),
                    self.download_to_file(&audio.url, &audio_path),
                )?;

                guard.track(final_path.clone());
                self.mux(&video_path, &audio_path, &final_path).await?;
                final_path
            }
            (Some(single), None) => {
                let final_path = self.temp_dir.join(format!("{stem}.mp4"));
                guard.track(final_path.clone());
                self.download_to_file(&single.url, &final_path).await?;
                final_path
            }
            (None, Some(audio)) => {
                let final_path = self.temp_dir.join(format!("{stem}.m4a"));
                guard.track(final_path.clone());
                self.download_to_file(&audio.url, &final_path).await?;
                final_path
            }
            (None, None) => return Err(FormatError::NoVideo.into()),
        };

        self.verify_ceiling(&final_path).await?;

        debug!(path = %final_path.display(), "artifact ready");
        Ok(MediaArtifact {
            title: title.to_string(),
            final_path,
            guard,
        })
    }

    /// Stream one media URL into a temp file.
    async fn download_to_file(&self, url: &str, path: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DownloadError::Request)?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let mut file = File::create(path).await.map_err(|e| DownloadError::TempWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(DownloadError::Request)? {
            written += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::TempWrite {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        file.flush().await.map_err(|e| DownloadError::TempWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(url, bytes = written, path = %path.display(), "leg downloaded");
        Ok(())
    }

    /// Join the two legs into one container without re-encoding.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let result = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .arg("-c")
            .arg("copy")
            .arg(output)
            .output()
            .await
            .map_err(|e| DownloadError::Mux {
                reason: format!("failed to launch combiner: {e}"),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = stderr.lines().last().unwrap_or("no output").to_string();
            warn!(status = %result.status, %tail, "combiner failed");
            return Err(DownloadError::Mux {
                reason: format!("combiner exited with {}: {tail}", result.status),
            }
            .into());
        }

        Ok(())
    }

    /// Fail when the final artifact exceeds the transport ceiling.
    async fn verify_ceiling(&self, path: &Path) -> Result<()> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > self.ceiling_bytes {
            return Err(DownloadError::ArtifactTooLarge {
                size_bytes: size,
                limit_bytes: self.ceiling_bytes,
            }
            .into());
        }
        Ok(())
    }
}

/// Collision-free temp-file stem for one request.
fn unique_stem(id: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let safe_id: String = id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe_id}_{millis}_{}_{counter}", std::process::id())
}

/// Owns the temp files of one request and removes them on every exit path.
///
/// Explicit [`TempGuard::cleanup`] removes the files and disarms the
/// guard; dropping an armed guard removes them best-effort.
#[derive(Debug, Default)]
struct TempGuard {
    paths: Vec<PathBuf>,
    disarmed: bool,
}

impl TempGuard {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    async fn cleanup(mut self) -> Result<()> {
        self.disarmed = true;
        let mut first_err = None;
        for path in &self.paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove temp file");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), |e| Err(Error::Io(e)))
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %e, "failed to remove temp file on drop");
            }
        }
    }
}
