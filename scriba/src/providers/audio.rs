//! Audio preparation for transcription uploads.
//!
//! Video inputs are reduced to a mono 16 kHz WAV track with ffmpeg when it is
//! available, which shrinks uploads from GB to MB. Audio inputs pass through
//! untouched.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::Result;

/// Extensions sent to the provider as-is.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "opus", "wma"];

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Upload-ready source: either the original file or an extracted WAV whose
/// tempdir lives as long as this value.
pub struct PreparedSource {
    pub path: PathBuf,
    pub content_type: &'static str,
    _tempdir: Option<TempDir>,
}

/// True when the file extension marks a known audio container.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

async fn has_ffmpeg() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn notify(status: &mpsc::Sender<String>, message: impl Into<String>) {
    let _ = status.send(message.into()).await;
}

/// Extract a mono 16 kHz PCM WAV track, the provider's preferred input.
async fn extract_audio(source: &Path, out_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(source)
        .arg("-vn")
        .args(["-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"])
        .arg(out_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("; ");
        return Err(crate::Error::Other(format!(
            "ffmpeg audio extraction failed: {}",
            tail
        )));
    }
    Ok(())
}

/// Prepare one input for upload, reporting each step through `status`.
pub async fn prepare_source(
    source: &Path,
    status: &mpsc::Sender<String>,
) -> Result<PreparedSource> {
    let size_mb = tokio::fs::metadata(source).await?.len() as f64 / BYTES_PER_MB;

    if is_audio_file(source) {
        notify(status, format!("Sending audio file ({:.1} MB)...", size_mb)).await;
        return Ok(PreparedSource {
            content_type: content_type_for(source),
            path: source.to_path_buf(),
            _tempdir: None,
        });
    }

    if !has_ffmpeg().await {
        notify(
            status,
            format!(
                "ffmpeg not found, sending raw video ({:.0} MB). \
                 Install ffmpeg for faster uploads.",
                size_mb
            ),
        )
        .await;
        return Ok(PreparedSource {
            content_type: "application/octet-stream",
            path: source.to_path_buf(),
            _tempdir: None,
        });
    }

    notify(status, "Extracting audio track (ffmpeg)...").await;
    let tempdir = tempfile::Builder::new().prefix("scriba_audio_").tempdir()?;
    let wav_path = tempdir.path().join("audio.wav");
    extract_audio(source, &wav_path).await?;

    let extracted_mb = tokio::fs::metadata(&wav_path).await?.len() as f64 / BYTES_PER_MB;
    debug!(source = %source.display(), size_mb = extracted_mb, "audio track extracted");
    notify(status, format!("Audio extracted: {:.1} MB", extracted_mb)).await;

    Ok(PreparedSource {
        content_type: "audio/wav",
        path: wav_path,
        _tempdir: Some(tempdir),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extension_detection() {
        assert!(is_audio_file(Path::new("/media/a.mp3")));
        assert!(is_audio_file(Path::new("/media/a.FLAC")));
        assert!(!is_audio_file(Path::new("/media/a.mp4")));
        assert!(!is_audio_file(Path::new("/media/noext")));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a.wav")), "audio/wav");
        assert_eq!(content_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(
            content_type_for(Path::new("a.mkv")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_prepare_source_passes_audio_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        tokio::fs::write(&path, b"not really audio").await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let prepared = prepare_source(&path, &tx).await.unwrap();
        assert_eq!(prepared.path, path);
        assert_eq!(prepared.content_type, "audio/mpeg");

        let msg = rx.recv().await.unwrap();
        assert!(msg.starts_with("Sending audio file"));
    }

    #[tokio::test]
    async fn test_prepare_source_missing_file() {
        let (tx, _rx) = mpsc::channel(4);
        let err = prepare_source(Path::new("/nonexistent/clip.mp3"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
