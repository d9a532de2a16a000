use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Intrinsic properties of a video source, learned before the surface can be
/// sized.
#[derive(Clone, Copy, Debug)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
}

/// Playback state for a video or audio carrier. The host's media layer
/// drives actual output from these flags; the runtime only flips them.
#[derive(Debug, Clone)]
pub struct MediaState {
    pub playing: bool,
    pub looping: bool,
    pub muted: bool,
    /// Inline (non-fullscreen) playback, required for autoplay on mobile.
    pub inline: bool,
}

impl MediaState {
    /// Video defaults satisfy host autoplay policies: looped, muted, inline.
    pub fn video() -> Self {
        Self {
            playing: false,
            looping: true,
            muted: true,
            inline: true,
        }
    }

    pub fn audio() -> Self {
        Self {
            playing: false,
            looping: true,
            muted: false,
            inline: false,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }
}

pub type MediaHandle = Arc<Mutex<MediaState>>;

pub fn media_handle(state: MediaState) -> MediaHandle {
    Arc::new(Mutex::new(state))
}

// A poisoned handle only means some holder panicked mid-toggle; the flags
// stay usable.
pub(crate) fn lock_media(handle: &MediaHandle) -> std::sync::MutexGuard<'_, MediaState> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Supplies intrinsic video metadata. Implemented over ffprobe for real
/// hosts; tests substitute a fake.
pub trait MediaProbe: Send + Sync {
    fn probe_video(&self, path: &Path) -> Result<VideoInfo>;
}

/// `ffprobe`-backed probe reading stream metadata as JSON.
pub struct FfprobeMediaProbe;

impl MediaProbe for FfprobeMediaProbe {
    fn probe_video(&self, path: &Path) -> Result<VideoInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|err| Error::asset_load(format!("failed to run ffprobe: {err}")))?;
        if !out.status.success() {
            return Err(Error::asset_load(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|err| Error::asset_load(format!("ffprobe json parse failed: {err}")))?;
        let video_stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| {
                Error::asset_load(format!("no video stream in '{}'", path.display()))
            })?;
        let width = video_stream
            .width
            .ok_or_else(|| Error::asset_load("missing video width from ffprobe"))?;
        let height = video_stream
            .height
            .ok_or_else(|| Error::asset_load("missing video height from ffprobe"))?;
        let duration_sec = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(VideoInfo {
            width,
            height,
            duration_sec,
        })
    }
}
