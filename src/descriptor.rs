//! Declarative experience configuration: tracks, scenes and asset
//! descriptors. All of it is created at configuration-load time and read-only
//! to the runtime.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Asset categories the instantiation pipeline understands. Anything else
/// parses into `Other` and instantiates to nothing (logged, non-fatal), so a
/// configuration authored against a newer toolchain degrades instead of
/// failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Video,
    Model3D,
    Audio,
    Other,
}

impl<'de> Deserialize<'de> for AssetKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "Image" => Self::Image,
            "Video" => Self::Video,
            // "3D Model" is the configuration tool's wire spelling.
            "3D Model" | "Model3D" => Self::Model3D,
            "Audio" => Self::Audio,
            _ => Self::Other,
        })
    }
}

/// One renderable asset inside a scene.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDescriptor {
    /// Unique within a scene; becomes the object's lookup name.
    #[serde(alias = "asset_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Content URL; also the cache key.
    pub src: String,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler XYZ, radians.
    #[serde(default)]
    pub rotation: [f32; 3],
    /// Width reference for planar kinds (only `scale[0]` is honored, the
    /// height follows the source aspect); full per-axis scale for models.
    #[serde(default = "default_scale", deserialize_with = "deserialize_scale")]
    pub scale: [f32; 3],
    /// Planar kinds only.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Gates autoplay of a model's first embedded clip.
    #[serde(default = "default_true")]
    pub autoplay: bool,
    /// Presence makes the instantiated object clickable.
    #[serde(default)]
    pub action: Option<InteractionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionSpec {
    #[serde(default)]
    pub click: Option<ClickSpec>,
}

/// Click action configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickSpec {
    #[serde(default)]
    pub asset_animation: bool,
    #[serde(default)]
    pub start_time: Option<f32>,
    #[serde(default)]
    pub end_time: Option<f32>,
    #[serde(rename = "loop", default = "default_true")]
    pub looping: bool,
    /// Action discriminator; `"slot_game"` routes to the slot variant.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Reward tier to playback window, for the slot variant.
    #[serde(default)]
    pub animation_map: Option<HashMap<String, TierWindow>>,
    #[serde(default)]
    pub loop_sound: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TierWindow {
    pub start_time: f32,
    pub end_time: f32,
}

impl ClickSpec {
    /// True when an explicit playback window is configured.
    pub fn has_timing(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    pub fn validate(&self, asset_id: &str) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(Error::config(format!(
                    "asset '{asset_id}': start_time {start} exceeds end_time {end}"
                )));
            }
        }
        if let Some(map) = &self.animation_map {
            for (tier, window) in map {
                if window.start_time > window.end_time {
                    return Err(Error::config(format!(
                        "asset '{asset_id}': tier '{tier}' start_time exceeds end_time"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl AssetDescriptor {
    pub fn validate(&self) -> Result<()> {
        if let Some(click) = self.action.as_ref().and_then(|a| a.click.as_ref()) {
            click.validate(&self.id)?;
        }
        Ok(())
    }
}

/// A named set of assets, attached to one anchor at a time.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescriptor {
    pub scene_id: String,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub track_id: String,
    #[serde(default)]
    pub scenes: Vec<SceneDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetDatabase {
    /// Compiled image-target database consumed by the tracking collaborator;
    /// cached like any other asset.
    pub mind_src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingMode {
    #[serde(rename = "mindFile")]
    pub mind_file: TargetDatabase,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
    /// Mode-specific settings (navigation buttons, overlays); consumed by the
    /// host, scanned here only for preloadable URLs.
    #[serde(default)]
    pub setting: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingModes {
    #[serde(default)]
    pub image: Option<TrackingMode>,
    #[serde(default)]
    pub slot: Option<TrackingMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperienceInfo {
    pub tracking_modes: TrackingModes,
}

/// Top-level experience configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperienceConfig {
    pub info: ExperienceInfo,
}

impl ExperienceConfig {
    pub fn from_json(raw: &serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(raw.clone())
            .map_err(|err| Error::config(format!("invalid experience config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file, returning the typed config alongside
    /// the raw JSON (the raw value feeds the preload URL scan).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<(Self, serde_json::Value)> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| Error::config(format!("failed to read {:?}: {err}", path)))?;
        let raw: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|err| Error::config(format!("failed to parse {:?}: {err}", path)))?;
        let config = Self::from_json(&raw)?;
        log::info!("loaded experience config from {:?}", path);
        Ok((config, raw))
    }

    fn validate(&self) -> Result<()> {
        for mode in [&self.info.tracking_modes.image, &self.info.tracking_modes.slot]
            .into_iter()
            .flatten()
        {
            for track in &mode.tracks {
                for scene in &track.scenes {
                    for asset in &scene.assets {
                        asset.validate()?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// JSON keys whose string values are asset URLs.
const URL_KEYS: [&str; 8] = [
    "src",
    "asset_image",
    "mind_src",
    "background",
    "icon",
    "src_left",
    "src_right",
    "loop_sound",
];

/// Walk a raw configuration value and collect every unique asset URL in it,
/// in first-seen order. Used to warm the content cache before the experience
/// starts.
pub fn scan_asset_urls(raw: &serde_json::Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    scan_value(raw, &mut seen, &mut urls);
    log::info!("[scan] found {} unique assets in config", urls.len());
    urls
}

fn scan_value(value: &serde_json::Value, seen: &mut HashSet<String>, urls: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                match child {
                    serde_json::Value::String(s)
                        if URL_KEYS.contains(&key.as_str()) && !s.trim().is_empty() =>
                    {
                        if seen.insert(s.clone()) {
                            urls.push(s.clone());
                        }
                    }
                    // Image-target variants keyed by tier (T1, T2, ...).
                    serde_json::Value::Object(variants) if key == "mind_image" => {
                        for variant in variants.values() {
                            if let serde_json::Value::String(s) = variant {
                                if !s.trim().is_empty() && seen.insert(s.clone()) {
                                    urls.push(s.clone());
                                }
                            }
                        }
                    }
                    _ => scan_value(child, seen, urls),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                scan_value(item, seen, urls);
            }
        }
        _ => {}
    }
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_opacity() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

// Accept both the planar two-component form and the full three-component one.
fn deserialize_scale<'de, D>(deserializer: D) -> std::result::Result<[f32; 3], D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Vec::<f32>::deserialize(deserializer)?;
    match values.as_slice() {
        [x, y] => Ok([*x, *y, 1.0]),
        [x, y, z] => Ok([*x, *y, *z]),
        other => Err(serde::de::Error::custom(format!(
            "scale must have 2 or 3 components, got {}",
            other.len()
        ))),
    }
}
