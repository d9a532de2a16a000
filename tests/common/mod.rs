#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arscene::cache::{BlobStore, ContentCache, Fetcher};
use arscene::error::{Error, Result};
use arscene::pipeline::{MediaProbe, VideoInfo};
use arscene::{AnchorId, Engine, Event};

/// Serves a fixed url-to-bytes map, counting fetches and optionally slowing
/// selected urls down to make load interleavings observable.
pub struct MapFetcher {
    entries: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    calls: Arc<AtomicUsize>,
}

impl MapFetcher {
    pub fn new(entries: Vec<(&str, Vec<u8>)>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            delays: HashMap::new(),
            calls: calls.clone(),
        };
        (fetcher, calls)
    }

    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(delay) = self.delays.get(url) {
            std::thread::sleep(*delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(format!("no entry for '{url}'")))
    }
}

pub struct FakeProbe {
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            duration_sec: 12.0,
        }
    }
}

impl MediaProbe for FakeProbe {
    fn probe_video(&self, _path: &std::path::Path) -> Result<VideoInfo> {
        Ok(VideoInfo {
            width: self.width,
            height: self.height,
            duration_sec: self.duration_sec,
        })
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Minimal glTF with one node and one embedded 10-second translation clip,
/// buffers inlined as a data URI.
pub fn animated_model_bytes() -> Vec<u8> {
    use base64::Engine as _;

    let mut data = Vec::new();
    for t in [0.0f32, 10.0] {
        data.extend_from_slice(&t.to_le_bytes());
    }
    for v in [[0.0f32, 0.0, 0.0], [0.0, 0.0, 5.0]] {
        for c in v {
            data.extend_from_slice(&c.to_le_bytes());
        }
    }
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&data)
    );

    let doc = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "rotor" }],
        "buffers": [{ "byteLength": data.len(), "uri": uri }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [10.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "animations": [{
            "name": "spin",
            "samplers": [{ "input": 0, "output": 1, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }]
        }]
    });
    serde_json::to_vec(&doc).unwrap()
}

/// Engine over a temp-dir store, a [`MapFetcher`] and a [`FakeProbe`].
/// The temp dir rides along so the store outlives the test body.
pub fn engine_with(
    fetcher: MapFetcher,
) -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path().join("store")).unwrap();
    let cache = Arc::new(ContentCache::new(store, Box::new(fetcher)));
    let engine = Engine::with_probe(cache, Arc::new(FakeProbe::default()));
    (engine, dir)
}

/// Drive `update` until the anchor's switch settles, collecting events.
pub fn pump_until_settled(engine: &mut Engine, anchor: AnchorId, timeout: Duration) -> Vec<Event> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        events.extend(engine.update(0.0));
        if engine.is_settled(anchor).unwrap() {
            return events;
        }
        assert!(
            Instant::now() < deadline,
            "scene switch did not settle within {timeout:?}"
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn scene_json(scene_id: &str, assets: serde_json::Value) -> arscene::SceneDescriptor {
    serde_json::from_value(serde_json::json!({
        "scene_id": scene_id,
        "assets": assets
    }))
    .unwrap()
}
