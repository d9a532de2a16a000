mod common;

use std::time::Duration;

use arscene::{AnchorId, Engine, Error, Event};

use common::{animated_model_bytes, engine_with, png_bytes, pump_until_settled, scene_json, MapFetcher};

const SETTLE: Duration = Duration::from_secs(5);

fn two_scene_engine() -> (Engine, AnchorId, tempfile::TempDir) {
    let (fetcher, _) = MapFetcher::new(vec![
        ("a.png", png_bytes(4, 2)),
        ("b.png", png_bytes(2, 2)),
        ("m.gltf", animated_model_bytes()),
    ]);
    let (mut engine, dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![
                scene_json(
                    "S1",
                    serde_json::json!([
                        { "id": "a", "type": "Image", "src": "a.png", "scale": [1.0, 1.0] },
                        { "id": "m", "type": "3D Model", "src": "m.gltf", "scale": [1.0, 1.0, 1.0] }
                    ]),
                ),
                scene_json(
                    "S2",
                    serde_json::json!([
                        { "id": "b", "type": "Image", "src": "b.png", "scale": [1.0, 1.0] }
                    ]),
                ),
            ],
        )
        .unwrap();
    (engine, anchor, dir)
}

#[test]
fn attached_set_is_exactly_the_instantiated_scene() {
    let (mut engine, anchor, _dir) = two_scene_engine();

    engine.switch_scene(anchor, "S1").unwrap();
    let events = pump_until_settled(&mut engine, anchor, SETTLE);

    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S1"));
    let mut names: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.id.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "m"]);

    let root = engine.anchor_root(anchor).unwrap();
    assert_eq!(engine.graph().children(root).len(), 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SceneSettled { scene_id, .. } if scene_id == "S1")));

    // The model's embedded clip registered exactly one mixer.
    assert_eq!(engine.mixers().len(), 1);
}

#[test]
fn switching_replaces_the_previous_set_completely() {
    let (mut engine, anchor, _dir) = two_scene_engine();

    engine.switch_scene(anchor, "S1").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);
    let old_roots: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.root)
        .collect();

    engine.switch_scene(anchor, "S2").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);

    let names: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.id.clone())
        .collect();
    assert_eq!(names, vec!["b"]);

    let root = engine.anchor_root(anchor).unwrap();
    assert_eq!(engine.graph().children(root).len(), 1);
    for old in old_roots {
        assert!(!engine.graph().world.contains(old));
    }
    // The torn-down model's mixer was deregistered.
    assert_eq!(engine.mixers().len(), 0);
}

#[test]
fn same_scene_switch_is_a_no_op() {
    let (fetcher, calls) = MapFetcher::new(vec![("a.png", png_bytes(2, 2))]);
    let (mut engine, _dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![scene_json(
                "S1",
                serde_json::json!([{ "id": "a", "type": "Image", "src": "a.png" }]),
            )],
        )
        .unwrap();

    engine.switch_scene(anchor, "S1").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);
    let roots: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.root)
        .collect();
    let fetches = calls.load(std::sync::atomic::Ordering::SeqCst);

    engine.switch_scene(anchor, "S1").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);

    let roots_after: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.root)
        .collect();
    assert_eq!(roots, roots_after);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), fetches);
}

#[test]
fn interrupted_switch_discards_late_loads() {
    let (fetcher, _) = MapFetcher::new(vec![
        ("slow.png", png_bytes(8, 8)),
        ("fast.png", png_bytes(2, 2)),
    ]);
    let fetcher = fetcher.delay("slow.png", Duration::from_millis(150));
    let (mut engine, _dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![
                scene_json(
                    "S1",
                    serde_json::json!([{ "id": "slow", "type": "Image", "src": "slow.png" }]),
                ),
                scene_json(
                    "S2",
                    serde_json::json!([{ "id": "fast", "type": "Image", "src": "fast.png" }]),
                ),
            ],
        )
        .unwrap();

    engine.switch_scene(anchor, "S1").unwrap();
    // Supersede the first switch before its asset can finish loading.
    engine.switch_scene(anchor, "S2").unwrap();
    let events = pump_until_settled(&mut engine, anchor, SETTLE);

    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SceneSettled { scene_id, .. } if scene_id == "S2")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::SceneSettled { scene_id, .. } if scene_id == "S1")));

    // Let the superseded load arrive, then confirm it was discarded.
    std::thread::sleep(Duration::from_millis(200));
    engine.update(0.0);

    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S2"));
    let names: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.id.clone())
        .collect();
    assert_eq!(names, vec!["fast"]);
    let root = engine.anchor_root(anchor).unwrap();
    assert_eq!(engine.graph().children(root).len(), 1);
}

#[test]
fn unknown_kind_is_skipped_without_failing_the_switch() {
    let (fetcher, _) = MapFetcher::new(vec![("a.png", png_bytes(2, 2))]);
    let (mut engine, _dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![scene_json(
                "S1",
                serde_json::json!([
                    { "id": "a", "type": "Image", "src": "a.png" },
                    { "id": "x", "type": "Hologram", "src": "x.bin" }
                ]),
            )],
        )
        .unwrap();

    engine.switch_scene(anchor, "S1").unwrap();
    let events = pump_until_settled(&mut engine, anchor, SETTLE);

    let names: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.id.clone())
        .collect();
    assert_eq!(names, vec!["a"]);
    assert!(!events.iter().any(|e| matches!(e, Event::AssetFailed { .. })));
}

#[test]
fn failed_asset_is_isolated_from_its_siblings() {
    let (fetcher, _) = MapFetcher::new(vec![("a.png", png_bytes(2, 2))]);
    let (mut engine, _dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![scene_json(
                "S1",
                serde_json::json!([
                    { "id": "a", "type": "Image", "src": "a.png" },
                    { "id": "gone", "type": "Image", "src": "gone.png" }
                ]),
            )],
        )
        .unwrap();

    engine.switch_scene(anchor, "S1").unwrap();
    let events = pump_until_settled(&mut engine, anchor, SETTLE);

    let names: Vec<_> = engine
        .live_assets(anchor)
        .unwrap()
        .iter()
        .map(|live| live.id.clone())
        .collect();
    assert_eq!(names, vec!["a"]);
    assert!(events.iter().any(
        |e| matches!(e, Event::AssetFailed { asset_id, .. } if asset_id == "gone")
    ));
    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S1"));
}

#[test]
fn missing_scene_aborts_the_switch_and_leaves_the_anchor_empty() {
    let (mut engine, anchor, _dir) = two_scene_engine();

    engine.switch_scene(anchor, "S1").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);

    let err = engine.switch_scene(anchor, "S9").unwrap_err();
    assert!(matches!(err, Error::SceneNotFound(_)));

    // The old set was already torn down; the switch is abandoned, not
    // retried, so the anchor ends up empty.
    assert_eq!(engine.current_scene(anchor).unwrap(), None);
    assert!(engine.live_assets(anchor).unwrap().is_empty());
    let root = engine.anchor_root(anchor).unwrap();
    assert!(engine.graph().children(root).is_empty());
}

#[test]
fn found_and_lost_toggle_media_without_switching() {
    let (fetcher, _) = MapFetcher::new(vec![("clip.mp4", b"videobytes".to_vec())]);
    let (mut engine, _dir) = engine_with(fetcher);
    let anchor = engine.add_anchor();
    engine
        .set_scenes(
            anchor,
            vec![scene_json(
                "S1",
                serde_json::json!([
                    { "id": "v", "type": "Video", "src": "clip.mp4", "scale": [2.0, 1.0] }
                ]),
            )],
        )
        .unwrap();

    engine.switch_scene(anchor, "S1").unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);

    let handle = engine.live_assets(anchor).unwrap()[0]
        .video
        .clone()
        .expect("video handle");
    // Playback begins on attach.
    assert!(handle.lock().unwrap().playing);

    engine.target_lost(anchor).unwrap();
    assert!(!handle.lock().unwrap().playing);
    engine.target_found(anchor).unwrap();
    assert!(handle.lock().unwrap().playing);
    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S1"));
}

#[test]
fn scene_navigation_cycles_through_the_list() {
    let (mut engine, anchor, _dir) = two_scene_engine();

    engine.next_scene(anchor).unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);
    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S1"));

    engine.next_scene(anchor).unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);
    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S2"));

    engine.next_scene(anchor).unwrap();
    pump_until_settled(&mut engine, anchor, SETTLE);
    assert_eq!(engine.current_scene(anchor).unwrap().as_deref(), Some("S1"));
}
