use beltane_types::{
    AnimationTransform, Cue, CueKind, CueList, FormationPattern, ParamValue, Position,
    PresetScope, ProtocolCue, Track, WireArg, WireMessage,
};

use super::*;

fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn sample_project() -> Project {
    let mut project = Project::new(500);
    let mut track = Track::new(1, "front left");
    track.current_position = Position::new(-2.0, 3.0, 0.0);
    project.tracks.add(track);
    project.tracks.add(Track::new(2, "front right"));

    let mut spec = AnimationSpec::new(7, "sweep", "circle")
        .with_param("radius", ParamValue::Float(4.0));
    spec.duration = 8.0;
    spec.loop_enabled = true;
    spec.tracks = vec![1, 2];
    spec.track_transforms.insert(2, TrackTransform::shifted(1.5));
    project.animations.push(spec);

    let mut list = CueList::new(1, "main");
    list.cues.push(Cue::new(
        10,
        "lights",
        CueKind::Protocol(ProtocolCue {
            messages: vec![WireMessage {
                address: "/track/1/color".to_string(),
                args: vec![WireArg::Text("#ff0000".to_string())],
            }],
        }),
    ));
    project.cue_lists.push(list);

    project
        .presets
        .capture(&project.tracks, &[1, 2], "open", PresetScope::Project, None)
        .unwrap();
    project
}

#[test]
fn save_and_load_round_trip() {
    let project = sample_project();
    let dir = temp_dir();
    let path = dir.path().join("show.json");
    save_project(&path, &project).expect("save_project");
    let loaded = load_project(&path, 500).expect("load_project");

    assert_eq!(loaded.tracks.len(), 2);
    assert_eq!(
        loaded.tracks.get(1).unwrap().initial_position,
        Some(Position::new(-2.0, 3.0, 0.0))
    );
    assert_eq!(loaded.animations.len(), 1);
    let spec = &loaded.animations[0];
    assert_eq!(spec.model_id, "circle");
    assert_eq!(spec.duration, 8.0);
    assert!(spec.loop_enabled);
    assert_eq!(spec.track_transform(2).time_shift, 1.5);
    assert_eq!(loaded.cue_lists.len(), 1);
    assert_eq!(loaded.cue_lists[0].cues[0].name, "lights");
    assert_eq!(loaded.presets.all().len(), 1);
    assert_eq!(loaded.presets.all()[0].positions[&1], Position::new(-2.0, 3.0, 0.0));
}

#[test]
fn global_presets_not_written_to_project() {
    let mut project = sample_project();
    project
        .presets
        .capture(&project.tracks, &[1], "studio", PresetScope::Global, None)
        .unwrap();
    let dir = temp_dir();
    let path = dir.path().join("show.json");
    save_project(&path, &project).expect("save_project");
    let loaded = load_project(&path, 500).expect("load_project");
    assert_eq!(loaded.presets.all().len(), 1);
    assert_eq!(loaded.presets.all()[0].name, "open");
}

#[test]
fn legacy_scattered_fields_migrate() {
    let json = serde_json::json!({
        "version": 1,
        "tracks": [
            { "id": 1, "name": "a", "color": null,
              "current_position": { "x": 0.0, "y": 0.0, "z": 0.0 },
              "initial_position": null },
            { "id": 2, "name": "b", "color": null,
              "current_position": { "x": 0.0, "y": 0.0, "z": 0.0 },
              "initial_position": null }
        ],
        "animations": [{
            "id": 3,
            "name": "old sweep",
            "model_id": "circle",
            "parameters": {},
            "duration": 6.0,
            "loop_enabled": true,
            "ping_pong": false,
            "tracks": [1, 2],
            "multiTrackMode": "formation",
            "customCenter": [1.0, 2.0, 0.0],
            "phaseOffsetSeconds": 0.5,
            "trackOffsets": { "1": [0.0, 1.0, 0.0], "2": [0.0, -1.0, 0.0] }
        }],
        "cue_lists": [],
        "presets": []
    });
    let dir = temp_dir();
    let path = dir.path().join("legacy.json");
    std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let loaded = load_project(&path, 500).expect("load_project");
    let spec = &loaded.animations[0];
    match spec.transform {
        AnimationTransform::Formation { anchor, pattern } => {
            assert_eq!(anchor, Position::new(1.0, 2.0, 0.0));
            assert_eq!(pattern, FormationPattern::Rigid);
        }
        other => panic!("expected formation transform, got {other:?}"),
    }
    // Incremental phase: track 1 starts at 0, track 2 half a second later.
    assert_eq!(spec.track_transform(1).time_shift, 0.0);
    assert_eq!(spec.track_transform(2).time_shift, 0.5);
    assert_eq!(spec.track_transform(1).offset, Position::new(0.0, 1.0, 0.0));
    assert_eq!(spec.track_transform(2).offset, Position::new(0.0, -1.0, 0.0));

    // Saving the migrated project must not re-emit the legacy fields.
    let out = dir.path().join("resaved.json");
    save_project(&out, &loaded).expect("save_project");
    let raw = std::fs::read_to_string(&out).unwrap();
    assert!(!raw.contains("multiTrackMode"));
    assert!(!raw.contains("phaseOffsetSeconds"));
    assert!(!raw.contains("customCenter"));
    assert!(!raw.contains("trackOffsets"));
}

#[test]
fn relative_mode_migrates_to_unit_variant() {
    let mut object = serde_json::json!({
        "id": 4, "name": "rel", "model_id": "oscillator",
        "parameters": {}, "duration": 4.0, "tracks": [1],
        "multiTrackMode": "relative"
    });
    let spec = decode_animation(object.take()).expect("decode");
    assert_eq!(spec.transform, AnimationTransform::Relative);
}
