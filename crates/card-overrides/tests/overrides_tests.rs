//! End-to-end override tests with YAML specs and a JSON Schema validator

use card_core::{ConditionStatePatch, EntitySnapshot};
use card_overrides::{JsonSchemaValidator, OverrideSpec, OverridesManager};
use card_state::ConditionStateManager;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn validator() -> Arc<JsonSchemaValidator> {
    let schema = json!({
        "type": "object",
        "required": ["cameras"],
        "properties": {
            "cameras": {"type": "array", "minItems": 1},
            "menu": {
                "type": "object",
                "properties": {
                    "style": {"enum": ["none", "hidden", "overlay", "outside"]}
                }
            }
        }
    });
    Arc::new(JsonSchemaValidator::new(&schema).unwrap())
}

fn specs(yaml: &str) -> Vec<OverrideSpec> {
    serde_yaml::from_str(yaml).unwrap()
}

fn base() -> Arc<Value> {
    Arc::new(json!({
        "cameras": [
            {"camera_entity": "camera.front"},
            {"camera_entity": "camera.back"},
            {"camera_entity": "camera.garage"}
        ],
        "menu": {"style": "none"},
        "live": {"controls": {"thumbnails": {"mode": "right"}}}
    }))
}

#[test]
fn test_fullscreen_hides_menu() {
    let state_manager = Arc::new(ConditionStateManager::new());
    let changes = Arc::new(AtomicUsize::new(0));
    let changes_clone = changes.clone();
    let manager = OverridesManager::new(
        validator(),
        Some(Arc::new(move || {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        })),
    );

    manager.set(
        Some(state_manager.clone()),
        specs(
            r#"
- conditions:
    - condition: fullscreen
      fullscreen: true
  set:
    menu.style: hidden
"#,
        ),
    );

    let base = base();
    assert!(Arc::ptr_eq(&base, &manager.get_config(&base).unwrap()));

    state_manager.set_state(ConditionStatePatch::new().fullscreen(true));
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    let config = manager.get_config(&base).unwrap();
    assert_eq!(config["menu"]["style"], json!("hidden"));
    assert_eq!(base["menu"]["style"], json!("none"));

    state_manager.set_state(ConditionStatePatch::new().fullscreen(false));
    assert_eq!(changes.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&base, &manager.get_config(&base).unwrap()));
}

#[test]
fn test_delete_camera_by_index() {
    let state_manager = Arc::new(ConditionStateManager::new());
    let manager = OverridesManager::new(validator(), None);
    manager.set(
        Some(state_manager.clone()),
        specs(
            r#"
- conditions:
    - condition: state
      entity: binary_sensor.garage_open
      state: "off"
  delete:
    - cameras[2]
    - cameras.0
"#,
        ),
    );

    state_manager.set_state(ConditionStatePatch::new().entities(
        EntitySnapshot::new().with_state("binary_sensor.garage_open", "off"),
    ));

    let config = manager.get_config(&base()).unwrap();
    assert_eq!(
        config["cameras"],
        json!([{"camera_entity": "camera.back"}])
    );
}

#[test]
fn test_merge_and_set_across_specs() {
    let manager = OverridesManager::new(validator(), None);
    manager.set(
        None,
        specs(
            r#"
- conditions: []
  merge:
    live.controls:
      thumbnails:
        size: 100
      title:
        mode: popup
- conditions: []
  set:
    live.controls.thumbnails.mode: left
"#,
        ),
    );

    let config = manager.get_config(&base()).unwrap();
    assert_eq!(
        config["live"]["controls"],
        json!({
            "thumbnails": {"mode": "left", "size": 100},
            "title": {"mode": "popup"}
        })
    );
}

#[test]
fn test_invalid_override_is_an_error() {
    let manager = OverridesManager::new(validator(), None);
    manager.set(
        None,
        specs(
            r#"
- conditions: []
  delete:
    - cameras.0
    - cameras.1
    - cameras.2
"#,
        ),
    );

    let err = manager.get_config(&base()).unwrap_err();
    assert!(err.errors.iter().any(|issue| issue.path == "/cameras"));
    assert_eq!(err.config["cameras"], json!([]));
    assert!(err.to_string().starts_with("invalid override configuration"));
}

#[test]
fn test_unreachable_array_index_is_skipped() {
    let manager = OverridesManager::new(validator(), None);
    manager.set(
        None,
        vec![OverrideSpec::new(vec![])
            .with_set("cameras.18446744073709551615", json!({"camera_entity": "camera.x"}))
            .with_set("cameras.10000000000", json!({"camera_entity": "camera.y"}))
            .with_set("menu.style", json!("hidden"))],
    );

    let config = manager.get_config(&base()).unwrap();
    assert_eq!(config["cameras"], base()["cameras"]);
    assert_eq!(config["menu"]["style"], "hidden");
}
