//! Integration tests for the asset system.
//!
//! These tests use tempfile to create isolated test environments and drive
//! the full load/reconcile cycle against real files.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use ember_assets::*;

/// A UTF-8 text asset that reads its file on every load.
struct TextFile;

impl AssetType for TextFile {
    type Payload = String;
    const NAME: &'static str = "text";

    fn create(&self) -> String {
        String::new()
    }

    fn load(&self, payload: &mut String, req: &LoadRequest<'_>) -> AssetResult<LoadOutcome> {
        let bytes = fs::read(req.path).map_err(|err| AssetError::Io {
            path: Path::new(req.path).to_path_buf(),
            source: err,
        })?;
        let text = String::from_utf8(bytes).map_err(|err| AssetError::LoadFailed {
            type_name: Self::NAME,
            path: req.path.to_string(),
            message: format!("Invalid UTF-8: {}", err),
        })?;
        if text == *payload {
            return Ok(LoadOutcome::Unchanged);
        }
        *payload = text;
        Ok(LoadOutcome::Loaded)
    }
}

fn setup() -> (TypeRegistry, TypeHandle) {
    let mut registry = TypeRegistry::new();
    let text = registry.register(TextFile);
    registry.finish_registration();
    (registry, text)
}

/// Reconcile every 20ms until `done` reports true or two seconds pass.
fn reconcile_until(
    bundle: &mut Bundle,
    registry: &TypeRegistry,
    mut done: impl FnMut(&Bundle) -> bool,
) -> bool {
    for _ in 0..100 {
        bundle.reconcile(registry);
        if done(bundle) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("greeting.txt");
    fs::write(&file, "hello").unwrap();
    let (registry, text) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let id = bundle
        .load(&registry, text, file.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    assert_eq!(bundle.get::<String>(id).unwrap(), "hello");
    assert!(!bundle.source_changed(id));
}

#[test]
fn test_missing_file_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("absent.txt");
    let (registry, text) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    assert!(
        bundle
            .load(&registry, text, file.to_str().unwrap(), None)
            .is_none()
    );
    bundle.end_load(&registry);
    assert!(bundle.is_empty());
}

#[test]
fn test_file_edit_triggers_whole_bundle_reload() {
    let dir = tempfile::tempdir().unwrap();
    let edited = dir.path().join("edited.txt");
    let untouched = dir.path().join("untouched.txt");
    fs::write(&edited, "v1").unwrap();
    fs::write(&untouched, "same").unwrap();
    let (registry, text) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let edited_id = bundle
        .load(&registry, text, edited.to_str().unwrap(), None)
        .unwrap();
    let untouched_id = bundle
        .load(&registry, text, untouched.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    fs::write(&edited, "v2").unwrap();
    let reloaded = reconcile_until(bundle, &registry, |bundle| {
        bundle.get::<String>(edited_id).is_some_and(|text| text == "v2")
            && !bundle.source_changed(edited_id)
    });
    assert!(reloaded, "reconcile never picked up the edit");

    // The sibling was reloaded too (whole-bundle pass) and survives.
    assert_eq!(bundle.get::<String>(untouched_id).unwrap(), "same");
    assert_eq!(bundle.len(), 2);
    assert!(!bundle.source_changed(edited_id));
}

#[test]
fn test_staleness_is_visible_before_reconcile_applies_it() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("shader.inc");
    fs::write(&file, "v1").unwrap();
    let (registry, text) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let id = bundle
        .load(&registry, text, file.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    fs::write(&file, "v2").unwrap();

    // The watch callback flips the staleness signal before any reconcile.
    let mut stale = false;
    for _ in 0..100 {
        if bundle.source_changed(id) {
            stale = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(stale, "source_changed never turned true");
    assert_eq!(bundle.get::<String>(id).unwrap(), "v1");

    let applied = reconcile_until(bundle, &registry, |bundle| !bundle.source_changed(id));
    assert!(applied);
    assert_eq!(bundle.get::<String>(id).unwrap(), "v2");
}

#[test]
fn test_failed_reload_keeps_asset_alive() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("volatile.txt");
    fs::write(&file, "v1").unwrap();
    let (registry, text) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let id = bundle
        .load(&registry, text, file.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    // Replace the file with undecodable bytes; the reload fails but the
    // asset must keep its last-good payload instead of being purged.
    fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();
    let mut stale = false;
    for _ in 0..100 {
        if bundle.source_changed(id) {
            stale = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(stale, "source_changed never turned true");

    // The failing pass completes once reconcile acknowledges the change.
    let swept = reconcile_until(bundle, &registry, |bundle| !bundle.source_changed(id));
    assert!(swept);
    assert_eq!(bundle.get::<String>(id).unwrap(), "v1");
    assert_eq!(bundle.ref_count(id), Some(1));
    assert_eq!(bundle.len(), 1);
}

#[test]
fn test_reregistered_type_serves_cached_assets() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.txt");
    fs::write(&file, "body").unwrap();
    let (mut registry, old_handle) = setup();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let id = bundle
        .load(&registry, old_handle, file.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    // Simulated code swap: the registration batch runs again.
    let new_handle = registry.register(TextFile);
    registry.finish_registration();
    bundle.reconcile(&registry);

    let bundle = Bundle::begin_load(&mut slot, &registry).unwrap();
    let via_old = bundle
        .load(&registry, old_handle, file.to_str().unwrap(), None)
        .unwrap();
    let via_new = bundle
        .load(&registry, new_handle, file.to_str().unwrap(), None)
        .unwrap();
    bundle.end_load(&registry);

    assert_eq!(via_old, id);
    assert_eq!(via_new, id);
    assert_eq!(bundle.len(), 1);

    // Edits are still picked up after the swap.
    fs::write(&file, "edited").unwrap();
    let reloaded = reconcile_until(bundle, &registry, |bundle| {
        bundle.get::<String>(id).is_some_and(|text| text == "edited")
    });
    assert!(reloaded);
}
