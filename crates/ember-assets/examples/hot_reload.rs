//! Live-reload demo.
//!
//! Loads a text asset and then reconciles once per tick. Edit the printed
//! file while the demo runs to see whole-bundle reloads in action.

use std::fs;
use std::thread;
use std::time::Duration;

use ember_assets::{
    AssetError, AssetResult, AssetType, Bundle, LoadOutcome, LoadRequest, TypeRegistry,
};

struct TextFile;

impl AssetType for TextFile {
    type Payload = String;
    const NAME: &'static str = "text";

    fn create(&self) -> String {
        String::new()
    }

    fn load(&self, payload: &mut String, req: &LoadRequest<'_>) -> AssetResult<LoadOutcome> {
        let text = fs::read_to_string(req.path).map_err(AssetError::from)?;
        if text == *payload {
            return Ok(LoadOutcome::Unchanged);
        }
        *payload = text;
        Ok(LoadOutcome::Loaded)
    }
}

fn main() -> AssetResult<()> {
    ember_core::logging::init();

    let dir = std::env::temp_dir().join("ember-hot-reload-demo");
    fs::create_dir_all(&dir)?;
    let file = dir.join("demo.txt");
    if !file.exists() {
        fs::write(&file, "edit me\n")?;
    }
    let path = file.to_string_lossy();

    let mut registry = TypeRegistry::new();
    let text = registry.register(TextFile);
    registry.finish_registration();

    let mut slot = None;
    let bundle = Bundle::begin_load(&mut slot, &registry)?;
    let id = bundle
        .load(&registry, text, &path, None)
        .expect("demo file should load");
    bundle.end_load(&registry);

    println!("Watching {} - edit it to trigger reloads", file.display());
    let mut seen = bundle.get::<String>(id).cloned().unwrap_or_default();
    loop {
        bundle.reconcile(&registry);
        if let Some(contents) = bundle.get::<String>(id)
            && *contents != seen
        {
            println!("reloaded: {:?}", contents);
            seen = contents.clone();
        }
        thread::sleep(Duration::from_millis(100));
    }
}
