//! Live-reloadable asset management for the Ember engine.
//!
//! Resources (sprites, fonts, shader blobs, ...) are cached in [`Bundle`]s
//! keyed by (type, path) and reference-counted with a mark-and-sweep load
//! pass. A [`TypeRegistry`] gives every resource kind a canonical identity
//! that survives code hot-swaps, and a per-bundle watch session turns file
//! edits into whole-bundle reloads driven by [`Bundle::reconcile`].
//!
//! ```ignore
//! let mut registry = TypeRegistry::new();
//! let sprite = registry.register(SpriteType);
//! registry.finish_registration();
//!
//! let mut slot = None;
//! let bundle = Bundle::begin_load(&mut slot, &registry)?;
//! let hero = bundle.load(&registry, sprite, "sprites/hero.png", None);
//! bundle.end_load(&registry);
//!
//! // once per frame:
//! bundle.reconcile(&registry);
//! ```

pub mod bundle;
pub mod error;
pub mod kind;
pub mod registry;
pub mod watch;

pub use bundle::{AssetId, AssetKey, Bundle};
pub use error::{AssetError, AssetResult};
pub use kind::{AssetType, LoadOutcome, LoadRequest};
pub use registry::{CanonicalTypeId, TypeHandle, TypeRegistry};
pub use watch::{WatchHandle, WatchSession};
