//! Asset bundles: scoped caches with a mark-and-sweep load lifecycle.
//!
//! A bundle is loaded in passes. [`Bundle::begin_load`] resets the reference
//! count of every non-dynamic cached asset, each [`Bundle::load`] call marks
//! its asset live (and creates or refreshes it in place), and
//! [`Bundle::end_load`] purges whatever was not mentioned. Assets loaded
//! outside a pass are dynamic: the mark phase skips them and they are
//! collected as soon as their own reference count reaches zero.
//!
//! [`Bundle::reconcile`] drives live reload: once per frame it polls the
//! bundle's watch session and, when any source file changed, replays a full
//! pass over everything currently cached.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ember_core::alloc::HashMap;
use ember_core::alloc::sparse_set::{SlotId, SparseSet};
use ember_core::alloc::tracked::{AllocStats, StatsSnapshot};

use crate::error::{AssetError, AssetResult};
use crate::kind::{LoadOutcome, LoadRequest};
use crate::registry::{CanonicalTypeId, TypeHandle, TypeRegistry};
use crate::watch::{WatchHandle, WatchSession};

/// Cache key for one asset: canonical type identity plus the load path.
///
/// Equality is structural, so two different types can cache assets under the
/// same path without collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub type_id: CanonicalTypeId,
    pub path: Box<str>,
}

/// Handle to an asset cached in a [`Bundle`]. Stays valid until the asset is
/// purged; lookups through a stale handle return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(SlotId);

struct AssetEntry {
    key: AssetKey,
    ref_count: i32,
    dynamic: bool,
    /// Bumped by the watch session, possibly from the backend thread.
    source_version: Arc<AtomicU32>,
    /// Last source version applied into the payload by a load pass.
    loaded_version: u32,
    watch: Option<WatchHandle>,
    /// Boxed so the payload address survives in-place reloads.
    payload: Box<dyn Any + Send>,
}

/// A scoped cache of assets loaded together, with its own mark/sweep cycle
/// and file-watch session.
pub struct Bundle {
    assets: SparseSet<AssetEntry>,
    by_key: HashMap<AssetKey, SlotId>,
    loading: bool,
    code_version: u32,
    monitor: WatchSession,
    stats: Arc<AllocStats>,
}

impl Bundle {
    /// Open a load pass, creating the bundle behind `slot` on first use.
    ///
    /// The slot belongs to the host so the bundle survives code swaps of the
    /// part of the application that fills it.
    pub fn begin_load<'a>(
        slot: &'a mut Option<Bundle>,
        registry: &TypeRegistry,
    ) -> AssetResult<&'a mut Bundle> {
        if slot.is_none() {
            *slot = Some(Bundle {
                assets: SparseSet::new(),
                by_key: HashMap::new(),
                loading: false,
                code_version: registry.code_version(),
                monitor: WatchSession::new()?,
                stats: Arc::new(AllocStats::new()),
            });
        }
        let bundle = slot.as_mut().expect("bundle slot was just initialized");
        bundle.mark();
        Ok(bundle)
    }

    fn mark(&mut self) {
        for entry in self.assets.iter_mut() {
            // Anything not mentioned again before end_load is presumed dead.
            // TODO: this may not be correct without tracking asset dependency
            if !entry.dynamic {
                entry.ref_count = 0;
            }
        }
        self.loading = true;
    }

    /// Load or refresh the asset cached under `(ty, path)`.
    ///
    /// Returns `None` when the type handle does not translate or the type's
    /// load callback fails; either way the failure is logged and the cache
    /// stays consistent. A failed refresh keeps the previous payload.
    pub fn load(
        &mut self,
        registry: &TypeRegistry,
        ty: TypeHandle,
        path: &str,
        args: Option<&dyn Any>,
    ) -> Option<AssetId> {
        match self.load_inner(registry, ty, path, args) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::error!("{}", err);
                None
            }
        }
    }

    fn load_inner(
        &mut self,
        registry: &TypeRegistry,
        ty: TypeHandle,
        path: &str,
        args: Option<&dyn Any>,
    ) -> AssetResult<AssetId> {
        let type_id = registry
            .translate(ty)
            .ok_or(AssetError::UnregisteredType { handle: ty })?;
        self.load_canonical(registry, type_id, path, args)
    }

    fn load_canonical(
        &mut self,
        registry: &TypeRegistry,
        type_id: CanonicalTypeId,
        path: &str,
        args: Option<&dyn Any>,
    ) -> AssetResult<AssetId> {
        let table = registry.table(type_id);
        let key = AssetKey {
            type_id,
            path: Box::from(path),
        };
        let req = LoadRequest { path, args };

        if let Some(&slot) = self.by_key.get(&key) {
            let entry = self
                .assets
                .get_mut(slot)
                .expect("cache index out of sync");

            match table.load(entry.payload.as_mut(), &req) {
                Ok(LoadOutcome::Loaded) => {
                    tracing::info!("Loaded {}: {}", table.type_name(), path);
                }
                Ok(LoadOutcome::Unchanged) => {
                    tracing::info!("Reused cache for {}: {}", table.type_name(), path);
                }
                Err(err) => {
                    // Keep the last-good payload and reference count; a
                    // broken edit must not evict a working asset.
                    return Err(AssetError::LoadFailed {
                        type_name: table.type_name(),
                        path: path.to_string(),
                        message: err.to_string(),
                    });
                }
            }

            entry.ref_count += 1;
            if self.loading {
                // Acknowledged here rather than on every load so that, out
                // of a pass, dependents can still see the staleness window.
                entry.loaded_version = entry.source_version.load(Ordering::Acquire);
            }
            return Ok(AssetId(slot));
        }

        let source_version = Arc::new(AtomicU32::new(1));
        let watch = match self.monitor.watch(Path::new(path), &source_version) {
            Ok(watch) => {
                tracing::debug!("Watching {}", path);
                Some(watch)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                None
            }
        };

        let mut payload = table.create_payload();
        tracing::debug!("Created new {} for {}", table.type_name(), path);

        let outcome =
            table
                .load(payload.as_mut(), &req)
                .map_err(|err| AssetError::LoadFailed {
                    type_name: table.type_name(),
                    path: path.to_string(),
                    message: err.to_string(),
                })?;
        match outcome {
            LoadOutcome::Loaded => {
                tracing::info!("Loaded {}: {}", table.type_name(), path);
            }
            LoadOutcome::Unchanged => {
                tracing::info!("Reused cache for {}: {}", table.type_name(), path);
                tracing::warn!("New {} for {} reported unchanged", table.type_name(), path);
            }
        }

        let mut entry = AssetEntry {
            key: key.clone(),
            ref_count: 1,
            dynamic: !self.loading,
            source_version,
            loaded_version: 0,
            watch,
            payload,
        };
        if self.loading {
            entry.loaded_version = entry.source_version.load(Ordering::Acquire);
        }

        self.stats.add(table.payload_size() + key.path.len());
        let slot = self.assets.insert(entry);
        self.by_key.insert(key, slot);
        Ok(AssetId(slot))
    }

    /// Drop one reference to a cached asset.
    ///
    /// Outside a load pass, an asset reaching zero references is collected
    /// immediately; during a pass the count only feeds the sweep.
    pub fn unload(&mut self, registry: &TypeRegistry, id: AssetId) {
        let Some(entry) = self.assets.get_mut(id.0) else {
            return;
        };
        if entry.ref_count > 0 {
            entry.ref_count -= 1;
        }
        if !self.loading && entry.ref_count == 0 {
            tracing::info!(
                "Unloading {}: {}",
                registry.type_name(entry.key.type_id),
                entry.key.path
            );
            self.purge_slot(registry, id.0);
        }
    }

    /// Close a load pass and sweep: every asset left at zero references is
    /// unloaded and removed; survivors acknowledge their source version.
    pub fn end_load(&mut self, registry: &TypeRegistry) {
        self.loading = false;

        for index in 0..self.assets.capacity() {
            let Some(slot) = self.assets.slot_at(index) else {
                continue;
            };
            let Some(entry) = self.assets.get(slot) else {
                continue;
            };
            if entry.ref_count == 0 {
                tracing::info!(
                    "Purging {}: {}",
                    registry.type_name(entry.key.type_id),
                    entry.key.path
                );
                self.purge_slot(registry, slot);
            } else if let Some(entry) = self.assets.get_mut(slot) {
                entry.loaded_version = entry.source_version.load(Ordering::Acquire);
            }
        }
    }

    /// Per-frame driver: re-arm watches after a code swap and replay a full
    /// load pass when any watched source file changed.
    pub fn reconcile(&mut self, registry: &TypeRegistry) {
        if self.code_version != registry.code_version() {
            // The update-loop side of the session may have been swapped out
            // with the code; re-arm every registration.
            for entry in self.assets.iter_mut() {
                if let Some(watch) = entry.watch.as_mut() {
                    self.monitor.rebind(watch, &entry.source_version);
                }
            }
            self.code_version = registry.code_version();
        }

        if !self.monitor.poll_changed() {
            return;
        }

        // No dependency tracking, so reload everything currently cached.
        self.mark();
        let mut cached = Vec::with_capacity(self.assets.len());
        for index in 0..self.assets.capacity() {
            let Some(slot) = self.assets.slot_at(index) else {
                continue;
            };
            let Some(entry) = self.assets.get(slot) else {
                continue;
            };
            cached.push((slot, entry.key.type_id, entry.key.path.clone()));
        }
        for (slot, type_id, path) in cached {
            if let Err(err) = self.load_canonical(registry, type_id, &path, None) {
                tracing::error!("{}", err);
            }
            if let Some(entry) = self.assets.get_mut(slot)
                && entry.ref_count == 0
            {
                // A transient reload failure must not let the sweep purge an
                // asset the application still points at.
                entry.ref_count = 1;
            }
        }
        self.end_load(registry);
    }

    /// Whether the source file behind `id` changed after the last load pass
    /// that applied it. Lets dependent assets detect staleness without
    /// forcing a reload of their own.
    pub fn source_changed(&self, id: AssetId) -> bool {
        self.assets
            .get(id.0)
            .map(|entry| entry.loaded_version != entry.source_version.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Tear down the bundle, unloading every cached asset regardless of its
    /// reference count.
    ///
    /// Dropping a bundle without calling this releases memory but skips the
    /// unload callbacks.
    pub fn destroy(mut self, registry: &TypeRegistry) {
        for index in 0..self.assets.capacity() {
            let Some(slot) = self.assets.slot_at(index) else {
                continue;
            };
            self.purge_slot(registry, slot);
        }
    }

    fn purge_slot(&mut self, registry: &TypeRegistry, slot: SlotId) {
        let Some(mut entry) = self.assets.remove(slot) else {
            return;
        };
        let table = registry.table(entry.key.type_id);
        table.unload(entry.payload.as_mut());
        self.by_key.remove(&entry.key);
        self.stats.sub(table.payload_size() + entry.key.path.len());
    }

    /// Access a cached payload.
    pub fn get<T: 'static>(&self, id: AssetId) -> Option<&T> {
        self.assets.get(id.0)?.payload.downcast_ref::<T>()
    }

    /// Mutable access to a cached payload.
    pub fn get_mut<T: 'static>(&mut self, id: AssetId) -> Option<&mut T> {
        self.assets.get_mut(id.0)?.payload.downcast_mut::<T>()
    }

    /// The path an asset is cached under.
    pub fn path(&self, id: AssetId) -> Option<&str> {
        self.assets.get(id.0).map(|entry| &*entry.key.path)
    }

    /// Whether an asset is currently cached under `(ty, path)`.
    pub fn contains(&self, registry: &TypeRegistry, ty: TypeHandle, path: &str) -> bool {
        registry.translate(ty).is_some_and(|type_id| {
            self.by_key.contains_key(&AssetKey {
                type_id,
                path: Box::from(path),
            })
        })
    }

    pub fn ref_count(&self, id: AssetId) -> Option<i32> {
        self.assets.get(id.0).map(|entry| entry.ref_count)
    }

    /// Number of live cached assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Bytes currently attributed to this bundle's cache.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The allocation context itself, for hosts aggregating several
    /// subsystems into one report.
    pub fn stats_context(&self) -> Arc<AllocStats> {
        Arc::clone(&self.stats)
    }
}
