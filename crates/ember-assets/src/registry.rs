//! The process-lifetime type registry.
//!
//! Code hot-swaps re-run every type registration, and each run may hand the
//! registry different callback code for the same type name. The registry
//! pins one canonical record per name for the life of the process and keeps
//! a translation map from every handle it ever minted to that record, so
//! asset keys formed before a swap keep resolving after it.
//!
//! The registry itself must live outside the swappable part of the
//! application (owned by the host, passed by reference into every bundle
//! entry point) or the indirection protects nothing.

use std::sync::Arc;

use ember_core::alloc::HashMap;

use crate::kind::{AssetType, ErasedAssetType};

/// Stable identity of a registered asset type. Never reused, never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalTypeId(u32);

impl CanonicalTypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Transient handle minted by a single registration call.
///
/// A fresh registration pass mints fresh handles for the same names; both
/// old and new handles translate to the same [`CanonicalTypeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(u32);

#[cfg(test)]
impl TypeHandle {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

struct CanonicalType {
    name: &'static str,
    table: Arc<dyn ErasedAssetType>,
    latest: TypeHandle,
}

/// Registry of asset types with hot-swap identity translation.
pub struct TypeRegistry {
    canonical: Vec<CanonicalType>,
    by_name: HashMap<&'static str, CanonicalTypeId>,
    translation: HashMap<TypeHandle, CanonicalTypeId>,
    next_handle: u32,
    code_version: u32,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            canonical: Vec::new(),
            by_name: HashMap::new(),
            translation: HashMap::new(),
            next_handle: 0,
            code_version: 0,
        }
    }

    /// Register an asset type, or refresh its capability table if the name
    /// is already known.
    ///
    /// The canonical record for a name is created once and then only updated
    /// in place, so cached assets keyed by it survive re-registration and
    /// immediately use the refreshed callbacks.
    pub fn register<T: AssetType>(&mut self, ty: T) -> TypeHandle {
        let handle = TypeHandle(self.next_handle);
        self.next_handle += 1;

        let table: Arc<dyn ErasedAssetType> = Arc::new(ty);
        let id = match self.by_name.get(T::NAME) {
            Some(&id) => {
                let record = &mut self.canonical[id.index()];
                record.table = table;
                record.latest = handle;
                tracing::debug!("Updated asset type: {}", T::NAME);
                id
            }
            None => {
                let id = CanonicalTypeId(self.canonical.len() as u32);
                self.canonical.push(CanonicalType {
                    name: T::NAME,
                    table,
                    latest: handle,
                });
                self.by_name.insert(T::NAME, id);
                tracing::debug!("Registered asset type: {}", T::NAME);
                id
            }
        };

        self.translation.insert(handle, id);
        handle
    }

    /// Mark the end of a registration batch. Call once after startup
    /// registration and once after each code swap's re-registration.
    pub fn finish_registration(&mut self) {
        self.code_version += 1;
    }

    /// Resolve a possibly-stale handle to its canonical identity.
    pub fn translate(&self, handle: TypeHandle) -> Option<CanonicalTypeId> {
        self.translation.get(&handle).copied()
    }

    /// Latest-generation handle for a registered type name.
    pub fn find(&self, name: &str) -> Option<TypeHandle> {
        self.by_name
            .get(name)
            .map(|&id| self.canonical[id.index()].latest)
    }

    /// Generation counter, bumped by [`TypeRegistry::finish_registration`].
    pub fn code_version(&self) -> u32 {
        self.code_version
    }

    pub fn type_name(&self, id: CanonicalTypeId) -> &'static str {
        self.canonical[id.index()].name
    }

    /// Current capability table for a canonical id.
    ///
    /// Re-read on every use rather than cached, so callbacks refreshed by a
    /// re-registration take effect for assets cached before it.
    pub(crate) fn table(&self, id: CanonicalTypeId) -> &Arc<dyn ErasedAssetType> {
        &self.canonical[id.index()].table
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
