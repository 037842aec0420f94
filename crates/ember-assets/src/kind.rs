//! Asset type descriptors and their load/unload capability tables.

use std::any::Any;
use std::mem;

use crate::error::{AssetError, AssetResult};

/// Outcome of a successful load callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The payload was (re)built from the source data.
    Loaded,
    /// The callback recognized the existing payload and left it as is.
    Unchanged,
}

/// Parameters handed to a load callback.
pub struct LoadRequest<'a> {
    /// The path the asset is keyed by.
    pub path: &'a str,
    /// Extra type-specific arguments, if the caller supplied any.
    pub args: Option<&'a dyn Any>,
}

/// A loadable resource kind: sprite, font, shader blob, and so on.
///
/// Implementations own all decoding and IO. The engine hands `load` the
/// payload slot it already has for the key, so a reload can diff against the
/// previous contents and update in place; anything holding a reference into
/// the payload keeps observing the updated data.
///
/// # Example
///
/// ```ignore
/// struct TextFile;
///
/// impl AssetType for TextFile {
///     type Payload = String;
///     const NAME: &'static str = "text";
///
///     fn create(&self) -> String {
///         String::new()
///     }
///
///     fn load(&self, payload: &mut String, req: &LoadRequest<'_>) -> AssetResult<LoadOutcome> {
///         *payload = std::fs::read_to_string(req.path)?;
///         Ok(LoadOutcome::Loaded)
///     }
/// }
/// ```
pub trait AssetType: Send + Sync + 'static {
    /// The in-memory representation this type decodes into.
    type Payload: Send + 'static;

    /// Name the type registers under. Identity follows this name across code
    /// swaps, not the value a particular registration call supplied.
    const NAME: &'static str;

    /// Produce an empty payload slot for a brand-new asset.
    fn create(&self) -> Self::Payload;

    /// Fill `payload` from the source behind `req.path`.
    ///
    /// The slot keeps its previous contents across calls for the same key.
    /// Return [`LoadOutcome::Unchanged`] to signal the existing contents are
    /// still valid; IO and parse failures surface as `Err`.
    fn load(&self, payload: &mut Self::Payload, req: &LoadRequest<'_>) -> AssetResult<LoadOutcome>;

    /// Release anything the payload owns that `Drop` alone cannot, such as
    /// GPU handles registered elsewhere.
    fn unload(&self, payload: &mut Self::Payload) {
        let _ = payload;
    }
}

/// Object-safe capability table over a registered [`AssetType`].
pub trait ErasedAssetType: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Size in bytes of this type's payload representation.
    fn payload_size(&self) -> usize;

    fn create_payload(&self) -> Box<dyn Any + Send>;

    fn load(&self, payload: &mut (dyn Any + Send), req: &LoadRequest<'_>)
    -> AssetResult<LoadOutcome>;

    fn unload(&self, payload: &mut (dyn Any + Send));
}

impl<T: AssetType> ErasedAssetType for T {
    fn type_name(&self) -> &'static str {
        T::NAME
    }

    fn payload_size(&self) -> usize {
        mem::size_of::<T::Payload>()
    }

    fn create_payload(&self) -> Box<dyn Any + Send> {
        Box::new(self.create())
    }

    fn load(
        &self,
        payload: &mut (dyn Any + Send),
        req: &LoadRequest<'_>,
    ) -> AssetResult<LoadOutcome> {
        let slot = payload
            .downcast_mut::<T::Payload>()
            .ok_or(AssetError::PayloadTypeMismatch { expected: T::NAME })?;
        AssetType::load(self, slot, req)
    }

    fn unload(&self, payload: &mut (dyn Any + Send)) {
        if let Some(slot) = payload.downcast_mut::<T::Payload>() {
            AssetType::unload(self, slot);
        }
    }
}
