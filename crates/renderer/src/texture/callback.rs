//! Callback textures: content produced on demand by a user function.

use super::{Texture, TextureSource};
use crate::backend::{LoadedTexture, RenderHandle, RenderInterface, TextureHandle};
use crate::manager::{ManagerId, RenderManager};
use crate::math::Vector2i;
use crate::resource::{ResourceKind, Sealed, UniqueRenderResource};
use crate::stable_vec::{StableIndex, StableVec};
use anyhow::{Result as AnyResult, anyhow, bail};
use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Generator for a callback texture.
///
/// Called whenever the manager needs a backend handle and has none, which includes
/// after [`RenderManager::release_all_textures`]. It must produce exactly one texture
/// through the interface; returning `Err` or producing nothing leaves the texture empty.
pub type CallbackTextureFn = Box<dyn FnMut(&mut CallbackTextureInterface<'_>) -> AnyResult<()>>;

/// Slot plus the version stamped on the entry when it was created, so a texture view
/// kept after its [`CallbackTexture`] was released never resolves to a later occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackTextureKey {
    index: StableIndex,
    version: u64,
}

impl RenderHandle for CallbackTextureKey {
    const INVALID: Self = Self {
        index: StableIndex::INVALID,
        version: 0,
    };
}

impl fmt::Display for CallbackTextureKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}v{}", self.index, self.version)
    }
}

struct CallbackTextureEntry {
    /// `None` while the callback is running.
    callback: Option<CallbackTextureFn>,
    version: u64,
    handle: TextureHandle,
    dimensions: Vector2i,
    load_failed: bool,
}

/// Result of asking the cache for a callback texture's backend handle.
pub(crate) enum LoadStep {
    /// Nothing to run: the handle (possibly invalid after a failure) is known.
    Ready(TextureHandle, Vector2i),
    /// The callback must run; hand it back through [`CallbackTextureCache::finish_load`].
    Run(CallbackTextureFn),
    /// The callback is already running further up the stack.
    Busy,
    /// The texture was released.
    Missing,
}

pub(crate) struct CallbackTextureCache {
    entries: StableVec<CallbackTextureEntry>,
    next_version: u64,
}

impl CallbackTextureCache {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: StableVec::with_capacity(capacity),
            next_version: 1,
        }
    }

    pub(crate) fn insert(&mut self, callback: CallbackTextureFn) -> CallbackTextureKey {
        let version = self.next_version;
        self.next_version += 1;
        let index = self.entries.insert(CallbackTextureEntry {
            callback: Some(callback),
            version,
            handle: TextureHandle::INVALID,
            dimensions: Vector2i::ZERO,
            load_failed: false,
        });
        CallbackTextureKey { index, version }
    }

    fn entry_mut(&mut self, key: CallbackTextureKey) -> Option<&mut CallbackTextureEntry> {
        self.entries
            .get_mut(key.index)
            .filter(|entry| entry.version == key.version)
    }

    pub(crate) fn contains(&self, key: CallbackTextureKey) -> bool {
        self.entries
            .get(key.index)
            .is_some_and(|entry| entry.version == key.version)
    }

    /// Remove the entry and release its backend texture.
    ///
    /// The callback is handed back so the caller can drop it outside any borrow of the
    /// manager; it may own resources whose drop calls back into the manager.
    pub(crate) fn remove(
        &mut self,
        backend: &mut dyn RenderInterface,
        key: CallbackTextureKey,
    ) -> Option<Option<CallbackTextureFn>> {
        if !self.contains(key) {
            return None;
        }
        let entry = self.entries.erase(key.index)?;
        if entry.handle.is_valid() {
            backend.release_texture(entry.handle);
        }
        Some(entry.callback)
    }

    pub(crate) fn begin_load(&mut self, key: CallbackTextureKey) -> LoadStep {
        let Some(entry) = self.entry_mut(key) else {
            return LoadStep::Missing;
        };
        if entry.handle.is_valid() || entry.load_failed {
            return LoadStep::Ready(entry.handle, entry.dimensions);
        }
        match entry.callback.take() {
            Some(callback) => LoadStep::Run(callback),
            None => LoadStep::Busy,
        }
    }

    /// Store the outcome of a callback run.
    ///
    /// Returns the callback if the entry was removed while it ran; the caller then owns
    /// any texture the run produced.
    pub(crate) fn finish_load(
        &mut self,
        key: CallbackTextureKey,
        callback: CallbackTextureFn,
        loaded: Option<LoadedTexture>,
    ) -> Option<CallbackTextureFn> {
        let Some(entry) = self.entry_mut(key) else {
            return Some(callback);
        };
        entry.callback = Some(callback);
        match loaded {
            Some(texture) => {
                entry.handle = texture.handle;
                entry.dimensions = texture.dimensions;
            }
            None => entry.load_failed = true,
        }
        None
    }

    /// Drop every backend texture; callbacks run again on next use.
    pub(crate) fn release_all(&mut self, backend: &mut dyn RenderInterface) {
        self.entries.for_each(|_, entry| {
            if entry.handle.is_valid() {
                backend.release_texture(entry.handle);
            }
            entry.handle = TextureHandle::INVALID;
            entry.dimensions = Vector2i::ZERO;
            entry.load_failed = false;
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empty the cache, returning the callbacks so they can be dropped outside any borrow.
    pub(crate) fn drain(&mut self) -> Vec<CallbackTextureFn> {
        self.entries
            .drain()
            .into_iter()
            .filter_map(|entry| entry.callback)
            .collect()
    }
}

/// What a [`CallbackTextureFn`] uses to produce its texture.
pub struct CallbackTextureInterface<'a> {
    manager: &'a RenderManager,
    handle: &'a mut TextureHandle,
    dimensions: &'a mut Vector2i,
}

impl<'a> CallbackTextureInterface<'a> {
    pub(crate) fn new(
        manager: &'a RenderManager,
        handle: &'a mut TextureHandle,
        dimensions: &'a mut Vector2i,
    ) -> Self {
        Self {
            manager,
            handle,
            dimensions,
        }
    }

    /// The manager the texture is being generated for, e.g. to render into a layer.
    #[inline]
    pub const fn render_manager(&self) -> &'a RenderManager {
        self.manager
    }

    /// Upload premultiplied RGBA pixels as the texture.
    ///
    /// # Errors
    /// Fails if a texture was already produced, if `pixels` does not hold exactly
    /// `width * height * 4` bytes, or if the backend refuses.
    pub fn generate_texture(&mut self, pixels: &[u8], dimensions: Vector2i) -> AnyResult<()> {
        if self.handle.is_valid() {
            bail!("callback texture was already generated");
        }
        if dimensions.x <= 0 || dimensions.y <= 0 {
            bail!("invalid texture dimensions {}x{}", dimensions.x, dimensions.y);
        }
        let expected = dimensions.area() * 4;
        if pixels.len() != expected {
            bail!(
                "expected {expected} bytes for a {}x{} texture, got {}",
                dimensions.x,
                dimensions.y,
                pixels.len()
            );
        }

        let handle = self.manager.generate_backend_texture(pixels, dimensions);
        if !handle.is_valid() {
            bail!("backend refused to generate a {}x{} texture", dimensions.x, dimensions.y);
        }
        *self.handle = handle;
        *self.dimensions = dimensions;
        Ok(())
    }

    /// Capture the current scissor region of the top layer as the texture.
    ///
    /// # Errors
    /// Fails if a texture was already produced, if no scissor region is set, or if the
    /// backend refuses.
    pub fn save_layer_as_texture(&mut self) -> AnyResult<()> {
        if self.handle.is_valid() {
            bail!("callback texture was already generated");
        }
        let region = self.manager.scissor_region();
        if !region.is_valid() {
            bail!("saving a layer as texture requires a scissor region");
        }

        let handle = self.manager.save_backend_layer_as_texture();
        if !handle.is_valid() {
            bail!("backend refused to save the layer as a texture");
        }
        *self.handle = handle;
        *self.dimensions = region.size();
        Ok(())
    }
}

/// Marker for callback textures.
pub enum CallbackTextureKind {}

impl Sealed for CallbackTextureKind {}

impl ResourceKind for CallbackTextureKind {
    type Handle = CallbackTextureKey;
    const NAME: &'static str = "CallbackTexture";

    fn release(manager: &RenderManager, handle: CallbackTextureKey) {
        manager.release_callback_texture(handle);
    }
}

/// Owner of one callback texture slot.
///
/// Hand out [`Texture`] views with [`CallbackTexture::texture`]. Dropping the owner
/// releases the backend texture and the callback; views left behind draw untextured.
#[derive(Debug, Default)]
pub struct CallbackTexture(pub(crate) UniqueRenderResource<CallbackTextureKind>);

impl CallbackTexture {
    /// A view of this texture. Empty if the owner is empty.
    pub fn texture(&self) -> Texture {
        if !self.0.is_valid() {
            return Texture::default();
        }
        self.0.manager().map_or_else(Texture::default, |manager| {
            Texture::new(&manager, TextureSource::Callback(self.0.handle()))
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    #[inline]
    pub const fn manager_id(&self) -> ManagerId {
        self.0.manager_id()
    }

    #[inline]
    pub fn belongs_to(&self, manager: &RenderManager) -> bool {
        self.0.belongs_to(manager)
    }

    pub fn release(&mut self) {
        self.0.release();
    }
}

impl From<&CallbackTexture> for Texture {
    fn from(texture: &CallbackTexture) -> Self {
        texture.texture()
    }
}

/// One generator shared by several render managers.
///
/// Backend handles cannot cross managers, so the source materializes a separate
/// [`CallbackTexture`] per manager, all driven by the same callback.
pub struct CallbackTextureSource {
    callback: Rc<RefCell<CallbackTextureFn>>,
    textures: HashMap<ManagerId, CallbackTexture>,
}

impl CallbackTextureSource {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut CallbackTextureInterface<'_>) -> AnyResult<()> + 'static,
    {
        Self {
            callback: Rc::new(RefCell::new(Box::new(callback))),
            textures: HashMap::new(),
        }
    }

    /// The texture for `manager`, creating its callback texture on first request.
    pub fn texture(&mut self, manager: &RenderManager) -> Texture {
        let callback = &self.callback;
        self.textures
            .entry(manager.id())
            .or_insert_with(|| {
                let shared = Rc::clone(callback);
                manager.make_callback_texture(move |interface| {
                    let mut generate = shared
                        .try_borrow_mut()
                        .map_err(|_| anyhow!("callback texture source re-entered its own generator"))?;
                    (*generate)(interface)
                })
            })
            .texture()
    }

    /// Release the texture created for `manager`. Returns whether there was one.
    pub fn release_for(&mut self, manager: &RenderManager) -> bool {
        self.textures.remove(&manager.id()).is_some()
    }

    /// Release the textures of every manager.
    pub fn clear(&mut self) {
        self.textures.clear();
    }

    /// Number of managers holding a texture from this source.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl fmt::Debug for CallbackTextureSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CallbackTextureSource")
            .field("managers", &self.textures.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
