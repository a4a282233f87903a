//! Textures: a copyable [`Texture`] view over one of two caches owned by the render
//! manager.
//!
//! - File textures are keyed by their resolved source path and shared by every view
//!   of that path. The backend only loads them when a view is first drawn or asked for
//!   its dimensions.
//! - Callback textures are produced on demand by a user function. Every
//!   [`RenderManager::make_callback_texture`] call gets its own slot; the
//!   [`CallbackTextureSource`] helper keeps one per manager for a shared generator.
//!
//! Views do not own backend resources. File textures live until the manager releases
//! them; callback textures live as long as their [`CallbackTexture`].

mod callback;
mod file;
mod path;

pub use callback::{
    CallbackTexture, CallbackTextureFn, CallbackTextureInterface, CallbackTextureKey,
    CallbackTextureKind, CallbackTextureSource,
};
pub(crate) use callback::{CallbackTextureCache, LoadStep};
pub(crate) use file::{FileTextureCache, TextureFileIndex};
pub use path::join_path;

use crate::backend::RenderHandle as _;
use crate::manager::{ManagerId, RenderManager, Shared};
use crate::math::Vector2i;
use core::fmt;
use std::rc::{Rc, Weak};

/// Which cache a [`Texture`] view points into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum TextureSource {
    #[default]
    None,
    File(TextureFileIndex),
    Callback(CallbackTextureKey),
}

/// Copyable view of a texture owned by a render manager.
///
/// The default view is empty and draws as "no texture".
#[derive(Clone, Default)]
pub struct Texture {
    manager: Weak<Shared>,
    manager_id: ManagerId,
    source: TextureSource,
}

impl Texture {
    pub(crate) fn new(manager: &RenderManager, source: TextureSource) -> Self {
        Self {
            manager: Rc::downgrade(manager.shared()),
            manager_id: manager.id(),
            source,
        }
    }

    /// True for the default view that refers to no texture. Never touches the backend.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source == TextureSource::None
    }

    /// Whether the texture has a usable backend handle.
    ///
    /// Loads or generates the texture if that has not happened yet; a texture whose
    /// load or callback failed reports `false`.
    pub fn is_valid(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.manager().is_some_and(|manager| manager.texture_handle(self).is_valid())
    }

    /// Pixel dimensions, materializing the texture if needed. Zero when unavailable.
    pub fn dimensions(&self) -> Vector2i {
        if self.is_empty() {
            return Vector2i::ZERO;
        }
        self.manager()
            .map_or(Vector2i::ZERO, |manager| manager.texture_dimensions(self))
    }

    #[inline]
    pub const fn manager_id(&self) -> ManagerId {
        self.manager_id
    }

    #[inline]
    pub fn belongs_to(&self, manager: &RenderManager) -> bool {
        self.manager_id == manager.id()
    }

    #[inline]
    pub(crate) const fn source(&self) -> TextureSource {
        self.source
    }

    fn manager(&self) -> Option<RenderManager> {
        self.manager.upgrade().map(RenderManager::from_shared)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.manager_id == other.manager_id && self.source == other.source
    }
}

impl Eq for Texture {}

impl fmt::Debug for Texture {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Texture")
            .field("manager", &self.manager_id)
            .field("source", &self.source)
            .finish()
    }
}
