//! Move-only owners of backend resources.
//!
//! A [`UniqueRenderResource`] owns exactly one handle created by a render manager and
//! releases it exactly once: on drop, or earlier through an explicit release. Moving
//! transfers ownership without touching the backend, and [`core::mem::take`] leaves an
//! empty resource behind whose drop is a no-op.
//!
//! Resources keep a weak reference to their manager. They never keep it alive, and a
//! resource that outlives its manager is reported instead of touching freed state.

use crate::backend::{CompiledFilterHandle, CompiledShaderHandle, RenderHandle};
use crate::manager::{ManagerId, RenderManager, Shared};
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use std::rc::{Rc, Weak};

mod sealed {
    pub trait Sealed {}
}

/// A kind of resource the render manager can hand out.
///
/// Sealed: only this crate defines resource kinds, because only the manager may
/// construct resources.
pub trait ResourceKind: sealed::Sealed {
    type Handle: RenderHandle;

    /// Human-readable name for diagnostics.
    const NAME: &'static str;

    /// Return `handle` to `manager`. Called at most once per created handle.
    fn release(manager: &RenderManager, handle: Self::Handle);
}

/// Move-only owner of one render manager resource.
pub struct UniqueRenderResource<K: ResourceKind> {
    manager: Weak<Shared>,
    manager_id: ManagerId,
    handle: K::Handle,
    kind: PhantomData<K>,
}

impl<K: ResourceKind> UniqueRenderResource<K> {
    /// Only the manager creates resources, so construction is crate-private.
    pub(crate) fn new(manager: &RenderManager, handle: K::Handle) -> Self {
        Self {
            manager: Rc::downgrade(manager.shared()),
            manager_id: manager.id(),
            handle,
            kind: PhantomData,
        }
    }

    /// A resource that owns nothing.
    pub const fn empty() -> Self {
        Self {
            manager: Weak::new(),
            manager_id: ManagerId::NONE,
            handle: K::Handle::INVALID,
            kind: PhantomData,
        }
    }

    /// True while this resource owns a valid handle.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Identity of the manager that created this resource.
    #[inline]
    pub const fn manager_id(&self) -> ManagerId {
        self.manager_id
    }

    #[inline]
    pub(crate) const fn handle(&self) -> K::Handle {
        self.handle
    }

    /// Whether `manager` created this resource.
    #[inline]
    pub fn belongs_to(&self, manager: &RenderManager) -> bool {
        self.manager_id == manager.id()
    }

    /// The owning manager, if it is still alive.
    pub(crate) fn manager(&self) -> Option<RenderManager> {
        self.manager.upgrade().map(RenderManager::from_shared)
    }

    /// Give up ownership without releasing; the resource becomes empty.
    ///
    /// Returns the manager and handle when there was something to release.
    pub(crate) fn detach(&mut self) -> Option<(RenderManager, K::Handle)> {
        let handle = mem::replace(&mut self.handle, K::Handle::INVALID);
        let manager = mem::take(&mut self.manager);
        self.manager_id = ManagerId::NONE;
        if !handle.is_valid() {
            return None;
        }
        if let Some(shared) = manager.upgrade() {
            Some((RenderManager::from_shared(shared), handle))
        } else {
            log::warn!(
                target: "renderer",
                "{} {handle:?} outlived its render manager; the backend resource was already torn down",
                K::NAME
            );
            None
        }
    }

    /// Release the backend resource now. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some((manager, handle)) = self.detach() {
            K::release(&manager, handle);
        }
    }
}

impl<K: ResourceKind> Default for UniqueRenderResource<K> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: ResourceKind> Drop for UniqueRenderResource<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: ResourceKind> fmt::Debug for UniqueRenderResource<K> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct(K::NAME)
            .field("manager", &self.manager_id)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Marker for compiled filters.
pub enum FilterKind {}

impl sealed::Sealed for FilterKind {}

impl ResourceKind for FilterKind {
    type Handle = CompiledFilterHandle;
    const NAME: &'static str = "CompiledFilter";

    fn release(manager: &RenderManager, handle: CompiledFilterHandle) {
        manager.release_filter(handle);
    }
}

/// Marker for compiled shaders.
pub enum ShaderKind {}

impl sealed::Sealed for ShaderKind {}

impl ResourceKind for ShaderKind {
    type Handle = CompiledShaderHandle;
    const NAME: &'static str = "CompiledShader";

    fn release(manager: &RenderManager, handle: CompiledShaderHandle) {
        manager.release_shader(handle);
    }
}

pub(crate) use sealed::Sealed;

/// A filter compiled by the backend, applied when compositing layers.
///
/// Empty (`!is_valid()`) when the backend refused to compile it; compositing simply
/// skips empty filters.
#[derive(Debug, Default)]
pub struct CompiledFilter(pub(crate) UniqueRenderResource<FilterKind>);

impl CompiledFilter {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    #[inline]
    pub fn belongs_to(&self, manager: &RenderManager) -> bool {
        self.0.belongs_to(manager)
    }

    /// Release the backend filter now instead of on drop.
    pub fn release(&mut self) {
        self.0.release();
    }
}

/// A shader compiled by the backend, used to draw geometry.
#[derive(Debug, Default)]
pub struct CompiledShader(pub(crate) UniqueRenderResource<ShaderKind>);

impl CompiledShader {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    #[inline]
    pub fn belongs_to(&self, manager: &RenderManager) -> bool {
        self.0.belongs_to(manager)
    }

    pub fn release(&mut self) {
        self.0.release();
    }
}
