//! Geometry handles and the records the render manager keeps for them.

use crate::backend::{CompiledGeometryHandle, RenderHandle};
use crate::manager::{ManagerId, RenderManager};
use crate::math::Vector2f;
use crate::mesh::Mesh;
use crate::resource::{CompiledShader, ResourceKind, Sealed, UniqueRenderResource};
use crate::stable_vec::StableIndex;
use crate::texture::Texture;

/// Identifies one geometry record: its slot plus the version stamped on it when the
/// mesh was stored. A slot reused by later geometry carries a different version, so a
/// stale key never matches the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub(crate) index: StableIndex,
    pub(crate) version: u64,
}

impl RenderHandle for GeometryKey {
    const INVALID: Self = Self {
        index: StableIndex::INVALID,
        version: 0,
    };
}

/// What [`Geometry::release`] hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Return the mesh with its vertices and indices intact, ready for reuse.
    ReturnMesh,
    /// Return an empty mesh; only the backend resources were of interest.
    #[default]
    ClearMesh,
}

/// A mesh stored in the render manager's geometry table.
pub(crate) struct GeometryRecord {
    pub(crate) mesh: Mesh,
    pub(crate) compiled: CompiledGeometryHandle,
    pub(crate) version: u64,
}

impl GeometryRecord {
    pub(crate) const fn new(mesh: Mesh, version: u64) -> Self {
        Self {
            mesh,
            compiled: CompiledGeometryHandle::INVALID,
            version,
        }
    }
}

/// Marker for geometry resources.
pub enum GeometryKind {}

impl Sealed for GeometryKind {}

impl ResourceKind for GeometryKind {
    type Handle = GeometryKey;
    const NAME: &'static str = "Geometry";

    fn release(manager: &RenderManager, handle: GeometryKey) {
        drop(manager.release_geometry(handle, ReleaseMode::ClearMesh));
    }
}

/// Move-only handle to a mesh owned by a render manager.
///
/// The backend geometry is compiled lazily on first draw or clip-mask use. Dropping
/// the handle frees both the mesh slot and any compiled backend geometry.
#[derive(Debug, Default)]
pub struct Geometry(pub(crate) UniqueRenderResource<GeometryKind>);

impl Geometry {
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

    #[inline]
    pub(crate) const fn key(&self) -> GeometryKey {
        self.0.handle()
    }

    /// Draw at `translation` (rounded to whole pixels) with `texture`.
    ///
    /// An empty or failed texture draws the geometry untextured.
    pub fn render(&self, translation: Vector2f, texture: &Texture) {
        if let Some(manager) = self.0.manager() {
            manager.render_geometry(self, translation, texture, None);
        }
    }

    /// Draw through `shader` instead of the plain textured path.
    ///
    /// An empty shader falls back to [`Geometry::render`].
    pub fn render_with_shader(&self, translation: Vector2f, texture: &Texture, shader: &CompiledShader) {
        if let Some(manager) = self.0.manager() {
            manager.render_geometry(self, translation, texture, Some(shader));
        }
    }

    /// Free the backend geometry and the table slot, returning the mesh per `mode`.
    ///
    /// The handle is empty afterwards.
    pub fn release(&mut self, mode: ReleaseMode) -> Mesh {
        match self.0.detach() {
            Some((manager, key)) => manager.release_geometry(key, mode),
            None => Mesh::new(),
        }
    }
}
