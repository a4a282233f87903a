//! Snapshot of the render manager's scissor, clip mask and transform.

use crate::backend::ClipMaskOperation;
use crate::geometry::{Geometry, GeometryKey};
use crate::manager::ManagerId;
use crate::math::{Matrix4f, Rectanglei, Vector2f};
use smallvec::SmallVec;

/// One geometry contributing to the clip mask.
///
/// The entry refers to the geometry by key and version, not by borrowing it, so a
/// saved [`RenderState`] can outlive the [`Geometry`]. An entry whose geometry was
/// released or rebuilt is skipped when the mask is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMaskGeometry {
    operation: ClipMaskOperation,
    geometry: GeometryKey,
    manager_id: ManagerId,
    absolute_offset: Vector2f,
    transform: Option<Matrix4f>,
}

impl ClipMaskGeometry {
    /// Clip by `geometry` drawn at `absolute_offset`.
    ///
    /// `transform` applies while the geometry is drawn into the mask; `None` draws it
    /// untransformed regardless of the active transform.
    pub fn new(
        operation: ClipMaskOperation,
        geometry: &Geometry,
        absolute_offset: Vector2f,
        transform: Option<Matrix4f>,
    ) -> Self {
        Self {
            operation,
            geometry: geometry.key(),
            manager_id: geometry.manager_id(),
            absolute_offset,
            transform,
        }
    }

    #[inline]
    pub const fn operation(&self) -> ClipMaskOperation {
        self.operation
    }

    #[inline]
    pub const fn absolute_offset(&self) -> Vector2f {
        self.absolute_offset
    }

    #[inline]
    pub const fn transform(&self) -> Option<&Matrix4f> {
        self.transform.as_ref()
    }

    #[inline]
    pub const fn manager_id(&self) -> ManagerId {
        self.manager_id
    }

    #[inline]
    pub(crate) const fn geometry(&self) -> GeometryKey {
        self.geometry
    }
}

/// Clip mask entries, applied in order.
pub type ClipMaskGeometryList = SmallVec<ClipMaskGeometry, 2>;

/// Value snapshot of everything that restricts or transforms drawing.
///
/// The default state has no scissor, no clip mask and the identity transform. States
/// compare by value so the manager can skip backend calls that would change nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub(crate) scissor_region: Rectanglei,
    pub(crate) clip_mask_list: ClipMaskGeometryList,
    pub(crate) transform: Matrix4f,
}

impl RenderState {
    /// The scissor region, invalid when scissoring is disabled.
    #[inline]
    pub const fn scissor_region(&self) -> Rectanglei {
        self.scissor_region
    }

    #[inline]
    pub fn clip_mask_list(&self) -> &[ClipMaskGeometry] {
        &self.clip_mask_list
    }

    #[inline]
    pub const fn transform(&self) -> &Matrix4f {
        &self.transform
    }

    /// True for the state a frame must start and end in.
    pub fn is_default(&self) -> bool {
        !self.scissor_region.is_valid()
            && self.clip_mask_list.is_empty()
            && self.transform.is_identity()
    }
}
