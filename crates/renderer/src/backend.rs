//! Rendering backend abstraction.
//!
//! Defines the [`RenderInterface`] trait the render manager drives. An implementation
//! owns the actual GPU objects and hands back opaque handles; the render manager owns
//! the lifetime of those handles and guarantees each is released exactly once.
//!
//! Calls arrive in the order state changes were issued and always from the thread
//! that owns the render manager.

use crate::math::{Matrix4f, Rectanglei, Vector2f, Vector2i};
use crate::mesh::Vertex;
use crate::variant::Dictionary;
use core::fmt::Debug;
use serde::{Deserialize, Serialize};

/// An opaque backend handle type with a distinguished invalid value.
pub trait RenderHandle: Copy + Eq + Debug {
    /// The value a backend returns to refuse a request.
    const INVALID: Self;

    #[inline]
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! backend_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl RenderHandle for $name {
            const INVALID: Self = Self(0);
        }

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self(0)
            }
        }
    };
}

backend_handle!(
    /// Geometry compiled by the backend.
    CompiledGeometryHandle
);
backend_handle!(
    /// Texture loaded or generated by the backend.
    TextureHandle
);
backend_handle!(
    /// Filter compiled by the backend, applied while compositing layers.
    CompiledFilterHandle
);
backend_handle!(
    /// Shader compiled by the backend, used to draw geometry.
    CompiledShaderHandle
);

/// Compositing target on the backend's layer stack.
///
/// `LayerHandle::BASE` is the frame itself and always exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

impl LayerHandle {
    pub const BASE: Self = Self(0);
}

/// How a clip-mask geometry combines with the current mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipMaskOperation {
    /// Replace the mask with the geometry.
    Set,
    /// Replace the mask with everything outside the geometry.
    SetInverse,
    /// Intersect the mask with the geometry.
    Intersect,
}

/// How a source layer is blended onto the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Source-over alpha blending.
    #[default]
    Blend,
    /// Overwrite the destination.
    Replace,
}

/// A file texture as loaded by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTexture {
    pub handle: TextureHandle,
    pub dimensions: Vector2i,
}

/// Backend-agnostic rendering interface.
///
/// Creation methods signal refusal by returning the handle type's `INVALID` value.
/// Clip masks, transforms, layers, filters and shaders are optional capabilities:
/// their default implementations refuse or ignore the request so a minimal backend
/// only has to provide geometry, textures and scissoring.
pub trait RenderInterface {
    /// Compile geometry the render manager expects to draw repeatedly.
    fn compile_geometry(&mut self, vertices: &[Vertex], indices: &[u32])
    -> CompiledGeometryHandle;

    /// Draw compiled geometry at `translation`, untextured when `texture` is invalid.
    fn render_geometry(
        &mut self,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
        texture: TextureHandle,
    );

    fn release_geometry(&mut self, geometry: CompiledGeometryHandle);

    /// Load a texture from an already resolved source path.
    fn load_texture(&mut self, source: &str) -> Option<LoadedTexture>;

    /// Create a texture from 8-bit premultiplied RGBA pixels.
    fn generate_texture(&mut self, pixels: &[u8], dimensions: Vector2i) -> TextureHandle;

    fn release_texture(&mut self, texture: TextureHandle);

    fn enable_scissor_region(&mut self, enable: bool);

    fn set_scissor_region(&mut self, region: Rectanglei);

    fn enable_clip_mask(&mut self, _enable: bool) {}

    fn render_to_clip_mask(
        &mut self,
        _operation: ClipMaskOperation,
        _geometry: CompiledGeometryHandle,
        _translation: Vector2f,
    ) {
    }

    /// Apply `transform` to subsequent draws; `None` means identity.
    fn set_transform(&mut self, _transform: Option<&Matrix4f>) {}

    /// Push a new compositing layer and make it the render target.
    fn push_layer(&mut self) -> LayerHandle {
        LayerHandle::BASE
    }

    fn composite_layers(
        &mut self,
        _source: LayerHandle,
        _destination: LayerHandle,
        _blend_mode: BlendMode,
        _filters: &[CompiledFilterHandle],
    ) {
    }

    fn pop_layer(&mut self) {}

    /// Copy the current scissor region of the top layer into a new texture.
    fn save_layer_as_texture(&mut self) -> TextureHandle {
        TextureHandle::INVALID
    }

    /// Capture the top layer as a mask-image filter.
    fn save_layer_as_mask_image(&mut self) -> CompiledFilterHandle {
        CompiledFilterHandle::INVALID
    }

    fn compile_filter(&mut self, _name: &str, _parameters: &Dictionary) -> CompiledFilterHandle {
        CompiledFilterHandle::INVALID
    }

    fn release_filter(&mut self, _filter: CompiledFilterHandle) {}

    fn compile_shader(&mut self, _name: &str, _parameters: &Dictionary) -> CompiledShaderHandle {
        CompiledShaderHandle::INVALID
    }

    fn render_shader(
        &mut self,
        _shader: CompiledShaderHandle,
        _geometry: CompiledGeometryHandle,
        _translation: Vector2f,
        _texture: TextureHandle,
    ) {
    }

    fn release_shader(&mut self, _shader: CompiledShaderHandle) {}
}
