//! Backend-agnostic render resource manager: geometry, textures, filters, shaders,
//! clip state and compositing layers, released exactly once.

pub mod backend;
pub mod config;
pub mod geometry;
pub mod manager;
pub mod math;
pub mod mesh;
pub mod recording;
pub mod render_state;
pub mod resource;
pub mod stable_vec;
pub mod texture;
pub mod variant;

pub use backend::{
    BlendMode, ClipMaskOperation, CompiledFilterHandle, CompiledGeometryHandle,
    CompiledShaderHandle, LayerHandle, LoadedTexture, RenderHandle, RenderInterface,
    TextureHandle,
};
pub use config::RenderConfig;
pub use geometry::{Geometry, GeometryKey, ReleaseMode};
pub use manager::{ManagerId, RenderManager, RenderStatistics};
pub use math::{ColourbPremultiplied, Matrix4f, Rectanglei, Vector2f, Vector2i};
pub use mesh::{Mesh, Vertex};
pub use render_state::{ClipMaskGeometry, ClipMaskGeometryList, RenderState};
pub use resource::{CompiledFilter, CompiledShader, ResourceKind, UniqueRenderResource};
pub use stable_vec::{StableIndex, StableVec};
pub use texture::{
    CallbackTexture, CallbackTextureFn, CallbackTextureInterface, CallbackTextureSource,
    Texture, join_path,
};
pub use variant::{Dictionary, Variant};
