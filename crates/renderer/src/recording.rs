//! Recording backend that performs no rendering.
//!
//! Every call is appended to a shared [`CallLog`] so tests (ours and those of
//! downstream paint code) can assert exactly which backend calls a sequence of
//! render-manager operations produced. Handles are handed out from a single
//! increasing counter, so two creations never return the same handle.

use crate::backend::{
    BlendMode, ClipMaskOperation, CompiledFilterHandle, CompiledGeometryHandle,
    CompiledShaderHandle, LayerHandle, LoadedTexture, RenderInterface, TextureHandle,
};
use crate::math::{Matrix4f, Rectanglei, Vector2f, Vector2i};
use crate::mesh::Vertex;
use crate::variant::Dictionary;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CompileGeometry {
        vertices: usize,
        indices: usize,
        handle: CompiledGeometryHandle,
    },
    RenderGeometry {
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
        texture: TextureHandle,
    },
    ReleaseGeometry(CompiledGeometryHandle),
    LoadTexture {
        source: String,
        handle: TextureHandle,
    },
    GenerateTexture {
        dimensions: Vector2i,
        handle: TextureHandle,
    },
    ReleaseTexture(TextureHandle),
    EnableScissorRegion(bool),
    SetScissorRegion(Rectanglei),
    EnableClipMask(bool),
    RenderToClipMask {
        operation: ClipMaskOperation,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
    },
    SetTransform(Option<Matrix4f>),
    PushLayer(LayerHandle),
    CompositeLayers {
        source: LayerHandle,
        destination: LayerHandle,
        blend_mode: BlendMode,
        filters: Vec<CompiledFilterHandle>,
    },
    PopLayer,
    SaveLayerAsTexture(TextureHandle),
    SaveLayerAsMaskImage(CompiledFilterHandle),
    CompileFilter {
        name: String,
        handle: CompiledFilterHandle,
    },
    ReleaseFilter(CompiledFilterHandle),
    CompileShader {
        name: String,
        handle: CompiledShaderHandle,
    },
    RenderShader {
        shader: CompiledShaderHandle,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
        texture: TextureHandle,
    },
    ReleaseShader(CompiledShaderHandle),
}

impl BackendCall {
    /// Short kind name, used by [`CallLog::count`].
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CompileGeometry { .. } => "compile_geometry",
            Self::RenderGeometry { .. } => "render_geometry",
            Self::ReleaseGeometry(_) => "release_geometry",
            Self::LoadTexture { .. } => "load_texture",
            Self::GenerateTexture { .. } => "generate_texture",
            Self::ReleaseTexture(_) => "release_texture",
            Self::EnableScissorRegion(_) => "enable_scissor_region",
            Self::SetScissorRegion(_) => "set_scissor_region",
            Self::EnableClipMask(_) => "enable_clip_mask",
            Self::RenderToClipMask { .. } => "render_to_clip_mask",
            Self::SetTransform(_) => "set_transform",
            Self::PushLayer(_) => "push_layer",
            Self::CompositeLayers { .. } => "composite_layers",
            Self::PopLayer => "pop_layer",
            Self::SaveLayerAsTexture(_) => "save_layer_as_texture",
            Self::SaveLayerAsMaskImage(_) => "save_layer_as_mask_image",
            Self::CompileFilter { .. } => "compile_filter",
            Self::ReleaseFilter(_) => "release_filter",
            Self::CompileShader { .. } => "compile_shader",
            Self::RenderShader { .. } => "render_shader",
            Self::ReleaseShader(_) => "release_shader",
        }
    }
}

/// Shared view of the calls a [`RecordingBackend`] received.
///
/// Cloning the log is cheap and every clone observes the same calls, so a test keeps
/// one clone while the render manager owns the backend.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<BackendCall>>>,
}

impl CallLog {
    fn push(&self, call: BackendCall) {
        log::trace!(target: "renderer", "backend call: {call:?}");
        self.calls.borrow_mut().push(call);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Number of calls of the given [`BackendCall::kind`].
    pub fn count(&self, kind: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Creation calls that returned a valid handle minus matching release calls, per kind.
    pub fn outstanding(&self) -> Outstanding {
        let mut outstanding = Outstanding::default();
        for call in self.calls.borrow().iter() {
            match call {
                BackendCall::CompileGeometry { handle, .. } if handle.0 != 0 => {
                    outstanding.geometry += 1;
                }
                BackendCall::ReleaseGeometry(_) => outstanding.geometry -= 1,
                BackendCall::LoadTexture { handle, .. }
                | BackendCall::GenerateTexture { handle, .. }
                | BackendCall::SaveLayerAsTexture(handle)
                    if handle.0 != 0 =>
                {
                    outstanding.textures += 1;
                }
                BackendCall::ReleaseTexture(_) => outstanding.textures -= 1,
                BackendCall::CompileFilter { handle, .. } | BackendCall::SaveLayerAsMaskImage(handle)
                    if handle.0 != 0 =>
                {
                    outstanding.filters += 1;
                }
                BackendCall::ReleaseFilter(_) => outstanding.filters -= 1,
                BackendCall::CompileShader { handle, .. } if handle.0 != 0 => {
                    outstanding.shaders += 1;
                }
                BackendCall::ReleaseShader(_) => outstanding.shaders -= 1,
                _ => {}
            }
        }
        outstanding
    }
}

/// Live backend resources as seen by a [`CallLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outstanding {
    pub geometry: i64,
    pub textures: i64,
    pub filters: i64,
    pub shaders: i64,
}

/// Backend that records every call and hands out fresh handles.
#[derive(Debug)]
pub struct RecordingBackend {
    log: CallLog,
    next_handle: u64,
    texture_dimensions: Vector2i,
    failing_sources: HashSet<String>,
    refuse_geometry: bool,
    refuse_generated_textures: bool,
    refuse_filters: bool,
    refuse_shaders: bool,
}

impl RecordingBackend {
    /// Create a backend whose file textures all report 512x256 pixels.
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            next_handle: 1,
            texture_dimensions: Vector2i::new(512, 256),
            failing_sources: HashSet::new(),
            refuse_geometry: false,
            refuse_generated_textures: false,
            refuse_filters: false,
            refuse_shaders: false,
        }
    }

    /// A handle on the call log that stays valid after the backend is boxed.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Dimensions reported for every successfully loaded file texture.
    #[must_use]
    pub fn with_texture_dimensions(mut self, dimensions: Vector2i) -> Self {
        self.texture_dimensions = dimensions;
        self
    }

    /// Make `load_texture` refuse this exact (resolved) source.
    #[must_use]
    pub fn with_failing_source(mut self, source: &str) -> Self {
        self.failing_sources.insert(source.to_owned());
        self
    }

    #[must_use]
    pub fn refusing_geometry(mut self) -> Self {
        self.refuse_geometry = true;
        self
    }

    #[must_use]
    pub fn refusing_generated_textures(mut self) -> Self {
        self.refuse_generated_textures = true;
        self
    }

    #[must_use]
    pub fn refusing_filters(mut self) -> Self {
        self.refuse_filters = true;
        self
    }

    #[must_use]
    pub fn refusing_shaders(mut self) -> Self {
        self.refuse_shaders = true;
        self
    }

    fn next(&mut self, refuse: bool) -> u64 {
        if refuse {
            return 0;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderInterface for RecordingBackend {
    fn compile_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> CompiledGeometryHandle {
        let handle = CompiledGeometryHandle(self.next(self.refuse_geometry));
        self.log.push(BackendCall::CompileGeometry {
            vertices: vertices.len(),
            indices: indices.len(),
            handle,
        });
        handle
    }

    fn render_geometry(
        &mut self,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
        texture: TextureHandle,
    ) {
        self.log.push(BackendCall::RenderGeometry {
            geometry,
            translation,
            texture,
        });
    }

    fn release_geometry(&mut self, geometry: CompiledGeometryHandle) {
        self.log.push(BackendCall::ReleaseGeometry(geometry));
    }

    fn load_texture(&mut self, source: &str) -> Option<LoadedTexture> {
        let refuse = self.failing_sources.contains(source);
        let handle = TextureHandle(self.next(refuse));
        self.log.push(BackendCall::LoadTexture {
            source: source.to_owned(),
            handle,
        });
        (!refuse).then_some(LoadedTexture {
            handle,
            dimensions: self.texture_dimensions,
        })
    }

    fn generate_texture(&mut self, _pixels: &[u8], dimensions: Vector2i) -> TextureHandle {
        let handle = TextureHandle(self.next(self.refuse_generated_textures));
        self.log.push(BackendCall::GenerateTexture { dimensions, handle });
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.log.push(BackendCall::ReleaseTexture(texture));
    }

    fn enable_scissor_region(&mut self, enable: bool) {
        self.log.push(BackendCall::EnableScissorRegion(enable));
    }

    fn set_scissor_region(&mut self, region: Rectanglei) {
        self.log.push(BackendCall::SetScissorRegion(region));
    }

    fn enable_clip_mask(&mut self, enable: bool) {
        self.log.push(BackendCall::EnableClipMask(enable));
    }

    fn render_to_clip_mask(
        &mut self,
        operation: ClipMaskOperation,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
    ) {
        self.log.push(BackendCall::RenderToClipMask {
            operation,
            geometry,
            translation,
        });
    }

    fn set_transform(&mut self, transform: Option<&Matrix4f>) {
        self.log.push(BackendCall::SetTransform(transform.copied()));
    }

    fn push_layer(&mut self) -> LayerHandle {
        let handle = LayerHandle(self.next(false));
        self.log.push(BackendCall::PushLayer(handle));
        handle
    }

    fn composite_layers(
        &mut self,
        source: LayerHandle,
        destination: LayerHandle,
        blend_mode: BlendMode,
        filters: &[CompiledFilterHandle],
    ) {
        self.log.push(BackendCall::CompositeLayers {
            source,
            destination,
            blend_mode,
            filters: filters.to_vec(),
        });
    }

    fn pop_layer(&mut self) {
        self.log.push(BackendCall::PopLayer);
    }

    fn save_layer_as_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next(self.refuse_generated_textures));
        self.log.push(BackendCall::SaveLayerAsTexture(handle));
        handle
    }

    fn save_layer_as_mask_image(&mut self) -> CompiledFilterHandle {
        let handle = CompiledFilterHandle(self.next(self.refuse_filters));
        self.log.push(BackendCall::SaveLayerAsMaskImage(handle));
        handle
    }

    fn compile_filter(&mut self, name: &str, _parameters: &Dictionary) -> CompiledFilterHandle {
        let handle = CompiledFilterHandle(self.next(self.refuse_filters));
        self.log.push(BackendCall::CompileFilter {
            name: name.to_owned(),
            handle,
        });
        handle
    }

    fn release_filter(&mut self, filter: CompiledFilterHandle) {
        self.log.push(BackendCall::ReleaseFilter(filter));
    }

    fn compile_shader(&mut self, name: &str, _parameters: &Dictionary) -> CompiledShaderHandle {
        let handle = CompiledShaderHandle(self.next(self.refuse_shaders));
        self.log.push(BackendCall::CompileShader {
            name: name.to_owned(),
            handle,
        });
        handle
    }

    fn render_shader(
        &mut self,
        shader: CompiledShaderHandle,
        geometry: CompiledGeometryHandle,
        translation: Vector2f,
        texture: TextureHandle,
    ) {
        self.log.push(BackendCall::RenderShader {
            shader,
            geometry,
            translation,
            texture,
        });
    }

    fn release_shader(&mut self, shader: CompiledShaderHandle) {
        self.log.push(BackendCall::ReleaseShader(shader));
    }
}
