//! The render manager: owner of every render resource and of the render state.
//!
//! Resources handed out by the manager ([`Geometry`], [`CallbackTexture`],
//! [`CompiledFilter`], [`CompiledShader`]) and [`Texture`] views keep a weak
//! reference plus the manager's [`ManagerId`]. Every entry point checks that id, so a
//! resource from another manager is reported instead of being interpreted against the
//! wrong tables.
//!
//! All state lives behind one `RefCell`. The manager never holds that borrow while
//! running user code (texture callbacks) or while dropping values that may own
//! resources, so resources can be released from anywhere, including from inside a
//! texture callback.

use crate::backend::{
    BlendMode, ClipMaskOperation, CompiledFilterHandle, CompiledGeometryHandle,
    CompiledShaderHandle, LayerHandle, LoadedTexture, RenderHandle as _, RenderInterface,
    TextureHandle,
};
use crate::config::RenderConfig;
use crate::geometry::{Geometry, GeometryKey, GeometryRecord, ReleaseMode};
use crate::math::{Matrix4f, Rectanglei, Vector2f, Vector2i};
use crate::mesh::Mesh;
use crate::render_state::{ClipMaskGeometry, ClipMaskGeometryList, RenderState};
use crate::resource::{CompiledFilter, CompiledShader, UniqueRenderResource};
use crate::stable_vec::StableVec;
use crate::texture::{
    CallbackTexture, CallbackTextureCache, CallbackTextureInterface, CallbackTextureKey,
    FileTextureCache, LoadStep, Texture, TextureSource, join_path,
};
use crate::variant::Dictionary;
use anyhow::Result as AnyResult;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use smallvec::SmallVec;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::thread;

/// Process-unique identity of a render manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(u64);

impl ManagerId {
    /// The id of empty resources; no manager has it.
    pub const NONE: Self = Self(0);

    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "manager#{}", self.0)
    }
}

/// Live resource counts, for leak checks and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    /// Live geometry records, compiled or not.
    pub geometry: usize,
    /// Geometry that currently holds a compiled backend handle.
    pub compiled_geometry: usize,
    /// Live callback texture slots.
    pub callback_textures: usize,
    /// File texture entries, loaded or not.
    pub file_textures: usize,
    /// File texture entries currently holding a backend handle.
    pub loaded_file_textures: usize,
    /// Compiled filters not yet released, mask images included.
    pub filters: usize,
    /// Compiled shaders not yet released.
    pub shaders: usize,
    /// Layers pushed and not yet popped.
    pub layers: usize,
    /// Contract violations reported since the manager was created.
    pub usage_errors: usize,
}

struct Inner {
    backend: Box<dyn RenderInterface>,
    assert_on_misuse: bool,
    viewport: Vector2i,
    state: RenderState,
    /// Transform last sent to the backend; differs from `state.transform` only while a
    /// clip mask is being drawn.
    backend_transform: Matrix4f,
    layers: SmallVec<LayerHandle, 8>,
    geometry: StableVec<GeometryRecord>,
    next_geometry_version: u64,
    file_textures: FileTextureCache,
    callback_textures: CallbackTextureCache,
    live_filters: usize,
    live_shaders: usize,
    usage_errors: usize,
}

impl Inner {
    /// Log a contract violation by the caller and count it.
    fn report_usage_error(&mut self, args: fmt::Arguments<'_>) {
        self.usage_errors += 1;
        log::error!(target: "renderer", "render manager misuse: {args}");
        debug_assert!(
            !self.assert_on_misuse || thread::panicking(),
            "render manager misuse: {args}"
        );
    }

    /// Compiled handle of the geometry behind `key`, compiling it on first use.
    ///
    /// `None` for a stale key (reported), an empty mesh, or a backend refusal (logged).
    fn compiled_geometry(&mut self, key: GeometryKey) -> Option<CompiledGeometryHandle> {
        let live = self
            .geometry
            .get(key.index)
            .is_some_and(|record| record.version == key.version);
        if !live {
            self.report_usage_error(format_args!(
                "geometry {key:?} used after it was released"
            ));
            return None;
        }

        let record = self.geometry.get_mut(key.index)?;
        if record.mesh.is_empty() {
            return None;
        }
        if !record.compiled.is_valid() {
            record.compiled = self
                .backend
                .compile_geometry(&record.mesh.vertices, &record.mesh.indices);
            if record.compiled.is_valid() {
                log::trace!(target: "renderer", "compiled geometry {} -> {:?}", key.index, record.compiled);
            } else {
                log::error!(
                    target: "renderer",
                    "backend could not compile geometry {} ({} vertices, {} indices)",
                    key.index,
                    record.mesh.vertices.len(),
                    record.mesh.indices.len()
                );
                return None;
            }
        }
        Some(record.compiled)
    }

    fn apply_clip_mask(&mut self, id: ManagerId) {
        let enabled = !self.state.clip_mask_list.is_empty();
        self.backend.enable_clip_mask(enabled);
        if !enabled {
            return;
        }

        let entries = self.state.clip_mask_list.clone();
        for entry in &entries {
            if entry.manager_id() != id {
                self.report_usage_error(format_args!(
                    "clip mask geometry from {} used with {id}",
                    entry.manager_id()
                ));
                continue;
            }
            self.send_transform(entry.transform().copied().unwrap_or(Matrix4f::IDENTITY));
            if let Some(compiled) = self.compiled_geometry(entry.geometry()) {
                self.backend
                    .render_to_clip_mask(entry.operation(), compiled, entry.absolute_offset());
            }
        }

        self.send_transform(self.state.transform);
    }

    /// Forward `transform` unless the backend already has it.
    fn send_transform(&mut self, transform: Matrix4f) {
        if transform == self.backend_transform {
            return;
        }
        self.backend_transform = transform;
        self.backend.set_transform(as_backend_transform(&transform));
    }

    fn set_scissor_region(&mut self, region: Rectanglei) {
        let was_enabled = self.state.scissor_region.is_valid();
        let enable = region.is_valid();
        if enable != was_enabled {
            self.backend.enable_scissor_region(enable);
        }

        let region = if enable {
            let clamped = if self.viewport.area() > 0 {
                region.intersect(Rectanglei::from_size(self.viewport))
            } else {
                region
            };
            if clamped != self.state.scissor_region {
                self.backend.set_scissor_region(clamped);
            }
            clamped
        } else {
            Rectanglei::make_invalid()
        };
        self.state.scissor_region = region;
    }

    fn set_transform(&mut self, transform: Option<&Matrix4f>) {
        let transform = transform.copied().unwrap_or(Matrix4f::IDENTITY);
        if transform == self.state.transform {
            return;
        }
        self.state.transform = transform;
        self.send_transform(transform);
    }

    fn set_clip_mask_list(&mut self, id: ManagerId, list: ClipMaskGeometryList) {
        if list == self.state.clip_mask_list {
            return;
        }
        self.state.clip_mask_list = list;
        self.apply_clip_mask(id);
    }

    fn set_state(&mut self, id: ManagerId, next: &RenderState) {
        self.set_scissor_region(next.scissor_region);
        self.set_clip_mask_list(id, next.clip_mask_list.clone());
        self.set_transform(Some(&next.transform));
    }

    fn release_all_compiled_geometry(&mut self) {
        let backend = &mut self.backend;
        self.geometry.for_each(|_, record| {
            if record.compiled.is_valid() {
                backend.release_geometry(record.compiled);
                record.compiled = CompiledGeometryHandle::INVALID;
            }
        });
    }

    fn release_all_textures(&mut self) {
        self.file_textures.release_all(self.backend.as_mut());
        self.callback_textures.release_all(self.backend.as_mut());
    }

    fn statistics(&self) -> RenderStatistics {
        RenderStatistics {
            geometry: self.geometry.len(),
            compiled_geometry: self
                .geometry
                .iter()
                .filter(|(_, record)| record.compiled.is_valid())
                .count(),
            callback_textures: self.callback_textures.len(),
            file_textures: self.file_textures.len(),
            loaded_file_textures: self.file_textures.loaded_count(),
            filters: self.live_filters,
            shaders: self.live_shaders,
            layers: self.layers.len(),
            usage_errors: self.usage_errors,
        }
    }
}

/// The backend is told "no transform" rather than being handed the identity matrix.
fn as_backend_transform(transform: &Matrix4f) -> Option<&Matrix4f> {
    (!transform.is_identity()).then_some(transform)
}

/// State shared between the manager and the weak references its resources hold.
pub(crate) struct Shared {
    id: ManagerId,
    config: RenderConfig,
    inner: RefCell<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let id = self.id;
        let inner = self.inner.get_mut();
        let stats = inner.statistics();

        if self.config.report_leaks {
            let leaks = [
                ("geometry", stats.geometry),
                ("callback textures", stats.callback_textures),
                ("compiled filters", stats.filters),
                ("compiled shaders", stats.shaders),
                ("layers", stats.layers),
            ];
            for (kind, count) in leaks {
                if count > 0 {
                    log::error!(target: "renderer", "{id} dropped with {count} {kind} still alive");
                }
            }
        }

        for _ in 0..inner.layers.len() {
            inner.backend.pop_layer();
        }
        inner.layers.clear();
        inner.release_all_compiled_geometry();
        inner.release_all_textures();

        let callbacks = inner.callback_textures.drain();
        let records = inner.geometry.drain();
        log::debug!(
            target: "renderer",
            "{id} shut down, dropping {} callbacks and {} meshes",
            callbacks.len(),
            records.len()
        );
        drop(callbacks);
        drop(records);
    }
}

/// Owns render resources and drives a [`RenderInterface`] backend.
///
/// Not thread-safe; a manager and everything it hands out stay on one thread.
pub struct RenderManager {
    shared: Rc<Shared>,
}

impl RenderManager {
    /// Create a manager with the default configuration.
    pub fn new(backend: impl RenderInterface + 'static) -> Self {
        Self::with_config(backend, RenderConfig::default())
    }

    /// Create a manager driving `backend` with an explicit configuration.
    pub fn with_config(backend: impl RenderInterface + 'static, config: RenderConfig) -> Self {
        let id = ManagerId::next();
        log::debug!(target: "renderer", "creating {id} with {config:?}");
        let inner = Inner {
            backend: Box::new(backend),
            assert_on_misuse: config.assert_on_misuse,
            viewport: Vector2i::ZERO,
            state: RenderState::default(),
            backend_transform: Matrix4f::IDENTITY,
            layers: SmallVec::new(),
            geometry: StableVec::new(),
            next_geometry_version: 1,
            file_textures: FileTextureCache::default(),
            callback_textures: CallbackTextureCache::with_capacity(config.callback_texture_reserve),
            live_filters: 0,
            live_shaders: 0,
            usage_errors: 0,
        };
        Self {
            shared: Rc::new(Shared {
                id,
                config,
                inner: RefCell::new(inner),
            }),
        }
    }

    /// A second handle on a live manager, used by resources to call back into it.
    pub(crate) const fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    #[inline]
    pub(crate) const fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }

    /// Identity stamped on every resource this manager hands out.
    #[inline]
    pub fn id(&self) -> ManagerId {
        self.shared.id
    }

    /// The configuration the manager was created with.
    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.shared.config
    }

    fn with_inner<R>(&self, func: impl FnOnce(&mut Inner) -> R) -> R {
        func(&mut self.shared.inner.borrow_mut())
    }

    fn inner(&self) -> Ref<'_, Inner> {
        self.shared.inner.borrow()
    }

    fn usage_error(&self, args: fmt::Arguments<'_>) {
        self.with_inner(|inner| inner.report_usage_error(args));
    }

    /// Start a frame covering `viewport`.
    ///
    /// The previous frame must have popped every layer and restored the default render
    /// state. Leftovers are reported as usage errors and then cleaned up so the new
    /// frame starts from a known state.
    pub fn prepare_render(&self, viewport: Vector2i) {
        let _span = tracing::info_span!("renderer.prepare_render").entered();
        let id = self.id();
        self.with_inner(|inner| {
            inner.viewport = viewport;

            if !inner.layers.is_empty() {
                let count = inner.layers.len();
                inner.report_usage_error(format_args!("{count} layers still pushed at frame start"));
                inner.layers.clear();
                for _ in 0..count {
                    inner.backend.pop_layer();
                }
            }

            if !inner.state.is_default() {
                inner.report_usage_error(format_args!("render state was not reset at frame start"));
                inner.set_state(id, &RenderState::default());
            }
        });
    }

    /// Change the viewport without starting a frame. Applies to later scissor regions.
    pub fn set_viewport(&self, viewport: Vector2i) {
        self.with_inner(|inner| inner.viewport = viewport);
    }

    /// The viewport scissor regions are clamped to; zero before the first frame.
    pub fn viewport(&self) -> Vector2i {
        self.inner().viewport
    }

    /// Store `mesh` and return the owning handle. Nothing reaches the backend yet.
    pub fn make_geometry(&self, mesh: Mesh) -> Geometry {
        let key = self.with_inner(|inner| {
            let version = inner.next_geometry_version;
            inner.next_geometry_version += 1;
            let index = inner.geometry.insert(GeometryRecord::new(mesh, version));
            GeometryKey { index, version }
        });
        if !key.index.is_valid() {
            return Geometry::default();
        }
        Geometry(UniqueRenderResource::new(self, key))
    }

    /// View of the file texture `source`, resolved against `document_path`.
    ///
    /// Views of the same resolved path share one cache entry. The backend loads the
    /// texture the first time a view is drawn or measured.
    pub fn load_texture(&self, source: &str, document_path: &str) -> Texture {
        let resolved = join_path(document_path, source);
        let index = self.with_inner(|inner| inner.file_textures.insert(&resolved));
        Texture::new(self, TextureSource::File(index))
    }

    /// Register a texture generated by `callback` when first needed.
    ///
    /// Every call creates a distinct texture, even for identical callbacks.
    pub fn make_callback_texture<F>(&self, callback: F) -> CallbackTexture
    where
        F: FnMut(&mut CallbackTextureInterface<'_>) -> AnyResult<()> + 'static,
    {
        let key = self.with_inner(|inner| inner.callback_textures.insert(Box::new(callback)));
        CallbackTexture(UniqueRenderResource::new(self, key))
    }

    /// Compile a filter. Returns an empty filter if the backend refuses.
    pub fn compile_filter(&self, name: &str, parameters: &Dictionary) -> CompiledFilter {
        let handle = self.with_inner(|inner| {
            let handle = inner.backend.compile_filter(name, parameters);
            if handle.is_valid() {
                inner.live_filters += 1;
            } else {
                log::error!(target: "renderer", "backend could not compile filter '{name}'");
            }
            handle
        });
        if !handle.is_valid() {
            return CompiledFilter::default();
        }
        CompiledFilter(UniqueRenderResource::new(self, handle))
    }

    /// Compile a shader. Returns an empty shader if the backend refuses.
    pub fn compile_shader(&self, name: &str, parameters: &Dictionary) -> CompiledShader {
        let handle = self.with_inner(|inner| {
            let handle = inner.backend.compile_shader(name, parameters);
            if handle.is_valid() {
                inner.live_shaders += 1;
            } else {
                log::error!(target: "renderer", "backend could not compile shader '{name}'");
            }
            handle
        });
        if !handle.is_valid() {
            return CompiledShader::default();
        }
        CompiledShader(UniqueRenderResource::new(self, handle))
    }

    /// Restrict drawing to `region`, clamped to the viewport. An invalid region disables
    /// scissoring.
    pub fn set_scissor_region(&self, region: Rectanglei) {
        self.with_inner(|inner| inner.set_scissor_region(region));
    }

    /// Turn scissoring off. Does nothing if it is already off.
    pub fn disable_scissor_region(&self) {
        self.set_scissor_region(Rectanglei::make_invalid());
    }

    /// The active scissor region, invalid when disabled.
    pub fn scissor_region(&self) -> Rectanglei {
        self.inner().state.scissor_region
    }

    /// Clip to a single geometry drawn at `translation`.
    pub fn set_clip_mask(&self, operation: ClipMaskOperation, geometry: &Geometry, translation: Vector2f) {
        if !geometry.is_valid() {
            self.usage_error(format_args!("clip mask set from empty geometry"));
            return;
        }
        if !geometry.belongs_to(self) {
            self.usage_error(format_args!(
                "clip mask geometry from {} used with {}",
                geometry.manager_id(),
                self.id()
            ));
            return;
        }

        let mut list = ClipMaskGeometryList::new();
        list.push(ClipMaskGeometry::new(operation, geometry, translation, None));
        self.set_clip_mask_list(list);
    }

    /// Replace the clip mask. Does nothing if `list` equals the current one.
    pub fn set_clip_mask_list(&self, list: ClipMaskGeometryList) {
        let id = self.id();
        self.with_inner(|inner| inner.set_clip_mask_list(id, list));
    }

    /// Clear the clip mask. Does nothing if no mask is set.
    pub fn disable_clip_mask(&self) {
        self.set_clip_mask_list(ClipMaskGeometryList::new());
    }

    /// Transform later draws by `transform`; `None` resets to identity.
    pub fn set_transform(&self, transform: Option<&Matrix4f>) {
        self.with_inner(|inner| inner.set_transform(transform));
    }

    /// Snapshot of scissor, clip mask and transform.
    pub fn state(&self) -> RenderState {
        self.inner().state.clone()
    }

    /// Restore a snapshot taken with [`RenderManager::state`], emitting only the
    /// backend calls needed to get there.
    pub fn set_state(&self, state: &RenderState) {
        let id = self.id();
        self.with_inner(|inner| inner.set_state(id, state));
    }

    /// Return to the default state: no scissor, no clip mask, identity transform.
    pub fn reset_state(&self) {
        self.set_state(&RenderState::default());
    }

    /// Push a compositing layer; later draws target it.
    pub fn push_layer(&self) -> LayerHandle {
        self.with_inner(|inner| {
            let layer = inner.backend.push_layer();
            inner.layers.push(layer);
            log::trace!(target: "renderer", "pushed layer {layer:?} (depth {})", inner.layers.len());
            layer
        })
    }

    /// Composite `source` onto `destination`, applying `filters` in order.
    ///
    /// Empty filters are skipped; filters from another manager are reported and skipped.
    pub fn composite_layers<'a>(
        &self,
        source: LayerHandle,
        destination: LayerHandle,
        blend_mode: BlendMode,
        filters: impl IntoIterator<Item = &'a CompiledFilter>,
    ) {
        let _span = tracing::info_span!("renderer.composite_layers").entered();
        let id = self.id();
        self.with_inner(|inner| {
            let mut handles: SmallVec<CompiledFilterHandle, 4> = SmallVec::new();
            for filter in filters {
                if !filter.is_valid() {
                    continue;
                }
                if filter.0.manager_id() != id {
                    inner.report_usage_error(format_args!(
                        "filter from {} composited by {id}",
                        filter.0.manager_id()
                    ));
                    continue;
                }
                handles.push(filter.0.handle());
            }
            inner
                .backend
                .composite_layers(source, destination, blend_mode, &handles);
        });
    }

    /// Pop the top layer. Popping with nothing pushed is a usage error.
    pub fn pop_layer(&self) {
        self.with_inner(|inner| {
            if inner.layers.pop().is_some() {
                inner.backend.pop_layer();
            } else {
                inner.report_usage_error(format_args!("pop_layer called with no layer pushed"));
            }
        });
    }

    /// The current render target; the base layer when nothing is pushed.
    pub fn top_layer(&self) -> LayerHandle {
        self.inner().layers.last().copied().unwrap_or(LayerHandle::BASE)
    }

    /// The layer below the top one, i.e. where the top layer composites to.
    pub fn next_layer(&self) -> LayerHandle {
        self.with_inner(|inner| {
            let depth = inner.layers.len();
            if depth == 0 {
                inner.report_usage_error(format_args!("next_layer called with no layer pushed"));
                return LayerHandle::BASE;
            }
            depth
                .checked_sub(2)
                .and_then(|below| inner.layers.get(below).copied())
                .unwrap_or(LayerHandle::BASE)
        })
    }

    /// Capture the top layer as a mask-image filter.
    pub fn save_layer_as_mask_image(&self) -> CompiledFilter {
        let handle = self.with_inner(|inner| {
            let handle = inner.backend.save_layer_as_mask_image();
            if handle.is_valid() {
                inner.live_filters += 1;
            } else {
                log::error!(target: "renderer", "backend could not save the layer as a mask image");
            }
            handle
        });
        if !handle.is_valid() {
            return CompiledFilter::default();
        }
        CompiledFilter(UniqueRenderResource::new(self, handle))
    }

    /// Release the backend texture loaded for `source`. Existing views reload it on
    /// next use. Returns whether a texture was released.
    pub fn release_texture(&self, source: &str) -> bool {
        self.with_inner(|inner| inner.file_textures.release(inner.backend.as_mut(), source))
    }

    /// Release every file and callback texture handle, e.g. after the backend lost its
    /// context. Textures reload or regenerate on next use.
    pub fn release_all_textures(&self) {
        log::debug!(target: "renderer", "{} releasing all textures", self.id());
        self.with_inner(Inner::release_all_textures);
    }

    /// Release every compiled geometry handle. Geometry recompiles on next use.
    pub fn release_all_compiled_geometry(&self) {
        log::debug!(target: "renderer", "{} releasing all compiled geometry", self.id());
        self.with_inner(Inner::release_all_compiled_geometry);
    }

    /// Resolved sources of every file texture known to the manager.
    pub fn texture_source_list(&self) -> Vec<String> {
        self.inner().file_textures.sources()
    }

    /// Current live resource counts.
    pub fn statistics(&self) -> RenderStatistics {
        self.inner().statistics()
    }

    pub(crate) fn render_geometry(
        &self,
        geometry: &Geometry,
        translation: Vector2f,
        texture: &Texture,
        shader: Option<&CompiledShader>,
    ) {
        if !geometry.is_valid() {
            return;
        }
        if !geometry.belongs_to(self) {
            self.usage_error(format_args!(
                "geometry from {} rendered by {}",
                geometry.manager_id(),
                self.id()
            ));
            return;
        }

        let shader = match shader {
            Some(shader) if shader.is_valid() => {
                if !shader.belongs_to(self) {
                    self.usage_error(format_args!(
                        "shader from {} used by {}",
                        shader.0.manager_id(),
                        self.id()
                    ));
                    return;
                }
                Some(shader.0.handle())
            }
            _ => None,
        };

        // May run a texture callback, so it happens before the state borrow.
        let texture = if texture.is_empty() {
            TextureHandle::INVALID
        } else {
            self.texture_handle(texture)
        };

        self.with_inner(|inner| {
            let Some(compiled) = inner.compiled_geometry(geometry.key()) else {
                return;
            };
            let translation = translation.round();
            match shader {
                Some(shader) => inner
                    .backend
                    .render_shader(shader, compiled, translation, texture),
                None => inner.backend.render_geometry(compiled, translation, texture),
            }
        });
    }

    pub(crate) fn release_geometry(&self, key: GeometryKey, mode: ReleaseMode) -> Mesh {
        self.with_inner(|inner| {
            let live = inner
                .geometry
                .get(key.index)
                .is_some_and(|record| record.version == key.version);
            if !live {
                inner.report_usage_error(format_args!("release of unknown geometry {key:?}"));
                return Mesh::new();
            }
            let Some(record) = inner.geometry.erase(key.index) else {
                return Mesh::new();
            };
            if record.compiled.is_valid() {
                inner.backend.release_geometry(record.compiled);
            }
            match mode {
                ReleaseMode::ReturnMesh => record.mesh,
                ReleaseMode::ClearMesh => Mesh::new(),
            }
        })
    }

    pub(crate) fn texture_handle(&self, texture: &Texture) -> TextureHandle {
        self.resolve_texture(texture).handle
    }

    pub(crate) fn texture_dimensions(&self, texture: &Texture) -> Vector2i {
        self.resolve_texture(texture).dimensions
    }

    fn resolve_texture(&self, texture: &Texture) -> LoadedTexture {
        const NOTHING: LoadedTexture = LoadedTexture {
            handle: TextureHandle::INVALID,
            dimensions: Vector2i::ZERO,
        };

        if texture.is_empty() {
            return NOTHING;
        }
        if !texture.belongs_to(self) {
            self.usage_error(format_args!(
                "texture from {} used by {}",
                texture.manager_id(),
                self.id()
            ));
            return NOTHING;
        }

        match texture.source() {
            TextureSource::None => NOTHING,
            TextureSource::File(index) => self.with_inner(|inner| {
                let (handle, dimensions) = inner
                    .file_textures
                    .ensure_loaded(inner.backend.as_mut(), index);
                LoadedTexture { handle, dimensions }
            }),
            TextureSource::Callback(key) => self
                .materialize_callback_texture(key)
                .unwrap_or(NOTHING),
        }
    }

    /// Backend texture of a callback texture, running its callback if it has none.
    fn materialize_callback_texture(&self, key: CallbackTextureKey) -> Option<LoadedTexture> {
        let step = self.with_inner(|inner| inner.callback_textures.begin_load(key));
        let mut callback = match step {
            LoadStep::Ready(handle, dimensions) => {
                return handle.is_valid().then_some(LoadedTexture { handle, dimensions });
            }
            LoadStep::Missing => {
                log::debug!(target: "renderer", "callback texture {key} was released; drawing untextured");
                return None;
            }
            LoadStep::Busy => {
                log::warn!(target: "renderer", "callback texture {key} requested while it is being generated");
                return None;
            }
            LoadStep::Run(callback) => callback,
        };

        let _span = tracing::info_span!("renderer.callback_texture", texture = %key).entered();
        let mut handle = TextureHandle::INVALID;
        let mut dimensions = Vector2i::ZERO;
        let result = callback(&mut CallbackTextureInterface::new(self, &mut handle, &mut dimensions));

        let loaded = match result {
            Ok(()) if handle.is_valid() => {
                log::debug!(
                    target: "renderer",
                    "generated callback texture {key} ({}x{})",
                    dimensions.x,
                    dimensions.y
                );
                Some(LoadedTexture { handle, dimensions })
            }
            Ok(()) => {
                log::error!(target: "renderer", "callback texture {key} produced no texture");
                None
            }
            Err(err) => {
                log::error!(target: "renderer", "callback texture {key} failed: {err:#}");
                if handle.is_valid() {
                    self.with_inner(|inner| inner.backend.release_texture(handle));
                }
                None
            }
        };

        let orphan = self.with_inner(|inner| inner.callback_textures.finish_load(key, callback, loaded));
        if let Some(callback) = orphan {
            if let Some(texture) = loaded {
                self.with_inner(|inner| inner.backend.release_texture(texture.handle));
            }
            drop(callback);
            return None;
        }
        loaded
    }

    pub(crate) fn release_callback_texture(&self, key: CallbackTextureKey) {
        let removed = self.with_inner(|inner| {
            inner
                .callback_textures
                .remove(inner.backend.as_mut(), key)
        });
        match removed {
            Some(callback) => drop(callback),
            None => self.usage_error(format_args!("release of unknown callback texture {key}")),
        }
    }

    pub(crate) fn release_filter(&self, handle: CompiledFilterHandle) {
        self.with_inner(|inner| {
            inner.backend.release_filter(handle);
            inner.live_filters = inner.live_filters.saturating_sub(1);
        });
    }

    pub(crate) fn release_shader(&self, handle: CompiledShaderHandle) {
        self.with_inner(|inner| {
            inner.backend.release_shader(handle);
            inner.live_shaders = inner.live_shaders.saturating_sub(1);
        });
    }

    pub(crate) fn generate_backend_texture(&self, pixels: &[u8], dimensions: Vector2i) -> TextureHandle {
        self.with_inner(|inner| inner.backend.generate_texture(pixels, dimensions))
    }

    pub(crate) fn save_backend_layer_as_texture(&self) -> TextureHandle {
        self.with_inner(|inner| inner.backend.save_layer_as_texture())
    }
}

impl fmt::Debug for RenderManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = formatter.debug_struct("RenderManager");
        debug.field("id", &self.id());
        if let Ok(inner) = self.shared.inner.try_borrow() {
            debug
                .field("viewport", &inner.viewport)
                .field("statistics", &inner.statistics());
        }
        debug.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{BackendCall, RecordingBackend};

    fn quiet() -> RenderConfig {
        RenderConfig::new(false, true, 4)
    }

    #[test]
    fn managers_get_distinct_ids() {
        let first = RenderManager::new(RecordingBackend::new());
        let second = RenderManager::new(RecordingBackend::new());
        assert_ne!(first.id(), second.id());
        assert_ne!(first.id(), ManagerId::NONE);
    }

    #[test]
    fn geometry_versions_differ_on_slot_reuse() {
        let manager = RenderManager::new(RecordingBackend::new());
        let mut first = manager.make_geometry(Mesh::new());
        let old_key = first.key();
        first.release(ReleaseMode::ClearMesh);
        let second = manager.make_geometry(Mesh::new());
        assert_eq!(second.key().index, old_key.index);
        assert_ne!(second.key(), old_key);
    }

    #[test]
    fn usage_errors_are_counted() {
        let manager = RenderManager::with_config(RecordingBackend::new(), quiet());
        manager.pop_layer();
        manager.next_layer();
        assert_eq!(manager.statistics().usage_errors, 2);
    }

    #[test]
    fn identity_transform_reaches_backend_as_none() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let manager = RenderManager::new(backend);
        let moved = Matrix4f::translate(5.0, 0.0, 0.0);
        manager.set_transform(Some(&moved));
        manager.set_transform(Some(&Matrix4f::IDENTITY));
        assert_eq!(
            log.calls(),
            vec![
                BackendCall::SetTransform(Some(moved)),
                BackendCall::SetTransform(None),
            ]
        );
    }

    #[test]
    fn scissor_is_clamped_to_viewport() {
        let manager = RenderManager::new(RecordingBackend::new());
        manager.prepare_render(Vector2i::new(100, 100));
        manager.set_scissor_region(Rectanglei::from_position_size(
            Vector2i::new(50, 50),
            Vector2i::new(100, 100),
        ));
        assert_eq!(
            manager.scissor_region(),
            Rectanglei::from_position_size(Vector2i::new(50, 50), Vector2i::new(50, 50))
        );
        manager.disable_scissor_region();
    }
}
