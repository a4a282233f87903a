//! File texture cache: one entry per resolved source path, loaded lazily.

use crate::backend::{RenderHandle as _, RenderInterface, TextureHandle};
use crate::math::Vector2i;
use std::collections::HashMap;

/// Index of an entry in the [`FileTextureCache`]. Entries are never removed, so an
/// index stays valid for the lifetime of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TextureFileIndex(u32);

#[derive(Debug)]
struct FileTextureEntry {
    source: String,
    handle: TextureHandle,
    dimensions: Vector2i,
    /// Set after the backend refused the source, so it is not asked again every frame.
    load_failed: bool,
}

impl FileTextureEntry {
    fn unload(&mut self) {
        self.handle = TextureHandle::INVALID;
        self.dimensions = Vector2i::ZERO;
        self.load_failed = false;
    }
}

#[derive(Debug, Default)]
pub(crate) struct FileTextureCache {
    entries: Vec<FileTextureEntry>,
    by_source: HashMap<String, TextureFileIndex>,
}

impl FileTextureCache {
    /// Find or create the entry for `source` without loading anything.
    pub(crate) fn insert(&mut self, source: &str) -> TextureFileIndex {
        if let Some(index) = self.by_source.get(source) {
            log::trace!(target: "renderer", "file texture cache hit: {source}");
            return *index;
        }

        let index = TextureFileIndex(self.entries.len() as u32);
        self.entries.push(FileTextureEntry {
            source: source.to_owned(),
            handle: TextureHandle::INVALID,
            dimensions: Vector2i::ZERO,
            load_failed: false,
        });
        self.by_source.insert(source.to_owned(), index);
        index
    }

    /// Backend handle and dimensions for `index`, loading the texture on first use.
    pub(crate) fn ensure_loaded(
        &mut self,
        backend: &mut dyn RenderInterface,
        index: TextureFileIndex,
    ) -> (TextureHandle, Vector2i) {
        let Some(entry) = self.entries.get_mut(index.0 as usize) else {
            log::error!(target: "renderer", "file texture index {index:?} is out of range");
            return (TextureHandle::INVALID, Vector2i::ZERO);
        };

        if !entry.handle.is_valid() && !entry.load_failed {
            if let Some(loaded) = backend.load_texture(&entry.source).filter(|loaded| loaded.handle.is_valid()) {
                log::debug!(
                    target: "renderer",
                    "loaded texture {} ({}x{})",
                    entry.source, loaded.dimensions.x, loaded.dimensions.y
                );
                entry.handle = loaded.handle;
                entry.dimensions = loaded.dimensions;
            } else {
                log::warn!(target: "renderer", "could not load texture: {}", entry.source);
                entry.load_failed = true;
            }
        }

        (entry.handle, entry.dimensions)
    }

    /// Release the backend texture for `source`. Views of it reload on next use.
    ///
    /// Returns whether a backend texture was released.
    pub(crate) fn release(&mut self, backend: &mut dyn RenderInterface, source: &str) -> bool {
        let Some(index) = self.by_source.get(source) else {
            return false;
        };
        let entry = &mut self.entries[index.0 as usize];
        let had_handle = entry.handle.is_valid();
        if had_handle {
            backend.release_texture(entry.handle);
        }
        entry.unload();
        had_handle
    }

    pub(crate) fn release_all(&mut self, backend: &mut dyn RenderInterface) {
        for entry in &mut self.entries {
            if entry.handle.is_valid() {
                backend.release_texture(entry.handle);
            }
            entry.unload();
        }
    }

    pub(crate) fn sources(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.source.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn loaded_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.handle.is_valid())
            .count()
    }
}
