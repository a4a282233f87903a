//! Vertex and mesh data handed to the backend for compilation.

use crate::math::{ColourbPremultiplied, Vector2f};
use bytemuck::{Pod, Zeroable};

/// A single vertex as the backend receives it.
///
/// The layout is `#[repr(C)]` so backends can upload `bytemuck::cast_slice(&vertices)`
/// without a conversion pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in device-independent pixels, relative to the render translation.
    pub position: [f32; 2],
    /// Premultiplied RGBA colour.
    pub colour: [u8; 4],
    /// Texture coordinate in `0.0..=1.0`.
    pub tex_coord: [f32; 2],
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vector2f, colour: ColourbPremultiplied, tex_coord: Vector2f) -> Self {
        Self {
            position: [position.x, position.y],
            colour: [colour.red, colour.green, colour.blue, colour.alpha],
            tex_coord: [tex_coord.x, tex_coord.y],
        }
    }
}

/// Triangle list: every three indices form one triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    #[inline]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// A mesh with nothing to draw never reaches the backend.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Mesh holding a single axis-aligned quad.
    pub fn quad(
        origin: Vector2f,
        size: Vector2f,
        colour: ColourbPremultiplied,
        top_left_uv: Vector2f,
        bottom_right_uv: Vector2f,
    ) -> Self {
        let mut mesh = Self::new();
        mesh.append_quad(origin, size, colour, top_left_uv, bottom_right_uv);
        mesh
    }

    /// Append a quad as two triangles, wound top-left, top-right, bottom-right, bottom-left.
    pub fn append_quad(
        &mut self,
        origin: Vector2f,
        size: Vector2f,
        colour: ColourbPremultiplied,
        top_left_uv: Vector2f,
        bottom_right_uv: Vector2f,
    ) {
        let base = self.vertices.len() as u32;
        let far = origin + size;

        self.vertices.extend_from_slice(&[
            Vertex::new(origin, colour, top_left_uv),
            Vertex::new(
                Vector2f::new(far.x, origin.y),
                colour,
                Vector2f::new(bottom_right_uv.x, top_left_uv.y),
            ),
            Vertex::new(far, colour, bottom_right_uv),
            Vertex::new(
                Vector2f::new(origin.x, far.y),
                colour,
                Vector2f::new(top_left_uv.x, bottom_right_uv.y),
            ),
        ]);
        self.indices
            .extend_from_slice(&[base, base + 3, base + 1, base + 1, base + 3, base + 2]);
    }
}
