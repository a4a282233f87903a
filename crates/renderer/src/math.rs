//! Small value types shared by the render manager and the backend interface.
//!
//! Geometry positions are in device-independent pixels, scissor regions in
//! integer framebuffer pixels. Matrices are column-major.

use core::ops::{Add, Mul, Sub};
use serde::{Deserialize, Serialize};

/// 2D vector of `f32` components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

impl Vector2f {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Round both components to the nearest whole pixel.
    #[inline]
    #[must_use]
    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }
}

impl Add for Vector2f {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2f {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 2D vector of `i32` components, used for pixel dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector2i {
    pub x: i32,
    pub y: i32,
}

impl Vector2i {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a new vector.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Number of pixels covered by these dimensions, zero if either axis is negative.
    #[inline]
    pub fn area(self) -> usize {
        let width = usize::try_from(self.x).unwrap_or(0);
        let height = usize::try_from(self.y).unwrap_or(0);
        width * height
    }
}

/// Integer rectangle described by its top-left `p0` and bottom-right `p1` corners.
///
/// A rectangle whose `p1` lies above or left of `p0` is invalid; the render
/// manager uses an invalid rectangle to mean "scissoring disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectanglei {
    pub p0: Vector2i,
    pub p1: Vector2i,
}

impl Rectanglei {
    /// A rectangle for which [`Rectanglei::is_valid`] returns false.
    #[inline]
    pub const fn make_invalid() -> Self {
        Self {
            p0: Vector2i::new(i32::MAX, i32::MAX),
            p1: Vector2i::new(i32::MIN, i32::MIN),
        }
    }

    /// Rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(size: Vector2i) -> Self {
        Self {
            p0: Vector2i::ZERO,
            p1: size,
        }
    }

    /// Rectangle at `position` with the given size.
    #[inline]
    pub const fn from_position_size(position: Vector2i, size: Vector2i) -> Self {
        Self {
            p0: position,
            p1: Vector2i::new(position.x + size.x, position.y + size.y),
        }
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.p0.x <= self.p1.x && self.p0.y <= self.p1.y
    }

    #[inline]
    pub const fn left(&self) -> i32 {
        self.p0.x
    }

    #[inline]
    pub const fn top(&self) -> i32 {
        self.p0.y
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.p1.x - self.p0.x
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.p1.y - self.p0.y
    }

    #[inline]
    pub const fn size(&self) -> Vector2i {
        Vector2i::new(self.width(), self.height())
    }

    /// Intersect with `other`.
    ///
    /// Disjoint rectangles collapse to a zero-area rectangle at the clamped
    /// corner rather than becoming invalid, so an enabled scissor stays enabled.
    #[inline]
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let p0 = Vector2i::new(self.p0.x.max(other.p0.x), self.p0.y.max(other.p0.y));
        let p1 = Vector2i::new(
            self.p1.x.min(other.p1.x).max(p0.x),
            self.p1.y.min(other.p1.y).max(p0.y),
        );
        Self { p0, p1 }
    }
}

impl Default for Rectanglei {
    #[inline]
    fn default() -> Self {
        Self::make_invalid()
    }
}

/// 4x4 transform matrix in column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4f {
    pub columns: [[f32; 4]; 4],
}

impl Matrix4f {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Translation by `(x, y, z)`.
    #[inline]
    pub const fn translate(x: f32, y: f32, z: f32) -> Self {
        let mut matrix = Self::IDENTITY;
        matrix.columns[3] = [x, y, z, 1.0];
        matrix
    }

    /// Non-uniform scale.
    #[inline]
    pub const fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        let mut matrix = Self::IDENTITY;
        matrix.columns[0][0] = sx;
        matrix.columns[1][1] = sy;
        matrix.columns[2][2] = sz;
        matrix
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Flatten into 16 column-major floats, the layout most GPU APIs expect.
    #[inline]
    pub const fn to_cols_array(&self) -> [f32; 16] {
        let cols = &self.columns;
        [
            cols[0][0], cols[0][1], cols[0][2], cols[0][3], cols[1][0], cols[1][1], cols[1][2],
            cols[1][3], cols[2][0], cols[2][1], cols[2][2], cols[2][3], cols[3][0], cols[3][1],
            cols[3][2], cols[3][3],
        ]
    }
}

impl Default for Matrix4f {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix4f {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0_f32; 4]; 4];
        for (col, out_col) in out.iter_mut().enumerate() {
            for (row, cell) in out_col.iter_mut().enumerate() {
                *cell = (0..4)
                    .map(|inner| self.columns[inner][row] * rhs.columns[col][inner])
                    .sum();
            }
        }
        Self { columns: out }
    }
}

/// 8-bit RGBA colour with premultiplied alpha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColourbPremultiplied {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl ColourbPremultiplied {
    #[inline]
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
}
