//! SoA vectors: four 3D or 4D vectors stored component by component

use glam::{BVec4A, Vec3, Vec4};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Per-lane linear interpolation between `a` and `b`
///
/// Written as `a * (1 - t) + b * t` so that `t == 0` returns `a` and
/// `t == 1` returns `b` exactly, with no drift at clip boundaries.
#[inline]
pub fn lerp_lanes(a: Vec4, b: Vec4, t: Vec4) -> Vec4 {
    a * (Vec4::ONE - t) + b * t
}

/// Four 3D vectors, one per lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaFloat3 {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
}

impl SoaFloat3 {
    /// All lanes (0, 0, 0)
    pub const ZERO: Self = Self {
        x: Vec4::ZERO,
        y: Vec4::ZERO,
        z: Vec4::ZERO,
    };

    /// All lanes (1, 1, 1)
    pub const ONE: Self = Self {
        x: Vec4::ONE,
        y: Vec4::ONE,
        z: Vec4::ONE,
    };

    pub const fn new(x: Vec4, y: Vec4, z: Vec4) -> Self {
        Self { x, y, z }
    }

    /// Replicate one vector into all four lanes
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: Vec4::splat(v.x),
            y: Vec4::splat(v.y),
            z: Vec4::splat(v.z),
        }
    }

    /// Pack four AoS vectors
    pub fn from_lanes(lanes: [Vec3; 4]) -> Self {
        Self {
            x: Vec4::new(lanes[0].x, lanes[1].x, lanes[2].x, lanes[3].x),
            y: Vec4::new(lanes[0].y, lanes[1].y, lanes[2].y, lanes[3].y),
            z: Vec4::new(lanes[0].z, lanes[1].z, lanes[2].z, lanes[3].z),
        }
    }

    /// Extract lane `lane` (0..4)
    #[inline]
    pub fn lane(&self, lane: usize) -> Vec3 {
        Vec3::new(self.x[lane], self.y[lane], self.z[lane])
    }

    #[inline]
    pub fn set_lane(&mut self, lane: usize, v: Vec3) {
        self.x[lane] = v.x;
        self.y[lane] = v.y;
        self.z[lane] = v.z;
    }

    /// Unpack all four lanes
    pub fn to_lanes(&self) -> [Vec3; 4] {
        [self.lane(0), self.lane(1), self.lane(2), self.lane(3)]
    }

    /// Per-lane linear interpolation
    #[inline]
    pub fn lerp(a: &Self, b: &Self, alpha: Vec4) -> Self {
        Self {
            x: lerp_lanes(a.x, b.x, alpha),
            y: lerp_lanes(a.y, b.y, alpha),
            z: lerp_lanes(a.z, b.z, alpha),
        }
    }

    /// Per-lane dot product
    #[inline]
    pub fn dot(&self, other: &Self) -> Vec4 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Per-lane choice: lanes set in `mask` come from `if_true`
    #[inline]
    pub fn select(mask: BVec4A, if_true: &Self, if_false: &Self) -> Self {
        Self {
            x: Vec4::select(mask, if_true.x, if_false.x),
            y: Vec4::select(mask, if_true.y, if_false.y),
            z: Vec4::select(mask, if_true.z, if_false.z),
        }
    }

    /// Returns true if every component of every lane is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for SoaFloat3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Component-wise product
impl Mul for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

/// Scales each lane by the matching lane of `rhs`
impl Mul<Vec4> for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Vec4) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Component-wise quotient
impl Div for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }
}

impl Div<Vec4> for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Vec4) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for SoaFloat3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Four 4D vectors, one per lane. Used as a matrix column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaFloat4 {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
    pub w: Vec4,
}

impl SoaFloat4 {
    pub const fn new(x: Vec4, y: Vec4, z: Vec4, w: Vec4) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> Vec4 {
        Vec4::new(self.x[lane], self.y[lane], self.z[lane], self.w[lane])
    }
}
