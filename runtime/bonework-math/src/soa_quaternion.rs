//! SoA quaternions with the lane-wise operations used by sampling and blending

use crate::soa_float::lerp_lanes;
use glam::{BVec4A, Quat, Vec4};
use std::ops::{Add, Mul, Neg};

/// Four quaternions, one per lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaQuaternion {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
    pub w: Vec4,
}

impl SoaQuaternion {
    /// Identity rotation in every lane
    pub const IDENTITY: Self = Self {
        x: Vec4::ZERO,
        y: Vec4::ZERO,
        z: Vec4::ZERO,
        w: Vec4::ONE,
    };

    pub const fn new(x: Vec4, y: Vec4, z: Vec4, w: Vec4) -> Self {
        Self { x, y, z, w }
    }

    pub fn splat(q: Quat) -> Self {
        Self {
            x: Vec4::splat(q.x),
            y: Vec4::splat(q.y),
            z: Vec4::splat(q.z),
            w: Vec4::splat(q.w),
        }
    }

    /// Pack four AoS quaternions
    pub fn from_lanes(lanes: [Quat; 4]) -> Self {
        Self {
            x: Vec4::new(lanes[0].x, lanes[1].x, lanes[2].x, lanes[3].x),
            y: Vec4::new(lanes[0].y, lanes[1].y, lanes[2].y, lanes[3].y),
            z: Vec4::new(lanes[0].z, lanes[1].z, lanes[2].z, lanes[3].z),
            w: Vec4::new(lanes[0].w, lanes[1].w, lanes[2].w, lanes[3].w),
        }
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> Quat {
        Quat::from_xyzw(self.x[lane], self.y[lane], self.z[lane], self.w[lane])
    }

    #[inline]
    pub fn set_lane(&mut self, lane: usize, q: Quat) {
        self.x[lane] = q.x;
        self.y[lane] = q.y;
        self.z[lane] = q.z;
        self.w[lane] = q.w;
    }

    pub fn to_lanes(&self) -> [Quat; 4] {
        [self.lane(0), self.lane(1), self.lane(2), self.lane(3)]
    }

    /// Per-lane 4D dot product
    #[inline]
    pub fn dot(&self, other: &Self) -> Vec4 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Per-lane normalization
    ///
    /// A zero-length lane becomes the identity rotation instead of NaN.
    #[inline]
    pub fn normalize(&self) -> Self {
        let len2 = self.dot(self);
        let valid = len2.cmpgt(Vec4::ZERO);
        let inv_len = len2.map(f32::sqrt).recip();
        let normalized = *self * inv_len;
        Self::select(valid, &normalized, &Self::IDENTITY)
    }

    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Per-lane choice: lanes set in `mask` come from `if_true`
    #[inline]
    pub fn select(mask: BVec4A, if_true: &Self, if_false: &Self) -> Self {
        Self {
            x: Vec4::select(mask, if_true.x, if_false.x),
            y: Vec4::select(mask, if_true.y, if_false.y),
            z: Vec4::select(mask, if_true.z, if_false.z),
            w: Vec4::select(mask, if_true.w, if_false.w),
        }
    }

    /// Negates the lanes of `self` whose dot product with `reference` is
    /// negative, so that both lie in the same hemisphere.
    #[inline]
    pub fn align_to(&self, reference: &Self) -> Self {
        let opposite = self.dot(reference).cmplt(Vec4::ZERO);
        Self::select(opposite, &-*self, self)
    }

    /// Normalized linear interpolation along the shortest path, per lane
    ///
    /// Lanes of `b` facing away from `a` are negated before interpolating,
    /// so `nlerp(q, -q, t)` is `q` for any `t`.
    #[inline]
    pub fn nlerp(a: &Self, b: &Self, alpha: Vec4) -> Self {
        let b = b.align_to(a);
        Self {
            x: lerp_lanes(a.x, b.x, alpha),
            y: lerp_lanes(a.y, b.y, alpha),
            z: lerp_lanes(a.z, b.z, alpha),
            w: lerp_lanes(a.w, b.w, alpha),
        }
        .normalize()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for SoaQuaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Add for SoaQuaternion {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }
}

/// Scales every component of each lane
impl Mul<Vec4> for SoaQuaternion {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Vec4) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

/// Hamilton product, lane by lane: `(a * b)` applies `b` then `a`
impl Mul for SoaQuaternion {
    type Output = Self;

    #[inline]
    fn mul(self, b: Self) -> Self {
        let a = self;
        Self {
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        }
    }
}

impl Neg for SoaQuaternion {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_2;

    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-5
    }

    #[test]
    fn test_identity_lanes() {
        for q in SoaQuaternion::IDENTITY.to_lanes() {
            assert_eq!(q, Quat::IDENTITY);
        }
    }

    #[test]
    fn test_normalize_zero_lane_is_identity() {
        let q = SoaQuaternion::from_lanes([
            Quat::from_xyzw(0.0, 0.0, 0.0, 2.0),
            Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
            Quat::from_xyzw(3.0, 0.0, 4.0, 0.0),
            Quat::from_rotation_x(0.3),
        ])
        .normalize();

        assert!((q.lane(0).w - 1.0).abs() < 1e-6);
        assert_eq!(q.lane(1), Quat::IDENTITY);
        assert!((q.lane(2).x - 0.6).abs() < 1e-6);
        assert!((q.lane(2).z - 0.8).abs() < 1e-6);
        assert!(q.is_finite());
    }

    #[test]
    fn test_hamilton_product_matches_glam() {
        let a = [
            Quat::from_rotation_x(0.5),
            Quat::from_rotation_y(-1.2),
            Quat::from_rotation_z(2.0),
            Quat::from_rotation_x(0.1) * Quat::from_rotation_y(0.7),
        ];
        let b = [
            Quat::from_rotation_z(0.3),
            Quat::from_rotation_x(FRAC_PI_2),
            Quat::IDENTITY,
            Quat::from_rotation_y(-0.4),
        ];
        let product = SoaQuaternion::from_lanes(a) * SoaQuaternion::from_lanes(b);
        for lane in 0..4 {
            assert!(product.lane(lane).abs_diff_eq(a[lane] * b[lane], 1e-6));
        }
    }

    #[test]
    fn test_conjugate_undoes_rotation() {
        let q = SoaQuaternion::splat(Quat::from_rotation_y(1.1));
        let r = q.conjugate() * q;
        for lane in r.to_lanes() {
            assert!(lane.abs_diff_eq(Quat::IDENTITY, 1e-6));
        }
    }

    #[test]
    fn test_nlerp_endpoints() {
        let a = SoaQuaternion::splat(Quat::from_rotation_z(0.2));
        let b = SoaQuaternion::splat(Quat::from_rotation_z(1.4));
        let start = SoaQuaternion::nlerp(&a, &b, Vec4::ZERO);
        let end = SoaQuaternion::nlerp(&a, &b, Vec4::ONE);
        assert!(start.lane(0).abs_diff_eq(a.lane(0), 1e-6));
        assert!(end.lane(3).abs_diff_eq(b.lane(3), 1e-6));
    }

    #[test]
    fn test_nlerp_takes_shortest_path() {
        let a = Quat::from_rotation_z(0.1);
        // Same rotation as 0.5 rad around z, opposite hemisphere
        let b = -Quat::from_rotation_z(0.5);
        let r = SoaQuaternion::nlerp(
            &SoaQuaternion::splat(a),
            &SoaQuaternion::splat(b),
            Vec4::splat(0.5),
        );
        assert!(same_rotation(r.lane(0), Quat::from_rotation_z(0.3)));
    }

    proptest! {
        #[test]
        fn prop_nlerp_with_negation_is_identity_op(
            axis_angle in (-1.0f32..1.0, -1.0f32..1.0, 0.1f32..1.0, -3.0f32..3.0),
            t in 0.0f32..=1.0,
        ) {
            let (x, y, z, angle) = axis_angle;
            let q = Quat::from_axis_angle(glam::Vec3::new(x, y, z).normalize(), angle);
            let a = SoaQuaternion::splat(q);
            let r = SoaQuaternion::nlerp(&a, &-a, Vec4::splat(t));
            for lane in r.to_lanes() {
                prop_assert!(lane.abs_diff_eq(q, 1e-5));
            }
        }
    }
}
