//! SoA 4x4 matrices
//!
//! Column-major, like `glam::Mat4`. Built from SoA translation, rotation and
//! scale in one pass, then transposed out into four AoS matrices.

use crate::soa_float::{SoaFloat3, SoaFloat4};
use crate::soa_quaternion::SoaQuaternion;
use glam::{Mat4, Vec4};

/// Four 4x4 matrices, one per lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaFloat4x4 {
    pub cols: [SoaFloat4; 4],
}

impl SoaFloat4x4 {
    pub const IDENTITY: Self = Self {
        cols: [
            SoaFloat4::new(Vec4::ONE, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO),
            SoaFloat4::new(Vec4::ZERO, Vec4::ONE, Vec4::ZERO, Vec4::ZERO),
            SoaFloat4::new(Vec4::ZERO, Vec4::ZERO, Vec4::ONE, Vec4::ZERO),
            SoaFloat4::new(Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::ONE),
        ],
    };

    /// Scale, then rotate, then translate, per lane
    ///
    /// Same convention as `Mat4::from_scale_rotation_translation`. The
    /// rotation is expected to be normalized.
    pub fn from_affine(
        translation: &SoaFloat3,
        rotation: &SoaQuaternion,
        scale: &SoaFloat3,
    ) -> Self {
        let SoaQuaternion { x, y, z, w } = *rotation;

        let x2 = x + x;
        let y2 = y + y;
        let z2 = z + z;

        let xx = x * x2;
        let xy = x * y2;
        let xz = x * z2;
        let yy = y * y2;
        let yz = y * z2;
        let zz = z * z2;
        let wx = w * x2;
        let wy = w * y2;
        let wz = w * z2;

        let sx = scale.x;
        let sy = scale.y;
        let sz = scale.z;

        Self {
            cols: [
                SoaFloat4::new(
                    (Vec4::ONE - (yy + zz)) * sx,
                    (xy + wz) * sx,
                    (xz - wy) * sx,
                    Vec4::ZERO,
                ),
                SoaFloat4::new(
                    (xy - wz) * sy,
                    (Vec4::ONE - (xx + zz)) * sy,
                    (yz + wx) * sy,
                    Vec4::ZERO,
                ),
                SoaFloat4::new(
                    (xz + wy) * sz,
                    (yz - wx) * sz,
                    (Vec4::ONE - (xx + yy)) * sz,
                    Vec4::ZERO,
                ),
                SoaFloat4::new(translation.x, translation.y, translation.z, Vec4::ONE),
            ],
        }
    }

    /// Extract lane `lane` as an AoS matrix
    #[inline]
    pub fn lane(&self, lane: usize) -> Mat4 {
        Mat4::from_cols(
            self.cols[0].lane(lane),
            self.cols[1].lane(lane),
            self.cols[2].lane(lane),
            self.cols[3].lane(lane),
        )
    }

    /// Transpose out all four lanes
    pub fn to_lanes(&self) -> [Mat4; 4] {
        [self.lane(0), self.lane(1), self.lane(2), self.lane(3)]
    }
}

impl Default for SoaFloat4x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}
