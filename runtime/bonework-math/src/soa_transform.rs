//! Packed transforms, four joints per group
//!
//! Pose buffers are slices of [`SoaTransform`]: joint `j` lives in group
//! `j / 4`, lane `j % 4`. The tail of the last group is padded with
//! [`Transform::IDENTITY`].

use crate::soa_float::SoaFloat3;
use crate::soa_quaternion::SoaQuaternion;
use crate::transform::Transform;
use glam::BVec4A;

/// Number of lanes in every SoA group
pub const SOA_WIDTH: usize = 4;

/// Number of SoA groups needed to hold `count` elements
#[inline]
pub const fn soa_count(count: usize) -> usize {
    count.div_ceil(SOA_WIDTH)
}

/// Four transforms stored component by component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaTransform {
    pub translation: SoaFloat3,
    pub rotation: SoaQuaternion,
    pub scale: SoaFloat3,
}

impl SoaTransform {
    /// Identity in every lane
    pub const IDENTITY: Self = Self {
        translation: SoaFloat3::ZERO,
        rotation: SoaQuaternion::IDENTITY,
        scale: SoaFloat3::ONE,
    };

    /// Replicate one transform into all four lanes
    pub fn splat(transform: &Transform) -> Self {
        Self {
            translation: SoaFloat3::splat(transform.translation),
            rotation: SoaQuaternion::splat(transform.rotation),
            scale: SoaFloat3::splat(transform.scale),
        }
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> Transform {
        Transform {
            translation: self.translation.lane(lane),
            rotation: self.rotation.lane(lane),
            scale: self.scale.lane(lane),
        }
    }

    #[inline]
    pub fn set_lane(&mut self, lane: usize, transform: &Transform) {
        self.translation.set_lane(lane, transform.translation);
        self.rotation.set_lane(lane, transform.rotation);
        self.scale.set_lane(lane, transform.scale);
    }

    /// Per-lane choice: lanes set in `mask` come from `if_true`
    #[inline]
    pub fn select(mask: BVec4A, if_true: &Self, if_false: &Self) -> Self {
        Self {
            translation: SoaFloat3::select(mask, &if_true.translation, &if_false.translation),
            rotation: SoaQuaternion::select(mask, &if_true.rotation, &if_false.rotation),
            scale: SoaFloat3::select(mask, &if_true.scale, &if_false.scale),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for SoaTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pack AoS transforms into SoA groups, padding the last group with identity
pub fn pack(transforms: &[Transform]) -> Vec<SoaTransform> {
    transforms
        .chunks(SOA_WIDTH)
        .map(|chunk| {
            let mut group = SoaTransform::IDENTITY;
            for (lane, transform) in chunk.iter().enumerate() {
                group.set_lane(lane, transform);
            }
            group
        })
        .collect()
}

/// Unpack the first `count` transforms of a SoA buffer
///
/// Stops early if `soa` holds fewer than `count` lanes.
pub fn unpack(soa: &[SoaTransform], count: usize) -> Vec<Transform> {
    soa.iter()
        .flat_map(|group| (0..SOA_WIDTH).map(move |lane| group.lane(lane)))
        .take(count)
        .collect()
}
