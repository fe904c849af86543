//! Blending of local poses
//!
//! [`BlendingJob`] mixes N sampled local poses into one. Base layers are
//! averaged by weight; a joint whose accumulated weight falls below the
//! threshold takes the bind pose instead. Additive layers are then applied
//! on top of the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::{BlendingJob, BlendingLayer};
//!
//! let layers = [
//!     BlendingLayer::new(&walk_pose, 0.7),
//!     BlendingLayer::new(&run_pose, 0.3),
//! ];
//! let additive = [BlendingLayer::new(&breathe_pose, 1.0)];
//! BlendingJob::new(&layers, skeleton.bind_pose(), &mut blended)
//!     .with_additive_layers(&additive)
//!     .run()?;
//! ```

use crate::error::{AnimError, Result};
use bonework_math::{SoaFloat3, SoaQuaternion, SoaTransform};
use glam::Vec4;

/// Default accumulated weight below which the bind pose is used
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// One input pose and its weight
#[derive(Debug, Clone, Copy)]
pub struct BlendingLayer<'a> {
    /// Local pose in SoA groups
    pub transform: &'a [SoaTransform],
    /// Layer weight. Base layers with a weight of zero or less are skipped.
    /// Additive layers with a negative weight are subtracted.
    pub weight: f32,
    /// Optional per-joint weights, one lane per joint. Negative values
    /// count as zero.
    pub joint_weights: Option<&'a [Vec4]>,
}

impl<'a> BlendingLayer<'a> {
    pub fn new(transform: &'a [SoaTransform], weight: f32) -> Self {
        Self {
            transform,
            weight,
            joint_weights: None,
        }
    }

    pub fn with_joint_weights(mut self, joint_weights: &'a [Vec4]) -> Self {
        self.joint_weights = Some(joint_weights);
        self
    }

    /// Per-lane weight of this layer for `group`, clamped at zero
    #[inline]
    fn lane_weights(&self, weight: f32, group: usize) -> Vec4 {
        let weight = Vec4::splat(weight);
        match self.joint_weights {
            Some(joint_weights) => weight * joint_weights[group].max(Vec4::ZERO),
            None => weight,
        }
    }
}

/// Blends layers into `output`
pub struct BlendingJob<'a> {
    /// Accumulated weight under which a joint falls back to the bind pose
    pub threshold: f32,
    pub layers: &'a [BlendingLayer<'a>],
    pub additive_layers: &'a [BlendingLayer<'a>],
    /// Skeleton bind pose; its length sets the number of groups blended
    pub bind_pose: &'a [SoaTransform],
    pub output: &'a mut [SoaTransform],
}

impl<'a> BlendingJob<'a> {
    pub fn new(
        layers: &'a [BlendingLayer<'a>],
        bind_pose: &'a [SoaTransform],
        output: &'a mut [SoaTransform],
    ) -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            layers,
            additive_layers: &[],
            bind_pose,
            output,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_additive_layers(mut self, additive_layers: &'a [BlendingLayer<'a>]) -> Self {
        self.additive_layers = additive_layers;
        self
    }

    /// Check the job can run without touching any buffer
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(AnimError::InvalidThreshold(self.threshold));
        }
        if self.layers.is_empty() {
            return Err(AnimError::NoLayers);
        }

        let required = self.bind_pose.len();
        check_len("Output", required, self.output.len())?;
        let all_layers = self.layers.iter().chain(self.additive_layers.iter());
        for (index, layer) in all_layers.enumerate() {
            if !layer.weight.is_finite() {
                return Err(AnimError::NonFiniteWeight {
                    layer: index,
                    weight: layer.weight,
                });
            }
            check_len("Layer", required, layer.transform.len())?;
            if let Some(joint_weights) = layer.joint_weights {
                check_len("Joint weight", required, joint_weights.len())?;
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if let Err(err) = self.validate() {
            log::debug!("Blending job rejected: {}", err);
            return Err(err);
        }

        let threshold = Vec4::splat(self.threshold);
        for (group, out) in self.output[..self.bind_pose.len()].iter_mut().enumerate() {
            let blended = blend_group(self.layers, group);
            *out = finish_group(&blended, threshold, &self.bind_pose[group]);
            for layer in self.additive_layers {
                apply_additive(layer, group, out);
            }
        }
        Ok(())
    }
}

fn check_len(buffer: &'static str, required: usize, actual: usize) -> Result<()> {
    if actual < required {
        return Err(AnimError::BufferTooSmall {
            buffer,
            required,
            actual,
        });
    }
    Ok(())
}

/// Weighted sums of one group, before normalization
struct Accumulator {
    translation: SoaFloat3,
    rotation: SoaQuaternion,
    scale: SoaFloat3,
    weight: Vec4,
}

fn blend_group(layers: &[BlendingLayer<'_>], group: usize) -> Accumulator {
    let mut acc = Accumulator {
        translation: SoaFloat3::ZERO,
        rotation: SoaQuaternion::new(Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO),
        scale: SoaFloat3::ZERO,
        weight: Vec4::ZERO,
    };

    for layer in layers.iter().filter(|layer| layer.weight > 0.0) {
        let weight = layer.lane_weights(layer.weight, group);
        let input = &layer.transform[group];

        acc.translation = acc.translation + input.translation * weight;
        acc.scale = acc.scale + input.scale * weight;
        // Rotations are summed and normalized once in `finish_group`. Every
        // contribution is kept in the accumulator's hemisphere.
        let rotation = input.rotation.align_to(&acc.rotation);
        acc.rotation = acc.rotation + rotation * weight;
        acc.weight += weight;
    }
    acc
}

/// Normalize the weighted sums, or take the bind pose where the
/// accumulated weight is under `threshold`
fn finish_group(acc: &Accumulator, threshold: Vec4, bind_pose: &SoaTransform) -> SoaTransform {
    let blended_lanes = acc.weight.cmpge(threshold);
    let inv_weight = Vec4::select(blended_lanes, acc.weight, Vec4::ONE).recip();
    let blended = SoaTransform {
        translation: acc.translation * inv_weight,
        rotation: acc.rotation.normalize(),
        scale: acc.scale * inv_weight,
    };
    SoaTransform::select(blended_lanes, &blended, bind_pose)
}

fn apply_additive(layer: &BlendingLayer<'_>, group: usize, out: &mut SoaTransform) {
    if layer.weight == 0.0 {
        return;
    }
    let subtract = layer.weight < 0.0;
    let weight = layer.lane_weights(layer.weight.abs(), group);
    let input = &layer.transform[group];

    let rotation = SoaQuaternion::nlerp(&SoaQuaternion::IDENTITY, &input.rotation, weight);
    let scale = SoaFloat3::lerp(&SoaFloat3::ONE, &input.scale, weight);
    let translation = input.translation * weight;

    if subtract {
        out.translation = out.translation - translation;
        out.rotation = rotation.conjugate() * out.rotation;
        out.scale = out.scale / scale;
    } else {
        out.translation = out.translation + translation;
        out.rotation = rotation * out.rotation;
        out.scale = out.scale * scale;
    }
}
