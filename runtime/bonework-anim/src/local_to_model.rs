//! Local-to-model propagation
//!
//! Concatenates local joint transforms down the hierarchy. Because parents
//! always precede their children, one forward pass over the joint indices is
//! enough.

use crate::error::{AnimError, Result};
use crate::skeleton::{NO_PARENT, Skeleton};
use bonework_math::{SOA_WIDTH, SoaFloat4x4, SoaTransform, soa_count};
use glam::Mat4;

/// Computes model-space matrices from a local pose
///
/// `from` and `to` (inclusive) restrict the update to a joint range. When
/// starting past joint 0, the model matrices of every parent outside the
/// range must already be up to date in `output`; this is not checked.
pub struct LocalToModelJob<'a> {
    pub skeleton: &'a Skeleton,
    /// Local pose in SoA groups
    pub input: &'a [SoaTransform],
    /// One matrix per joint
    pub output: &'a mut [Mat4],
    /// Transform applied to root joints, identity if `None`
    pub root: Option<Mat4>,
    /// First joint to update
    pub from: usize,
    /// Last joint to update, clamped to the last joint. `None` for all.
    pub to: Option<usize>,
}

impl<'a> LocalToModelJob<'a> {
    pub fn new(skeleton: &'a Skeleton, input: &'a [SoaTransform], output: &'a mut [Mat4]) -> Self {
        Self {
            skeleton,
            input,
            output,
            root: None,
            from: 0,
            to: None,
        }
    }

    pub fn with_root(mut self, root: Mat4) -> Self {
        self.root = Some(root);
        self
    }

    /// Restrict the update to joints `from..=to`
    pub fn with_range(mut self, from: usize, to: usize) -> Self {
        self.from = from;
        self.to = Some(to);
        self
    }

    /// Inclusive joint range to update, `None` if the skeleton is empty
    fn range(&self) -> Option<(usize, usize)> {
        let last = self.skeleton.num_joints().checked_sub(1)?;
        Some((self.from, self.to.map_or(last, |to| to.min(last))))
    }

    /// Check the job can run without touching any buffer
    pub fn validate(&self) -> Result<()> {
        let Some((from, to)) = self.range() else {
            return Ok(());
        };
        if from > to {
            return Err(AnimError::InvalidRange { from, to });
        }

        let num_joints = self.skeleton.num_joints();
        if self.output.len() < num_joints {
            return Err(AnimError::BufferTooSmall {
                buffer: "Model matrix",
                required: num_joints,
                actual: self.output.len(),
            });
        }
        let required = soa_count(to + 1);
        if self.input.len() < required {
            return Err(AnimError::BufferTooSmall {
                buffer: "Local pose",
                required,
                actual: self.input.len(),
            });
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if let Err(err) = self.validate() {
            log::debug!("Local-to-model job rejected: {}", err);
            return Err(err);
        }
        let Some((from, to)) = self.range() else {
            return Ok(());
        };

        let root = self.root.unwrap_or(Mat4::IDENTITY);
        let parents = self.skeleton.joint_parents();

        for group in from / SOA_WIDTH..=to / SOA_WIDTH {
            let local = &self.input[group];
            let matrices =
                SoaFloat4x4::from_affine(&local.translation, &local.rotation, &local.scale)
                    .to_lanes();

            // Only lanes inside the range are written
            let base = group * SOA_WIDTH;
            for joint in base.max(from)..=(base + SOA_WIDTH - 1).min(to) {
                let local_matrix = matrices[joint - base];
                let parent = parents[joint];
                self.output[joint] = if parent == NO_PARENT {
                    root * local_matrix
                } else {
                    self.output[parent as usize] * local_matrix
                };
            }
        }
        Ok(())
    }
}
