//! Flattened joint hierarchy with its bind pose
//!
//! Joints are stored parent-before-child, so any forward pass over the joint
//! indices visits a parent before its children. The bind pose is packed in
//! SoA groups of four, padded with identity.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::{Joint, Skeleton};
//! use bonework_math::Transform;
//! use glam::Vec3;
//!
//! let skeleton = Skeleton::new(vec![
//!     Joint::new("root", None, Transform::IDENTITY),
//!     Joint::new("spine", Some(0), Transform::from_translation(Vec3::Y)),
//! ])?;
//! assert_eq!(skeleton.joint_parent(1), Some(0));
//! ```

use crate::archive::{self, Archive};
use crate::error::{AnimError, Result};
use bonework_math::{SoaTransform, Transform, soa_count, soa_transform};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Bits used to encode a joint index
pub const MAX_JOINTS_NUM_BITS: u32 = 10;

/// Hard cap on the number of joints in a skeleton
pub const MAX_JOINTS: usize = (1 << MAX_JOINTS_NUM_BITS) - 1;

/// Number of SoA groups needed for `MAX_JOINTS`
pub const MAX_SOA_JOINTS: usize = soa_count(MAX_JOINTS);

/// Parent index of root joints
pub const NO_PARENT: u16 = MAX_JOINTS as u16;

/// Joint description used to build a [`Skeleton`]
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub bind_pose: Transform,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind_pose: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            bind_pose,
        }
    }
}

/// Immutable runtime skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    joint_parents: Box<[u16]>,
    joint_names: Box<[String]>,
    bind_pose: Box<[SoaTransform]>,
}

impl Skeleton {
    /// Build a skeleton from joints listed parent-before-child
    pub fn new(joints: Vec<Joint>) -> Result<Self> {
        if joints.len() > MAX_JOINTS {
            return Err(AnimError::TooManyJoints {
                count: joints.len(),
                max: MAX_JOINTS,
            });
        }

        let mut parents = Vec::with_capacity(joints.len());
        let mut names = Vec::with_capacity(joints.len());
        let mut bind_pose = Vec::with_capacity(joints.len());
        for (index, joint) in joints.into_iter().enumerate() {
            parents.push(encode_parent(index, joint.parent)?);
            names.push(joint.name);
            bind_pose.push(joint.bind_pose);
        }

        let skeleton = Self {
            joint_parents: parents.into_boxed_slice(),
            joint_names: names.into_boxed_slice(),
            bind_pose: soa_transform::pack(&bind_pose).into_boxed_slice(),
        };
        log::debug!(
            "Built skeleton with {} joints ({} SoA groups)",
            skeleton.num_joints(),
            skeleton.num_soa_joints()
        );
        Ok(skeleton)
    }

    /// Number of joints
    pub fn num_joints(&self) -> usize {
        self.joint_parents.len()
    }

    /// Number of SoA groups holding the joints
    pub fn num_soa_joints(&self) -> usize {
        self.bind_pose.len()
    }

    /// Raw parent indices, `NO_PARENT` for roots
    pub fn joint_parents(&self) -> &[u16] {
        &self.joint_parents
    }

    /// Parent of `joint`, `None` for a root or an out-of-range joint
    pub fn joint_parent(&self, joint: usize) -> Option<usize> {
        match self.joint_parents.get(joint) {
            Some(&parent) if parent != NO_PARENT => Some(parent as usize),
            _ => None,
        }
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn joint_name(&self, joint: usize) -> Option<&str> {
        self.joint_names.get(joint).map(String::as_str)
    }

    /// Index of the first joint named `name`
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joint_names.iter().position(|n| n == name)
    }

    /// Bind pose in SoA groups, tail lanes padded with identity
    pub fn bind_pose(&self) -> &[SoaTransform] {
        &self.bind_pose
    }

    /// True if no joint has `joint` as its parent
    pub fn is_leaf(&self, joint: usize) -> bool {
        joint
            .checked_add(1)
            .and_then(|next| self.joint_parents.get(next..))
            .is_none_or(|later| !later.iter().any(|&parent| parent as usize == joint))
    }
}

fn encode_parent(joint: usize, parent: Option<usize>) -> Result<u16> {
    match parent {
        None => Ok(NO_PARENT),
        Some(parent) if parent < joint => Ok(parent as u16),
        Some(parent) => Err(AnimError::InvalidParent { joint, parent }),
    }
}

impl Archive for Skeleton {
    const TAG: &'static str = "Skeleton";
    const VERSION: u32 = 1;

    fn read_body<R: Read>(reader: &mut R, _version: u32) -> Result<Self> {
        let num_joints = reader.read_u32::<LittleEndian>()? as usize;
        if num_joints > MAX_JOINTS {
            return Err(AnimError::TooManyJoints {
                count: num_joints,
                max: MAX_JOINTS,
            });
        }

        let mut parents = Vec::with_capacity(num_joints);
        let mut names = Vec::with_capacity(num_joints);
        for joint in 0..num_joints {
            let parent = reader.read_i32::<LittleEndian>()?;
            let parent = usize::try_from(parent).ok();
            parents.push(encode_parent(joint, parent)?);
            names.push(archive::read_string(reader)?);
        }

        let bind_pose = (0..soa_count(num_joints))
            .map(|_| archive::read_soa_transform(reader))
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Read skeleton with {} joints", num_joints);
        Ok(Self {
            joint_parents: parents.into_boxed_slice(),
            joint_names: names.into_boxed_slice(),
            bind_pose: bind_pose.into_boxed_slice(),
        })
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.num_joints() as u32)?;
        for joint in 0..self.num_joints() {
            let parent = self.joint_parent(joint).map_or(-1, |p| p as i32);
            writer.write_i32::<LittleEndian>(parent)?;
            archive::write_string(writer, &self.joint_names[joint])?;
        }
        for group in self.bind_pose.iter() {
            archive::write_soa_transform(writer, group)?;
        }
        Ok(())
    }
}
