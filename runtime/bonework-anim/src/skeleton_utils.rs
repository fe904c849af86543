//! Skeleton helpers that work on unpacked joints

use crate::skeleton::Skeleton;
use bonework_math::{SOA_WIDTH, Transform};

/// Bind pose of one joint, unpacked from its SoA lane
pub fn joint_bind_pose(skeleton: &Skeleton, joint: usize) -> Option<Transform> {
    if joint >= skeleton.num_joints() {
        return None;
    }
    Some(skeleton.bind_pose()[joint / SOA_WIDTH].lane(joint % SOA_WIDTH))
}

/// Calls `f(joint, parent)` for every joint in depth-first order
///
/// Traversal starts at `from`, or at every root in index order when `from`
/// is `None`. Nothing is visited if `from` is out of range. Uses an explicit
/// stack, so stack usage does not depend on hierarchy depth.
pub fn iterate_joints_df<F>(skeleton: &Skeleton, from: Option<usize>, mut f: F)
where
    F: FnMut(usize, Option<usize>),
{
    let num_joints = skeleton.num_joints();
    let mut children = vec![Vec::new(); num_joints];
    let mut roots = Vec::new();
    for joint in 0..num_joints {
        match skeleton.joint_parent(joint) {
            Some(parent) => children[parent].push(joint),
            None => roots.push(joint),
        }
    }

    let mut stack: Vec<usize> = match from {
        Some(joint) if joint < num_joints => vec![joint],
        Some(_) => return,
        None => roots.into_iter().rev().collect(),
    };
    while let Some(joint) = stack.pop() {
        f(joint, skeleton.joint_parent(joint));
        stack.extend(children[joint].iter().rev());
    }
}
