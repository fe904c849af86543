//! Parallel update of independent characters
//!
//! Characters share their skeleton and animations read-only and own their
//! sampling cache and pose buffers, so they can be updated concurrently
//! without synchronization. The work is split fork-join style with
//! `rayon::join` until a chunk holds no more than `grain_size` items.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::parallel::{DEFAULT_GRAIN_SIZE, fork_join_update};
//!
//! let failures = fork_join_update(&mut characters, DEFAULT_GRAIN_SIZE, &|c| c.update(dt));
//! ```

use crate::error::Result;

/// Default number of items processed by one task
pub const DEFAULT_GRAIN_SIZE: usize = 128;

/// Per-entity pose update plugged into [`update_all`]
pub trait PoseUpdate: Send {
    fn update_pose(&mut self) -> Result<()>;
}

/// Run `op` on every item, splitting the slice across rayon tasks
///
/// A failure on one item is logged and counted; it never stops the others.
/// Returns the number of failed items.
pub fn fork_join_update<T, F>(items: &mut [T], grain_size: usize, op: &F) -> usize
where
    T: Send,
    F: Fn(&mut T) -> Result<()> + Sync,
{
    fork_join(items, 0, grain_size.max(1), op)
}

/// Update every item with its own [`PoseUpdate`] implementation
pub fn update_all<T: PoseUpdate>(items: &mut [T], grain_size: usize) -> usize {
    fork_join_update(items, grain_size, &T::update_pose)
}

fn fork_join<T, F>(items: &mut [T], offset: usize, grain_size: usize, op: &F) -> usize
where
    T: Send,
    F: Fn(&mut T) -> Result<()> + Sync,
{
    if items.len() <= grain_size {
        let mut failures = 0;
        for (index, item) in items.iter_mut().enumerate() {
            if let Err(err) = op(item) {
                log::warn!("Pose update failed for item {}: {}", offset + index, err);
                failures += 1;
            }
        }
        return failures;
    }

    // First half stays on this thread, the second half can be stolen
    let half = items.len() / 2;
    let (first, second) = items.split_at_mut(half);
    let (a, b) = rayon::join(
        || fork_join(first, offset, grain_size, op),
        || fork_join(second, offset + half, grain_size, op),
    );
    a + b
}
