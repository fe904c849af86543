//! Keyframe statistics of an animation

use crate::animation::{Animation, Keyframe};

fn count_keys<K: Keyframe>(keys: &[K], track: usize) -> usize {
    keys.iter().filter(|key| key.track() == track).count()
}

/// Number of translation keys owned by `track`
pub fn count_translation_keys(animation: &Animation, track: usize) -> usize {
    count_keys(animation.translations(), track)
}

/// Number of rotation keys owned by `track`
pub fn count_rotation_keys(animation: &Animation, track: usize) -> usize {
    count_keys(animation.rotations(), track)
}

/// Number of scale keys owned by `track`
pub fn count_scale_keys(animation: &Animation, track: usize) -> usize {
    count_keys(animation.scales(), track)
}
