//! Fixtures shared by the integration tests
//!
//! `build_animation` lays per-track keys out in the runtime's
//! forward-decoding order, padding the track count to a multiple of four.

#![allow(dead_code)]

use bonework_anim::{Animation, Float3Key, Joint, QuaternionKey, Skeleton};
use bonework_math::{SOA_WIDTH, Transform, soa_count};
use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Keys of one track; every channel needs keys at ratio 0 and 1
#[derive(Debug, Clone)]
pub struct TrackKeys {
    pub translations: Vec<(f32, Vec3)>,
    pub rotations: Vec<(f32, Quat)>,
    pub scales: Vec<(f32, Vec3)>,
}

impl TrackKeys {
    /// A track holding `transform` for the whole clip
    pub fn constant(transform: Transform) -> Self {
        Self {
            translations: vec![(0.0, transform.translation), (1.0, transform.translation)],
            rotations: vec![(0.0, transform.rotation), (1.0, transform.rotation)],
            scales: vec![(0.0, transform.scale), (1.0, transform.scale)],
        }
    }
}

/// Order keys of `tracks` for forward decoding: first keys, second keys,
/// then the rest by the ratio of their predecessor
fn layout<V: Copy, K>(tracks: &[Vec<(f32, V)>], make: impl Fn(f32, u16, V) -> K) -> Vec<K> {
    let mut keys = Vec::new();
    for row in 0..2 {
        for (track, track_keys) in tracks.iter().enumerate() {
            let (ratio, value) = track_keys[row];
            keys.push(make(ratio, track as u16, value));
        }
    }

    let mut rest = Vec::new();
    for (track, track_keys) in tracks.iter().enumerate() {
        for index in 2..track_keys.len() {
            rest.push((track_keys[index - 1].0, track, index));
        }
    }
    rest.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    for (_, track, index) in rest {
        let (ratio, value) = tracks[track][index];
        keys.push(make(ratio, track as u16, value));
    }
    keys
}

pub fn build_animation(name: &str, duration: f32, tracks: &[TrackKeys]) -> Animation {
    let padded = soa_count(tracks.len()) * SOA_WIDTH;
    let mut all = tracks.to_vec();
    all.resize(padded, TrackKeys::constant(Transform::IDENTITY));

    let translations: Vec<_> = all.iter().map(|t| t.translations.clone()).collect();
    let rotations: Vec<_> = all.iter().map(|t| t.rotations.clone()).collect();
    let scales: Vec<_> = all.iter().map(|t| t.scales.clone()).collect();

    Animation::new(
        name,
        duration,
        tracks.len(),
        layout(&translations, Float3Key::new),
        layout(&rotations, QuaternionKey::new),
        layout(&scales, Float3Key::new),
    )
    .expect("fixture animation must be valid")
}

/// `count` random ratios inside the clip plus the keys at 0 and 1, sorted
fn random_ratios(rng: &mut StdRng, count: usize) -> Vec<f32> {
    let mut ratios: Vec<f32> = (0..count).map(|_| rng.random_range(0.001..0.999)).collect();
    ratios.push(0.0);
    ratios.push(1.0);
    ratios.sort_by(f32::total_cmp);
    ratios
}

/// Animation of `num_tracks` tracks with uneven key densities per channel
///
/// Built from a fixed seed, so every call returns the same keys.
pub fn busy_animation(num_tracks: usize) -> Animation {
    let mut rng = StdRng::seed_from_u64(0x0B0E_5EED);
    let tracks: Vec<_> = (0..num_tracks)
        .map(|track| {
            let translations = random_ratios(&mut rng, track % 5 + 1)
                .into_iter()
                .map(|r| {
                    let value = Vec3::new(
                        rng.random_range(-2.0..2.0),
                        rng.random_range(0.0..1.0),
                        rng.random_range(0.0..8.0),
                    );
                    (r, value)
                })
                .collect();
            let rotations = random_ratios(&mut rng, track % 3 + 2)
                .into_iter()
                .map(|r| {
                    let axis = Vec3::new(
                        rng.random_range(-0.5..0.5),
                        rng.random_range(-0.5..0.5),
                        0.5,
                    );
                    (r, Quat::from_axis_angle(axis.normalize(), rng.random_range(-3.0..3.0)))
                })
                .collect();
            let scales = random_ratios(&mut rng, track % 2)
                .into_iter()
                .map(|r| (r, Vec3::splat(0.5 + r)))
                .collect();

            TrackKeys {
                translations,
                rotations,
                scales,
            }
        })
        .collect();
    build_animation("busy", 3.0, &tracks)
}

/// Chain of joints, each the child of the previous one
pub fn chain_skeleton(count: usize) -> Skeleton {
    let joints = (0..count)
        .map(|i| Joint::new(format!("joint{i}"), i.checked_sub(1), Transform::IDENTITY))
        .collect();
    Skeleton::new(joints).expect("fixture skeleton must be valid")
}
