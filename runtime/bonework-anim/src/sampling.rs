//! Animation sampling with a frame-coherent cache
//!
//! [`SamplingJob`] evaluates every track of an [`Animation`] at a time ratio
//! and writes local transforms in SoA groups. The [`SamplingCache`] keeps,
//! for each channel, a forward cursor into the key sequence and the pair of
//! keys bracketing the last sampled ratio for every track. Playing forward
//! only decodes the keys crossed since the previous call.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::{SamplingCache, SamplingJob};
//! use bonework_math::SoaTransform;
//!
//! let mut cache = SamplingCache::new(animation.num_tracks());
//! let mut locals = vec![SoaTransform::IDENTITY; animation.num_soa_tracks()];
//! for frame in 0..60 {
//!     let ratio = frame as f32 / 59.0;
//!     SamplingJob::new(&animation, &mut cache, ratio, &mut locals).run()?;
//! }
//! ```

use crate::animation::{Animation, Float3Key, Keyframe, QuaternionKey};
use crate::error::{AnimError, Result};
use bonework_math::{SOA_WIDTH, SoaFloat3, SoaQuaternion, SoaTransform, soa_count};
use glam::Vec4;

/// SoA groups tracked per byte of the outdated bitset
const GROUPS_PER_BYTE: usize = 8;

/// Keyframe types the sampler can decode into SoA groups
trait SampledKey: Keyframe {
    type Soa: Copy + Default;

    /// Decode four keys, one per lane
    fn gather(keys: [&Self; 4]) -> Self::Soa;

    fn interpolate(a: &Self::Soa, b: &Self::Soa, alpha: Vec4) -> Self::Soa;
}

impl SampledKey for Float3Key {
    type Soa = SoaFloat3;

    #[inline]
    fn gather(keys: [&Self; 4]) -> SoaFloat3 {
        SoaFloat3::from_lanes(keys.map(Keyframe::value))
    }

    #[inline]
    fn interpolate(a: &SoaFloat3, b: &SoaFloat3, alpha: Vec4) -> SoaFloat3 {
        SoaFloat3::lerp(a, b, alpha)
    }
}

impl SampledKey for QuaternionKey {
    type Soa = SoaQuaternion;

    #[inline]
    fn gather(keys: [&Self; 4]) -> SoaQuaternion {
        SoaQuaternion::from_lanes(keys.map(Keyframe::value))
    }

    #[inline]
    fn interpolate(a: &SoaQuaternion, b: &SoaQuaternion, alpha: Vec4) -> SoaQuaternion {
        SoaQuaternion::nlerp(a, b, alpha)
    }
}

/// Decoded keys bracketing the cached ratio for one SoA group
#[derive(Debug, Clone, Copy, Default)]
struct Interval<S> {
    ratio: [Vec4; 2],
    value: [S; 2],
}

/// Decoding state of one channel
#[derive(Debug, Clone)]
struct ChannelCache<S> {
    /// Next key to consume, 0 when the channel must be restarted
    cursor: usize,
    /// Left and right key index of every track
    keys: Box<[usize]>,
    intervals: Box<[Interval<S>]>,
    /// One bit per SoA group whose interval must be decoded again
    outdated: Box<[u8]>,
}

impl<S: Copy + Default> ChannelCache<S> {
    fn new(max_soa_tracks: usize) -> Self {
        Self {
            cursor: 0,
            keys: vec![0; max_soa_tracks * SOA_WIDTH * 2].into_boxed_slice(),
            intervals: vec![Interval::default(); max_soa_tracks].into_boxed_slice(),
            outdated: vec![0; max_soa_tracks.div_ceil(GROUPS_PER_BYTE)].into_boxed_slice(),
        }
    }

    #[inline]
    fn mark_outdated(&mut self, group: usize) {
        self.outdated[group / GROUPS_PER_BYTE] |= 1 << (group % GROUPS_PER_BYTE);
    }

    /// Returns true if `group` was outdated, and clears its bit
    #[inline]
    fn take_outdated(&mut self, group: usize) -> bool {
        let byte = &mut self.outdated[group / GROUPS_PER_BYTE];
        let bit = 1 << (group % GROUPS_PER_BYTE);
        let outdated = *byte & bit != 0;
        *byte &= !bit;
        outdated
    }

    /// Advance the cursor so that every track's key pair brackets `ratio`,
    /// then decode the intervals of the first `num_groups` groups that
    /// changed.
    fn update<K>(&mut self, keys: &[K], num_soa_tracks: usize, num_groups: usize, ratio: f32)
    where
        K: SampledKey<Soa = S>,
    {
        let num_tracks = num_soa_tracks * SOA_WIDTH;
        if self.cursor == 0 {
            // The first two rows of the sequence are the first two keys of
            // every track.
            for track in 0..num_tracks {
                self.keys[track * 2] = track;
                self.keys[track * 2 + 1] = track + num_tracks;
            }
            self.cursor = num_tracks * 2;
            for group in 0..num_soa_tracks {
                self.mark_outdated(group);
            }
        }

        while let Some(next) = keys.get(self.cursor) {
            let track = next.track();
            let right = self.keys[track * 2 + 1];
            if keys[right].ratio() > ratio {
                break;
            }
            self.mark_outdated(track / SOA_WIDTH);
            self.keys[track * 2] = right;
            self.keys[track * 2 + 1] = self.cursor;
            self.cursor += 1;
        }

        for group in 0..num_groups {
            if !self.take_outdated(group) {
                continue;
            }
            let base = group * SOA_WIDTH;
            let left: [&K; 4] = std::array::from_fn(|lane| &keys[self.keys[(base + lane) * 2]]);
            let right: [&K; 4] =
                std::array::from_fn(|lane| &keys[self.keys[(base + lane) * 2 + 1]]);
            self.intervals[group] = Interval {
                ratio: [
                    Vec4::from_array(left.map(Keyframe::ratio)),
                    Vec4::from_array(right.map(Keyframe::ratio)),
                ],
                value: [K::gather(left), K::gather(right)],
            };
        }
    }

    /// Interpolate one group's cached interval at `ratio`
    #[inline]
    fn interpolate<K>(&self, group: usize, ratio: Vec4) -> S
    where
        K: SampledKey<Soa = S>,
    {
        let Interval {
            ratio: [start, end],
            value: [from, to],
        } = &self.intervals[group];
        let span = *end - *start;
        let alpha = (ratio - *start) / span;
        // Equal ratios only occur for duplicate keys
        let alpha = Vec4::select(span.cmpeq(Vec4::ZERO), Vec4::ZERO, alpha);
        K::interpolate(from, to, alpha)
    }
}

/// Per-character sampling state
///
/// A cache must not be shared by characters sampled concurrently; each
/// character owns one. It binds to one animation at a time and restarts
/// decoding when the animation changes or the ratio goes backward.
#[derive(Debug, Clone)]
pub struct SamplingCache {
    animation: Option<u64>,
    ratio: f32,
    max_soa_tracks: usize,
    translations: ChannelCache<SoaFloat3>,
    rotations: ChannelCache<SoaQuaternion>,
    scales: ChannelCache<SoaFloat3>,
}

impl SamplingCache {
    /// Allocate a cache for animations of up to `max_tracks` tracks
    pub fn new(max_tracks: usize) -> Self {
        let max_soa_tracks = soa_count(max_tracks);
        Self {
            animation: None,
            ratio: 0.0,
            max_soa_tracks,
            translations: ChannelCache::new(max_soa_tracks),
            rotations: ChannelCache::new(max_soa_tracks),
            scales: ChannelCache::new(max_soa_tracks),
        }
    }

    /// Reallocate for `max_tracks` tracks. The cache is invalidated.
    pub fn resize(&mut self, max_tracks: usize) {
        *self = Self::new(max_tracks);
    }

    /// Capacity in SoA groups
    pub fn max_soa_tracks(&self) -> usize {
        self.max_soa_tracks
    }

    /// Capacity in tracks
    pub fn max_tracks(&self) -> usize {
        self.max_soa_tracks * SOA_WIDTH
    }

    /// Forget the bound animation. The next sample decodes from the start.
    pub fn invalidate(&mut self) {
        self.animation = None;
        self.ratio = 0.0;
        self.translations.cursor = 0;
        self.rotations.cursor = 0;
        self.scales.cursor = 0;
    }

    /// Bind to `animation` at `ratio`, restarting on a new animation or a
    /// rewind.
    fn step(&mut self, animation: &Animation, ratio: f32) {
        if self.animation != Some(animation.id()) || ratio < self.ratio {
            self.invalidate();
            self.animation = Some(animation.id());
        }
        self.ratio = ratio;
    }
}

/// Samples an animation into a local pose buffer
pub struct SamplingJob<'a> {
    pub animation: &'a Animation,
    pub cache: &'a mut SamplingCache,
    /// Time ratio, clamped into `[0, 1]`
    pub ratio: f32,
    /// Local pose in SoA groups
    pub output: &'a mut [SoaTransform],
}

impl<'a> SamplingJob<'a> {
    pub fn new(
        animation: &'a Animation,
        cache: &'a mut SamplingCache,
        ratio: f32,
        output: &'a mut [SoaTransform],
    ) -> Self {
        Self {
            animation,
            cache,
            ratio,
            output,
        }
    }

    /// Check the job can run without touching any buffer
    pub fn validate(&self) -> Result<()> {
        if self.output.is_empty() {
            return Err(AnimError::EmptyOutput);
        }
        if self.ratio.is_nan() {
            return Err(AnimError::InvalidRatio(self.ratio));
        }
        let required = self.animation.num_soa_tracks();
        if self.cache.max_soa_tracks() < required {
            return Err(AnimError::CacheTooSmall {
                required,
                capacity: self.cache.max_soa_tracks(),
            });
        }
        Ok(())
    }

    /// Write the first `min(animation tracks, output)` SoA groups. Groups
    /// past that are left untouched.
    pub fn run(&mut self) -> Result<()> {
        if let Err(err) = self.validate() {
            log::debug!("Sampling job rejected: {}", err);
            return Err(err);
        }

        let animation = self.animation;
        let ratio = self.ratio.clamp(0.0, 1.0);
        let num_soa_tracks = animation.num_soa_tracks();
        let num_groups = num_soa_tracks.min(self.output.len());

        let cache = &mut *self.cache;
        cache.step(animation, ratio);
        cache
            .translations
            .update(animation.translations(), num_soa_tracks, num_groups, ratio);
        cache
            .rotations
            .update(animation.rotations(), num_soa_tracks, num_groups, ratio);
        cache
            .scales
            .update(animation.scales(), num_soa_tracks, num_groups, ratio);

        let lanes = Vec4::splat(ratio);
        for (group, out) in self.output[..num_groups].iter_mut().enumerate() {
            out.translation = cache.translations.interpolate::<Float3Key>(group, lanes);
            out.rotation = cache.rotations.interpolate::<QuaternionKey>(group, lanes);
            out.scale = cache.scales.interpolate::<Float3Key>(group, lanes);
        }
        Ok(())
    }
}
