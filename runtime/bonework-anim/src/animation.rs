//! Runtime animation: compressed keyframes in forward-decoding order
//!
//! Each channel (translation, rotation, scale) is one flat key sequence
//! shared by all tracks. With `n` tracks padded to a multiple of four:
//!
//! - keys `[0, n)` are the first key (ratio 0) of every track, in track order
//! - keys `[n, 2n)` are the second key of every track, in track order
//! - the remaining keys are sorted by the ratio of the key that precedes
//!   them in their own track
//!
//! This order lets the sampler walk every channel strictly forward in time.
//! Every track has a key at ratio 0 and a key at ratio 1, and padded tracks
//! hold identity keys at both ends.

use crate::archive::{self, Archive};
use crate::error::{AnimError, Result};
use crate::skeleton::MAX_JOINTS;
use bonework_math::{SOA_WIDTH, soa_count};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use half::f16;
use std::f32::consts::SQRT_2;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Quantization scale of the three stored rotation components. The stored
/// components are bounded by `1/sqrt(2)` in magnitude.
const QUATERNION_FLOAT_TO_INT: f32 = 32767.0 * SQRT_2;
const QUATERNION_INT_TO_FLOAT: f32 = 1.0 / QUATERNION_FLOAT_TO_INT;

/// Most keys a channel may declare when reading a blob
const MAX_KEYS_PER_CHANNEL: usize = 1 << 24;

static NEXT_ANIMATION_ID: AtomicU64 = AtomicU64::new(1);

/// Common view over the keyframe types
pub trait Keyframe: Copy {
    /// Decompressed value type
    type Value: Copy;

    /// Time ratio in `[0, 1]`
    fn ratio(&self) -> f32;

    /// Index of the track owning this key
    fn track(&self) -> usize;

    /// Decompressed value
    fn value(&self) -> Self::Value;
}

/// Translation or scale key, stored as three half floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float3Key {
    pub ratio: f32,
    pub track: u16,
    pub value: [u16; 3],
}

pub type TranslationKey = Float3Key;
pub type ScaleKey = Float3Key;

impl Float3Key {
    pub fn new(ratio: f32, track: u16, value: Vec3) -> Self {
        Self {
            ratio,
            track,
            value: [
                f16::from_f32(value.x).to_bits(),
                f16::from_f32(value.y).to_bits(),
                f16::from_f32(value.z).to_bits(),
            ],
        }
    }
}

impl Keyframe for Float3Key {
    type Value = Vec3;

    #[inline]
    fn ratio(&self) -> f32 {
        self.ratio
    }

    #[inline]
    fn track(&self) -> usize {
        self.track as usize
    }

    #[inline]
    fn value(&self) -> Vec3 {
        Vec3::new(
            f16::from_bits(self.value[0]).to_f32(),
            f16::from_bits(self.value[1]).to_f32(),
            f16::from_bits(self.value[2]).to_f32(),
        )
    }
}

/// Rotation key using smallest-three quantization
///
/// The component with the largest magnitude is dropped and rebuilt from the
/// unit-length constraint. `largest` is its index and `sign` its sign; the
/// three remaining components are quantized to `i16`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionKey {
    pub ratio: f32,
    pub track: u16,
    pub largest: u8,
    pub sign: bool,
    pub value: [i16; 3],
}

pub type RotationKey = QuaternionKey;

impl QuaternionKey {
    pub fn new(ratio: f32, track: u16, rotation: Quat) -> Self {
        let components = rotation.normalize().to_array();

        let mut largest = 0;
        for i in 1..4 {
            if components[i].abs() > components[largest].abs() {
                largest = i;
            }
        }

        let mut value = [0i16; 3];
        for (slot, &component) in value
            .iter_mut()
            .zip(components.iter().enumerate().filter(|&(i, _)| i != largest).map(|(_, c)| c))
        {
            *slot = (component * QUATERNION_FLOAT_TO_INT)
                .round()
                .clamp(-32767.0, 32767.0) as i16;
        }

        Self {
            ratio,
            track,
            largest: largest as u8,
            sign: components[largest] < 0.0,
            value,
        }
    }

    fn packed_largest(&self) -> u8 {
        (self.largest & 3) | (u8::from(self.sign) << 2)
    }
}

impl Keyframe for QuaternionKey {
    type Value = Quat;

    #[inline]
    fn ratio(&self) -> f32 {
        self.ratio
    }

    #[inline]
    fn track(&self) -> usize {
        self.track as usize
    }

    fn value(&self) -> Quat {
        let stored = [
            f32::from(self.value[0]) * QUATERNION_INT_TO_FLOAT,
            f32::from(self.value[1]) * QUATERNION_INT_TO_FLOAT,
            f32::from(self.value[2]) * QUATERNION_INT_TO_FLOAT,
        ];
        let dot: f32 = stored.iter().map(|c| c * c).sum();
        let dropped = (1.0 - dot).max(0.0).sqrt();
        let dropped = if self.sign { -dropped } else { dropped };

        let largest = (self.largest & 3) as usize;
        let mut components = [0f32; 4];
        let mut next = stored.iter();
        for (i, component) in components.iter_mut().enumerate() {
            *component = if i == largest {
                dropped
            } else {
                next.next().copied().unwrap_or_default()
            };
        }
        Quat::from_array(components)
    }
}

/// Immutable runtime animation
#[derive(Debug, Clone)]
pub struct Animation {
    id: u64,
    name: String,
    duration: f32,
    num_tracks: usize,
    translations: Box<[TranslationKey]>,
    rotations: Box<[RotationKey]>,
    scales: Box<[ScaleKey]>,
}

impl Animation {
    /// Build an animation from keys already in forward-decoding order
    ///
    /// The layout is validated once here; sampling trusts it afterwards.
    pub fn new(
        name: impl Into<String>,
        duration: f32,
        num_tracks: usize,
        translations: Vec<TranslationKey>,
        rotations: Vec<RotationKey>,
        scales: Vec<ScaleKey>,
    ) -> Result<Self> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(AnimError::InvalidDuration(duration));
        }
        if num_tracks > MAX_JOINTS {
            return Err(AnimError::TooManyJoints {
                count: num_tracks,
                max: MAX_JOINTS,
            });
        }

        let padded = soa_count(num_tracks) * SOA_WIDTH;
        validate_channel("translation", &translations, padded)?;
        validate_channel("rotation", &rotations, padded)?;
        validate_channel("scale", &scales, padded)?;
        if let Some(key) = rotations.iter().find(|k| k.largest > 3) {
            return Err(AnimError::InvalidKeyframes(format!(
                "rotation key for track {} has largest component index {}",
                key.track, key.largest
            )));
        }

        let animation = Self {
            id: NEXT_ANIMATION_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            duration,
            num_tracks,
            translations: translations.into_boxed_slice(),
            rotations: rotations.into_boxed_slice(),
            scales: scales.into_boxed_slice(),
        };
        log::debug!(
            "Built animation '{}': {} tracks, {}s, {} bytes of keys",
            animation.name,
            animation.num_tracks,
            animation.duration,
            animation.size()
        );
        Ok(animation)
    }

    /// Process-unique identity used by the sampling cache
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Number of animated tracks, without padding
    pub fn num_tracks(&self) -> usize {
        self.num_tracks
    }

    /// Number of SoA track groups
    pub fn num_soa_tracks(&self) -> usize {
        soa_count(self.num_tracks)
    }

    pub fn translations(&self) -> &[TranslationKey] {
        &self.translations
    }

    pub fn rotations(&self) -> &[RotationKey] {
        &self.rotations
    }

    pub fn scales(&self) -> &[ScaleKey] {
        &self.scales
    }

    /// Size in bytes of the keyframe storage
    pub fn size(&self) -> usize {
        std::mem::size_of_val(&*self.translations)
            + std::mem::size_of_val(&*self.rotations)
            + std::mem::size_of_val(&*self.scales)
    }
}

/// Equality of content. Two animations built from the same keys compare
/// equal even though the sampling cache treats them as distinct.
impl PartialEq for Animation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.duration == other.duration
            && self.num_tracks == other.num_tracks
            && self.translations == other.translations
            && self.rotations == other.rotations
            && self.scales == other.scales
    }
}

fn validate_channel<K: Keyframe>(channel: &str, keys: &[K], num_tracks: usize) -> Result<()> {
    let invalid = |message: String| -> Result<()> {
        Err(AnimError::InvalidKeyframes(format!("{channel}: {message}")))
    };

    if keys.len() < num_tracks * 2 {
        return invalid(format!(
            "{} keys, at least {} required",
            keys.len(),
            num_tracks * 2
        ));
    }

    for (index, key) in keys[..num_tracks].iter().enumerate() {
        if key.track() != index || key.ratio() != 0.0 {
            return invalid(format!("key {index} must be the ratio 0 key of track {index}"));
        }
    }

    // Ratio of the last key seen per track, and of the key preceding the
    // previous key in the sequence
    let mut last = vec![0f32; num_tracks];
    let mut previous_ratio = 0f32;
    for (index, key) in keys.iter().enumerate().skip(num_tracks) {
        let track = key.track();
        if track >= num_tracks {
            return invalid(format!("key {index} refers to track {track}"));
        }
        if index < num_tracks * 2 && track != index - num_tracks {
            return invalid(format!(
                "key {index} must be the second key of track {}",
                index - num_tracks
            ));
        }

        let ratio = key.ratio();
        if !(0.0..=1.0).contains(&ratio) || ratio < last[track] {
            return invalid(format!("key {index} has out of order ratio {ratio}"));
        }
        if last[track] < previous_ratio {
            return invalid(format!("key {index} is not in forward-decoding order"));
        }
        previous_ratio = last[track];
        last[track] = ratio;
    }

    if let Some(track) = last.iter().position(|&ratio| ratio != 1.0) {
        return invalid(format!("track {track} has no key at ratio 1"));
    }
    Ok(())
}

fn read_keys<R, K, F>(reader: &mut R, read_key: F) -> Result<Vec<K>>
where
    R: Read,
    F: Fn(&mut R) -> Result<K>,
{
    let count = reader.read_u32::<LittleEndian>()? as usize;
    if count > MAX_KEYS_PER_CHANNEL {
        return Err(AnimError::InvalidKeyframes(format!(
            "{count} keys declared in one channel"
        )));
    }
    (0..count).map(|_| read_key(reader)).collect()
}

fn read_float3_key<R: Read>(reader: &mut R) -> Result<Float3Key> {
    let ratio = reader.read_f32::<LittleEndian>()?;
    let track = reader.read_u16::<LittleEndian>()?;
    let mut value = [0u16; 3];
    reader.read_u16_into::<LittleEndian>(&mut value)?;
    Ok(Float3Key {
        ratio,
        track,
        value,
    })
}

fn write_float3_key<W: Write>(writer: &mut W, key: &Float3Key) -> Result<()> {
    writer.write_f32::<LittleEndian>(key.ratio)?;
    writer.write_u16::<LittleEndian>(key.track)?;
    for v in key.value {
        writer.write_u16::<LittleEndian>(v)?;
    }
    Ok(())
}

fn read_quaternion_key<R: Read>(reader: &mut R) -> Result<QuaternionKey> {
    let ratio = reader.read_f32::<LittleEndian>()?;
    let track = reader.read_u16::<LittleEndian>()?;
    let packed = reader.read_u8()?;
    let mut value = [0i16; 3];
    reader.read_i16_into::<LittleEndian>(&mut value)?;
    Ok(QuaternionKey {
        ratio,
        track,
        largest: packed & 3,
        sign: packed & 4 != 0,
        value,
    })
}

fn write_quaternion_key<W: Write>(writer: &mut W, key: &QuaternionKey) -> Result<()> {
    writer.write_f32::<LittleEndian>(key.ratio)?;
    writer.write_u16::<LittleEndian>(key.track)?;
    writer.write_u8(key.packed_largest())?;
    for v in key.value {
        writer.write_i16::<LittleEndian>(v)?;
    }
    Ok(())
}

impl Archive for Animation {
    const TAG: &'static str = "Animation";
    const VERSION: u32 = 1;

    fn read_body<R: Read>(reader: &mut R, _version: u32) -> Result<Self> {
        let duration = reader.read_f32::<LittleEndian>()?;
        let num_tracks = reader.read_u32::<LittleEndian>()? as usize;
        let name = archive::read_string(reader)?;
        let translations = read_keys(reader, read_float3_key)?;
        let rotations = read_keys(reader, read_quaternion_key)?;
        let scales = read_keys(reader, read_float3_key)?;
        Self::new(name, duration, num_tracks, translations, rotations, scales)
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<LittleEndian>(self.duration)?;
        writer.write_u32::<LittleEndian>(self.num_tracks as u32)?;
        archive::write_string(writer, &self.name)?;

        writer.write_u32::<LittleEndian>(self.translations.len() as u32)?;
        for key in self.translations.iter() {
            write_float3_key(writer, key)?;
        }
        writer.write_u32::<LittleEndian>(self.rotations.len() as u32)?;
        for key in self.rotations.iter() {
            write_quaternion_key(writer, key)?;
        }
        writer.write_u32::<LittleEndian>(self.scales.len() as u32)?;
        for key in self.scales.iter() {
            write_float3_key(writer, key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use test_case::test_case;

    /// Keys at ratio 0 and 1 for `tracks` padded tracks, all with `value`
    fn constant_keys(tracks: u16, value: Vec3) -> Vec<Float3Key> {
        let mut keys: Vec<_> = (0..tracks).map(|t| Float3Key::new(0.0, t, value)).collect();
        keys.extend((0..tracks).map(|t| Float3Key::new(1.0, t, value)));
        keys
    }

    fn identity_rotations(tracks: u16) -> Vec<QuaternionKey> {
        let mut keys: Vec<_> = (0..tracks)
            .map(|t| QuaternionKey::new(0.0, t, Quat::IDENTITY))
            .collect();
        keys.extend((0..tracks).map(|t| QuaternionKey::new(1.0, t, Quat::IDENTITY)));
        keys
    }

    fn single_track() -> Animation {
        // Track 0 has a middle translation key at 0.5; tracks 1-3 are padding
        let mut translations = vec![
            Float3Key::new(0.0, 0, Vec3::ZERO),
            Float3Key::new(0.0, 1, Vec3::ZERO),
            Float3Key::new(0.0, 2, Vec3::ZERO),
            Float3Key::new(0.0, 3, Vec3::ZERO),
            Float3Key::new(0.5, 0, Vec3::X),
            Float3Key::new(1.0, 1, Vec3::ZERO),
            Float3Key::new(1.0, 2, Vec3::ZERO),
            Float3Key::new(1.0, 3, Vec3::ZERO),
        ];
        translations.push(Float3Key::new(1.0, 0, Vec3::Y));
        Animation::new(
            "walk",
            2.0,
            1,
            translations,
            identity_rotations(4),
            constant_keys(4, Vec3::ONE),
        )
        .unwrap()
    }

    #[test]
    fn test_float3_key_half_precision() {
        let key = Float3Key::new(0.25, 3, Vec3::new(1.5, -2.0, 0.125));
        assert_eq!(key.value(), Vec3::new(1.5, -2.0, 0.125));
        assert_eq!(key.track(), 3);

        let key = Float3Key::new(0.0, 0, Vec3::splat(0.1));
        assert!((key.value().x - 0.1).abs() < 1e-3);
    }

    #[test_case(Quat::IDENTITY ; "identity")]
    #[test_case(Quat::from_rotation_x(1.0) ; "x axis")]
    #[test_case(Quat::from_rotation_y(-2.5) ; "negative y")]
    #[test_case(Quat::from_xyzw(-0.5, 0.5, -0.5, -0.5) ; "all equal magnitude")]
    #[test_case(Quat::from_xyzw(0.0, 0.0, -1.0, 0.0) ; "negative largest")]
    fn test_quaternion_key_quantization(rotation: Quat) {
        let key = QuaternionKey::new(0.0, 0, rotation);
        let decoded = key.value();
        assert!(decoded.is_normalized());
        assert!(decoded.abs_diff_eq(rotation, 1e-4), "{decoded:?} != {rotation:?}");
    }

    #[test]
    fn test_accessors() {
        let animation = single_track();
        assert_eq!(animation.name(), "walk");
        assert_eq!(animation.duration(), 2.0);
        assert_eq!(animation.num_tracks(), 1);
        assert_eq!(animation.num_soa_tracks(), 1);
        assert_eq!(animation.translations().len(), 9);
        assert_eq!(animation.rotations().len(), 8);
        assert!(animation.size() > 0);
    }

    #[test]
    fn test_animations_have_distinct_ids() {
        assert_ne!(single_track().id(), single_track().id());
    }

    #[test_case(0.0)]
    #[test_case(-1.0)]
    #[test_case(f32::NAN)]
    #[test_case(f32::INFINITY)]
    fn test_invalid_duration(duration: f32) {
        let err = Animation::new(
            "",
            duration,
            0,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidDuration(_)));
    }

    #[test]
    fn test_empty_animation_is_valid() {
        let animation = Animation::new("", 1.0, 0, Vec::new(), Vec::new(), Vec::new()).unwrap();
        assert_eq!(animation.num_soa_tracks(), 0);
    }

    #[test]
    fn test_missing_padding_tracks_rejected() {
        // One real track still needs four padded tracks of keys
        let err = Animation::new(
            "",
            1.0,
            1,
            constant_keys(1, Vec3::ZERO),
            identity_rotations(4),
            constant_keys(4, Vec3::ONE),
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidKeyframes(_)));
    }

    #[test]
    fn test_missing_end_key_rejected() {
        let mut translations = constant_keys(4, Vec3::ZERO);
        translations[4].ratio = 0.5;
        let err = Animation::new(
            "",
            1.0,
            4,
            translations,
            identity_rotations(4),
            constant_keys(4, Vec3::ONE),
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidKeyframes(_)));
    }

    #[test]
    fn test_out_of_order_keys_rejected() {
        // Track 0 keys at 0, 0.5, 0.25, 1: the 0.25 key goes back in time
        let mut translations = constant_keys(4, Vec3::ZERO);
        translations[4].ratio = 0.5;
        translations.push(Float3Key::new(0.25, 0, Vec3::ZERO));
        translations.push(Float3Key::new(1.0, 0, Vec3::ZERO));
        let err = Animation::new(
            "",
            1.0,
            4,
            translations,
            identity_rotations(4),
            constant_keys(4, Vec3::ONE),
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidKeyframes(_)));
    }

    #[test]
    fn test_not_forward_decodable_rejected() {
        // Track 0: 0, 0.8, 1. Track 1: 0, 0.2, 0.6, 1.
        // The 1.0 key of track 0 follows a 0.8 key, so it must come after
        // both later keys of track 1, whose predecessors are at 0.2 and 0.6.
        let mut translations: Vec<_> = (0..4).map(|t| Float3Key::new(0.0, t, Vec3::ZERO)).collect();
        translations.push(Float3Key::new(0.8, 0, Vec3::ZERO));
        translations.push(Float3Key::new(0.2, 1, Vec3::ZERO));
        translations.push(Float3Key::new(1.0, 2, Vec3::ZERO));
        translations.push(Float3Key::new(1.0, 3, Vec3::ZERO));
        translations.push(Float3Key::new(1.0, 0, Vec3::ZERO));
        translations.push(Float3Key::new(0.6, 1, Vec3::ZERO));
        translations.push(Float3Key::new(1.0, 1, Vec3::ZERO));

        let err = Animation::new(
            "",
            1.0,
            2,
            translations.clone(),
            identity_rotations(4),
            constant_keys(4, Vec3::ONE),
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidKeyframes(_)));

        translations[8..].rotate_left(1);
        assert!(
            Animation::new(
                "",
                1.0,
                2,
                translations,
                identity_rotations(4),
                constant_keys(4, Vec3::ONE),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_blob_round_trip() {
        let animation = single_track();
        let mut bytes = Vec::new();
        animation.write(&mut bytes).unwrap();

        let read = Animation::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read, animation);
        assert_ne!(read.id(), animation.id());
    }

    #[test]
    fn test_blob_rejects_skeleton_tag() {
        let mut bytes = Vec::new();
        archive::write_string(&mut bytes, "Skeleton").unwrap();
        bytes.extend_from_slice(&[0xff; 32]);
        let err = Animation::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, AnimError::InvalidTag { expected: "Animation", .. }));
    }
}
