//! User-channel float tracks
//!
//! A [`FloatTrack`] animates one scalar that is not a joint transform, such
//! as a grab weight or a footstep marker. [`FloatTrackSamplingJob`] reads its
//! value at a ratio and [`TrackTriggeringJob`] reports where the curve
//! crosses a threshold between two ratios.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::track::{FloatTrack, TrackKey, TrackTriggeringJob};
//!
//! let contact = FloatTrack::new("left_foot", vec![
//!     TrackKey::step(0.0, 0.0),
//!     TrackKey::step(0.4, 1.0),
//!     TrackKey::step(0.9, 0.0),
//!     TrackKey::step(1.0, 0.0),
//! ])?;
//!
//! let mut edges = Vec::new();
//! TrackTriggeringJob::new(&contact, previous_ratio, ratio, &mut edges)
//!     .with_threshold(0.5)
//!     .run()?;
//! for edge in &edges {
//!     if edge.rising {
//!         play_footstep();
//!     }
//! }
//! ```

use crate::archive::{self, Archive};
use crate::error::{AnimError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Largest magnitude accepted for a triggering bound. Past it, one loop
/// of the track is below `f32` resolution.
const MAX_TRIGGER_RATIO: f32 = (1 << 24) as f32;

/// Most keys a track may declare when reading a blob
const MAX_TRACK_KEYS: usize = 1 << 20;

/// How the value moves from a key to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Held until the next key, then jumps
    Step,
    /// Linear toward the next key
    Linear,
}

/// One key of a float track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackKey {
    pub ratio: f32,
    pub value: f32,
    pub interpolation: Interpolation,
}

impl TrackKey {
    pub fn linear(ratio: f32, value: f32) -> Self {
        Self {
            ratio,
            value,
            interpolation: Interpolation::Linear,
        }
    }

    pub fn step(ratio: f32, value: f32) -> Self {
        Self {
            ratio,
            value,
            interpolation: Interpolation::Step,
        }
    }
}

/// Immutable scalar curve over the ratio range `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct FloatTrack {
    name: String,
    ratios: Box<[f32]>,
    values: Box<[f32]>,
    /// One bit per key, set when the key is a step key
    steps: Box<[u8]>,
}

impl FloatTrack {
    /// Build a track from keys sorted by ratio
    ///
    /// Ratios must be strictly increasing, start at 0 and end at 1.
    pub fn new(name: impl Into<String>, keys: Vec<TrackKey>) -> Result<Self> {
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return Err(AnimError::InvalidTrack("no keys".to_string()));
        };
        if keys.len() < 2 || first.ratio != 0.0 || last.ratio != 1.0 {
            return Err(AnimError::InvalidTrack(
                "keys must span ratios 0 to 1".to_string(),
            ));
        }
        if let Some(index) = keys.windows(2).position(|pair| pair[0].ratio >= pair[1].ratio) {
            return Err(AnimError::InvalidTrack(format!(
                "key {} is not after key {}",
                index + 1,
                index
            )));
        }
        if let Some(index) = keys.iter().position(|key| !key.value.is_finite()) {
            return Err(AnimError::InvalidTrack(format!(
                "key {index} has a non-finite value"
            )));
        }

        let mut steps = vec![0u8; keys.len().div_ceil(8)];
        for (index, key) in keys.iter().enumerate() {
            if key.interpolation == Interpolation::Step {
                steps[index / 8] |= 1 << (index % 8);
            }
        }

        Ok(Self {
            name: name.into(),
            ratios: keys.iter().map(|key| key.ratio).collect(),
            values: keys.iter().map(|key| key.value).collect(),
            steps: steps.into_boxed_slice(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ratios(&self) -> &[f32] {
        &self.ratios
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn num_keys(&self) -> usize {
        self.ratios.len()
    }

    /// Interpolation of the segment starting at `key`
    pub fn interpolation(&self, key: usize) -> Interpolation {
        let step = self
            .steps
            .get(key / 8)
            .is_some_and(|byte| byte & (1 << (key % 8)) != 0);
        if step {
            Interpolation::Step
        } else {
            Interpolation::Linear
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = TrackKey> + '_ {
        (0..self.num_keys()).map(|index| TrackKey {
            ratio: self.ratios[index],
            value: self.values[index],
            interpolation: self.interpolation(index),
        })
    }

    /// Value at `ratio`, which must already be in `[0, 1]`
    fn evaluate(&self, ratio: f32) -> f32 {
        // First key strictly after `ratio`, or the last key at ratio 1
        let right = self
            .ratios
            .partition_point(|&r| r <= ratio)
            .clamp(1, self.ratios.len() - 1);
        let left = right - 1;
        let (r0, r1) = (self.ratios[left], self.ratios[right]);
        let (v0, v1) = (self.values[left], self.values[right]);

        match self.interpolation(left) {
            Interpolation::Step if ratio >= r1 => v1,
            Interpolation::Step => v0,
            Interpolation::Linear => {
                let alpha = (ratio - r0) / (r1 - r0);
                v0 * (1.0 - alpha) + v1 * alpha
            }
        }
    }
}

impl Archive for FloatTrack {
    const TAG: &'static str = "FloatTrack";
    const VERSION: u32 = 1;

    fn read_body<R: Read>(reader: &mut R, _version: u32) -> Result<Self> {
        let name = archive::read_string(reader)?;
        let count = reader.read_u32::<LittleEndian>()? as usize;
        if count > MAX_TRACK_KEYS {
            return Err(AnimError::InvalidTrack(format!("{count} keys declared")));
        }
        let keys = (0..count)
            .map(|_| {
                let ratio = reader.read_f32::<LittleEndian>()?;
                let value = reader.read_f32::<LittleEndian>()?;
                let interpolation = match reader.read_u8()? {
                    0 => Interpolation::Step,
                    1 => Interpolation::Linear,
                    other => {
                        return Err(AnimError::InvalidTrack(format!(
                            "unknown interpolation {other}"
                        )));
                    }
                };
                Ok(TrackKey {
                    ratio,
                    value,
                    interpolation,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(name, keys)
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        archive::write_string(writer, &self.name)?;
        writer.write_u32::<LittleEndian>(self.num_keys() as u32)?;
        for key in self.keys() {
            writer.write_f32::<LittleEndian>(key.ratio)?;
            writer.write_f32::<LittleEndian>(key.value)?;
            writer.write_u8(match key.interpolation {
                Interpolation::Step => 0,
                Interpolation::Linear => 1,
            })?;
        }
        Ok(())
    }
}

/// Samples a float track at a ratio
pub struct FloatTrackSamplingJob<'a> {
    pub track: &'a FloatTrack,
    /// Time ratio, clamped into `[0, 1]`
    pub ratio: f32,
    pub output: &'a mut f32,
}

impl<'a> FloatTrackSamplingJob<'a> {
    pub fn new(track: &'a FloatTrack, ratio: f32, output: &'a mut f32) -> Self {
        Self {
            track,
            ratio,
            output,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ratio.is_nan() {
            return Err(AnimError::InvalidRatio(self.ratio));
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if let Err(err) = self.validate() {
            log::debug!("Track sampling job rejected: {}", err);
            return Err(err);
        }
        *self.output = self.track.evaluate(self.ratio.clamp(0.0, 1.0));
        Ok(())
    }
}

/// A threshold crossing found by [`TrackTriggeringJob`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackEdge {
    /// Ratio of the crossing, in the same looped space as `from` and `to`
    pub ratio: f32,
    /// True when the value goes from below the threshold to at or above it,
    /// in the direction of play
    pub rising: bool,
}

/// Detects where a float track crosses a threshold between two ratios
///
/// `from` and `to` are ratios that may go past `[0, 1]`: ratio `2.25` is a
/// quarter of the way into the third loop. Playing backward (`to < from`)
/// reports edges in decreasing ratio order with their direction flipped.
/// The window includes `from` and excludes `to`, except when `to` lands on
/// the end of a loop.
pub struct TrackTriggeringJob<'a> {
    pub track: &'a FloatTrack,
    pub from: f32,
    pub to: f32,
    /// Crossing level, 0 by default
    pub threshold: f32,
    /// Cleared, then filled with the edges in play order
    pub edges: &'a mut Vec<TrackEdge>,
}

impl<'a> TrackTriggeringJob<'a> {
    pub fn new(track: &'a FloatTrack, from: f32, to: f32, edges: &'a mut Vec<TrackEdge>) -> Self {
        Self {
            track,
            from,
            to,
            threshold: 0.0,
            edges,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for bound in [self.from, self.to] {
            if !bound.is_finite() || bound.abs() > MAX_TRIGGER_RATIO {
                return Err(AnimError::InvalidRatio(bound));
            }
        }
        if !self.threshold.is_finite() {
            return Err(AnimError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if let Err(err) = self.validate() {
            log::debug!("Track triggering job rejected: {}", err);
            return Err(err);
        }

        self.edges.clear();
        if self.from == self.to {
            return Ok(());
        }

        let forward = self.to > self.from;
        let (start, end) = if forward {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        };

        let track = self.track;
        let ratios = track.ratios();
        let values = track.values();
        let threshold = self.threshold;

        // Value the previous loop ended on, compared with the first key
        let mut previous = values[values.len() - 1];
        let mut lap = start.floor();
        let mut local_from = start - lap;

        while lap < end {
            let local_to = (end - lap).min(1.0);
            let first = if local_from == 0.0 {
                0
            } else {
                1 + ratios[1..].partition_point(|&r| r < local_from)
            };

            for index in first..ratios.len() {
                let v0 = if index == 0 { previous } else { values[index - 1] };
                let v1 = values[index];
                previous = v1;

                let rising = if v0 < threshold && v1 >= threshold {
                    Some(forward)
                } else if v0 >= threshold && v1 < threshold {
                    Some(!forward)
                } else {
                    None
                };

                if let Some(rising) = rising {
                    // The wrap from the last key to the first one is a jump
                    let jump = index == 0 || track.interpolation(index - 1) == Interpolation::Step;
                    let ratio = if jump {
                        ratios[index]
                    } else {
                        let alpha = (threshold - v0) / (v1 - v0);
                        ratios[index - 1] * (1.0 - alpha) + ratios[index] * alpha
                    };

                    if ratio >= local_from && (ratio < local_to || local_to == 1.0) {
                        self.edges.push(TrackEdge {
                            ratio: ratio + lap,
                            rising,
                        });
                    }
                }

                if ratios[index] >= local_to {
                    break;
                }
            }

            lap += 1.0;
            local_from = 0.0;
        }

        if !forward {
            self.edges.reverse();
        }
        Ok(())
    }
}
