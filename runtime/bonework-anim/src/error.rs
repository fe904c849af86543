use std::io;
use thiserror::Error;

/// Error types for skeleton/animation loading and the runtime jobs
///
/// Job validation failures are reported before any output is written, so an
/// `Err` from a job always leaves the output buffers untouched.
#[derive(Error, Debug)]
pub enum AnimError {
    /// I/O error during reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The blob does not start with the expected type tag
    #[error("Invalid tag: expected '{expected}', got '{actual}'")]
    InvalidTag {
        expected: &'static str,
        actual: String,
    },

    /// The blob tag is correct but its version is unknown
    #[error("Unsupported {kind} version: {version}")]
    UnsupportedVersion { kind: &'static str, version: u32 },

    /// A joint or animation name is not valid UTF-8
    #[error("Invalid name: {0}")]
    InvalidName(#[from] std::string::FromUtf8Error),

    /// A length-prefixed string is longer than any name can be
    #[error("String too long: {0} bytes")]
    StringTooLong(usize),

    /// Joint count above `MAX_JOINTS`
    #[error("Too many joints: {count} exceeds the maximum of {max}")]
    TooManyJoints { count: usize, max: usize },

    /// A joint's parent does not precede it
    #[error("Invalid parent {parent} for joint {joint}: parents must precede their children")]
    InvalidParent { joint: usize, parent: usize },

    /// Keyframes are not laid out in forward-decoding order
    #[error("Invalid keyframes: {0}")]
    InvalidKeyframes(String),

    /// Float track keys are empty, out of order or do not span `[0, 1]`
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Animation duration is not a positive finite number
    #[error("Invalid duration: {0}")]
    InvalidDuration(f32),

    /// A buffer handed to a job is smaller than the job requires
    #[error("{buffer} buffer too small: {required} required, {actual} provided")]
    BufferTooSmall {
        buffer: &'static str,
        required: usize,
        actual: usize,
    },

    /// The sampling output buffer is empty
    #[error("Empty output buffer")]
    EmptyOutput,

    /// The sampling cache cannot hold the animation's tracks
    #[error("Sampling cache too small: {required} SoA tracks required, capacity is {capacity}")]
    CacheTooSmall { required: usize, capacity: usize },

    /// Sampling ratio is NaN, or a triggering bound is not usable
    #[error("Invalid ratio: {0}")]
    InvalidRatio(f32),

    /// Local-to-model range with `from > to`
    #[error("Invalid joint range: from {from} is past to {to}")]
    InvalidRange { from: usize, to: usize },

    /// Blending threshold is not a positive finite number, or a triggering
    /// threshold is not finite
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f32),

    /// A blending layer weight is NaN or infinite
    #[error("Non-finite weight {weight} on layer {layer}")]
    NonFiniteWeight { layer: usize, weight: f32 },

    /// Blending was asked to run without any base layer
    #[error("Blending requires at least one layer")]
    NoLayers,
}

/// Result type using AnimError
pub type Result<T> = std::result::Result<T, AnimError>;
