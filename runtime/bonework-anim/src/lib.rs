//! Skeletal animation runtime
//!
//! The per-frame pipeline for one character is three jobs, each consuming
//! the previous job's output buffer:
//!
//! 1. [`SamplingJob`] decodes an [`Animation`] at a time ratio into a local
//!    pose, using a per-character [`SamplingCache`].
//! 2. [`BlendingJob`] mixes several local poses with weights, falling back
//!    to the [`Skeleton`] bind pose where the weights vanish.
//! 3. [`LocalToModelJob`] concatenates the blended local pose down the joint
//!    hierarchy into model-space matrices.
//!
//! Poses are slices of [`SoaTransform`], four joints per element. Jobs
//! validate their inputs first and return an error without writing anything
//! when validation fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_anim::{
//!     Animation, Archive, BlendingJob, BlendingLayer, LocalToModelJob, SamplingCache,
//!     SamplingJob, Skeleton,
//! };
//! use bonework_math::SoaTransform;
//! use glam::Mat4;
//!
//! let skeleton = Skeleton::read(&mut skeleton_bytes)?;
//! let animation = Animation::read(&mut animation_bytes)?;
//!
//! let mut cache = SamplingCache::new(skeleton.num_joints());
//! let mut locals = vec![SoaTransform::IDENTITY; skeleton.num_soa_joints()];
//! let mut blended = locals.clone();
//! let mut models = vec![Mat4::IDENTITY; skeleton.num_joints()];
//!
//! SamplingJob::new(&animation, &mut cache, 0.5, &mut locals).run()?;
//! let layers = [BlendingLayer::new(&locals, 1.0)];
//! BlendingJob::new(&layers, skeleton.bind_pose(), &mut blended).run()?;
//! LocalToModelJob::new(&skeleton, &blended, &mut models).run()?;
//! ```

pub mod animation;
pub mod animation_utils;
pub mod archive;
pub mod blending;
pub mod error;
pub mod local_to_model;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod sampling;
pub mod skeleton;
pub mod skeleton_utils;
pub mod track;

pub use animation::{
    Animation, Float3Key, Keyframe, QuaternionKey, RotationKey, ScaleKey, TranslationKey,
};
pub use archive::Archive;
pub use blending::{BlendingJob, BlendingLayer, DEFAULT_THRESHOLD};
pub use error::{AnimError, Result};
pub use local_to_model::LocalToModelJob;
pub use sampling::{SamplingCache, SamplingJob};
pub use skeleton::{Joint, MAX_JOINTS, MAX_SOA_JOINTS, NO_PARENT, Skeleton};
pub use track::{
    FloatTrack, FloatTrackSamplingJob, Interpolation, TrackEdge, TrackKey, TrackTriggeringJob,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
