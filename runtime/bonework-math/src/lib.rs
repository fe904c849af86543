//! Structure-of-arrays math kernel for skeletal animation
//!
//! Transforms are processed four at a time: every SoA type in this crate
//! stores one `glam::Vec4` per scalar component, lane `i` of each vector
//! belonging to the `i`-th packed element. Groups are padded with identity
//! values so that wide operations never see garbage in unused lanes.
//!
//! # Example
//!
//! ```rust,ignore
//! use bonework_math::{SoaQuaternion, Transform};
//! use glam::{Quat, Vec4};
//!
//! let a = SoaQuaternion::splat(Quat::IDENTITY);
//! let b = SoaQuaternion::splat(Quat::from_rotation_z(1.0));
//! let half_way = SoaQuaternion::nlerp(&a, &b, Vec4::splat(0.5));
//! ```

pub mod soa_float;
pub mod soa_matrix;
pub mod soa_quaternion;
pub mod soa_transform;
pub mod transform;

pub use glam;

pub use soa_float::{SoaFloat3, SoaFloat4, lerp_lanes};
pub use soa_matrix::SoaFloat4x4;
pub use soa_quaternion::SoaQuaternion;
pub use soa_transform::{SOA_WIDTH, SoaTransform, soa_count};
pub use transform::Transform;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
