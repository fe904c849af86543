//! Binary blob framing shared by skeletons and animations
//!
//! Every blob starts with a length-prefixed ASCII tag followed by a `u32`
//! version. Both are checked before the body is decoded. All values are
//! little-endian.

use crate::error::{AnimError, Result};
use bonework_math::{SoaFloat3, SoaQuaternion, SoaTransform};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec4;
use std::io::{Read, Write};

/// Longest tag read back for an error message
const MAX_TAG_LEN: usize = 64;

/// Longest joint or animation name accepted when reading
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// A type with a tagged, versioned binary representation
pub trait Archive: Sized {
    /// Type marker written at the start of the blob
    const TAG: &'static str;
    /// Current body layout version
    const VERSION: u32;

    /// Decode the body, after tag and version have been checked
    fn read_body<R: Read>(reader: &mut R, version: u32) -> Result<Self>;

    /// Encode the body
    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Read a complete blob, rejecting a foreign tag or unknown version
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let version = read_header(reader, Self::TAG)?;
        if version == 0 || version > Self::VERSION {
            return Err(AnimError::UnsupportedVersion {
                kind: Self::TAG,
                version,
            });
        }
        log::trace!("Reading {} blob, version {}", Self::TAG, version);
        Self::read_body(reader, version)
    }

    /// Write a complete blob: tag, version, body
    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_string(writer, Self::TAG)?;
        writer.write_u32::<LittleEndian>(Self::VERSION)?;
        self.write_body(writer)
    }
}

/// Read the tag and return the version that follows it
fn read_header<R: Read>(reader: &mut R, expected: &'static str) -> Result<u32> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    if len != expected.len() {
        let actual = if len <= MAX_TAG_LEN {
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            format!("<{len} bytes>")
        };
        return Err(AnimError::InvalidTag { expected, actual });
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    if bytes != expected.as_bytes() {
        return Err(AnimError::InvalidTag {
            expected,
            actual: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(reader.read_u32::<LittleEndian>()?)
}

pub(crate) fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    if len > MAX_NAME_LEN {
        return Err(AnimError::StringTooLong(len));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

pub(crate) fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    if value.len() > MAX_NAME_LEN {
        return Err(AnimError::StringTooLong(value.len()));
    }
    writer.write_u32::<LittleEndian>(value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_lanes<R: Read>(reader: &mut R) -> Result<Vec4> {
    let mut lanes = [0f32; 4];
    reader.read_f32_into::<LittleEndian>(&mut lanes)?;
    Ok(Vec4::from_array(lanes))
}

fn write_lanes<W: Write>(writer: &mut W, lanes: Vec4) -> Result<()> {
    for value in lanes.to_array() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}

/// Read one SoA group: translation x/y/z, rotation x/y/z/w, scale x/y/z lanes
pub(crate) fn read_soa_transform<R: Read>(reader: &mut R) -> Result<SoaTransform> {
    let translation = SoaFloat3::new(read_lanes(reader)?, read_lanes(reader)?, read_lanes(reader)?);
    let rotation = SoaQuaternion::new(
        read_lanes(reader)?,
        read_lanes(reader)?,
        read_lanes(reader)?,
        read_lanes(reader)?,
    );
    let scale = SoaFloat3::new(read_lanes(reader)?, read_lanes(reader)?, read_lanes(reader)?);
    Ok(SoaTransform {
        translation,
        rotation,
        scale,
    })
}

pub(crate) fn write_soa_transform<W: Write>(writer: &mut W, soa: &SoaTransform) -> Result<()> {
    let SoaTransform {
        translation,
        rotation,
        scale,
    } = soa;
    for lanes in [translation.x, translation.y, translation.z] {
        write_lanes(writer, lanes)?;
    }
    for lanes in [rotation.x, rotation.y, rotation.z, rotation.w] {
        write_lanes(writer, lanes)?;
    }
    for lanes in [scale.x, scale.y, scale.z] {
        write_lanes(writer, lanes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonework_math::Transform;
    use glam::{Quat, Vec3};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[derive(Debug, PartialEq)]
    struct Marker(u16);

    impl Archive for Marker {
        const TAG: &'static str = "Marker";
        const VERSION: u32 = 2;

        fn read_body<R: Read>(reader: &mut R, _version: u32) -> Result<Self> {
            Ok(Self(reader.read_u16::<LittleEndian>()?))
        }

        fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
            writer.write_u16::<LittleEndian>(self.0)?;
            Ok(())
        }
    }

    #[test]
    fn test_tag_and_version_layout() {
        let mut bytes = Vec::new();
        Marker(7).write(&mut bytes).unwrap();
        assert_eq!(&bytes[..4], &6u32.to_le_bytes());
        assert_eq!(&bytes[4..10], b"Marker");
        assert_eq!(&bytes[10..14], &2u32.to_le_bytes());
        assert_eq!(Marker::read(&mut Cursor::new(bytes)).unwrap(), Marker(7));
    }

    #[test]
    fn test_wrong_tag_rejected_before_body() {
        let mut bytes = Vec::new();
        write_string(&mut bytes, "Marked").unwrap();
        // No version or body follows: the tag check must fail first
        let err = Marker::read(&mut Cursor::new(bytes)).unwrap_err();
        match err {
            AnimError::InvalidTag { expected, actual } => {
                assert_eq!(expected, "Marker");
                assert_eq!(actual, "Marked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_huge_tag_length_not_allocated() {
        let bytes = u32::MAX.to_le_bytes().to_vec();
        let err = Marker::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, AnimError::InvalidTag { .. }));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = Vec::new();
        write_string(&mut bytes, "Marker").unwrap();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        let err = Marker::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            AnimError::UnsupportedVersion { version: 3, .. }
        ));
    }

    #[test]
    fn test_soa_transform_layout() {
        let mut soa = SoaTransform::IDENTITY;
        soa.set_lane(
            1,
            &Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_x(0.5), Vec3::splat(2.0)),
        );

        let mut bytes = Vec::new();
        write_soa_transform(&mut bytes, &soa).unwrap();
        assert_eq!(bytes.len(), 40 * 4);

        // translation.x lanes come first
        assert_eq!(&bytes[4..8], &1.0f32.to_le_bytes());

        let read = read_soa_transform(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read, soa);
    }
}
