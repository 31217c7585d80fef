//! One-pass scan of the frame sequence that builds a random-access
//! directory without materializing every frame's payload.
//!
//! Grounded in `original_source/shared/src/vol_geom.c`'s directory-building
//! loop (`vol_geom_create_file_info`): the +8/+4/+4 correction terms below
//! reproduce that function's arithmetic exactly.

use serde::Serialize;

use crate::byte_reader::ByteSource;
use crate::error::{Result, VolError};
use crate::header::FileHeader;

/// Sanity cap on any single frame's total on-disk size. A frame claiming to
/// be larger is treated as corruption, not a legitimately huge frame.
pub const MAX_FRAME_TOTAL_SZ: i64 = 1 << 30;

/// Fixed on-disk size of a frame record's leading header
/// (`frame_number:u32`, `mesh_data_sz:u32`, `keyframe:u8`).
pub const FRAME_HEADER_SZ: i64 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Keyframe {
    Tracked,
    Key,
    BackwardTracked,
}

impl Keyframe {
    pub fn is_keyframe(self) -> bool {
        matches!(self, Keyframe::Key | Keyframe::BackwardTracked)
    }

    fn from_wire(raw: u8, version: u32) -> Result<Self> {
        match raw {
            0 => Ok(Keyframe::Tracked),
            1 => Ok(Keyframe::Key),
            2 if version >= 12 => Ok(Keyframe::BackwardTracked),
            2 => Err(VolError::Malformed(
                "keyframe == 2 (backward-tracked) requires version >= 12".to_string(),
            )),
            other => Err(VolError::Malformed(format!(
                "unknown keyframe value {other}"
            ))),
        }
    }
}

/// The leading fixed-size header of a single frame record.
#[derive(Debug, Clone, Serialize)]
pub struct FrameHeader {
    pub frame_number: u32,
    pub mesh_data_sz: u32,
    pub keyframe: Keyframe,
}

/// Derived, never persisted: where a frame lives in the sequence and how
/// large its corrected payload is.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameDirectoryEntry {
    pub offset_sz: i64,
    pub hdr_sz: i64,
    pub corrected_payload_sz: i64,
    pub total_sz: i64,
}

/// `mesh_data_sz` under versions < 12 excludes some per-array 4-byte size
/// prefixes that version >= 12 bakes in. Reconstruct the true payload size
/// those prefixes add up to.
fn correct_payload_sz(header: &FileHeader, mesh_data_sz: u32, keyframe: Keyframe) -> i64 {
    let mut sz = mesh_data_sz as i64;
    if header.version() < 12 {
        if keyframe == Keyframe::Key {
            sz += 8; // indices + uvs size prefixes
        }
        if header.version() == 11 && header.has_normals() {
            sz += 4; // normals size prefix
        }
        if header.version() == 11 && header.is_textured() {
            sz += 4; // texture size prefix
        }
    }
    sz
}

/// Scan `frame_count` frame records starting at the source's current
/// position, producing the directory, per-frame headers, and the largest
/// observed `total_sz` (used to size the scratch buffer).
pub fn build_directory<S: ByteSource>(
    src: &mut S,
    header: &FileHeader,
) -> Result<(Vec<FrameDirectoryEntry>, Vec<FrameHeader>, i64)> {
    let frame_count = header.frame_count();
    let file_size = src.len();

    let mut directory = Vec::with_capacity(frame_count as usize);
    let mut headers = Vec::with_capacity(frame_count as usize);
    let mut biggest_frame_total_sz: i64 = 0;

    for i in 0..frame_count {
        let offset_sz = src.position();

        let frame_number = src.read_u32_le()?;
        if frame_number != i {
            return Err(VolError::Malformed(format!(
                "frame {i}: frame_number field is {frame_number}, expected {i}"
            )));
        }

        let mesh_data_sz = src.read_u32_le()?;
        if mesh_data_sz as i64 > file_size {
            return Err(VolError::Malformed(format!(
                "frame {i}: mesh_data_sz {mesh_data_sz} exceeds file size {file_size}"
            )));
        }

        let keyframe = Keyframe::from_wire(src.read_u8()?, header.version())?;

        let hdr_sz = src.position() - offset_sz;
        debug_assert_eq!(hdr_sz, FRAME_HEADER_SZ);

        let corrected_payload_sz = correct_payload_sz(header, mesh_data_sz, keyframe);
        if corrected_payload_sz > file_size {
            return Err(VolError::Malformed(format!(
                "frame {i}: corrected payload size {corrected_payload_sz} exceeds file size {file_size}"
            )));
        }

        // Skip the payload plus the trailing redundant size word.
        let skip = corrected_payload_sz + 4;
        let target = src.position() + skip;
        if target > file_size {
            return Err(VolError::Truncated {
                offset: src.position(),
                needed: skip,
                available: file_size - src.position(),
            });
        }
        src.seek_to(target)?;

        let total_sz = src.position() - offset_sz;
        if total_sz > file_size {
            return Err(VolError::Malformed(format!(
                "frame {i}: total_sz {total_sz} exceeds file size {file_size}"
            )));
        }

        biggest_frame_total_sz = biggest_frame_total_sz.max(total_sz);

        directory.push(FrameDirectoryEntry {
            offset_sz,
            hdr_sz,
            corrected_payload_sz,
            total_sz,
        });
        headers.push(FrameHeader {
            frame_number,
            mesh_data_sz,
            keyframe,
        });
    }

    if biggest_frame_total_sz >= MAX_FRAME_TOTAL_SZ {
        return Err(VolError::Malformed(format!(
            "largest frame ({biggest_frame_total_sz} bytes) exceeds the 1 GiB sanity cap"
        )));
    }

    Ok((directory, headers, biggest_frame_total_sz))
}
