//! Walks a loaded frame payload (vertices/normals/indices/uvs/texture,
//! each prefixed by a `u32` size) and locates each sub-section within the
//! scratch buffer.
//!
//! Grounded in `original_source/shared/src/vol_geom.c`'s `_read_vol_frame`,
//! which walks the same sections in the same order.

use crate::directory::Keyframe;
use crate::error::{Result, VolError};
use crate::header::FileHeader;

/// Offset and size of one sub-section within the session's scratch buffer.
/// Offsets are relative to the start of the scratch buffer (i.e. they
/// already include `hdr_sz`), so callers can index `scratch[offset..][..size]`
/// directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Section {
    pub offset: i64,
    pub size: u32,
}

/// Locations of each optional sub-section of one frame's payload. Sections
/// that don't apply to this frame's version/keyframe combination are left
/// at the default (offset 0, size 0) and must not be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePayloadView<'a> {
    pub vertices: Section,
    pub normals: Option<Section>,
    pub indices: Option<Section>,
    pub uvs: Option<Section>,
    pub texture: Option<Section>,
    scratch: &'a [u8],
}

impl<'a> FramePayloadView<'a> {
    pub fn vertices(&self) -> &'a [u8] {
        slice_of(self.scratch, self.vertices)
    }

    pub fn normals(&self) -> Option<&'a [u8]> {
        self.normals.map(|s| slice_of(self.scratch, s))
    }

    pub fn indices(&self) -> Option<&'a [u8]> {
        self.indices.map(|s| slice_of(self.scratch, s))
    }

    pub fn uvs(&self) -> Option<&'a [u8]> {
        self.uvs.map(|s| slice_of(self.scratch, s))
    }

    pub fn texture(&self) -> Option<&'a [u8]> {
        self.texture.map(|s| slice_of(self.scratch, s))
    }
}

fn slice_of(scratch: &[u8], section: Section) -> &[u8] {
    let start = section.offset as usize;
    let end = start + section.size as usize;
    &scratch[start..end]
}

/// Read a `(size: u32, payload)` pair starting at `cursor` (relative to
/// `payload_start`), returning the section location and the cursor
/// advanced past the payload. `blob` is the full scratch buffer;
/// `payload_start..payload_start+payload_len` is the region this frame's
/// corrected payload occupies within it.
fn read_section(
    blob: &[u8],
    payload_start: i64,
    payload_len: i64,
    cursor: i64,
) -> Result<(Section, i64)> {
    if cursor + 4 > payload_len {
        return Err(VolError::Malformed(format!(
            "frame payload section size prefix at {cursor} runs past payload end {payload_len}"
        )));
    }
    let abs = (payload_start + cursor) as usize;
    let size = u32::from_le_bytes(blob[abs..abs + 4].try_into().unwrap());
    if cursor + 4 + size as i64 > payload_len {
        return Err(VolError::Malformed(format!(
            "frame payload section at {cursor} declares {size} bytes, runs past payload end {payload_len}"
        )));
    }
    let section = Section {
        offset: payload_start + cursor + 4,
        size,
    };
    Ok((section, cursor + 4 + size as i64))
}

/// Parse one frame's payload. `blob` is the scratch buffer holding the full
/// frame record (header + payload + trailing size word); `payload_start` is
/// `hdr_sz`, the byte offset within `blob` where the payload begins;
/// `payload_len` is `corrected_payload_sz`.
pub fn parse_frame_payload<'a>(
    blob: &'a [u8],
    payload_start: i64,
    payload_len: i64,
    header: &FileHeader,
    keyframe: Keyframe,
) -> Result<FramePayloadView<'a>> {
    let mut cursor = 0i64;

    let (vertices, next) = read_section(blob, payload_start, payload_len, cursor)?;
    cursor = next;

    let normals = if header.has_normals() && header.version() >= 11 {
        let (s, next) = read_section(blob, payload_start, payload_len, cursor)?;
        cursor = next;
        Some(s)
    } else {
        None
    };

    let carries_topology =
        keyframe == Keyframe::Key || (header.version() >= 12 && keyframe == Keyframe::BackwardTracked);

    let indices = if carries_topology {
        let (s, next) = read_section(blob, payload_start, payload_len, cursor)?;
        cursor = next;
        Some(s)
    } else {
        None
    };

    let uvs = if carries_topology {
        let (s, next) = read_section(blob, payload_start, payload_len, cursor)?;
        cursor = next;
        Some(s)
    } else {
        None
    };

    let texture = if header.version() >= 11 && header.is_textured() {
        let (s, next) = read_section(blob, payload_start, payload_len, cursor)?;
        cursor = next;
        Some(s)
    } else {
        None
    };

    let _ = cursor;

    Ok(FramePayloadView {
        vertices,
        normals,
        indices,
        uvs,
        texture,
        scratch: blob,
    })
}
