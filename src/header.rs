//! Parses the version-tagged `.vols` file header (versions 1.0-1.3) into a
//! normalized, tagged-enum `FileHeader`.
//!
//! Field layout per version is reproduced from
//! `original_source/shared/src/vol_geom.c`'s `_read_vol_file_hdr`, extended
//! with the v1.3 unified-file fields (audio chunk location, frame body
//! start) that file's header doesn't cover.

use serde::Serialize;

use crate::byte_reader::{ByteSource, ShortString};
use crate::error::{Result, VolError};

pub const MIN_HEADER_SIZE: i64 = 24;

/// Fields present in every header version.
#[derive(Debug, Clone, Serialize)]
pub struct CommonHeader {
    pub version: u32,
    pub compression: u32,
    pub frame_count: u32,
}

/// Pre-v1.3 only: the Unity-style strings and topology value.
#[derive(Debug, Clone, Serialize)]
pub struct MeshMeta {
    pub mesh_name: ShortString,
    pub material: ShortString,
    pub shader: ShortString,
    pub topology: u32,
}

/// v1.1/v1.2 texture metadata (16-bit dimensions, texture_format present).
#[derive(Debug, Clone, Serialize)]
pub struct TextureMetaLegacy {
    pub has_normals: bool,
    pub is_textured: bool,
    pub texture_width: u32,
    pub texture_height: u32,
    pub texture_format: u16,
}

/// v1.2 only: rigid transform applied to the whole sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TransformMeta {
    /// x, y, z.
    pub translation: [f32; 3],
    /// w, x, y, z. Identity is `[1, 0, 0, 0]`.
    pub rotation: [f32; 4],
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureCompression {
    Mp4,
    Etc1s,
    Uastc,
}

impl TryFrom<u8> for TextureCompression {
    type Error = VolError;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Mp4),
            1 => Ok(Self::Etc1s),
            2 => Ok(Self::Uastc),
            other => Err(VolError::Malformed(format!(
                "unknown texture_compression value {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureContainerFormat {
    Raw,
    Basis,
    Ktx2,
}

impl TryFrom<u8> for TextureContainerFormat {
    type Error = VolError;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Basis),
            2 => Ok(Self::Ktx2),
            other => Err(VolError::Malformed(format!(
                "unknown texture_container_format value {other}"
            ))),
        }
    }
}

/// v1.3 only: 32-bit texture dimensions, compression/container kind, fps,
/// and audio/frame-body layout.
#[derive(Debug, Clone, Serialize)]
pub struct TextureMetaV13 {
    pub has_normals: bool,
    pub is_textured: bool,
    pub texture_compression: TextureCompression,
    pub texture_container_format: TextureContainerFormat,
    pub texture_width: u32,
    pub texture_height: u32,
    pub fps: f32,
    pub has_audio: bool,
    pub audio_start: u32,
    pub frame_body_start: u32,
}

/// Normalized `.vols` header, tagged by version. Shared fields are hoisted
/// into `CommonHeader`; version-specific sections are only present on the
/// variants that carry them.
#[derive(Debug, Clone, Serialize)]
pub enum FileHeader {
    V10 {
        common: CommonHeader,
        mesh: MeshMeta,
    },
    V11 {
        common: CommonHeader,
        mesh: MeshMeta,
        texture: TextureMetaLegacy,
    },
    V12 {
        common: CommonHeader,
        mesh: MeshMeta,
        texture: TextureMetaLegacy,
        transform: TransformMeta,
    },
    V13 {
        common: CommonHeader,
        texture: TextureMetaV13,
    },
}

impl FileHeader {
    pub fn common(&self) -> &CommonHeader {
        match self {
            FileHeader::V10 { common, .. }
            | FileHeader::V11 { common, .. }
            | FileHeader::V12 { common, .. }
            | FileHeader::V13 { common, .. } => common,
        }
    }

    pub fn version(&self) -> u32 {
        self.common().version
    }

    pub fn frame_count(&self) -> u32 {
        self.common().frame_count
    }

    #[allow(dead_code)] // public header introspection, no internal caller yet
    pub fn compression(&self) -> u32 {
        self.common().compression
    }

    pub fn has_normals(&self) -> bool {
        match self {
            FileHeader::V10 { .. } => false,
            FileHeader::V11 { texture, .. } | FileHeader::V12 { texture, .. } => {
                texture.has_normals
            }
            FileHeader::V13 { texture, .. } => texture.has_normals,
        }
    }

    pub fn is_textured(&self) -> bool {
        match self {
            FileHeader::V10 { .. } => false,
            FileHeader::V11 { texture, .. } | FileHeader::V12 { texture, .. } => {
                texture.is_textured
            }
            FileHeader::V13 { texture, .. } => texture.is_textured,
        }
    }

    #[allow(dead_code)] // public header introspection, no internal caller yet
    pub fn texture_dims(&self) -> Option<(u32, u32)> {
        match self {
            FileHeader::V10 { .. } => None,
            FileHeader::V11 { texture, .. } | FileHeader::V12 { texture, .. } => {
                Some((texture.texture_width, texture.texture_height))
            }
            FileHeader::V13 { texture, .. } => {
                Some((texture.texture_width, texture.texture_height))
            }
        }
    }

    /// `keyframe == 2` (backward-tracked) is only meaningful from v1.2 on.
    #[allow(dead_code)] // public header introspection, no internal caller yet
    pub fn allows_backward_tracked(&self) -> bool {
        self.version() >= 12
    }

    #[allow(dead_code)] // public header introspection, no internal caller yet
    pub fn mesh_meta(&self) -> Option<&MeshMeta> {
        match self {
            FileHeader::V10 { mesh, .. } | FileHeader::V11 { mesh, .. } | FileHeader::V12 { mesh, .. } => {
                Some(mesh)
            }
            FileHeader::V13 { .. } => None,
        }
    }

    #[allow(dead_code)] // public header introspection, no internal caller yet
    pub fn transform(&self) -> Option<&TransformMeta> {
        match self {
            FileHeader::V12 { transform, .. } => Some(transform),
            _ => None,
        }
    }

    pub fn v13_texture(&self) -> Option<&TextureMetaV13> {
        match self {
            FileHeader::V13 { texture, .. } => Some(texture),
            _ => None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.v13_texture().map(|t| t.has_audio).unwrap_or(false)
    }

    pub fn audio_start(&self) -> Option<u32> {
        self.v13_texture().map(|t| t.audio_start)
    }

    pub fn frame_body_start(&self) -> Option<u32> {
        self.v13_texture().map(|t| t.frame_body_start)
    }
}

/// Parse a `.vols` header from the start of `src`. Returns the normalized
/// header and the number of bytes consumed (`hdr_sz`).
pub fn parse_header<S: ByteSource>(src: &mut S) -> Result<(FileHeader, i64)> {
    if src.len() < MIN_HEADER_SIZE {
        return Err(VolError::Truncated {
            offset: 0,
            needed: MIN_HEADER_SIZE,
            available: src.len(),
        });
    }

    src.read_format_tag()?;

    let version = src.read_u32_le()?;
    if !matches!(version, 10 | 11 | 12 | 13) {
        return Err(VolError::Malformed(format!(
            "unsupported .vols version {version}"
        )));
    }
    let compression = src.read_u32_le()?;

    if version == 13 {
        let frame_count = src.read_u32_le()?;
        let has_normals = src.read_bool_u8()?;
        let is_textured = src.read_bool_u8()?;
        let texture_compression = TextureCompression::try_from(src.read_u8()?)?;
        let texture_container_format = TextureContainerFormat::try_from(src.read_u8()?)?;
        let texture_width = src.read_u32_le()?;
        let texture_height = src.read_u32_le()?;
        let fps = src.read_f32_le()?;
        let has_audio = src.read_u32_le()? != 0;
        let audio_start = src.read_u32_le()?;
        let frame_body_start = src.read_u32_le()?;

        let hdr_sz = src.position();
        if hdr_sz != 44 {
            return Err(VolError::Malformed(format!(
                "v1.3 header should be exactly 44 bytes, parsed {hdr_sz}"
            )));
        }
        if audio_start != 44 {
            return Err(VolError::Malformed(format!(
                "v1.3 audio_start must be 44, got {audio_start}"
            )));
        }

        let header = FileHeader::V13 {
            common: CommonHeader {
                version,
                compression,
                frame_count,
            },
            texture: TextureMetaV13 {
                has_normals,
                is_textured,
                texture_compression,
                texture_container_format,
                texture_width,
                texture_height,
                fps,
                has_audio,
                audio_start,
                frame_body_start,
            },
        };
        return Ok((header, hdr_sz));
    }

    // Pre-v1.3: mesh_name, material, shader, topology, then frame_count.
    let mesh_name = src.read_short_string()?;
    let material = src.read_short_string()?;
    let shader = src.read_short_string()?;
    let topology = src.read_u32_le()?;
    let frame_count = src.read_u32_le()?;
    let common = CommonHeader {
        version,
        compression,
        frame_count,
    };
    let mesh = MeshMeta {
        mesh_name,
        material,
        shader,
        topology,
    };

    if version == 10 {
        let hdr_sz = src.position();
        return Ok((FileHeader::V10 { common, mesh }, hdr_sz));
    }

    // v1.1+: has_normals, is_textured, tex_w, tex_h, tex_format (u16 each).
    let has_normals = src.read_bool_u8()?;
    let is_textured = src.read_bool_u8()?;
    let texture_width = src.read_u16_le()? as u32;
    let texture_height = src.read_u16_le()? as u32;
    let texture_format = src.read_u16_le()?;
    let texture = TextureMetaLegacy {
        has_normals,
        is_textured,
        texture_width,
        texture_height,
        texture_format,
    };

    if version == 11 {
        let hdr_sz = src.position();
        return Ok((
            FileHeader::V11 {
                common,
                mesh,
                texture,
            },
            hdr_sz,
        ));
    }

    // v1.2: translation, rotation (quaternion, w-first), scale.
    let translation = [
        src.read_f32_le()?,
        src.read_f32_le()?,
        src.read_f32_le()?,
    ];
    let rotation = [
        src.read_f32_le()?,
        src.read_f32_le()?,
        src.read_f32_le()?,
        src.read_f32_le()?,
    ];
    let scale = src.read_f32_le()?;
    let transform = TransformMeta {
        translation,
        rotation,
        scale,
    };

    let hdr_sz = src.position();
    Ok((
        FileHeader::V12 {
            common,
            mesh,
            texture,
            transform,
        },
        hdr_sz,
    ))
}
