//! # vologram-geom
//!
//! Bounds-safe decoder for `.vols` volumetric-video geometry containers
//! (versions 1.0-1.3), both the split header/sequence layout and the
//! unified single-file layout.
//!
//! A vologram pairs a per-frame 3D mesh sequence with a textured video
//! stream; this crate decodes the mesh-sequence container only. Video
//! texture decoding, Basis Universal transcoding, and audio decoding are
//! the host's job — this crate only locates the relevant byte ranges.
//!
//! ```no_run
//! use std::path::Path;
//!
//! # fn run() -> Result<(), vologram_geom::VolError> {
//! let mut session = vologram_geom::open_unified(Path::new("clip.vols"))?;
//! for i in 0..session.frame_count() {
//!     let frame = session.read_frame(i)?;
//!     let _vertices = frame.vertices();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A `ContainerSession` is not `Sync`; serialize access across threads
//! yourself, or give each thread its own session.

pub mod byte_reader;
pub mod directory;
pub mod error;
pub mod frame;
pub mod header;
pub mod session;

pub use byte_reader::{ByteSource, ShortString};
pub use directory::{FrameDirectoryEntry, FrameHeader, Keyframe};
pub use error::{Result, VolError};
pub use frame::FramePayloadView;
pub use header::{CommonHeader, FileHeader, MeshMeta, TransformMeta};
pub use session::{open_split, open_unified, ContainerSession};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
