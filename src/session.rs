//! Owns a decoded vologram's header, frame directory, and scratch buffer,
//! and exposes the random-access playback API.
//!
//! A `ContainerSession` is **not** `Sync`: it holds a plain `Vec<u8>`
//! scratch buffer mutated in place by `read_frame`, with no interior
//! synchronization. Callers sharing a session across threads must
//! serialize access themselves (see module-level note in `lib.rs`);
//! separate sessions in separate threads need no coordination at all.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::byte_reader::{ByteSource, FileSource, SliceSource};
use crate::directory::{build_directory, FrameDirectoryEntry, FrameHeader};
use crate::error::{Result, VolError};
use crate::frame::{parse_frame_payload, FramePayloadView};
use crate::header::{parse_header, FileHeader};

enum SequenceSource {
    Preloaded(Vec<u8>),
    Streaming(File),
}

pub struct ContainerSession {
    header: FileHeader,
    directory: Vec<FrameDirectoryEntry>,
    frame_headers: Vec<FrameHeader>,
    scratch: Vec<u8>,
    /// Byte offset of the frame stream within whichever file holds it. 0
    /// for split-mode sequence files (which start counting at their own
    /// byte 0); `frame_body_start`/`hdr_sz` for unified files.
    sequence_offset: i64,
    audio_blob: Option<Vec<u8>>,
    source: SequenceSource,
}

impl ContainerSession {
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn frame_count(&self) -> u32 {
        self.header.frame_count()
    }

    pub fn is_keyframe(&self, i: u32) -> bool {
        i < self.frame_count() && self.frame_headers[i as usize].keyframe.is_keyframe()
    }

    /// Greatest `j <= i` with `is_keyframe(j)`, or `None` if there is no
    /// such `j` or `i` is out of range.
    pub fn find_previous_keyframe(&self, i: u32) -> Option<u32> {
        if i >= self.frame_count() {
            return None;
        }
        (0..=i).rev().find(|&j| self.is_keyframe(j))
    }

    pub fn audio(&self) -> Option<&[u8]> {
        self.audio_blob.as_deref()
    }

    /// Fetch frame `i` into the scratch buffer and parse its payload
    /// sections. The returned view borrows the scratch buffer; it is
    /// invalidated (the borrow checker enforces this) by the next call to
    /// `read_frame`.
    pub fn read_frame(&mut self, i: u32) -> Result<FramePayloadView<'_>> {
        let frame_count = self.frame_count();
        if i >= frame_count {
            return Err(VolError::OutOfRange {
                index: i,
                frame_count,
            });
        }

        let entry = self.directory[i as usize];
        let keyframe = self.frame_headers[i as usize].keyframe;

        if entry.total_sz > self.scratch.len() as i64 {
            return Err(VolError::Internal(format!(
                "frame {i} total_sz {} exceeds scratch buffer {}",
                entry.total_sz,
                self.scratch.len()
            )));
        }

        match &mut self.source {
            SequenceSource::Preloaded(buf) => {
                let local = entry.offset_sz - self.sequence_offset;
                if local < 0 || local + entry.total_sz > buf.len() as i64 {
                    return Err(VolError::Truncated {
                        offset: entry.offset_sz,
                        needed: entry.total_sz,
                        available: (buf.len() as i64 - local).max(0),
                    });
                }
                let start = local as usize;
                let end = start + entry.total_sz as usize;
                self.scratch[..entry.total_sz as usize].copy_from_slice(&buf[start..end]);
            }
            SequenceSource::Streaming(file) => {
                let current_len = file.metadata()?.len() as i64;
                if entry.offset_sz + entry.total_sz > current_len {
                    tracing::error!(frame = i, "sequence file truncated since open");
                    return Err(VolError::Truncated {
                        offset: entry.offset_sz,
                        needed: entry.total_sz,
                        available: (current_len - entry.offset_sz).max(0),
                    });
                }
                file.seek(SeekFrom::Start(entry.offset_sz as u64))?;
                file.read_exact(&mut self.scratch[..entry.total_sz as usize])
                    .map_err(|e| {
                        if e.kind() == std::io::ErrorKind::UnexpectedEof {
                            VolError::Truncated {
                                offset: entry.offset_sz,
                                needed: entry.total_sz,
                                available: 0,
                            }
                        } else {
                            VolError::Io(e)
                        }
                    })?;
            }
        }

        parse_frame_payload(
            &self.scratch,
            entry.hdr_sz,
            entry.corrected_payload_sz,
            &self.header,
            keyframe,
        )
    }
}

/// Open header and sequence from two separate files. `streaming = false`
/// preloads the whole sequence file at open time; `streaming = true` reads
/// each frame from disk on demand.
pub fn open_split(
    header_path: &Path,
    sequence_path: &Path,
    streaming: bool,
) -> Result<ContainerSession> {
    let span = tracing::info_span!("vologram_open", mode = "split", streaming);
    let _enter = span.enter();

    let header_bytes = std::fs::read(header_path)?;
    let mut header_src = SliceSource::new(&header_bytes);
    let (header, _hdr_sz) = parse_header(&mut header_src).map_err(|e| {
        tracing::warn!(error = %e, "header parse failed");
        e
    })?;

    let mut seq_file = FileSource::open(sequence_path)?;
    let (directory, frame_headers, biggest) =
        build_directory(&mut seq_file, &header).map_err(|e| {
            tracing::warn!(error = %e, "frame directory build failed");
            e
        })?;

    let source = if streaming {
        SequenceSource::Streaming(File::open(sequence_path)?)
    } else {
        SequenceSource::Preloaded(std::fs::read(sequence_path)?)
    };

    tracing::debug!(
        frame_count = header.frame_count(),
        version = header.version(),
        streaming,
        "vologram opened (split)"
    );

    Ok(ContainerSession {
        header,
        directory,
        frame_headers,
        scratch: vec![0u8; biggest as usize],
        sequence_offset: 0,
        audio_blob: None,
        source,
    })
}

/// Open a single-file `.vols` container. If the header declares v1.3 audio,
/// the audio chunk is read into memory at open time. Unified mode always
/// behaves as streaming.
pub fn open_unified(vols_path: &Path) -> Result<ContainerSession> {
    let span = tracing::info_span!("vologram_open", mode = "unified");
    let _enter = span.enter();

    let mut src = FileSource::open(vols_path)?;
    let (header, hdr_sz) = parse_header(&mut src).map_err(|e| {
        tracing::warn!(error = %e, "header parse failed");
        e
    })?;

    let mut audio_blob = None;
    if header.has_audio() {
        let audio_start = header.audio_start().unwrap_or(hdr_sz as u32) as i64;
        src.seek_to(audio_start)?;
        let len = src.read_u32_le()?;
        src.check_bounds(len as i64)?;
        let mut buf = vec![0u8; len as usize];
        src.read_exact_into(&mut buf)?;
        audio_blob = Some(buf);
    }

    let sequence_offset = header
        .frame_body_start()
        .map(|v| v as i64)
        .unwrap_or(hdr_sz);
    src.seek_to(sequence_offset)?;

    let (directory, frame_headers, biggest) = build_directory(&mut src, &header).map_err(|e| {
        tracing::warn!(error = %e, "frame directory build failed");
        e
    })?;

    tracing::debug!(
        frame_count = header.frame_count(),
        version = header.version(),
        "vologram opened (unified)"
    );

    Ok(ContainerSession {
        header,
        directory,
        frame_headers,
        scratch: vec![0u8; biggest as usize],
        sequence_offset,
        audio_blob,
        source: SequenceSource::Streaming(File::open(vols_path)?),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, bytes).unwrap();
        f
    }

    /// Installs a `tracing` subscriber honoring `RUST_LOG`, same pattern the
    /// teacher's binaries use (`slain-player`/`slain-mcp`'s `main()`), so
    /// `cargo test -- --nocapture` can surface the `warn!`/`error!` events
    /// `open_*` emits on failure paths. `try_init` tolerates the repeat
    /// calls multiple `#[test]` functions in this module make.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    // S1: happy path, v1.2 split, keyframes at 0 and 5.
    #[test]
    fn s1_v12_split_happy_path() {
        let header_file = write_temp(&v12_header_bytes(10));
        let mut sequence = Vec::new();
        for i in 0..10u32 {
            let keyframe = if i == 0 || i == 5 { 1 } else { 0 };
            let (indices, uvs): (Option<&[u8]>, Option<&[u8]>) = if keyframe == 1 {
                (Some(b"idx"), Some(b"uv"))
            } else {
                (None, None)
            };
            sequence.extend_from_slice(&encode_frame(
                12,
                i,
                keyframe,
                b"vvvv",
                None,
                indices,
                uvs,
                None,
            ));
        }
        let sequence_file = write_temp(&sequence);

        let mut session =
            open_split(header_file.path(), sequence_file.path(), false).unwrap();
        assert_eq!(session.frame_count(), 10);
        assert!(session.is_keyframe(5));
        assert!(!session.is_keyframe(3));
        assert_eq!(session.find_previous_keyframe(7), Some(5));
        assert_eq!(session.find_previous_keyframe(3), Some(0));
        assert_eq!(session.find_previous_keyframe(10), None);

        let view = session.read_frame(7).unwrap();
        assert_eq!(view.vertices(), b"vvvv");
        assert!(view.indices().is_none());
    }

    // S2: v1.3 unified with an 8-byte audio payload.
    #[test]
    fn s2_v13_unified_with_audio() {
        let mut data = v13_header_bytes(1, true, 8);
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(b"AUDIODAT");
        data.extend_from_slice(&encode_frame(13, 0, 1, b"vvvv", None, Some(b"idx"), Some(b"uv"), None));
        let file = write_temp(&data);

        let mut session = open_unified(file.path()).unwrap();
        assert_eq!(session.audio(), Some(&b"AUDIODAT"[..]));

        let view = session.read_frame(0).unwrap();
        assert_eq!(view.vertices(), b"vvvv");
        assert_eq!(view.indices(), Some(&b"idx"[..]));
    }

    // S3: truncated tail must fail with Truncated, not panic or succeed.
    #[test]
    fn s3_truncated_tail_fails() {
        init_tracing();
        let mut data = v13_header_bytes(1, false, 0);
        data.extend_from_slice(&encode_frame(13, 0, 1, b"vvvvvvvvvv", None, Some(b"idxidx"), Some(b"uvuv"), None));
        data.truncate(data.len() - 10);
        let file = write_temp(&data);

        let err = open_unified(file.path()).unwrap_err();
        assert!(matches!(err, VolError::Truncated { .. }));
    }

    // S4: frame_number mismatch must fail with Malformed.
    #[test]
    fn s4_frame_number_mismatch_fails() {
        init_tracing();
        let header_file = write_temp(&v12_header_bytes(5));
        let mut sequence = Vec::new();
        for i in 0..5u32 {
            let n = if i == 3 { 99 } else { i };
            sequence.extend_from_slice(&encode_frame(12, n, 0, b"vvvv", None, None, None, None));
        }
        let sequence_file = write_temp(&sequence);

        let err = open_split(header_file.path(), sequence_file.path(), false).unwrap_err();
        assert!(matches!(err, VolError::Malformed(_)));
    }

    // S5: an oversize frame must fail with Malformed.
    #[test]
    fn s5_oversize_frame_fails() {
        let header_file = write_temp(&v12_header_bytes(1));
        let mut sequence = Vec::new();
        sequence.extend_from_slice(&0u32.to_le_bytes()); // frame_number
        sequence.extend_from_slice(&2_147_483_647u32.to_le_bytes()); // mesh_data_sz ~2GiB
        sequence.push(0); // keyframe
        let sequence_file = write_temp(&sequence);

        let err = open_split(header_file.path(), sequence_file.path(), false).unwrap_err();
        assert!(matches!(err, VolError::Malformed(_)));
    }

    // S6: v1.0 keyframe correction (+8) and indices/uvs recovery.
    #[test]
    fn s6_v10_keyframe_correction() {
        let header_file = write_temp(&v10_header_bytes(1));
        let sequence = encode_frame(10, 0, 1, b"vvvv", None, Some(b"idx"), Some(b"uv"), None);
        let sequence_file = write_temp(&sequence);

        let mut session =
            open_split(header_file.path(), sequence_file.path(), true).unwrap();
        let view = session.read_frame(0).unwrap();
        assert_eq!(view.indices(), Some(&b"idx"[..]));
        assert_eq!(view.uvs(), Some(&b"uv"[..]));
    }

    // Property: streaming and preloaded reads agree byte-for-byte.
    #[test]
    fn streaming_and_preloaded_agree() {
        let header_file = write_temp(&v12_header_bytes(3));
        let mut sequence = Vec::new();
        for i in 0..3u32 {
            sequence.extend_from_slice(&encode_frame(12, i, 0, b"abcd", None, None, None, None));
        }
        let sequence_file = write_temp(&sequence);

        let mut streamed = open_split(header_file.path(), sequence_file.path(), true).unwrap();
        let mut preloaded = open_split(header_file.path(), sequence_file.path(), false).unwrap();

        for i in 0..3 {
            let a = streamed.read_frame(i).unwrap().vertices().to_vec();
            let b = preloaded.read_frame(i).unwrap().vertices().to_vec();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn out_of_range_frame_is_reported() {
        let header_file = write_temp(&v12_header_bytes(1));
        let sequence = encode_frame(12, 0, 0, b"vvvv", None, None, None, None);
        let sequence_file = write_temp(&sequence);
        let mut session = open_split(header_file.path(), sequence_file.path(), false).unwrap();
        let err = session.read_frame(1).unwrap_err();
        assert!(matches!(err, VolError::OutOfRange { .. }));
    }
}
