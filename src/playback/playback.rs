// SPDX-License-Identifier: GPL-2.0-or-later

#![allow(dead_code)]

pub mod error;
pub mod init;
pub mod segment;
pub mod template;
pub mod window;

mod concatenator;
mod fmp4_muxer;
mod mp4_muxer;
mod segment_index;
mod segment_reader;
mod trimmer;

pub use concatenator::concatenate;
pub use error::{ErrorKind, PlaybackError};
pub use fmp4_muxer::mux_fmp4;
pub use mp4_muxer::mux_mp4;
pub use segment_index::{list_segments, Segment, SegmentIndex};
pub use segment_reader::SegmentReader;
pub use trimmer::trim;
pub use window::Window;

use common::time::UnixNano;
use std::io::Cursor;
use std::path::Path;

/// Output container requested by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Fmp4,
    Mp4,
}

/// The muxed output: a byte count and a seekable reader over it. The reader
/// is handed to the HTTP layer as-is — `tokio::io::Cursor` already
/// implements `AsyncRead`/`AsyncSeek`, so the response body pulls bytes
/// from it on demand rather than the caller re-buffering them.
pub struct Output {
    pub size: u64,
    pub reader: Cursor<Vec<u8>>,
}

/// Runs the full pipeline: index lookup, segment-by-segment trimming,
/// concatenation, and muxing. Returns a seekable handle to the muxed body.
pub async fn serve(
    recordings_dir: &Path,
    path: &str,
    record_path_template: &str,
    start: UnixNano,
    duration: common::time::Duration,
    format: Format,
) -> Result<Output, PlaybackError> {
    let window = Window {
        start_wall: start,
        duration,
    };

    let index = list_segments(recordings_dir, path, record_path_template, &window)
        .await
        .map_err(PlaybackError::from)?;

    let mut segments_parts = Vec::new();
    let mut first_init = None;
    let mut remaining_nanos: i64 = *duration;

    for (i, segment) in index.segments.iter().enumerate() {
        if remaining_nanos <= 0 && i > 0 {
            break;
        }

        let (init, mut reader) = SegmentReader::open(&segment.path)
            .await
            .map_err(PlaybackError::from)?;

        if let Some(first) = &first_init {
            if *first != init {
                break;
            }
        }

        // Only the first selected segment may need to skip leading samples
        // to reach the requested start; every later segment is consumed
        // from its own beginning.
        let entry_offset_nanos = if i == 0 {
            (*start - *segment.start_wall).max(0)
        } else {
            0
        };

        let parts = reader.read_all_parts().map_err(PlaybackError::from)?;
        let trimmed = trim(&init, &parts, entry_offset_nanos, remaining_nanos)
            .map_err(PlaybackError::from)?;

        if first_init.is_none() {
            first_init = Some(init);
        }

        remaining_nanos -= trimmed.emitted_duration_nanos;
        segments_parts.push((segment.start_wall, trimmed.parts));
    }

    if segments_parts.is_empty() {
        return Err(PlaybackError::SegmentIndex(
            error::SegmentIndexError::NoSegments,
        ));
    }

    let init = first_init.expect("at least one segment produced an init");
    let concatenated = concatenate(&segments_parts, &init.tracks).map_err(PlaybackError::from)?;

    let bytes = match format {
        Format::Fmp4 => mux_fmp4(&concatenated).map_err(PlaybackError::from)?,
        Format::Mp4 => mux_mp4(&init, &concatenated).map_err(PlaybackError::from)?,
    };

    let size = u64::try_from(bytes.len()).map_err(|_| PlaybackError::Internal("output too large".to_owned()))?;
    Ok(Output {
        size,
        reader: Cursor::new(bytes),
    })
}
