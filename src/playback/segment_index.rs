// SPDX-License-Identifier: GPL-2.0-or-later

//! Lists the segments for a path, sorted by recorded wall-clock start.

use crate::error::SegmentIndexError;
use crate::template::Template;
use crate::window::Window;
use common::time::UnixNano;
use std::path::{Path, PathBuf};

/// A segment file on disk and the wall-clock instant its first sample
/// corresponds to, derived from its filename.
#[derive(Clone, Debug)]
pub struct Segment {
    pub path: PathBuf,
    pub start_wall: UnixNano,
}

/// Every segment for one path, ordered by `start_wall` ascending.
pub struct SegmentIndex {
    pub segments: Vec<Segment>,
}

/// Lists the segments overlapping `window`, plus one anchor segment
/// starting at or before `window.start_wall` if one exists.
pub async fn list_segments(
    recordings_dir: &Path,
    path: &str,
    record_path_template: &str,
    window: &Window,
) -> Result<SegmentIndex, SegmentIndexError> {
    let template = Template::parse(record_path_template)
        .map_err(|_| SegmentIndexError::UnknownPath(path.to_owned()))?;
    let dir = template.directory(recordings_dir, path);

    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| SegmentIndexError::ReadDir(dir.clone(), e))?;

    let mut segments = Vec::new();
    loop {
        let entry = entries
            .next_entry()
            .await
            .map_err(|e| SegmentIndexError::ReadDir(dir.clone(), e))?;
        let Some(entry) = entry else { break };

        let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Some(start) = template.parse_filename(&filename) else {
            continue;
        };
        let start_wall = UnixNano::from(start.and_utc().timestamp_nanos_opt().unwrap_or(0));
        segments.push(Segment {
            path: entry.path(),
            start_wall,
        });
    }

    segments.sort_unstable_by_key(|s| *s.start_wall);

    let end_wall = window.end_wall().unwrap_or(UnixNano::MAX);

    // The anchor: the last segment starting at or before the window start.
    // If none exists, the earliest segment (which necessarily starts after
    // the window start) opens the selection instead.
    let first_index = segments
        .iter()
        .rposition(|s| !s.start_wall.after(window.start_wall))
        .unwrap_or(0);

    // Include every segment through the first one starting at/after the
    // window's end, inclusive, since that segment may still carry samples
    // inside the window.
    let last_index = segments
        .iter()
        .position(|s| !s.start_wall.before(end_wall))
        .unwrap_or(segments.len().saturating_sub(1));

    let selected: Vec<Segment> = segments
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i >= first_index && *i <= last_index.max(first_index))
        .map(|(_, s)| s)
        .collect();

    if selected.is_empty() {
        return Err(SegmentIndexError::NoSegments);
    }

    Ok(SegmentIndex { segments: selected })
}
