// SPDX-License-Identifier: GPL-2.0-or-later

//! Joins per-segment trimmed output into one continuous sample stream,
//! compensating for the wall-clock delta between segments ("NTP
//! compensation") and renumbering fragments into a single sequence.

use crate::error::ConcatenatorError;
use crate::init::Track;
use crate::segment::{Part, PartTrack};
use common::time::{nano_to_timescale, UnixNano};
use std::collections::HashMap;

/// `(segment start_wall, that segment's already-trimmed parts)`, in the
/// order segments are emitted.
pub type SegmentParts = (UnixNano, Vec<Part>);

pub fn concatenate(
    segments: &[SegmentParts],
    tracks: &[Track],
) -> Result<Vec<Part>, ConcatenatorError> {
    let mut output: Vec<Part> = Vec::new();
    let mut cumulative: HashMap<u32, u64> = HashMap::new();

    for seg_idx in 0..segments.len() {
        if seg_idx > 0 {
            let (prev_start, prev_parts) = &segments[seg_idx - 1];
            let (this_start, _) = &segments[seg_idx];
            let delta_wall_nanos = this_start
                .sub(*prev_start)
                .ok_or(ConcatenatorError::Overflow)?;

            for track in tracks {
                let nominal_ticks =
                    nano_to_timescale(*delta_wall_nanos, i64::from(track.time_scale));
                let emitted_in_prev: i64 = prev_parts
                    .iter()
                    .filter_map(|p| p.track(track.id))
                    .map(|pt| i64::try_from(pt.duration_ticks()).unwrap_or(i64::MAX))
                    .sum();
                let delta_ticks = nominal_ticks - emitted_in_prev;
                if delta_ticks != 0 {
                    adjust_last_sample_duration(&mut output, track.id, delta_ticks);
                    let entry = cumulative.entry(track.id).or_insert(0);
                    let adjusted = i64::try_from(*entry)
                        .unwrap_or(i64::MAX)
                        .saturating_add(delta_ticks)
                        .max(0);
                    *entry = u64::try_from(adjusted).unwrap_or(0);
                }
            }
        }

        let (_, seg_parts) = &segments[seg_idx];
        for part in seg_parts {
            let mut new_part = part.clone();
            for pt in &mut new_part.tracks {
                let base = *cumulative.get(&pt.id).unwrap_or(&0);
                pt.base_time += base;
            }
            output.push(new_part);
        }

        for track in tracks {
            let emitted: u64 = seg_parts
                .iter()
                .filter_map(|p| p.track(track.id))
                .map(PartTrack::duration_ticks)
                .sum();
            *cumulative.entry(track.id).or_insert(0) += emitted;
        }
    }

    for (i, part) in output.iter_mut().enumerate() {
        part.sequence_number = u32::try_from(i).unwrap_or(u32::MAX);
    }

    Ok(output)
}

/// Adjusts the duration of the most recently emitted sample on `track_id`
/// by `delta_ticks` (may shorten or lengthen it), searching backwards from
/// the end of the output built so far.
fn adjust_last_sample_duration(output: &mut [Part], track_id: u32, delta_ticks: i64) {
    for part in output.iter_mut().rev() {
        if let Some(pt) = part.track_mut(track_id) {
            if let Some(last) = pt.samples.last_mut() {
                let new_duration = i64::from(last.duration) + delta_ticks;
                last.duration = u32::try_from(new_duration.max(0)).unwrap_or(0);
                return;
            }
        }
    }
}
