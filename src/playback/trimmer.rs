// SPDX-License-Identifier: GPL-2.0-or-later

//! The central trim algorithm (see the module's design notes): walks a
//! segment's samples to the last sync sample at or before the requested
//! entry point, emits that sample with duration zero so a decoder has the
//! state it needs without the output's presentation time moving, then
//! emits subsequent samples verbatim until the window budget is met.

use crate::error::TrimmerError;
use crate::init::Init;
use crate::segment::{Part, PartSample, PartTrack};
use common::time::nano_to_timescale;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct TrimOutput {
    pub parts: Vec<Part>,
    /// Emitted presentation ticks on the primary (first) track.
    pub emitted_primary_ticks: u64,
    /// The same amount, converted to nanoseconds.
    pub emitted_duration_nanos: i64,
}

/// Trims one segment's parts to `[entry_offset_nanos, entry_offset_nanos +
/// budget_nanos)` relative to the segment's own start, independently per
/// track. `entry_offset_nanos` may be negative (the window starts before
/// this segment — a gap); it is clamped to zero.
pub fn trim(
    init: &Init,
    parts: &[Part],
    entry_offset_nanos: i64,
    budget_nanos: i64,
) -> Result<TrimOutput, TrimmerError> {
    if parts.is_empty() {
        return Err(TrimmerError::EmptySegment);
    }
    let primary = init.tracks.first().ok_or(TrimmerError::EmptySegment)?;

    let mut per_part_tracks: BTreeMap<usize, Vec<PartTrack>> = BTreeMap::new();
    let mut emitted_primary_ticks = 0_u64;

    for (ti, track) in init.tracks.iter().enumerate() {
        let is_primary = ti == 0;
        let toff_ticks = u64::try_from(
            nano_to_timescale(entry_offset_nanos.max(0), i64::from(track.time_scale)).max(0),
        )
        .unwrap_or(0);
        let budget_ticks = u64::try_from(
            nano_to_timescale(budget_nanos.max(0), i64::from(track.time_scale)).max(0),
        )
        .unwrap_or(0);

        let (entries, emitted_ticks) =
            trim_track(parts, track.id, toff_ticks, budget_ticks, is_primary)?;

        if is_primary {
            emitted_primary_ticks = emitted_ticks;
        }

        let mut running = 0_u64;
        for (part_index, samples) in entries {
            let duration: u64 = samples.iter().map(|s| u64::from(s.duration)).sum();
            per_part_tracks.entry(part_index).or_default().push(PartTrack {
                id: track.id,
                base_time: running,
                samples,
            });
            running += duration;
        }
    }

    let mut parts: Vec<Part> = per_part_tracks
        .into_values()
        .map(|tracks| Part {
            sequence_number: 0,
            tracks,
        })
        .collect();
    for (i, part) in parts.iter_mut().enumerate() {
        part.sequence_number = u32::try_from(i).unwrap_or(u32::MAX);
    }

    let emitted_duration_nanos = ticks_to_nanos(emitted_primary_ticks, primary.time_scale);

    Ok(TrimOutput {
        parts,
        emitted_primary_ticks,
        emitted_duration_nanos,
    })
}

/// Emitted samples grouped by their originating part index, plus the
/// total emitted ticks.
type TrackTrimResult = Result<(Vec<(usize, Vec<PartSample>)>, u64), TrimmerError>;

/// Trims a single track across all parts of a segment. Returns the
/// emitted samples grouped by their originating part index, plus the
/// total emitted ticks (post leading-keyframe zeroing).
fn trim_track(
    parts: &[Part],
    track_id: u32,
    toff_ticks: u64,
    budget_ticks: u64,
    require_sync_entry: bool,
) -> TrackTrimResult {
    let mut last_key: Option<(usize, usize)> = None;
    let mut decode_start: Option<(usize, usize)> = None;

    'scan: for (pi, part) in parts.iter().enumerate() {
        let Some(pt) = part.track(track_id) else {
            continue;
        };
        let mut t = pt.base_time;
        for (si, sample) in pt.samples.iter().enumerate() {
            if !sample.is_non_sync_sample {
                last_key = Some((pi, si));
            }
            if t + u64::from(sample.duration) > toff_ticks {
                decode_start = last_key;
                break 'scan;
            }
            t += u64::from(sample.duration);
        }
    }

    let Some((key_pi, key_si)) = decode_start else {
        // Nothing in this track covers the entry point: it contributes
        // nothing to this segment (§4.4 secondary-track gap behaviour).
        return Ok((Vec::new(), 0));
    };
    if require_sync_entry && last_key != Some((key_pi, key_si)) {
        return Err(TrimmerError::LeadingSampleNotSync);
    }

    let mut out: Vec<(usize, Vec<PartSample>)> = Vec::new();
    let mut emitted_ticks = 0_u64;
    let mut first_emitted = true;

    'emit: for (pi, part) in parts.iter().enumerate().skip(key_pi) {
        let Some(pt) = part.track(track_id) else {
            continue;
        };
        let start_si = if pi == key_pi { key_si } else { 0 };
        if start_si >= pt.samples.len() {
            continue;
        }

        let mut part_samples = Vec::new();
        let mut done = false;
        for sample in &pt.samples[start_si..] {
            let mut out_sample = sample.clone();
            let contributes = if first_emitted {
                out_sample.duration = 0;
                first_emitted = false;
                0_u64
            } else {
                u64::from(sample.duration)
            };
            part_samples.push(out_sample);
            emitted_ticks += contributes;
            if contributes > 0 && emitted_ticks >= budget_ticks {
                done = true;
                break;
            }
        }
        out.push((pi, part_samples));
        if done {
            break 'emit;
        }
    }

    Ok((out, emitted_ticks))
}

fn ticks_to_nanos(ticks: u64, timescale: u32) -> i64 {
    if timescale == 0 {
        return 0;
    }
    i64::try_from((i128::from(ticks) * 1_000_000_000_i128) / i128::from(timescale)).unwrap_or(i64::MAX)
}
