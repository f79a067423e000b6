// SPDX-License-Identifier: GPL-2.0-or-later

//! The sample-level data model shared by the reader, trimmer, concatenator
//! and both muxers: one movie fragment ("part") per track.

/// The quantum of media: one decodable (or dependent) access unit.
#[derive(Clone, Debug)]
pub struct PartSample {
    /// Duration on the track's `timeScale`, in ticks.
    pub duration: u32,
    pub is_non_sync_sample: bool,
    /// Composition-time offset (`cts - dts`), in ticks.
    pub composition_time_offset: i32,
    pub payload: Vec<u8>,
}

/// One track's samples within a single movie fragment.
#[derive(Clone, Debug)]
pub struct PartTrack {
    pub id: u32,
    /// First sample's decode time, in track ticks, relative to the
    /// enclosing scope (segment-local while inside the trimmer, output
    /// stream global once the concatenator has run).
    pub base_time: u64,
    pub samples: Vec<PartSample>,
}

impl PartTrack {
    #[must_use]
    pub fn duration_ticks(&self) -> u64 {
        self.samples.iter().map(|s| u64::from(s.duration)).sum()
    }
}

/// One `moof`+`mdat` movie fragment: a sequence number and the per-track
/// samples it carries.
#[derive(Clone, Debug)]
pub struct Part {
    pub sequence_number: u32,
    pub tracks: Vec<PartTrack>,
}

impl Part {
    #[must_use]
    pub fn track(&self, id: u32) -> Option<&PartTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn track_mut(&mut self, id: u32) -> Option<&mut PartTrack> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }
}
