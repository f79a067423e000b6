// SPDX-License-Identifier: GPL-2.0-or-later

//! The codec-initialization descriptor parsed out of a segment's leading
//! `moov`. Two `Init` values are equal iff they define the same track ids
//! with bit-for-bit identical sample-entry payloads.

use mp4::BoxType;

/// Tagged codec identity, read off a track's `stsd` sample-entry fourcc.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    H264,
    H265,
    Mpeg4Audio,
    Opus,
    Pcm,
    Other(BoxType),
}

impl Codec {
    #[must_use]
    pub fn from_sample_entry_type(box_type: BoxType) -> Self {
        match &box_type {
            b"avc1" | b"avc3" => Codec::H264,
            b"hev1" | b"hvc1" => Codec::H265,
            b"mp4a" => Codec::Mpeg4Audio,
            b"Opus" => Codec::Opus,
            b"ipcm" | b"lpcm" | b"twos" | b"sowt" => Codec::Pcm,
            _ => Codec::Other(box_type),
        }
    }
}

/// One track's codec-initialization parameters, captured verbatim from the
/// segment's `moov/trak` so it can be re-muxed bit-for-bit.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: u32,
    pub time_scale: u32,
    pub is_video: bool,
    pub handler_type: [u8; 4],
    pub codec: Codec,
    /// The `stsd` child box (e.g. `avc1`), captured verbatim.
    pub sample_entry_type: BoxType,
    pub sample_entry_payload: Vec<u8>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.sample_entry_type == other.sample_entry_type
            && self.sample_entry_payload == other.sample_entry_payload
    }
}
impl Eq for Track {}

/// Ordered list of tracks, in source (trak) order. Equality is bit-for-bit
/// on every track's sample entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Init {
    pub tracks: Vec<Track>,
}

impl Init {
    #[must_use]
    pub fn track(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
