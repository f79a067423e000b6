// SPDX-License-Identifier: GPL-2.0-or-later

//! Parses a segment file's leading `ftyp`+`moov` into an `Init`, then yields
//! its `moof`+`mdat` fragments lazily as `Part`s.

use crate::error::SegmentReaderError;
use crate::init::{Codec, Init, Track};
use crate::segment::{Part, PartSample, PartTrack};
use mp4::read::{find_box, find_boxes, iter_boxes, RawBoxRef};
use mp4::BoxType;
use std::path::Path;

const TYPE_MOOV: BoxType = *b"moov";
const TYPE_TRAK: BoxType = *b"trak";
const TYPE_TKHD: BoxType = *b"tkhd";
const TYPE_MDIA: BoxType = *b"mdia";
const TYPE_MDHD: BoxType = *b"mdhd";
const TYPE_HDLR: BoxType = *b"hdlr";
const TYPE_MINF: BoxType = *b"minf";
const TYPE_STBL: BoxType = *b"stbl";
const TYPE_STSD: BoxType = *b"stsd";
const TYPE_MOOF: BoxType = *b"moof";
const TYPE_MDAT: BoxType = *b"mdat";
const TYPE_TRAF: BoxType = *b"traf";
const TYPE_TFHD: BoxType = *b"tfhd";
const TYPE_TFDT: BoxType = *b"tfdt";
const TYPE_TRUN: BoxType = *b"trun";

const TRUN_DATA_OFFSET_PRESENT: u32 = 0b0000_0000_0001;
const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0b0001_0000_0000;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0b0010_0000_0000;
const TRUN_SAMPLE_FLAGS_PRESENT: u32 = 0b0100_0000_0000;
const TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT: u32 = 0b1000_0000_0000;
const SAMPLE_NON_SYNC_FLAG: u32 = 1 << 16;

const TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x0000_0002;
const TFHD_DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x0000_0008;
const TFHD_DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x0000_0010;
const TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x0000_0020;

/// Reads the whole segment into memory, then exposes its fragments one at
/// a time as a non-restartable sequence. All file I/O happens up front in
/// `open`; the file handle is closed (via `Drop` of the returned buffer's
/// owning `File`, already dropped by then) before iteration starts.
pub struct SegmentReader {
    buf: Vec<u8>,
    /// Byte offset in `buf` of the next unexamined top-level box.
    pos: usize,
}

impl SegmentReader {
    pub async fn open(path: &Path) -> Result<(Init, Self), SegmentReaderError> {
        let buf = tokio::fs::read(path).await?;
        let (init, parts_start) = parse_init(&buf)?;
        Ok((init, Self { buf, pos: parts_start }))
    }

    /// Reads every remaining fragment in the segment.
    pub fn read_all_parts(&mut self) -> Result<Vec<Part>, SegmentReaderError> {
        let mut parts = Vec::new();
        while let Some(part) = self.next_part()? {
            parts.push(part);
        }
        Ok(parts)
    }

    fn next_part(&mut self) -> Result<Option<Part>, SegmentReaderError> {
        let buf = &self.buf[self.pos..];
        let mut it = iter_boxes(buf);
        let mut consumed = 0_usize;
        let mut moof_data: Option<&[u8]> = None;

        for b in it.by_ref() {
            let b = b?;
            consumed += 8 + b.data.len();
            if b.box_type == TYPE_MOOF {
                moof_data = Some(b.data);
                break;
            }
        }
        let Some(moof_data) = moof_data else {
            return Ok(None);
        };

        let rest = &buf[consumed..];
        let mut rest_it = iter_boxes(rest);
        let mdat: RawBoxRef = loop {
            let Some(b) = rest_it.next() else {
                return Err(SegmentReaderError::MoofWithoutMdat);
            };
            let b = b?;
            consumed += 8 + b.data.len();
            if b.box_type == TYPE_MDAT {
                break b;
            }
        };

        self.pos += consumed;

        let sequence_number = find_box(moof_data, *b"mfhd")
            .and_then(|d| d.get(4..8))
            .and_then(|s| s.try_into().ok())
            .map_or(0, u32::from_be_bytes);

        let mut tracks = Vec::new();
        for traf in find_boxes(moof_data, TYPE_TRAF) {
            tracks.push(parse_traf(traf, mdat.data)?);
        }

        Ok(Some(Part {
            sequence_number,
            tracks,
        }))
    }
}

fn parse_traf(traf: &[u8], mdat: &[u8]) -> Result<PartTrack, SegmentReaderError> {
    let tfhd = find_box(traf, TYPE_TFHD).ok_or(SegmentReaderError::MissingBox("tfhd"))?;
    let tfdt = find_box(traf, TYPE_TFDT).ok_or(SegmentReaderError::MissingBox("tfdt"))?;
    let trun = find_box(traf, TYPE_TRUN).ok_or(SegmentReaderError::MissingBox("trun"))?;

    let tfhd_flags = fullbox_flags(tfhd);
    let track_id = read_u32(tfhd, 4)?;
    let mut off = 8_usize;
    let mut default_sample_duration = 0_u32;
    let mut default_sample_size = 0_u32;
    let mut default_sample_flags = 0_u32;
    if tfhd_flags & 0x0000_0001 != 0 {
        off += 8; // base_data_offset
    }
    if tfhd_flags & TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT != 0 {
        off += 4;
    }
    if tfhd_flags & TFHD_DEFAULT_SAMPLE_DURATION_PRESENT != 0 {
        default_sample_duration = read_u32(tfhd, off)?;
        off += 4;
    }
    if tfhd_flags & TFHD_DEFAULT_SAMPLE_SIZE_PRESENT != 0 {
        default_sample_size = read_u32(tfhd, off)?;
        off += 4;
    }
    if tfhd_flags & TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT != 0 {
        default_sample_flags = read_u32(tfhd, off)?;
    }

    let tfdt_version = *tfdt.first().ok_or(SegmentReaderError::Overflow("tfdt"))?;
    let base_time: u64 = if tfdt_version == 0 {
        u64::from(read_u32(tfdt, 4)?)
    } else {
        read_u64(tfdt, 4)?
    };

    let trun_flags = fullbox_flags(trun);
    let sample_count = read_u32(trun, 4)?;
    let mut toff = 8_usize;
    if trun_flags & TRUN_DATA_OFFSET_PRESENT != 0 {
        toff += 4;
    }
    if trun_flags & 0b0000_0000_0100 != 0 {
        toff += 4; // first_sample_flags
    }

    let mut samples =
        Vec::with_capacity(usize::try_from(sample_count).map_err(|_| SegmentReaderError::Overflow("trun"))?);
    let mut data_pos = 0_usize;
    for _ in 0..sample_count {
        let duration = if trun_flags & TRUN_SAMPLE_DURATION_PRESENT != 0 {
            let v = read_u32(trun, toff)?;
            toff += 4;
            v
        } else {
            default_sample_duration
        };
        let size = if trun_flags & TRUN_SAMPLE_SIZE_PRESENT != 0 {
            let v = read_u32(trun, toff)?;
            toff += 4;
            v
        } else {
            default_sample_size
        };
        let flags = if trun_flags & TRUN_SAMPLE_FLAGS_PRESENT != 0 {
            let v = read_u32(trun, toff)?;
            toff += 4;
            v
        } else {
            default_sample_flags
        };
        let cts_offset = if trun_flags & TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
            let v = read_i32(trun, toff)?;
            toff += 4;
            v
        } else {
            0
        };

        let size = usize::try_from(size).map_err(|_| SegmentReaderError::MdatTooShort)?;
        let payload = mdat
            .get(data_pos..data_pos + size)
            .ok_or(SegmentReaderError::MdatTooShort)?
            .to_vec();
        data_pos += size;

        samples.push(PartSample {
            duration,
            is_non_sync_sample: flags & SAMPLE_NON_SYNC_FLAG != 0,
            composition_time_offset: cts_offset,
            payload,
        });
    }

    Ok(PartTrack {
        id: track_id,
        base_time,
        samples,
    })
}

fn fullbox_flags(b: &[u8]) -> u32 {
    if b.len() < 4 {
        return 0;
    }
    (u32::from(b[1]) << 16) | (u32::from(b[2]) << 8) | u32::from(b[3])
}

fn read_u32(b: &[u8], off: usize) -> Result<u32, SegmentReaderError> {
    let bytes = b
        .get(off..off + 4)
        .ok_or(SegmentReaderError::Overflow("trun/tfhd"))?;
    bytes
        .try_into()
        .map(u32::from_be_bytes)
        .map_err(|_| SegmentReaderError::Overflow("trun/tfhd"))
}

fn read_i32(b: &[u8], off: usize) -> Result<i32, SegmentReaderError> {
    let bytes = b
        .get(off..off + 4)
        .ok_or(SegmentReaderError::Overflow("trun"))?;
    bytes
        .try_into()
        .map(i32::from_be_bytes)
        .map_err(|_| SegmentReaderError::Overflow("trun"))
}

fn read_u64(b: &[u8], off: usize) -> Result<u64, SegmentReaderError> {
    let bytes = b
        .get(off..off + 8)
        .ok_or(SegmentReaderError::Overflow("tfdt"))?;
    bytes
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| SegmentReaderError::Overflow("tfdt"))
}

/// Parses `ftyp`+`moov` into an `Init`. Returns the byte offset right after
/// `moov` where fragments begin.
fn parse_init(buf: &[u8]) -> Result<(Init, usize), SegmentReaderError> {
    let mut pos = 0_usize;
    let mut moov_data: Option<&[u8]> = None;
    for b in iter_boxes(buf) {
        let b = b?;
        let box_len = 8 + b.data.len();
        if b.box_type == TYPE_MOOV {
            moov_data = Some(b.data);
            pos += box_len;
            break;
        }
        pos += box_len;
    }
    let moov = moov_data.ok_or(SegmentReaderError::MissingBox("moov"))?;

    let mut tracks = Vec::new();
    for trak in find_boxes(moov, TYPE_TRAK) {
        tracks.push(parse_trak(trak)?);
    }

    Ok((Init { tracks }, pos))
}

fn parse_trak(trak: &[u8]) -> Result<Track, SegmentReaderError> {
    let tkhd = find_box(trak, TYPE_TKHD).ok_or(SegmentReaderError::MissingBox("tkhd"))?;
    let tkhd_version = *tkhd.first().ok_or(SegmentReaderError::Overflow("tkhd"))?;
    let id = if tkhd_version == 0 {
        read_u32(tkhd, 12)?
    } else {
        read_u32(tkhd, 20)?
    };

    let mdia = find_box(trak, TYPE_MDIA).ok_or(SegmentReaderError::MissingBox("mdia"))?;
    let mdhd = find_box(mdia, TYPE_MDHD).ok_or(SegmentReaderError::MissingBox("mdhd"))?;
    let mdhd_version = *mdhd.first().ok_or(SegmentReaderError::Overflow("mdhd"))?;
    let time_scale = if mdhd_version == 0 {
        read_u32(mdhd, 12)?
    } else {
        read_u32(mdhd, 20)?
    };

    let hdlr = find_box(mdia, TYPE_HDLR).ok_or(SegmentReaderError::MissingBox("hdlr"))?;
    let handler_type: [u8; 4] = hdlr
        .get(8..12)
        .ok_or(SegmentReaderError::Overflow("hdlr"))?
        .try_into()
        .map_err(|_| SegmentReaderError::Overflow("hdlr"))?;
    let is_video = &handler_type == b"vide";

    let minf = find_box(mdia, TYPE_MINF).ok_or(SegmentReaderError::MissingBox("minf"))?;
    let stbl = find_box(minf, TYPE_STBL).ok_or(SegmentReaderError::MissingBox("stbl"))?;
    let stsd = find_box(stbl, TYPE_STSD).ok_or(SegmentReaderError::MissingBox("stsd"))?;
    let entries = stsd.get(8..).ok_or(SegmentReaderError::Overflow("stsd"))?;
    let entry = iter_boxes(entries)
        .next()
        .ok_or(SegmentReaderError::MissingBox("stsd entry"))??;

    Ok(Track {
        id,
        time_scale,
        is_video,
        handler_type,
        codec: Codec::from_sample_entry_type(entry.box_type),
        sample_entry_type: entry.box_type,
        sample_entry_payload: entry.data.to_vec(),
    })
}
