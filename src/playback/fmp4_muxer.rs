// SPDX-License-Identifier: GPL-2.0-or-later

//! Writes the concatenated sample stream as a bare sequence of
//! `moof`+`mdat` fragments — no leading `ftyp`/`moov`, since the client
//! fetches the Init separately.

use crate::error::MuxError;
use crate::segment::Part;
use mp4::{
    u32_to_flags, write_single_box, Boxes, FullBox, Mdat, Mfhd, Moof, Tfdt, TfdtBaseMediaDecodeTime,
    Tfhd, Traf, Trun, TrunEntries, TrunEntryV1,
};

const TRUN_FLAGS: u32 = 0b1111_0000_0001; // data_offset, duration, size, flags, cts.
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x0002_0000;

pub fn mux_fmp4(parts: &[Part]) -> Result<Vec<u8>, MuxError> {
    let mut out = Vec::new();
    for part in parts {
        write_fragment(&mut out, part)?;
    }
    Ok(out)
}

fn write_fragment(out: &mut Vec<u8>, part: &Part) -> Result<(), MuxError> {
    let placeholder_offsets = vec![0_usize; part.tracks.len()];
    let moof_size = build_moof(part, &placeholder_offsets)?.size();

    let mut offsets = Vec::with_capacity(part.tracks.len());
    let mut running = 0_usize;
    for track in &part.tracks {
        offsets.push(moof_size + 8 + running);
        running += track.samples.iter().map(|s| s.payload.len()).sum::<usize>();
    }

    let moof = build_moof(part, &offsets)?;
    moof.marshal(out)?;

    let mut mdat_payload = Vec::with_capacity(running);
    for track in &part.tracks {
        for sample in &track.samples {
            mdat_payload.extend_from_slice(&sample.payload);
        }
    }
    write_single_box(out, &Mdat(mdat_payload))?;
    Ok(())
}

fn build_moof(part: &Part, offsets: &[usize]) -> Result<Boxes, MuxError> {
    let mut moof = Boxes::new(Moof).with_child(Boxes::new(Mfhd {
        full_box: FullBox::default(),
        sequence_number: part.sequence_number,
    }));

    for (track, &offset) in part.tracks.iter().zip(offsets) {
        let data_offset = i32::try_from(offset).map_err(|_| MuxError::Overflow)?;

        let tfhd = Tfhd {
            full_box: FullBox {
                version: 0,
                flags: u32_to_flags(TFHD_DEFAULT_BASE_IS_MOOF),
            },
            track_id: track.id,
            ..Default::default()
        };
        let tfdt = Tfdt {
            flags: [0, 0, 0],
            base_media_decode_time: TfdtBaseMediaDecodeTime::V1(track.base_time),
        };

        let mut entries = Vec::with_capacity(track.samples.len());
        for sample in &track.samples {
            entries.push(TrunEntryV1 {
                sample_duration: sample.duration,
                sample_size: u32::try_from(sample.payload.len()).map_err(|_| MuxError::Overflow)?,
                sample_flags: if sample.is_non_sync_sample { 1 << 16 } else { 0 },
                sample_composition_time_offset: sample.composition_time_offset,
            });
        }
        let trun = Trun {
            flags: u32_to_flags(TRUN_FLAGS),
            data_offset,
            first_sample_flags: 0,
            entries: TrunEntries::V1(entries),
        };

        let traf = Boxes::new(Traf).with_children3(
            Boxes::new(tfhd),
            Boxes::new(tfdt),
            Boxes::new(trun),
        );
        moof = moof.with_child(traf);
    }

    Ok(moof)
}
