// SPDX-License-Identifier: GPL-2.0-or-later

//! Writes a complete, non-fragmented MP4: `ftyp`+`moov`+`mdat`. Sizes are
//! computed analytically in a first pass so `stco` chunk offsets (which
//! depend on the size of `moov`) can be written correctly without a
//! rewriteable buffer.

use crate::error::MuxError;
use crate::init::Init;
use crate::segment::Part;
use mp4::{
    Boxes, CompatibleBrandElem, Ctts, CttsEntries, CttsEntryV1, Dinf, Dref, Edts, Elst,
    ElstEntries, ElstEntryV1, Ftyp, FullBox, Hdlr, Mdat, Mdhd, MdhdV0, MdhdVersion, Mdia, Minf,
    Moov, Mvhd, MvhdV0, MvhdVersion, RawBox, Stbl, Stco, Stsc, StscEntry, Stsd, Stss, Stsz, Stts,
    SttsEntry, Tkhd, TkhdV0, TkhdVersion, Trak, Url, Vmhd, URL_NOPT,
};

const MOVIE_TIMESCALE: u32 = 1000;
const IDENTITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

struct TrackBuild<'a> {
    track: &'a crate::init::Track,
    out_id: u32,
    samples: Vec<&'a crate::segment::PartSample>,
    /// Byte offset of this track's contiguous payload region within `mdat`.
    base_in_mdat: usize,
    /// Prefix-sum byte offset of each sample within this track's region.
    sample_offsets: Vec<usize>,
    payload_len: usize,
}

pub fn mux_mp4(init: &Init, parts: &[Part]) -> Result<Vec<u8>, MuxError> {
    let mut builds = Vec::new();
    let mut base_in_mdat = 0_usize;
    let mut next_out_id = 1_u32;

    for track in &init.tracks {
        let samples: Vec<&crate::segment::PartSample> = parts
            .iter()
            .filter_map(|p| p.track(track.id))
            .flat_map(|pt| pt.samples.iter())
            .collect();
        if samples.is_empty() {
            continue;
        }

        let mut sample_offsets = Vec::with_capacity(samples.len());
        let mut offset = 0_usize;
        for sample in &samples {
            sample_offsets.push(offset);
            offset += sample.payload.len();
        }

        builds.push(TrackBuild {
            track,
            out_id: next_out_id,
            samples,
            base_in_mdat,
            sample_offsets,
            payload_len: offset,
        });
        base_in_mdat += offset;
        next_out_id += 1;
    }

    if builds.is_empty() {
        return Err(MuxError::Overflow);
    }

    let ftyp = build_ftyp();
    let moov_first_pass = build_moov(&builds, 0)?;
    let mdat_offset = 8 + ftyp.size() + moov_first_pass.size() + 8;
    let moov = build_moov(&builds, mdat_offset)?;

    let mut out = Vec::new();
    ftyp.marshal(&mut out)?;
    moov.marshal(&mut out)?;

    let mut mdat_payload = Vec::with_capacity(base_in_mdat);
    for build in &builds {
        for sample in &build.samples {
            mdat_payload.extend_from_slice(&sample.payload);
        }
    }
    mp4::write_single_box(&mut out, &Mdat(mdat_payload))?;

    Ok(out)
}

fn build_ftyp() -> Boxes {
    Boxes::new(Ftyp {
        major_brand: *b"isom",
        minor_version: 0,
        compatible_brands: vec![
            CompatibleBrandElem(*b"isom"),
            CompatibleBrandElem(*b"iso2"),
            CompatibleBrandElem(*b"avc1"),
            CompatibleBrandElem(*b"mp41"),
        ],
    })
}

fn build_moov(builds: &[TrackBuild], mdat_offset: usize) -> Result<Boxes, MuxError> {
    let movie_duration_ticks = builds
        .iter()
        .map(|b| track_duration_ticks(b))
        .max()
        .unwrap_or(0);
    let movie_duration = ticks_to_scale(movie_duration_ticks, builds[0].track.time_scale, MOVIE_TIMESCALE)?;

    let mvhd = Mvhd {
        flags: [0, 0, 0],
        version: MvhdVersion::V0(MvhdV0 {
            creation_time: 0,
            modification_time: 0,
            duration: movie_duration,
        }),
        timescale: MOVIE_TIMESCALE,
        rate: 0x0001_0000,
        volume: 0x0100,
        reserved: 0,
        reserved2: [0, 0],
        matrix: IDENTITY_MATRIX,
        pre_defined: [0; 6],
        next_track_id: u32::try_from(builds.len() + 1).map_err(|_| MuxError::Overflow)?,
    };

    let mut moov = Boxes::new(Moov).with_child(Boxes::new(mvhd));
    for build in builds {
        moov = moov.with_child(build_trak(build, mdat_offset)?);
    }
    Ok(moov)
}

fn track_duration_ticks(build: &TrackBuild) -> u64 {
    build.samples.iter().map(|s| u64::from(s.duration)).sum()
}

fn ticks_to_scale(ticks: u64, from_scale: u32, to_scale: u32) -> Result<u32, MuxError> {
    if from_scale == 0 {
        return Ok(0);
    }
    let scaled = (u128::from(ticks) * u128::from(to_scale)) / u128::from(from_scale);
    u32::try_from(scaled).map_err(|_| MuxError::Overflow)
}

fn build_trak(build: &TrackBuild, mdat_offset: usize) -> Result<Boxes, MuxError> {
    let track = build.track;
    let duration_ticks = track_duration_ticks(build);
    let movie_duration = ticks_to_scale(duration_ticks, track.time_scale, MOVIE_TIMESCALE)?;

    let tkhd = Tkhd {
        flags: [0, 0, 3],
        version: TkhdVersion::V0(TkhdV0 {
            creation_time: 0,
            modification_time: 0,
            duration: movie_duration,
        }),
        track_id: build.out_id,
        reserved0: 0,
        reserved1: [0, 0],
        layer: 0,
        alternate_group: 0,
        volume: if track.is_video { 0 } else { 0x0100 },
        reserved2: 0,
        matrix: IDENTITY_MATRIX,
        width: 0,
        height: 0,
    };

    let edts = Boxes::new(Edts).with_child(Boxes::new(Elst {
        flags: [0, 0, 0],
        entries: ElstEntries::V1(vec![ElstEntryV1 {
            segment_duration: u64::from(movie_duration),
            media_time: 0,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        }]),
    }));

    let mdhd = Mdhd {
        flags: [0, 0, 0],
        version: MdhdVersion::V0(MdhdV0 {
            creation_time: 0,
            modification_time: 0,
            duration: u32::try_from(duration_ticks).map_err(|_| MuxError::Overflow)?,
        }),
        timescale: track.time_scale,
        pad: false,
        language: *b"und",
        pre_defined: 0,
    };

    let hdlr = Hdlr {
        full_box: FullBox::default(),
        pre_defined: 0,
        handler_type: track.handler_type,
        reserved: [0; 3],
        name: String::new(),
    };

    let vmhd = Vmhd {
        full_box: FullBox {
            version: 0,
            flags: [0, 0, 1],
        },
        graphics_mode: 0,
        opcolor: [0, 0, 0],
    };

    let dinf = Boxes::new(Dinf).with_child(Boxes::new(Dref {
        full_box: FullBox::default(),
        entry_count: 1,
    }).with_child(Boxes::new(Url {
        full_box: FullBox {
            version: 0,
            flags: mp4::u32_to_flags(URL_NOPT),
        },
        location: String::new(),
    })));

    let stsd = Boxes::new(Stsd {
        full_box: FullBox::default(),
        entry_count: 1,
    })
    .with_child(Boxes::new(RawBox {
        box_type: track.sample_entry_type,
        payload: track.sample_entry_payload.clone(),
    }));

    let stts = build_stts(build);
    let stsz = build_stsz(build)?;
    let (stsc, stco) = build_stsc_stco(build, mdat_offset)?;
    let ctts = build_ctts(build);

    let mut stbl = Boxes::new(Stbl).with_child(stsd);
    stbl = stbl.with_child(Boxes::new(stts));
    if let Some(stss) = build_stss(build)? {
        stbl = stbl.with_child(Boxes::new(stss));
    }
    stbl = stbl.with_child(Boxes::new(ctts));
    stbl = stbl.with_child(Boxes::new(stsc));
    stbl = stbl.with_child(Boxes::new(stsz));
    stbl = stbl.with_child(Boxes::new(stco));

    let minf = Boxes::new(Minf)
        .with_children3(Boxes::new(vmhd), dinf, stbl);
    let mdia = Boxes::new(Mdia).with_children3(Boxes::new(mdhd), Boxes::new(hdlr), minf);

    Ok(Boxes::new(Trak).with_children3(Boxes::new(tkhd), edts, mdia))
}

fn build_stts(build: &TrackBuild) -> Stts {
    let mut entries: Vec<SttsEntry> = Vec::new();
    for sample in &build.samples {
        if let Some(last) = entries.last_mut() {
            if last.sample_delta == sample.duration {
                last.sample_count += 1;
                continue;
            }
        }
        entries.push(SttsEntry {
            sample_count: 1,
            sample_delta: sample.duration,
        });
    }
    Stts {
        full_box: FullBox::default(),
        entries,
    }
}

fn build_ctts(build: &TrackBuild) -> Ctts {
    let mut entries: Vec<CttsEntryV1> = Vec::new();
    for sample in &build.samples {
        if let Some(last) = entries.last_mut() {
            if last.sample_offset == sample.composition_time_offset {
                last.sample_count += 1;
                continue;
            }
        }
        entries.push(CttsEntryV1 {
            sample_count: 1,
            sample_offset: sample.composition_time_offset,
        });
    }
    Ctts {
        flags: [0, 0, 0],
        entries: CttsEntries::V1(entries),
    }
}

fn build_stss(build: &TrackBuild) -> Result<Option<Stss>, MuxError> {
    let mut sample_numbers = Vec::new();
    for (i, sample) in build.samples.iter().enumerate() {
        if !sample.is_non_sync_sample {
            sample_numbers.push(u32::try_from(i + 1).map_err(|_| MuxError::Overflow)?);
        }
    }
    if sample_numbers.len() == build.samples.len() {
        return Ok(None);
    }
    Ok(Some(Stss {
        full_box: FullBox::default(),
        sample_numbers,
    }))
}

fn build_stsz(build: &TrackBuild) -> Result<Stsz, MuxError> {
    let mut entry_sizes = Vec::with_capacity(build.samples.len());
    for sample in &build.samples {
        entry_sizes.push(u32::try_from(sample.payload.len()).map_err(|_| MuxError::Overflow)?);
    }
    Ok(Stsz {
        full_box: FullBox::default(),
        sample_size: 0,
        sample_count: u32::try_from(build.samples.len()).map_err(|_| MuxError::Overflow)?,
        entry_sizes,
    })
}

fn build_stsc_stco(build: &TrackBuild, mdat_offset: usize) -> Result<(Stsc, Stco), MuxError> {
    let mut chunk_offsets = Vec::with_capacity(build.samples.len());
    for sample_offset in &build.sample_offsets {
        let absolute = mdat_offset + build.base_in_mdat + sample_offset;
        chunk_offsets.push(u32::try_from(absolute).map_err(|_| MuxError::Overflow)?);
    }
    let stsc = Stsc {
        full_box: FullBox::default(),
        entries: vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 1,
            sample_description_index: 1,
        }],
    };
    let stco = Stco {
        full_box: FullBox::default(),
        chunk_offsets,
    };
    Ok((stsc, stco))
}
