/*
    rawtrack
    https://github.com/dbalsom/rawtrack

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/formats/img.rs

    Handlers for bare sector dumps: the generic size-matched open with its
    host-specific candidate tables, BPB-driven PC-DOS/MSX geometry, and the
    headerless variants (ST, D81, ADFS, MBD, MGT, PC-98 HDM, UKNC, IBM 3174)
    that differ only in table or layout flags.
*/

use crate::{
    bpb::Bpb,
    catalog::{self, RawType},
    config::{self, ConfigToken},
    formats::{ti99, HostHint},
    image::{FileLayout, Geometry, RawImage},
    io::ReadWriteSeek,
    sec_sz,
    track::SimpleLayout,
    ImageError,
};

/// Walk a candidate table for a file-size match, then apply the matched
/// geometry as a uniform layout.
pub(crate) fn raw_type_open<F: ReadWriteSeek>(
    im: &mut RawImage<F>,
    types: &[RawType],
) -> Result<(), ImageError> {
    let (nr_cyls, t) =
        catalog::match_size(types, im.im_size()).ok_or(ImageError::UnknownFormat)?;
    im.geom = Geometry {
        nr_cyls,
        nr_sides: t.nr_sides,
    };
    im.arena.build_simple(nr_cyls, t.nr_sides, &t.to_layout())?;
    im.raw_open()
}

pub(crate) fn open<F: ReadWriteSeek>(
    im: &mut RawImage<F>,
    tag: Option<&str>,
    sidecar: Option<&[ConfigToken<'_>]>,
) -> Result<(), ImageError> {
    // A matching sidecar section overrides all built-in probing.
    if let Some(tokens) = sidecar {
        if config::tag_open(im, tag, tokens)? {
            return Ok(());
        }
        im.reset_all_params();
    }

    let types: &[RawType] = match im.host {
        HostHint::Akai | HostHint::Gem => catalog::AKAI_TYPES,
        HostHint::Casio => catalog::CASIO_TYPES,
        HostHint::Dec => catalog::DEC_TYPES,
        HostHint::Ensoniq => catalog::ENSONIQ_TYPES,
        HostHint::Fluke => catalog::FLUKE_TYPES,
        HostHint::Ibm3174 => return ibm_3174_open(im),
        HostHint::Memotech => catalog::MEMOTECH_TYPES,
        HostHint::Msx => {
            return match msx_open(im) {
                Err(ImageError::UnknownFormat) => fallback(im),
                other => other,
            };
        }
        HostHint::Nascom => catalog::NASCOM_TYPES,
        HostHint::Pc98 => catalog::PC98_TYPES,
        HostHint::PcDos => {
            return match pc_dos_open(im) {
                Err(ImageError::UnknownFormat) => fallback(im),
                other => other,
            };
        }
        HostHint::Ti99 => return ti99::open(im),
        HostHint::Uknc => return uknc_open(im),
        HostHint::Unspecified => catalog::IMG_TYPES,
    };

    match raw_type_open(im, types) {
        Err(ImageError::UnknownFormat) => fallback(im),
        other => other,
    }
}

fn fallback<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.reset_all_params();
    raw_type_open(im, catalog::IMG_TYPES)
}

pub(crate) fn adfs_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    raw_type_open(im, catalog::ADFS_TYPES)
}

pub(crate) fn mbd_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    raw_type_open(im, catalog::MBD_TYPES)
}

pub(crate) fn mgt_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    raw_type_open(im, catalog::IMG_TYPES)
}

pub(crate) fn pc98hdm_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    raw_type_open(im, catalog::PC98_TYPES)
}

pub(crate) fn d81_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.layout = FileLayout::SIDES_SWAPPED;
    raw_type_open(im, catalog::D81_TYPES)
}

/// Atari ST: the PC 80-cylinder table without IAMs. TOS formats 720kB
/// disks with track and side skew.
pub(crate) fn st_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    let st_types: Vec<RawType> = catalog::IMG_TYPES
        .iter()
        .filter(|t| t.cyls == catalog::CylClass::C80)
        .map(|t| {
            let mut t = *t;
            t.has_iam = false;
            if t.nr_secs == 9 {
                if t.nr_sides == 1 {
                    t.cskew = 2;
                } else {
                    t.cskew = 4;
                    t.hskew = 2;
                }
            }
            t
        })
        .collect();

    raw_type_open(im, &st_types)
}

/// UKNC: MFM with extra A1 resync words after every CRC and custom gaps.
pub(crate) fn uknc_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.post_crc_syncs = 1;
    let (nr_cyls, t) =
        catalog::match_size(catalog::UKNC_TYPES, im.im_size()).ok_or(ImageError::UnknownFormat)?;
    im.geom = Geometry {
        nr_cyls,
        nr_sides: t.nr_sides,
    };
    let mut layout = t.to_layout();
    layout.gap_2 = Some(24);
    layout.gap_4a = Some(27);
    im.arena.build_simple(nr_cyls, t.nr_sides, &layout)?;
    im.raw_open()
}

/// IBM 3174 controller diskettes. The 2.4MB extended-density variant mixes
/// two zones in one image: cylinder 0 carries 15 sectors at 360rpm, all
/// other cylinders 30 sectors at 180rpm.
fn ibm_3174_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    match im.im_size() {
        1_228_800 => {
            // 1.2MB high density: plain 80/2/15.
            return raw_type_open(im, catalog::IMG_TYPES);
        }
        2_442_240 => {}
        _ => return Err(ImageError::UnknownFormat),
    }

    im.geom = Geometry {
        nr_cyls: 80,
        nr_sides: 2,
    };
    im.arena.init_track_map(80, 2)?;

    for i in 0..2usize {
        let nr_sectors = if i == 0 { 15 } else { 30 };
        let ti = im.arena.add_track_layout(nr_sectors)?;
        {
            let trk = im.arena.trk_mut(ti);
            trk.has_iam = true;
            trk.gap_3 = Some(104);
            trk.rpm = if i == 0 { 360 } else { 180 };
        }
        for (j, sec) in im.arena.sectors_of_mut(ti).iter_mut().enumerate() {
            sec.r = j as u8 + 1;
            sec.n = 2;
        }
    }

    for cyl in 0..80usize {
        for side in 0..2usize {
            im.arena.map_set(cyl * 2 + side, (cyl != 0) as u8);
        }
    }
    im.arena.finalise_track_map()?;

    im.raw_open()
}

/// MSX: disambiguate the overloaded 320k/360k sizes via the boot sector
/// before falling back to the MSX candidate table.
fn msx_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    if matches!(im.im_size(), 327_680 | 368_640) {
        // The 0xAA55 boot signature is not valid in MSX-DOS, so only the
        // geometry fields are checked.
        if let Some(bpb) = Bpb::read(&mut im.file) {
            if bpb.bytes_per_sec == 512
                && (1..=2).contains(&bpb.num_heads)
                && bpb.tot_sec as u64 == im.im_size() / bpb.bytes_per_sec as u64
                && (8..=9).contains(&bpb.sec_per_track)
            {
                let layout = SimpleLayout {
                    nr_sectors: bpb.sec_per_track,
                    no: 2,
                    ..SimpleLayout::default()
                };
                let nr_sides = bpb.num_heads as u8;
                let nr_cyls = if nr_sides == 1 { 80 } else { 40 };
                im.geom = Geometry { nr_cyls, nr_sides };
                im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
                return im.raw_open();
            }
        }
    }

    im.reset_all_params();
    raw_type_open(im, catalog::MSX_TYPES)
}

/// PC-DOS: take the geometry from the BPB rather than the file size.
fn pc_dos_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    let bpb = Bpb::read(&mut im.file).ok_or(ImageError::UnknownFormat)?;

    if bpb.sig != 0xAA55 {
        return Err(ImageError::UnknownFormat);
    }

    let mut layout = SimpleLayout {
        no: (0..=6u8)
            .find(|&no| sec_sz(no) as u16 == bpb.bytes_per_sec)
            .unwrap_or(7),
        ..SimpleLayout::default()
    };

    if bpb.sec_per_track == 0 || bpb.sec_per_track > 256 {
        return Err(ImageError::UnknownFormat);
    }
    layout.nr_sectors = bpb.sec_per_track;

    // A 23-sectors-per-track BPB on an ordinary-looking image means XDF;
    // bail so the dispatcher can route it to the XDF handler instead.
    if bpb.sec_per_track == 23 && bpb.xdf_check() {
        return Err(ImageError::UnknownFormat);
    }

    // MS-DMF needs interleave and skew.
    if bpb.sec_per_track == 21 && layout.no == 2 {
        layout.interleave = 2;
        layout.cskew = 3;
    }

    if !(1..=2).contains(&bpb.num_heads) {
        return Err(ImageError::UnknownFormat);
    }
    let nr_sides = bpb.num_heads as u8;

    let spc = layout.nr_sectors as u32 * nr_sides as u32;
    let nr_cyls = ((bpb.tot_sec as u32 + spc - 1) / spc) as u16;
    if nr_cyls == 0 {
        return Err(ImageError::UnknownFormat);
    }

    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}
