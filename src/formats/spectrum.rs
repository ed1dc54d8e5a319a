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

    src/formats/spectrum.rs

    Sinclair-world sector dumps: TR-DOS TRD and Opus Discovery OPD.
*/

use binrw::BinRead;

use crate::{
    image::{Geometry, RawImage},
    io::{ReadWriteSeek, Seek, SeekFrom},
    track::SimpleLayout,
    ImageError,
};

/// TR-DOS volume geometry record at offset 0x8E0 of the catalog track.
#[derive(Debug, BinRead)]
struct TrdGeometry {
    #[allow(dead_code)]
    na: u8,
    free_sec: u8,
    free_trk: u8,
    disk_type: u8,
    #[allow(dead_code)]
    nr_files: u8,
    free_secs_lo: u8,
    free_secs_hi: u8,
    id: u8,
}

pub(crate) fn trd_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    let layout = SimpleLayout {
        nr_sectors: 16,
        has_iam: true,
        has_empty: true, // images may leave the last half-cylinder unformatted
        no: 1,
        gap_3: Some(57),
        base: [1, 1],
        interleave: 1,
        ..SimpleLayout::default()
    };

    im.file.seek(SeekFrom::Start(0x8E0))?;
    let geometry = TrdGeometry::read_le(&mut im.file).map_err(|_| ImageError::UnknownFormat)?;
    if geometry.id != 0x10 {
        return Err(ImageError::UnknownFormat);
    }

    // The type identifier is a geometry hint; default to double-sided.
    let nr_sides: u8 = match geometry.disk_type {
        0x18 | 0x19 => 1,
        _ => 2,
    };

    // Total sectors on disk: first-free plus number-of-free.
    let mut tot_secs: u32 = geometry.free_sec as u32
        + geometry.free_trk as u32 * 16
        + geometry.free_secs_lo as u32
        + geometry.free_secs_hi as u32 * 256;
    if (tot_secs & 15) != 0 || tot_secs > 4096 {
        tot_secs = 0; // too large or not a track multiple
    }

    // Trust the image size where the reported total is small or invalid.
    tot_secs = tot_secs.max((im.im_size() / 256) as u32);

    let tot_trks = tot_secs >> 4;
    let nr_cyls = ((tot_trks + nr_sides as u32 - 1) / nr_sides as u32) as u16;
    if nr_cyls == 0 {
        return Err(ImageError::UnknownFormat);
    }

    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;

    // Some images do not fill the last cylinder; map the trailing track to
    // the empty layout.
    if tot_trks & (nr_sides as u32 - 1) != 0 {
        im.arena.map_set(tot_trks as usize, nr_sides);
    }

    im.raw_open()
}

pub(crate) fn opd_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    let layout = SimpleLayout {
        nr_sectors: 18,
        has_iam: true,
        no: 1,
        gap_3: Some(12),
        base: [0, 0],
        interleave: 13,
        cskew: 13,
        ..SimpleLayout::default()
    };

    let (nr_cyls, nr_sides) = match im.im_size() {
        184_320 => (40u16, 1u8),
        737_280 => (80, 2),
        _ => return Err(ImageError::UnknownFormat),
    };

    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}
