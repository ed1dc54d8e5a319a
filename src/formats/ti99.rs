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

    src/formats/ti99.rs

    TI-99/4A sector dumps. Side 1 runs in reverse cylinder order, and the
    dump is side-major. Ambiguous sizes are disambiguated by the Volume
    Information Block when one is present; without one the more common
    geometry is assumed.
*/

use binrw::BinRead;

use crate::{
    image::{FileLayout, Geometry, RawImage},
    io::{ReadWriteSeek, Seek, SeekFrom},
    track::SimpleLayout,
    ImageError,
};

/// Volume Information Block in sector 0.
#[derive(Debug, BinRead)]
#[br(big)]
struct Vib {
    #[allow(dead_code)]
    name: [u8; 10],
    #[allow(dead_code)]
    tot_secs: u16,
    #[allow(dead_code)]
    secs_per_track: u8,
    id: [u8; 3],
    #[allow(dead_code)]
    protection: u8,
    tracks_per_side: u8,
    sides: u8,
    #[allow(dead_code)]
    density: u8,
}

pub(crate) fn open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    // Must be a whole number of 256-byte sectors.
    if im.im_size() % 256 != 0 {
        return Err(ImageError::UnknownFormat);
    }
    let mut fsize = im.im_size() / 256;

    // A trailing 3-sector footer holds a bad-sector map; ignore it.
    if fsize % 10 == 3 {
        fsize -= 3;
    }
    if fsize == 0 {
        return Err(ImageError::UnknownFormat);
    }

    im.file.seek(SeekFrom::Start(0))?;
    let vib = Vib::read_be(&mut im.file).ok();
    let vib = vib.filter(|v| &v.id == b"DSK");

    let mut layout = SimpleLayout {
        interleave: 4,
        cskew: 3,
        no: 1,
        base: [0, 0],
        ..SimpleLayout::default()
    };
    im.layout = FileLayout::SEQUENTIAL | FileLayout::REVERSE_SIDE1;

    let nr_cyls: u16;
    let nr_sides: u8;

    if fsize % (40 * 9) == 0 {
        // 9/18/36 sectors-per-track formats.
        match fsize / (40 * 9) {
            1 => {
                // SSSD
                nr_cyls = 40;
                nr_sides = 1;
                layout.nr_sectors = 9;
                layout.gap_3 = Some(44);
                layout.is_fm = true;
            }
            2 => {
                if vib.as_ref().is_some_and(|v| v.sides == 1) {
                    // Disambiguated: SSDD.
                    nr_cyls = 40;
                    nr_sides = 1;
                    layout.interleave = 5;
                    layout.nr_sectors = 18;
                    layout.gap_3 = Some(24);
                } else {
                    // Assume DSSD.
                    nr_cyls = 40;
                    nr_sides = 2;
                    layout.nr_sectors = 9;
                    layout.gap_3 = Some(44);
                    layout.is_fm = true;
                }
            }
            4 => {
                if vib.as_ref().is_some_and(|v| v.tracks_per_side == 80) {
                    // Disambiguated: DSSD80.
                    nr_cyls = 80;
                    nr_sides = 2;
                    layout.nr_sectors = 9;
                    layout.gap_3 = Some(44);
                    layout.is_fm = true;
                } else {
                    // Assume DSDD.
                    nr_cyls = 40;
                    nr_sides = 2;
                    layout.interleave = 5;
                    layout.nr_sectors = 18;
                    layout.gap_3 = Some(24);
                }
            }
            8 => {
                // DSDD80
                nr_cyls = 80;
                nr_sides = 2;
                layout.interleave = 5;
                layout.nr_sectors = 18;
                layout.gap_3 = Some(24);
            }
            16 => {
                // DSHD80
                nr_cyls = 80;
                nr_sides = 2;
                layout.interleave = 5;
                layout.nr_sectors = 36;
                layout.gap_3 = Some(24);
            }
            _ => return Err(ImageError::UnknownFormat),
        }
    } else if fsize % (40 * 16) == 0 && fsize / (40 * 16) <= 2 {
        // SSDD/DSDD, 16 sectors.
        nr_cyls = 40;
        nr_sides = (fsize / (40 * 16)) as u8;
        layout.interleave = 5;
        layout.nr_sectors = 16;
        layout.gap_3 = Some(44);
    } else {
        return Err(ImageError::UnknownFormat);
    }

    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}
