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

    src/formats/acorn.rs

    Acorn DFS sector dumps (SSD/DSD): FM, 10 sectors of 256 bytes, with
    the cylinder count fixed at 80 and the side count coming from the
    extension.
*/

use crate::{
    image::{Geometry, RawImage},
    io::ReadWriteSeek,
    track::SimpleLayout,
    ImageError,
};

fn dfs_open<F: ReadWriteSeek>(im: &mut RawImage<F>, nr_sides: u8) -> Result<(), ImageError> {
    let layout = SimpleLayout {
        nr_sectors: 10,
        is_fm: true,
        has_iam: false,
        no: 1,
        gap_3: Some(21),
        base: [0, 0],
        interleave: 1,
        cskew: 3,
        ..SimpleLayout::default()
    };

    let nr_cyls = 80;
    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}

pub(crate) fn ssd_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    dfs_open(im, 1)
}

pub(crate) fn dsd_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    dfs_open(im, 2)
}
