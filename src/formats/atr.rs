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

    src/formats/atr.rs

    Atari 8-bit ATR images. Data bytes are stored inverted relative to the
    medium, track 0 always begins with three 128-byte sectors, and the SIO
    interface is slow enough to need an aggressive interleave.
*/

use binrw::BinRead;

use crate::{
    image::{Geometry, RawImage},
    io::{ReadWriteSeek, Seek, SeekFrom},
    ImageError,
};

/// Original Atari drives (e.g. 1050) spin slightly slow (288rpm, -4%).
/// Later interfaces use normal-speed drives with a faster-than-usual bit
/// rate (e.g. the XF551 clocks its controller at 8.333MHz rather than
/// 8MHz, +4%). We emulate the faster bit rate.
fn atr_rate(rate: u16) -> u16 {
    rate + rate / 25
}

/// Atari machines transfer floppy data over the SIO interface, which
/// manages only about two sectors per disk revolution; sequential reads
/// need a deep interleave to avoid blowing a full revolution per sector.
fn atr_interleave(nr_sectors: u16) -> u8 {
    (nr_sectors / 2) as u8
}

#[derive(Debug, BinRead)]
#[br(little)]
struct AtrHeader {
    sig: u16,
    size_lo: u16,
    size_sec: u16,
    #[allow(dead_code)]
    size_hi: u16,
    #[allow(dead_code)]
    flags: u8,
    #[allow(dead_code)]
    unused: [u8; 7],
}

pub(crate) fn open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.file.seek(SeekFrom::Start(0))?;
    let header = AtrHeader::read_le(&mut im.file).map_err(|_| ImageError::UnknownFormat)?;
    if header.sig != 0x0296 {
        return Err(ImageError::UnknownFormat);
    }
    let sz = (header.size_lo as u32) << 4; // size is in 16-byte paragraphs
    let no = (header.size_sec / 256) as u8; // 128 or 256 -> 0 or 1

    // Default: 40-1-18, 256b/s, MFM.
    let mut nr_sectors: u16 = 18;
    let nr_cyls: u16 = 40;
    let mut nr_sides: u8 = 1;
    let mut is_fm = false;
    let mut rate = atr_rate(250);
    if no == 0 {
        is_fm = sz < 130 * 1024;
        if is_fm {
            // 40-1-18, 128b/s, FM
            rate = atr_rate(125);
        } else {
            // 40-1-26, 128b/s, MFM
            nr_sectors = 26;
        }
    } else if sz >= 360 * 1024 - 3 * 128 {
        // 40-2-18, 256b/s, MFM
        nr_sides = 2;
    }
    im.base_off = 16;
    im.geom = Geometry { nr_cyls, nr_sides };

    im.arena.init_track_map(nr_cyls, nr_sides)?;

    // Two track layouts: 0 -> track 0; 1 -> all other tracks.
    for _ in 0..2 {
        let ti = im.arena.add_track_layout(nr_sectors as usize)?;
        {
            let trk = im.arena.trk_mut(ti);
            trk.has_iam = true;
            trk.is_fm = is_fm;
            trk.invert_data = true;
            trk.data_rate = rate;
            trk.interleave = atr_interleave(nr_sectors);
        }
        for (j, sec) in im.arena.sectors_of_mut(ti).iter_mut().enumerate() {
            sec.r = j as u8 + 1;
            sec.n = no;
        }
    }

    // Track 0: the first three sectors are always 128 bytes.
    for sec in im.arena.sectors_of_mut(0).iter_mut().take(3) {
        sec.n = 0;
    }

    im.arena.map_set(0, 0);
    for t in 1..nr_cyls as usize * nr_sides as usize {
        im.arena.map_set(t, 1);
    }
    im.arena.finalise_track_map()?;

    im.raw_open()
}
