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

    src/formats/xdf.rs

    IBM XDF extended-density diskettes. Tracks mix sector sizes from 512
    bytes to 8 KiB, head 1 of data cylinders runs shifted by ~10000
    bitcells, and the file order bears no resemblance to the rotational
    order, so every track carries an explicit per-sector file-offset table.
    The cylinder-0 tables are derived from the FAT and root directory
    geometry declared in the BPB, following the fdutils layout convention.
*/

use crate::{
    bpb::Bpb,
    image::{Geometry, RawImage},
    io::ReadWriteSeek,
    ImageError,
};

struct XdfFormat {
    /// Sectors per track as reported by the FAT.
    logical_sec_per_track: u16,
    /// Physical sectors on cylinder 0 / on data cylinders.
    sec_per_track0: usize,
    sec_per_trackn: usize,
    /// Head-1 track shift on data cylinders, in bitcells.
    head1_shift_bc: u32,
    /// Data-cylinder sectors per head: (size code, offset into the
    /// cylinder's file data in 256-byte units).
    cyln_sec: [[(u8, u8); 4]; 2],
}

const XDF_FORMATS: &[XdfFormat] = &[
    // 3.5" HD.
    // Cyl 0, head 0: sectors 1-8 (aux FAT) then 129-139 (main FAT pt.1),
    //   19 sectors at interleave 2.
    // Cyl 0, head 1: sectors 129-147 (main FAT pt.2, root dir, data).
    // Cyl N, head 0: 131(1k), 130(.5k), 132(2k), 134(8k).
    // Cyl N, head 1: same sizes, rotated, running ~10k bitcells late.
    XdfFormat {
        logical_sec_per_track: 23,
        sec_per_track0: 19,
        sec_per_trackn: 4,
        head1_shift_bc: 10_000,
        cyln_sec: [
            [(3, 0x00), (2, 0x2C), (4, 0x04), (6, 0x30)], // head 0
            [(4, 0x50), (2, 0x2E), (3, 0x58), (6, 0x0C)], // head 1
        ],
    },
];

/// Per-image offset tables, selected per track by `setup_track_offsets`.
pub(crate) struct XdfInfo {
    /// C0H0, C0H1, CnH0, CnH1.
    pub offsets: [Vec<u32>; 4],
    pub cyl_bytes: u32,
    pub head1_shift_bc: u32,
}

pub(crate) fn open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    let bpb = Bpb::read(&mut im.file).ok_or(ImageError::UnknownFormat)?;
    if !bpb.xdf_check() {
        return Err(ImageError::UnknownFormat);
    }

    let fmt = XDF_FORMATS
        .iter()
        .find(|f| f.logical_sec_per_track == bpb.sec_per_track)
        .ok_or(ImageError::UnknownFormat)?;

    let rootdir_secs = (bpb.rootdir_ents / 16) as usize;
    let fat_secs = bpb.fat_secs as usize;
    // The root directory must fill a whole number of sectors, and the FATs
    // plus root directory must fit in cylinder 0.
    if (bpb.rootdir_ents & 15) != 0
        || 8 + 1 + fat_secs + rootdir_secs > 2 * fmt.sec_per_track0
    {
        return Err(ImageError::UnknownFormat);
    }

    im.geom = Geometry {
        nr_cyls: 80,
        nr_sides: 2,
    };
    im.arena.init_track_map(80, 2)?;

    // Four track layouts: C0H0, C0H1, CnH0, CnH1.
    for i in 0..2usize {
        let ti = im.arena.add_track_layout(fmt.sec_per_track0)?;
        im.arena.trk_mut(ti).interleave = 2;
        let mut aux_id = 1u8;
        let mut main_id = 129u8;
        for (j, sec) in im.arena.sectors_of_mut(ti).iter_mut().enumerate() {
            sec.r = if i == 0 && j < 8 {
                let r = aux_id;
                aux_id += 1;
                r
            } else {
                let r = main_id;
                main_id += 1;
                r
            };
            sec.n = 2;
        }
    }
    for head in 0..2usize {
        let ti = im.arena.add_track_layout(fmt.sec_per_trackn)?;
        im.arena.trk_mut(ti).interleave = 1;
        for (j, sec) in im.arena.sectors_of_mut(ti).iter_mut().enumerate() {
            let n = fmt.cyln_sec[head][j].0;
            sec.r = n + 128;
            sec.n = n;
        }
    }

    im.arena.map_set(0, 0);
    im.arena.map_set(1, 1);
    for t in 2..80 * 2 {
        im.arena.map_set(t, 2 + (t & 1) as u8);
    }
    im.arena.finalise_track_map()?;

    // Cylinder 0 image layout (thanks to fdutils/xdfcopy):
    //   file order: MAIN boot, MAIN FAT, AUX FAT, MAIN root dir,
    //   AUX FAT duplicate (5 sectors, unused on disk), MAIN data.
    //   Disk order: AUX (head 0 sectors 1-8) then MAIN (129+ head 0,
    //   then head 1).
    let mut cyl0 = Vec::with_capacity(2 * fmt.sec_per_track0);
    let mut img_curs: u32 = 1 + fat_secs as u32; // skip MAIN boot+FAT
    for i in 0..8u32 {
        cyl0.push((img_curs + i) << 9);
    }
    for i in 0..(1 + fat_secs as u32) {
        cyl0.push(i << 9);
    }
    img_curs += fat_secs as u32; // skip AUX FAT
    for _ in 0..rootdir_secs {
        cyl0.push(img_curs << 9);
        img_curs += 1;
    }
    img_curs += 5; // skip the AUX FAT duplicate
    while cyl0.len() < 2 * fmt.sec_per_track0 {
        cyl0.push(img_curs << 9);
        img_curs += 1;
    }
    let cyl0_h1 = cyl0.split_off(fmt.sec_per_track0);

    // Data cylinders: interleaved on disk and in the file, described by
    // the per-format offset table.
    let cyl_offsets =
        |head: usize| -> Vec<u32> {
            fmt.cyln_sec[head]
                .iter()
                .map(|&(_, off)| (off as u32) << 8)
                .collect()
        };
    let (cyln_h0, cyln_h1) = (cyl_offsets(0), cyl_offsets(1));

    im.xdf = Some(XdfInfo {
        offsets: [cyl0, cyl0_h1, cyln_h0, cyln_h1],
        cyl_bytes: fmt.logical_sec_per_track as u32 * 2 * 512,
        head1_shift_bc: fmt.head1_shift_bc,
    });
    // Placeholder until the first setup_track() selects a real table.
    im.file_sec_offsets = Some(Vec::new());

    im.raw_open()
}

/// Select the offset table and head-1 delay for a physical track, ahead of
/// the generic track setup.
pub(crate) fn setup_track_offsets<F: ReadWriteSeek>(im: &mut RawImage<F>, track: u16) {
    let Some(xdf) = &im.xdf else {
        return;
    };

    im.track_delay_bc = 0;
    let mut sel = (track & 1) as usize;
    if (track >> 1) != 0 {
        sel += 2;
        if track & 1 != 0 {
            im.track_delay_bc = xdf.head1_shift_bc;
        }
    }

    im.trk_off = (track >> 1) as u32 * xdf.cyl_bytes;
    im.file_sec_offsets = Some(xdf.offsets[sel].clone());
}
