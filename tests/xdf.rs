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

    tests/xdf.rs

    XDF extended-density images: non-uniform sector sizes, per-cylinder
    layouts, the head-1 bitcell shift and per-sector file offsets.
*/

mod common;

use common::*;
use rawtrack::{HostHint, ImageFormat, RawImage};
use std::io::Cursor;

const XDF_SIZE: usize = 80 * 2 * 23 * 512; // 1,884,160 bytes
const FAT_SECS: u16 = 11;
const ROOTDIR_ENTS: u16 = 224; // 14 sectors

fn xdf_image() -> Vec<u8> {
    let mut bytes = pseudo_random_bytes(XDF_SIZE, 0xD1F0_0D1E);
    bytes[510..512].copy_from_slice(&0xAA55u16.to_le_bytes());
    bytes[11..13].copy_from_slice(&512u16.to_le_bytes());
    bytes[24..26].copy_from_slice(&23u16.to_le_bytes());
    bytes[26..28].copy_from_slice(&2u16.to_le_bytes());
    bytes[19..21].copy_from_slice(&3680u16.to_le_bytes());
    bytes[17..19].copy_from_slice(&ROOTDIR_ENTS.to_le_bytes());
    bytes[22..24].copy_from_slice(&FAT_SECS.to_le_bytes());
    bytes
}

#[test]
fn xdf_layouts_and_delay() {
    init();
    let mut im = RawImage::open(
        Cursor::new(xdf_image()),
        Some("xdf"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    assert_eq!(im.arena().nr_layouts(), 4);

    // Cylinder 0 tracks carry 19 uniform 512-byte sectors; head 0 starts
    // with the 8 AUX ids, then MAIN ids from 129.
    let c0h0 = im.arena().sectors_of(0);
    assert_eq!(c0h0.len(), 19);
    assert!(c0h0.iter().all(|s| s.n == 2));
    assert_eq!(c0h0[0].r, 1);
    assert_eq!(c0h0[7].r, 8);
    assert_eq!(c0h0[8].r, 129);
    assert_eq!(c0h0[18].r, 139);
    let c0h1 = im.arena().sectors_of(1);
    assert_eq!(c0h1[0].r, 129);
    assert_eq!(c0h1[18].r, 147);

    // Data cylinders carry 1k, 0.5k, 2k and 8k sectors, id = 128 + size
    // code.
    let cnh0 = im.arena().sectors_of(2);
    let sizes: Vec<u8> = cnh0.iter().map(|s| s.n).collect();
    assert_eq!(sizes, vec![3, 2, 4, 6]);
    assert!(cnh0.iter().all(|s| s.r == 128 + s.n));
    let cnh1 = im.arena().sectors_of(3);
    let sizes: Vec<u8> = cnh1.iter().map(|s| s.n).collect();
    assert_eq!(sizes, vec![4, 2, 3, 6]);

    // Head 1 of a data cylinder runs late by the format's track shift;
    // cylinder 0 and head 0 do not.
    im.setup_track(0, None).unwrap();
    assert_eq!(im.track_delay_bc(), 0);
    im.setup_track(3, None).unwrap();
    assert_eq!(im.track_delay_bc(), 10_000);
    im.setup_track(2, None).unwrap();
    assert_eq!(im.track_delay_bc(), 0);

    // Each cylinder occupies a contiguous 23 KiB slab of the file.
    assert_eq!(im.track_file_offset(), 23 * 2 * 512);
    im.setup_track(40, None).unwrap();
    assert_eq!(im.track_file_offset(), 20 * 23 * 2 * 512);
}

#[test]
fn xdf_cyl0_offset_tables_follow_fat_layout() {
    init();
    let mut im = RawImage::open(
        Cursor::new(xdf_image()),
        Some("xdf"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    let file = xdf_image();
    let fat = FAT_SECS as usize;

    // Head 0, sector id 1 (first AUX sector) lives right after the MAIN
    // boot sector and FAT in the file.
    im.setup_track(0, None).unwrap();
    let words = encode_revolution(&mut im);
    let sectors = scan_mfm(&words);
    assert_eq!(sectors.len(), 19);
    assert!(sectors.iter().all(|s| s.idam_ok && s.data_ok));

    for sec in &sectors {
        let file_off = match sec.r {
            1..=8 => (1 + fat + (sec.r as usize - 1)) * 512,
            129 => 0, // boot sector
            130..=140 => (sec.r as usize - 129) * 512, // MAIN FAT
            _ => continue,
        };
        assert_eq!(
            sec.data,
            file[file_off..file_off + 512],
            "sector {} mapped wrong",
            sec.r
        );
    }
}

#[test]
fn xdf_data_cylinder_stream() {
    init();
    let mut im = RawImage::open(
        Cursor::new(xdf_image()),
        Some("xdf"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    // Cylinder 7, head 0.
    im.setup_track(14, None).unwrap();
    let words = encode_revolution(&mut im);
    let sectors = scan_mfm(&words);

    assert_eq!(sectors.len(), 4);
    assert!(sectors.iter().all(|s| s.idam_ok && s.data_ok));
    let sizes: Vec<usize> = sectors.iter().map(|s| s.data.len()).collect();
    assert_eq!(sizes, vec![1024, 512, 2048, 8192]);

    // Spot-check the 2 KiB sector against its file offset table entry:
    // 0x04 * 256 bytes into this cylinder's slab... the 1 KiB sector at
    // offset 0, the 0.5 KiB at 0x2C00.
    let file = xdf_image();
    let slab = 7 * 23 * 2 * 512;
    assert_eq!(sectors[0].data, file[slab..slab + 1024]);
    assert_eq!(sectors[1].data, file[slab + 0x2C00..slab + 0x2C00 + 512]);
    assert_eq!(sectors[2].data, file[slab + 0x0400..slab + 0x0400 + 2048]);
    assert_eq!(sectors[3].data, file[slab + 0x3000..slab + 0x3000 + 8192]);
}

#[test]
fn pc_dos_host_rejects_xdf() {
    init();
    // With the PC-DOS host hint the BPB announces XDF; the BPB path must
    // bail out, and the size-based fallback cannot match 1.86M either, so
    // the image is routed to the XDF handler by extension instead.
    let result = RawImage::open(
        Cursor::new(xdf_image()),
        Some("img"),
        HostHint::PcDos,
        None,
    );
    assert!(result.is_err());

    let im = RawImage::open_as(
        ImageFormat::Xdf,
        Cursor::new(xdf_image()),
        HostHint::PcDos,
    )
    .unwrap();
    assert_eq!(im.arena().nr_layouts(), 4);
}
