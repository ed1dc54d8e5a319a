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

    tests/roundtrip.rs

    Encode-then-write-back invertibility across the MFM and FM paths.
*/

mod common;

use common::*;
use rawtrack::{codec, HostHint, RawImage};
use std::io::Cursor;

#[test]
fn mfm_roundtrip_pc_1m44() {
    init();

    let source = pseudo_random_bytes(1_474_560, 0x1234_5678);
    let mut a = RawImage::open(
        Cursor::new(source.clone()),
        Some("img"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    let mut b = RawImage::open(
        Cursor::new(vec![0u8; 1_474_560]),
        Some("img"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    for track in 0..160u16 {
        a.setup_track(track, None).unwrap();
        let words = encode_revolution(&mut a);

        b.setup_track(track, None).unwrap();
        write_revolution(&mut b, &words);
    }

    assert_eq!(b.into_inner().into_inner(), source);
}

#[test]
fn mfm_stream_is_well_formed() {
    init();

    let source = pseudo_random_bytes(1_474_560, 0xBEEF_F00D);
    let mut im = RawImage::open(
        Cursor::new(source.clone()),
        Some("img"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    // Cylinder 3, head 1.
    im.setup_track(7, None).unwrap();
    let words = encode_revolution(&mut im);
    let sectors = scan_mfm(&words);

    assert_eq!(sectors.len(), 18);
    for sec in &sectors {
        assert!(sec.idam_ok, "IDAM CRC failed for {:?}", (sec.c, sec.h, sec.r));
        assert!(sec.data_ok, "data CRC failed for {:?}", (sec.c, sec.h, sec.r));
        assert_eq!((sec.c, sec.h, sec.n), (3, 1, 2));

        // Sector data must match the file contents at the raw offset.
        let off = ((3 * 2 + 1) * 18 + (sec.r as usize - 1)) * 512;
        assert_eq!(sec.data, source[off..off + 512]);
    }

    // All 18 sector ids present, in rotational order given interleave 1.
    let mut ids: Vec<u8> = sectors.iter().map(|s| s.r).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=18).collect::<Vec<u8>>());
}

#[test]
fn fm_roundtrip_atr_sd() {
    init();

    // 90 KiB single-density ATR: 16-byte header, 40 tracks of 18 * 128.
    let payload = pseudo_random_bytes(92_160, 0xA8A8_0101);
    let mut file = vec![0u8; 16];
    file[0] = 0x96;
    file[1] = 0x02;
    let paragraphs = (92_160u32 >> 4) as u16;
    file[2..4].copy_from_slice(&paragraphs.to_le_bytes());
    file[4..6].copy_from_slice(&128u16.to_le_bytes());
    file.extend_from_slice(&payload);

    let mut a = RawImage::open(
        Cursor::new(file.clone()),
        Some("atr"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    assert_eq!(a.base_off(), 16);
    assert_eq!(a.geometry().nr_cyls, 40);
    assert_eq!(a.geometry().nr_sides, 1);

    a.setup_track(0, None).unwrap();
    assert!(a.track_shape().is_fm);
    assert_eq!(a.track_shape().data_rate, 130);
    assert!(a.track_shape().invert_data);

    let words = encode_revolution(&mut a);
    let sectors = scan_fm(&words);
    assert_eq!(sectors.len(), 18);
    for sec in &sectors {
        assert!(sec.idam_ok && sec.data_ok);
        // Stored bytes are inverted on the wire.
        let off = (sec.r as usize - 1) * 128;
        let expect: Vec<u8> = payload[off..off + 128].iter().map(|b| !b).collect();
        assert_eq!(sec.data, expect);
    }

    // Write every track into a blank copy and compare the payloads.
    let mut blank = file[..16].to_vec();
    blank.extend_from_slice(&vec![0u8; 92_160]);
    let mut b = RawImage::open(
        Cursor::new(blank),
        Some("atr"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    for track in 0..40u16 {
        a.setup_track(track, None).unwrap();
        let words = encode_revolution(&mut a);
        b.setup_track(track, None).unwrap();
        write_revolution(&mut b, &words);
    }

    assert_eq!(b.into_inner().into_inner(), file);
}

#[test]
fn mid_track_write_locates_sector() {
    init();

    let source = pseudo_random_bytes(1_474_560, 0x0BAD_CAFE);
    let mut im = RawImage::open(
        Cursor::new(source.clone()),
        Some("img"),
        HostHint::Unspecified,
        None,
    )
    .unwrap();

    let track = 10u16; // cylinder 5, head 0
    im.setup_track(track, None).unwrap();

    // Pick the 4th sector in rotational order and compute where its data
    // field starts on the track, in data bytes.
    let slot = 3usize;
    let shape = *im.track_shape();
    let logical = im.sector_map()[slot] as usize;
    let mut byte_pos = shape.idx_sz;
    for i in 0..slot {
        let sec = im.arena().sectors_of(0)[im.sector_map()[i] as usize];
        byte_pos += shape.enc_sec_sz(&sec);
    }
    byte_pos += shape.idam_sz;

    // A write-gate assertion right at the data field, with no IDAM in the
    // sampled stream: DAM preamble, payload, CRC, trailing gap.
    let payload = pseudo_random_bytes(512, 0x5EED_5EED);
    let mut crc_src = vec![0xA1u8, 0xA1, 0xA1, 0xFB];
    crc_src.extend_from_slice(&payload);
    let crc = codec::crc_ibm_3740(&crc_src, None);

    let mut words: Vec<u16> = Vec::new();
    for _ in 0..12 {
        words.push(codec::mfm_encode(0x00));
    }
    for _ in 0..3 {
        words.push(codec::MFM_SYNC);
    }
    words.push(codec::mfm_encode(0xFB));
    for b in payload.iter().chain(crc.to_be_bytes().iter()) {
        words.push(codec::mfm_encode(*b));
    }
    for _ in 0..200 {
        words.push(codec::mfm_encode(0x4E));
    }

    im.write_begin(byte_pos * im.ticks_per_cell());
    let mut fed = 0;
    while fed < words.len() {
        fed += im.write_bitcells(&words[fed..]);
        im.write_track().unwrap();
    }
    im.write_end();
    while !im.write_track().unwrap() {}

    let file = im.into_inner().into_inner();
    let off = ((5 * 2) * 18 + logical) * 512;
    assert_eq!(&file[off..off + 512], payload.as_slice());

    // Everything else is untouched.
    assert_eq!(&file[..off], &source[..off]);
    assert_eq!(&file[off + 512..], &source[off + 512..]);
}
