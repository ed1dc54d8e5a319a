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

    tests/config.rs

    Sidecar-configuration section scoring and multi-zone layouts.
*/

mod common;

use common::*;
use rawtrack::{config::ConfigToken, FileLayout, HostHint, RawImage};
use std::io::Cursor;

#[test]
fn tag_and_size_scoring() {
    init();
    // Three sections: wrong tag, right tag with wrong size (clobbered),
    // right tag and size. The last must win.
    let text = "\
[st::999]
cyls=40
[img::999]
cyls=41
[img::737280]
cyls=80
heads=2
secs=9
bps=512
";
    let tokens = ConfigToken::tokenize(text);
    let im = RawImage::open(
        Cursor::new(vec![0u8; 737_280]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();
    let geom = im.geometry();
    assert_eq!((geom.nr_cyls, geom.nr_sides), (80, 2));
    assert_eq!(im.arena().trk(0).nr_sectors, 9);
    assert_eq!(im.arena().sectors_of(0)[0].n, 2);
}

#[test]
fn default_section_is_weakest() {
    init();
    let text = "\
[]
cyls=40
heads=1
secs=9
bps=512
[img]
cyls=80
heads=2
secs=9
bps=512
";
    let tokens = ConfigToken::tokenize(text);
    let im = RawImage::open(
        Cursor::new(vec![0u8; 737_280]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();
    assert_eq!(im.geometry().nr_cyls, 80);
}

#[test]
fn no_matching_section_falls_back_to_size() {
    init();
    let text = "[atr::92160]\ncyls=40\n";
    let tokens = ConfigToken::tokenize(text);
    // Tag mismatch and size mismatch: the built-in catalog takes over.
    let im = RawImage::open(
        Cursor::new(vec![0u8; 737_280]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();
    let geom = im.geometry();
    assert_eq!((geom.nr_cyls, geom.nr_sides), (80, 2));
    assert_eq!(im.arena().trk(0).nr_sectors, 9);
}

#[test]
fn multi_zone_tracks_directive() {
    init();
    // A two-zone layout: 15-sector cylinder 0, 30-sector cylinders 1-79,
    // mirroring the 2.4M controller diskette shape.
    let text = "\
[img]
cyls=80
heads=2
secs=15
bps=512
rpm=360
tracks=1-79
secs=30
rpm=180
";
    let tokens = ConfigToken::tokenize(text);
    let mut im = RawImage::open(
        Cursor::new(vec![0u8; 2_442_240]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();

    assert_eq!(im.arena().nr_layouts(), 2);
    im.setup_track(0, None).unwrap();
    assert_eq!(im.track_shape().nr_sectors, 15);
    assert_eq!(im.track_shape().rpm, 360);
    im.setup_track(2, None).unwrap();
    assert_eq!(im.track_shape().nr_sectors, 30);
    assert_eq!(im.track_shape().rpm, 180);
}

#[test]
fn zone_selector_with_head_suffix() {
    init();
    let text = "\
[img]
cyls=2
heads=2
secs=9
bps=512
tracks=1.1
secs=18
";
    let tokens = ConfigToken::tokenize(text);
    let im = RawImage::open(
        Cursor::new(vec![0u8; (2 * 9 + 9 + 18) * 512]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();

    // Only cylinder 1, head 1 uses the second zone.
    assert_eq!(im.arena().map(), &[0u8, 0, 0, 1][..]);
    assert_eq!(im.arena().trk(1).nr_sectors, 18);
}

#[test]
fn mode_gaps_and_layout_bits() {
    init();
    let text = "\
[img]
cyls=40
heads=1
secs=10
bps=256
mode=fm
id=0
interleave=2
gap3=21
gap4a=a
file-layout=sequential,reverse-side1
step=2
";
    let tokens = ConfigToken::tokenize(text);
    let mut im = RawImage::open(
        Cursor::new(vec![0u8; 40 * 10 * 256]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();

    assert!(im
        .layout_flags()
        .contains(FileLayout::SEQUENTIAL | FileLayout::REVERSE_SIDE1));
    assert_eq!(im.physical_cyls(), 80);
    let trk = im.arena().trk(0).clone();
    assert!(trk.is_fm);
    assert_eq!(trk.interleave, 2);
    assert_eq!(trk.gap_3, Some(21));
    assert_eq!(trk.gap_4a, None);
    assert_eq!(im.arena().sectors_of(0)[0].r, 0);

    // Double-stepped: physical tracks 0 and 2 land on image cylinders 0
    // and... the same data either way the drive half-steps.
    im.setup_track(0, None).unwrap();
    let off0 = im.track_file_offset();
    im.setup_track(2, None).unwrap();
    assert_eq!(im.track_file_offset(), off0);
    im.setup_track(4, None).unwrap();
    assert_eq!(im.track_file_offset(), off0 + 10 * 256);
}

#[test]
fn rate_and_rpm_override() {
    init();
    let text = "\
[img]
cyls=40
heads=1
secs=18
bps=128
mode=fm
rate=130
rpm=288
";
    let tokens = ConfigToken::tokenize(text);
    let mut im = RawImage::open(
        Cursor::new(vec![0u8; 40 * 18 * 128]),
        Some("img"),
        HostHint::Unspecified,
        Some(&tokens),
    )
    .unwrap();
    im.setup_track(0, None).unwrap();
    assert_eq!(im.track_shape().data_rate, 130);
    assert_eq!(im.track_shape().rpm, 288);
    assert!(im.track_shape().is_fm);
}
