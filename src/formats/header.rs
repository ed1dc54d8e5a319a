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

    src/formats/header.rs

    Container formats carrying a fixed geometry header ahead of the sector
    data: NEC PC-98 FDI, SAB Diskette Utility, Tandy CoCo JVC and
    Dragon VDK.
*/

use binrw::BinRead;

use crate::{
    image::{Geometry, RawImage},
    io::{Read, ReadWriteSeek, Seek, SeekFrom},
    track::SimpleLayout,
    ImageError,
};

#[derive(Debug, BinRead)]
#[br(little)]
struct FdiHeader {
    zero: u32,
    density: u32,
    header_size: u32,
    #[allow(dead_code)]
    image_body_size: u32,
    sector_size_bytes: u32,
    nr_secs: u32,
    nr_sides: u32,
    cyls: u32,
}

pub(crate) fn pc98fdi_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.file.seek(SeekFrom::Start(0))?;
    let header = FdiHeader::read_le(&mut im.file).map_err(|_| ImageError::UnknownFormat)?;
    if header.zero != 0 || !(1..=2).contains(&header.nr_sides) || header.cyls == 0 {
        return Err(ImageError::UnknownFormat);
    }

    let mut layout = SimpleLayout::default();
    if header.density == 0x30 {
        layout.rpm = 300;
        layout.gap_3 = Some(84);
    } else {
        layout.rpm = 360;
        layout.gap_3 = Some(116);
    }
    layout.no = if header.sector_size_bytes == 512 { 2 } else { 3 };
    layout.nr_sectors = header.nr_secs as u16;

    let nr_cyls = header.cyls as u16;
    let nr_sides = header.nr_sides as u8;
    im.geom = Geometry { nr_cyls, nr_sides };
    // Skip the (usually 4096-byte) container header.
    im.base_off = header.header_size;

    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}

#[derive(Debug, BinRead)]
#[br(little)]
struct SduChs {
    c: u16,
    h: u16,
    s: u16,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct SduHeader {
    #[allow(dead_code)]
    app: [u8; 21],
    #[allow(dead_code)]
    ver: [u8; 5],
    #[allow(dead_code)]
    flags: u16,
    #[allow(dead_code)]
    type_: u16,
    max: SduChs,
    #[allow(dead_code)]
    used: SduChs,
    #[allow(dead_code)]
    sec_size: u16,
    #[allow(dead_code)]
    trk_size: u16,
}

pub(crate) fn sdu_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.file.seek(SeekFrom::Start(0))?;
    let header = SduHeader::read_le(&mut im.file).map_err(|_| ImageError::UnknownFormat)?;

    let nr_cyls = header.max.c;
    let nr_sides = header.max.h;
    let nr_sectors = header.max.s;

    // Accept the 180k/360k/720k/1.44M/2.88M PC geometries only.
    if !matches!(nr_cyls, 40 | 80)
        || !matches!(nr_sides, 1 | 2)
        || !matches!(nr_sectors, 9 | 18 | 36)
    {
        return Err(ImageError::UnknownFormat);
    }

    let layout = SimpleLayout {
        nr_sectors,
        no: 2,
        gap_3: Some(84),
        ..SimpleLayout::default()
    };

    im.geom = Geometry {
        nr_cyls,
        nr_sides: nr_sides as u8,
    };
    // Skip the 46-byte SABDU header.
    im.base_off = 46;

    im.arena.build_simple(nr_cyls, nr_sides as u8, &layout)?;
    im.raw_open()
}

pub(crate) fn jvc_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    // The JVC header is optional and variable-length: whatever the file
    // size is modulo 256. Missing fields take their defaults.
    let mut jvc: [u8; 5] = [18, 1, 1, 1, 0]; // spt, sides, size code, id, attr
    im.base_off = (im.file_len & 255) as u32;

    im.file.seek(SeekFrom::Start(0))?;
    let hdr_len = (im.base_off as usize).min(jvc.len());
    im.file.read_exact(&mut jvc[..hdr_len])?;
    let (spt, sides, ssize_code, sec_id, attr) = (jvc[0], jvc[1], jvc[2], jvc[3], jvc[4]);

    if attr != 0 || !(1..=2).contains(&sides) || spt == 0 {
        return Err(ImageError::UnknownFormat);
    }

    let layout = SimpleLayout {
        nr_sectors: spt as u16,
        no: ssize_code & 3,
        base: [sec_id, sec_id],
        interleave: 3, // RS-DOS likes a 3:1 interleave
        gap_3: Some(20),
        gap_4a: Some(54),
        ..SimpleLayout::default()
    };

    let mut nr_sides = sides;
    let bps = 128u64 << layout.no;
    let mut bpc = bps * layout.nr_sectors as u64 * nr_sides as u64;
    let mut nr_cyls = (im.im_size() / bpc) as u16;
    if nr_cyls >= 88 && nr_sides == 1 {
        // Unlikely cylinder count: assume a headerless double-sided dump.
        nr_sides += 1;
        nr_cyls /= 2;
        bpc *= 2;
    }
    if im.im_size() % bpc >= bps {
        nr_cyls += 1;
    }

    im.geom = Geometry { nr_cyls, nr_sides };
    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}

#[derive(Debug, BinRead)]
#[br(little)]
struct VdkHeader {
    id: [u8; 2],
    hlen: u16,
    #[allow(dead_code)]
    misc: [u8; 4],
    cyls: u8,
    heads: u8,
    #[allow(dead_code)]
    flags: u8,
    #[allow(dead_code)]
    compression: u8,
}

pub(crate) fn vdk_open<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    im.file.seek(SeekFrom::Start(0))?;
    let header = VdkHeader::read_le(&mut im.file).map_err(|_| ImageError::UnknownFormat)?;
    if &header.id != b"dk" || header.hlen < 12 {
        return Err(ImageError::UnknownFormat);
    }

    let nr_cyls = header.cyls as u16;
    let nr_sides = header.heads;
    if !(1..=2).contains(&nr_sides) {
        return Err(ImageError::UnknownFormat);
    }

    let layout = SimpleLayout {
        nr_sectors: 18,
        no: 1,
        gap_3: Some(20),
        gap_4a: Some(54),
        interleave: 2, // DragonDOS likes a 2:1 interleave
        ..SimpleLayout::default()
    };

    im.geom = Geometry { nr_cyls, nr_sides };
    im.base_off = header.hlen as u32;

    im.arena.build_simple(nr_cyls, nr_sides, &layout)?;
    im.raw_open()
}
