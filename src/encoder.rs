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

    src/encoder.rs

    The read path: track shape computation (gap sizing, data-rate inference,
    track length quantization) and the streaming MFM/FM emitters that fill
    the read bitcell ring.

    Emission is a cooperative state machine driven by `decode_pos`:
    0 is the post-index gap, `1 + 4k + f` addresses field `f` of the k-th
    sector in rotational order (IDAM, DAM preamble, data, post-data) and
    `4 * nr_sectors + 1` is the pre-index gap. Each call emits at most one
    field (or one 1 KiB slice of a large field) and returns `false` without
    side effects when the ring cannot hold it.
*/

use crate::{
    bitcell::BitcellRing,
    codec,
    image::{invert_buf, ticks_per_rev, RawImage, TrackShape},
    io::{Read, ReadWriteSeek, Seek, SeekFrom},
    util::crc_ibm_3740,
    ImageError, SYSCLK_MHZ,
};

const MFM_GAP_1: u16 = 50; // Post-IAM
const MFM_GAP_2: u16 = 22; // Post-IDAM
const MFM_GAP_4A: u16 = 80; // Post-index
const MFM_GAP_SYNC: u16 = 12;

const FM_GAP_1: u16 = 26;
const FM_GAP_2: u16 = 11;
const FM_GAP_SYNC: u16 = 6;

pub(crate) fn prep_track<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    if im.cur_trk.is_fm {
        fm_prep_track(im);
    } else {
        mfm_prep_track(im);
    }
    dump_track_info(im);
    Ok(())
}

fn mfm_prep_track<F: ReadWriteSeek>(im: &mut RawImage<F>) {
    const GAP_3: [u16; 8] = [32, 54, 84, 116, 255, 255, 255, 255];

    let trk = &im.cur_trk;
    let rpm = if trk.rpm == 0 { 300 } else { trk.rpm };
    let nr_sectors = trk.nr_sectors as u32;
    let post_crc_syncs = im.post_crc_syncs as u32;

    let auto_gap_2 = trk.gap_2.is_none();
    let mut gap_2 = trk.gap_2.map(u16::from).unwrap_or(MFM_GAP_2);
    let auto_gap_3 = trk.gap_3.is_none();
    let mut gap_3 = trk.gap_3.map(u16::from).unwrap_or(0);
    let gap_4a = trk.gap_4a.map(u16::from).unwrap_or(MFM_GAP_4A);

    let mut shape = TrackShape {
        is_fm: false,
        nr_sectors: trk.nr_sectors,
        has_iam: trk.has_iam,
        invert_data: trk.invert_data,
        head: trk.head,
        gap_2,
        gap_3,
        gap_4a,
        rpm,
        ..TrackShape::default()
    };

    shape.idx_sz = gap_4a as u32;
    if trk.has_iam {
        shape.idx_sz += (MFM_GAP_SYNC + 4 + MFM_GAP_1) as u32;
    }
    shape.idam_sz = (MFM_GAP_SYNC + 8 + 2) as u32 + gap_2 as u32 + post_crc_syncs;
    shape.dam_sz_pre = (MFM_GAP_SYNC + 4) as u32;
    shape.dam_sz_post = 2 + gap_3 as u32 + post_crc_syncs;

    // Minimum track length, with no pre-index gap, in bitcells.
    let mut tracklen: u32 = shape.idx_sz;
    for sec in &im.cur_secs {
        tracklen += shape.enc_sec_sz(sec);
    }
    tracklen *= 16;

    let mut data_rate = trk.data_rate;
    if data_rate == 0 {
        // Infer the data rate: smallest of DD/HD/ED that fits the track.
        let mut i = 1;
        while i < 3 {
            let maxlen = (((50_000u32 * 300) / rpm as u32) << i) + 5_000;
            if tracklen < maxlen {
                break;
            }
            i += 1;
        }
        data_rate = 125u16 << i; // DD=250, HD=500, ED=1000
    }

    if auto_gap_2 && data_rate >= 1000 {
        // At the ED rate the default GAP2 grows to 41 bytes.
        let old_gap_2 = gap_2;
        gap_2 = 41;
        shape.gap_2 = gap_2;
        shape.idam_sz += (gap_2 - old_gap_2) as u32;
        tracklen += 16 * nr_sectors * (gap_2 - old_gap_2) as u32;
    }

    // Standard track length for this data rate and spindle speed.
    let mut tracklen_bc = (data_rate as u32 * 400 * 300) / rpm as u32;

    if nr_sectors != 0 && auto_gap_3 {
        let space = tracklen_bc.saturating_sub(tracklen);
        let no = im.cur_secs[0].n as usize;
        gap_3 = (space / (16 * nr_sectors)).min(GAP_3[no] as u32) as u16;
        shape.gap_3 = gap_3;
        shape.dam_sz_post += gap_3 as u32;
        tracklen += 16 * nr_sectors * gap_3 as u32;
    }

    // Round up to fit the data and to a multiple of 32 bitcells.
    tracklen_bc = tracklen_bc.max(tracklen);
    tracklen_bc = (tracklen_bc + 31) & !31;

    shape.data_rate = data_rate;
    shape.gap_4 = (tracklen_bc - tracklen) / 16;

    im.tracklen_bc = tracklen_bc;
    im.ticks_per_cell = ((ticks_per_rev(rpm) as u64 * 16) / tracklen_bc as u64) as u32;
    im.write_bc_ticks = SYSCLK_MHZ * 500 / data_rate as u32;
    im.shape = shape;
}

fn fm_prep_track<F: ReadWriteSeek>(im: &mut RawImage<F>) {
    const GAP_3: [u16; 8] = [27, 42, 58, 138, 255, 255, 255, 255];

    let trk = &im.cur_trk;
    let rpm = if trk.rpm == 0 { 300 } else { trk.rpm };
    let nr_sectors = trk.nr_sectors as u32;

    let gap_2 = trk.gap_2.map(u16::from).unwrap_or(FM_GAP_2);
    let auto_gap_3 = trk.gap_3.is_none();
    let mut gap_3 = trk.gap_3.map(u16::from).unwrap_or(0);
    // The default post-index gap depends on whether the track format
    // includes an IAM (see the uPD765A/7265 datasheet).
    let gap_4a = trk
        .gap_4a
        .map(u16::from)
        .unwrap_or(if trk.has_iam { 40 } else { 16 });

    let mut shape = TrackShape {
        is_fm: true,
        nr_sectors: trk.nr_sectors,
        has_iam: trk.has_iam,
        invert_data: trk.invert_data,
        head: trk.head,
        gap_2,
        gap_3,
        gap_4a,
        rpm,
        ..TrackShape::default()
    };

    shape.idx_sz = gap_4a as u32;
    if trk.has_iam {
        shape.idx_sz += (FM_GAP_SYNC + 1 + FM_GAP_1) as u32;
    }
    shape.idam_sz = (FM_GAP_SYNC + 5 + 2) as u32 + gap_2 as u32;
    shape.dam_sz_pre = (FM_GAP_SYNC + 1) as u32;
    shape.dam_sz_post = 2 + gap_3 as u32;

    let mut tracklen: u32 = shape.idx_sz;
    for sec in &im.cur_secs {
        tracklen += shape.enc_sec_sz(sec);
    }
    tracklen *= 16;

    let mut data_rate = trk.data_rate;
    if data_rate == 0 {
        // Micro-diskette = 125kbps, 8-inch disk = 250kbps.
        let mut i = 0;
        while i < 1 {
            let maxlen = (((50_000u32 * 300) / rpm as u32) << i) + 5_000;
            if tracklen < maxlen {
                break;
            }
            i += 1;
        }
        data_rate = 125u16 << i;
    }

    let mut tracklen_bc = (data_rate as u32 * 400 * 300) / rpm as u32;

    if nr_sectors != 0 && auto_gap_3 {
        let space = tracklen_bc.saturating_sub(tracklen);
        let no = im.cur_secs[0].n as usize;
        gap_3 = (space / (16 * nr_sectors)).min(GAP_3[no] as u32) as u16;
        shape.gap_3 = gap_3;
        shape.dam_sz_post += gap_3 as u32;
        tracklen += 16 * nr_sectors * gap_3 as u32;
    }

    tracklen_bc = tracklen_bc.max(tracklen);
    tracklen_bc = (tracklen_bc + 31) & !31;

    shape.data_rate = data_rate;
    shape.gap_4 = (tracklen_bc - tracklen) / 16;

    im.tracklen_bc = tracklen_bc;
    im.ticks_per_cell = ((ticks_per_rev(rpm) as u64 * 16) / tracklen_bc as u64) as u32;
    im.write_bc_ticks = SYSCLK_MHZ * 500 / data_rate as u32;
    im.shape = shape;
}

fn dump_track_info<F: ReadWriteSeek>(im: &RawImage<F>) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let track = im.current_track_nr();
    let s = &im.shape;
    log::debug!(
        "C{} S{}:: {} {}-{}-{} step={}",
        track / 2,
        track & 1,
        if s.is_fm { "FM" } else { "MFM" },
        im.geom.nr_cyls,
        im.geom.nr_sides,
        s.nr_sectors,
        im.step
    );
    log::debug!(
        " rpm: {}, tracklen: {}, datarate: {}",
        s.rpm,
        im.tracklen_bc,
        s.data_rate
    );
    log::debug!(
        " gap2: {}, gap3: {}, gap4a: {}, gap4: {}",
        s.gap_2,
        s.gap_3,
        s.gap_4a,
        s.gap_4
    );
    log::debug!(
        " ticks_per_cell: {}, write_bc_ticks: {}, has_iam: {}",
        im.ticks_per_cell,
        im.write_bc_ticks,
        s.has_iam
    );
    log::debug!(
        " interleave: {}, cskew: {}, hskew: {}, file-layout: {:x}",
        im.cur_trk.interleave,
        im.cur_trk.cskew,
        im.cur_trk.hskew,
        im.layout.bits()
    );
    for i in 0..s.nr_sectors as usize {
        let sec = &im.cur_secs[im.sec_map[i] as usize];
        let hd = s.head.unwrap_or((track & 1) as u8);
        log::debug!(" {{{},{},{},{}}}", track / 2, hd, sec.r, sec.n);
    }
}

/// Read the next 1 KiB of sector data from the file into the staging
/// buffer, following rotational order.
fn fetch_data<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<(), ImageError> {
    if im.shape.nr_sectors == 0 || im.read_data.prod != im.read_data.cons {
        return Ok(());
    }

    let sec_i = im.sec_map[im.trk_sec as usize] as usize;
    let sec = im.cur_secs[sec_i];

    let mut off: u32 = match &im.file_sec_offsets {
        Some(offsets) => offsets[sec_i],
        None => im.cur_secs[..sec_i].iter().map(|s| s.size()).sum(),
    };
    let mut len = sec.size();

    off += im.rd_sec_pos * 1024;
    len -= im.rd_sec_pos * 1024;

    if len > 1024 {
        len = 1024;
        im.rd_sec_pos += 1;
    } else {
        im.rd_sec_pos = 0;
        im.trk_sec += 1;
        if im.trk_sec >= im.shape.nr_sectors {
            im.trk_sec = 0;
        }
    }

    im.file
        .seek(SeekFrom::Start(im.trk_off as u64 + off as u64))?;
    im.file.read_exact(&mut im.read_data.buf[..len as usize])?;
    if im.shape.invert_data {
        invert_buf(&mut im.read_data.buf[..len as usize]);
    }
    im.read_data.prod = im.read_data.prod.wrapping_add(1);

    Ok(())
}

/// MFM emitter. The table encodes each byte's leading clock as if the
/// previous data bit were 0; when it was 1 the leading clock of the next
/// word must be suppressed to keep the no-adjacent-ones rule. Raw sync
/// words carry a 0 in the top cell, so masking them is a no-op.
struct MfmEmitter<'a> {
    bc: &'a mut BitcellRing,
    pr: u16,
}

impl<'a> MfmEmitter<'a> {
    fn new(bc: &'a mut BitcellRing) -> MfmEmitter<'a> {
        let pr = bc.last_word();
        MfmEmitter { bc, pr }
    }

    #[inline]
    fn raw(&mut self, w: u16) {
        self.bc.push_word(w & !((self.pr & 1) << 15));
        self.pr = w;
    }

    #[inline]
    fn byte(&mut self, b: u8) {
        self.raw(codec::mfm_encode(b));
    }
}

struct FmEmitter<'a> {
    bc: &'a mut BitcellRing,
}

impl<'a> FmEmitter<'a> {
    #[inline]
    fn raw(&mut self, w: u16) {
        self.bc.push_word(w);
    }

    #[inline]
    fn byte(&mut self, b: u8) {
        self.raw(codec::fm_encode(b));
    }
}

pub(crate) fn read_track<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<bool, ImageError> {
    if im.shape.is_fm {
        fm_read_track(im)
    } else {
        mfm_read_track(im)
    }
}

fn mfm_read_track<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<bool, ImageError> {
    fetch_data(im)?;

    let shape = im.shape;
    let nr_sectors = shape.nr_sectors as i32;
    let bc_space = im.read_bc.space_words() as u32;

    if im.decode_pos == 0 {
        // Post-index track gap
        if bc_space < shape.idx_sz {
            return Ok(false);
        }
        let mut em = MfmEmitter::new(&mut im.read_bc);
        for _ in 0..shape.gap_4a {
            em.byte(0x4E);
        }
        if shape.has_iam {
            for _ in 0..MFM_GAP_SYNC {
                em.byte(0x00);
            }
            for _ in 0..3 {
                em.raw(codec::MFM_IAM_SYNC);
            }
            em.byte(0xFC);
            for _ in 0..MFM_GAP_1 {
                em.byte(0x4E);
            }
        }
    } else if im.decode_pos == nr_sectors * 4 + 1 {
        // Pre-index track gap
        let mut sz = shape.gap_4 - im.decode_data_pos * 1024;
        if bc_space < sz.min(1024) {
            return Ok(false);
        }
        if sz > 1024 {
            sz = 1024;
            im.decode_data_pos += 1;
            im.decode_pos -= 1;
        } else {
            im.decode_data_pos = 0;
            im.decode_pos = if shape.idx_sz != 0 { -1 } else { 0 };
        }
        let mut em = MfmEmitter::new(&mut im.read_bc);
        for _ in 0..sz {
            em.byte(0x4E);
        }
    } else {
        let sec = im.cur_secs[im.sec_map[((im.decode_pos - 1) >> 2) as usize] as usize];
        match (im.decode_pos - 1) & 3 {
            0 => {
                // IDAM
                let track = im.current_track_nr();
                let c = (track / 2) as u8;
                let h = shape.head.unwrap_or((track & 1) as u8);
                let idam = [0xA1, 0xA1, 0xA1, 0xFE, c, h, sec.r, sec.n];
                if bc_space < shape.idam_sz {
                    return Ok(false);
                }
                let mut em = MfmEmitter::new(&mut im.read_bc);
                for _ in 0..MFM_GAP_SYNC {
                    em.byte(0x00);
                }
                for _ in 0..3 {
                    em.raw(codec::MFM_SYNC);
                }
                for b in &idam[3..] {
                    em.byte(*b);
                }
                let crc = crc_ibm_3740(&idam, None);
                em.byte((crc >> 8) as u8);
                em.byte(crc as u8);
                for _ in 0..im.post_crc_syncs {
                    em.raw(codec::MFM_SYNC);
                }
                for _ in 0..shape.gap_2 {
                    em.byte(0x4E);
                }
            }
            1 => {
                // DAM preamble
                if bc_space < shape.dam_sz_pre {
                    return Ok(false);
                }
                let mut em = MfmEmitter::new(&mut im.read_bc);
                for _ in 0..MFM_GAP_SYNC {
                    em.byte(0x00);
                }
                for _ in 0..3 {
                    em.raw(codec::MFM_SYNC);
                }
                em.byte(0xFB);
                im.crc = codec::MFM_DAM_CRC;
            }
            2 => {
                // Data
                let mut sec_sz = sec.size() - im.decode_data_pos * 1024;
                if bc_space < sec_sz.min(1024) {
                    return Ok(false);
                }
                if sec_sz > 1024 {
                    sec_sz = 1024;
                    im.decode_data_pos += 1;
                    im.decode_pos -= 1;
                } else {
                    im.decode_data_pos = 0;
                }
                {
                    let data = &im.read_data.buf[..sec_sz as usize];
                    let mut em = MfmEmitter::new(&mut im.read_bc);
                    for b in data {
                        em.byte(*b);
                    }
                    im.crc = crc_ibm_3740(data, Some(im.crc));
                }
                im.read_data.cons = im.read_data.cons.wrapping_add(1);
            }
            _ => {
                // Post data
                if bc_space < shape.dam_sz_post {
                    return Ok(false);
                }
                let crc = im.crc;
                let mut em = MfmEmitter::new(&mut im.read_bc);
                em.byte((crc >> 8) as u8);
                em.byte(crc as u8);
                for _ in 0..im.post_crc_syncs {
                    em.raw(codec::MFM_SYNC);
                }
                for _ in 0..shape.gap_3 {
                    em.byte(0x4E);
                }
            }
        }
    }

    im.decode_pos += 1;
    Ok(true)
}

fn fm_read_track<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<bool, ImageError> {
    fetch_data(im)?;

    let shape = im.shape;
    let nr_sectors = shape.nr_sectors as i32;
    let bc_space = im.read_bc.space_words() as u32;

    if im.decode_pos == 0 {
        // Post-index track gap
        if bc_space < shape.idx_sz {
            return Ok(false);
        }
        let mut em = FmEmitter { bc: &mut im.read_bc };
        for _ in 0..shape.gap_4a {
            em.byte(0xFF);
        }
        if shape.has_iam {
            for _ in 0..FM_GAP_SYNC {
                em.byte(0x00);
            }
            em.raw(codec::fm_sync(0xFC, codec::FM_IAM_CLK));
            for _ in 0..FM_GAP_1 {
                em.byte(0xFF);
            }
        }
    } else if im.decode_pos == nr_sectors * 4 + 1 {
        // Pre-index track gap
        let mut sz = shape.gap_4 - im.decode_data_pos * 1024;
        if bc_space < sz.min(1024) {
            return Ok(false);
        }
        if sz > 1024 {
            sz = 1024;
            im.decode_data_pos += 1;
            im.decode_pos -= 1;
        } else {
            im.decode_data_pos = 0;
            im.decode_pos = if shape.idx_sz != 0 { -1 } else { 0 };
        }
        let mut em = FmEmitter { bc: &mut im.read_bc };
        for _ in 0..sz {
            em.byte(0xFF);
        }
    } else {
        let sec = im.cur_secs[im.sec_map[((im.decode_pos - 1) >> 2) as usize] as usize];
        match (im.decode_pos - 1) & 3 {
            0 => {
                // IDAM
                let track = im.current_track_nr();
                let c = (track / 2) as u8;
                let h = shape.head.unwrap_or((track & 1) as u8);
                let idam = [0xFE, c, h, sec.r, sec.n];
                if bc_space < shape.idam_sz {
                    return Ok(false);
                }
                let mut em = FmEmitter { bc: &mut im.read_bc };
                for _ in 0..FM_GAP_SYNC {
                    em.byte(0x00);
                }
                em.raw(codec::fm_sync(idam[0], codec::FM_SYNC_CLK));
                for b in &idam[1..] {
                    em.byte(*b);
                }
                let crc = crc_ibm_3740(&idam, None);
                em.byte((crc >> 8) as u8);
                em.byte(crc as u8);
                for _ in 0..shape.gap_2 {
                    em.byte(0xFF);
                }
            }
            1 => {
                // DAM
                if bc_space < shape.dam_sz_pre {
                    return Ok(false);
                }
                let mut em = FmEmitter { bc: &mut im.read_bc };
                for _ in 0..FM_GAP_SYNC {
                    em.byte(0x00);
                }
                em.raw(codec::fm_sync(0xFB, codec::FM_SYNC_CLK));
                im.crc = codec::FM_DAM_CRC;
            }
            2 => {
                // Data
                let mut sec_sz = sec.size() - im.decode_data_pos * 1024;
                if bc_space < sec_sz.min(1024) {
                    return Ok(false);
                }
                if sec_sz > 1024 {
                    sec_sz = 1024;
                    im.decode_data_pos += 1;
                    im.decode_pos -= 1;
                } else {
                    im.decode_data_pos = 0;
                }
                {
                    let data = &im.read_data.buf[..sec_sz as usize];
                    let mut em = FmEmitter { bc: &mut im.read_bc };
                    for b in data {
                        em.byte(*b);
                    }
                    im.crc = crc_ibm_3740(data, Some(im.crc));
                }
                im.read_data.cons = im.read_data.cons.wrapping_add(1);
            }
            _ => {
                // Post data
                if bc_space < shape.dam_sz_post {
                    return Ok(false);
                }
                let crc = im.crc;
                let mut em = FmEmitter { bc: &mut im.read_bc };
                em.byte((crc >> 8) as u8);
                em.byte(crc as u8);
                for _ in 0..shape.gap_3 {
                    em.byte(0xFF);
                }
            }
        }
    }

    im.decode_pos += 1;
    Ok(true)
}
