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

    src/decoder.rs

    The write path: consume sampled bitcell words from the write ring,
    hunt for address-mark sync, decode IDAM/DAM fields and persist written
    sector data back into the image file.

    A DAM is only honored after a CRC-valid IDAM selected the target
    sector. A write that begins mid-track (the controller re-asserting
    write gate inside a sector) carries no IDAM; the sector is then located
    geometrically from the write-gate timestamp.
*/

use crate::{
    bitcell::BitcellRing,
    codec::{self, FM_DAM_CRC, MFM_DAM_CRC},
    image::{invert_buf, RawImage, WriteOp, WriteSector},
    io::{ReadWriteSeek, Seek, SeekFrom, Write},
    util::crc_ibm_3740,
    ImageError,
};

/// Decode `out.len()` data bytes from the ring starting at word `start`.
fn ring_to_bin(ring: &BitcellRing, start: u32, out: &mut [u8]) {
    for (i, b) in out.iter_mut().enumerate() {
        *b = codec::cells_to_bin(ring.word_at(start.wrapping_add(i as u32)));
    }
}

/// Locate the sector a mid-track write landed in, from the write-gate
/// timestamp: walk the rotational order subtracting encoded sector sizes
/// until the remainder sits within the expected start-of-data window.
fn find_first_write_sector<F: ReadWriteSeek>(im: &RawImage<F>, op: &WriteOp) -> Option<usize> {
    let mut base = (op.start_ticks / im.ticks_per_cell) as i32; // in data bytes
    base -= (im.track_delay_bc / 16) as i32;
    if base < 0 {
        base += (im.tracklen_bc / 16) as i32;
    }

    base -= (im.shape.idx_sz + im.shape.idam_sz) as i32;
    for i in 0..im.shape.nr_sectors as usize {
        if (-64..=64).contains(&base) {
            // Rotational order back to logical order.
            return Some(im.sec_map[i] as usize);
        }
        let sec = im.cur_secs[im.sec_map[i] as usize];
        base -= im.shape.enc_sec_sz(&sec) as i32;
    }

    log::warn!("write_track(): bad write offset: {}", base);
    None
}

pub(crate) fn write_track<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Result<bool, ImageError> {
    let op = match im.write_op {
        Some(op) => op,
        None => return Ok(false),
    };

    let flush = op.bc_end.is_some();
    let mut c = im.write_bc.cons / 16;
    let mut p = im.write_bc.prod / 16;
    if let Some(end) = op.bc_end {
        // Final data: process up to the end index, rounded up.
        p = (end + 15) / 16;
    }

    let is_fm = im.shape.is_fm;

    'hunt: while (p.wrapping_sub(c) as u16 as i16) > 128 {
        let sc = c;
        let am: u8;

        if is_fm {
            let w = im.write_bc.word_at(c);
            c = c.wrapping_add(1);
            if w != 0xAAAA {
                continue;
            }
            let sync = im.write_bc.word_at(c);
            if codec::cells_to_bin(sync >> 1) != codec::FM_SYNC_CLK {
                continue;
            }
            am = codec::cells_to_bin(sync);
            c = c.wrapping_add(1);
        } else {
            let w = im.write_bc.word_at(c);
            c = c.wrapping_add(1);
            if w != codec::MFM_SYNC {
                continue;
            }
            am = codec::cells_to_bin(im.write_bc.word_at(c));
            if am == 0xA1 {
                // Still inside the triple-sync prefix.
                continue;
            }
            c = c.wrapping_add(1);
        }

        match am {
            0xFE => {
                // IDAM
                let mut hdr = [0u8; 10];
                let len;
                let idam_r;
                if is_fm {
                    hdr[0] = am;
                    ring_to_bin(&im.write_bc, c, &mut hdr[1..7]);
                    c = c.wrapping_add(6);
                    len = 7;
                    idam_r = hdr[3];
                } else {
                    hdr[..3].fill(0xA1);
                    hdr[3] = am;
                    ring_to_bin(&im.write_bc, c, &mut hdr[4..10]);
                    c = c.wrapping_add(6);
                    len = 10;
                    idam_r = hdr[6];
                }
                let crc = crc_ibm_3740(&hdr[..len], None);
                if crc != 0 {
                    log::warn!("write_track(): IDAM bad CRC {:04x}, r={}", crc, idam_r);
                    continue;
                }
                // Resolve the sector id to its logical slot.
                match im.cur_secs.iter().position(|s| s.r == idam_r) {
                    Some(i) => im.write_sector = WriteSector::Sector(i),
                    None => {
                        log::warn!("write_track(): IDAM unknown sector id {:02x}", idam_r);
                        im.write_sector = WriteSector::Invalid;
                    }
                }
            }

            0xFB => {
                // DAM
                let sec_nr = match im.write_sector {
                    WriteSector::Sector(i) => Some(i),
                    WriteSector::NoIdamYet => find_first_write_sector(im, &op),
                    WriteSector::Invalid => None,
                };

                let sec_nr = match sec_nr {
                    Some(nr) => nr,
                    None => {
                        log::warn!("write_track(): DAM with no sector to match");
                        im.write_sector = WriteSector::Invalid;
                        continue;
                    }
                };

                let sec_sz = im.cur_secs[sec_nr].size();
                if ((p.wrapping_sub(c) as u16) as u32) < sec_sz + 2 {
                    // Wait for the whole sector plus CRC to arrive.
                    c = sc;
                    break 'hunt;
                }

                let mut crc = if is_fm { FM_DAM_CRC } else { MFM_DAM_CRC };

                log::debug!(
                    "write_track(): write {}[{:02x}]/{}",
                    sec_nr,
                    im.cur_secs[sec_nr].r,
                    im.shape.nr_sectors
                );

                let off: u32 = match &im.file_sec_offsets {
                    Some(offsets) => offsets[sec_nr],
                    None => im.cur_secs[..sec_nr].iter().map(|s| s.size()).sum(),
                };
                im.file
                    .seek(SeekFrom::Start(im.trk_off as u64 + off as u64))?;

                let mut slice = [0u8; 1024];
                let mut todo = sec_sz as usize;
                while todo != 0 {
                    let nr = todo.min(1024);
                    ring_to_bin(&im.write_bc, c, &mut slice[..nr]);
                    c = c.wrapping_add(nr as u32);
                    crc = crc_ibm_3740(&slice[..nr], Some(crc));
                    if im.shape.invert_data {
                        invert_buf(&mut slice[..nr]);
                    }
                    im.file.write_all(&slice[..nr])?;
                    todo -= nr;
                }

                let mut crc_buf = [0u8; 2];
                ring_to_bin(&im.write_bc, c, &mut crc_buf);
                c = c.wrapping_add(2);
                crc = crc_ibm_3740(&crc_buf, Some(crc));
                if crc != 0 {
                    // Keep the write: the controller already committed it.
                    log::warn!(
                        "write_track(): bad data CRC {:04x}, {}[{:02x}]",
                        crc,
                        sec_nr,
                        im.cur_secs[sec_nr].r
                    );
                }

                im.write_sector = WriteSector::Invalid;
            }

            _ => {}
        }
    }

    im.write_bc.cons = c.wrapping_mul(16);

    if flush {
        im.write_op = None;
    }
    Ok(flush)
}
