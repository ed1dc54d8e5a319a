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

    tests/common/mod.rs

    Common support routines for tests.
*/
#![allow(dead_code)]

use rawtrack::{codec, codec::crc_ibm_3740, io::ReadWriteSeek, RawImage};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic filler so failures reproduce; a simple xorshift32.
pub fn pseudo_random_bytes(len: usize, mut seed: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(len);
    while buf.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        buf.extend_from_slice(&seed.to_le_bytes());
    }
    buf.truncate(len);
    buf
}

/// Pump the encoder for exactly one revolution of the current track.
pub fn encode_revolution<F: ReadWriteSeek>(im: &mut RawImage<F>) -> Vec<u16> {
    let total = (im.tracklen_bc() / 16) as usize;
    let mut words = Vec::with_capacity(total);
    let mut buf = [0u16; 256];
    while words.len() < total {
        im.read_track().unwrap();
        loop {
            let need = (total - words.len()).min(buf.len());
            if need == 0 {
                break;
            }
            let n = im.read_bitcells(&mut buf[..need]);
            if n == 0 {
                break;
            }
            words.extend_from_slice(&buf[..n]);
        }
    }
    words
}

/// Replay a sampled revolution through the write path.
pub fn write_revolution<F: ReadWriteSeek>(im: &mut RawImage<F>, words: &[u16]) {
    im.write_begin(0);
    let mut fed = 0;
    while fed < words.len() {
        fed += im.write_bitcells(&words[fed..]);
        im.write_track().unwrap();
    }
    im.write_end();
    while !im.write_track().unwrap() {}
}

#[derive(Debug)]
pub struct ScannedSector {
    pub c: u8,
    pub h: u8,
    pub r: u8,
    pub n: u8,
    pub idam_ok: bool,
    pub data: Vec<u8>,
    pub data_ok: bool,
}

/// A simple out-of-band MFM track scanner, used to validate the emitted
/// stream independently of the write path.
pub fn scan_mfm(words: &[u16]) -> Vec<ScannedSector> {
    let mut out: Vec<ScannedSector> = Vec::new();
    let mut i = 0;
    while i < words.len() {
        if words[i] != 0x4489 {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < words.len() && words[j] == 0x4489 {
            j += 1;
        }
        if j >= words.len() {
            break;
        }
        let am = codec::cells_to_bin(words[j]);
        match am {
            0xFE if j + 7 <= words.len() => {
                let mut hdr = [0xA1, 0xA1, 0xA1, 0xFE, 0, 0, 0, 0, 0, 0];
                for (k, b) in hdr[4..].iter_mut().enumerate() {
                    *b = codec::cells_to_bin(words[j + 1 + k]);
                }
                out.push(ScannedSector {
                    c: hdr[4],
                    h: hdr[5],
                    r: hdr[6],
                    n: hdr[7],
                    idam_ok: crc_ibm_3740(&hdr, None) == 0,
                    data: Vec::new(),
                    data_ok: false,
                });
                i = j + 7;
            }
            0xFB => {
                let Some(sector) = out.last_mut() else {
                    i = j + 1;
                    continue;
                };
                let sec_sz = 128usize << sector.n;
                if j + 1 + sec_sz + 2 > words.len() {
                    break;
                }
                let mut crc = codec::MFM_DAM_CRC;
                let mut data = Vec::with_capacity(sec_sz);
                for k in 0..sec_sz + 2 {
                    let b = codec::cells_to_bin(words[j + 1 + k]);
                    crc = crc_ibm_3740(&[b], Some(crc));
                    if k < sec_sz {
                        data.push(b);
                    }
                }
                sector.data = data;
                sector.data_ok = crc == 0;
                i = j + 1 + sec_sz + 2;
            }
            _ => i = j + 1,
        }
    }
    out
}

/// FM counterpart: address marks are bytes whose clock pattern is 0xC7.
pub fn scan_fm(words: &[u16]) -> Vec<ScannedSector> {
    let is_mark = |w: u16, mark: u8| -> bool {
        codec::cells_to_bin(w >> 1) == 0xC7 && codec::cells_to_bin(w) == mark
    };
    let mut out: Vec<ScannedSector> = Vec::new();
    let mut i = 0;
    while i + 1 < words.len() {
        if words[i] != 0xAAAA {
            i += 1;
            continue;
        }
        let w = words[i + 1];
        if is_mark(w, 0xFE) {
            if i + 2 + 6 > words.len() {
                break;
            }
            let mut hdr = [0xFE, 0, 0, 0, 0, 0, 0];
            for (k, b) in hdr[1..].iter_mut().enumerate() {
                *b = codec::cells_to_bin(words[i + 2 + k]);
            }
            out.push(ScannedSector {
                c: hdr[1],
                h: hdr[2],
                r: hdr[3],
                n: hdr[4],
                idam_ok: crc_ibm_3740(&hdr, None) == 0,
                data: Vec::new(),
                data_ok: false,
            });
            i += 2 + 6;
        } else if is_mark(w, 0xFB) {
            let Some(sector) = out.last_mut() else {
                i += 2;
                continue;
            };
            let sec_sz = 128usize << sector.n;
            if i + 2 + sec_sz + 2 > words.len() {
                break;
            }
            let mut crc = codec::FM_DAM_CRC;
            let mut data = Vec::with_capacity(sec_sz);
            for k in 0..sec_sz + 2 {
                let b = codec::cells_to_bin(words[i + 2 + k]);
                crc = crc_ibm_3740(&[b], Some(crc));
                if k < sec_sz {
                    data.push(b);
                }
            }
            sector.data = data;
            sector.data_ok = crc == 0;
            i += 2 + sec_sz + 2;
        } else {
            i += 1;
        }
    }
    out
}
