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

    src/codec.rs

    MFM and FM byte/bitcell conversions.

    Each data byte occupies one 16-bit bitcell word: data bits in the even
    cell positions (bit 14 down to bit 0), clock bits in the odd positions.
    MFM clocks a cell only between two zero data bits; FM clocks every cell.
    Address marks violate those clock rules, which is what makes them
    recognizable in the stream.
*/

pub use crate::util::crc_ibm_3740;

/// MFM IDAM/DAM sync word: 0xA1 with a missing clock between bits 4 and 5.
pub const MFM_SYNC: u16 = 0x4489;
/// MFM IAM sync word: 0xC2 with a missing clock between bits 3 and 4.
pub const MFM_IAM_SYNC: u16 = 0x5224;

/// FM address-mark clock patterns (normal data bytes clock as 0xFF).
pub const FM_SYNC_CLK: u8 = 0xC7;
pub const FM_IAM_CLK: u8 = 0xD7;

/// Running-CRC seed for sector data: the CRC of the DAM prefix bytes, so a
/// data CRC can be continued across 1 KiB sub-chunks.
pub const MFM_DAM_CRC: u16 = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFB], None);
pub const FM_DAM_CRC: u16 = crc_ibm_3740(&[0xFB], None);

/// Spread the bits of a byte into the even (data) cell positions of a word.
const fn spread(b: u8) -> u16 {
    let mut w: u16 = 0;
    let mut i = 0;
    while i < 8 {
        w |= (((b >> (7 - i)) & 1) as u16) << (14 - 2 * i);
        i += 1;
    }
    w
}

const fn mfm_word(b: u8) -> u16 {
    // Clock between adjacent zero data bits. The leading clock assumes the
    // preceding data bit was 0; the emitter masks it off otherwise.
    let mut w: u16 = 0;
    let mut prev = 0u8;
    let mut i = 0;
    while i < 8 {
        let d = (b >> (7 - i)) & 1;
        let c = if prev == 0 && d == 0 { 1u16 } else { 0 };
        w = (w << 2) | (c << 1) | d as u16;
        prev = d;
        i += 1;
    }
    w
}

const fn build_mfm_table() -> [u16; 256] {
    let mut tab = [0u16; 256];
    let mut b = 0;
    while b < 256 {
        tab[b] = mfm_word(b as u8);
        b += 1;
    }
    tab
}

static MFM_TAB: [u16; 256] = build_mfm_table();

/// MFM-encode a data byte. The leading clock bit is computed as if the
/// previous data bit were 0; see [`crate::encoder`] for the boundary fixup.
#[inline]
pub fn mfm_encode(b: u8) -> u16 {
    MFM_TAB[b as usize]
}

/// FM-encode a data byte with the standard 0xFF clock.
#[inline]
pub fn fm_encode(b: u8) -> u16 {
    spread(b) | 0xAAAA
}

/// FM-encode a byte against an explicit clock pattern, as used for the
/// IAM/IDAM/DAM marks.
#[inline]
pub const fn fm_sync(data: u8, clock: u8) -> u16 {
    spread(data) | (spread(clock) << 1)
}

/// Recover the data byte from a bitcell word, ignoring the clock bits.
#[inline]
pub fn cells_to_bin(w: u16) -> u8 {
    let mut b: u8 = 0;
    let mut i = 0;
    while i < 8 {
        b = (b << 1) | (((w >> (14 - 2 * i)) & 1) as u8);
        i += 1;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfm_encoding_of_a1_differs_from_sync_by_one_clock() {
        // 0x4489 is 0xA1 with the clock between bits 4 and 5 suppressed.
        assert_eq!(mfm_encode(0xA1), 0x44A9);
        assert_eq!(mfm_encode(0xA1) & !0x0020, MFM_SYNC);
    }

    #[test]
    fn mfm_no_adjacent_ones_within_byte() {
        for b in 0..=255u8 {
            let w = mfm_encode(b);
            assert_eq!(w & (w >> 1) & 0x3FFF, 0, "byte {b:02x} -> {w:04x}");
        }
    }

    #[test]
    fn fm_marks() {
        // All-clocks FM byte: gap filler 0xFF decodes back to 0xFF.
        assert_eq!(cells_to_bin(fm_encode(0xFF)), 0xFF);
        // IDAM mark: data 0xFE, clock 0xC7.
        let idam = fm_sync(0xFE, FM_SYNC_CLK);
        assert_eq!(cells_to_bin(idam), 0xFE);
        assert_eq!(cells_to_bin(idam >> 1), FM_SYNC_CLK);
    }

    #[test]
    fn roundtrip_all_bytes() {
        for b in 0..=255u8 {
            assert_eq!(cells_to_bin(mfm_encode(b)), b);
            assert_eq!(cells_to_bin(fm_encode(b)), b);
        }
    }

    #[test]
    fn dam_crc_seeds() {
        use crate::util::crc_ibm_3740;
        let data = [0u8; 16];
        let seeded = crc_ibm_3740(&data, Some(MFM_DAM_CRC));
        let full = crc_ibm_3740(&[&[0xA1, 0xA1, 0xA1, 0xFB][..], &data[..]].concat(), None);
        assert_eq!(seeded, full);
    }
}
