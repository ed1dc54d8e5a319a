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

    src/catalog.rs

    The geometry catalog: compile-time tables of known host formats, matched
    against a bare file size. A candidate matches when the file is exactly
    `nr_cyls * nr_secs * sector_size * nr_sides` bytes for some cylinder
    count in the candidate's class; the first match wins.
*/

use crate::{sec_sz, track::SimpleLayout};
use std::ops::RangeInclusive;

/// Cylinder-count class. 40-track media tolerate a few extra cylinders
/// (over-dumped images are common); likewise 80-track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CylClass {
    C40,
    C80,
}

impl CylClass {
    pub fn range(&self) -> RangeInclusive<u16> {
        match self {
            CylClass::C40 => 38..=42,
            CylClass::C80 => 77..=85,
        }
    }
}

/// One geometry candidate.
#[derive(Copy, Clone, Debug)]
pub struct RawType {
    pub nr_secs: u8,
    pub nr_sides: u8,
    pub has_iam: bool,
    pub gap3: u8,
    pub interleave: u8,
    /// Sector size code.
    pub no: u8,
    /// First sector id.
    pub base: u8,
    pub cskew: u8,
    pub hskew: u8,
    pub cyls: CylClass,
    pub rpm: u16,
}

impl RawType {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        nr_secs: u8,
        nr_sides: u8,
        has_iam: bool,
        gap3: u8,
        interleave: u8,
        no: u8,
        base: u8,
        cskew: u8,
        hskew: u8,
        cyls: CylClass,
        rpm: u16,
    ) -> RawType {
        RawType {
            nr_secs,
            nr_sides,
            has_iam,
            gap3,
            interleave,
            no,
            base,
            cskew,
            hskew,
            cyls,
            rpm,
        }
    }

    pub fn cyl_bytes(&self) -> u64 {
        self.nr_secs as u64 * sec_sz(self.no) as u64 * self.nr_sides as u64
    }

    pub fn to_layout(&self) -> SimpleLayout {
        SimpleLayout {
            nr_sectors: self.nr_secs as u16,
            rpm: self.rpm,
            has_iam: self.has_iam,
            no: self.no,
            gap_3: Some(self.gap3),
            interleave: self.interleave,
            cskew: self.cskew,
            hskew: self.hskew,
            base: [self.base, self.base],
            ..SimpleLayout::default()
        }
    }
}

use CylClass::{C40, C80};

const IAM: bool = true;
const NO_IAM: bool = false;

/// Default PC/generic table, in preference order.
pub const IMG_TYPES: &[RawType] = &[
    RawType::new(8, 1, IAM, 84, 1, 2, 1, 0, 0, C40, 300),  // 160k
    RawType::new(9, 1, IAM, 84, 1, 2, 1, 0, 0, C40, 300),  // 180k
    RawType::new(10, 1, IAM, 30, 1, 2, 1, 0, 0, C40, 300), // 200k
    RawType::new(8, 2, IAM, 84, 1, 2, 1, 0, 0, C40, 300),  // 320k
    RawType::new(9, 2, IAM, 84, 1, 2, 1, 0, 0, C40, 300),  // 360k (#1)
    RawType::new(10, 2, IAM, 30, 1, 2, 1, 0, 0, C40, 300), // 400k (#1)
    RawType::new(15, 2, IAM, 84, 1, 2, 1, 0, 0, C80, 360), // 1.2MB
    RawType::new(9, 1, IAM, 84, 1, 2, 1, 0, 0, C80, 300),  // 360k (#2)
    RawType::new(10, 1, IAM, 30, 1, 2, 1, 0, 0, C80, 300), // 400k (#2)
    RawType::new(11, 1, IAM, 3, 2, 2, 1, 0, 0, C80, 300),  // 440k
    RawType::new(8, 2, IAM, 84, 1, 2, 1, 0, 0, C80, 300),  // 640k
    RawType::new(9, 2, IAM, 84, 1, 2, 1, 0, 0, C80, 300),  // 720k
    RawType::new(10, 2, IAM, 30, 1, 2, 1, 0, 0, C80, 300), // 800k
    RawType::new(11, 2, IAM, 3, 2, 2, 1, 0, 0, C80, 300),  // 880k
    RawType::new(18, 2, IAM, 84, 1, 2, 1, 0, 0, C80, 300), // 1.44M
    RawType::new(19, 2, IAM, 70, 1, 2, 1, 0, 0, C80, 300), // 1.52M
    RawType::new(21, 2, IAM, 12, 2, 2, 1, 3, 0, C80, 300), // 1.68M
    RawType::new(20, 2, IAM, 40, 1, 2, 1, 0, 0, C80, 300), // 1.6M
    RawType::new(36, 2, IAM, 84, 1, 2, 1, 0, 0, C80, 300), // 2.88M
];

pub const ADFS_TYPES: &[RawType] = &[
    // ADFS D/E: 5 * 1kB, 800k
    RawType::new(5, 2, IAM, 116, 1, 3, 0, 1, 0, C80, 300),
    // ADFS F: 10 * 1kB, 1600k
    RawType::new(10, 2, IAM, 116, 1, 3, 0, 2, 0, C80, 300),
    // ADFS L 640k
    RawType::new(16, 2, IAM, 57, 1, 1, 0, 0, 0, C80, 300),
    // ADFS M 320k
    RawType::new(16, 1, IAM, 57, 1, 1, 0, 0, 0, C80, 300),
    // ADFS S 160k
    RawType::new(16, 1, IAM, 57, 1, 1, 0, 0, 0, C40, 300),
];

pub const AKAI_TYPES: &[RawType] = &[
    // Akai DD:  5*1kB sectors
    RawType::new(5, 2, IAM, 116, 1, 3, 1, 2, 0, C80, 300),
    // Akai HD: 10*1kB sectors
    RawType::new(10, 2, IAM, 116, 1, 3, 1, 5, 0, C80, 300),
];

pub const CASIO_TYPES: &[RawType] = &[
    RawType::new(8, 2, IAM, 116, 3, 3, 1, 0, 0, C80, 360), // 1280k
];

pub const D81_TYPES: &[RawType] = &[RawType::new(10, 2, IAM, 30, 1, 2, 1, 0, 0, C80, 300)];

pub const DEC_TYPES: &[RawType] = &[
    // RX50 (400k); RX33 (1.2MB) comes from the default list
    RawType::new(10, 1, IAM, 30, 1, 2, 1, 0, 0, C80, 300),
];

pub const ENSONIQ_TYPES: &[RawType] = &[
    RawType::new(10, 2, IAM, 30, 1, 2, 0, 0, 0, C80, 300), // 800kB
    RawType::new(20, 2, IAM, 40, 1, 2, 0, 0, 0, C80, 300), // 1.6MB
];

pub const FLUKE_TYPES: &[RawType] = &[RawType::new(16, 2, IAM, 57, 2, 1, 0, 0, 0, C80, 300)];

pub const MBD_TYPES: &[RawType] = &[
    RawType::new(11, 2, IAM, 30, 1, 3, 1, 0, 0, C80, 300),
    RawType::new(5, 2, IAM, 116, 1, 3, 1, 0, 0, C80, 300),
    RawType::new(11, 2, IAM, 30, 1, 3, 1, 0, 0, C40, 300),
    RawType::new(5, 2, IAM, 116, 1, 3, 1, 0, 0, C40, 300),
];

pub const MEMOTECH_TYPES: &[RawType] = &[
    RawType::new(16, 2, IAM, 57, 3, 1, 1, 0, 0, C40, 300), // Type 03
    RawType::new(16, 2, IAM, 57, 3, 1, 1, 0, 0, C80, 300), // Type 07
];

pub const MSX_TYPES: &[RawType] = &[
    RawType::new(8, 1, IAM, 84, 1, 2, 1, 0, 0, C80, 300), // 320k
    RawType::new(9, 1, IAM, 84, 1, 2, 1, 0, 0, C80, 300), // 360k
    // all other sizes come from the default list
];

pub const NASCOM_TYPES: &[RawType] = &[
    RawType::new(16, 1, IAM, 57, 3, 1, 1, 8, 0, C80, 300), // 320k
    RawType::new(16, 2, IAM, 57, 3, 1, 1, 8, 0, C80, 300), // 640k
];

pub const PC98_TYPES: &[RawType] = &[
    RawType::new(8, 2, IAM, 116, 1, 3, 1, 0, 0, C80, 360), // HD 360RPM
    RawType::new(8, 2, IAM, 57, 1, 2, 1, 0, 0, C80, 360),  // DD 360RPM
];

pub const UKNC_TYPES: &[RawType] = &[RawType::new(10, 2, NO_IAM, 38, 1, 2, 1, 0, 0, C80, 300)];

/// Walk a candidate table looking for an exact file-size match. Returns the
/// matched entry and the cylinder count that produced the match.
pub fn match_size(types: &[RawType], size: u64) -> Option<(u16, &RawType)> {
    for t in types {
        let cyl_bytes = t.cyl_bytes();
        for nr_cyls in t.cyls.range() {
            if nr_cyls as u64 * cyl_bytes == size {
                return Some((nr_cyls, t));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pc_1m44() {
        let (cyls, t) = match_size(IMG_TYPES, 1_474_560).unwrap();
        assert_eq!((cyls, t.nr_secs, t.nr_sides, t.no), (80, 18, 2, 2));
        assert_eq!(t.gap3, 84);
    }

    #[test]
    fn every_entry_matches_its_own_sizes() {
        for t in IMG_TYPES {
            for cyls in t.cyls.range() {
                let size = cyls as u64 * t.cyl_bytes();
                let (c, m) = match_size(IMG_TYPES, size).unwrap();
                // First match wins; the matched entry must reproduce the size.
                assert_eq!(c as u64 * m.cyl_bytes(), size);
            }
        }
    }

    #[test]
    fn off_by_one_rejected() {
        for t in IMG_TYPES {
            for cyls in t.cyls.range() {
                let size = cyls as u64 * t.cyl_bytes();
                for probe in [size - 1, size + 1] {
                    if let Some((c, m)) = match_size(IMG_TYPES, probe) {
                        assert_ne!(
                            (c, m.nr_secs, m.nr_sides, m.no),
                            (cyls, t.nr_secs, t.nr_sides, t.no)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn preference_order() {
        // 360k is ambiguous between 40/2/9 and 80/1/9; the 40-cylinder entry
        // is listed first and must win.
        let (cyls, t) = match_size(IMG_TYPES, 368_640).unwrap();
        assert_eq!((cyls, t.nr_sides), (40, 2));
    }
}
