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

    src/track.rs

    The layout arena: a compact, append-only store of per-track and
    per-sector descriptors. Tracks reference their sectors by base index and
    count rather than by pointer, and the physical track map is a byte array
    of indices into the track store, so an entire image layout is a handful
    of small flat vectors. The arena is built once during open and treated
    as immutable afterwards.
*/

use crate::{sec_sz, ImageError, MAX_SECTOR_SIZE_CODE};

pub const MAX_CYLS: u16 = 255;
pub const MAX_SIDES: u8 = 2;
pub const MAX_TRACK_SECTORS: usize = 256;

/// Upper bound on arena memory, mirroring the scratch-heap budget the
/// layout structures must share with the 1024-byte staging buffers on a
/// memory-constrained front end.
pub const ARENA_BUDGET_BYTES: usize = 16 * 1024;
const ARENA_GUARD_BYTES: usize = 1024;

/// One sector as it appears in its IDAM: `r` is the sector id byte
/// (independent of rotational or file position), `n` the size code
/// (`128 << n` data bytes).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SectorInfo {
    pub r: u8,
    pub n: u8,
}

impl SectorInfo {
    #[inline]
    pub fn size(&self) -> u32 {
        sec_sz(self.n)
    }
}

/// One track layout. Several physical tracks usually share one of these;
/// the track map picks which.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackInfo {
    pub nr_sectors: u16,
    /// Index of this track's first sector in the sector store.
    pub sec_off: usize,
    pub is_fm: bool,
    pub has_iam: bool,
    /// Data bytes are stored bitwise-inverted in the file (Atari ATR).
    pub invert_data: bool,
    /// Data rate in kbps; 0 selects inference from the track contents.
    pub data_rate: u16,
    /// Rotational speed; 0 is treated as 300 rpm.
    pub rpm: u16,
    pub interleave: u8,
    pub cskew: u8,
    pub hskew: u8,
    /// Head byte override for the IDAM. `None` derives it from the
    /// physical side.
    pub head: Option<u8>,
    /// Gap sizes in bytes; `None` selects the format-appropriate default.
    pub gap_2: Option<u8>,
    pub gap_3: Option<u8>,
    pub gap_4a: Option<u8>,
}

impl Default for TrackInfo {
    fn default() -> Self {
        TrackInfo {
            nr_sectors: 0,
            sec_off: 0,
            is_fm: false,
            has_iam: false,
            invert_data: false,
            data_rate: 0,
            rpm: 0,
            interleave: 1,
            cskew: 0,
            hskew: 0,
            head: None,
            gap_2: None,
            gap_3: None,
            gap_4a: None,
        }
    }
}

/// A uniform whole-image layout: one track shape repeated per side, with
/// per-side sector id bases. This is what the geometry catalog and most
/// format probes produce; irregular images build their layouts by hand.
#[derive(Clone, Debug)]
pub struct SimpleLayout {
    pub nr_sectors: u16,
    pub rpm: u16,
    pub data_rate: u16,
    pub gap_2: Option<u8>,
    pub gap_3: Option<u8>,
    pub gap_4a: Option<u8>,
    pub is_fm: bool,
    pub has_iam: bool,
    /// Also allocate an empty track layout (index `nr_sides`) for images
    /// that leave trailing tracks unformatted.
    pub has_empty: bool,
    /// Sector size code.
    pub no: u8,
    /// First sector id, per side.
    pub base: [u8; 2],
    pub interleave: u8,
    pub cskew: u8,
    pub hskew: u8,
    pub head: Option<u8>,
}

impl Default for SimpleLayout {
    fn default() -> Self {
        SimpleLayout {
            nr_sectors: 0,
            rpm: 300,
            data_rate: 0,
            gap_2: None,
            gap_3: None,
            gap_4a: None,
            is_fm: false,
            has_iam: true,
            has_empty: false,
            no: 0,
            base: [1, 1],
            interleave: 1,
            cskew: 0,
            hskew: 0,
            head: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LayoutArena {
    trk_info: Vec<TrackInfo>,
    sec_info: Vec<SectorInfo>,
    trk_map: Vec<u8>,
}

impl LayoutArena {
    pub fn reset(&mut self) {
        self.trk_info.clear();
        self.sec_info.clear();
        self.trk_map.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.trk_info.is_empty()
    }

    pub fn nr_layouts(&self) -> usize {
        self.trk_info.len()
    }

    pub fn trk(&self, idx: usize) -> &TrackInfo {
        &self.trk_info[idx]
    }

    pub fn trk_mut(&mut self, idx: usize) -> &mut TrackInfo {
        &mut self.trk_info[idx]
    }

    pub fn sectors(&self, trk: &TrackInfo) -> &[SectorInfo] {
        &self.sec_info[trk.sec_off..trk.sec_off + trk.nr_sectors as usize]
    }

    pub fn sectors_of(&self, idx: usize) -> &[SectorInfo] {
        let trk = &self.trk_info[idx];
        &self.sec_info[trk.sec_off..trk.sec_off + trk.nr_sectors as usize]
    }

    pub fn sectors_of_mut(&mut self, idx: usize) -> &mut [SectorInfo] {
        let trk = &self.trk_info[idx];
        let (off, nr) = (trk.sec_off, trk.nr_sectors as usize);
        &mut self.sec_info[off..off + nr]
    }

    pub fn map(&self) -> &[u8] {
        &self.trk_map
    }

    pub fn map_set(&mut self, physical_track: usize, layout_idx: u8) {
        self.trk_map[physical_track] = layout_idx;
    }

    /// Total data bytes across every mapped physical track, i.e. the file
    /// size this layout implies past any container header.
    pub fn mapped_data_bytes(&self) -> u64 {
        self.trk_map
            .iter()
            .map(|&li| {
                self.sectors_of(li as usize)
                    .iter()
                    .map(|s| s.size() as u64)
                    .sum::<u64>()
            })
            .sum()
    }

    fn footprint(&self) -> usize {
        self.trk_info.len() * std::mem::size_of::<TrackInfo>()
            + self.sec_info.len() * std::mem::size_of::<SectorInfo>()
            + self.trk_map.len()
            + MAX_TRACK_SECTORS
    }

    fn check_budget(&self) -> Result<(), ImageError> {
        if self.footprint() + ARENA_GUARD_BYTES > ARENA_BUDGET_BYTES {
            log::error!("layout arena exhausted ({} bytes)", self.footprint());
            return Err(ImageError::BadImage);
        }
        Ok(())
    }

    /// Allocate the physical track map. Must be called before any track
    /// layout is added.
    pub fn init_track_map(&mut self, nr_cyls: u16, nr_sides: u8) -> Result<(), ImageError> {
        if !(1..=MAX_SIDES).contains(&nr_sides) || !(1..=MAX_CYLS).contains(&nr_cyls) {
            log::error!("init_track_map(): bad geometry {}x{}", nr_cyls, nr_sides);
            return Err(ImageError::BadImage);
        }
        debug_assert!(self.trk_info.is_empty());
        self.trk_map = vec![0u8; nr_cyls as usize * nr_sides as usize];
        self.check_budget()
    }

    /// Append a new track layout with `nr_sectors` zeroed sector slots and
    /// return its index. Sector ids and sizes are filled in by the caller.
    pub fn add_track_layout(&mut self, nr_sectors: usize) -> Result<usize, ImageError> {
        debug_assert!(!self.trk_map.is_empty());
        if nr_sectors > MAX_TRACK_SECTORS {
            return Err(ImageError::BadImage);
        }
        let trk = TrackInfo {
            nr_sectors: nr_sectors as u16,
            sec_off: self.sec_info.len(),
            ..TrackInfo::default()
        };
        self.sec_info
            .resize(self.sec_info.len() + nr_sectors, SectorInfo::default());
        self.trk_info.push(trk);
        self.check_budget()?;
        Ok(self.trk_info.len() - 1)
    }

    /// Validate the finished layout: every map cell must reference a defined
    /// track layout and every sector must carry a representable size code.
    /// After this the arena is read-only.
    pub fn finalise_track_map(&self) -> Result<(), ImageError> {
        for &li in &self.trk_map {
            if li as usize >= self.trk_info.len() {
                log::error!("finalise_track_map(): unmapped layout index {}", li);
                return Err(ImageError::BadImage);
            }
            for sec in self.sectors_of(li as usize) {
                if sec.n > MAX_SECTOR_SIZE_CODE {
                    log::error!("finalise_track_map(): bad size code {}", sec.n);
                    return Err(ImageError::BadImage);
                }
            }
        }
        Ok(())
    }

    /// Build a uniform layout: one track shape per side (optionally plus an
    /// empty track), each physical track mapped to its side's layout.
    pub fn build_simple(
        &mut self,
        nr_cyls: u16,
        nr_sides: u8,
        layout: &SimpleLayout,
    ) -> Result<(), ImageError> {
        self.init_track_map(nr_cyls, nr_sides)?;

        for side in 0..nr_sides {
            let ti = self.add_track_layout(layout.nr_sectors as usize)?;
            {
                let trk = self.trk_mut(ti);
                trk.is_fm = layout.is_fm;
                trk.rpm = layout.rpm;
                trk.has_iam = layout.has_iam;
                trk.gap_2 = layout.gap_2;
                trk.gap_3 = layout.gap_3;
                trk.gap_4a = layout.gap_4a;
                trk.data_rate = layout.data_rate;
                trk.interleave = layout.interleave;
                trk.cskew = layout.cskew;
                trk.hskew = layout.hskew;
                trk.head = layout.head;
            }
            for (j, sec) in self.sectors_of_mut(ti).iter_mut().enumerate() {
                sec.r = (j as u8).wrapping_add(layout.base[side as usize]);
                sec.n = layout.no;
            }
        }

        if layout.has_empty {
            let ti = self.add_track_layout(0)?;
            let trk = self.trk_mut(ti);
            trk.is_fm = layout.is_fm;
            trk.rpm = layout.rpm;
            trk.data_rate = layout.data_rate;
        }

        for cyl in 0..nr_cyls as usize {
            for side in 0..nr_sides as usize {
                self.trk_map[cyl * nr_sides as usize + side] = side as u8;
            }
        }

        self.finalise_track_map()
    }
}

/// Rotational sector order for a track: starting from the skewed position,
/// place logical sector `i` every `interleave` slots, bumping forward past
/// slots already taken.
pub fn rotational_sec_map(
    nr_sectors: u16,
    interleave: u8,
    cskew: u8,
    hskew: u8,
    cyl: u16,
    side: u8,
) -> Vec<u8> {
    let n = nr_sectors as usize;
    if n == 0 {
        return Vec::new();
    }
    let step = interleave.max(1) as usize;
    let mut map = vec![0xFFu8; n];
    let mut pos = (cyl as usize * cskew as usize + side as usize * hskew as usize) % n;
    for i in 0..n {
        while map[pos] != 0xFF {
            pos = (pos + 1) % n;
        }
        map[pos] = i as u8;
        pos = (pos + step) % n;
    }
    map
}
