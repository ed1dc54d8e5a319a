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

    src/image.rs

    The opened image: geometry envelope, layout arena, per-track state and
    the cooperative read/write entry points polled by the front end. The
    arena is read-only after open; everything per-track is rebuilt by
    `setup_track()`.
*/

use bitflags::bitflags;

use crate::{
    bitcell::BitcellRing,
    config::ConfigToken,
    decoder, encoder,
    formats::{self, HostHint, ImageFormat},
    io::ReadWriteSeek,
    track::{rotational_sec_map, LayoutArena, SectorInfo, TrackInfo},
    util::get_length,
    ImageError, SYSCLK_MHZ,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    pub nr_cyls: u16,
    pub nr_sides: u8,
}

bitflags! {
    /// Modifiers on the order in which track data appears in the file.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FileLayout: u8 {
        /// Side-major order: all of side 0, then all of side 1.
        const SEQUENTIAL    = 1 << 0;
        /// Physical side 0 stores file side 1 and vice versa.
        const SIDES_SWAPPED = 1 << 1;
        /// Cylinder order runs backwards on the given side.
        const REVERSE_SIDE0 = 1 << 2;
        const REVERSE_SIDE1 = 1 << 3;
    }
}

impl FileLayout {
    pub fn reverse_side(side: u8) -> FileLayout {
        match side & 1 {
            0 => FileLayout::REVERSE_SIDE0,
            _ => FileLayout::REVERSE_SIDE1,
        }
    }
}

/// Resolved per-track encoding parameters, computed from the active
/// `TrackInfo` on every track seek. All field sizes are in data bytes; one
/// data byte is 16 bitcells on the wire.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackShape {
    pub is_fm: bool,
    pub nr_sectors: u16,
    pub has_iam: bool,
    pub invert_data: bool,
    pub head: Option<u8>,
    pub gap_2: u16,
    pub gap_3: u16,
    pub gap_4a: u16,
    /// Terminal (pre-index) gap soaking up the track length remainder.
    pub gap_4: u32,
    /// Post-index region: gap 4a plus the IAM if present.
    pub idx_sz: u32,
    /// Sync + IDAM + id + CRC + gap 2.
    pub idam_sz: u32,
    /// Sync + DAM mark.
    pub dam_sz_pre: u32,
    /// CRC + gap 3 (+ resync words where used).
    pub dam_sz_post: u32,
    pub data_rate: u16,
    pub rpm: u16,
}

impl TrackShape {
    /// Encoded size of one sector in data bytes: IDAM field, DAM preamble,
    /// data, CRC and trailing gap.
    #[inline]
    pub fn enc_sec_sz(&self, sec: &SectorInfo) -> u32 {
        self.idam_sz + self.dam_sz_pre + sec.size() + self.dam_sz_post
    }
}

/// Sector resolution state on the write path. A data mark is only honored
/// after a matching address mark; the two sentinel states record why one
/// is missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum WriteSector {
    /// No IDAM decoded yet this track; a DAM triggers geometric lookup.
    NoIdamYet,
    /// Last IDAM was bad or consumed; discard DAMs until the next one.
    Invalid,
    Sector(usize),
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct WriteOp {
    pub start_ticks: u32,
    /// Producer position at which the write ended; set by `write_end()`.
    pub bc_end: Option<u32>,
}

/// 1 KiB staging buffer between the backing file and the bitcell emitter.
/// `prod`/`cons` count whole chunks.
pub(crate) struct DataBuf {
    pub buf: [u8; 1024],
    pub prod: u32,
    pub cons: u32,
}

impl DataBuf {
    fn new() -> DataBuf {
        DataBuf {
            buf: [0; 1024],
            prod: 0,
            cons: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.prod = 0;
        self.cons = 0;
    }
}

pub(crate) fn invert_buf(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = !*b;
    }
}

/// System ticks for one revolution at the given speed.
pub(crate) fn ticks_per_rev(rpm: u16) -> u32 {
    ((SYSCLK_MHZ as u64 * 200_000 * 300) / rpm as u64) as u32
}

pub struct RawImage<F: ReadWriteSeek> {
    pub(crate) file: F,
    pub(crate) file_len: u64,
    pub(crate) format: ImageFormat,
    pub(crate) host: HostHint,

    pub(crate) geom: Geometry,
    pub(crate) arena: LayoutArena,
    pub(crate) base_off: u32,
    pub(crate) step: u8,
    pub(crate) layout: FileLayout,
    /// Extra resync words appended after each CRC (UKNC).
    pub(crate) post_crc_syncs: u8,
    pub(crate) xdf: Option<formats::xdf::XdfInfo>,

    // Per-track state, rebuilt by seek_track().
    pub(crate) cur_track: Option<u16>,
    pub(crate) cur_trk: TrackInfo,
    pub(crate) cur_secs: Vec<SectorInfo>,
    pub(crate) sec_map: Vec<u8>,
    pub(crate) shape: TrackShape,
    pub(crate) tracklen_bc: u32,
    pub(crate) ticks_per_cell: u32,
    pub(crate) write_bc_ticks: u32,
    pub(crate) trk_off: u32,
    /// Per-sector byte offsets into the track's file data. When absent the
    /// sectors are laid out contiguously in logical order.
    pub(crate) file_sec_offsets: Option<Vec<u32>>,
    pub(crate) track_delay_bc: u32,
    pub(crate) cur_bc: u32,

    // Encode/decode cursors, reset by setup_track().
    pub(crate) decode_pos: i32,
    pub(crate) decode_data_pos: u32,
    pub(crate) rd_sec_pos: u32,
    pub(crate) trk_sec: u16,
    pub(crate) crc: u16,
    pub(crate) write_sector: WriteSector,
    pub(crate) write_op: Option<WriteOp>,

    pub(crate) read_data: DataBuf,
    pub(crate) read_bc: BitcellRing,
    pub(crate) write_bc: BitcellRing,
}

impl<F: ReadWriteSeek> RawImage<F> {
    fn new(mut file: F, host: HostHint) -> Result<Self, ImageError> {
        let file_len = get_length(&mut file)?;
        Ok(RawImage {
            file,
            file_len,
            format: ImageFormat::Img,
            host,
            geom: Geometry::default(),
            arena: LayoutArena::default(),
            base_off: 0,
            step: 0,
            layout: FileLayout::empty(),
            post_crc_syncs: 0,
            xdf: None,
            cur_track: None,
            cur_trk: TrackInfo::default(),
            cur_secs: Vec::new(),
            sec_map: Vec::new(),
            shape: TrackShape::default(),
            tracklen_bc: 0,
            ticks_per_cell: 0,
            write_bc_ticks: 0,
            trk_off: 0,
            file_sec_offsets: None,
            track_delay_bc: 0,
            cur_bc: 0,
            decode_pos: 0,
            decode_data_pos: 0,
            rd_sec_pos: 0,
            trk_sec: 0,
            crc: 0xFFFF,
            write_sector: WriteSector::NoIdamYet,
            write_op: None,
            read_data: DataBuf::new(),
            read_bc: BitcellRing::default(),
            // The write path holds back a whole sector plus CRC before
            // committing it, and sectors run up to 8 KiB.
            write_bc: BitcellRing::new(16384),
        })
    }

    /// Open an image, picking the handler from the file extension and
    /// falling back to the generic raw-sector handler when the extension's
    /// own probe rejects the file. An optional sidecar configuration token
    /// stream takes priority over all built-in probing.
    pub fn open(
        file: F,
        extension: Option<&str>,
        host: HostHint,
        sidecar: Option<&[ConfigToken<'_>]>,
    ) -> Result<Self, ImageError> {
        let mut im = RawImage::new(file, host)?;
        let format = extension
            .and_then(ImageFormat::from_extension)
            .unwrap_or(ImageFormat::Img);
        match formats::open_with(&mut im, format, extension, sidecar) {
            Ok(()) => Ok(im),
            Err(ImageError::UnknownFormat) if format != ImageFormat::Img => {
                log::debug!("open(): {:?} probe rejected image, trying generic", format);
                im.reset_all_params();
                formats::open_with(&mut im, ImageFormat::Img, extension, sidecar)?;
                Ok(im)
            }
            Err(e) => Err(e),
        }
    }

    /// Open with an explicit format handler; no fallback.
    pub fn open_as(format: ImageFormat, file: F, host: HostHint) -> Result<Self, ImageError> {
        let mut im = RawImage::new(file, host)?;
        formats::open_with(&mut im, format, None, None)?;
        Ok(im)
    }

    /// Image payload size: file length minus any container header.
    pub fn im_size(&self) -> u64 {
        self.file_len.saturating_sub(self.base_off as u64)
    }

    pub fn geometry(&self) -> Geometry {
        self.geom
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn layout_flags(&self) -> FileLayout {
        self.layout
    }

    pub fn arena(&self) -> &LayoutArena {
        &self.arena
    }

    pub fn track_shape(&self) -> &TrackShape {
        &self.shape
    }

    pub fn tracklen_bc(&self) -> u32 {
        self.tracklen_bc
    }

    pub fn ticks_per_cell(&self) -> u32 {
        self.ticks_per_cell
    }

    pub fn sector_map(&self) -> &[u8] {
        &self.sec_map
    }

    pub fn track_file_offset(&self) -> u32 {
        self.trk_off
    }

    pub fn track_delay_bc(&self) -> u32 {
        self.track_delay_bc
    }

    pub fn base_off(&self) -> u32 {
        self.base_off
    }

    /// Total file size this image's layout implies, for handlers that allow
    /// growing a short file on write. `None` for fixed-size formats.
    pub fn extend(&self) -> Option<u64> {
        self.format
            .supports_extend()
            .then(|| self.base_off as u64 + self.arena.mapped_data_bytes())
    }

    pub(crate) fn reset_all_params(&mut self) {
        self.geom = Geometry::default();
        self.arena.reset();
        self.base_off = 0;
        self.step = 0;
        self.layout = FileLayout::empty();
        self.post_crc_syncs = 0;
        self.xdf = None;
        self.file_sec_offsets = None;
        self.cur_track = None;
    }

    /// Common tail of every format probe: default the step factor and seek
    /// track 0 so timing state is valid immediately.
    pub(crate) fn raw_open(&mut self) -> Result<(), ImageError> {
        if self.step == 0 {
            self.step = 1;
        }
        self.raw_seek_track(0, 0, 0)
    }

    /// Cylinder count as seen by the drive, accounting for double-stepping.
    pub fn physical_cyls(&self) -> u16 {
        (self.geom.nr_cyls * self.step as u16).min(255)
    }

    /// File index of a physical track under the layout modifiers.
    pub(crate) fn file_idx(&self, cyl: u16, side: u8) -> u32 {
        let c = if self.layout.contains(FileLayout::reverse_side(side)) {
            self.geom.nr_cyls - 1 - cyl
        } else {
            cyl
        } as u32;
        let s = if self.layout.contains(FileLayout::SIDES_SWAPPED) {
            side ^ (self.geom.nr_sides - 1)
        } else {
            side
        } as u32;
        if self.layout.contains(FileLayout::SEQUENTIAL) {
            s * self.geom.nr_cyls as u32 + c
        } else {
            c * self.geom.nr_sides as u32 + s
        }
    }

    pub(crate) fn raw_seek_track(
        &mut self,
        track: u16,
        cyl: u16,
        side: u8,
    ) -> Result<(), ImageError> {
        self.cur_track = Some(track);

        let map_idx = cyl as usize * self.geom.nr_sides as usize + side as usize;
        let layout_idx = self.arena.map()[map_idx] as usize;
        self.cur_trk = self.arena.trk(layout_idx).clone();
        self.cur_secs = self.arena.sectors_of(layout_idx).to_vec();

        self.sec_map = rotational_sec_map(
            self.cur_trk.nr_sectors,
            self.cur_trk.interleave,
            self.cur_trk.cskew,
            self.cur_trk.hskew,
            cyl,
            side,
        );

        encoder::prep_track(self)?;

        if self.file_sec_offsets.is_none() {
            // Find the offset of this track's data in the image file by
            // summing every track that orders before it.
            let my_idx = self.file_idx(cyl, side);
            let mut off = self.base_off as u64;
            for c in 0..self.geom.nr_cyls {
                for s in 0..self.geom.nr_sides {
                    if self.file_idx(c, s) >= my_idx {
                        continue;
                    }
                    let li = self.arena.map()[c as usize * self.geom.nr_sides as usize + s as usize];
                    off += self
                        .arena
                        .sectors_of(li as usize)
                        .iter()
                        .map(|sec| sec.size() as u64)
                        .sum::<u64>();
                }
            }
            self.trk_off = off as u32;
        }

        Ok(())
    }

    /// Translate `cur_bc` into decode-state counters, returning the byte
    /// offset into the field the next emit call will produce.
    pub(crate) fn calc_start_pos(&mut self) -> u32 {
        let mut bc = self.cur_bc as i64 - self.track_delay_bc as i64;
        if bc < 0 {
            bc += self.tracklen_bc as i64;
        }

        self.crc = 0xFFFF;
        self.trk_sec = 0;
        self.rd_sec_pos = 0;
        self.decode_data_pos = 0;

        let mut decode_off = (bc / 16) as u32;
        if decode_off < self.shape.idx_sz {
            // Post-index track gap
            self.decode_pos = 0;
            return decode_off;
        }

        decode_off -= self.shape.idx_sz;
        let nr = self.shape.nr_sectors as usize;
        let mut i = 0;
        while i < nr {
            let sec = self.cur_secs[self.sec_map[i] as usize];
            let ess = self.shape.enc_sec_sz(&sec);
            if decode_off < ess {
                break;
            }
            decode_off -= ess;
            i += 1;
        }

        if i < nr {
            let sec = self.cur_secs[self.sec_map[i] as usize];
            self.trk_sec = i as u16;
            self.decode_pos = i as i32 * 4 + 1; // IDAM
            if decode_off >= self.shape.idam_sz {
                decode_off -= self.shape.idam_sz;
                self.decode_pos += 1; // DAM preamble
                if decode_off >= self.shape.dam_sz_pre {
                    decode_off -= self.shape.dam_sz_pre;
                    self.decode_pos += 1; // Data
                    if decode_off < sec.size() {
                        self.rd_sec_pos = decode_off / 1024;
                        self.decode_data_pos = self.rd_sec_pos;
                        decode_off %= 1024;
                    } else {
                        decode_off -= sec.size();
                        self.decode_pos += 1; // Post data
                        // Start fetch at the next sector.
                        self.trk_sec = ((i + 1) % nr) as u16;
                    }
                }
            }
        } else {
            // Pre-index track gap
            self.decode_pos = nr as i32 * 4 + 1;
            self.decode_data_pos = decode_off / 1024;
            decode_off %= 1024;
        }

        decode_off
    }

    /// Select a new track. Invalidates all per-track state, resets both
    /// rings and drops any write that has not yet reached the file. When a
    /// start position (in system ticks) is supplied, the read ring is
    /// primed so the first word handed out corresponds to that rotational
    /// position.
    pub fn setup_track(
        &mut self,
        track: u16,
        start_pos: Option<&mut u32>,
    ) -> Result<(), ImageError> {
        if self.xdf.is_some() {
            formats::xdf::setup_track_offsets(self, track);
        }

        let cyl = (track / (2 * self.step as u16)).min(self.geom.nr_cyls.saturating_sub(1));
        let side = (track as u8 & 1) & (self.geom.nr_sides - 1);
        let vtrack = cyl * 2 + side as u16;

        if self.cur_track != Some(vtrack) {
            self.raw_seek_track(vtrack, cyl, side)?;
        }

        self.write_sector = WriteSector::NoIdamYet;
        self.write_op = None;

        let sys_ticks = start_pos.as_deref().copied().unwrap_or(0);
        self.cur_bc = ((sys_ticks as u64 * 16) / self.ticks_per_cell as u64) as u32 & !15;
        if self.cur_bc >= self.tracklen_bc {
            self.cur_bc = 0;
        }

        let decode_off = self.calc_start_pos();

        self.read_data.reset();
        self.read_bc.reset();
        self.write_bc.reset();

        if let Some(pos) = start_pos {
            self.read_track()?;
            self.read_bc.cons = decode_off * 16;
            *pos = sys_ticks;
        }

        Ok(())
    }

    /// Encode more of the current track into the read ring. Returns `false`
    /// when the ring cannot hold the next field in full.
    pub fn read_track(&mut self) -> Result<bool, ImageError> {
        encoder::read_track(self)
    }

    /// Drain the write ring, decoding address marks and persisting written
    /// sectors to the file. Returns `true` once a flush (see `write_end`)
    /// has been fully processed.
    pub fn write_track(&mut self) -> Result<bool, ImageError> {
        decoder::write_track(self)
    }

    // Front-end ring access ------------------------------------------------

    /// Pop produced bitcell words for playback. Returns the number copied.
    pub fn read_bitcells(&mut self, out: &mut [u16]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.read_bc.pop_word() {
                Some(w) => {
                    out[n] = w;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Begin a write transaction. `start_ticks` is the rotational position,
    /// in system ticks, at which the drive asserted write gate; it is what
    /// locates a write that starts mid-track without a preceding IDAM.
    pub fn write_begin(&mut self, start_ticks: u32) {
        self.write_op = Some(WriteOp {
            start_ticks,
            bc_end: None,
        });
        self.write_sector = WriteSector::NoIdamYet;
    }

    /// Feed sampled bitcell words into the write ring. Returns the number
    /// accepted; call `write_track()` to make room.
    pub fn write_bitcells(&mut self, words: &[u16]) -> usize {
        self.write_bc.push_words(words)
    }

    /// End the write transaction at the current ring position. Subsequent
    /// `write_track()` calls process the remainder and then report `true`.
    pub fn write_end(&mut self) {
        let end = self.write_bc.prod;
        if let Some(op) = &mut self.write_op {
            op.bc_end = Some(end);
        }
    }

    pub(crate) fn current_track_nr(&self) -> u16 {
        self.cur_track.unwrap_or(0)
    }

    /// Release the backing file.
    pub fn into_inner(self) -> F {
        self.file
    }
}
