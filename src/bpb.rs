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

    src/bpb.rs

    BIOS Parameter Block probe. The BPB is read only to disambiguate
    geometry; no filesystem interpretation happens here.
*/

use crate::io::{ReadSeek, SeekFrom};
use binrw::BinRead;

/// The BPB fields the geometry probes care about, plus the boot signature.
/// Field order follows probe priority, with explicit offsets, since we read
/// a scattered subset of the boot sector rather than the whole structure.
#[derive(Debug, Default, BinRead)]
#[br(little)]
pub(crate) struct Bpb {
    #[br(seek_before = SeekFrom::Start(510))]
    pub sig: u16,
    #[br(seek_before = SeekFrom::Start(11))]
    pub bytes_per_sec: u16,
    #[br(seek_before = SeekFrom::Start(24))]
    pub sec_per_track: u16,
    #[br(seek_before = SeekFrom::Start(26))]
    pub num_heads: u16,
    #[br(seek_before = SeekFrom::Start(19))]
    pub tot_sec: u16,
    #[br(seek_before = SeekFrom::Start(17))]
    pub rootdir_ents: u16,
    #[br(seek_before = SeekFrom::Start(22))]
    pub fat_secs: u16,
}

impl Bpb {
    pub(crate) fn read<RS: ReadSeek>(file: &mut RS) -> Option<Bpb> {
        match Bpb::read_le(file) {
            Ok(bpb) => Some(bpb),
            Err(e) => {
                log::trace!("Bpb::read(): {}", e);
                None
            }
        }
    }

    /// A 3.5-inch HD extended-density image announces itself through an
    /// otherwise-ordinary BPB whose logical sectors-per-track cannot fit a
    /// physical track.
    pub(crate) fn xdf_check(&self) -> bool {
        self.sig == 0xAA55
            && self.bytes_per_sec == 512
            && self.num_heads == 2
            && self.tot_sec as u32 == 2 * 80 * self.sec_per_track as u32
    }
}
