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

    src/lib.rs

    rawtrack converts flat sector-per-offset floppy images (IMG, ATR, TRD,
    D81, XDF and friends) into IBM System 34 MFM/FM bitcell track streams
    for real-time playback to a drive-emulation front end, and decodes
    written bitcell streams back into the underlying image file.
*/

pub mod bitcell;
mod bpb;
pub mod catalog;
pub mod codec;
pub mod config;
mod decoder;
mod encoder;
pub mod formats;
pub mod image;
pub mod io;
pub mod track;
mod util;

use thiserror::Error;

/// Largest supported sector-size code: `128 << 6` = 8192 bytes.
pub const MAX_SECTOR_SIZE_CODE: u8 = 6;

/// Nominal system tick clock, in MHz, used for all rotational timing.
pub const SYSCLK_MHZ: u32 = 72;

#[derive(Debug, Error)]
pub enum ImageError {
    /// The header, signature or file size did not match the format being
    /// probed. The caller is expected to try the next handler.
    #[error("Not a recognized image format")]
    UnknownFormat,
    /// A structural invariant of the image is violated. Fatal for the open.
    #[error("Disk image is structurally invalid")]
    BadImage,
    /// An underlying I/O error from the backing file, propagated unchanged.
    #[error("An IO error occurred reading or writing the disk image")]
    IoError(#[from] std::io::Error),
}

/// Sector size in bytes for a size code `n` as carried in the IDAM.
#[inline]
pub const fn sec_sz(n: u8) -> u32 {
    128u32 << n
}

pub use crate::{
    formats::{HostHint, ImageFormat},
    image::{FileLayout, Geometry, RawImage, TrackShape},
    track::{LayoutArena, SectorInfo, SimpleLayout, TrackInfo},
};
