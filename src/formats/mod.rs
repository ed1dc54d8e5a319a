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

    src/formats/mod.rs

    The format-handler registry. Each handler probes an opened file and, on
    a match, populates the image's geometry and layout arena. Handlers are
    dispatched by enum, with extension lookup for front ends that route by
    file name.
*/

pub(crate) mod acorn;
pub(crate) mod atr;
pub(crate) mod header;
pub(crate) mod img;
pub(crate) mod spectrum;
pub(crate) mod ti99;
pub(crate) mod xdf;

use strum::{EnumIter, IntoEnumIterator};

use crate::{config::ConfigToken, image::RawImage, io::ReadWriteSeek, ImageError};

/// The host system the front end is emulating a drive for. Several hosts
/// use the same raw image extensions but different geometries; the hint
/// selects the right candidate table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HostHint {
    #[default]
    Unspecified,
    Akai,
    Casio,
    Dec,
    Ensoniq,
    Fluke,
    Gem,
    Ibm3174,
    Memotech,
    Msx,
    Nascom,
    Pc98,
    PcDos,
    Ti99,
    Uknc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum ImageFormat {
    /// Generic raw sector image, geometry from size/BPB/host tables.
    Img,
    /// Acorn ADFS.
    Adfs,
    /// Atari 8-bit ATR.
    Atr,
    /// Commodore 1581.
    D81,
    /// Acorn DFS, single-sided.
    Ssd,
    /// Acorn DFS, double-sided.
    Dsd,
    /// Tandy CoCo JVC.
    Jvc,
    /// UK101/Memotech MBD.
    Mbd,
    /// SAM Coupe MGT.
    Mgt,
    /// Opus Discovery OPD.
    Opd,
    /// NEC PC-98 FDI container.
    Pc98Fdi,
    /// NEC PC-98 bare HDM.
    Pc98Hdm,
    /// SAB Diskette Utility SDU.
    Sdu,
    /// Atari ST.
    St,
    /// TI-99/4A V9T9 sector dump.
    Ti99,
    /// Spectrum TR-DOS TRD.
    Trd,
    /// UKNC (DEC pro derivative).
    Uknc,
    /// Dragon/CoCo VDK container.
    Vdk,
    /// IBM extended-density XDF.
    Xdf,
}

impl ImageFormat {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Img => &["img", "ima", "dsk", "bin"],
            ImageFormat::Adfs => &["adf", "adl", "adm"],
            ImageFormat::Atr => &["atr"],
            ImageFormat::D81 => &["d81"],
            ImageFormat::Ssd => &["ssd"],
            ImageFormat::Dsd => &["dsd"],
            ImageFormat::Jvc => &["jvc"],
            ImageFormat::Mbd => &["mbd"],
            ImageFormat::Mgt => &["mgt"],
            ImageFormat::Opd => &["opd"],
            ImageFormat::Pc98Fdi => &["fdi"],
            ImageFormat::Pc98Hdm => &["hdm"],
            ImageFormat::Sdu => &["sdu"],
            ImageFormat::St => &["st"],
            ImageFormat::Ti99 => &["v9t9"],
            ImageFormat::Trd => &["trd"],
            ImageFormat::Uknc => &[],
            ImageFormat::Vdk => &["vdk"],
            ImageFormat::Xdf => &["xdf"],
        }
    }

    pub fn from_extension(ext: &str) -> Option<ImageFormat> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        ImageFormat::iter().find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Formats whose handlers permit growing a short file on write.
    pub fn supports_extend(&self) -> bool {
        matches!(self, ImageFormat::Trd | ImageFormat::Ssd | ImageFormat::Dsd)
    }
}

pub(crate) fn open_with<F: ReadWriteSeek>(
    im: &mut RawImage<F>,
    format: ImageFormat,
    tag: Option<&str>,
    sidecar: Option<&[ConfigToken<'_>]>,
) -> Result<(), ImageError> {
    im.format = format;
    match format {
        ImageFormat::Img => img::open(im, tag, sidecar),
        ImageFormat::Adfs => img::adfs_open(im),
        ImageFormat::Atr => atr::open(im),
        ImageFormat::D81 => img::d81_open(im),
        ImageFormat::Ssd => acorn::ssd_open(im),
        ImageFormat::Dsd => acorn::dsd_open(im),
        ImageFormat::Jvc => header::jvc_open(im),
        ImageFormat::Mbd => img::mbd_open(im),
        ImageFormat::Mgt => img::mgt_open(im),
        ImageFormat::Opd => spectrum::opd_open(im),
        ImageFormat::Pc98Fdi => header::pc98fdi_open(im),
        ImageFormat::Pc98Hdm => img::pc98hdm_open(im),
        ImageFormat::Sdu => header::sdu_open(im),
        ImageFormat::St => img::st_open(im),
        ImageFormat::Ti99 => ti99::open(im),
        ImageFormat::Trd => spectrum::trd_open(im),
        ImageFormat::Uknc => img::uknc_open(im),
        ImageFormat::Vdk => header::vdk_open(im),
        ImageFormat::Xdf => xdf::open(im),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup() {
        assert_eq!(ImageFormat::from_extension("IMA"), Some(ImageFormat::Img));
        assert_eq!(ImageFormat::from_extension(".atr"), Some(ImageFormat::Atr));
        assert_eq!(ImageFormat::from_extension("xdf"), Some(ImageFormat::Xdf));
        assert_eq!(ImageFormat::from_extension("nope"), None);
    }
}
