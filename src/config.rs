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

    src/config.rs

    Sidecar configuration. The file parser itself is external and hands us
    a token stream; this module scores sections against the image (by tag
    name and declared size), applies the winning section's options and
    builds multi-zone track layouts from its `tracks=` directives.

    Section headers take the form `name` or `name::size`. Scoring: +4 for a
    tag-name match, +2 for a size match, +1 for an empty (default) section
    name, -100 for a mismatch on either. The best strictly-positive score
    wins; earlier sections win ties.
*/

use crate::{
    image::{FileLayout, RawImage},
    io::ReadWriteSeek,
    track::SimpleLayout,
    util::parse_int,
    ImageError,
};

/// One token from the external sidecar parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigToken<'a> {
    /// A `[section]` header, with the brackets stripped.
    Section(&'a str),
    /// A `key=value` line.
    KeyValue(&'a str, &'a str),
}

fn add_zone_layout<F: ReadWriteSeek>(
    im: &mut RawImage<F>,
    layout: &SimpleLayout,
    trk_idx: usize,
) -> Result<(), ImageError> {
    if trk_idx == 0 {
        im.arena.init_track_map(im.geom.nr_cyls, im.geom.nr_sides)?;
    }

    let ti = im.arena.add_track_layout(layout.nr_sectors as usize)?;
    debug_assert_eq!(ti, trk_idx);
    {
        let trk = im.arena.trk_mut(ti);
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
    for (j, sec) in im.arena.sectors_of_mut(ti).iter_mut().enumerate() {
        sec.r = (j as u8).wrapping_add(layout.base[0]);
        sec.n = layout.no;
    }
    Ok(())
}

/// Apply a `tracks=c[-c][.h],...` zone selector: every named physical
/// track is pointed at the next layout index.
fn apply_zone_selector<F: ReadWriteSeek>(im: &mut RawImage<F>, value: &str, zone_idx: u8) {
    let nr_cyls = im.geom.nr_cyls as i64;
    let nr_sides = im.geom.nr_sides as i64;
    if im.arena.map().is_empty() || nr_cyls == 0 || nr_sides == 0 {
        return;
    }

    for item in value.split(',') {
        let (cyl_part, head_part) = match item.split_once('.') {
            Some((c, h)) => (c, Some(h)),
            None => (item, None),
        };
        let (c_start, c_end) = match cyl_part.split_once('-') {
            Some((a, b)) => (
                parse_int(a).unwrap_or(0) as i64,
                parse_int(b).unwrap_or(0) as i64,
            ),
            None => {
                let c = parse_int(cyl_part).unwrap_or(0) as i64;
                (c, c)
            }
        };
        let c_start = c_start.clamp(0, nr_cyls - 1);
        let c_end = c_end.clamp(0, nr_cyls - 1);

        let (h_start, h_end) = match head_part.and_then(parse_int) {
            Some(h) => {
                let h = (h as i64).clamp(0, nr_sides - 1);
                (h, h)
            }
            None => (0, nr_sides - 1),
        };

        for c in c_start..=c_end {
            for h in h_start..=h_end {
                im.arena
                    .map_set((c * nr_sides + h) as usize, zone_idx);
            }
        }
    }
}

/// Process a token stream against the image. Returns `Ok(true)` when a
/// section matched and the layout it described was applied.
pub(crate) fn tag_open<F: ReadWriteSeek>(
    im: &mut RawImage<F>,
    tag: Option<&str>,
    tokens: &[ConfigToken<'_>],
) -> Result<bool, ImageError> {
    let mut matched = 0i32;
    let mut active = 0i32;
    let mut nr_t: usize = 0;
    let mut t_layout = SimpleLayout::default();
    let mut d_layout = SimpleLayout::default();

    for token in tokens {
        let (key, value) = match token {
            ConfigToken::Section(raw) => {
                // Finalise any currently-active section.
                if active > 0 {
                    add_zone_layout(im, &t_layout, nr_t)?;
                    im.arena.finalise_track_map()?;
                }
                active = 0;

                // Split the tag name from the optional "::<size>" suffix.
                let (name, size) = match raw.split_once("::") {
                    Some((name, size)) => (name, parse_int(size)),
                    None => (*raw, None),
                };
                if let Some(size) = size {
                    // A size match is worth less than a tag-name match; a
                    // size mismatch clobbers the section.
                    active += if im.im_size() == size as u64 { 2 } else { -100 };
                }
                match tag {
                    Some(tag) if name.eq_ignore_ascii_case(tag) => active += 4,
                    _ if name.is_empty() => active += 1,
                    _ => active -= 100,
                }

                if active > matched {
                    // Best score so far: process this section.
                    matched = active;
                    im.reset_all_params();
                    d_layout = SimpleLayout::default();
                    t_layout = SimpleLayout::default();
                    nr_t = 0;
                } else {
                    active = 0;
                }
                continue;
            }
            ConfigToken::KeyValue(k, v) => (*k, *v),
        };

        if active == 0 {
            continue;
        }

        match key {
            "tracks" => {
                add_zone_layout(im, &t_layout, nr_t)?;
                if nr_t == 0 {
                    d_layout = t_layout.clone();
                }
                nr_t += 1;
                t_layout = d_layout.clone();
                apply_zone_selector(im, value, nr_t as u8);
            }
            "cyls" => im.geom.nr_cyls = parse_int(value).unwrap_or(0) as u16,
            "heads" => im.geom.nr_sides = parse_int(value).unwrap_or(0) as u8,
            "secs" => t_layout.nr_sectors = parse_int(value).unwrap_or(0) as u16,
            "step" => im.step = parse_int(value).unwrap_or(0) as u8,
            "bps" => {
                let sz = parse_int(value).unwrap_or(0);
                t_layout.no = (0..8u8).find(|no| 128u32 << no == sz).unwrap_or(8);
            }
            "id" => t_layout.base[0] = parse_int(value).unwrap_or(0) as u8,
            "h" => {
                t_layout.head = if value.starts_with('a') {
                    None
                } else {
                    Some((parse_int(value).unwrap_or(0) & 1) as u8)
                };
            }
            "mode" => t_layout.is_fm = value == "fm",
            "interleave" => t_layout.interleave = parse_int(value).unwrap_or(0) as u8,
            "cskew" => t_layout.cskew = parse_int(value).unwrap_or(0) as u8,
            "hskew" => t_layout.hskew = parse_int(value).unwrap_or(0) as u8,
            "rpm" => t_layout.rpm = parse_int(value).unwrap_or(0) as u16,
            "rate" => t_layout.data_rate = parse_int(value).unwrap_or(0) as u16,
            "gap2" => {
                t_layout.gap_2 = (!value.starts_with('a')).then(|| parse_int(value).unwrap_or(0) as u8)
            }
            "gap3" => {
                t_layout.gap_3 = (!value.starts_with('a')).then(|| parse_int(value).unwrap_or(0) as u8)
            }
            "gap4a" => {
                t_layout.gap_4a =
                    (!value.starts_with('a')).then(|| parse_int(value).unwrap_or(0) as u8)
            }
            "iam" => t_layout.has_iam = value == "yes",
            "file-layout" => {
                for flag in value.split(',') {
                    if let Some(side) = flag.strip_prefix("reverse-side") {
                        let side = parse_int(side).unwrap_or(0);
                        im.layout |= FileLayout::reverse_side((side != 0) as u8);
                    } else if flag == "sequential" {
                        im.layout |= FileLayout::SEQUENTIAL;
                    } else if flag == "sides-swapped" {
                        im.layout |= FileLayout::SIDES_SWAPPED;
                    }
                }
            }
            _ => log::trace!("tag_open(): ignoring option {}={}", key, value),
        }
    }

    if active > 0 {
        add_zone_layout(im, &t_layout, nr_t)?;
        im.arena.finalise_track_map()?;
    }

    if matched > 0 {
        im.raw_open()?;
        Ok(true)
    } else {
        Ok(false)
    }
}

impl<'a> ConfigToken<'a> {
    /// Convenience tokenizer for a whole sidecar file, mainly for tests and
    /// simple front ends; real front ends stream tokens from their own
    /// parser. Lines are `[section]` or `key=value`; `#` starts a comment.
    pub fn tokenize(text: &'a str) -> Vec<ConfigToken<'a>> {
        let mut tokens = Vec::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                tokens.push(ConfigToken::Section(section.trim()));
            } else if let Some((k, v)) = line.split_once('=') {
                tokens.push(ConfigToken::KeyValue(k.trim(), v.trim()));
            }
        }
        tokens
    }
}
