// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Embedded TrueType fonts, backed by `rusttype`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Context as _, Error, ErrorKind};
use crate::fonts::{FontMetrics, FontSource, GlyphId, GlyphMetrics, Substitution};

/// A TrueType font loaded from raw font data.
///
/// The font program is embedded into the PDF file as a composite (Type0) font.  Metrics and pair
/// kerning come from [`rusttype`](https://docs.rs/rusttype); ligature substitution is not
/// available for this source.
pub struct TtfFont {
    font: rusttype::Font<'static>,
    data: Vec<u8>,
    name: String,
    metrics: FontMetrics,
    // rusttype scales relative to the glyph height, so this scale yields font units
    scale: rusttype::Scale,
    reverse: RefCell<Option<HashMap<GlyphId, char>>>,
    missing: RefCell<HashSet<char>>,
}

impl TtfFont {
    /// Loads a font from the given TrueType data.
    pub fn new(data: Vec<u8>) -> Result<TtfFont, Error> {
        let font =
            rusttype::Font::from_bytes(data.clone()).context("Failed to read rusttype font")?;
        let units_per_em = font.units_per_em();
        if units_per_em == 0 {
            return Err(Error::new(
                "The font is not scalable",
                ErrorKind::InvalidFont,
            ));
        }
        let units_per_em = f64::from(units_per_em);

        let v_metrics = font.v_metrics_unscaled();
        let ascent = f64::from(v_metrics.ascent);
        let descent = f64::from(v_metrics.descent);
        let scale = rusttype::Scale::uniform(v_metrics.ascent - v_metrics.descent);

        let name = postscript_name(&data).unwrap_or_else(|| "Unknown".to_owned());

        let metrics = FontMetrics {
            units_per_em,
            hhea_ascent: ascent,
            hhea_descent: descent,
            typo_ascent: ascent,
            typo_descent: descent,
            cap_height: 0.7 * units_per_em,
            x_height: 0.5 * units_per_em,
            italic_angle: 0.0,
            bbox: [0.0, descent, units_per_em, ascent],
            stem_v: 80.0,
            is_fixed_pitch: false,
        };

        Ok(TtfFont {
            font,
            data,
            name,
            metrics,
            scale,
            reverse: RefCell::new(None),
            missing: RefCell::new(HashSet::new()),
        })
    }
}

impl FontSource for TtfFont {
    fn postscript_name(&self) -> &str {
        &self.name
    }

    fn char_to_glyph(&self, c: char) -> GlyphId {
        let glyph = GlyphId(self.font.glyph(c).id().0 as u16);
        if glyph == GlyphId(0) && self.missing.borrow_mut().insert(c) {
            log::warn!("font {}: no glyph for U+{:04X}", self.name, c as u32);
        }
        glyph
    }

    fn glyph_to_char(&self, glyph: GlyphId) -> Option<char> {
        let mut reverse = self.reverse.borrow_mut();
        let map = reverse.get_or_insert_with(|| {
            let mut map = HashMap::new();
            for code in 0x20..=0xFFFFu32 {
                if let Some(c) = std::char::from_u32(code) {
                    let glyph = GlyphId(self.font.glyph(c).id().0 as u16);
                    if glyph != GlyphId(0) {
                        map.entry(glyph).or_insert(c);
                    }
                }
            }
            map
        });
        map.get(&glyph).copied()
    }

    fn glyph_metrics(&self, glyph: GlyphId) -> GlyphMetrics {
        let glyph = self
            .font
            .glyph(rusttype::GlyphId(u32::from(glyph.0)))
            .scaled(self.scale);
        let advance = f64::from(glyph.h_metrics().advance_width);
        let bbox = glyph
            .exact_bounding_box()
            .map(|bb| {
                [
                    f64::from(bb.min.x),
                    -f64::from(bb.max.y),
                    f64::from(bb.max.x),
                    -f64::from(bb.min.y),
                ]
            })
            .unwrap_or_default();
        GlyphMetrics {
            horz_advance: advance,
            vert_advance: 0.0,
            bbox,
        }
    }

    fn font_metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    fn substitute(&self, _glyphs: &[GlyphId]) -> Option<Substitution> {
        None
    }

    fn kerning(&self, glyphs: &[GlyphId]) -> BTreeMap<usize, f64> {
        let mut kerns = BTreeMap::new();
        for i in 0..glyphs.len().saturating_sub(1) {
            let kern = self.font.pair_kerning(
                self.scale,
                rusttype::GlyphId(u32::from(glyphs[i].0)),
                rusttype::GlyphId(u32::from(glyphs[i + 1].0)),
            );
            if kern != 0.0 {
                kerns.insert(i, f64::from(kern));
            }
        }
        kerns
    }

    fn font_program(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn glyph_count(&self) -> u32 {
        self.font.glyph_count() as u32
    }
}

/// Extracts the PostScript name (name table id 6) from raw TrueType data.
fn postscript_name(data: &[u8]) -> Option<String> {
    let u16_at = |offset: usize| -> Option<u16> {
        Some(u16::from(*data.get(offset)?) << 8 | u16::from(*data.get(offset + 1)?))
    };
    let u32_at = |offset: usize| -> Option<u32> {
        Some(
            u32::from(*data.get(offset)?) << 24
                | u32::from(*data.get(offset + 1)?) << 16
                | u32::from(*data.get(offset + 2)?) << 8
                | u32::from(*data.get(offset + 3)?),
        )
    };

    let num_tables = u16_at(4)?;
    let mut name_table = None;
    for i in 0..num_tables as usize {
        let record = 12 + 16 * i;
        if data.get(record..record + 4)? == b"name" {
            name_table = Some(u32_at(record + 8)? as usize);
            break;
        }
    }
    let name_table = name_table?;

    let count = u16_at(name_table + 2)? as usize;
    let string_offset = name_table + u16_at(name_table + 4)? as usize;
    for i in 0..count {
        let record = name_table + 6 + 12 * i;
        let name_id = u16_at(record + 6)?;
        if name_id != 6 {
            continue;
        }
        let platform = u16_at(record)?;
        let length = u16_at(record + 8)? as usize;
        let offset = string_offset + u16_at(record + 10)? as usize;
        let bytes = data.get(offset..offset + length)?;
        return match platform {
            // platform 3 (Windows) stores UTF-16BE
            3 => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from(pair[0]) << 8 | u16::from(pair[1]))
                    .collect();
                String::from_utf16(&units).ok()
            }
            _ => String::from_utf8(bytes.to_vec()).ok(),
        };
    }
    None
}
