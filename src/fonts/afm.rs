// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The built-in PDF fonts, backed by embedded AFM metrics.
//!
//! PDF viewers provide 14 standard fonts that don't have to be embedded into a file.  This module
//! carries their metrics as zlib-compressed AFM files (under `data/afm/`) and parses them into
//! [`AfmFont`][], an implementation of [`FontSource`][].
//!
//! In an AFM font the glyph ids are the AdobeStandardEncoding character codes, so `units_per_em`
//! is always 1000 and text printed with one-byte codes needs no explicit encoding dictionary.
//!
//! [`AfmFont`]: struct.AfmFont.html
//! [`FontSource`]: ../trait.FontSource.html

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;

use crate::error::{Context as _, Error, ErrorKind};
use crate::fonts::{FontMetrics, FontSource, GlyphId, GlyphMetrics, Substitution};

/// One of the 14 built-in PDF fonts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(missing_docs)]
pub enum BuiltinFont {
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Symbol,
    ZapfDingbats,
}

impl BuiltinFont {
    /// Returns the compressed AFM data for this font.
    fn compressed_afm(self) -> &'static [u8] {
        match self {
            BuiltinFont::Courier => include_bytes!("../../data/afm/courier.afm.z"),
            BuiltinFont::CourierBold => include_bytes!("../../data/afm/courier_bold.afm.z"),
            BuiltinFont::CourierOblique => include_bytes!("../../data/afm/courier_oblique.afm.z"),
            BuiltinFont::CourierBoldOblique => {
                include_bytes!("../../data/afm/courier_bold_oblique.afm.z")
            }
            BuiltinFont::Helvetica => include_bytes!("../../data/afm/helvetica.afm.z"),
            BuiltinFont::HelveticaBold => include_bytes!("../../data/afm/helvetica_bold.afm.z"),
            BuiltinFont::HelveticaOblique => {
                include_bytes!("../../data/afm/helvetica_oblique.afm.z")
            }
            BuiltinFont::HelveticaBoldOblique => {
                include_bytes!("../../data/afm/helvetica_bold_oblique.afm.z")
            }
            BuiltinFont::TimesRoman => include_bytes!("../../data/afm/times_roman.afm.z"),
            BuiltinFont::TimesBold => include_bytes!("../../data/afm/times_bold.afm.z"),
            BuiltinFont::TimesItalic => include_bytes!("../../data/afm/times_italic.afm.z"),
            BuiltinFont::TimesBoldItalic => {
                include_bytes!("../../data/afm/times_bold_italic.afm.z")
            }
            BuiltinFont::Symbol => include_bytes!("../../data/afm/symbol.afm.z"),
            BuiltinFont::ZapfDingbats => include_bytes!("../../data/afm/zapf_dingbats.afm.z"),
        }
    }
}

/// A built-in PDF font parsed from AFM metrics.
///
/// See the [module documentation](index.html) for details.
pub struct AfmFont {
    name: String,
    metrics: FontMetrics,
    glyphs: HashMap<GlyphId, GlyphMetrics>,
    cmap: HashMap<char, GlyphId>,
    reverse: HashMap<GlyphId, char>,
    kerning_pairs: HashMap<(GlyphId, GlyphId), f64>,
    ligatures: HashMap<(GlyphId, GlyphId), GlyphId>,
    last_glyph: GlyphId,
    missing: RefCell<HashSet<char>>,
}

impl AfmFont {
    /// Loads one of the built-in fonts from its embedded, compressed AFM data.
    pub fn builtin(font: BuiltinFont) -> Result<AfmFont, Error> {
        let mut decoder = flate2::read::ZlibDecoder::new(font.compressed_afm());
        let mut contents = String::new();
        decoder
            .read_to_string(&mut contents)
            .context("Failed to decompress built-in font metrics")?;
        AfmFont::parse(&contents)
    }

    /// Parses a font from the contents of an AFM file.
    pub fn parse(contents: &str) -> Result<AfmFont, Error> {
        let mut lines = contents.lines().map(str::trim);
        if !lines
            .next()
            .map(|line| line.starts_with("StartFontMetrics"))
            .unwrap_or(false)
        {
            return Err(Error::new("malformed AFM file", ErrorKind::InvalidFont));
        }

        let mut font = AfmFont {
            name: String::new(),
            metrics: FontMetrics {
                units_per_em: 1000.0,
                ..FontMetrics::default()
            },
            glyphs: HashMap::new(),
            cmap: HashMap::new(),
            reverse: HashMap::new(),
            kerning_pairs: HashMap::new(),
            ligatures: HashMap::new(),
            last_glyph: GlyphId(0),
            missing: RefCell::new(HashSet::new()),
        };

        let mut name_to_glyph: HashMap<String, GlyphId> = HashMap::new();
        // ligatures may reference glyph names that are defined later in the file
        let mut pending_ligatures: Vec<(GlyphId, String, String)> = Vec::new();
        let mut pending_kerns: Vec<(String, String, f64)> = Vec::new();
        let mut in_char_metrics = false;
        let mut in_kern_pairs = false;

        for line in lines {
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = value_for_key(line, "C") {
                if in_char_metrics {
                    font.parse_char_metrics(rest, &mut name_to_glyph, &mut pending_ligatures)?;
                    continue;
                }
            }
            if let Some(rest) = value_for_key(line, "KPX") {
                if in_kern_pairs {
                    let mut parts = rest.split_whitespace();
                    let left = parts.next().unwrap_or("").to_owned();
                    let right = parts.next().unwrap_or("").to_owned();
                    let value = parse_number(parts.next().unwrap_or("0"))?;
                    pending_kerns.push((left, right, value));
                    continue;
                }
            }

            if let Some(value) = value_for_key(line, "FontName") {
                font.name = value.to_owned();
            } else if let Some(value) = value_for_key(line, "FontBBox") {
                font.metrics.bbox = parse_bbox(value)?;
            } else if let Some(value) = value_for_key(line, "ItalicAngle") {
                font.metrics.italic_angle = parse_number(value)?;
            } else if let Some(value) = value_for_key(line, "IsFixedPitch") {
                font.metrics.is_fixed_pitch = value == "true";
            } else if let Some(value) = value_for_key(line, "CapHeight") {
                font.metrics.cap_height = parse_number(value)?;
            } else if let Some(value) = value_for_key(line, "XHeight") {
                font.metrics.x_height = parse_number(value)?;
            } else if let Some(value) = value_for_key(line, "Ascender") {
                font.metrics.typo_ascent = parse_number(value)?;
                font.metrics.hhea_ascent = font.metrics.typo_ascent;
            } else if let Some(value) = value_for_key(line, "Descender") {
                font.metrics.typo_descent = parse_number(value)?;
                font.metrics.hhea_descent = font.metrics.typo_descent;
            } else if let Some(value) = value_for_key(line, "StdVW") {
                font.metrics.stem_v = parse_number(value)?;
            } else if value_for_key(line, "StartCharMetrics").is_some() {
                in_char_metrics = true;
            } else if line == "EndCharMetrics" {
                in_char_metrics = false;
            } else if value_for_key(line, "StartKernPairs").is_some() {
                in_kern_pairs = true;
            } else if line == "EndKernPairs" {
                in_kern_pairs = false;
            }
        }

        for (left, right, value) in pending_kerns {
            if let (Some(&l), Some(&r)) = (name_to_glyph.get(&left), name_to_glyph.get(&right)) {
                font.kerning_pairs.insert((l, r), value);
            }
        }
        for (first, second_name, ligature_name) in pending_ligatures {
            if let (Some(&second), Some(&ligature)) = (
                name_to_glyph.get(&second_name),
                name_to_glyph.get(&ligature_name),
            ) {
                font.ligatures.insert((first, second), ligature);
            }
        }

        if font.name.is_empty() {
            return Err(Error::new("AFM file has no FontName", ErrorKind::InvalidFont));
        }
        Ok(font)
    }

    fn parse_char_metrics(
        &mut self,
        rest: &str,
        name_to_glyph: &mut HashMap<String, GlyphId>,
        pending_ligatures: &mut Vec<(GlyphId, String, String)>,
    ) -> Result<(), Error> {
        let mut parts = rest.split(';').map(str::trim);
        let code: i32 = parts
            .next()
            .unwrap_or("")
            .parse()
            .ok()
            .ok_or_else(|| Error::new("malformed char metrics", ErrorKind::InvalidFont))?;
        // unencoded glyphs are not addressable in this font
        if code < 0 {
            return Ok(());
        }
        let glyph = GlyphId(code as u16);

        let mut metrics = GlyphMetrics::default();
        let mut glyph_name = String::new();
        for part in parts {
            if let Some(value) = value_for_key(part, "WX") {
                metrics.horz_advance = parse_number(value)?;
            } else if let Some(value) = value_for_key(part, "WY") {
                metrics.vert_advance = parse_number(value)?;
            } else if let Some(value) = value_for_key(part, "N") {
                glyph_name = value.to_owned();
            } else if let Some(value) = value_for_key(part, "B") {
                metrics.bbox = parse_bbox(value)?;
            } else if let Some(value) = value_for_key(part, "L") {
                let mut names = value.split_whitespace();
                let second = names.next().unwrap_or("").to_owned();
                let ligature = names.next().unwrap_or("").to_owned();
                pending_ligatures.push((glyph, second, ligature));
            }
        }

        if glyph_name.is_empty() {
            return Err(Error::new("glyph without a name", ErrorKind::InvalidFont));
        }
        if let Some(c) = glyph_name_to_char(&glyph_name) {
            self.cmap.insert(c, glyph);
            self.reverse.insert(glyph, c);
        }
        self.glyphs.insert(glyph, metrics);
        self.last_glyph = self.last_glyph.max(glyph);
        name_to_glyph.insert(glyph_name, glyph);
        Ok(())
    }
}

impl FontSource for AfmFont {
    fn postscript_name(&self) -> &str {
        &self.name
    }

    fn char_to_glyph(&self, c: char) -> GlyphId {
        match self.cmap.get(&c) {
            Some(&glyph) => glyph,
            None => {
                if self.missing.borrow_mut().insert(c) {
                    log::warn!("font {}: no glyph for U+{:04X}", self.name, c as u32);
                }
                GlyphId(0)
            }
        }
    }

    fn glyph_to_char(&self, glyph: GlyphId) -> Option<char> {
        self.reverse.get(&glyph).copied()
    }

    fn glyph_metrics(&self, glyph: GlyphId) -> GlyphMetrics {
        self.glyphs.get(&glyph).copied().unwrap_or_default()
    }

    fn font_metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    fn substitute(&self, glyphs: &[GlyphId]) -> Option<Substitution> {
        if glyphs.len() < 2 || self.ligatures.is_empty() {
            return None;
        }

        let mut substitution = Substitution::default();
        let mut changed = false;
        let mut i = 0;
        while i < glyphs.len() {
            if i + 1 < glyphs.len() {
                if let Some(&ligature) = self.ligatures.get(&(glyphs[i], glyphs[i + 1])) {
                    substitution
                        .contractions
                        .push((substitution.glyphs.len(), 2));
                    substitution.glyphs.push(ligature);
                    changed = true;
                    i += 2;
                    continue;
                }
            }
            substitution.glyphs.push(glyphs[i]);
            i += 1;
        }

        if changed {
            Some(substitution)
        } else {
            None
        }
    }

    fn kerning(&self, glyphs: &[GlyphId]) -> BTreeMap<usize, f64> {
        let mut kerns = BTreeMap::new();
        if glyphs.len() < 2 || self.kerning_pairs.is_empty() {
            return kerns;
        }
        for i in 0..glyphs.len() - 1 {
            if let Some(&value) = self.kerning_pairs.get(&(glyphs[i], glyphs[i + 1])) {
                kerns.insert(i, value);
            }
        }
        kerns
    }

    fn font_program(&self) -> Option<&[u8]> {
        None
    }

    fn glyph_count(&self) -> u32 {
        u32::from(self.last_glyph.0) + 1
    }
}

fn value_for_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    if rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_number(value: &str) -> Result<f64, Error> {
    value
        .trim()
        .parse()
        .ok()
        .ok_or_else(|| Error::new(format!("invalid number '{}' in AFM file", value), ErrorKind::InvalidFont))
}

fn parse_bbox(value: &str) -> Result<[f64; 4], Error> {
    let mut parts = value.split_whitespace();
    let mut bbox = [0.0; 4];
    for entry in &mut bbox {
        *entry = parse_number(parts.next().unwrap_or("0"))?;
    }
    Ok(bbox)
}

/// Maps an Adobe glyph name to the character it represents.
///
/// This covers the glyph complement of the AdobeStandardEncoding code range used by the built-in
/// fonts; unknown names yield `None` and the glyph stays unaddressable.
fn glyph_name_to_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }
    let c = match name {
        "space" => '\u{0020}',
        "exclam" => '\u{0021}',
        "quotedbl" => '\u{0022}',
        "numbersign" => '\u{0023}',
        "dollar" => '\u{0024}',
        "percent" => '\u{0025}',
        "ampersand" => '\u{0026}',
        "quoteright" => '\u{2019}',
        "parenleft" => '\u{0028}',
        "parenright" => '\u{0029}',
        "asterisk" => '\u{002A}',
        "plus" => '\u{002B}',
        "comma" => '\u{002C}',
        "hyphen" => '\u{002D}',
        "period" => '\u{002E}',
        "slash" => '\u{002F}',
        "zero" => '\u{0030}',
        "one" => '\u{0031}',
        "two" => '\u{0032}',
        "three" => '\u{0033}',
        "four" => '\u{0034}',
        "five" => '\u{0035}',
        "six" => '\u{0036}',
        "seven" => '\u{0037}',
        "eight" => '\u{0038}',
        "nine" => '\u{0039}',
        "colon" => '\u{003A}',
        "semicolon" => '\u{003B}',
        "less" => '\u{003C}',
        "equal" => '\u{003D}',
        "greater" => '\u{003E}',
        "question" => '\u{003F}',
        "at" => '\u{0040}',
        "bracketleft" => '\u{005B}',
        "backslash" => '\u{005C}',
        "bracketright" => '\u{005D}',
        "asciicircum" => '\u{005E}',
        "underscore" => '\u{005F}',
        "quoteleft" => '\u{2018}',
        "braceleft" => '\u{007B}',
        "bar" => '\u{007C}',
        "braceright" => '\u{007D}',
        "asciitilde" => '\u{007E}',
        "exclamdown" => '\u{00A1}',
        "cent" => '\u{00A2}',
        "sterling" => '\u{00A3}',
        "fraction" => '\u{2044}',
        "yen" => '\u{00A5}',
        "florin" => '\u{0192}',
        "section" => '\u{00A7}',
        "currency" => '\u{00A4}',
        "quotesingle" => '\u{0027}',
        "quotedblleft" => '\u{201C}',
        "guillemotleft" => '\u{00AB}',
        "guilsinglleft" => '\u{2039}',
        "guilsinglright" => '\u{203A}',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        "endash" => '\u{2013}',
        "dagger" => '\u{2020}',
        "daggerdbl" => '\u{2021}',
        "periodcentered" => '\u{00B7}',
        "paragraph" => '\u{00B6}',
        "bullet" => '\u{2022}',
        "quotesinglbase" => '\u{201A}',
        "quotedblbase" => '\u{201E}',
        "quotedblright" => '\u{201D}',
        "guillemotright" => '\u{00BB}',
        "ellipsis" => '\u{2026}',
        "perthousand" => '\u{2030}',
        "questiondown" => '\u{00BF}',
        "grave" => '\u{0060}',
        "acute" => '\u{00B4}',
        "circumflex" => '\u{02C6}',
        "tilde" => '\u{02DC}',
        "macron" => '\u{00AF}',
        "breve" => '\u{02D8}',
        "dotaccent" => '\u{02D9}',
        "dieresis" => '\u{00A8}',
        "ring" => '\u{02DA}',
        "cedilla" => '\u{00B8}',
        "hungarumlaut" => '\u{02DD}',
        "ogonek" => '\u{02DB}',
        "caron" => '\u{02C7}',
        "emdash" => '\u{2014}',
        "AE" => '\u{00C6}',
        "ordfeminine" => '\u{00AA}',
        "Lslash" => '\u{0141}',
        "Oslash" => '\u{00D8}',
        "OE" => '\u{0152}',
        "ordmasculine" => '\u{00BA}',
        "ae" => '\u{00E6}',
        "dotlessi" => '\u{0131}',
        "lslash" => '\u{0142}',
        "oslash" => '\u{00F8}',
        "oe" => '\u{0153}',
        "germandbls" => '\u{00DF}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_parse() {
        let fonts = [
            BuiltinFont::Courier,
            BuiltinFont::CourierBold,
            BuiltinFont::CourierOblique,
            BuiltinFont::CourierBoldOblique,
            BuiltinFont::Helvetica,
            BuiltinFont::HelveticaBold,
            BuiltinFont::HelveticaOblique,
            BuiltinFont::HelveticaBoldOblique,
            BuiltinFont::TimesRoman,
            BuiltinFont::TimesBold,
            BuiltinFont::TimesItalic,
            BuiltinFont::TimesBoldItalic,
            BuiltinFont::Symbol,
            BuiltinFont::ZapfDingbats,
        ];
        for font in &fonts {
            let font = AfmFont::builtin(*font).unwrap();
            assert_eq!(font.font_metrics().units_per_em, 1000.0);
        }
    }

    #[test]
    fn courier_metrics() {
        let font = AfmFont::builtin(BuiltinFont::Courier).unwrap();
        assert_eq!(font.postscript_name(), "Courier");
        assert_eq!(font.char_to_glyph('A'), GlyphId(65));
        assert_eq!(font.glyph_metrics(GlyphId(65)).horz_advance, 600.0);
        assert!(font.font_metrics().is_fixed_pitch);
        assert!(font.kerning(&[GlyphId(65), GlyphId(86)]).is_empty());
    }

    #[test]
    fn unmapped_characters_use_glyph_zero() {
        let font = AfmFont::builtin(BuiltinFont::Courier).unwrap();
        assert_eq!(font.char_to_glyph('☃'), GlyphId(0));
        assert_eq!(font.glyph_metrics(GlyphId(0)).horz_advance, 0.0);
    }

    #[test]
    fn times_kerning_pairs() {
        let font = AfmFont::builtin(BuiltinFont::TimesRoman).unwrap();
        let a = font.char_to_glyph('A');
        let v = font.char_to_glyph('V');
        let kerns = font.kerning(&[a, v]);
        assert_eq!(kerns.get(&0), Some(&-135.0));
    }

    #[test]
    fn latin_ligatures() {
        let font = AfmFont::builtin(BuiltinFont::TimesRoman).unwrap();
        let glyphs: Vec<GlyphId> = "fill".chars().map(|c| font.char_to_glyph(c)).collect();
        let substitution = font.substitute(&glyphs).unwrap();
        assert_eq!(substitution.glyphs.len(), 3);
        assert_eq!(substitution.contractions, vec![(0, 2)]);
        assert_eq!(font.glyph_to_char(substitution.glyphs[0]), Some('\u{FB01}'));
    }

    #[test]
    fn smart_quote_glyphs_are_mapped() {
        let font = AfmFont::builtin(BuiltinFont::TimesRoman).unwrap();
        for c in &['\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'] {
            assert_ne!(font.char_to_glyph(*c), GlyphId(0));
        }
    }
}
