// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Fonts, font families and a font cache.
//!
//! The layout engine measures and shapes text through the [`FontSource`][] trait: an
//! implementation maps characters to glyph ids, exposes per-glyph and per-font metrics in font
//! units, substitutes ligatures and yields pair-kerning adjustments.  Two implementations are
//! provided:
//!
//! - [`afm::AfmFont`][]: the 14 built-in PDF fonts, parsed from zlib-compressed AFM metrics
//!   embedded in this crate (see [`Builtin`][] and [`afm::BuiltinFont`][]),
//! - [`truetype::TtfFont`][]: an embedded TrueType font backed by [`rusttype`][].
//!
//! The [`FontCache`][] owns all loaded font sources.  A [`Font`][] is a cheap reference to a
//! cached font, and a [`FontFamily`][] groups the regular, bold, italic and bold italic variants
//! of a typeface.  Fonts are added to a document by loading a family into its cache; the
//! [`Style`][] struct then selects a family member via its font style attribute.
//!
//! **Note:**  [`Font`][] and [`FontFamily<Font>`][`FontFamily`] values are only valid for the
//! [`FontCache`][] they have been created with.
//!
//! [`FontSource`]: trait.FontSource.html
//! [`FontCache`]: struct.FontCache.html
//! [`Font`]: struct.Font.html
//! [`FontFamily`]: struct.FontFamily.html
//! [`Builtin`]: enum.Builtin.html
//! [`afm::AfmFont`]: afm/struct.AfmFont.html
//! [`afm::BuiltinFont`]: afm/enum.BuiltinFont.html
//! [`truetype::TtfFont`]: truetype/struct.TtfFont.html
//! [`Style`]: ../style/struct.Style.html
//! [`rusttype`]: https://docs.rs/rusttype

pub mod afm;
pub mod truetype;

use std::collections::BTreeMap;
use std::fmt;
use std::path;
use std::rc::Rc;

use crate::error::Error;
use crate::style::FontStyle;
use crate::Mm;

/// The id of a glyph within a font.
///
/// Glyph 0 is the undefined glyph; unmapped characters resolve to it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GlyphId(pub u16);

/// The metrics of a single glyph, in font units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphMetrics {
    /// The horizontal advance of the glyph.
    pub horz_advance: f64,
    /// The vertical advance of the glyph, if the font provides one.
    pub vert_advance: f64,
    /// The bounding box of the glyph as `[xmin, ymin, xmax, ymax]`.
    pub bbox: [f64; 4],
}

/// The font-wide metrics of a font source, in font units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FontMetrics {
    /// The number of font units per em.
    pub units_per_em: f64,
    /// The ascent from the `hhea`-style metrics.
    pub hhea_ascent: f64,
    /// The descent from the `hhea`-style metrics (negative below the baseline).
    pub hhea_descent: f64,
    /// The typographic ascent.
    pub typo_ascent: f64,
    /// The typographic descent (negative below the baseline).
    pub typo_descent: f64,
    /// The height of uppercase letters above the baseline.
    pub cap_height: f64,
    /// The height of lowercase letters without ascenders.
    pub x_height: f64,
    /// The italic angle in degrees, 0 for upright fonts.
    pub italic_angle: f64,
    /// The union of all glyph bounding boxes as `[xmin, ymin, xmax, ymax]`.
    pub bbox: [f64; 4],
    /// The dominant vertical stem width.
    pub stem_v: f64,
    /// Whether all glyphs share a single advance.
    pub is_fixed_pitch: bool,
}

impl FontMetrics {
    /// Returns the default line spacing, `max(units_per_em · 1.2, typo_ascent − typo_descent)`.
    pub fn default_line_spacing(&self) -> f64 {
        (self.units_per_em * 1.2).max(self.typo_ascent - self.typo_descent)
    }
}

/// The result of a glyph substitution pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    /// The substituted glyph sequence.
    pub glyphs: Vec<GlyphId>,
    /// For each entry `(index, count)`, the glyph at `index` of [`glyphs`](#structfield.glyphs)
    /// replaces `count` glyphs of the input sequence.
    pub contractions: Vec<(usize, usize)>,
}

/// A source of glyphs and metrics that the layout engine programs against.
///
/// All lengths are in font units; scale by `size / units_per_em` to convert to text space.
pub trait FontSource {
    /// Returns the PostScript name of the font.
    fn postscript_name(&self) -> &str;

    /// Maps a character to a glyph id.
    ///
    /// Returns glyph 0 for unmapped characters; implementations log one warning per distinct
    /// unmapped character.
    fn char_to_glyph(&self, c: char) -> GlyphId;

    /// Maps a glyph id back to the character it most commonly represents, if any.
    ///
    /// This drives the `/ToUnicode` mapping in the PDF output.
    fn glyph_to_char(&self, glyph: GlyphId) -> Option<char>;

    /// Returns the metrics of the given glyph.
    fn glyph_metrics(&self, glyph: GlyphId) -> GlyphMetrics;

    /// Returns the font-wide metrics.
    fn font_metrics(&self) -> &FontMetrics;

    /// Substitutes ligatures in the given glyph sequence.
    ///
    /// Returns `None` if no substitution applies.
    fn substitute(&self, glyphs: &[GlyphId]) -> Option<Substitution>;

    /// Returns pair-kerning adjustments for the given glyph sequence.
    ///
    /// The value at key *i* is added to the horizontal advance of glyph *i*.
    fn kerning(&self, glyphs: &[GlyphId]) -> BTreeMap<usize, f64>;

    /// Returns the raw font program for embedding, or `None` for built-in fonts.
    fn font_program(&self) -> Option<&[u8]>;

    /// Returns an upper bound on the glyph ids used by this font.
    fn glyph_count(&self) -> u32;
}

/// A glyph with its effective advance after substitution and kerning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    /// The glyph id.
    pub glyph: GlyphId,
    /// The advance in font units, including kerning.
    pub advance: f64,
}

/// A shaped run of text: glyphs with advances, in font units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapedText {
    /// The glyphs of the run in visual order.
    pub glyphs: Vec<ShapedGlyph>,
    /// The total advance of the run in font units.
    pub width: f64,
}

/// Stores the font data that can be referenced by a [`Font`][] or [`FontFamily`][].
///
/// [`Font`]: struct.Font.html
/// [`FontFamily`]: struct.FontFamily.html
#[derive(Debug)]
pub struct FontCache {
    fonts: Vec<Rc<dyn FontSource>>,
    default_font_family: Option<FontFamily<Font>>,
}

impl fmt::Debug for dyn FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontSource({})", self.postscript_name())
    }
}

impl FontCache {
    /// Creates a new font cache with the given default font family.
    pub fn new(default_font_family: FontFamily<FontData>) -> FontCache {
        let mut font_cache = FontCache {
            fonts: Vec::new(),
            default_font_family: None,
        };
        font_cache.default_font_family = Some(font_cache.add_font_family(default_font_family));
        font_cache
    }

    /// Adds the given font to the cache and returns a reference to it.
    pub fn add_font(&mut self, font_data: FontData) -> Font {
        let font = Font {
            idx: self.fonts.len(),
        };
        self.fonts.push(font_data.source);
        font
    }

    /// Adds the given font family to the cache and returns a reference to it.
    pub fn add_font_family(&mut self, family: FontFamily<FontData>) -> FontFamily<Font> {
        FontFamily {
            regular: self.add_font(family.regular),
            bold: self.add_font(family.bold),
            italic: self.add_font(family.italic),
            bold_italic: self.add_font(family.bold_italic),
        }
    }

    /// Returns the default font family for this font cache.
    pub fn default_font_family(&self) -> FontFamily<Font> {
        self.default_font_family
            .expect("Invariant violated: no default font family for FontCache")
    }

    /// Returns the font source for the given font.
    ///
    /// This method may only be called with [`Font`][] instances that have been created by this
    /// font cache.
    ///
    /// [`Font`]: struct.Font.html
    pub fn source(&self, font: Font) -> &Rc<dyn FontSource> {
        &self.fonts[font.idx]
    }

    /// Returns the number of fonts in this cache.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Returns whether this cache contains no fonts.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// The data for a font that can be added to a [`FontCache`](struct.FontCache.html).
#[derive(Clone)]
pub struct FontData {
    source: Rc<dyn FontSource>,
}

impl FontData {
    /// Creates font data from TrueType font bytes.
    ///
    /// The provided data must be readable by [`rusttype`](https://docs.rs/rusttype).
    pub fn new(data: Vec<u8>) -> Result<FontData, Error> {
        Ok(FontData {
            source: Rc::new(truetype::TtfFont::new(data)?),
        })
    }

    /// Creates font data for one of the built-in PDF fonts.
    pub fn builtin(builtin: afm::BuiltinFont) -> Result<FontData, Error> {
        Ok(FontData {
            source: Rc::new(afm::AfmFont::builtin(builtin)?),
        })
    }

    /// Creates font data from any font source implementation.
    pub fn from_source(source: Rc<dyn FontSource>) -> FontData {
        FontData { source }
    }

    /// Loads the font file at the given path.
    pub fn load(path: impl AsRef<path::Path>) -> Result<FontData, Error> {
        use crate::error::Context as _;
        let data = std::fs::read(path.as_ref())
            .with_context(|| format!("Failed to open font file {}", path.as_ref().display()))?;
        FontData::new(data)
    }
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontData({})", self.source.postscript_name())
    }
}

/// One of the built-in PDF font families.
///
/// A PDF viewer supports three text font families that don't have to be embedded into the PDF
/// file: Times, Helvetica and Courier (plus the symbolic Symbol and ZapfDingbats fonts, see
/// [`afm::BuiltinFont`](afm/enum.BuiltinFont.html)).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Builtin {
    /// The Times font family.
    Times,
    /// The Helvetica font family.
    Helvetica,
    /// The Courier font family.
    Courier,
}

impl Builtin {
    fn variant(self, style: FontStyle) -> afm::BuiltinFont {
        use afm::BuiltinFont::*;
        match self {
            Builtin::Times => match style {
                FontStyle::Regular => TimesRoman,
                FontStyle::Bold => TimesBold,
                FontStyle::Italic => TimesItalic,
                FontStyle::BoldItalic => TimesBoldItalic,
            },
            Builtin::Helvetica => match style {
                FontStyle::Regular => Helvetica,
                FontStyle::Bold => HelveticaBold,
                FontStyle::Italic => HelveticaOblique,
                FontStyle::BoldItalic => HelveticaBoldOblique,
            },
            Builtin::Courier => match style {
                FontStyle::Regular => Courier,
                FontStyle::Bold => CourierBold,
                FontStyle::Italic => CourierOblique,
                FontStyle::BoldItalic => CourierBoldOblique,
            },
        }
    }
}

/// Loads a built-in font family.
pub fn builtin(family: Builtin) -> Result<FontFamily<FontData>, Error> {
    Ok(FontFamily {
        regular: FontData::builtin(family.variant(FontStyle::Regular))?,
        bold: FontData::builtin(family.variant(FontStyle::Bold))?,
        italic: FontData::builtin(family.variant(FontStyle::Italic))?,
        bold_italic: FontData::builtin(family.variant(FontStyle::BoldItalic))?,
    })
}

/// A collection of fonts with different styles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontFamily<T: Clone + fmt::Debug> {
    /// The regular variant of this font family.
    pub regular: T,
    /// The bold variant of this font family.
    pub bold: T,
    /// The italic variant of this font family.
    pub italic: T,
    /// The bold italic variant of this font family.
    pub bold_italic: T,
}

impl<T: Clone + fmt::Debug> FontFamily<T> {
    /// Returns the family member for the given font style.
    pub fn get(&self, style: FontStyle) -> T {
        match style {
            FontStyle::Regular => self.regular.clone(),
            FontStyle::Bold => self.bold.clone(),
            FontStyle::Italic => self.italic.clone(),
            FontStyle::BoldItalic => self.bold_italic.clone(),
        }
    }
}

/// A reference to a font cached by a [`FontCache`](struct.FontCache.html).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Font {
    idx: usize,
}

impl Font {
    /// Returns the font-wide metrics of this font.
    ///
    /// The given [`FontCache`][] must be the font cache that loaded this font.
    ///
    /// [`FontCache`]: struct.FontCache.html
    pub fn metrics<'c>(&self, font_cache: &'c FontCache) -> &'c FontMetrics {
        font_cache.source(*self).font_metrics()
    }

    /// Scales a metric in font units to a length, for the given font size.
    pub fn scale(&self, font_cache: &FontCache, units: f64, font_size: Mm) -> Mm {
        font_size * (units / self.metrics(font_cache).units_per_em)
    }

    /// Shapes the given text: characters are mapped to glyphs, ligatures are substituted and
    /// pair kerning is applied.
    ///
    /// The given [`FontCache`][] must be the font cache that loaded this font.
    ///
    /// [`FontCache`]: struct.FontCache.html
    pub fn shape(&self, font_cache: &FontCache, text: &str) -> ShapedText {
        let source = font_cache.source(*self);

        let mut glyphs: Vec<GlyphId> = text.chars().map(|c| source.char_to_glyph(c)).collect();
        if let Some(substitution) = source.substitute(&glyphs) {
            glyphs = substitution.glyphs;
        }

        let kerning = source.kerning(&glyphs);
        let mut shaped = ShapedText::default();
        for (i, &glyph) in glyphs.iter().enumerate() {
            let mut advance = source.glyph_metrics(glyph).horz_advance;
            if let Some(adjustment) = kerning.get(&i) {
                advance += adjustment;
            }
            shaped.width += advance;
            shaped.glyphs.push(ShapedGlyph { glyph, advance });
        }
        shaped
    }

    /// Returns the width of a string with this font and the given font size.
    ///
    /// The given [`FontCache`][] must be the font cache that loaded this font.
    ///
    /// [`FontCache`]: struct.FontCache.html
    pub fn word_width(&self, font_cache: &FontCache, text: &str, font_size: Mm) -> Mm {
        let shaped = self.shape(font_cache, text);
        self.scale(font_cache, shaped.width, font_size)
    }

    /// Returns the ascent of this font scaled to the given font size, as a positive length.
    pub fn ascent(&self, font_cache: &FontCache, font_size: Mm) -> Mm {
        let ascent = self.metrics(font_cache).hhea_ascent;
        self.scale(font_cache, ascent.abs(), font_size)
    }

    /// Returns the descent of this font scaled to the given font size, as a positive length.
    pub fn descent(&self, font_cache: &FontCache, font_size: Mm) -> Mm {
        let descent = self.metrics(font_cache).hhea_descent;
        self.scale(font_cache, descent.abs(), font_size)
    }
}

fn style_suffix(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "Regular",
        FontStyle::Bold => "Bold",
        FontStyle::Italic => "Italic",
        FontStyle::BoldItalic => "BoldItalic",
    }
}

/// Loads the font family at the given path with the given name.
///
/// This method assumes that at the given path, these files exist and are valid font files:
/// - `{name}-Regular.ttf`
/// - `{name}-Bold.ttf`
/// - `{name}-Italic.ttf`
/// - `{name}-BoldItalic.ttf`
pub fn from_files(
    dir: impl AsRef<path::Path>,
    name: &str,
) -> Result<FontFamily<FontData>, Error> {
    let dir = dir.as_ref();
    let load = |style| {
        FontData::load(dir.join(format!("{}-{}.ttf", name, style_suffix(style))))
    };
    Ok(FontFamily {
        regular: load(FontStyle::Regular)?,
        bold: load(FontStyle::Bold)?,
        italic: load(FontStyle::Italic)?,
        bold_italic: load(FontStyle::BoldItalic)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_family_resolves_styles() {
        let family = builtin(Builtin::Courier).unwrap();
        let mut cache = FontCache::new(family);
        let fonts = cache.default_font_family();
        assert_ne!(fonts.get(FontStyle::Regular), fonts.get(FontStyle::Bold));
        let helvetica = builtin(Builtin::Helvetica).unwrap();
        let helvetica = cache.add_font_family(helvetica);
        assert_eq!(
            cache
                .source(helvetica.get(FontStyle::Regular))
                .postscript_name(),
            "Helvetica"
        );
    }

    #[test]
    fn courier_is_fixed_pitch() {
        let cache = FontCache::new(builtin(Builtin::Courier).unwrap());
        let font = cache.default_font_family().regular;
        let metrics = font.metrics(&cache);
        assert_eq!(metrics.units_per_em, 1000.0);
        assert!(metrics.is_fixed_pitch);
        // every Courier glyph advances by 600/1000 em
        let width = font.word_width(&cache, "quire", Mm::from_pt(10.0));
        crate::assert_approx(width, Mm::from_pt(5.0 * 6.0));
    }
}
