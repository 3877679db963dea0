// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Cascading style attributes.
//!
//! A [`Style`][] is a sparse set of attributes: every attribute is optional, and the effective
//! style at a document node is computed by combining the styles along the active context path.
//! Two combinators exist:
//!
//! - [`extend_with`][] prefers the *other* style's attributes and falls back to `self`,
//! - [`use_defaults_from`][] prefers `self` and falls back to the other style.
//!
//! [`Style::empty`][] is the canonical all-unset style.  Extending the empty style along a context
//! path yields the effective style; the accessors of a fully resolved style never fail.
//!
//! # Example
//!
//! ```
//! use quire::style::{Alignment, Style};
//! let base = Style::new().with_line_spacing(1.2);
//! let node = Style::new().with_alignment(Alignment::Center);
//! let effective = base.extend_with(node);
//! assert_eq!(effective.line_spacing(), 1.2);
//! assert_eq!(effective.alignment(), Alignment::Center);
//! ```
//!
//! [`Style`]: struct.Style.html
//! [`Style::empty`]: struct.Style.html#method.empty
//! [`extend_with`]: struct.Style.html#method.extend_with
//! [`use_defaults_from`]: struct.Style.html#method.use_defaults_from

use crate::fonts;
use crate::Mm;

/// A color, represented by RGB, CMYK or Greyscale values.
///
/// For all variants, the possible values range from 0 to 255.
///
/// # Examples
///
/// ```
/// let red = quire::style::Color::Rgb(255, 0, 0);
/// let cyan = quire::style::Color::Cmyk(255, 0, 0, 0);
/// let grey = quire::style::Color::Greyscale(127);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// An RGB color with red, green and blue values between 0 and 255.
    Rgb(u8, u8, u8),
    /// An CMYK color with cyan, magenta, yellow and key values between 0 and 255.
    Cmyk(u8, u8, u8, u8),
    /// A greyscale color with a value between 0 and 255.
    Greyscale(u8),
}

impl Color {
    /// Returns the black RGB color.
    pub fn black() -> Color {
        Color::Rgb(0, 0, 0)
    }
}

/// The style of a font within a family (regular, bold, italic or both).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FontStyle {
    /// The regular variant.
    Regular,
    /// The bold variant.
    Bold,
    /// The italic variant.
    Italic,
    /// The bold italic variant.
    BoldItalic,
}

impl Default for FontStyle {
    fn default() -> FontStyle {
        FontStyle::Regular
    }
}

/// The horizontal alignment of lines within a paragraph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Alignment {
    /// Left-flushed.
    Left,
    /// Centered.
    Center,
    /// Right-flushed.
    Right,
    /// Flush on both margins; inter-word space is stretched per line.
    Justified,
}

impl Default for Alignment {
    fn default() -> Alignment {
        Alignment::Left
    }
}

/// A sparse set of style attributes.
///
/// The attributes are:
/// - a font family, see [`FontFamily`][]
/// - a font style, see [`FontStyle`][]
/// - a font size (a length; `Mm::from_pt` converts from points)
/// - a root font size, the reference for `rem` lengths
/// - a line spacing factor, with 1 meaning single line spacing
/// - a sentence space stretch factor applied to sentence-ending spaces
/// - a paragraph spacing length inserted between block siblings
/// - a horizontal [`Alignment`][]
/// - an outline [`Color`][]
/// - a smart quotes switch
///
/// All attributes are optional.  The plain accessors panic when the attribute is unset; they are
/// meant to be used on effective styles only, which the layout engine always resolves fully before
/// reading.
///
/// [`FontFamily`]: ../fonts/struct.FontFamily.html
/// [`FontStyle`]: enum.FontStyle.html
/// [`Alignment`]: enum.Alignment.html
/// [`Color`]: enum.Color.html
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Style {
    font_family: Option<fonts::FontFamily<fonts::Font>>,
    font_style: Option<FontStyle>,
    font_size: Option<Mm>,
    root_font_size: Option<Mm>,
    line_spacing: Option<f64>,
    sentence_space_stretch: Option<f64>,
    paragraph_spacing: Option<Mm>,
    alignment: Option<Alignment>,
    color: Option<Color>,
    smart_quotes: Option<bool>,
}

macro_rules! accessor {
    ($(#[$doc:meta])* $field:ident: $ty:ty, $has:ident) => {
        $(#[$doc])*
        ///
        /// # Panics
        ///
        /// Panics if the attribute is unset.
        pub fn $field(&self) -> $ty {
            match self.$field {
                Some(value) => value,
                None => panic!(concat!("accessed unset style attribute ", stringify!($field))),
            }
        }

        /// Returns whether the attribute is set.
        pub fn $has(&self) -> bool {
            self.$field.is_some()
        }
    };
}

macro_rules! setter {
    ($(#[$doc:meta])* $field:ident: $ty:ty, $set:ident, $with:ident) => {
        $(#[$doc])*
        pub fn $set(&mut self, value: impl Into<Option<$ty>>) {
            if let Some(value) = value.into() {
                self.$field = Some(value);
            }
        }

        $(#[$doc])*
        #[must_use]
        pub fn $with(mut self, value: impl Into<Option<$ty>>) -> Style {
            self.$set(value);
            self
        }
    };
}

impl Style {
    /// Creates a new style without any attributes set.
    pub fn new() -> Style {
        Style::default()
    }

    /// Returns the canonical all-unset style.
    pub fn empty() -> Style {
        Style::default()
    }

    accessor!(
        /// Returns the font family.
        font_family: fonts::FontFamily<fonts::Font>, has_font_family
    );
    accessor!(
        /// Returns the font style.
        font_style: FontStyle, has_font_style
    );
    accessor!(
        /// Returns the font size.
        font_size: Mm, has_font_size
    );
    accessor!(
        /// Returns the root font size, the reference length for `rem` units.
        root_font_size: Mm, has_root_font_size
    );
    accessor!(
        /// Returns the line spacing factor.
        line_spacing: f64, has_line_spacing
    );
    accessor!(
        /// Returns the stretch factor for sentence-ending spaces.
        sentence_space_stretch: f64, has_sentence_space_stretch
    );
    accessor!(
        /// Returns the spacing between sibling blocks in a vertical container.
        paragraph_spacing: Mm, has_paragraph_spacing
    );
    accessor!(
        /// Returns the horizontal alignment.
        alignment: Alignment, has_alignment
    );
    accessor!(
        /// Returns the outline color.
        color: Color, has_color
    );
    accessor!(
        /// Returns whether smart quote replacement is enabled.
        smart_quotes: bool, has_smart_quotes
    );

    setter!(
        /// Sets the font family.
        font_family: fonts::FontFamily<fonts::Font>, set_font_family, with_font_family
    );
    setter!(
        /// Sets the font style.
        font_style: FontStyle, set_font_style, with_font_style
    );
    setter!(
        /// Sets the font size.
        font_size: Mm, set_font_size, with_font_size
    );
    setter!(
        /// Sets the root font size.
        root_font_size: Mm, set_root_font_size, with_root_font_size
    );
    setter!(
        /// Sets the line spacing factor.
        line_spacing: f64, set_line_spacing, with_line_spacing
    );
    setter!(
        /// Sets the stretch factor for sentence-ending spaces.
        sentence_space_stretch: f64, set_sentence_space_stretch, with_sentence_space_stretch
    );
    setter!(
        /// Sets the spacing between sibling blocks in a vertical container.
        paragraph_spacing: Mm, set_paragraph_spacing, with_paragraph_spacing
    );
    setter!(
        /// Sets the horizontal alignment.
        alignment: Alignment, set_alignment, with_alignment
    );
    setter!(
        /// Sets the outline color.
        color: Color, set_color, with_color
    );
    setter!(
        /// Enables or disables smart quote replacement.
        smart_quotes: bool, set_smart_quotes, with_smart_quotes
    );

    /// Combines this style with `main`, preferring `main`'s attributes and falling back to the
    /// attributes of `self`.
    #[must_use]
    pub fn extend_with(self, main: Style) -> Style {
        Style {
            font_family: main.font_family.or(self.font_family),
            font_style: main.font_style.or(self.font_style),
            font_size: main.font_size.or(self.font_size),
            root_font_size: main.root_font_size.or(self.root_font_size),
            line_spacing: main.line_spacing.or(self.line_spacing),
            sentence_space_stretch: main.sentence_space_stretch.or(self.sentence_space_stretch),
            paragraph_spacing: main.paragraph_spacing.or(self.paragraph_spacing),
            alignment: main.alignment.or(self.alignment),
            color: main.color.or(self.color),
            smart_quotes: main.smart_quotes.or(self.smart_quotes),
        }
    }

    /// Fills the unset attributes of this style from `fallback`.
    ///
    /// This is the converse of [`extend_with`](#method.extend_with): the attributes of `self`
    /// win.
    #[must_use]
    pub fn use_defaults_from(self, fallback: Style) -> Style {
        fallback.extend_with(self)
    }

    /// Returns the font selected by this style's family and font style.
    ///
    /// # Panics
    ///
    /// Panics if the font family or the font style is unset.
    pub fn font(&self) -> fonts::Font {
        self.font_family().get(self.font_style())
    }

    /// Calculates the width of the given string with this style using the data in the given font
    /// cache.
    ///
    /// If the font family is set, it must have been created by the given [`FontCache`][].
    ///
    /// [`FontCache`]: ../fonts/struct.FontCache.html
    pub fn str_width(&self, font_cache: &fonts::FontCache, s: &str) -> Mm {
        self.font().word_width(font_cache, s, self.font_size())
    }
}

/// A string annotated with a [`Style`](struct.Style.html).
#[derive(Clone, Debug, Default)]
pub struct StyledString {
    /// The annotated string.
    pub s: String,
    /// The style annotation.
    pub style: Style,
}

impl StyledString {
    /// Creates a new styled string from the given string and style.
    pub fn new(s: impl Into<String>, style: impl Into<Style>) -> StyledString {
        StyledString {
            s: s.into(),
            style: style.into(),
        }
    }
}

impl From<String> for StyledString {
    fn from(s: String) -> StyledString {
        StyledString::new(s, Style::new())
    }
}

impl<'a> From<&'a str> for StyledString {
    fn from(s: &'a str) -> StyledString {
        StyledString::new(s, Style::new())
    }
}

impl From<Color> for Style {
    fn from(color: Color) -> Style {
        Style::new().with_color(color)
    }
}

impl From<FontStyle> for Style {
    fn from(font_style: FontStyle) -> Style {
        Style::new().with_font_style(font_style)
    }
}

impl From<Alignment> for Style {
    fn from(alignment: Alignment) -> Style {
        Style::new().with_alignment(alignment)
    }
}

impl From<fonts::FontFamily<fonts::Font>> for Style {
    fn from(font_family: fonts::FontFamily<fonts::Font>) -> Style {
        Style::new().with_font_family(font_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_a() -> Style {
        Style::new()
            .with_font_size(Mm(4.0))
            .with_line_spacing(1.5)
            .with_alignment(Alignment::Right)
    }

    fn sample_b() -> Style {
        Style::new()
            .with_font_size(Mm(6.0))
            .with_color(Color::Rgb(10, 20, 30))
    }

    #[test]
    fn extend_prefers_main() {
        let style = sample_a().extend_with(sample_b());
        assert_eq!(style.font_size(), Mm(6.0));
        assert_eq!(style.line_spacing(), 1.5);
        assert_eq!(style.alignment(), Alignment::Right);
        assert_eq!(style.color(), Color::Rgb(10, 20, 30));
    }

    #[test]
    fn use_defaults_prefers_self() {
        let style = sample_b().use_defaults_from(sample_a());
        assert_eq!(style.font_size(), Mm(6.0));
        assert_eq!(style.line_spacing(), 1.5);
    }

    #[test]
    fn extension_is_associative() {
        // empty.extend(a).extend(b) == empty.extend(a.extend(b))
        let lhs = Style::empty().extend_with(sample_a()).extend_with(sample_b());
        let rhs = Style::empty().extend_with(sample_a().extend_with(sample_b()));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn empty_is_identity() {
        let style = sample_a();
        assert_eq!(style.extend_with(Style::empty()), style);
        assert_eq!(Style::empty().extend_with(style), style);
    }

    #[test]
    #[should_panic(expected = "accessed unset style attribute font_size")]
    fn unset_accessor_panics() {
        let _ = Style::empty().font_size();
    }
}
