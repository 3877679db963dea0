// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The text operator stream.
//!
//! A [`Text`][] object is a sequence of *groups*, where each group becomes one instance of the
//! `TJ` operator: an array of glyph strings and inter-glyph adjustments.  Everything that is not
//! glyph output — font changes, colour changes, positioning, baseline rises — closes the current
//! group, is attached as a command before the next one, and a fresh group starts.  Serialising
//! wraps the groups into `BT … ET`.
//!
//! [`Text`]: struct.Text.html

use std::fmt::Write as _;

use crate::style::Color;

use super::font::PdfFont;
use super::writer::fmt_real;
use crate::fonts::GlyphId;

#[derive(Debug, Default)]
struct Group {
    commands: Vec<String>,
    // the body of the TJ array: hex strings and adjustment numbers
    items: Vec<String>,
}

/// A sequence of positioned glyph runs on one page.
#[derive(Debug, Default)]
pub struct Text {
    groups: Vec<Group>,
    font_size: f64,
}

impl Text {
    /// Creates an empty text object.
    pub fn new() -> Text {
        Text {
            groups: vec![Group::default()],
            font_size: 0.0,
        }
    }

    fn current(&mut self) -> &mut Group {
        self.groups.last_mut().expect("text object has no group")
    }

    /// Attaches a command before the upcoming glyphs, closing the current group.
    fn push_command(&mut self, command: String) {
        if !self.current().items.is_empty() {
            self.groups.push(Group::default());
        }
        self.current().commands.push(command);
    }

    /// Selects the font for the following glyphs.
    pub fn set_font(&mut self, resource_name: &str, _font: &PdfFont, size: f64) {
        self.font_size = size;
        self.push_command(format!("/{} {} Tf", resource_name, fmt_real(size)));
    }

    /// Sets the fill colour for the following glyphs.
    pub fn set_color(&mut self, color: Color) {
        let command = match color {
            Color::Rgb(r, g, b) => format!(
                "{} {} {} rg",
                fmt_real(f64::from(r) / 255.0),
                fmt_real(f64::from(g) / 255.0),
                fmt_real(f64::from(b) / 255.0)
            ),
            Color::Cmyk(c, m, y, k) => format!(
                "{} {} {} {} k",
                fmt_real(f64::from(c) / 255.0),
                fmt_real(f64::from(m) / 255.0),
                fmt_real(f64::from(y) / 255.0),
                fmt_real(f64::from(k) / 255.0)
            ),
            Color::Greyscale(value) => format!("{} g", fmt_real(f64::from(value) / 255.0)),
        };
        self.push_command(command);
    }

    /// Moves the text cursor to an absolute position, in PDF user space.
    pub fn move_abs(&mut self, pos: (f64, f64)) {
        self.push_command(format!(
            "1 0 0 1 {} {} Tm\n0 0 Td",
            fmt_real(pos.0),
            fmt_real(pos.1)
        ));
    }

    /// Moves the text cursor relative to the start of the current line.
    pub fn next_line(&mut self, dx: f64, dy: f64) {
        self.push_command(format!("{} {} Td", fmt_real(dx), fmt_real(dy)));
    }

    /// Sets the baseline rise for the following glyphs.
    pub fn rise(&mut self, rise: f64) {
        self.push_command(format!("{} Ts", fmt_real(rise)));
    }

    /// Shifts the next glyph to the right by the given distance in points.
    ///
    /// The adjustment is emitted inside the `TJ` array, scaled by the current font size.
    pub fn offset_text_space(&mut self, pt: f64) {
        if self.font_size == 0.0 {
            return;
        }
        self.offset_glyph_units(pt * 1000.0 / self.font_size);
    }

    /// Shifts the next glyph to the right by the given amount of thousandths of an em.
    pub fn offset_glyph_units(&mut self, units: f64) {
        // positive TJ numbers move the next glyph to the left
        self.current().items.push(fmt_real(-units));
    }

    /// Appends a glyph to the current group.
    pub fn add_glyph(&mut self, font: &PdfFont, glyph: GlyphId) {
        let hex = font.encode_glyph(glyph);
        let group = self.current();
        // merge consecutive glyph strings
        if let Some(last) = group.items.last_mut() {
            if last.starts_with('<') {
                last.pop();
                last.push_str(&hex);
                last.push('>');
                return;
            }
        }
        group.items.push(format!("<{}>", hex));
    }

    /// Serialises the text object into content stream operators.
    pub fn serialise(&self) -> String {
        let mut out = String::from("BT\n");
        for group in &self.groups {
            for command in &group.commands {
                out.push_str(command);
                out.push('\n');
            }
            if !group.items.is_empty() {
                out.push('[');
                for (index, item) in group.items.iter().enumerate() {
                    if index > 0 {
                        out.push(' ');
                    }
                    out.push_str(item);
                }
                out.push_str("] TJ\n");
            }
        }
        let _ = write!(out, "ET\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{FontData, GlyphId};
    use std::rc::Rc;

    fn font() -> PdfFont {
        let data = FontData::builtin(crate::fonts::afm::BuiltinFont::Courier).unwrap();
        let cache = crate::fonts::FontCache::new(crate::fonts::FontFamily {
            regular: data.clone(),
            bold: data.clone(),
            italic: data.clone(),
            bold_italic: data,
        });
        PdfFont::new(Rc::clone(cache.source(cache.default_font_family().regular)), 1)
    }

    #[test]
    fn glyphs_merge_into_one_group() {
        let font = font();
        let mut text = Text::new();
        text.set_font("F1", &font, 11.0);
        text.move_abs((10.0, 20.0));
        for c in "Hi".chars() {
            text.add_glyph(&font, GlyphId(c as u16));
        }
        let out = text.serialise();
        assert!(out.starts_with("BT\n"));
        assert!(out.contains("/F1 11 Tf"));
        assert!(out.contains("1 0 0 1 10 20 Tm\n0 0 Td"));
        assert!(out.contains("[<4869>] TJ"));
        assert!(out.ends_with("ET\n"));
    }

    #[test]
    fn commands_split_groups() {
        let font = font();
        let mut text = Text::new();
        text.set_font("F1", &font, 10.0);
        text.add_glyph(&font, GlyphId(65));
        text.rise(2.0);
        text.add_glyph(&font, GlyphId(66));
        let out = text.serialise();
        assert!(out.contains("[<41>] TJ\n2 Ts\n[<42>] TJ"));
    }

    #[test]
    fn offsets_stay_inside_the_group() {
        let font = font();
        let mut text = Text::new();
        text.set_font("F1", &font, 10.0);
        text.add_glyph(&font, GlyphId(65));
        // move 5 pt to the right at 10 pt: -500 thousandths
        text.offset_text_space(5.0);
        text.add_glyph(&font, GlyphId(66));
        let out = text.serialise();
        assert!(out.contains("[<41> -500 <42>] TJ"));
    }
}
