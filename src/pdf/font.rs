// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! PDF font dictionaries.
//!
//! Built-in fonts become plain `/Type1` dictionaries: their glyph ids are AdobeStandardEncoding
//! codes, so one-byte strings print correctly without an encoding entry.  Embedded fonts use the
//! composite convention: a `/Type0` font with an identity CMap over a `/CIDFontType2` descendant,
//! a `/W` widths array for the glyphs actually used, a `/CIDSet` bitmap, a `/ToUnicode` CMap for
//! text extraction, and the font program in `/FontFile2`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::fonts::{FontSource, GlyphId};

use super::object::{Dict, ObjRef, Object, StreamData};

/// A font as it appears in the PDF output.
///
/// One `PdfFont` exists per [`FontSource`](../../fonts/trait.FontSource.html) used by the
/// document; pages register it as a resource under its resource name.  Glyph usage is recorded
/// here so that the widths array, the CIDSet and the ToUnicode map only cover what the document
/// actually references.
pub struct PdfFont {
    source: Rc<dyn FontSource>,
    resource_name: String,
    used: RefCell<BTreeMap<GlyphId, Option<char>>>,
}

impl PdfFont {
    /// Creates a PDF font for the given source.
    pub fn new(source: Rc<dyn FontSource>, number: usize) -> PdfFont {
        PdfFont {
            source,
            resource_name: format!("F{}", number),
            used: RefCell::new(BTreeMap::new()),
        }
    }

    /// Returns the resource name of this font (e.g. `F1`).
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Returns whether the font program is embedded into the file.
    pub fn is_embedded(&self) -> bool {
        self.source.font_program().is_some()
    }

    /// Records that the given glyph is used, together with the character it stands for.
    pub fn note_glyph(&self, glyph: GlyphId, character: Option<char>) {
        self.used.borrow_mut().entry(glyph).or_insert(character);
    }

    /// Encodes a glyph for a string in a content stream, as hex digits.
    ///
    /// Built-in fonts use one byte per glyph, embedded composite fonts two.
    pub fn encode_glyph(&self, glyph: GlyphId) -> String {
        if self.is_embedded() {
            format!("{:04X}", glyph.0)
        } else {
            format!("{:02X}", glyph.0 & 0xff)
        }
    }

    /// Builds the font dictionary for the file.
    pub fn serialise(&self) -> ObjRef {
        if !self.is_embedded() {
            let mut dict = Dict::new();
            dict.set("Type", Object::name("Font"));
            dict.set("Subtype", Object::name("Type1"));
            dict.set("BaseFont", Object::name(self.source.postscript_name()));
            return ObjRef::dict(dict);
        }

        let base_font = format!("{}+{}", subset_tag(self.source.postscript_name()), self.source.postscript_name());
        let metrics = self.source.font_metrics();
        let scale = 1000.0 / metrics.units_per_em;

        // the CID font with its widths
        let mut cid_font = Dict::new();
        cid_font.set("Type", Object::name("Font"));
        cid_font.set("Subtype", Object::name("CIDFontType2"));
        cid_font.set("BaseFont", Object::name(base_font.clone()));
        let mut system_info = Dict::new();
        system_info.set("Registry", Object::string("Adobe"));
        system_info.set("Ordering", Object::string("Identity"));
        system_info.set("Supplement", 0i64);
        cid_font.set("CIDSystemInfo", Object::Dict(system_info));
        cid_font.set("CIDToGIDMap", Object::name("Identity"));
        cid_font.set("DW", 1000i64);
        cid_font.set("W", self.widths_array(scale));

        // the descriptor
        let mut flags = 0i64;
        if metrics.is_fixed_pitch {
            flags |= 1;
        }
        flags |= 1 << 5; // nonsymbolic
        if metrics.italic_angle != 0.0 {
            flags |= 1 << 6;
        }

        let mut descriptor = Dict::new();
        descriptor.set("Type", Object::name("FontDescriptor"));
        descriptor.set("FontName", Object::name(base_font.clone()));
        descriptor.set("Flags", flags);
        descriptor.set(
            "FontBBox",
            Object::Array(metrics.bbox.iter().map(|&v| Object::Real(v * scale)).collect()),
        );
        descriptor.set("ItalicAngle", Object::Real(metrics.italic_angle));
        descriptor.set("Ascent", Object::Real(metrics.typo_ascent * scale));
        descriptor.set("Descent", Object::Real(metrics.typo_descent * scale));
        descriptor.set("CapHeight", Object::Real(metrics.cap_height * scale));
        descriptor.set("XHeight", Object::Real(metrics.x_height * scale));
        descriptor.set("StemV", Object::Real(metrics.stem_v));

        if let Some(program) = self.source.font_program() {
            descriptor.set(
                "FontFile2",
                ObjRef::stream(StreamData {
                    dict: Dict::new(),
                    data: program.to_vec(),
                    compress: true,
                })
                .reference(),
            );
        }
        descriptor.set("CIDSet", self.cidset().reference());
        cid_font.set("FontDescriptor", ObjRef::dict(descriptor).reference());

        // the Type0 wrapper
        let mut font = Dict::new();
        font.set("Type", Object::name("Font"));
        font.set("Subtype", Object::name("Type0"));
        font.set("BaseFont", Object::name(base_font));
        font.set("Encoding", Object::name("Identity-H"));
        font.set(
            "DescendantFonts",
            Object::Array(vec![ObjRef::dict(cid_font).reference()]),
        );
        font.set("ToUnicode", self.to_unicode().reference());
        ObjRef::dict(font)
    }

    /// Builds the `/W` array: runs of consecutive glyph ids share one width list.
    fn widths_array(&self, scale: f64) -> Object {
        let used = self.used.borrow();
        let mut entries: Vec<Object> = Vec::new();
        let mut run_start: Option<GlyphId> = None;
        let mut run: Vec<Object> = Vec::new();
        let mut prev: Option<GlyphId> = None;

        let mut flush = |start: Option<GlyphId>, run: &mut Vec<Object>, entries: &mut Vec<Object>| {
            if let Some(start) = start {
                if !run.is_empty() {
                    entries.push(Object::Integer(i64::from(start.0)));
                    entries.push(Object::Array(std::mem::take(run)));
                }
            }
        };

        for &glyph in used.keys() {
            let width = self.source.glyph_metrics(glyph).horz_advance * scale;
            let consecutive = prev.map(|p| p.0 + 1 == glyph.0).unwrap_or(false);
            if !consecutive {
                flush(run_start, &mut run, &mut entries);
                run_start = Some(glyph);
            }
            run.push(Object::Real(width));
            prev = Some(glyph);
        }
        flush(run_start, &mut run, &mut entries);
        Object::Array(entries)
    }

    /// Builds the CIDSet bitmap stream: one bit per glyph id, set if used.
    fn cidset(&self) -> ObjRef {
        let glyph_count = self.source.glyph_count() as usize;
        let mut bits = vec![0u8; (glyph_count + 7) / 8];
        for &glyph in self.used.borrow().keys() {
            let index = glyph.0 as usize;
            if index / 8 < bits.len() {
                bits[index / 8] |= 0x80 >> (index % 8);
            }
        }
        ObjRef::stream(StreamData {
            dict: Dict::new(),
            data: bits,
            compress: true,
        })
    }

    /// Builds the ToUnicode CMap stream for text extraction.
    fn to_unicode(&self) -> ObjRef {
        let mut mappings = String::new();
        let mut count = 0usize;
        for (&glyph, &character) in self.used.borrow().iter() {
            if let Some(character) = character {
                let mut utf16 = [0u16; 2];
                let encoded = character.encode_utf16(&mut utf16);
                let _ = write!(mappings, "<{:04X}> <", glyph.0);
                for unit in encoded {
                    let _ = write!(mappings, "{:04X}", unit);
                }
                mappings.push_str(">\n");
                count += 1;
            }
        }

        let mut cmap = String::new();
        cmap.push_str(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n\
             <0000> <FFFF>\n\
             endcodespacerange\n",
        );
        let _ = writeln!(cmap, "{} beginbfchar", count);
        cmap.push_str(&mappings);
        cmap.push_str(
            "endbfchar\n\
             endcmap\n\
             CMapName currentdict /CMap defineresource pop\n\
             end\n\
             end\n",
        );

        ObjRef::stream(StreamData {
            dict: Dict::new(),
            data: cmap.into_bytes(),
            compress: true,
        })
    }
}

impl std::fmt::Debug for PdfFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PdfFont({}, {})",
            self.resource_name,
            self.source.postscript_name()
        )
    }
}

/// Derives a deterministic six-letter subset tag from the font name.
fn subset_tag(name: &str) -> String {
    let mut hash: u32 = 5381;
    for byte in name.bytes() {
        hash = hash.wrapping_mul(33) ^ u32::from(byte);
    }
    let mut tag = String::with_capacity(6);
    for _ in 0..6 {
        tag.push(char::from(b'A' + (hash % 26) as u8));
        hash /= 26;
    }
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::afm::{AfmFont, BuiltinFont};

    fn courier() -> PdfFont {
        PdfFont::new(Rc::new(AfmFont::builtin(BuiltinFont::Courier).unwrap()), 1)
    }

    #[test]
    fn builtin_fonts_use_simple_dictionaries() {
        let font = courier();
        assert!(!font.is_embedded());
        assert_eq!(font.encode_glyph(GlyphId(65)), "41");
        let dict = font.serialise();
        dict.with_value(|value| match value {
            crate::pdf::object::SlotValue::Object(Object::Dict(dict)) => {
                match dict.get("Subtype") {
                    Some(Object::Name(name)) => assert_eq!(name.0, "Type1"),
                    other => panic!("unexpected subtype: {:?}", other),
                }
                match dict.get("BaseFont") {
                    Some(Object::Name(name)) => assert_eq!(name.0, "Courier"),
                    other => panic!("unexpected base font: {:?}", other),
                }
            }
            _ => panic!("expected a dictionary"),
        });
    }

    #[test]
    fn subset_tags_are_deterministic() {
        assert_eq!(subset_tag("Foo"), subset_tag("Foo"));
        assert_ne!(subset_tag("Foo"), subset_tag("Bar"));
        assert_eq!(subset_tag("Foo").len(), 6);
        assert!(subset_tag("Foo").chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn glyph_usage_is_recorded_once() {
        let font = courier();
        font.note_glyph(GlyphId(65), Some('A'));
        font.note_glyph(GlyphId(65), Some('A'));
        assert_eq!(font.used.borrow().len(), 1);
    }
}
