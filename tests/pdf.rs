// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! End-to-end tests over the bytes of rendered PDF files.

use std::io::Read;

use quire::interp::{Interpreter, Phase, Scripting};
use quire::style::FontStyle;
use quire::tree::{BlockObject, InlineObject, LinkDestination};
use quire::{Document, DynLength, DynSize, Mm, OutlineEntry};

fn times_document() -> Document {
    let family = quire::fonts::builtin(quire::fonts::Builtin::Times).unwrap();
    Document::new(family)
}

fn render(doc: Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.render(&mut buf).expect("rendering failed");
    buf
}

/// Extracts and inflates every `FlateDecode` stream of the file.
fn inflated_streams(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = bytes;
    while let Some(start) = find(rest, b"stream\n") {
        let body_start = start + b"stream\n".len();
        let body_end = body_start
            + find(&rest[body_start..], b"\nendstream").expect("unterminated stream");
        let body = &rest[body_start..body_end];
        let mut inflated = Vec::new();
        let mut decoder = flate2::read::ZlibDecoder::new(body);
        if decoder.read_to_end(&mut inflated).is_ok() {
            out.push(inflated);
        }
        rest = &rest[body_end..];
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn as_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn empty_document() {
    let bytes = render(times_document());
    let text = as_text(&bytes);

    assert!(text.starts_with("%PDF-1.7\n"));
    assert!(text.ends_with("%%EOF\n"));
    assert!(text.contains("/Type /Catalog"));
    assert!(text.contains("/Type /Pages"));
    assert!(text.contains("/Count 1"));
    assert!(text.contains("/MediaBox [0 0 595.276 841.89]"));
    assert!(!text.contains("/Contents"));
}

#[test]
fn hello_world() {
    let mut doc = times_document();
    doc.set_font_size(DynLength::pt(11.0));
    doc.push(BlockObject::paragraph(vec![InlineObject::text(
        "Hello, world.",
    )]));
    let bytes = render(doc);
    let text = as_text(&bytes);

    assert!(text.contains("/Count 1"));
    assert!(text.contains("/Type1"));
    assert!(text.contains("/Times-Roman"));

    // the content stream holds the twelve word glyphs (and the space) in order
    let streams = inflated_streams(&bytes);
    let content = streams
        .iter()
        .map(|stream| as_text(stream))
        .find(|stream| stream.contains("TJ"))
        .expect("no text content stream");
    assert!(content.contains("/F1 11 Tf"));
    assert!(content.contains("48656C6C6F2C20776F726C642E"));
}

#[test]
fn paragraph_spacing_separates_baselines() {
    let mut doc = times_document();
    doc.set_font_size(DynLength::pt(11.0));
    doc.settings_mut().paragraph_spacing = Some(DynLength::pt(6.0));
    doc.push(BlockObject::paragraph(vec![InlineObject::text("one")]));
    doc.push(BlockObject::paragraph(vec![InlineObject::text("two")]));

    let cache = quire::fonts::FontCache::new(
        quire::fonts::builtin(quire::fonts::Builtin::Times).unwrap(),
    );
    let font = cache.default_font_family().get(FontStyle::Regular);
    let size = Mm::from_pt(11.0);
    let expected_gap = font.descent(&cache, size).to_pt()
        + 6.0
        + font.ascent(&cache, size).to_pt();

    let bytes = render(doc);
    let streams = inflated_streams(&bytes);
    let content = streams
        .iter()
        .map(|stream| as_text(stream))
        .find(|stream| stream.contains("TJ"))
        .expect("no text content stream");

    let baselines: Vec<f64> = content
        .lines()
        .filter(|line| line.ends_with(" Tm"))
        .map(|line| {
            let mut parts: Vec<&str> = line.split_whitespace().collect();
            parts.pop(); // Tm
            parts.pop().unwrap().parse().unwrap()
        })
        .collect();
    assert_eq!(baselines.len(), 2);
    // PDF user space grows upwards, so the second baseline is lower
    let gap = baselines[0] - baselines[1];
    assert!(
        (gap - expected_gap).abs() < 0.01,
        "gap {} != {}",
        gap,
        expected_gap
    );
}

#[test]
fn outline_with_two_items() {
    let mut doc = times_document();
    // three spacers of 200 mm overflow an A4 content area twice
    for _ in 0..3 {
        doc.push(BlockObject::spacer(DynSize::new(
            DynLength::mm(10.0),
            DynLength::mm(200.0),
        )));
    }
    doc.add_outline_entry(OutlineEntry::new(
        "First",
        LinkDestination::Position(quire::layout::AbsolutePagePos {
            page: 0,
            pos: quire::Position::new(20, 40),
        }),
    ));
    doc.add_outline_entry(OutlineEntry::new(
        "Second",
        LinkDestination::Position(quire::layout::AbsolutePagePos {
            page: 2,
            pos: quire::Position::new(20, 40),
        }),
    ));

    let bytes = render(doc);
    let text = as_text(&bytes);
    assert!(text.contains("/Count 3")); // pages
    assert!(text.contains("/Outlines"));
    assert!(text.contains("/PageMode /UseOutlines"));
    assert!(text.contains("/Count 2")); // outline items
    assert!(text.contains("(First)"));
    assert!(text.contains("(Second)"));
    assert!(text.contains("/XYZ"));
}

#[test]
fn hyphenated_paragraph_renders_a_hyphen() {
    let mut doc = times_document();
    doc.set_hyphenator(quire::hyphenate::Hyphenator::english());
    doc.set_paper_size(quire::Size::new(35, 297));
    doc.set_margins(DynLength::mm(10.0));
    doc.push(BlockObject::paragraph(vec![InlineObject::text(
        "hyphenation hyphenation hyphenation hyphenation",
    )]));
    let bytes = render(doc);
    let streams = inflated_streams(&bytes);
    let content = streams
        .iter()
        .map(|stream| as_text(stream))
        .find(|stream| stream.contains("TJ"))
        .expect("no text content stream");
    // 0x2D is the hyphen glyph produced by a hyphenation break
    assert!(content.contains("2D>"));
}

#[test]
fn rendering_is_deterministic() {
    let build = || {
        let mut doc = times_document();
        doc.set_title("Deterministic");
        doc.push(BlockObject::paragraph(vec![InlineObject::text(
            "The quick brown fox jumps over the lazy dog.",
        )]));
        render(doc)
    };
    assert_eq!(build(), build());
}

#[test]
fn draft_mode_skips_content() {
    let mut doc = times_document();
    doc.set_draft(true);
    doc.push(BlockObject::paragraph(vec![InlineObject::text(
        "invisible",
    )]));
    let bytes = render(doc);
    let text = as_text(&bytes);
    assert!(!text.contains("/Contents"));
    assert!(text.contains("/Type /Page"));
}

#[test]
fn hooks_drive_relayout() {
    let mut doc = times_document();
    doc.push(BlockObject::paragraph(vec![InlineObject::text("content")]));

    let mut scripting = Scripting::new();
    let passes = std::rc::Rc::new(std::cell::Cell::new(0usize));
    let counter = std::rc::Rc::clone(&passes);
    scripting.on(Phase::Layout, move |interp| {
        counter.set(counter.get() + 1);
        // ask for a second pass once
        if interp.state().layout_pass < 2 {
            interp.request_layout();
        }
        Ok(())
    });

    let mut buf = Vec::new();
    doc.render_with(&mut scripting, &mut buf).unwrap();
    assert_eq!(passes.get(), 2);
    assert!(!buf.is_empty());
}

#[test]
fn preamble_hooks_fill_settings() {
    let mut doc = times_document();
    doc.push(BlockObject::paragraph(vec![InlineObject::text("wide")]));

    let mut scripting = Scripting::new();
    scripting.on(Phase::Preamble, |interp| {
        interp.settings_mut().paper_size = Some(DynSize::new(
            DynLength::mm(300.0),
            DynLength::mm(300.0),
        ));
        Ok(())
    });

    let mut buf = Vec::new();
    doc.render_with(&mut scripting, &mut buf).unwrap();
    let text = as_text(&buf);
    assert!(text.contains("/MediaBox [0 0 850.394 850.394]"));
}
