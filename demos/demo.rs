// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Builds a small document that exercises most block and inline kinds.
//!
//! Run with `cargo run --example demo` to produce `demo.pdf`.

use quire::style::{Alignment, Color, FontStyle, Style};
use quire::tree::{
    BlockKind, BlockObject, BorderStyle, Direction, InlineObject, LinkDestination, PathStyle,
};
use quire::{Document, DynLength, DynSize, Mm, OutlineEntry};

fn heading(text: &str, size_pt: f64) -> quire::tree::BlockNode {
    let inline = InlineObject::text(text);
    inline.attrs().apply_style(
        Style::new()
            .with_font_style(FontStyle::Bold)
            .with_font_size(Mm::from_pt(size_pt)),
    );
    let block = BlockObject::paragraph(vec![inline]);
    block
        .attrs()
        .apply_style(Style::new().with_alignment(Alignment::Left));
    block
}

fn main() {
    let family = quire::fonts::builtin(quire::fonts::Builtin::Times).expect("built-in fonts");
    let mut doc = Document::new(family);
    doc.set_title("quire demo");
    doc.set_hyphenator(quire::hyphenate::Hyphenator::english());
    doc.set_microtype(quire::microtype::MicrotypeConfig::default_config());
    doc.settings_mut().paragraph_spacing = Some(DynLength::pt(6.0));

    let title = heading("A quire demo", 17.0);
    let title_id = title.id();
    doc.push(title);

    doc.push(BlockObject::paragraph(vec![InlineObject::text(
        "This paragraph is justified and hyphenated. It demonstrates the layout \
         pipeline: separator normalisation, the shortest-path line breaker, and \
         sentence-end stretch. \"Smart quotes\" work too, don't they?",
    )]));

    // a styled span inside a paragraph
    let emphasis = InlineObject::span(
        vec![InlineObject::text("identity-preserving spans")],
        false,
    );
    emphasis
        .attrs()
        .apply_style(Style::new().with_font_style(FontStyle::Italic));
    doc.push(BlockObject::paragraph(vec![
        InlineObject::text("Styling flows through "),
        emphasis,
        InlineObject::text(" across line breaks."),
    ]));

    // a framed note
    let border = PathStyle {
        line_width: Mm::from_pt(0.8),
        stroke: Some(Color::Rgb(120, 60, 20)),
        ..PathStyle::default()
    };
    let framed = BlockObject::container(
        Direction::Vertical,
        true,
        BorderStyle {
            top: Some(border),
            left: Some(border),
            right: Some(border),
            bottom: Some(border),
            padding_top: DynLength::pt(4.0),
            padding_left: DynLength::pt(6.0),
            padding_right: DynLength::pt(6.0),
            padding_bottom: DynLength::pt(4.0),
        },
    );
    if let BlockKind::Container(container) = framed.kind() {
        container.push(BlockObject::paragraph(vec![InlineObject::text(
            "Framed containers carry borders and padding, and glued ones stay on a page.",
        )]));
    }
    doc.push(framed);

    doc.push(BlockObject::raw(vec![
        "raw blocks keep their lines,".to_owned(),
        "    including indentation".to_owned(),
    ]));

    doc.push(BlockObject::spacer(DynSize::new(
        DynLength::mm(0.0),
        DynLength::pt(12.0),
    )));

    doc.add_outline_entry(OutlineEntry::new(
        "A quire demo",
        LinkDestination::Node(title_id),
    ));

    doc.render_to_file("demo.pdf").expect("Failed to write PDF file");
    println!("wrote demo.pdf");
}
