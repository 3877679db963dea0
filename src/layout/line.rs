// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Line metrics and line assembly.
//!
//! The line breaker works on a flat sequence of [`FlatItem`][]s: the inline stream of a paragraph
//! with all non-glued spans flattened in place (each item remembers the innermost span it came
//! from, so that identity-preserving [`SpanBox`][]es can be rebuilt per line).  Glued spans and
//! spans with an overridden width stay atomic.
//!
//! [`compute_line_metrics`][] measures a candidate line: it accumulates word-chunk widths
//! (consecutive text items of one style are measured as a single word so that ligatures and
//! kerning across item boundaries are captured), separator widths, and the vertical extents.
//! [`build_line`][] then turns a chosen line into positioned [`Word`][]s with alignment and
//! justification applied.
//!
//! [`FlatItem`]: struct.FlatItem.html
//! [`SpanBox`]: ../struct.SpanBox.html
//! [`Word`]: ../struct.Word.html
//! [`compute_line_metrics`]: fn.compute_line_metrics.html
//! [`build_line`]: fn.build_line.html

use std::rc::Rc;

use crate::fonts::FontCache;
use crate::interp::Interpreter;
use crate::microtype::MicrotypeConfig;
use crate::style::{Alignment, Style};
use crate::tree::{InlineKind, InlineNode};
use crate::{LayoutSize, Mm};

use super::{LayoutId, LayoutKind, LayoutObject, LayoutTree, Line, SpanBox, Word};

/// One item of the flattened inline stream.
#[derive(Clone, Debug)]
pub struct FlatItem {
    /// The tree node.
    pub obj: InlineNode,
    /// The effective style of the item, with all span overrides folded in.
    pub style: Style,
    /// The innermost identity-preserving span this item came from, if any.
    pub span: Option<InlineNode>,
}

/// Flattens an inline stream for the line breaker.
///
/// Non-glued spans without a width override are dissolved into their children; glued or
/// width-overridden spans stay as single atomic items.
pub fn flatten_inlines(
    objs: &[InlineNode],
    base: Style,
    span: Option<&InlineNode>,
    out: &mut Vec<FlatItem>,
) {
    for obj in objs {
        let style = base.extend_with(obj.attrs().style());
        match obj.kind() {
            InlineKind::Text(_) | InlineKind::Separator(_) => out.push(FlatItem {
                obj: Rc::clone(obj),
                style,
                span: span.cloned(),
            }),
            InlineKind::Span(inner) => {
                if inner.glued() || inner.overridden_width().is_some() {
                    out.push(FlatItem {
                        obj: Rc::clone(obj),
                        style,
                        span: span.cloned(),
                    });
                } else {
                    let children = inner.children().clone();
                    flatten_inlines(&children, style, Some(obj), out);
                }
            }
            InlineKind::Script(_) => {
                log::warn!("unevaluated script call in inline stream");
            }
        }
    }
}

/// The measured metrics of one line.
#[derive(Clone, Debug, Default)]
pub struct LineMetrics {
    /// The rendered width of each piece (word-chunk increments and separator faces), in item
    /// order.
    pub widths: Vec<Mm>,
    /// The preferred width of each separator, in separator order.
    pub preferred_sep_widths: Vec<Mm>,
    /// The total width of all non-elastic pieces.
    pub total_word_width: Mm,
    /// The total preferred width of all elastic separators.
    pub total_space_width: Mm,
    /// The maximum ascent over all pieces.
    pub ascent: Mm,
    /// The maximum descent over all pieces.
    pub descent: Mm,
    /// The maximum cap height over all pieces.
    pub cap_height: Mm,
    /// The maximum default line spacing over all pieces, scaled by the line spacing factor.
    pub default_line_spacing: Mm,
}

impl LineMetrics {
    /// Returns the natural width of the line: words plus preferred spaces.
    pub fn natural_width(&self) -> Mm {
        self.total_word_width + self.total_space_width
    }
}

fn note_vertical(metrics: &mut LineMetrics, fonts: &FontCache, style: &Style) {
    let font = style.font();
    let size = style.font_size();
    metrics.ascent = metrics.ascent.max(font.ascent(fonts, size));
    metrics.descent = metrics.descent.max(font.descent(fonts, size));
    let font_metrics = font.metrics(fonts);
    let cap_height = font.scale(fonts, font_metrics.cap_height, size);
    metrics.cap_height = metrics.cap_height.max(cap_height);
    let spacing = font.scale(fonts, font_metrics.default_line_spacing(), size);
    metrics.default_line_spacing = metrics
        .default_line_spacing
        .max(spacing * style.line_spacing());
}

fn word_width(fonts: &FontCache, style: &Style, text: &str) -> Mm {
    style.font().word_width(fonts, text, style.font_size())
}

fn preferred_sep_width(
    fonts: &FontCache,
    sep: &crate::tree::Separator,
    style: &Style,
    is_end_of_line: bool,
) -> Mm {
    let face = if is_end_of_line {
        sep.end_of_line()
    } else {
        sep.middle_of_line()
    };
    let multiplier = if sep.is_sentence_end() {
        style.sentence_space_stretch()
    } else {
        1.0
    };
    word_width(fonts, style, face) * multiplier
}

/// Measures the given candidate line.
///
/// A separator that ends the slice is measured in its end-of-line face; everything else uses the
/// mid-line face.  Separators take their preferred width from the average of their neighbours'
/// styles.
pub fn compute_line_metrics(items: &[FlatItem], fonts: &FontCache) -> LineMetrics {
    let mut metrics = LineMetrics::default();

    let mut chunk_text = String::new();
    let mut chunk_style: Option<Style> = None;
    let mut chunk_width = Mm(0.0);

    macro_rules! reset_chunk {
        () => {
            metrics.total_word_width += chunk_width;
            chunk_text.clear();
            chunk_style = None;
            chunk_width = Mm(0.0);
        };
    }

    for (index, item) in items.iter().enumerate() {
        match item.obj.kind() {
            InlineKind::Text(text) => {
                if chunk_style.is_some() && chunk_style != Some(item.style) {
                    reset_chunk!();
                }
                chunk_style = Some(item.style);
                chunk_text.push_str(&text.borrow());
                let new_width = word_width(fonts, &item.style, &chunk_text);
                metrics.widths.push(new_width - chunk_width);
                chunk_width = new_width;
                note_vertical(&mut metrics, fonts, &item.style);
            }
            InlineKind::Separator(sep) => {
                reset_chunk!();
                let is_end_of_line = index + 1 == items.len();

                let real_width = word_width(
                    fonts,
                    &item.style,
                    if is_end_of_line {
                        sep.end_of_line()
                    } else {
                        sep.middle_of_line()
                    },
                );

                let left = index
                    .checked_sub(1)
                    .map(|i| preferred_sep_width(fonts, sep, &items[i].style, is_end_of_line));
                let right = items
                    .get(index + 1)
                    .map(|it| preferred_sep_width(fonts, sep, &it.style, is_end_of_line));
                let preferred = match (left, right) {
                    (Some(l), Some(r)) => (l + r) / 2.0,
                    (Some(l), None) => l,
                    (None, Some(r)) => r,
                    (None, None) => preferred_sep_width(fonts, sep, &item.style, is_end_of_line),
                };

                if sep.is_elastic() && !is_end_of_line {
                    metrics.total_space_width += preferred;
                } else {
                    metrics.total_word_width += preferred;
                }
                metrics.widths.push(real_width);
                metrics.preferred_sep_widths.push(preferred);
            }
            InlineKind::Span(span) => {
                reset_chunk!();
                let mut inner_items = Vec::new();
                let children = span.children().clone();
                flatten_inlines(&children, item.style, None, &mut inner_items);
                let inner = compute_line_metrics(&inner_items, fonts);

                let width = match span.overridden_width() {
                    Some(width) => width,
                    None => inner.natural_width(),
                };
                metrics.total_word_width += width;
                metrics.widths.push(width);
                metrics.ascent = metrics.ascent.max(inner.ascent);
                metrics.descent = metrics.descent.max(inner.descent);
                metrics.cap_height = metrics.cap_height.max(inner.cap_height);
                metrics.default_line_spacing =
                    metrics.default_line_spacing.max(inner.default_line_spacing);
            }
            InlineKind::Script(_) => {}
        }
    }

    metrics.total_word_width += chunk_width;
    metrics
}

/// The amount the line may protrude into the right margin, driven by its final character.
fn protrusion_allowance(
    items: &[FlatItem],
    fonts: &FontCache,
    microtype: Option<&MicrotypeConfig>,
) -> Mm {
    let microtype = match microtype {
        Some(microtype) => microtype,
        None => return Mm(0.0),
    };
    let last = match items.last() {
        Some(last) => last,
        None => return Mm(0.0),
    };
    let last_char = match last.obj.kind() {
        InlineKind::Text(text) => text.borrow().chars().last(),
        InlineKind::Separator(sep) => sep.end_of_line().chars().last(),
        _ => None,
    };
    let last_char = match last_char {
        Some(c) => c,
        None => return Mm(0.0),
    };
    let family = last.style.font().metrics(fonts);
    let italic = family.italic_angle != 0.0;
    let name = fonts.source(last.style.font()).postscript_name().to_owned();
    match microtype.protrusion(&name, italic, last_char) {
        Some(protrusion) => last.style.font_size() * (protrusion.right / 1000.0),
        None => Mm(0.0),
    }
}

struct Placement<'a> {
    tree: &'a mut LayoutTree,
    fonts: &'a FontCache,
    ascent: Mm,
    descent: Mm,
    children: Vec<LayoutId>,
    // the open span run, if any
    span: Option<InlineNode>,
    span_start: Mm,
    span_width: Mm,
}

impl<'a> Placement<'a> {
    fn flush_span(&mut self, interp: &mut dyn Interpreter) {
        if let Some(span) = self.span.take() {
            let size = LayoutSize::new(self.span_width, self.ascent, self.descent);
            let mut object = LayoutObject::new(
                LayoutKind::Span(SpanBox {
                    offset: self.span_start,
                    raise: span.attrs().raise(),
                }),
                Style::empty().extend_with(span.attrs().style()),
                size,
            );
            object.link = span.attrs().link();
            let id = self.tree.alloc(object);
            interp.record_layout_object(span.id(), id);
            self.children.push(id);
        }
        self.span_width = Mm(0.0);
    }

    fn track_span(
        &mut self,
        interp: &mut dyn Interpreter,
        item: &FlatItem,
        offset: Mm,
        advance: Mm,
    ) {
        match (&self.span, &item.span) {
            (_, None) => {
                self.flush_span(interp);
            }
            (Some(open), Some(current)) if Rc::ptr_eq(open, current) => {
                self.span_width += advance;
            }
            (_, Some(current)) => {
                self.flush_span(interp);
                self.span = Some(Rc::clone(current));
                self.span_start = offset;
                self.span_width = advance;
            }
        }
    }

    fn push_word(
        &mut self,
        interp: &mut dyn Interpreter,
        item: &FlatItem,
        text: String,
        offset: Mm,
        width: Mm,
    ) -> LayoutId {
        let size = LayoutSize::new(width, self.ascent, self.descent);
        let mut object = LayoutObject::new(
            LayoutKind::Word(Word {
                text,
                offset,
                raise: item.obj.attrs().raise(),
            }),
            item.style,
            size,
        );
        object.link = item.obj.attrs().link();
        let id = self.tree.alloc(object);
        interp.record_layout_object(item.obj.id(), id);
        self.children.push(id);
        id
    }
}

/// Assembles one chosen line into a [`Line`](../struct.Line.html) layout object.
///
/// `available_space` is the width the line should fill; `is_last` marks the final line of the
/// paragraph, which is not stretched under justified alignment unless its natural stretch is
/// already close to one.
#[allow(clippy::too_many_arguments)]
pub fn build_line(
    tree: &mut LayoutTree,
    interp: &mut dyn Interpreter,
    fonts: &FontCache,
    microtype: Option<&MicrotypeConfig>,
    parent_style: &Style,
    items: &[FlatItem],
    metrics: &LineMetrics,
    available_space: Mm,
    is_last: bool,
) -> LayoutId {
    let available_space = available_space + protrusion_allowance(items, fonts, microtype);

    let space_factor = if metrics.total_space_width > Mm(0.0) {
        (available_space - metrics.total_word_width) / metrics.total_space_width.0
    } else {
        Mm(1.0)
    };
    let space_factor = space_factor.0;

    let justify = parent_style.alignment() == Alignment::Justified
        && (!is_last || (0.9..=1.1).contains(&space_factor));

    let mut offset = match parent_style.alignment() {
        Alignment::Right => available_space - metrics.natural_width(),
        Alignment::Center => (available_space - metrics.natural_width()) / 2.0,
        _ => Mm(0.0),
    };
    if offset < Mm(0.0) {
        offset = Mm(0.0);
    }

    let mut placement = Placement {
        tree,
        fonts,
        ascent: metrics.ascent,
        descent: metrics.descent,
        children: Vec::new(),
        span: None,
        span_start: Mm(0.0),
        span_width: Mm(0.0),
    };

    let width = place_items(
        &mut placement,
        interp,
        items,
        metrics,
        &mut offset,
        space_factor,
        justify,
    );
    placement.flush_span(interp);

    let children = placement.children;
    let size = LayoutSize::new(width, metrics.ascent, metrics.descent);
    tree.alloc(LayoutObject::new(
        LayoutKind::Line(Line {
            metrics: metrics.clone(),
            children,
        }),
        *parent_style,
        size,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;
    use crate::fonts::{builtin, Builtin};
    use crate::interp::Scripting;
    use crate::style::FontStyle;
    use crate::tree::{process_word_separators, InlineObject};

    fn setup() -> (FontCache, Style) {
        let cache = FontCache::new(builtin(Builtin::Courier).unwrap());
        let family = cache.default_font_family();
        let style = Style::new()
            .with_font_family(family)
            .with_font_style(FontStyle::Regular)
            .with_font_size(Mm::from_pt(10.0))
            .with_root_font_size(Mm::from_pt(10.0))
            .with_line_spacing(1.0)
            .with_sentence_space_stretch(1.0)
            .with_paragraph_spacing(Mm(0.0))
            .with_alignment(Alignment::Justified)
            .with_smart_quotes(false);
        (cache, style)
    }

    fn glyphs(n: f64) -> Mm {
        Mm::from_pt(6.0 * n)
    }

    fn items_for(text: &str, style: &Style) -> Vec<FlatItem> {
        let normalized = process_word_separators(vec![InlineObject::text(text)], None);
        let mut items = Vec::new();
        flatten_inlines(&normalized, *style, None, &mut items);
        items
    }

    #[test]
    fn metrics_track_words_and_spaces() {
        let (cache, style) = setup();
        let items = items_for("alpha beta", &style);
        let metrics = compute_line_metrics(&items, &cache);
        assert_approx(metrics.total_word_width, glyphs(9.0));
        assert_approx(metrics.total_space_width, glyphs(1.0));
        assert_eq!(metrics.preferred_sep_widths.len(), 1);
        // courier at 10 pt: 1.2 em default line spacing
        assert_approx(metrics.default_line_spacing, Mm::from_pt(12.0));
    }

    #[test]
    fn justified_stretch_distributes_evenly() {
        let (cache, style) = setup();
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        // four 9-glyph words and three spaces into 42 glyphs of room:
        // each gap stretches to (42 - 36) / 3 = 2 glyphs
        let items = items_for("aaaaaaaaa bbbbbbbbb ccccccccc ddddddddd", &style);
        let metrics = compute_line_metrics(&items, &cache);
        let line = build_line(
            &mut tree,
            &mut interp,
            &cache,
            None,
            &style,
            &items,
            &metrics,
            glyphs(42.0),
            false,
        );

        assert_approx(tree.get(line).size.width, glyphs(42.0));
        let children = match &tree.get(line).kind {
            LayoutKind::Line(line) => line.children.clone(),
            _ => panic!(),
        };
        let offsets: Vec<Mm> = children
            .iter()
            .filter_map(|&child| match &tree.get(child).kind {
                LayoutKind::Word(word) if !word.text.trim().is_empty() => Some(word.offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets.len(), 4);
        // words start at 0, 11, 22, 33 glyphs: 9 for the word plus a 2-glyph gap
        for (index, offset) in offsets.iter().enumerate() {
            assert_approx(*offset, glyphs(11.0 * index as f64));
        }
    }

    #[test]
    fn right_alignment_shifts_the_line() {
        let (cache, style) = setup();
        let style = style.with_alignment(Alignment::Right);
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        let items = items_for("abc", &style);
        let metrics = compute_line_metrics(&items, &cache);
        let line = build_line(
            &mut tree,
            &mut interp,
            &cache,
            None,
            &style,
            &items,
            &metrics,
            glyphs(10.0),
            true,
        );
        let children = match &tree.get(line).kind {
            LayoutKind::Line(line) => line.children.clone(),
            _ => panic!(),
        };
        let word = match &tree.get(children[0]).kind {
            LayoutKind::Word(word) => word.offset,
            _ => panic!(),
        };
        assert_approx(word, glyphs(7.0));
    }

    #[test]
    fn spans_keep_their_identity_on_a_line() {
        let (cache, style) = setup();
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        let span = InlineObject::span(vec![InlineObject::text("inner")], false);
        let span_id = span.id();
        let normalized = process_word_separators(
            vec![InlineObject::text("pre "), span, InlineObject::text(" post")],
            None,
        );
        let mut items = Vec::new();
        flatten_inlines(&normalized, style, None, &mut items);
        let metrics = compute_line_metrics(&items, &cache);
        build_line(
            &mut tree,
            &mut interp,
            &cache,
            None,
            &style,
            &items,
            &metrics,
            glyphs(30.0),
            true,
        );

        let produced = interp.layout_objects_for(span_id);
        assert_eq!(produced.len(), 1);
        match &tree.get(produced[0]).kind {
            LayoutKind::Span(span_box) => {
                // "pre" and the following space come first: 4 glyphs
                assert_approx(span_box.offset, glyphs(4.0));
            }
            other => panic!("expected a span, got {:?}", other),
        }
        assert_approx(tree.get(produced[0]).size.width, glyphs(5.0));
    }
}

fn place_items(
    placement: &mut Placement<'_>,
    interp: &mut dyn Interpreter,
    items: &[FlatItem],
    metrics: &LineMetrics,
    offset: &mut Mm,
    space_factor: f64,
    justify: bool,
) -> Mm {
    let mut width_idx = 0usize;
    let mut sep_idx = 0usize;
    let mut actual_width = Mm(0.0);

    for (index, item) in items.iter().enumerate() {
        match item.obj.kind() {
            InlineKind::Text(text) => {
                let piece_width = metrics.widths[width_idx];
                width_idx += 1;
                placement.push_word(interp, item, text.borrow().clone(), *offset, piece_width);
                placement.track_span(interp, item, *offset, piece_width);
                *offset += piece_width;
                actual_width += piece_width;
            }
            InlineKind::Separator(sep) => {
                let real_width = metrics.widths[width_idx];
                width_idx += 1;
                let preferred = metrics.preferred_sep_widths[sep_idx];
                sep_idx += 1;

                let actual = if justify && sep.is_elastic() {
                    preferred * space_factor
                } else {
                    preferred
                };

                let is_end_of_line = index + 1 == items.len();
                let face = if is_end_of_line {
                    sep.end_of_line()
                } else {
                    sep.middle_of_line()
                };
                if !face.is_empty() {
                    placement.push_word(interp, item, face.to_owned(), *offset, real_width);
                }
                placement.track_span(interp, item, *offset, actual);
                *offset += actual;
                actual_width += actual;
            }
            InlineKind::Span(span) => {
                let span_width = metrics.widths[width_idx];
                width_idx += 1;

                let mut inner_items = Vec::new();
                let children = span.children().clone();
                flatten_inlines(&children, item.style, None, &mut inner_items);
                let inner_metrics = compute_line_metrics(&inner_items, placement.fonts);

                // a fixed-width span justifies its own content to the overridden width
                let inner_factor = if inner_metrics.total_space_width > Mm(0.0) {
                    ((span_width - inner_metrics.total_word_width)
                        / inner_metrics.total_space_width.0)
                        .0
                } else {
                    1.0
                };

                let span_start = *offset;
                place_items(
                    placement,
                    interp,
                    &inner_items,
                    &inner_metrics,
                    offset,
                    inner_factor,
                    span.overridden_width().is_some(),
                );

                let size = LayoutSize::new(span_width, metrics.ascent, metrics.descent);
                let mut object = LayoutObject::new(
                    LayoutKind::Span(SpanBox {
                        offset: span_start,
                        raise: item.obj.attrs().raise(),
                    }),
                    item.style,
                    size,
                );
                object.link = item.obj.attrs().link();
                let id = placement.tree.alloc(object);
                interp.record_layout_object(item.obj.id(), id);
                placement.children.push(id);

                *offset = span_start + span_width;
                actual_width += span_width;
            }
            InlineKind::Script(_) => {}
        }
    }

    actual_width
}
