// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Converting block objects into layout objects.
//!
//! [`create_layout_object`][] dispatches over the block kinds of the document tree: paragraphs
//! run through the line breaker, containers lay out their children along their direction and
//! grow borders and padding, images and spacers resolve their dynamic sizes, script and deferred
//! blocks first produce their content and then recurse.  Sizes are computed here; positions are
//! assigned later by [`compute_position`](../fn.compute_position.html).
//!
//! [`create_layout_object`]: fn.create_layout_object.html

use std::rc::Rc;

use crate::error::{Error, ErrorKind};
use crate::fonts::FontCache;
use crate::hyphenate::Hyphenator;
use crate::interp::{value_to_inline, Interpreter, Value};
use crate::microtype::MicrotypeConfig;
use crate::style::{Alignment, Style};
use crate::tree::{
    apply_smart_quotes, process_word_separators, BlockKind, BlockNode, Container, Direction,
    InlineKind, InlineNode, Paragraph, PathStyle,
};
use crate::{LayoutSize, Mm, Position, Size};

use super::line::{build_line, compute_line_metrics, flatten_inlines, FlatItem};
use super::linebreak::break_lines;
use super::{ContainerBox, LayoutId, LayoutKind, LayoutObject, LayoutTree, PathSegment};

/// The shared, read-only inputs of a layout pass.
pub struct LayoutContext<'a> {
    /// The font cache of the document.
    pub fonts: &'a FontCache,
    /// The hyphenator, if hyphenation is enabled.
    pub hyphenator: Option<&'a Hyphenator>,
    /// The margin protrusion configuration, if enabled.
    pub microtype: Option<&'a MicrotypeConfig>,
}

/// Converts a block object into a layout object, computing its size.
///
/// Returns `None` for blocks without content (empty paragraphs, void script results).
pub fn create_layout_object(
    ctx: &LayoutContext<'_>,
    interp: &mut dyn Interpreter,
    tree: &mut LayoutTree,
    node: &BlockNode,
    parent_style: &Style,
    available_space: Size,
) -> Result<Option<LayoutId>, Error> {
    let style = interp
        .current_style()
        .extend_with(*parent_style)
        .extend_with(node.attrs().style());

    let id = match node.kind() {
        BlockKind::Paragraph(paragraph) => {
            layout_paragraph(ctx, interp, tree, paragraph, &style, available_space, true)?
        }
        BlockKind::WrappedLine(paragraph) => {
            layout_paragraph(ctx, interp, tree, paragraph, &style, available_space, false)?
        }
        BlockKind::Container(container) => {
            layout_container(ctx, interp, tree, node, container, &style, available_space)?
        }
        BlockKind::Image(image) => {
            let width = image.size.x.resolve(&style, ctx.fonts);
            let height = image.size.y.resolve(&style, ctx.fonts);
            Some(tree.alloc(LayoutObject::new(
                LayoutKind::Image(Rc::clone(&image.data)),
                style,
                LayoutSize::new(width, height, Mm(0.0)),
            )))
        }
        BlockKind::Spacer(spacer) => {
            let width = spacer.size.x.resolve(&style, ctx.fonts);
            let height = spacer.size.y.resolve(&style, ctx.fonts);
            Some(tree.alloc(LayoutObject::new(
                LayoutKind::Spacer,
                style,
                LayoutSize::new(width, Mm(0.0), height),
            )))
        }
        BlockKind::Raw(raw) => layout_raw(ctx, interp, tree, &raw.lines, &style, available_space)?,
        BlockKind::Script(call) => {
            let value = interp.evaluate(&call.call).map_err(|err| {
                if err.location().is_none() {
                    if let Some(location) = &call.location {
                        return Error::at(
                            err.to_string(),
                            ErrorKind::Interpretation,
                            location.clone(),
                        );
                    }
                }
                err
            })?;
            return script_value_to_layout(ctx, interp, tree, call, value, &style, available_space);
        }
        BlockKind::Deferred(deferred) => {
            let block = deferred.produce(interp, available_space)?;
            return create_layout_object(ctx, interp, tree, &block, &style, available_space);
        }
    };

    if let Some(id) = id {
        tree.get_mut(id).link = node.attrs().link();
        interp.record_layout_object(node.id(), id);
    }
    Ok(id)
}

/// Converts a block script result into layout content.
fn script_value_to_layout(
    ctx: &LayoutContext<'_>,
    interp: &mut dyn Interpreter,
    tree: &mut LayoutTree,
    call: &crate::interp::ScriptCall,
    value: Value,
    style: &Style,
    available_space: Size,
) -> Result<Option<LayoutId>, Error> {
    match value {
        Value::Void | Value::Optional(None) => Ok(None),
        Value::Optional(Some(inner)) => {
            script_value_to_layout(ctx, interp, tree, call, *inner, style, available_space)
        }
        Value::Block(block) => {
            create_layout_object(ctx, interp, tree, &block, style, available_space)
        }
        other => {
            let inline = value_to_inline(other).map_err(|err| match &call.location {
                Some(location) => {
                    Error::at(err.to_string(), ErrorKind::Layout, location.clone())
                }
                None => err,
            })?;
            match inline {
                Some(inline) => {
                    let block = crate::tree::BlockObject::paragraph(vec![inline]);
                    create_layout_object(ctx, interp, tree, &block, style, available_space)
                }
                None => Ok(None),
            }
        }
    }
}

/// Evaluates inline script calls, replacing them by their produced content.
fn evaluate_inline_scripts(
    children: Vec<InlineNode>,
    interp: &mut dyn Interpreter,
) -> Result<Vec<InlineNode>, Error> {
    let mut out = Vec::with_capacity(children.len());
    for obj in children {
        match obj.kind() {
            InlineKind::Script(call) => {
                let value = interp.evaluate(&call.call)?;
                if let Some(inline) = value_to_inline(value)? {
                    out.push(inline);
                }
            }
            InlineKind::Span(span) => {
                let inner = span.children().clone();
                span.set_children(evaluate_inline_scripts(inner, interp)?);
                out.push(obj);
            }
            _ => out.push(obj),
        }
    }
    Ok(out)
}

/// Lays out flow content: line breaking for paragraphs, a single line for wrapped lines.
fn layout_paragraph(
    ctx: &LayoutContext<'_>,
    interp: &mut dyn Interpreter,
    tree: &mut LayoutTree,
    paragraph: &Paragraph,
    style: &Style,
    available_space: Size,
    breakable: bool,
) -> Result<Option<LayoutId>, Error> {
    let children = evaluate_inline_scripts(paragraph.children().clone(), interp)?;
    if style.smart_quotes() {
        apply_smart_quotes(&children);
    }
    let normalized = process_word_separators(children, ctx.hyphenator);

    let mut items: Vec<FlatItem> = Vec::new();
    flatten_inlines(&normalized, *style, None, &mut items);
    if items.is_empty() {
        return Ok(None);
    }

    let available_width = available_space.width;
    let ranges = if breakable {
        break_lines(&items, ctx.fonts, style, available_width)
    } else {
        vec![super::linebreak::BrokenLine {
            start: 0,
            end: items.len(),
        }]
    };

    let mut lines = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.iter().enumerate() {
        let slice = &items[range.start..range.end];
        let metrics = compute_line_metrics(slice, ctx.fonts);
        let line = build_line(
            tree,
            interp,
            ctx.fonts,
            ctx.microtype,
            style,
            slice,
            &metrics,
            available_width,
            index + 1 == ranges.len(),
        );
        lines.push(line);
    }

    if lines.len() == 1 {
        return Ok(Some(lines[0]));
    }
    Ok(Some(stack_lines(tree, lines, *style)))
}

/// Wraps the lines of one paragraph into a vertical container, stacked by their leading.
fn stack_lines(tree: &mut LayoutTree, lines: Vec<LayoutId>, style: Style) -> LayoutId {
    let mut width = Mm(0.0);
    let mut height = Mm(0.0);
    let mut prev_descent = Mm(0.0);
    for (index, &line) in lines.iter().enumerate() {
        let size = tree.get(line).size;
        width = width.max(size.width);
        if index == 0 {
            height += size.ascent;
        } else {
            let leading = match &tree.get(line).kind {
                LayoutKind::Line(line) => line.metrics.default_line_spacing,
                _ => size.total_height(),
            };
            height += leading.max(prev_descent + size.ascent) - prev_descent;
        }
        prev_descent = size.descent;
    }
    height += prev_descent;

    tree.alloc(LayoutObject::new(
        LayoutKind::Container(ContainerBox {
            direction: Direction::Vertical,
            children: lines,
            borders: Vec::new(),
            inset: Position::default(),
            inset_bottom: Mm(0.0),
            is_paragraph: true,
            glued: false,
        }),
        style,
        LayoutSize::new(width, Mm(0.0), height),
    ))
}

/// Lays out verbatim lines: no smart quotes, no hyphenation, left-aligned.
fn layout_raw(
    ctx: &LayoutContext<'_>,
    interp: &mut dyn Interpreter,
    tree: &mut LayoutTree,
    lines: &[String],
    style: &Style,
    available_space: Size,
) -> Result<Option<LayoutId>, Error> {
    let style = style.with_alignment(Alignment::Left);
    let mut line_ids = Vec::with_capacity(lines.len());
    for line in lines {
        let node = crate::tree::InlineObject::text(line.clone());
        let mut items = Vec::new();
        flatten_inlines(&[node], style, None, &mut items);
        let metrics = compute_line_metrics(&items, ctx.fonts);
        line_ids.push(build_line(
            tree,
            interp,
            ctx.fonts,
            None,
            &style,
            &items,
            &metrics,
            available_space.width,
            true,
        ));
    }
    if line_ids.is_empty() {
        return Ok(None);
    }
    if line_ids.len() == 1 {
        return Ok(Some(line_ids[0]));
    }
    Ok(Some(stack_lines(tree, line_ids, style)))
}

fn border_width(border: &Option<PathStyle>) -> Mm {
    match border {
        Some(path_style) if path_style.line_width > Mm(0.0) => path_style.line_width,
        _ => Mm(0.0),
    }
}

/// Lays out a container: children along the direction, then borders and padding around them.
fn layout_container(
    ctx: &LayoutContext<'_>,
    interp: &mut dyn Interpreter,
    tree: &mut LayoutTree,
    node: &BlockNode,
    container: &Container,
    style: &Style,
    mut available_space: Size,
) -> Result<Option<LayoutId>, Error> {
    interp.push_block_context(Some(Rc::clone(node)));

    let border = container.border();
    let top_border = border_width(&border.top);
    let left_border = border_width(&border.left);
    let right_border = border_width(&border.right);
    let bottom_border = border_width(&border.bottom);

    let padding_top = border.padding_top.resolve(style, ctx.fonts);
    let padding_left = border.padding_left.resolve(style, ctx.fonts);
    let padding_right = border.padding_right.resolve(style, ctx.fonts);
    let padding_bottom = border.padding_bottom.resolve(style, ctx.fonts);

    let extra_width = left_border + right_border + padding_left + padding_right;
    let extra_height = top_border + bottom_border + padding_top + padding_bottom;

    available_space.width = (available_space.width - extra_width).max(Mm(0.0));
    available_space.height -= extra_height;

    let mut children = Vec::new();
    let mut max_size = LayoutSize::default();
    let mut sum_width = Mm(0.0);
    let mut content_height = Mm(0.0);
    let mut prev_child_was_phantom = true;
    let mut first_visible = true;

    for child in container.children().iter() {
        let child_id =
            match create_layout_object(ctx, interp, tree, child, style, available_space)? {
                Some(child_id) => child_id,
                None => continue,
            };
        let child_object = tree.get(child_id);
        let child_size = child_object.size;
        let is_phantom = child_object.is_phantom();
        children.push(child_id);

        if is_phantom {
            continue;
        }

        max_size.width = max_size.width.max(child_size.width);
        max_size.ascent = max_size.ascent.max(child_size.ascent);
        max_size.descent = max_size.descent.max(child_size.descent);
        sum_width += child_size.width;

        match container.direction() {
            Direction::None => {}
            Direction::Vertical => {
                if available_space.height < child_size.descent {
                    log::warn!(
                        "not enough vertical space: need {:?}, but only {:?} remaining",
                        child_size.descent,
                        available_space.height
                    );
                    available_space.height = Mm(0.0);
                } else {
                    available_space.height -= child_size.descent;
                }
            }
            Direction::Horizontal => {
                if available_space.width < child_size.width {
                    available_space.width = Mm(0.0);
                } else {
                    available_space.width -= child_size.width;
                }
            }
        }

        if !first_visible && !prev_child_was_phantom {
            content_height += style.paragraph_spacing();
        }
        content_height += child_size.total_height();
        prev_child_was_phantom = is_phantom;
        first_visible = false;
    }

    interp.pop_block_context();

    if children.is_empty() {
        return Ok(None);
    }

    let mut size = match container.direction() {
        Direction::None => max_size,
        Direction::Vertical => LayoutSize::new(max_size.width, Mm(0.0), content_height),
        Direction::Horizontal => {
            LayoutSize::new(sum_width, max_size.ascent, max_size.descent)
        }
    };
    size.width += extra_width;
    size.descent += extra_height;

    // the borders hug the final box; strokes are centred on their edge
    let mut borders = Vec::new();
    let mut add_border = |tree: &mut LayoutTree, path_style: &PathStyle, segments: Vec<PathSegment>| {
        borders.push(tree.alloc(LayoutObject::new(
            LayoutKind::Path(segments, *path_style),
            *style,
            LayoutSize::default(),
        )));
    };

    let width = size.width;
    let height = size.total_height();
    if let Some(path_style) = &border.top {
        if path_style.line_width > Mm(0.0) {
            let y = path_style.line_width / 2.0;
            add_border(tree, path_style, vec![
                PathSegment::MoveTo(Position::new(Mm(0.0), y)),
                PathSegment::LineTo(Position::new(width, y)),
            ]);
        }
    }
    if let Some(path_style) = &border.bottom {
        if path_style.line_width > Mm(0.0) {
            let y = height - path_style.line_width / 2.0;
            add_border(tree, path_style, vec![
                PathSegment::MoveTo(Position::new(Mm(0.0), y)),
                PathSegment::LineTo(Position::new(width, y)),
            ]);
        }
    }
    if let Some(path_style) = &border.left {
        if path_style.line_width > Mm(0.0) {
            let x = path_style.line_width / 2.0;
            add_border(tree, path_style, vec![
                PathSegment::MoveTo(Position::new(x, Mm(0.0))),
                PathSegment::LineTo(Position::new(x, height)),
            ]);
        }
    }
    if let Some(path_style) = &border.right {
        if path_style.line_width > Mm(0.0) {
            let x = width - path_style.line_width / 2.0;
            add_border(tree, path_style, vec![
                PathSegment::MoveTo(Position::new(x, Mm(0.0))),
                PathSegment::LineTo(Position::new(x, height)),
            ]);
        }
    }

    Ok(Some(tree.alloc(LayoutObject::new(
        LayoutKind::Container(ContainerBox {
            direction: container.direction(),
            children,
            borders,
            inset: Position::new(left_border + padding_left, top_border + padding_top),
            inset_bottom: bottom_border + padding_bottom,
            is_paragraph: false,
            glued: container.glued(),
        }),
        *style,
        size,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;
    use crate::fonts::{builtin, Builtin, FontCache};
    use crate::interp::Scripting;
    use crate::layout::{compute_position, ObjectPosition, PageLayout};
    use crate::style::FontStyle;
    use crate::tree::{BlockObject, BorderStyle};
    use crate::{Margins, Mm, Size};

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
            .with_paragraph_spacing(Mm::from_pt(6.0))
            .with_alignment(Alignment::Left)
            .with_smart_quotes(false);
        (cache, style)
    }

    #[test]
    fn paragraph_produces_a_single_line() {
        let (cache, style) = setup();
        let ctx = LayoutContext {
            fonts: &cache,
            hyphenator: None,
            microtype: None,
        };
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        let node = BlockObject::paragraph(vec![crate::tree::InlineObject::text("Hello, world.")]);
        let id = create_layout_object(
            &ctx,
            &mut interp,
            &mut tree,
            &node,
            &style,
            Size::new(Mm(200.0), Mm(f64::INFINITY)),
        )
        .unwrap()
        .unwrap();

        match &tree.get(id).kind {
            LayoutKind::Line(line) => {
                // two words and one space
                assert_eq!(line.children.len(), 3);
            }
            other => panic!("expected a line, got {:?}", other),
        }
        // 13 Courier glyphs at 10 pt
        assert_approx(tree.get(id).size.width, Mm::from_pt(13.0 * 6.0));
    }

    #[test]
    fn paragraph_spacing_between_blocks() {
        let (cache, style) = setup();
        let ctx = LayoutContext {
            fonts: &cache,
            hyphenator: None,
            microtype: None,
        };
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();
        let mut page_layout = PageLayout::new(Size::new(210, 297), Margins::all(0));

        let root = BlockObject::vertical();
        if let BlockKind::Container(container) = root.kind() {
            container.push(BlockObject::paragraph(vec![
                crate::tree::InlineObject::text("one"),
            ]));
            container.push(BlockObject::paragraph(vec![
                crate::tree::InlineObject::text("two"),
            ]));
        }

        let id = create_layout_object(
            &ctx,
            &mut interp,
            &mut tree,
            &root,
            &style,
            Size::new(Mm(200.0), Mm(f64::INFINITY)),
        )
        .unwrap()
        .unwrap();

        let cursor = page_layout.new_cursor();
        compute_position(&mut tree, &mut page_layout, id, cursor);

        let children = match &tree.get(id).kind {
            LayoutKind::Container(container) => container.children.clone(),
            other => panic!("expected a container, got {:?}", other),
        };
        assert_eq!(children.len(), 2);

        let line_pos = |id| match tree.get(id).position.unwrap() {
            ObjectPosition::Relative(pos) => pos.pos,
            _ => panic!(),
        };
        let first = tree.get(children[0]).size;
        let second = tree.get(children[1]).size;
        let gap = line_pos(children[1]).y - line_pos(children[0]).y;
        // baseline distance = descent + paragraph spacing + ascent
        assert_approx(
            gap,
            first.descent + Mm::from_pt(6.0) + second.ascent,
        );
    }

    #[test]
    fn justified_lines_stretch_spaces() {
        let (cache, style) = setup();
        let style = style.with_alignment(Alignment::Justified);
        let ctx = LayoutContext {
            fonts: &cache,
            hyphenator: None,
            microtype: None,
        };
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        // four 5-glyph words, three spaces; the first line must be stretched
        let node = BlockObject::paragraph(vec![crate::tree::InlineObject::text(
            "alpha betas gamma delta alpha betas gamma delta",
        )]);
        let available = Mm::from_pt(6.0 * 26.0);
        let id = create_layout_object(
            &ctx,
            &mut interp,
            &mut tree,
            &node,
            &style,
            Size::new(available, Mm(f64::INFINITY)),
        )
        .unwrap()
        .unwrap();

        let lines = match &tree.get(id).kind {
            LayoutKind::Container(container) => container.children.clone(),
            LayoutKind::Line(_) => vec![id],
            other => panic!("unexpected layout: {:?}", other),
        };
        assert!(lines.len() >= 2);
        // every non-last justified line fills the available width
        for &line in &lines[..lines.len() - 1] {
            assert_approx(tree.get(line).size.width, available);
        }
    }

    #[test]
    fn bordered_container_grows_by_padding() {
        let (cache, style) = setup();
        let ctx = LayoutContext {
            fonts: &cache,
            hyphenator: None,
            microtype: None,
        };
        let mut interp = Scripting::new();
        let mut tree = LayoutTree::new();

        let border = BorderStyle {
            top: Some(PathStyle::default()),
            bottom: Some(PathStyle::default()),
            left: None,
            right: None,
            padding_top: crate::DynLength::mm(2.0),
            padding_left: crate::DynLength::mm(3.0),
            padding_right: crate::DynLength::mm(3.0),
            padding_bottom: crate::DynLength::mm(2.0),
        };
        let node = BlockObject::container(Direction::Vertical, false, border);
        if let BlockKind::Container(container) = node.kind() {
            container.push(BlockObject::paragraph(vec![
                crate::tree::InlineObject::text("boxed"),
            ]));
        }

        let id = create_layout_object(
            &ctx,
            &mut interp,
            &mut tree,
            &node,
            &style,
            Size::new(Mm(200.0), Mm(f64::INFINITY)),
        )
        .unwrap()
        .unwrap();

        let object = tree.get(id);
        let inner_width = Mm::from_pt(5.0 * 6.0);
        assert_approx(object.size.width, inner_width + Mm(6.0));
        let borders = match &object.kind {
            LayoutKind::Container(container) => container.borders.len(),
            _ => panic!(),
        };
        assert_eq!(borders, 2);
    }
}
