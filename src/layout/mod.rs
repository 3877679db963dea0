// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The layout tree.
//!
//! Laying out a document happens in two steps: the document tree is first converted into a tree
//! of [`LayoutObject`][]s with computed sizes (see [`container`](container/index.html)), then
//! [`compute_position`][] walks that tree with a [`PageCursor`][] and assigns every object a
//! position.  Finally, [`render`][] emits the positioned objects as PDF page content.
//!
//! Layout objects live in a [`LayoutTree`][] arena and reference each other by [`LayoutId`][];
//! the tree is dropped as a whole at the end of a pass.  Back-pointers from document tree nodes to
//! their layout objects are kept by the interpreter, not by the nodes themselves.
//!
//! [`LayoutObject`]: struct.LayoutObject.html
//! [`LayoutTree`]: struct.LayoutTree.html
//! [`LayoutId`]: struct.LayoutId.html
//! [`PageCursor`]: page/struct.PageCursor.html
//! [`compute_position`]: fn.compute_position.html
//! [`render`]: fn.render.html

pub mod container;
pub mod line;
pub mod linebreak;
pub mod page;

pub use page::{AbsolutePagePos, PageCursor, PageLayout, RelativePos};

use std::rc::Rc;

use crate::error::Error;
use crate::fonts::FontCache;
use crate::interp::Interpreter;
use crate::pdf;
use crate::style::Style;
use crate::tree::{Direction, ImageData, LinkDestination, PathStyle};
use crate::{LayoutSize, Mm, Position, Size};

use self::line::LineMetrics;

/// The index of a layout object within its [`LayoutTree`](struct.LayoutTree.html).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LayoutId(usize);

/// The arena holding all layout objects of one pass.
#[derive(Debug, Default)]
pub struct LayoutTree {
    objects: Vec<LayoutObject>,
}

impl LayoutTree {
    /// Creates an empty layout tree.
    pub fn new() -> LayoutTree {
        LayoutTree::default()
    }

    /// Adds an object to the tree and returns its id.
    pub fn alloc(&mut self, object: LayoutObject) -> LayoutId {
        self.objects.push(object);
        LayoutId(self.objects.len() - 1)
    }

    /// Returns the object with the given id.
    pub fn get(&self, id: LayoutId) -> &LayoutObject {
        &self.objects[id.0]
    }

    /// Returns the object with the given id mutably.
    pub fn get_mut(&mut self, id: LayoutId) -> &mut LayoutObject {
        &mut self.objects[id.0]
    }

    /// Returns the number of objects in the tree.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// A positioned run of glyphs in a single style.
#[derive(Clone, Debug)]
pub struct Word {
    /// The text of the word.
    pub text: String,
    /// The horizontal offset from the start of the containing line.
    pub offset: Mm,
    /// The baseline shift.
    pub raise: Mm,
}

/// A laid-out line of words and spans.
#[derive(Clone, Debug)]
pub struct Line {
    /// The measured metrics of the line.
    pub metrics: LineMetrics,
    /// The children of the line, words and layout spans in visual order.
    pub children: Vec<LayoutId>,
}

/// The identity-preserving trace of an inline span on one line.
#[derive(Clone, Debug)]
pub struct SpanBox {
    /// The horizontal offset from the start of the containing line.
    pub offset: Mm,
    /// The baseline shift.
    pub raise: Mm,
}

/// A positioned group of layout objects.
#[derive(Clone, Debug)]
pub struct ContainerBox {
    /// The stacking direction.
    pub direction: Direction,
    /// The children, in document order.
    pub children: Vec<LayoutId>,
    /// The pre-built border path objects, if any.
    pub borders: Vec<LayoutId>,
    /// The padding and border inset at the top and left.
    pub inset: Position,
    /// The padding and border inset at the bottom.
    pub inset_bottom: Mm,
    /// Whether this container holds the lines of one paragraph, which are spaced by line
    /// leading instead of paragraph spacing.
    pub is_paragraph: bool,
    /// Whether the container must not be broken across pages.
    pub glued: bool,
}

/// A segment of a path, with positions relative to the path's origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    /// Begins a new subpath.
    MoveTo(Position),
    /// A straight line.
    LineTo(Position),
    /// A cubic Bézier curve with two control points.
    CubicBezier(Position, Position, Position),
    /// A cubic Bézier curve whose first control point coincides with the current point.
    CubicStart(Position, Position),
    /// A cubic Bézier curve whose second control point coincides with the endpoint.
    CubicEnd(Position, Position),
    /// A rectangle.
    Rectangle(Position, Size),
    /// Closes the current subpath.
    ClosePath,
}

/// The payload of a [`LayoutObject`](struct.LayoutObject.html).
#[derive(Clone, Debug)]
pub enum LayoutKind {
    /// A run of glyphs.
    Word(Word),
    /// A line of words.
    Line(Line),
    /// A span trace on a line.
    Span(SpanBox),
    /// A group of objects.
    Container(ContainerBox),
    /// An image.
    Image(Rc<ImageData>),
    /// Empty space.
    Spacer,
    /// A stroked or filled path.
    Path(Vec<PathSegment>, PathStyle),
}

/// Where an object ended up on the page canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObjectPosition {
    /// Positioned by cursor flow, relative to the content area.
    Relative(RelativePos),
    /// Pinned to a paper position.
    Absolute(AbsolutePagePos),
}

/// One object of the layout tree: a payload plus size, style and position.
#[derive(Debug)]
pub struct LayoutObject {
    /// The payload.
    pub kind: LayoutKind,
    /// The effective style the object was laid out with.
    pub style: Style,
    /// The size of the object.
    pub size: LayoutSize,
    /// The computed position; `None` until positions have been computed.
    pub position: Option<ObjectPosition>,
    /// Pins the object to an absolute position instead of the cursor flow.
    pub absolute_override: Option<AbsolutePagePos>,
    /// An extra offset added to the flowed position.
    pub offset: Option<Position>,
    /// The link destination attached to the object, if any.
    pub link: Option<LinkDestination>,
}

impl LayoutObject {
    /// Creates a new, unpositioned layout object.
    pub fn new(kind: LayoutKind, style: Style, size: LayoutSize) -> LayoutObject {
        LayoutObject {
            kind,
            style,
            size,
            position: None,
            absolute_override: None,
            offset: None,
            link: None,
        }
    }

    /// Returns whether this object stays out of the cursor flow.
    ///
    /// Phantom objects do not advance their parent's cursor and do not take part in paragraph
    /// spacing.
    pub fn is_phantom(&self) -> bool {
        self.absolute_override.is_some()
    }

    /// Overrides the computed width of this object.
    pub fn override_width(&mut self, width: Mm) {
        self.size.width = width;
    }

    /// Overrides the computed height of this object, keeping its ascent.
    pub fn override_height(&mut self, height: Mm) {
        self.size.descent = height - self.size.ascent;
    }

    /// Adds an extra offset to the flowed position of this object.
    pub fn add_offset(&mut self, offset: Position) {
        let combined = match self.offset {
            Some(existing) => existing + offset,
            None => offset,
        };
        self.offset = Some(combined);
    }

    /// Resolves the absolute paper position of this object.
    ///
    /// # Panics
    ///
    /// Panics if positions have not been computed yet.
    pub fn absolute_position(&self, layout: &PageLayout) -> AbsolutePagePos {
        match self.position.expect("layout object has no position") {
            ObjectPosition::Relative(pos) => layout.to_absolute(pos),
            ObjectPosition::Absolute(pos) => pos,
        }
    }
}

/// Computes the positions of the given object and all of its descendants.
///
/// The cursor must sit at the object's reference point: the baseline for lines, the top-left
/// corner for containers.  Returns the cursor for the content following the object in vertical
/// flow, carriage-returned below it.
pub fn compute_position(
    tree: &mut LayoutTree,
    layout: &mut PageLayout,
    id: LayoutId,
    cursor: PageCursor,
) -> PageCursor {
    if let Some(absolute) = tree.get(id).absolute_override {
        let inner = layout.new_cursor_at_position(absolute);
        position_at(tree, layout, id, inner);
        tree.get_mut(id).position = Some(ObjectPosition::Absolute(absolute));
        return cursor;
    }
    position_at(tree, layout, id, cursor)
}

/// Positions an object at the cursor and threads the cursor through its children.
fn position_at(
    tree: &mut LayoutTree,
    layout: &mut PageLayout,
    id: LayoutId,
    mut cursor: PageCursor,
) -> PageCursor {
    if let Some(offset) = tree.get(id).offset {
        cursor = layout.move_right(cursor, offset.x);
        cursor = layout.move_down(cursor, offset.y);
    }

    tree.get_mut(id).position = Some(ObjectPosition::Relative(cursor.position()));

    match tree.get(id).kind.clone() {
        LayoutKind::Word(_) | LayoutKind::Span(_) => cursor,
        LayoutKind::Line(line) => {
            // words and spans carry offsets relative to the line; only the line advances
            for child in line.children {
                tree.get_mut(child).position =
                    Some(ObjectPosition::Relative(cursor.position()));
            }
            let descent = tree.get(id).size.descent;
            let (cursor, _) = layout.new_line(cursor, descent);
            cursor
        }
        LayoutKind::Container(container) => {
            position_container(tree, layout, id, &container, cursor)
        }
        LayoutKind::Image(_) | LayoutKind::Spacer | LayoutKind::Path(..) => {
            let descent = tree.get(id).size.descent;
            let (cursor, _) = layout.new_line(cursor, descent);
            cursor
        }
    }
}

fn position_container(
    tree: &mut LayoutTree,
    layout: &mut PageLayout,
    id: LayoutId,
    container: &ContainerBox,
    entry: PageCursor,
) -> PageCursor {
    let size = tree.get(id).size;
    let style = tree.get(id).style;

    let entry = if container.glued {
        let (entry, _) = layout.ensure_vertical_space(entry, size.total_height());
        entry
    } else {
        entry
    };
    tree.get_mut(id).position = Some(ObjectPosition::Relative(entry.position()));

    // the entry cursor sits at the reference point: vertical containers have no ascent, so it
    // is their top-left corner; horizontal containers and z-stacks receive their baseline
    let top = layout.move_down(entry, Mm(0.0) - size.ascent);
    for &border in &container.borders {
        tree.get_mut(border).position = Some(ObjectPosition::Relative(top.position()));
    }

    match container.direction {
        Direction::Vertical => {
            let mut cursor = layout.move_right(entry, container.inset.x);
            cursor = layout.move_down(cursor, container.inset.y);
            let inner_width = size.width - container.inset.x * 2.0;
            cursor = layout.limit_width(cursor, inner_width.max(Mm(0.0)));

            let mut prev_phantom = true;
            let mut prev_descent = Mm(0.0);
            let mut first = true;
            for &child in &container.children {
                if tree.get(child).is_phantom() {
                    cursor = compute_position(tree, layout, child, cursor);
                    continue;
                }
                let child_size = effective_size(tree.get(child));
                let advance = if container.is_paragraph {
                    if first {
                        child_size.ascent
                    } else {
                        let leading = line_leading(tree, child);
                        (leading.max(prev_descent + child_size.ascent)) - prev_descent
                    }
                } else {
                    if !first && !prev_phantom {
                        cursor = layout.move_down(cursor, style.paragraph_spacing());
                    }
                    child_size.ascent
                };
                let (next, _) = layout.new_line(cursor, advance);
                cursor = compute_position(tree, layout, child, next);
                prev_phantom = false;
                prev_descent = child_size.descent;
                first = false;
            }
            cursor = layout.move_down(cursor, container.inset_bottom);
            layout.carriage_return(cursor)
        }
        Direction::Horizontal => {
            let mut x = container.inset.x;
            for &child in &container.children {
                if tree.get(child).is_phantom() {
                    compute_position(tree, layout, child, entry);
                    continue;
                }
                let child_size = effective_size(tree.get(child));
                let mut child_cursor = layout.move_right(entry, x);
                child_cursor = layout.limit_width(child_cursor, child_size.width);
                compute_position(tree, layout, child, child_cursor);
                x += child_size.width;
            }
            let (next, _) = layout.new_line(entry, size.descent);
            next
        }
        Direction::None => {
            for &child in &container.children {
                let child_size = effective_size(tree.get(child));
                let mut child_cursor = layout.move_right(entry, container.inset.x);
                child_cursor = layout.limit_width(child_cursor, child_size.width);
                compute_position(tree, layout, child, child_cursor);
            }
            let (next, _) = layout.new_line(entry, size.descent);
            next
        }
    }
}

fn effective_size(object: &LayoutObject) -> LayoutSize {
    object.size
}

/// Returns the leading to use before a line child of a paragraph container.
fn line_leading(tree: &LayoutTree, child: LayoutId) -> Mm {
    match &tree.get(child).kind {
        LayoutKind::Line(line) => line.metrics.default_line_spacing,
        _ => tree.get(child).size.total_height(),
    }
}

/// Renders the positioned layout tree into PDF pages.
///
/// Fonts are registered with the PDF document as they are used; annotation targets are resolved
/// through the interpreter's node → layout object map.
pub fn render(
    tree: &LayoutTree,
    root: LayoutId,
    layout: &PageLayout,
    interp: &dyn Interpreter,
    fonts: &FontCache,
    doc: &mut pdf::Document,
) -> Result<(), Error> {
    let mut renderer = Renderer {
        tree,
        layout,
        interp,
        fonts,
        doc,
    };
    renderer.render_object(root)
}

struct Renderer<'a> {
    tree: &'a LayoutTree,
    layout: &'a PageLayout,
    interp: &'a dyn Interpreter,
    fonts: &'a FontCache,
    doc: &'a mut pdf::Document,
}

impl<'a> Renderer<'a> {
    fn render_object(&mut self, id: LayoutId) -> Result<(), Error> {
        let object = self.tree.get(id);
        if object.position.is_none() {
            return Ok(());
        }
        let pos = object.absolute_position(self.layout);

        match &object.kind {
            LayoutKind::Line(layout_line) => {
                self.render_line(id, layout_line, pos)?;
            }
            LayoutKind::Container(container) => {
                for &border in &container.borders {
                    self.render_object(border)?;
                }
                for &child in &container.children {
                    self.render_object(child)?;
                }
            }
            LayoutKind::Image(data) => {
                let size = object.size;
                self.doc.place_image(
                    pos.page,
                    data,
                    pos.pos.x,
                    pos.pos.y - size.ascent,
                    size.width,
                    size.total_height(),
                )?;
            }
            LayoutKind::Path(segments, style) => {
                self.doc.draw_path(pos.page, pos.pos, segments, style)?;
            }
            LayoutKind::Spacer | LayoutKind::Word(_) | LayoutKind::Span(_) => {}
        }

        self.emit_link(object, pos)?;
        Ok(())
    }

    fn render_line(
        &mut self,
        _id: LayoutId,
        layout_line: &Line,
        line_pos: AbsolutePagePos,
    ) -> Result<(), Error> {
        let mut text = pdf::Text::new();
        let page_index = line_pos.page;
        text.move_abs(
            self.doc.to_page_space(page_index, line_pos.pos.x, line_pos.pos.y),
        );

        let mut current_font: Option<(crate::fonts::Font, Mm)> = None;
        let mut current_color = None;
        let mut current_raise = Mm(0.0);
        let mut prev_end = Mm(0.0);

        for &child in &layout_line.children {
            let object = self.tree.get(child);
            let word = match &object.kind {
                LayoutKind::Word(word) => word,
                LayoutKind::Span(span) => {
                    self.emit_span_link(object, span, line_pos)?;
                    continue;
                }
                _ => continue,
            };
            if word.text.is_empty() {
                continue;
            }

            let style = object.style;
            let font = style.font();
            let font_size = style.font_size();

            // the font must be current before any TJ adjustment is emitted
            if current_font != Some((font, font_size)) {
                let pdf_font = self.doc.font_for(self.fonts.source(font));
                let name = self.doc.page_mut(page_index).register_font(&pdf_font);
                text.set_font(&name, &pdf_font, font_size.to_pt());
                current_font = Some((font, font_size));
            }

            let gap = word.offset - prev_end;
            if gap.abs() > Mm(1e-9) {
                text.offset_text_space(gap.to_pt());
            }
            if style.has_color() && current_color != Some(style.color()) {
                text.set_color(style.color());
                current_color = Some(style.color());
            }
            if word.raise != current_raise {
                text.rise(word.raise.to_pt());
                current_raise = word.raise;
            }

            let source = self.fonts.source(font);
            let units_per_em = source.font_metrics().units_per_em;
            let shaped = font.shape(self.fonts, &word.text);
            let pdf_font = self.doc.font_for(source);
            for glyph in &shaped.glyphs {
                pdf_font.note_glyph(glyph.glyph, source.glyph_to_char(glyph.glyph));
                text.add_glyph(&pdf_font, glyph.glyph);
                let natural = source.glyph_metrics(glyph.glyph).horz_advance;
                let kern = glyph.advance - natural;
                if kern.abs() > 1e-9 {
                    text.offset_glyph_units(kern * 1000.0 / units_per_em);
                }
            }

            prev_end = word.offset + object.size.width;
        }

        self.doc.page_mut(page_index).add_text(text);
        Ok(())
    }

    fn emit_span_link(
        &mut self,
        object: &LayoutObject,
        span: &SpanBox,
        line_pos: AbsolutePagePos,
    ) -> Result<(), Error> {
        if object.link.is_none() {
            return Ok(());
        }
        let pos = AbsolutePagePos {
            page: line_pos.page,
            pos: Position::new(line_pos.pos.x + span.offset, line_pos.pos.y),
        };
        self.emit_link(object, pos)
    }

    fn emit_link(&mut self, object: &LayoutObject, pos: AbsolutePagePos) -> Result<(), Error> {
        let link = match &object.link {
            Some(link) => link.clone(),
            None => return Ok(()),
        };
        let target = match link {
            LinkDestination::Position(target) => Some(target),
            LinkDestination::Node(node) => self
                .interp
                .layout_objects_for(node)
                .first()
                .map(|&target_id| self.tree.get(target_id).absolute_position(self.layout)),
        };
        let target = match target {
            Some(target) => target,
            None => {
                log::warn!("link destination does not exist in this pass");
                return Ok(());
            }
        };
        let size = object.size;
        self.doc.add_link(
            pos.page,
            pos.pos.x,
            pos.pos.y - size.ascent,
            size.width,
            size.total_height(),
            target,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;
    use crate::Margins;

    fn block(size: LayoutSize) -> LayoutObject {
        LayoutObject::new(
            LayoutKind::Spacer,
            Style::new().with_paragraph_spacing(Mm(6.0)),
            size,
        )
    }

    #[test]
    fn vertical_flow_advances_by_ascent_and_descent() {
        let mut tree = LayoutTree::new();
        let mut layout = PageLayout::new(Size::new(210, 297), Margins::all(0));

        let a = tree.alloc(block(LayoutSize::new(Mm(10.0), Mm(5.0), Mm(2.0))));
        let b = tree.alloc(block(LayoutSize::new(Mm(10.0), Mm(7.0), Mm(3.0))));
        let container = tree.alloc(LayoutObject::new(
            LayoutKind::Container(ContainerBox {
                direction: Direction::Vertical,
                children: vec![a, b],
                borders: Vec::new(),
                inset: Position::default(),
                inset_bottom: Mm(0.0),
                is_paragraph: false,
                glued: false,
            }),
            Style::new().with_paragraph_spacing(Mm(6.0)),
            LayoutSize::new(Mm(10.0), Mm(0.0), Mm(23.0)),
        ));

        let cursor = layout.new_cursor();
        compute_position(&mut tree, &mut layout, container, cursor);

        let pos_a = match tree.get(a).position.unwrap() {
            ObjectPosition::Relative(pos) => pos.pos,
            _ => panic!(),
        };
        let pos_b = match tree.get(b).position.unwrap() {
            ObjectPosition::Relative(pos) => pos.pos,
            _ => panic!(),
        };
        // baseline distance = descent(a) + paragraph spacing + ascent(b)
        assert_approx(pos_a.y, Mm(5.0));
        assert_approx(pos_b.y - pos_a.y, Mm(2.0) + Mm(6.0) + Mm(7.0));
    }

    #[test]
    fn phantom_children_do_not_advance() {
        let mut tree = LayoutTree::new();
        let mut layout = PageLayout::new(Size::new(210, 297), Margins::all(0));

        let a = tree.alloc(block(LayoutSize::new(Mm(10.0), Mm(5.0), Mm(2.0))));
        let mut phantom = block(LayoutSize::new(Mm(10.0), Mm(5.0), Mm(2.0)));
        phantom.absolute_override = Some(AbsolutePagePos {
            page: 0,
            pos: Position::new(100, 100),
        });
        let p = tree.alloc(phantom);
        let b = tree.alloc(block(LayoutSize::new(Mm(10.0), Mm(5.0), Mm(2.0))));

        let container = tree.alloc(LayoutObject::new(
            LayoutKind::Container(ContainerBox {
                direction: Direction::Vertical,
                children: vec![a, p, b],
                borders: Vec::new(),
                inset: Position::default(),
                inset_bottom: Mm(0.0),
                is_paragraph: false,
                glued: false,
            }),
            Style::new().with_paragraph_spacing(Mm(6.0)),
            LayoutSize::new(Mm(10.0), Mm(0.0), Mm(20.0)),
        ));

        let cursor = layout.new_cursor();
        compute_position(&mut tree, &mut layout, container, cursor);

        match tree.get(p).position.unwrap() {
            ObjectPosition::Absolute(pos) => assert_approx(pos.pos.x, Mm(100.0)),
            _ => panic!("phantom child must be absolutely positioned"),
        }
        let pos_a = match tree.get(a).position.unwrap() {
            ObjectPosition::Relative(pos) => pos.pos,
            _ => panic!(),
        };
        let pos_b = match tree.get(b).position.unwrap() {
            ObjectPosition::Relative(pos) => pos.pos,
            _ => panic!(),
        };
        assert_approx(pos_b.y - pos_a.y, Mm(2.0) + Mm(6.0) + Mm(5.0));
    }
}
