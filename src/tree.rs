// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The document tree.
//!
//! Documents are trees of [`InlineObject`][]s (text, separators, spans, script calls) inside
//! [`BlockObject`][]s (paragraphs, containers, images, …).  Nodes are shared via [`Rc`][] and are
//! structurally immutable after construction; the only mutable state is a small set of side-band
//! attributes (style override, raise height, link destination) that scripts may adjust between
//! layout passes.
//!
//! Before a paragraph is line-broken, its inline stream is rewritten twice:
//!
//! - [`apply_smart_quotes`][] replaces ASCII quotes with typographic ones,
//! - [`process_word_separators`][] collapses whitespace into [`Separator`][]s, splits words
//!   around hard break characters and inserts hyphenation points.
//!
//! [`InlineObject`]: struct.InlineObject.html
//! [`BlockObject`]: struct.BlockObject.html
//! [`Separator`]: struct.Separator.html
//! [`apply_smart_quotes`]: fn.apply_smart_quotes.html
//! [`process_word_separators`]: fn.process_word_separators.html
//! [`Rc`]: https://doc.rust-lang.org/std/rc/struct.Rc.html

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::hyphenate::Hyphenator;
use crate::interp::{Interpreter, ScriptCall};
use crate::layout::AbsolutePagePos;
use crate::style::Style;
use crate::{DynLength, DynSize, Mm, Size};

/// A shared reference to an inline object.
pub type InlineNode = Rc<InlineObject>;

/// A shared reference to a block object.
pub type BlockNode = Rc<BlockObject>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// The identity of a tree node.
///
/// Node ids are unique within a process and are the key of the interpreter's node → layout object
/// map.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u64);

impl NodeId {
    fn fresh() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The destination of an internal link.
#[derive(Clone, Debug)]
pub enum LinkDestination {
    /// A fixed position on a page.
    Position(AbsolutePagePos),
    /// The position of another tree node, resolved after layout through the interpreter's
    /// node → layout object map.
    Node(NodeId),
}

/// The mutable side-band attributes shared by all tree nodes.
#[derive(Debug, Default)]
pub struct NodeAttrs {
    id: OnceId,
    style: RefCell<Style>,
    raise: Cell<Mm>,
    link: RefCell<Option<LinkDestination>>,
}

#[derive(Debug)]
struct OnceId(NodeId);

impl Default for OnceId {
    fn default() -> OnceId {
        OnceId(NodeId::fresh())
    }
}

impl NodeAttrs {
    fn copied_from(other: &NodeAttrs) -> NodeAttrs {
        NodeAttrs {
            id: OnceId::default(),
            style: RefCell::new(*other.style.borrow()),
            raise: Cell::new(other.raise.get()),
            link: RefCell::new(other.link.borrow().clone()),
        }
    }

    /// Returns the identity of this node.
    pub fn id(&self) -> NodeId {
        self.id.0
    }

    /// Returns the style override of this node.
    pub fn style(&self) -> Style {
        *self.style.borrow()
    }

    /// Extends the style override of this node with the given style.
    pub fn apply_style(&self, style: Style) {
        let combined = self.style.borrow().extend_with(style);
        *self.style.borrow_mut() = combined;
    }

    /// Returns the baseline offset of this node.
    pub fn raise(&self) -> Mm {
        self.raise.get()
    }

    /// Sets the baseline offset of this node.
    pub fn set_raise(&self, raise: Mm) {
        self.raise.set(raise);
    }

    /// Returns the link destination of this node, if any.
    pub fn link(&self) -> Option<LinkDestination> {
        self.link.borrow().clone()
    }

    /// Sets the link destination of this node.
    pub fn set_link(&self, link: LinkDestination) {
        *self.link.borrow_mut() = Some(link);
    }
}

/// The kind of a [`Separator`](struct.Separator.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeparatorKind {
    /// An inter-word space.
    Space,
    /// A space following the end of a sentence; stretched by the style's sentence space factor.
    SentenceEnd,
    /// A break opportunity after a hard break character (`-`, `/`, `.`); renders nothing.
    BreakPoint,
    /// A hyphenation opportunity inside a word; renders a hyphen if chosen as a line break.
    HyphenationPoint,
}

/// A potential line-break point between words.
///
/// A separator has two rendered faces: one in the middle of a line and one at the end of a line.
/// Spaces render as a space mid-line and vanish at a line end; hyphenation points render nothing
/// mid-line and a hyphen at a line end.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Separator {
    kind: SeparatorKind,
    hyphenation_cost: u8,
}

impl Separator {
    /// Creates a new separator.
    pub fn new(kind: SeparatorKind, hyphenation_cost: u8) -> Separator {
        Separator {
            kind,
            hyphenation_cost,
        }
    }

    /// Returns the kind of this separator.
    pub fn kind(&self) -> SeparatorKind {
        self.kind
    }

    /// Returns the cost of breaking a line at this separator.
    pub fn hyphenation_cost(&self) -> u8 {
        self.hyphenation_cost
    }

    /// Returns the face rendered when the separator sits in the middle of a line.
    pub fn middle_of_line(&self) -> &'static str {
        match self.kind {
            SeparatorKind::Space | SeparatorKind::SentenceEnd => " ",
            SeparatorKind::BreakPoint | SeparatorKind::HyphenationPoint => "",
        }
    }

    /// Returns the face rendered when the separator ends a line.
    pub fn end_of_line(&self) -> &'static str {
        match self.kind {
            SeparatorKind::HyphenationPoint => "-",
            _ => "",
        }
    }

    /// Returns whether this separator contributes elastic space.
    pub fn is_elastic(&self) -> bool {
        matches!(self.kind, SeparatorKind::Space | SeparatorKind::SentenceEnd)
    }

    /// Returns whether this separator ends a sentence.
    pub fn is_sentence_end(&self) -> bool {
        self.kind == SeparatorKind::SentenceEnd
    }
}

/// An inline grouping that preserves its identity across line breaks.
#[derive(Debug)]
pub struct InlineSpan {
    children: RefCell<Vec<InlineNode>>,
    glued: bool,
    overridden_width: Cell<Option<Mm>>,
}

impl InlineSpan {
    /// Returns the children of this span.
    pub fn children(&self) -> std::cell::Ref<'_, Vec<InlineNode>> {
        self.children.borrow()
    }

    /// Replaces the children of this span.
    pub fn set_children(&self, children: Vec<InlineNode>) {
        *self.children.borrow_mut() = children;
    }

    /// Appends a child to this span.
    pub fn push(&self, child: InlineNode) {
        self.children.borrow_mut().push(child);
    }

    /// Returns whether the children of this span must stay on one line.
    pub fn glued(&self) -> bool {
        self.glued
    }

    /// Returns the fixed width of this span, if one is set.
    pub fn overridden_width(&self) -> Option<Mm> {
        self.overridden_width.get()
    }

    /// Fixes the width of this span.
    pub fn set_overridden_width(&self, width: Option<Mm>) {
        self.overridden_width.set(width);
    }
}

/// The payload of an [`InlineObject`](struct.InlineObject.html).
pub enum InlineKind {
    /// A run of text.
    Text(RefCell<String>),
    /// A potential line break.
    Separator(Separator),
    /// An identity-preserving group of inline objects.
    Span(InlineSpan),
    /// An unevaluated script call producing inline content.
    Script(ScriptCall),
}

impl fmt::Debug for InlineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineKind::Text(text) => write!(f, "Text({:?})", text.borrow()),
            InlineKind::Separator(sep) => write!(f, "Separator({:?})", sep.kind()),
            InlineKind::Span(span) => write!(f, "Span({} children)", span.children().len()),
            InlineKind::Script(_) => f.write_str("Script"),
        }
    }
}

/// An object in the inline flow of a paragraph or line.
#[derive(Debug)]
pub struct InlineObject {
    attrs: NodeAttrs,
    kind: InlineKind,
}

impl InlineObject {
    /// Creates a text node.
    pub fn text(contents: impl Into<String>) -> InlineNode {
        Rc::new(InlineObject {
            attrs: NodeAttrs::default(),
            kind: InlineKind::Text(RefCell::new(contents.into())),
        })
    }

    /// Creates a separator node.
    pub fn separator(kind: SeparatorKind, hyphenation_cost: u8) -> InlineNode {
        Rc::new(InlineObject {
            attrs: NodeAttrs::default(),
            kind: InlineKind::Separator(Separator::new(kind, hyphenation_cost)),
        })
    }

    /// Creates a span node over the given children.
    pub fn span(children: Vec<InlineNode>, glued: bool) -> InlineNode {
        Rc::new(InlineObject {
            attrs: NodeAttrs::default(),
            kind: InlineKind::Span(InlineSpan {
                children: RefCell::new(children),
                glued,
                overridden_width: Cell::new(None),
            }),
        })
    }

    /// Creates a script call node.
    pub fn script(call: ScriptCall) -> InlineNode {
        Rc::new(InlineObject {
            attrs: NodeAttrs::default(),
            kind: InlineKind::Script(call),
        })
    }

    fn derived(source: &InlineObject, kind: InlineKind) -> InlineNode {
        Rc::new(InlineObject {
            attrs: NodeAttrs::copied_from(&source.attrs),
            kind,
        })
    }

    /// Returns the side-band attributes of this node.
    pub fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    /// Returns the identity of this node.
    pub fn id(&self) -> NodeId {
        self.attrs.id()
    }

    /// Returns the payload of this node.
    pub fn kind(&self) -> &InlineKind {
        &self.kind
    }

    /// Returns the text contents if this is a text node.
    pub fn as_text(&self) -> Option<String> {
        match &self.kind {
            InlineKind::Text(text) => Some(text.borrow().clone()),
            _ => None,
        }
    }

    /// Returns the separator if this is a separator node.
    pub fn as_separator(&self) -> Option<&Separator> {
        match &self.kind {
            InlineKind::Separator(sep) => Some(sep),
            _ => None,
        }
    }

    /// Returns the span if this is a span node.
    pub fn as_span(&self) -> Option<&InlineSpan> {
        match &self.kind {
            InlineKind::Span(span) => Some(span),
            _ => None,
        }
    }
}

/// The stacking direction of a [`Container`](struct.Container.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Children are stacked on top of each other (a z-stack).
    None,
    /// Children are stacked top to bottom.
    Vertical,
    /// Children are placed left to right.
    Horizontal,
}

/// The cap style of a stroked path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CapStyle {
    /// The stroke ends exactly at the endpoint.
    Butt,
    /// The stroke ends with a half-circle around the endpoint.
    Round,
    /// The stroke projects half a line width beyond the endpoint.
    Projecting,
}

/// The join style of a stroked path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinStyle {
    /// Outer edges are extended until they meet.
    Miter,
    /// Joints are rounded.
    Round,
    /// Joints are cut off.
    Bevel,
}

/// The paint attributes of a path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathStyle {
    /// The stroke width.
    pub line_width: Mm,
    /// The cap style.
    pub cap: CapStyle,
    /// The join style.
    pub join: JoinStyle,
    /// The miter limit.
    pub miter_limit: f64,
    /// The stroke color, if the path is stroked.
    pub stroke: Option<crate::style::Color>,
    /// The fill color, if the path is filled.
    pub fill: Option<crate::style::Color>,
}

impl Default for PathStyle {
    fn default() -> PathStyle {
        PathStyle {
            line_width: Mm::from_pt(1.0),
            cap: CapStyle::Butt,
            join: JoinStyle::Miter,
            miter_limit: 4.0,
            stroke: Some(crate::style::Color::black()),
            fill: None,
        }
    }
}

/// The borders and padding of a [`Container`](struct.Container.html).
#[derive(Clone, Debug, Default)]
pub struct BorderStyle {
    /// The top border, if drawn.
    pub top: Option<PathStyle>,
    /// The left border, if drawn.
    pub left: Option<PathStyle>,
    /// The right border, if drawn.
    pub right: Option<PathStyle>,
    /// The bottom border, if drawn.
    pub bottom: Option<PathStyle>,
    /// The padding inside the top border.
    pub padding_top: DynLength,
    /// The padding inside the left border.
    pub padding_left: DynLength,
    /// The padding inside the right border.
    pub padding_right: DynLength,
    /// The padding inside the bottom border.
    pub padding_bottom: DynLength,
}

/// Flow content that is broken into lines.
#[derive(Debug, Default)]
pub struct Paragraph {
    children: RefCell<Vec<InlineNode>>,
}

impl Paragraph {
    /// Returns the inline children of this paragraph.
    pub fn children(&self) -> std::cell::Ref<'_, Vec<InlineNode>> {
        self.children.borrow()
    }

    /// Replaces the inline children of this paragraph.
    pub fn set_children(&self, children: Vec<InlineNode>) {
        *self.children.borrow_mut() = children;
    }

    /// Appends an inline child.
    pub fn push(&self, child: InlineNode) {
        self.children.borrow_mut().push(child);
    }
}

/// A block that stacks children horizontally, vertically or on top of each other.
#[derive(Debug)]
pub struct Container {
    direction: Direction,
    glued: bool,
    border: BorderStyle,
    children: RefCell<Vec<BlockNode>>,
}

impl Container {
    /// Returns the stacking direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns whether the children must stay on one page.
    pub fn glued(&self) -> bool {
        self.glued
    }

    /// Returns the border style.
    pub fn border(&self) -> &BorderStyle {
        &self.border
    }

    /// Returns the block children of this container.
    pub fn children(&self) -> std::cell::Ref<'_, Vec<BlockNode>> {
        self.children.borrow()
    }

    /// Appends a block child.
    pub fn push(&self, child: BlockNode) {
        self.children.borrow_mut().push(child);
    }
}

/// Decoded image data, as consumed by the layout engine.
///
/// Image decoding itself is delegated to the [`image`](https://docs.rs/image) crate; see
/// [`ImageData::load`](#method.load).
#[derive(Clone, Debug)]
pub enum ImageData {
    /// 8-bit RGB pixel data, row-major.
    Rgb8 {
        /// The width in pixels.
        width: u32,
        /// The height in pixels.
        height: u32,
        /// The pixel bytes, three per pixel.
        data: Vec<u8>,
    },
    /// A raw JPEG file, embedded without re-encoding.
    Jpeg {
        /// The width in pixels.
        width: u32,
        /// The height in pixels.
        height: u32,
        /// The JPEG bytes.
        data: Vec<u8>,
    },
}

impl ImageData {
    /// Loads the image file at the given path.
    ///
    /// JPEG files are kept as-is and embedded directly; all other formats are decoded to RGB.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<ImageData, Error> {
        use crate::error::Context as _;
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Could not read image file {}", path.display()))?;
        if bytes.starts_with(&[0xff, 0xd8]) {
            let (width, height) = image::image_dimensions(path)
                .map_err(|err| Error::new(format!("Invalid JPEG: {}", err), crate::error::ErrorKind::InvalidData))?;
            return Ok(ImageData::Jpeg {
                width,
                height,
                data: bytes,
            });
        }
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| Error::new(format!("Invalid image: {}", err), crate::error::ErrorKind::InvalidData))?
            .to_rgb8();
        Ok(ImageData::Rgb8 {
            width: decoded.width(),
            height: decoded.height(),
            data: decoded.into_raw(),
        })
    }

    /// Returns the pixel dimensions of the image.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageData::Rgb8 { width, height, .. } => (*width, *height),
            ImageData::Jpeg { width, height, .. } => (*width, *height),
        }
    }
}

/// An image block with a display size.
#[derive(Debug)]
pub struct Image {
    /// The image data.
    pub data: Rc<ImageData>,
    /// The display size.
    pub size: DynSize,
}

/// A fixed amount of empty space.
#[derive(Debug)]
pub struct Spacer {
    /// The size of the spacer.
    pub size: DynSize,
}

/// Verbatim lines that are laid out without wrapping, justification or hyphenation.
#[derive(Debug)]
pub struct RawBlock {
    /// The lines of the block.
    pub lines: Vec<String>,
}

/// The callback of a [`DeferredBlock`](struct.DeferredBlock.html).
pub type DeferredFn = Box<dyn Fn(&mut dyn Interpreter, Size) -> Result<BlockNode, Error>>;

/// A block whose content is produced by a callback at layout time.
///
/// The produced subtree is retained here so that node identities stay valid across layout passes
/// within the pass that produced them.
pub struct DeferredBlock {
    produce: DeferredFn,
    produced: RefCell<Option<BlockNode>>,
}

impl DeferredBlock {
    /// Invokes the callback and retains the produced subtree.
    pub fn produce(
        &self,
        interp: &mut dyn Interpreter,
        available_space: Size,
    ) -> Result<BlockNode, Error> {
        let block = (self.produce)(interp, available_space)?;
        *self.produced.borrow_mut() = Some(Rc::clone(&block));
        Ok(block)
    }
}

impl fmt::Debug for DeferredBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredBlock")
    }
}

/// The payload of a [`BlockObject`](struct.BlockObject.html).
#[derive(Debug)]
pub enum BlockKind {
    /// Flow content, broken into lines.
    Paragraph(Paragraph),
    /// A single line that is never broken.
    WrappedLine(Paragraph),
    /// A stacking container.
    Container(Container),
    /// An image.
    Image(Image),
    /// Empty space.
    Spacer(Spacer),
    /// Verbatim lines.
    Raw(RawBlock),
    /// An unevaluated script call producing block content.
    Script(ScriptCall),
    /// A callback invoked at layout time.
    Deferred(DeferredBlock),
}

/// A block-level object of the document tree.
#[derive(Debug)]
pub struct BlockObject {
    attrs: NodeAttrs,
    kind: BlockKind,
}

impl BlockObject {
    /// Creates a paragraph from the given inline objects.
    pub fn paragraph(children: Vec<InlineNode>) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Paragraph(Paragraph {
                children: RefCell::new(children),
            }),
        })
    }

    /// Creates a single, non-breaking line from the given inline objects.
    pub fn wrapped_line(children: Vec<InlineNode>) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::WrappedLine(Paragraph {
                children: RefCell::new(children),
            }),
        })
    }

    /// Creates a container with the given direction.
    pub fn container(direction: Direction, glued: bool, border: BorderStyle) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Container(Container {
                direction,
                glued,
                border,
                children: RefCell::new(Vec::new()),
            }),
        })
    }

    /// Creates a vertical container without borders.
    pub fn vertical() -> BlockNode {
        BlockObject::container(Direction::Vertical, false, BorderStyle::default())
    }

    /// Creates a horizontal container without borders.
    pub fn horizontal() -> BlockNode {
        BlockObject::container(Direction::Horizontal, false, BorderStyle::default())
    }

    /// Creates a z-stack container without borders.
    pub fn stack() -> BlockNode {
        BlockObject::container(Direction::None, false, BorderStyle::default())
    }

    /// Creates an image block.
    pub fn image(data: Rc<ImageData>, size: DynSize) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Image(Image { data, size }),
        })
    }

    /// Creates a spacer block.
    pub fn spacer(size: DynSize) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Spacer(Spacer { size }),
        })
    }

    /// Creates a verbatim block from the given lines.
    pub fn raw(lines: Vec<String>) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Raw(RawBlock { lines }),
        })
    }

    /// Creates a block-level script call.
    pub fn script(call: ScriptCall) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Script(call),
        })
    }

    /// Creates a deferred block from the given callback.
    pub fn deferred(produce: DeferredFn) -> BlockNode {
        Rc::new(BlockObject {
            attrs: NodeAttrs::default(),
            kind: BlockKind::Deferred(DeferredBlock {
                produce,
                produced: RefCell::new(None),
            }),
        })
    }

    /// Returns the side-band attributes of this node.
    pub fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    /// Returns the identity of this node.
    pub fn id(&self) -> NodeId {
        self.attrs.id()
    }

    /// Returns the payload of this node.
    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Returns the container if this is a container node.
    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            BlockKind::Container(container) => Some(container),
            _ => None,
        }
    }
}

/// Replaces ASCII quotes in the given inline sequence with typographic quotes.
///
/// An apostrophe following a letter or digit becomes U+2019; other single quotes alternate
/// between U+2018 and U+2019, double quotes between U+201C and U+201D.  Only `Text` nodes are
/// rewritten.
pub fn apply_smart_quotes(objects: &[InlineNode]) {
    let mut state = QuoteState::default();
    smart_quotes_impl(objects, &mut state);
}

#[derive(Default)]
struct QuoteState {
    prev: Option<char>,
    single_open: bool,
    double_open: bool,
}

fn smart_quotes_impl(objects: &[InlineNode], state: &mut QuoteState) {
    for obj in objects {
        match obj.kind() {
            InlineKind::Text(text) => {
                let replaced: String = text
                    .borrow()
                    .chars()
                    .map(|c| {
                        let replacement = match c {
                            '\'' => {
                                if state.prev.map(char::is_alphanumeric).unwrap_or(false) {
                                    '\u{2019}'
                                } else if state.single_open {
                                    state.single_open = false;
                                    '\u{2019}'
                                } else {
                                    state.single_open = true;
                                    '\u{2018}'
                                }
                            }
                            '"' => {
                                if state.double_open {
                                    state.double_open = false;
                                    '\u{201D}'
                                } else {
                                    state.double_open = true;
                                    '\u{201C}'
                                }
                            }
                            c => c,
                        };
                        state.prev = Some(c);
                        replacement
                    })
                    .collect();
                *text.borrow_mut() = replaced;
            }
            InlineKind::Span(span) => {
                let children = span.children().clone();
                smart_quotes_impl(&children, state);
            }
            InlineKind::Separator(_) => {
                state.prev = Some(' ');
            }
            InlineKind::Script(_) => {
                state.prev = None;
            }
        }
    }
}

/// Rewrites a paragraph's inline stream into words and separators.
///
/// Consecutive ASCII whitespace inside `Text` nodes is collapsed into a single [`Separator`][] of
/// kind `Space` (or `SentenceEnd` after `.`, `!` or `?`).  Words containing hard break characters
/// (`-`, `/`, `.`) are split around them with `BreakPoint` separators; other words of at least two
/// code points are offered to the hyphenator, which yields `HyphenationPoint` separators with
/// their break costs.  Spans are rewritten in place so that their identities survive.
///
/// [`Separator`]: struct.Separator.html
pub fn process_word_separators(
    input: Vec<InlineNode>,
    hyphenator: Option<&Hyphenator>,
) -> Vec<InlineNode> {
    let mut out: Vec<InlineNode> = Vec::with_capacity(input.len());
    let mut first_obj = true;
    let mut seen_whitespace = false;

    for obj in input {
        match obj.kind() {
            InlineKind::Separator(_) | InlineKind::Script(_) => {
                out.push(Rc::clone(&obj));
                continue;
            }
            InlineKind::Span(span) => {
                let children = span.children().clone();
                span.set_children(process_word_separators(children, hyphenator));
                out.push(Rc::clone(&obj));
                seen_whitespace = false;
                first_obj = false;
                continue;
            }
            InlineKind::Text(text) => {
                let contents = text.borrow().clone();
                let mut current = String::new();
                for c in contents.chars() {
                    if c.is_ascii_whitespace() {
                        if !seen_whitespace {
                            if !current.is_empty() {
                                let sentence_end = matches!(
                                    current.chars().last(),
                                    Some('.') | Some('!') | Some('?')
                                );
                                let kind = if sentence_end {
                                    SeparatorKind::SentenceEnd
                                } else {
                                    SeparatorKind::Space
                                };
                                split_word(&mut out, &obj, std::mem::take(&mut current), hyphenator);
                                out.push(InlineObject::derived(
                                    &obj,
                                    InlineKind::Separator(Separator::new(kind, 0)),
                                ));
                            } else if !first_obj {
                                out.push(InlineObject::derived(
                                    &obj,
                                    InlineKind::Separator(Separator::new(SeparatorKind::Space, 0)),
                                ));
                            }
                            seen_whitespace = true;
                        }
                    } else {
                        current.push(c);
                        seen_whitespace = false;
                    }
                }
                if !current.is_empty() {
                    split_word(&mut out, &obj, current, hyphenator);
                }
                first_obj = false;
            }
        }
    }

    out
}

/// Splits a single word around hard break characters or hyphenation points.
fn split_word(
    out: &mut Vec<InlineNode>,
    source: &InlineNode,
    word: String,
    hyphenator: Option<&Hyphenator>,
) {
    let chars: Vec<char> = word.chars().collect();

    let core_start = chars.iter().take_while(|c| !c.is_alphabetic()).count();
    let core_end = chars.len() - chars[core_start..].iter().rev().take_while(|c| !c.is_alphabetic()).count();

    let text_node = |s: String| InlineObject::derived(source, InlineKind::Text(RefCell::new(s)));

    if core_start > 0 {
        out.push(text_node(chars[..core_start].iter().collect()));
    }

    let core = &chars[core_start..core_end];
    if core.iter().any(|c| !c.is_alphabetic()) {
        // manual break opportunities after -, / and .
        let mut part = String::new();
        for &c in core {
            part.push(c);
            if c == '-' || c == '/' || c == '.' {
                out.push(text_node(std::mem::take(&mut part)));
                out.push(InlineObject::derived(
                    source,
                    InlineKind::Separator(Separator::new(SeparatorKind::BreakPoint, 0)),
                ));
            }
        }
        if !part.is_empty() {
            out.push(text_node(part));
        }
    } else if core.len() >= 2 {
        if let Some(hyphenator) = hyphenator {
            let core_str: String = core.iter().collect();
            let points = hyphenator.points(&core_str);
            let mut segment = String::new();
            for (i, &c) in core.iter().enumerate() {
                if i > 0 && points[i] % 2 == 1 {
                    out.push(text_node(std::mem::take(&mut segment)));
                    out.push(InlineObject::derived(
                        source,
                        InlineKind::Separator(Separator::new(
                            SeparatorKind::HyphenationPoint,
                            Hyphenator::break_cost(points[i]),
                        )),
                    ));
                }
                segment.push(c);
            }
            if !segment.is_empty() {
                out.push(text_node(segment));
            }
        } else {
            out.push(text_node(core.iter().collect()));
        }
    } else if !core.is_empty() {
        out.push(text_node(core.iter().collect()));
    }

    if core_end < chars.len() {
        out.push(text_node(chars[core_end..].iter().collect()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(objects: &[InlineNode]) -> Vec<String> {
        objects
            .iter()
            .map(|obj| match obj.kind() {
                InlineKind::Text(text) => text.borrow().clone(),
                InlineKind::Separator(sep) => format!("<{:?}>", sep.kind()),
                InlineKind::Span(_) => "<span>".to_owned(),
                InlineKind::Script(_) => "<script>".to_owned(),
            })
            .collect()
    }

    #[test]
    fn whitespace_collapses_into_separators() {
        let input = vec![InlineObject::text("hello   world")];
        let output = process_word_separators(input, None);
        assert_eq!(texts(&output), vec!["hello", "<Space>", "world"]);
    }

    #[test]
    fn sentence_ends_are_detected() {
        let input = vec![InlineObject::text("End. Next")];
        let output = process_word_separators(input, None);
        assert_eq!(texts(&output), vec!["End.", "<SentenceEnd>", "Next"]);
    }

    #[test]
    fn hard_break_characters_split_words() {
        let input = vec![InlineObject::text("read/write")];
        let output = process_word_separators(input, None);
        assert_eq!(
            texts(&output),
            vec!["read/", "<BreakPoint>", "write"]
        );
    }

    #[test]
    fn punctuation_stays_attached() {
        let input = vec![InlineObject::text("(hello)")];
        let output = process_word_separators(input, None);
        assert_eq!(texts(&output), vec!["(", "hello", ")"]);
    }

    #[test]
    fn hyphenation_points_are_inserted() {
        let hyphenator = Hyphenator::english();
        let input = vec![InlineObject::text("hyphenation")];
        let output = process_word_separators(input, Some(&hyphenator));
        assert_eq!(
            texts(&output),
            vec![
                "hy",
                "<HyphenationPoint>",
                "phen",
                "<HyphenationPoint>",
                "ation"
            ]
        );
    }

    #[test]
    fn content_is_preserved() {
        let hyphenator = Hyphenator::english();
        let input = vec![InlineObject::text("a read/write hyphenation test.")];
        let output = process_word_separators(input, Some(&hyphenator));
        let rebuilt: String = output
            .iter()
            .map(|obj| match obj.kind() {
                InlineKind::Text(text) => text.borrow().clone(),
                InlineKind::Separator(sep) => sep.middle_of_line().to_owned(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(rebuilt, "a read/write hyphenation test.");
    }

    #[test]
    fn smart_quotes_replace_ascii() {
        let text = InlineObject::text("\"don't,\" she said, 'twice'");
        apply_smart_quotes(&[Rc::clone(&text)]);
        assert_eq!(
            text.as_text().unwrap(),
            "\u{201C}don\u{2019}t,\u{201D} she said, \u{2018}twice\u{2019}"
        );
    }

    #[test]
    fn separator_faces() {
        let space = Separator::new(SeparatorKind::Space, 0);
        assert_eq!(space.middle_of_line(), " ");
        assert_eq!(space.end_of_line(), "");
        let hyph = Separator::new(SeparatorKind::HyphenationPoint, 3);
        assert_eq!(hyph.middle_of_line(), "");
        assert_eq!(hyph.end_of_line(), "-");
    }

    #[test]
    fn style_overrides_extend() {
        let node = InlineObject::text("x");
        node.attrs()
            .apply_style(Style::new().with_line_spacing(1.5));
        node.attrs()
            .apply_style(Style::new().with_smart_quotes(false));
        let style = node.attrs().style();
        assert_eq!(style.line_spacing(), 1.5);
        assert_eq!(style.smart_quotes(), false);
    }
}
