// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! A typesetting engine that lays out styled document trees and writes PDF files.
//!
//! `quire` turns a [tree](tree/index.html) of paragraphs, containers, images and spacers into a
//! finished PDF: it computes cascading [styles](style/index.html), breaks paragraphs into
//! justified lines with [hyphenation](hyphenate/index.html), flows blocks over
//! [pages](layout/page/index.html), and serialises the result through its own
//! [PDF object model and writer](pdf/index.html).  Text is measured through the
//! [`FontSource`](fonts/trait.FontSource.html) seam; the 14 built-in PDF fonts ship with the
//! crate, and TrueType files can be embedded.
//!
//! # Quickstart
//!
//! ```no_run
//! use quire::tree::{BlockObject, InlineObject};
//!
//! // Create a document with a built-in font family
//! let family = quire::fonts::builtin(quire::fonts::Builtin::Times).unwrap();
//! let mut doc = quire::Document::new(family);
//! doc.set_title("Demo document");
//! // Add content
//! doc.push(BlockObject::paragraph(vec![InlineObject::text(
//!     "This is a demo document.",
//! )]));
//! // Render the document and write it to a file
//! doc.render_to_file("output.pdf").expect("Failed to write PDF file");
//! ```
//!
//! # The pipeline
//!
//! Rendering runs in layout passes.  Each pass asks the
//! [interpreter](interp/index.html) to run the hooks of the `Layout`, `Position`, `PostLayout`
//! and (once converged) `Finalise` phases, converts the document tree into a
//! [layout tree](layout/index.html) with computed sizes, and assigns positions by walking the
//! layout tree with a [page cursor](layout/page/struct.PageCursor.html) that spawns new pages on
//! overflow.  A hook may call
//! [`request_layout`](interp/trait.Interpreter.html#tymethod.request_layout) to run another
//! pass — page-number references, for example, settle this way.  The finished layout is rendered
//! into the [PDF layer](pdf/index.html) and written out.
//!
//! Before the first pass, the `Preamble` phase fills in the [`DocumentSettings`][]: paper size,
//! margins, the default font and its size, line spacing, paragraph spacing.  Everything left
//! unset falls back to A4 paper, 15% margins and an 11 pt default style.
//!
//! In `quire`, all lengths are measured in millimeters.  The [`Mm`][] newtype is used for all
//! lengths; [`DynLength`][] carries a unit (`mm`, `pt`, `em`, …) and is resolved against a style.
//!
//! [`DocumentSettings`]: struct.DocumentSettings.html
//! [`Mm`]: struct.Mm.html
//! [`DynLength`]: struct.DynLength.html

#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod fonts;
pub mod hyphenate;
pub mod interp;
pub mod layout;
pub mod microtype;
pub mod pdf;
pub mod style;
pub mod tree;

use std::fs;
use std::io;
use std::path;

use derive_more::{
    Add, AddAssign, Div, DivAssign, From, Into, Mul, MulAssign, Sub, SubAssign, Sum,
};

use error::{Context as _, Error};
use interp::{GlobalState, Interpreter, Phase, Scripting};
use layout::container::LayoutContext;
use layout::{AbsolutePagePos, LayoutId, LayoutTree, PageLayout};
use style::Style;
use tree::{BlockNode, LinkDestination};

/// A length measured in millimeters.
///
/// `quire` always uses millimeters as its length unit; use [`from_pt`](#method.from_pt) and
/// [`to_pt`](#method.to_pt) to convert from and to typographic points.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    PartialOrd,
    Add,
    AddAssign,
    Div,
    DivAssign,
    From,
    Into,
    Mul,
    MulAssign,
    Sub,
    SubAssign,
    Sum,
)]
pub struct Mm(pub f64);

impl Mm {
    /// Creates a length from typographic points (1 pt = 1/72 in).
    pub fn from_pt(pt: f64) -> Mm {
        Mm(pt * 25.4 / 72.0)
    }

    /// Converts this length to typographic points.
    pub fn to_pt(self) -> f64 {
        self.0 * 72.0 / 25.4
    }

    /// Returns the maximum of this value and the given value.
    pub fn max(self, other: Mm) -> Mm {
        Mm(self.0.max(other.0))
    }

    /// Returns the minimum of this value and the given value.
    pub fn min(self, other: Mm) -> Mm {
        Mm(self.0.min(other.0))
    }

    /// Returns the absolute value.
    pub fn abs(self) -> Mm {
        Mm(self.0.abs())
    }
}

impl From<i8> for Mm {
    fn from(mm: i8) -> Mm {
        Mm(mm.into())
    }
}

impl From<i16> for Mm {
    fn from(mm: i16) -> Mm {
        Mm(mm.into())
    }
}

impl From<i32> for Mm {
    fn from(mm: i32) -> Mm {
        Mm(mm.into())
    }
}

impl From<u8> for Mm {
    fn from(mm: u8) -> Mm {
        Mm(mm.into())
    }
}

impl From<u16> for Mm {
    fn from(mm: u16) -> Mm {
        Mm(mm.into())
    }
}

impl From<u32> for Mm {
    fn from(mm: u32) -> Mm {
        Mm(mm.into())
    }
}

impl From<f32> for Mm {
    fn from(mm: f32) -> Mm {
        Mm(mm.into())
    }
}

/// A position on a page, measured in millimeters.
///
/// All positions used by `quire` are measured from the top left corner of the reference area,
/// with y growing downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Add, AddAssign, Sub, SubAssign)]
pub struct Position {
    /// The x coordinate of the position, measured from the left edge of the reference area.
    pub x: Mm,
    /// The y coordinate of the position, measured from the top edge of the reference area.
    pub y: Mm,
}

impl Position {
    /// Creates a new position from the given coordinates.
    pub fn new(x: impl Into<Mm>, y: impl Into<Mm>) -> Position {
        Position {
            x: x.into(),
            y: y.into(),
        }
    }
}

impl<X: Into<Mm>, Y: Into<Mm>> From<(X, Y)> for Position {
    fn from(values: (X, Y)) -> Position {
        Position::new(values.0, values.1)
    }
}

/// The size of an area, measured in millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Add, AddAssign, Sub, SubAssign)]
pub struct Size {
    /// The width of the area.
    pub width: Mm,
    /// The height of the area.
    pub height: Mm,
}

impl Size {
    /// Creates a new size from the given width and height.
    pub fn new(width: impl Into<Mm>, height: impl Into<Mm>) -> Size {
        Size {
            width: width.into(),
            height: height.into(),
        }
    }
}

impl<W: Into<Mm>, H: Into<Mm>> From<(W, H)> for Size {
    fn from(values: (W, H)) -> Size {
        Size::new(values.0, values.1)
    }
}

/// The extent of a laid-out object: its width, and its height above and below the baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutSize {
    /// The width of the object.
    pub width: Mm,
    /// The extent above the baseline.
    pub ascent: Mm,
    /// The extent below the baseline.
    pub descent: Mm,
}

impl LayoutSize {
    /// Creates a new layout size.
    pub fn new(width: Mm, ascent: Mm, descent: Mm) -> LayoutSize {
        LayoutSize {
            width,
            ascent,
            descent,
        }
    }

    /// Returns the total height, ascent plus descent.
    pub fn total_height(&self) -> Mm {
        self.ascent + self.descent
    }
}

/// A paper size like A4, legal or letter.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum PaperSize {
    /// The A4 paper size (210x297mm).
    A4,
    /// The legal paper size (216x356mm).
    Legal,
    /// The letter paper size (216x279mm).
    Letter,
}

impl From<PaperSize> for Size {
    fn from(size: PaperSize) -> Size {
        match size {
            PaperSize::A4 => Size::new(210, 297),
            PaperSize::Legal => Size::new(216, 356),
            PaperSize::Letter => Size::new(216, 279),
        }
    }
}

/// The margins of an area, measured in millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Margins {
    top: Mm,
    right: Mm,
    bottom: Mm,
    left: Mm,
}

impl Margins {
    /// Creates a new `Margins` instance from the given top, right, bottom and left margins.
    pub fn trbl(
        top: impl Into<Mm>,
        right: impl Into<Mm>,
        bottom: impl Into<Mm>,
        left: impl Into<Mm>,
    ) -> Margins {
        Margins {
            top: top.into(),
            right: right.into(),
            bottom: bottom.into(),
            left: left.into(),
        }
    }

    /// Creates a new `Margins` instance from the given vertical (top and bottom) and horizontal
    /// (left and right) margins.
    pub fn vh(vertical: impl Into<Mm>, horizontal: impl Into<Mm>) -> Margins {
        let (vertical, horizontal) = (vertical.into(), horizontal.into());
        Margins::trbl(vertical, horizontal, vertical, horizontal)
    }

    /// Creates a new `Margins` instance with all four margins set to the given value.
    pub fn all(all: impl Into<Mm>) -> Margins {
        let all = all.into();
        Margins::trbl(all, all, all, all)
    }

    /// Returns the top margin.
    pub fn top(&self) -> Mm {
        self.top
    }

    /// Returns the right margin.
    pub fn right(&self) -> Mm {
        self.right
    }

    /// Returns the bottom margin.
    pub fn bottom(&self) -> Mm {
        self.bottom
    }

    /// Returns the left margin.
    pub fn left(&self) -> Mm {
        self.left
    }
}

/// The unit of a [`DynLength`](struct.DynLength.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LengthUnit {
    /// Millimeters.
    Mm,
    /// Centimeters.
    Cm,
    /// The current font size.
    Em,
    /// The x-height of the current font.
    Ex,
    /// Inches.
    In,
    /// Typographic points (1/72 in).
    Pt,
    /// Picas (12 pt).
    Pc,
    /// The root font size, regardless of nesting.
    Rem,
}

/// A length with a unit, resolved against a style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynLength {
    value: f64,
    unit: LengthUnit,
}

impl Default for DynLength {
    fn default() -> DynLength {
        DynLength::mm(0.0)
    }
}

impl DynLength {
    /// Creates a length from a value and a unit.
    pub fn new(value: f64, unit: LengthUnit) -> DynLength {
        DynLength { value, unit }
    }

    /// Creates a length in millimeters.
    pub fn mm(value: f64) -> DynLength {
        DynLength::new(value, LengthUnit::Mm)
    }

    /// Creates a length in points.
    pub fn pt(value: f64) -> DynLength {
        DynLength::new(value, LengthUnit::Pt)
    }

    /// Returns the numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the unit.
    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    /// Resolves this length against the given style.
    ///
    /// Font-relative units use the style's font size, root font size, and the x-height of its
    /// font.
    pub fn resolve(&self, style: &Style, fonts: &fonts::FontCache) -> Mm {
        match self.unit {
            LengthUnit::Ex => {
                let font = style.font();
                let x_height = font.metrics(fonts).x_height;
                font.scale(fonts, x_height, style.font_size()) * self.value
            }
            _ => self.resolve_without_font(style.font_size(), style.root_font_size()),
        }
    }

    /// Resolves this length with explicit font sizes, approximating `ex` as half an em.
    pub fn resolve_without_font(&self, font_size: Mm, root_font_size: Mm) -> Mm {
        match self.unit {
            LengthUnit::Mm => Mm(self.value),
            LengthUnit::Cm => Mm(self.value * 10.0),
            LengthUnit::In => Mm(self.value * 25.4),
            LengthUnit::Pt => Mm::from_pt(self.value),
            LengthUnit::Pc => Mm::from_pt(self.value * 12.0),
            LengthUnit::Em => font_size * self.value,
            LengthUnit::Ex => font_size * (self.value * 0.5),
            LengthUnit::Rem => root_font_size * self.value,
        }
    }
}

impl From<Mm> for DynLength {
    fn from(length: Mm) -> DynLength {
        DynLength::mm(length.0)
    }
}

/// A two-dimensional size with units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DynSize {
    /// The horizontal extent.
    pub x: DynLength,
    /// The vertical extent.
    pub y: DynLength,
}

impl DynSize {
    /// Creates a new size from two lengths.
    pub fn new(x: DynLength, y: DynLength) -> DynSize {
        DynSize { x, y }
    }
}

/// The margin settings of a document, each edge optional.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarginSettings {
    /// The top margin.
    pub top: Option<DynLength>,
    /// The right margin.
    pub right: Option<DynLength>,
    /// The bottom margin.
    pub bottom: Option<DynLength>,
    /// The left margin.
    pub left: Option<DynLength>,
}

/// The document-wide settings collected during the preamble phase.
///
/// Every field is optional; [`Document::render`](struct.Document.html#method.render) fills in
/// the defaults: A4 paper, 11 pt font size, line spacing 1, sentence space stretch 1.5, no
/// paragraph spacing, justified alignment, smart quotes on, and margins of 15% of the paper
/// size.  A missing margin edge first copies its opposite edge, then an adjacent one.
#[derive(Clone, Debug, Default)]
pub struct DocumentSettings {
    /// The default font size.
    pub font_size: Option<DynLength>,
    /// The paper size.
    pub paper_size: Option<DynSize>,
    /// The page margins.
    pub margins: MarginSettings,
    /// The default line spacing factor.
    pub line_spacing: Option<f64>,
    /// The default stretch factor for sentence-ending spaces.
    pub sentence_space_stretch: Option<f64>,
    /// The default spacing between blocks.
    pub paragraph_spacing: Option<DynLength>,
    /// The default alignment.
    pub alignment: Option<style::Alignment>,
    /// Whether smart quotes are enabled by default.
    pub smart_quotes: Option<bool>,
}

const DEFAULT_FONT_SIZE_PT: f64 = 11.0;
const DEFAULT_LINE_SPACING: f64 = 1.0;
const DEFAULT_SENTENCE_SPACE_STRETCH: f64 = 1.5;

impl DocumentSettings {
    /// Overlays the settings from `other`, preferring `other`'s values.
    fn merged_with(mut self, other: DocumentSettings) -> DocumentSettings {
        self.font_size = other.font_size.or(self.font_size);
        self.paper_size = other.paper_size.or(self.paper_size);
        self.margins.top = other.margins.top.or(self.margins.top);
        self.margins.right = other.margins.right.or(self.margins.right);
        self.margins.bottom = other.margins.bottom.or(self.margins.bottom);
        self.margins.left = other.margins.left.or(self.margins.left);
        self.line_spacing = other.line_spacing.or(self.line_spacing);
        self.sentence_space_stretch = other.sentence_space_stretch.or(self.sentence_space_stretch);
        self.paragraph_spacing = other.paragraph_spacing.or(self.paragraph_spacing);
        self.alignment = other.alignment.or(self.alignment);
        self.smart_quotes = other.smart_quotes.or(self.smart_quotes);
        self
    }

    /// Resolves the settings into concrete paper size, margins and a default style.
    fn resolve(self, font_cache: &fonts::FontCache) -> (Size, Margins, Style) {
        let font_size_setting = self
            .font_size
            .unwrap_or_else(|| DynLength::pt(DEFAULT_FONT_SIZE_PT));
        let font_size = font_size_setting
            .resolve_without_font(Mm::from_pt(DEFAULT_FONT_SIZE_PT), Mm::from_pt(DEFAULT_FONT_SIZE_PT));
        let resolve = |length: DynLength| length.resolve_without_font(font_size, font_size);

        let paper_size = match self.paper_size {
            Some(size) => Size::new(resolve(size.x), resolve(size.y)),
            None => PaperSize::A4.into(),
        };

        // a missing edge copies the opposite edge, then an adjacent one, then 15% of the paper
        let fallback_h = paper_size.width * 0.15;
        let fallback_v = paper_size.height * 0.15;
        let m = self.margins;
        let top = m
            .top
            .or(m.bottom)
            .or(m.left)
            .or(m.right)
            .map(resolve)
            .unwrap_or(fallback_v);
        let bottom = m
            .bottom
            .or(m.top)
            .or(m.left)
            .or(m.right)
            .map(resolve)
            .unwrap_or(fallback_v);
        let left = m
            .left
            .or(m.right)
            .or(m.top)
            .or(m.bottom)
            .map(resolve)
            .unwrap_or(fallback_h);
        let right = m
            .right
            .or(m.left)
            .or(m.top)
            .or(m.bottom)
            .map(resolve)
            .unwrap_or(fallback_h);
        let margins = Margins::trbl(top, right, bottom, left);

        let style = Style::new()
            .with_font_family(font_cache.default_font_family())
            .with_font_style(style::FontStyle::Regular)
            .with_font_size(font_size)
            .with_root_font_size(font_size)
            .with_line_spacing(self.line_spacing.unwrap_or(DEFAULT_LINE_SPACING))
            .with_sentence_space_stretch(
                self.sentence_space_stretch
                    .unwrap_or(DEFAULT_SENTENCE_SPACE_STRETCH),
            )
            .with_paragraph_spacing(
                self.paragraph_spacing.map(resolve).unwrap_or(Mm(0.0)),
            )
            .with_alignment(self.alignment.unwrap_or(style::Alignment::Justified))
            .with_color(style::Color::black())
            .with_smart_quotes(self.smart_quotes.unwrap_or(true));

        (paper_size, margins, style)
    }
}

/// An entry of the document outline, targeting a tree node or a fixed position.
#[derive(Clone, Debug)]
pub struct OutlineEntry {
    /// The title shown in the PDF outline panel.
    pub title: String,
    /// The position the entry jumps to.
    pub target: LinkDestination,
    /// Nested entries.
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    /// Creates an outline entry without children.
    pub fn new(title: impl Into<String>, target: LinkDestination) -> OutlineEntry {
        OutlineEntry {
            title: title.into(),
            target,
            children: Vec::new(),
        }
    }
}

/// A document: a tree of block objects plus everything needed to lay it out.
///
/// This struct is the entry point of the crate.  Fill the document with
/// [`push`](#method.push), configure it with the setter methods, and produce the PDF file with
/// [`render`](#method.render) or [`render_to_file`](#method.render_to_file).  For scripted
/// documents, build a [`Scripting`](interp/struct.Scripting.html) value (or any other
/// [`Interpreter`](interp/trait.Interpreter.html) implementation), register hooks on it, and
/// pass it to [`render_with`](#method.render_with).
pub struct Document {
    root: BlockNode,
    font_cache: fonts::FontCache,
    settings: DocumentSettings,
    title: String,
    hyphenator: Option<hyphenate::Hyphenator>,
    microtype: Option<microtype::MicrotypeConfig>,
    outline: Vec<OutlineEntry>,
    draft: bool,
}

impl Document {
    /// Creates a new document with the given default font family.
    pub fn new(default_font_family: fonts::FontFamily<fonts::FontData>) -> Document {
        Document {
            root: tree::BlockObject::vertical(),
            font_cache: fonts::FontCache::new(default_font_family),
            settings: DocumentSettings::default(),
            title: String::new(),
            hyphenator: None,
            microtype: None,
            outline: Vec::new(),
            draft: false,
        }
    }

    /// Adds the given font family to the font cache for this document and returns a reference to
    /// it.
    ///
    /// Note that the returned font reference may only be used for this document.
    pub fn add_font_family(
        &mut self,
        font_family: fonts::FontFamily<fonts::FontData>,
    ) -> fonts::FontFamily<fonts::Font> {
        self.font_cache.add_font_family(font_family)
    }

    /// Returns the font cache used by this document.
    pub fn font_cache(&self) -> &fonts::FontCache {
        &self.font_cache
    }

    /// Returns the root container of the document tree.
    pub fn root(&self) -> &BlockNode {
        &self.root
    }

    /// Adds the given block to the document.
    pub fn push(&mut self, block: BlockNode) {
        if let Some(container) = self.root.as_container() {
            container.push(block);
        }
    }

    /// Sets the title of the PDF document.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Returns the mutable document settings, which seed the preamble phase.
    pub fn settings_mut(&mut self) -> &mut DocumentSettings {
        &mut self.settings
    }

    /// Sets the default font size.
    pub fn set_font_size(&mut self, font_size: DynLength) {
        self.settings.font_size = Some(font_size);
    }

    /// Sets the paper size for all pages of this document.
    pub fn set_paper_size(&mut self, paper_size: impl Into<Size>) {
        let size = paper_size.into();
        self.settings.paper_size = Some(DynSize::new(size.width.into(), size.height.into()));
    }

    /// Sets all four margins to the given length.
    pub fn set_margins(&mut self, margin: DynLength) {
        self.settings.margins = MarginSettings {
            top: Some(margin),
            right: Some(margin),
            bottom: Some(margin),
            left: Some(margin),
        };
    }

    /// Activates hyphenation and sets the hyphenator to use.
    pub fn set_hyphenator(&mut self, hyphenator: hyphenate::Hyphenator) {
        self.hyphenator = Some(hyphenator);
    }

    /// Activates margin protrusion with the given configuration.
    pub fn set_microtype(&mut self, config: microtype::MicrotypeConfig) {
        self.microtype = Some(config);
    }

    /// Adds a top-level outline entry.
    pub fn add_outline_entry(&mut self, entry: OutlineEntry) {
        self.outline.push(entry);
    }

    /// Enables draft mode: the layout pipeline runs, but no page content is emitted.
    pub fn set_draft(&mut self, draft: bool) {
        self.draft = draft;
    }

    /// Renders this document with a plain interpreter and writes the PDF to the given writer.
    pub fn render(self, w: impl io::Write) -> Result<(), Error> {
        let mut scripting = Scripting::new();
        self.render_with(&mut scripting, w)
    }

    /// Renders this document into a PDF file at the given path.
    ///
    /// If the given file does not exist, it is created.  If it exists, it is overwritten.
    pub fn render_to_file(self, path: impl AsRef<path::Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let file = fs::File::create(path)
            .with_context(|| format!("Could not create file {}", path.display()))?;
        self.render(file)
    }

    /// Renders this document with the given interpreter and writes the PDF to the given writer.
    ///
    /// Runs the preamble phase, then iterates layout passes until no hook requests another one,
    /// and finally renders the converged layout.
    pub fn render_with(
        self,
        interp: &mut dyn Interpreter,
        w: impl io::Write,
    ) -> Result<(), Error> {
        let Document {
            root,
            font_cache,
            settings,
            title,
            hyphenator,
            microtype,
            outline,
            draft,
        } = self;

        interp.run_hooks(Phase::Preamble)?;
        let settings = settings.merged_with(interp.document_settings());
        let (paper_size, margins, default_style) = settings.resolve(&font_cache);

        let ctx = LayoutContext {
            fonts: &font_cache,
            hyphenator: hyphenator.as_ref(),
            microtype: microtype.as_ref(),
        };

        interp.push_style(default_style);

        let mut pass = 0usize;
        let mut page_count = 1usize;
        let (layout_tree, roots, page_layout) = loop {
            pass += 1;
            if pass > 8 {
                log::warn!("layout did not converge after 8 passes");
            }
            interp.begin_pass(GlobalState {
                layout_pass: pass,
                page_count,
                page_size: paper_size,
            });

            let mut page_layout = PageLayout::new(paper_size, margins);
            let mut layout_tree = LayoutTree::new();
            let available = Size::new(page_layout.content_size().width, Mm(f64::INFINITY));

            interp.run_hooks(Phase::Layout)?;
            let root_id = layout::container::create_layout_object(
                &ctx,
                interp,
                &mut layout_tree,
                &root,
                &Style::empty(),
                available,
            )?;

            interp.run_hooks(Phase::Position)?;
            let mut roots: Vec<LayoutId> = Vec::new();
            if let Some(root_id) = root_id {
                let cursor = page_layout.new_cursor();
                layout::compute_position(&mut layout_tree, &mut page_layout, root_id, cursor);
                roots.push(root_id);
            }

            // blocks that scripts pinned to fixed positions
            for (block, pos) in interp.take_positioned_blocks() {
                if let Some(id) = layout::container::create_layout_object(
                    &ctx,
                    interp,
                    &mut layout_tree,
                    &block,
                    &Style::empty(),
                    available,
                )? {
                    layout_tree.get_mut(id).absolute_override = Some(pos);
                    let cursor = page_layout.new_cursor();
                    layout::compute_position(&mut layout_tree, &mut page_layout, id, cursor);
                    roots.push(id);
                }
            }

            interp.run_hooks(Phase::PostLayout)?;
            page_count = page_layout.page_count();

            if interp.layout_requested() {
                continue;
            }
            interp.run_hooks(Phase::Finalise)?;
            break (layout_tree, roots, page_layout);
        };

        interp.pop_style();

        let mut doc = pdf::Document::new(paper_size, page_layout.page_count());
        if !title.is_empty() {
            doc.set_title(title);
        }

        if !draft {
            for &root_id in &roots {
                layout::render(&layout_tree, root_id, &page_layout, interp, &font_cache, &mut doc)?;
            }
        }

        for entry in &outline {
            if let Some(item) =
                outline_item(entry, &layout_tree, &page_layout, interp, &doc)
            {
                doc.add_outline_item(item);
            }
        }

        doc.write(w)
    }
}

/// Resolves an outline entry against the finished layout.
fn outline_item(
    entry: &OutlineEntry,
    layout_tree: &LayoutTree,
    page_layout: &PageLayout,
    interp: &dyn Interpreter,
    doc: &pdf::Document,
) -> Option<pdf::OutlineItem> {
    let target: Option<AbsolutePagePos> = match &entry.target {
        LinkDestination::Position(pos) => Some(*pos),
        LinkDestination::Node(node) => interp
            .layout_objects_for(*node)
            .first()
            .map(|&id| layout_tree.get(id).absolute_position(page_layout)),
    };
    let target = match target {
        Some(target) => target,
        None => {
            log::warn!("outline entry '{}' has no target in this layout", entry.title);
            return None;
        }
    };
    let mut item = pdf::OutlineItem::new(entry.title.clone(), doc.destination(target));
    for child in &entry.children {
        if let Some(child) = outline_item(child, layout_tree, page_layout, interp, doc) {
            item.push(child);
        }
    }
    Some(item)
}

#[cfg(test)]
pub(crate) fn assert_approx(a: Mm, b: Mm) {
    assert!(
        (a - b).abs() < Mm(1e-4),
        "expected {:?} ~= {:?}",
        a,
        b
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_conversions_roundtrip() {
        assert_approx(Mm::from_pt(72.0), Mm(25.4));
        let length = Mm(11.3);
        assert_approx(Mm::from_pt(length.to_pt()), length);
    }

    #[test]
    fn dyn_length_resolution() {
        let font_size = Mm::from_pt(10.0);
        let root = Mm::from_pt(20.0);
        assert_approx(DynLength::mm(12.0).resolve_without_font(font_size, root), Mm(12.0));
        assert_approx(
            DynLength::new(2.0, LengthUnit::Cm).resolve_without_font(font_size, root),
            Mm(20.0),
        );
        assert_approx(
            DynLength::new(1.0, LengthUnit::In).resolve_without_font(font_size, root),
            Mm(25.4),
        );
        assert_approx(
            DynLength::new(1.0, LengthUnit::Pc).resolve_without_font(font_size, root),
            Mm::from_pt(12.0),
        );
        assert_approx(
            DynLength::new(2.0, LengthUnit::Em).resolve_without_font(font_size, root),
            font_size * 2.0,
        );
        assert_approx(
            DynLength::new(1.5, LengthUnit::Rem).resolve_without_font(font_size, root),
            root * 1.5,
        );
    }

    #[test]
    fn dyn_length_mm_roundtrip() {
        let length = Mm(42.5);
        let dynamic = DynLength::from(length);
        assert_approx(
            dynamic.resolve_without_font(Mm(1.0), Mm(1.0)),
            length,
        );
    }

    #[test]
    fn margins_default_to_fifteen_percent() {
        let cache = fonts::FontCache::new(fonts::builtin(fonts::Builtin::Times).unwrap());
        let (paper, margins, style) = DocumentSettings::default().resolve(&cache);
        assert_approx(paper.width, Mm(210.0));
        assert_approx(margins.left(), Mm(31.5));
        assert_approx(margins.top(), Mm(44.55));
        assert_approx(style.font_size(), Mm::from_pt(11.0));
        assert_eq!(style.alignment(), style::Alignment::Justified);
    }

    #[test]
    fn missing_margin_edges_copy_their_neighbours() {
        let cache = fonts::FontCache::new(fonts::builtin(fonts::Builtin::Times).unwrap());
        let mut settings = DocumentSettings::default();
        settings.margins.left = Some(DynLength::mm(20.0));
        let (_, margins, _) = settings.resolve(&cache);
        assert_approx(margins.right(), Mm(20.0));
        assert_approx(margins.top(), Mm(20.0));
        assert_approx(margins.bottom(), Mm(20.0));
    }
}
