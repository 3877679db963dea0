// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The PDF output layer.
//!
//! A [`Document`][] gathers pages, fonts, images, annotations and outline items during rendering
//! and assembles the object graph on [`write`][]: the page tree, per-page resources and content
//! streams, the catalog with the optional outline, and the info dictionary.  The actual file
//! syntax lives in [`writer`](writer/index.html), the object graph in
//! [`object`](object/index.html).
//!
//! Coordinates at this layer are PDF user space: points, with the origin at the lower-left
//! corner of the page.  [`Document::to_page_space`][] converts from the layout engine's
//! top-down millimeter positions.
//!
//! [`Document`]: struct.Document.html
//! [`write`]: struct.Document.html#method.write
//! [`Document::to_page_space`]: struct.Document.html#method.to_page_space

pub mod annotation;
pub mod font;
pub mod object;
pub mod page;
pub mod path;
pub mod text;
pub mod writer;
pub mod xobject;

pub use annotation::{Destination, LinkAnnotation, OutlineItem};
pub use font::PdfFont;
pub use object::{Dict, Name, ObjRef, Object, StreamData};
pub use page::Page;
pub use text::Text;

use std::io;
use std::rc::Rc;

use crate::error::Error;
use crate::fonts::FontSource;
use crate::layout::{AbsolutePagePos, PathSegment};
use crate::tree::{ImageData, PathStyle};
use crate::{Mm, Position, Size};

/// A PDF document under construction.
pub struct Document {
    paper_width: f64,
    paper_height: f64,
    pages: Vec<Page>,
    fonts: Vec<(Rc<dyn FontSource>, Rc<PdfFont>)>,
    images: Vec<(Rc<ImageData>, String, ObjRef)>,
    outline: Vec<OutlineItem>,
    title: Option<String>,
}

impl Document {
    /// Creates a document with the given paper size and number of pages.
    pub fn new(paper_size: Size, page_count: usize) -> Document {
        Document {
            paper_width: paper_size.width.to_pt(),
            paper_height: paper_size.height.to_pt(),
            pages: (0..page_count.max(1)).map(|_| Page::new()).collect(),
            fonts: Vec::new(),
            images: Vec::new(),
            outline: Vec::new(),
            title: None,
        }
    }

    /// Sets the document title for the info dictionary.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Returns the number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns a page mutably.
    pub fn page_mut(&mut self, index: usize) -> &mut Page {
        &mut self.pages[index]
    }

    /// Converts a top-down millimeter position into PDF user space.
    pub fn to_page_space(&self, _page: usize, x: Mm, y: Mm) -> (f64, f64) {
        (x.to_pt(), self.paper_height - y.to_pt())
    }

    /// Returns the PDF font for the given source, creating it on first use.
    pub fn font_for(&mut self, source: &Rc<dyn FontSource>) -> Rc<PdfFont> {
        for (existing, font) in &self.fonts {
            if Rc::ptr_eq(existing, source) {
                return Rc::clone(font);
            }
        }
        let font = Rc::new(PdfFont::new(Rc::clone(source), self.fonts.len() + 1));
        self.fonts.push((Rc::clone(source), Rc::clone(&font)));
        font
    }

    /// Places an image with its top-left corner at the given millimeter position.
    pub fn place_image(
        &mut self,
        page: usize,
        data: &Rc<ImageData>,
        x: Mm,
        y_top: Mm,
        width: Mm,
        height: Mm,
    ) -> Result<(), Error> {
        let (name, xobject) = self.image_resource(data);
        let (x, y_bottom) = self.to_page_space(page, x, y_top + height);
        let ops =
            xobject::placement_ops(&name, x, y_bottom, width.to_pt(), height.to_pt());
        let page = self.page_mut(page);
        page.register_xobject(&name, &xobject);
        page.add_content(ops);
        Ok(())
    }

    fn image_resource(&mut self, data: &Rc<ImageData>) -> (String, ObjRef) {
        for (existing, name, xobject) in &self.images {
            if Rc::ptr_eq(existing, data) {
                return (name.clone(), xobject.clone());
            }
        }
        let name = format!("X{}", self.images.len() + 1);
        let xobject = xobject::image_xobject(data);
        self.images
            .push((Rc::clone(data), name.clone(), xobject.clone()));
        (name, xobject)
    }

    /// Draws a path whose segments are relative to the given millimeter origin.
    pub fn draw_path(
        &mut self,
        page: usize,
        origin: Position,
        segments: &[PathSegment],
        style: &PathStyle,
    ) -> Result<(), Error> {
        let paper_height = self.paper_height;
        let resolved = path::resolve_segments(segments, |pos| {
            (
                (origin.x + pos.x).to_pt(),
                paper_height - (origin.y + pos.y).to_pt(),
            )
        });
        let page = self.page_mut(page);
        let gstate = page.register_gstate();
        page.add_content(
            path::Path {
                segments: resolved,
                style: *style,
                gstate: Some(gstate),
            }
            .serialise(),
        );
        Ok(())
    }

    /// Converts a layout position into a link destination.
    pub fn destination(&self, pos: AbsolutePagePos) -> Destination {
        let (x, y) = self.to_page_space(pos.page, pos.pos.x, pos.pos.y);
        Destination {
            page: pos.page,
            x,
            y,
            zoom: 0.0,
        }
    }

    /// Adds a link annotation over the given millimeter rectangle.
    pub fn add_link(
        &mut self,
        page: usize,
        x: Mm,
        y_top: Mm,
        width: Mm,
        height: Mm,
        target: AbsolutePagePos,
    ) {
        let (x1, y1) = self.to_page_space(page, x, y_top + height);
        let (x2, y2) = self.to_page_space(page, x + width, y_top);
        let dest = self.destination(target);
        self.page_mut(page).add_annotation(LinkAnnotation {
            rect: [x1, y1, x2, y2],
            dest,
        });
    }

    /// Adds a top-level outline item.
    pub fn add_outline_item(&mut self, item: OutlineItem) {
        self.outline.push(item);
    }

    /// Assembles the object graph and writes the file.
    pub fn write(&self, output: impl io::Write) -> Result<(), Error> {
        // pages get their ids early so destinations can point at them
        let page_refs: Vec<ObjRef> = self.pages.iter().map(|_| ObjRef::dict(Dict::new())).collect();

        let pages_tree = ObjRef::dict(Dict::new());
        let font_objects: Vec<(String, ObjRef)> = self
            .fonts
            .iter()
            .map(|(_, font)| (font.resource_name().to_owned(), font.serialise()))
            .collect();

        for (page, page_ref) in self.pages.iter().zip(&page_refs) {
            let mut resources = Dict::new();

            if !page.fonts().is_empty() {
                let mut fonts = Dict::new();
                for font in page.fonts() {
                    if let Some((name, object)) = font_objects
                        .iter()
                        .find(|(name, _)| name == font.resource_name())
                    {
                        fonts.set(name.clone(), object.reference());
                    }
                }
                resources.set("Font", Object::Dict(fonts));
            }
            if !page.xobjects().is_empty() {
                let mut xobjects = Dict::new();
                for (name, object) in page.xobjects() {
                    xobjects.set(name.clone(), object.reference());
                }
                resources.set("XObject", Object::Dict(xobjects));
            }
            if page.has_gstate() {
                let mut gstate = Dict::new();
                gstate.set("Type", Object::name("ExtGState"));
                let mut gstates = Dict::new();
                gstates.set("G1", Object::Dict(gstate));
                resources.set("ExtGState", Object::Dict(gstates));
            }

            page_ref.update_dict(|dict| {
                dict.set("Type", Object::name("Page"));
                dict.set("Parent", pages_tree.reference());
                dict.set(
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(self.paper_width),
                        Object::Real(self.paper_height),
                    ]),
                );
                dict.set("Resources", Object::Dict(resources.clone()));
            });

            if page.has_content() {
                let contents = ObjRef::stream(StreamData {
                    dict: Dict::new(),
                    data: page.content_bytes(),
                    compress: true,
                });
                page_ref.update_dict(|dict| dict.set("Contents", contents.reference()));
            }

            let annotations: Vec<Object> = page
                .annotations()
                .iter()
                .filter_map(|annotation| annotation.to_dict(&page_refs))
                .map(|dict| ObjRef::dict(dict).reference())
                .collect();
            if !annotations.is_empty() {
                page_ref.update_dict(|dict| dict.set("Annots", Object::Array(annotations.clone())));
            }
        }

        pages_tree.update_dict(|dict| {
            dict.set("Type", Object::name("Pages"));
            dict.set("Count", self.pages.len() as i64);
            dict.set(
                "Kids",
                Object::Array(page_refs.iter().map(|page| page.reference()).collect()),
            );
        });

        let mut catalog = Dict::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages_tree.reference());
        if let Some(outline) = annotation::build_outline(&self.outline, &page_refs) {
            catalog.set("Outlines", outline.reference());
            catalog.set("PageMode", Object::name("UseOutlines"));
        }
        let root = ObjRef::dict(catalog);

        let mut info = Dict::new();
        info.set("Creator", Object::string("quire"));
        info.set("Producer", Object::string("quire"));
        if let Some(title) = &self.title {
            info.set("Title", Object::string(title.clone()));
        }
        let info = ObjRef::dict(info);

        writer::write_file(output, &root, &info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_has_one_page_and_no_content() {
        let doc = Document::new(Size::new(210.0, 297.0), 1);
        let mut buf = Vec::new();
        doc.write(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf).into_owned();
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("/Type /Pages"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/MediaBox [0 0 595.276 841.89]"));
        assert!(!text.contains("/Contents"));
        assert!(!text.contains("/Outlines"));
    }

    #[test]
    fn coordinates_flip_vertically() {
        let doc = Document::new(Size::new(210.0, 297.0), 1);
        let (x, y) = doc.to_page_space(0, Mm(0.0), Mm(0.0));
        assert!(x.abs() < 1e-9);
        assert!((y - 841.89).abs() < 1e-2);
    }

    #[test]
    fn outlines_set_the_page_mode() {
        let mut doc = Document::new(Size::new(210.0, 297.0), 3);
        doc.add_outline_item(OutlineItem::new(
            "First",
            Destination {
                page: 0,
                x: 0.0,
                y: 800.0,
                zoom: 0.0,
            },
        ));
        doc.add_outline_item(OutlineItem::new(
            "Second",
            Destination {
                page: 2,
                x: 0.0,
                y: 800.0,
                zoom: 0.0,
            },
        ));
        let mut buf = Vec::new();
        doc.write(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf).into_owned();
        assert!(text.contains("/PageMode /UseOutlines"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("(First)"));
        assert!(text.contains("/XYZ"));
    }
}
