// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Pages and their resources.
//!
//! A page collects serialised content (text, paths, image placements) plus the resources the
//! content references.  Resources are grouped by kind into the page's `/Resources` dictionary
//! when the file is assembled: fonts under `/Font`, image XObjects under `/XObject`, graphics
//! states under `/ExtGState`.

use std::rc::Rc;

use super::annotation::LinkAnnotation;
use super::font::PdfFont;
use super::object::ObjRef;
use super::text::Text;

/// One page of the document under construction.
#[derive(Debug, Default)]
pub struct Page {
    content: Vec<String>,
    fonts: Vec<Rc<PdfFont>>,
    xobjects: Vec<(String, ObjRef)>,
    has_gstate: bool,
    annotations: Vec<LinkAnnotation>,
}

impl Page {
    /// Creates an empty page.
    pub fn new() -> Page {
        Page::default()
    }

    /// Registers a font as a resource of this page and returns its resource name.
    pub fn register_font(&mut self, font: &Rc<PdfFont>) -> String {
        if !self.fonts.iter().any(|existing| Rc::ptr_eq(existing, font)) {
            self.fonts.push(Rc::clone(font));
        }
        font.resource_name().to_owned()
    }

    /// Registers an image XObject under the given name.
    pub fn register_xobject(&mut self, name: &str, xobject: &ObjRef) {
        if !self.xobjects.iter().any(|(existing, _)| existing == name) {
            self.xobjects.push((name.to_owned(), xobject.clone()));
        }
    }

    /// Registers the default graphics state and returns its resource name.
    pub fn register_gstate(&mut self) -> String {
        self.has_gstate = true;
        "G1".to_owned()
    }

    /// Appends a text object to the page content.
    pub fn add_text(&mut self, text: Text) {
        self.content.push(text.serialise());
    }

    /// Appends raw content stream operators.
    pub fn add_content(&mut self, ops: String) {
        self.content.push(ops);
    }

    /// Adds a link annotation.
    pub fn add_annotation(&mut self, annotation: LinkAnnotation) {
        self.annotations.push(annotation);
    }

    /// Returns the concatenated content stream bytes.
    pub fn content_bytes(&self) -> Vec<u8> {
        self.content.join("").into_bytes()
    }

    /// Returns whether the page has any content.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub(crate) fn fonts(&self) -> &[Rc<PdfFont>] {
        &self.fonts
    }

    pub(crate) fn xobjects(&self) -> &[(String, ObjRef)] {
        &self.xobjects
    }

    pub(crate) fn has_gstate(&self) -> bool {
        self.has_gstate
    }

    pub(crate) fn annotations(&self) -> &[LinkAnnotation] {
        &self.annotations
    }
}
