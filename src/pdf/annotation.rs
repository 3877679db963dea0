// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Link annotations, destinations and outlines.

use super::object::{Dict, ObjRef, Object};

/// A destination within the document, in PDF user space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Destination {
    /// The zero-based index of the target page.
    pub page: usize,
    /// The x coordinate of the target position.
    pub x: f64,
    /// The y coordinate of the target position.
    pub y: f64,
    /// The zoom factor; 0 keeps the current zoom.
    pub zoom: f64,
}

impl Destination {
    /// Builds the `[page /XYZ x y zoom]` destination array.
    pub fn to_array(&self, page_refs: &[ObjRef]) -> Option<Object> {
        let page = page_refs.get(self.page)?;
        Some(Object::Array(vec![
            page.reference(),
            Object::name("XYZ"),
            Object::Real(self.x),
            Object::Real(self.y),
            Object::Real(self.zoom),
        ]))
    }
}

/// A clickable link area on a page.
#[derive(Clone, Debug)]
pub struct LinkAnnotation {
    /// The active rectangle as `[x1, y1, x2, y2]` in PDF user space.
    pub rect: [f64; 4],
    /// The destination the link jumps to.
    pub dest: Destination,
}

impl LinkAnnotation {
    /// Builds the annotation dictionary.
    pub fn to_dict(&self, page_refs: &[ObjRef]) -> Option<Dict> {
        let mut dict = Dict::new();
        dict.set("Type", Object::name("Annot"));
        dict.set("Subtype", Object::name("Link"));
        dict.set(
            "Rect",
            Object::Array(self.rect.iter().map(|&v| Object::Real(v)).collect()),
        );
        dict.set(
            "Border",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        );
        dict.set("Dest", self.dest.to_array(page_refs)?);
        Some(dict)
    }
}

/// An entry of the document outline.
#[derive(Clone, Debug)]
pub struct OutlineItem {
    /// The title shown in the outline panel.
    pub title: String,
    /// The destination opened by the entry.
    pub dest: Destination,
    /// Nested entries.
    pub children: Vec<OutlineItem>,
}

impl OutlineItem {
    /// Creates an outline item without children.
    pub fn new(title: impl Into<String>, dest: Destination) -> OutlineItem {
        OutlineItem {
            title: title.into(),
            dest,
            children: Vec::new(),
        }
    }

    /// Adds a nested item.
    pub fn push(&mut self, child: OutlineItem) {
        self.children.push(child);
    }
}

/// Builds the `/Outlines` dictionary for the given items.
///
/// Returns `None` when there are no items.
pub fn build_outline(items: &[OutlineItem], page_refs: &[ObjRef]) -> Option<ObjRef> {
    if items.is_empty() {
        return None;
    }
    let root = ObjRef::dict(Dict::new());
    let (first, last, count) = link_items(items, &root, page_refs);
    root.update_dict(|dict| {
        dict.set("Type", Object::name("Outlines"));
        dict.set("Count", count);
        if let Some(first) = &first {
            dict.set("First", first.reference());
        }
        if let Some(last) = &last {
            dict.set("Last", last.reference());
        }
    });
    Some(root)
}

/// Links a sibling list of outline items under `parent` and returns `(first, last, count)`.
fn link_items(
    items: &[OutlineItem],
    parent: &ObjRef,
    page_refs: &[ObjRef],
) -> (Option<ObjRef>, Option<ObjRef>, i64) {
    let mut refs: Vec<ObjRef> = Vec::with_capacity(items.len());
    let mut total = 0i64;

    for item in items {
        let node = ObjRef::dict(Dict::new());
        let (first, last, count) = link_items(&item.children, &node, page_refs);
        total += 1 + count;

        node.update_dict(|dict| {
            dict.set("Title", Object::string(item.title.clone()));
            dict.set("Parent", parent.reference());
            if let Some(dest) = item.dest.to_array(page_refs) {
                dict.set("Dest", dest);
            }
            if let Some(first) = &first {
                dict.set("First", first.reference());
            }
            if let Some(last) = &last {
                dict.set("Last", last.reference());
            }
            if count > 0 {
                dict.set("Count", count);
            }
        });
        refs.push(node);
    }

    for index in 1..refs.len() {
        refs[index - 1].update_dict(|dict| dict.set("Next", refs[index].reference()));
        refs[index].update_dict(|dict| dict.set("Prev", refs[index - 1].reference()));
    }

    (refs.first().cloned(), refs.last().cloned(), total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_refs(n: usize) -> Vec<ObjRef> {
        (0..n).map(|_| ObjRef::dict(Dict::new())).collect()
    }

    #[test]
    fn outline_links_siblings() {
        let pages = page_refs(3);
        let items = vec![
            OutlineItem::new(
                "One",
                Destination {
                    page: 0,
                    x: 10.0,
                    y: 700.0,
                    zoom: 0.0,
                },
            ),
            OutlineItem::new(
                "Two",
                Destination {
                    page: 2,
                    x: 10.0,
                    y: 700.0,
                    zoom: 0.0,
                },
            ),
        ];
        let outline = build_outline(&items, &pages).unwrap();
        outline.with_value(|value| match value {
            crate::pdf::object::SlotValue::Object(Object::Dict(dict)) => {
                match dict.get("Count") {
                    Some(Object::Integer(2)) => {}
                    other => panic!("unexpected count: {:?}", other),
                }
                assert!(dict.get("First").is_some());
                assert!(dict.get("Last").is_some());
            }
            _ => panic!("expected a dictionary"),
        });
    }

    #[test]
    fn invalid_page_destinations_are_dropped() {
        let pages = page_refs(1);
        let annotation = LinkAnnotation {
            rect: [0.0, 0.0, 10.0, 10.0],
            dest: Destination {
                page: 5,
                x: 0.0,
                y: 0.0,
                zoom: 0.0,
            },
        };
        assert!(annotation.to_dict(&pages).is_none());
    }
}
