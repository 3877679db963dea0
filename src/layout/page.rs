// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The page layout and its cursor.
//!
//! A [`PageLayout`][] is an append-only sequence of equally sized pages with margins.  It does not
//! own any content; layout objects reference positions on it.  A [`PageCursor`][] is a value: all
//! movement methods return a new cursor, and movements that can overflow the page bottom go
//! through the layout so that new pages spring into existence as needed.
//!
//! Positions come in two addressing modes: [`RelativePos`][] is relative to the top-left corner of
//! a page's content area (inside the margins), [`AbsolutePagePos`][] to the top-left corner of the
//! paper.  Both are in millimeters with y growing downwards.
//!
//! [`PageLayout`]: struct.PageLayout.html
//! [`PageCursor`]: struct.PageCursor.html
//! [`RelativePos`]: struct.RelativePos.html
//! [`AbsolutePagePos`]: struct.AbsolutePagePos.html

use crate::{Margins, Mm, Position, Size};

/// A position relative to the content area of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RelativePos {
    /// The zero-based page index.
    pub page: usize,
    /// The position, relative to the top-left corner of the page's content area.
    pub pos: Position,
}

/// A position relative to the paper of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AbsolutePagePos {
    /// The zero-based page index.
    pub page: usize,
    /// The position, relative to the top-left corner of the paper.
    pub pos: Position,
}

/// A position on a multi-page canvas.
///
/// A cursor tracks the current page, the position within the page's content area, the x origin
/// that a carriage return goes back to, and an optional right edge that caps the usable width.
/// Cursors are cheap values; methods that advance past the bottom margin take the layout mutably
/// and create new pages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageCursor {
    page: usize,
    pos: Position,
    origin_x: Mm,
    right_limit: Option<Mm>,
}

impl PageCursor {
    /// Returns the zero-based page index of this cursor.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Returns the position of this cursor relative to the page's content area.
    pub fn position(&self) -> RelativePos {
        RelativePos {
            page: self.page,
            pos: self.pos,
        }
    }
}

/// A multi-page canvas with fixed paper size and margins.
#[derive(Clone, Debug)]
pub struct PageLayout {
    paper_size: Size,
    margins: Margins,
    content_size: Size,
    page_count: usize,
}

impl PageLayout {
    /// Creates a page layout with one page of the given paper size and margins.
    pub fn new(paper_size: Size, margins: Margins) -> PageLayout {
        let content_size = Size::new(
            paper_size.width - margins.left() - margins.right(),
            paper_size.height - margins.top() - margins.bottom(),
        );
        PageLayout {
            paper_size,
            margins,
            content_size,
            page_count: 1,
        }
    }

    /// Returns the paper size.
    pub fn paper_size(&self) -> Size {
        self.paper_size
    }

    /// Returns the margins.
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Returns the size of the content area of a page.
    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// Returns the number of pages that have been created so far.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Returns a cursor at the top-left corner of the content area of the first page.
    pub fn new_cursor(&self) -> PageCursor {
        PageCursor {
            page: 0,
            pos: Position::default(),
            origin_x: Mm(0.0),
            right_limit: None,
        }
    }

    /// Returns a cursor at the given absolute position, creating the page if necessary.
    pub fn new_cursor_at_position(&mut self, pos: AbsolutePagePos) -> PageCursor {
        self.ensure_page(pos.page);
        let relative = self.to_relative(pos);
        PageCursor {
            page: relative.page,
            pos: relative.pos,
            origin_x: relative.pos.x,
            right_limit: None,
        }
    }

    /// Converts a content-relative position into a paper-relative position.
    pub fn to_absolute(&self, pos: RelativePos) -> AbsolutePagePos {
        AbsolutePagePos {
            page: pos.page,
            pos: Position::new(
                pos.pos.x + self.margins.left(),
                pos.pos.y + self.margins.top(),
            ),
        }
    }

    /// Converts a paper-relative position into a content-relative position.
    pub fn to_relative(&self, pos: AbsolutePagePos) -> RelativePos {
        RelativePos {
            page: pos.page,
            pos: Position::new(
                pos.pos.x - self.margins.left(),
                pos.pos.y - self.margins.top(),
            ),
        }
    }

    /// Returns the remaining horizontal space from the cursor to the right edge.
    pub fn width_at_cursor(&self, cursor: PageCursor) -> Mm {
        let right = match cursor.right_limit {
            Some(limit) => limit.min(self.content_size.width),
            None => self.content_size.width,
        };
        (right - cursor.pos.x).max(Mm(0.0))
    }

    /// Returns the remaining vertical space from the cursor to the bottom margin.
    pub fn vertical_space_at_cursor(&self, cursor: PageCursor) -> Mm {
        (self.content_size.height - cursor.pos.y).max(Mm(0.0))
    }

    /// Moves the cursor to the right.
    pub fn move_right(&self, cursor: PageCursor, shift: Mm) -> PageCursor {
        PageCursor {
            pos: Position::new(cursor.pos.x + shift, cursor.pos.y),
            ..cursor
        }
    }

    /// Moves the cursor back to its x origin.
    pub fn carriage_return(&self, cursor: PageCursor) -> PageCursor {
        PageCursor {
            pos: Position::new(cursor.origin_x, cursor.pos.y),
            ..cursor
        }
    }

    /// Moves the cursor down, advancing to a fresh page if the bottom margin is crossed.
    pub fn move_down(&mut self, cursor: PageCursor, shift: Mm) -> PageCursor {
        let (cursor, _) = self.move_down_tracked(cursor, shift);
        cursor
    }

    fn move_down_tracked(&mut self, cursor: PageCursor, shift: Mm) -> (PageCursor, bool) {
        if cursor.pos.y + shift > self.content_size.height {
            let page = cursor.page + 1;
            self.ensure_page(page);
            let pos = Position::new(cursor.pos.x, shift.min(self.content_size.height));
            (PageCursor { page, pos, ..cursor }, true)
        } else {
            let pos = Position::new(cursor.pos.x, cursor.pos.y + shift);
            (PageCursor { pos, ..cursor }, false)
        }
    }

    /// Performs a carriage return and moves down by the given line height.
    ///
    /// Returns the new cursor and whether the move overflowed onto a new page.
    pub fn new_line(&mut self, cursor: PageCursor, line_height: Mm) -> (PageCursor, bool) {
        let cursor = self.carriage_return(cursor);
        self.move_down_tracked(cursor, line_height)
    }

    /// Makes sure at least the given vertical space remains below the cursor, advancing to the
    /// top of a fresh page otherwise.
    ///
    /// Returns the new cursor and whether a page break happened.
    pub fn ensure_vertical_space(&mut self, cursor: PageCursor, height: Mm) -> (PageCursor, bool) {
        if self.vertical_space_at_cursor(cursor) < height {
            let page = cursor.page + 1;
            self.ensure_page(page);
            (
                PageCursor {
                    page,
                    pos: Position::new(cursor.origin_x, Mm(0.0)),
                    ..cursor
                },
                true,
            )
        } else {
            (cursor, false)
        }
    }

    /// Moves the cursor to the top of a fresh page.
    pub fn new_page(&mut self, cursor: PageCursor) -> PageCursor {
        let page = cursor.page + 1;
        self.ensure_page(page);
        PageCursor {
            page,
            pos: Position::new(cursor.origin_x, Mm(0.0)),
            ..cursor
        }
    }

    /// Returns a cursor whose usable width is capped to the given width and whose carriage
    /// returns go back to the current x position.
    ///
    /// This is how nested layout regions (table cells, horizontal boxes) are carved out of a
    /// page.
    pub fn limit_width(&self, cursor: PageCursor, width: Mm) -> PageCursor {
        PageCursor {
            origin_x: cursor.pos.x,
            right_limit: Some((cursor.pos.x + width).min(self.content_size.width)),
            ..cursor
        }
    }

    fn ensure_page(&mut self, page: usize) {
        if page >= self.page_count {
            self.page_count = page + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx;

    fn layout() -> PageLayout {
        PageLayout::new(Size::new(210, 297), Margins::trbl(20, 15, 20, 15))
    }

    #[test]
    fn content_area() {
        let layout = layout();
        assert_approx(layout.content_size().width, Mm(180.0));
        assert_approx(layout.content_size().height, Mm(257.0));
    }

    #[test]
    fn cursor_movement() {
        let mut layout = layout();
        let cursor = layout.new_cursor();
        assert_approx(layout.width_at_cursor(cursor), Mm(180.0));

        let cursor = layout.move_right(cursor, Mm(30.0));
        assert_approx(layout.width_at_cursor(cursor), Mm(150.0));

        let cursor = layout.move_down(cursor, Mm(100.0));
        assert_approx(layout.vertical_space_at_cursor(cursor), Mm(157.0));
        assert_eq!(cursor.page(), 0);

        let cursor = layout.carriage_return(cursor);
        assert_approx(cursor.position().pos.x, Mm(0.0));
    }

    #[test]
    fn page_overflow_creates_pages() {
        let mut layout = layout();
        let cursor = layout.new_cursor();
        let cursor = layout.move_down(cursor, Mm(250.0));
        assert_eq!(layout.page_count(), 1);
        let (cursor, new_page) = layout.new_line(cursor, Mm(10.0));
        assert!(new_page);
        assert_eq!(cursor.page(), 1);
        assert_eq!(layout.page_count(), 2);
        assert_approx(cursor.position().pos.y, Mm(10.0));
    }

    #[test]
    fn ensure_vertical_space_breaks_pages() {
        let mut layout = layout();
        let cursor = layout.new_cursor();
        let (cursor, broke) = layout.ensure_vertical_space(cursor, Mm(100.0));
        assert!(!broke);
        assert_eq!(cursor.page(), 0);

        let cursor = layout.move_down(cursor, Mm(200.0));
        let (cursor, broke) = layout.ensure_vertical_space(cursor, Mm(100.0));
        assert!(broke);
        assert_eq!(cursor.page(), 1);
        assert_approx(cursor.position().pos.y, Mm(0.0));
    }

    #[test]
    fn width_limits_are_sticky() {
        let mut layout = layout();
        let cursor = layout.new_cursor();
        let cursor = layout.move_right(cursor, Mm(40.0));
        let cursor = layout.limit_width(cursor, Mm(50.0));
        assert_approx(layout.width_at_cursor(cursor), Mm(50.0));

        // a carriage return goes back to the origin of the limited region
        let (cursor, _) = layout.new_line(cursor, Mm(10.0));
        assert_approx(cursor.position().pos.x, Mm(40.0));
        assert_approx(layout.width_at_cursor(cursor), Mm(50.0));
    }

    #[test]
    fn position_conversions_roundtrip() {
        let layout = layout();
        let rel = RelativePos {
            page: 2,
            pos: Position::new(10, 20),
        };
        let abs = layout.to_absolute(rel);
        assert_approx(abs.pos.x, Mm(25.0));
        assert_approx(abs.pos.y, Mm(40.0));
        assert_eq!(layout.to_relative(abs), rel);
    }
}
