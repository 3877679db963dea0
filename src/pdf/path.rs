// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The path operator stream.

use std::fmt::Write as _;

use crate::layout::PathSegment;
use crate::style::Color;
use crate::tree::{CapStyle, JoinStyle, PathStyle};

use super::writer::fmt_real;

/// A path on one page: segments plus paint attributes, in PDF user space.
#[derive(Debug)]
pub struct Path {
    /// The origin the segment coordinates are relative to (y-down offsets are applied by the
    /// caller; coordinates here are final user-space points).
    pub segments: Vec<(PathOp, [f64; 6])>,
    /// The paint attributes.
    pub style: PathStyle,
    /// The name of the graphics state resource to activate, if one is registered.
    pub gstate: Option<String>,
}

/// A resolved path operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathOp {
    /// `x y m`
    MoveTo,
    /// `x y l`
    LineTo,
    /// `x1 y1 x2 y2 x3 y3 c`
    Cubic,
    /// `x2 y2 x3 y3 v`
    CubicStart,
    /// `x1 y1 x3 y3 y`
    CubicEnd,
    /// `x y w h re`
    Rectangle,
    /// `h`
    Close,
}

impl PathOp {
    fn operator(self) -> &'static str {
        match self {
            PathOp::MoveTo => "m",
            PathOp::LineTo => "l",
            PathOp::Cubic => "c",
            PathOp::CubicStart => "v",
            PathOp::CubicEnd => "y",
            PathOp::Rectangle => "re",
            PathOp::Close => "h",
        }
    }

    fn operands(self) -> usize {
        match self {
            PathOp::MoveTo | PathOp::LineTo => 2,
            PathOp::Cubic => 6,
            PathOp::CubicStart | PathOp::CubicEnd | PathOp::Rectangle => 4,
            PathOp::Close => 0,
        }
    }
}

/// Converts layout path segments into user-space operators.
///
/// `to_user` maps a millimeter position relative to the path origin into PDF user space.
pub fn resolve_segments(
    segments: &[PathSegment],
    mut to_user: impl FnMut(crate::Position) -> (f64, f64),
) -> Vec<(PathOp, [f64; 6])> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match *segment {
            PathSegment::MoveTo(pos) => {
                let (x, y) = to_user(pos);
                out.push((PathOp::MoveTo, [x, y, 0.0, 0.0, 0.0, 0.0]));
            }
            PathSegment::LineTo(pos) => {
                let (x, y) = to_user(pos);
                out.push((PathOp::LineTo, [x, y, 0.0, 0.0, 0.0, 0.0]));
            }
            PathSegment::CubicBezier(c1, c2, end) => {
                let (x1, y1) = to_user(c1);
                let (x2, y2) = to_user(c2);
                let (x3, y3) = to_user(end);
                out.push((PathOp::Cubic, [x1, y1, x2, y2, x3, y3]));
            }
            PathSegment::CubicStart(c2, end) => {
                let (x2, y2) = to_user(c2);
                let (x3, y3) = to_user(end);
                out.push((PathOp::CubicStart, [x2, y2, x3, y3, 0.0, 0.0]));
            }
            PathSegment::CubicEnd(c1, end) => {
                let (x1, y1) = to_user(c1);
                let (x3, y3) = to_user(end);
                out.push((PathOp::CubicEnd, [x1, y1, x3, y3, 0.0, 0.0]));
            }
            PathSegment::Rectangle(pos, size) => {
                // the rectangle's corner is its top-left in layout space
                let (x, y) = to_user(crate::Position::new(pos.x, pos.y + size.height));
                out.push((
                    PathOp::Rectangle,
                    [x, y, size.width.to_pt(), size.height.to_pt(), 0.0, 0.0],
                ));
            }
            PathSegment::ClosePath => {
                out.push((PathOp::Close, [0.0; 6]));
            }
        }
    }
    out
}

fn color_operators(color: Color, stroke: bool) -> String {
    let (rgb_op, cmyk_op, grey_op) = if stroke {
        ("RG", "K", "G")
    } else {
        ("rg", "k", "g")
    };
    match color {
        Color::Rgb(r, g, b) => format!(
            "{} {} {} {}",
            fmt_real(f64::from(r) / 255.0),
            fmt_real(f64::from(g) / 255.0),
            fmt_real(f64::from(b) / 255.0),
            rgb_op
        ),
        Color::Cmyk(c, m, y, k) => format!(
            "{} {} {} {} {}",
            fmt_real(f64::from(c) / 255.0),
            fmt_real(f64::from(m) / 255.0),
            fmt_real(f64::from(y) / 255.0),
            fmt_real(f64::from(k) / 255.0),
            cmyk_op
        ),
        Color::Greyscale(value) => format!("{} {}", fmt_real(f64::from(value) / 255.0), grey_op),
    }
}

impl Path {
    /// Serialises the path into content stream operators.
    pub fn serialise(&self) -> String {
        let mut out = String::from("q\n");
        if let Some(gstate) = &self.gstate {
            let _ = writeln!(out, "/{} gs", gstate);
        }

        let cap = match self.style.cap {
            CapStyle::Butt => 0,
            CapStyle::Round => 1,
            CapStyle::Projecting => 2,
        };
        let join = match self.style.join {
            JoinStyle::Miter => 0,
            JoinStyle::Round => 1,
            JoinStyle::Bevel => 2,
        };
        let _ = writeln!(
            out,
            "{} w {} J {} j {} M",
            fmt_real(self.style.line_width.to_pt()),
            cap,
            join,
            fmt_real(self.style.miter_limit)
        );
        if let Some(stroke) = self.style.stroke {
            out.push_str(&color_operators(stroke, true));
            out.push('\n');
        }
        if let Some(fill) = self.style.fill {
            out.push_str(&color_operators(fill, false));
            out.push('\n');
        }

        for (op, operands) in &self.segments {
            for operand in operands.iter().take(op.operands()) {
                let _ = write!(out, "{} ", fmt_real(*operand));
            }
            out.push_str(op.operator());
            out.push('\n');
        }

        let paint = match (self.style.stroke.is_some(), self.style.fill.is_some()) {
            (true, true) => "B",
            (true, false) => "S",
            (false, true) => "f",
            (false, false) => "n",
        };
        out.push_str(paint);
        out.push_str("\nQ\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mm, Position};

    #[test]
    fn stroked_line() {
        let segments = resolve_segments(
            &[
                PathSegment::MoveTo(Position::new(0, 0)),
                PathSegment::LineTo(Position::new(10, 0)),
            ],
            |pos| (pos.x.to_pt(), 100.0 - pos.y.to_pt()),
        );
        let path = Path {
            segments,
            style: PathStyle {
                line_width: Mm::from_pt(2.0),
                ..PathStyle::default()
            },
            gstate: Some("G1".to_owned()),
        };
        let out = path.serialise();
        assert!(out.starts_with("q\n/G1 gs\n"));
        assert!(out.contains("2 w 0 J 0 j 4 M"));
        assert!(out.contains("0 0 0 RG"));
        assert!(out.contains("0 100 m"));
        assert!(out.contains('l'));
        assert!(out.trim_end().ends_with("S\nQ"));
    }
}
