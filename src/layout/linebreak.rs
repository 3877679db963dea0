// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Justified line breaking.
//!
//! Break points form a directed acyclic graph: a vertex is a position where a line may start, an
//! edge is a candidate line from one break to the next.  The cost of an edge combines a badness
//! term quadratic in how far the inter-word glue must stretch from its preferred width, the
//! hyphenation cost of the chosen break point, and a widow term on underfull last lines.  The
//! cheapest path from the paragraph start to its end gives the line breaks.

use std::collections::BTreeMap;

use crate::fonts::FontCache;
use crate::style::{Alignment, Style};
use crate::tree::InlineKind;
use crate::Mm;

use super::line::{compute_line_metrics, FlatItem, LineMetrics};

/// One chosen line: the half-open item range `start..end`.
///
/// If the last item of the range is a separator, it was chosen as the break and renders in its
/// end-of-line face; the next line starts at `end`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BrokenLine {
    /// The index of the first item of the line.
    pub start: usize,
    /// The index one past the last item of the line.
    pub end: usize,
}

/// The outcome of costing a candidate line.
enum Candidate {
    Feasible(f64),
    Overfull,
}

fn line_cost(
    metrics: &LineMetrics,
    style: &Style,
    available_width: Mm,
    break_penalty: f64,
    is_last: bool,
) -> Candidate {
    if metrics.total_word_width > available_width + Mm(1e-6) {
        return Candidate::Overfull;
    }

    let justified = style.alignment() == Alignment::Justified;
    let badness = if justified && metrics.total_space_width > Mm(0.0) {
        let stretch =
            ((available_width - metrics.total_word_width) / metrics.total_space_width.0).0;
        if is_last {
            // the last line is set at its natural width; only nudge away from nearly
            // empty ones
            if stretch > 3.0 {
                5.0
            } else {
                0.0
            }
        } else {
            let deviation = stretch - 1.0;
            100.0 * deviation * deviation
        }
    } else {
        // ragged setting (or a line without glue): cost by the unused fraction
        if metrics.natural_width() > available_width + Mm(1e-6) {
            return Candidate::Overfull;
        }
        if is_last {
            0.0
        } else {
            let leftover = ((available_width - metrics.natural_width()) / available_width.0).0;
            100.0 * leftover * leftover
        }
    };

    Candidate::Feasible(badness + break_penalty)
}

/// Breaks the flattened inline stream into lines not wider than `available_width`.
///
/// Uses shortest-path search over the break-point graph; see the module documentation.
pub fn break_lines(
    items: &[FlatItem],
    fonts: &FontCache,
    style: &Style,
    available_width: Mm,
) -> Vec<BrokenLine> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }

    let break_candidates: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches!(item.obj.kind(), InlineKind::Separator(_)))
        .map(|(i, _)| i)
        .collect();

    // dist[start] = (total cost, predecessor line)
    let mut dist: BTreeMap<usize, (f64, Option<BrokenLine>)> = BTreeMap::new();
    dist.insert(0, (0.0, None));
    let mut finish: Option<(f64, BrokenLine)> = None;

    let starts: Vec<usize> = {
        let mut starts = vec![0];
        starts.extend(break_candidates.iter().map(|&s| s + 1).filter(|&v| v < n));
        starts.sort_unstable();
        starts.dedup();
        starts
    };

    for &start in &starts {
        let (base_cost, _) = match dist.get(&start) {
            Some(&entry) => entry,
            None => continue,
        };

        let mut reached_any = false;

        for &sep in break_candidates.iter().filter(|&&s| s >= start) {
            let line = BrokenLine {
                start,
                end: sep + 1,
            };
            let metrics = compute_line_metrics(&items[line.start..line.end], fonts);
            let penalty = match items[sep].obj.as_separator() {
                Some(separator) => f64::from(separator.hyphenation_cost()),
                None => 0.0,
            };
            match line_cost(&metrics, style, available_width, penalty, false) {
                Candidate::Feasible(cost) => {
                    reached_any = true;
                    relax(&mut dist, sep + 1, base_cost + cost, line);
                }
                Candidate::Overfull => {
                    if !reached_any {
                        // not even the shortest candidate fits; force the break and complain
                        log::warn!(
                            "not enough horizontal space for a line (needed {:?}, have {:?})",
                            metrics.total_word_width,
                            available_width
                        );
                        reached_any = true;
                        relax(&mut dist, sep + 1, base_cost + 1e6, line);
                    }
                    // words only grow to the right of this break
                    break;
                }
            }
        }

        // the final line
        let line = BrokenLine { start, end: n };
        let metrics = compute_line_metrics(&items[line.start..line.end], fonts);
        let cost = match line_cost(&metrics, style, available_width, 0.0, true) {
            Candidate::Feasible(cost) => Some(base_cost + cost),
            Candidate::Overfull => {
                if !reached_any {
                    log::warn!("not enough horizontal space for the last line of a paragraph");
                    Some(base_cost + 1e6)
                } else {
                    None
                }
            }
        };
        if let Some(cost) = cost {
            match finish {
                Some((best, _)) if best <= cost => {}
                _ => finish = Some((cost, line)),
            }
        }
    }

    // walk the predecessor chain backwards
    let mut lines = Vec::new();
    let mut current = match finish {
        Some((_, line)) => Some(line),
        None => None,
    };
    while let Some(line) = current {
        lines.push(line);
        current = if line.start == 0 {
            None
        } else {
            dist.get(&line.start).and_then(|&(_, prev)| prev)
        };
    }
    lines.reverse();
    lines
}

fn relax(
    dist: &mut BTreeMap<usize, (f64, Option<BrokenLine>)>,
    vertex: usize,
    cost: f64,
    line: BrokenLine,
) {
    match dist.get(&vertex) {
        Some(&(best, _)) if best <= cost => {}
        _ => {
            dist.insert(vertex, (cost, Some(line)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{builtin, Builtin, FontCache};
    use crate::hyphenate::Hyphenator;
    use crate::layout::line::flatten_inlines;
    use crate::style::Style;
    use crate::tree::{process_word_separators, InlineObject};
    use crate::Mm;

    fn setup() -> (FontCache, Style) {
        let cache = FontCache::new(builtin(Builtin::Courier).unwrap());
        let family = cache.default_font_family();
        let style = Style::new()
            .with_font_family(family)
            .with_font_style(crate::style::FontStyle::Regular)
            .with_font_size(Mm::from_pt(10.0))
            .with_root_font_size(Mm::from_pt(10.0))
            .with_line_spacing(1.0)
            .with_sentence_space_stretch(1.0)
            .with_paragraph_spacing(Mm(0.0))
            .with_alignment(crate::style::Alignment::Justified)
            .with_smart_quotes(false);
        (cache, style)
    }

    fn items_for(text: &str, style: &Style, hyphenator: Option<&Hyphenator>) -> Vec<FlatItem> {
        let input = vec![InlineObject::text(text)];
        let normalized = process_word_separators(input, hyphenator);
        let mut items = Vec::new();
        flatten_inlines(&normalized, *style, None, &mut items);
        items
    }

    // a Courier glyph at 10 pt is 6 pt wide
    fn glyphs(n: usize) -> Mm {
        Mm::from_pt(6.0 * n as f64)
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let (cache, style) = setup();
        let items = items_for("alpha beta", &style, None);
        let lines = break_lines(&items, &cache, &style, glyphs(20));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start, 0);
        assert_eq!(lines[0].end, items.len());
    }

    #[test]
    fn overlong_text_breaks_at_spaces() {
        let (cache, style) = setup();
        let items = items_for("alpha beta gamma delta", &style, None);
        // room for roughly 11 glyphs per line
        let lines = break_lines(&items, &cache, &style, glyphs(11));
        assert!(lines.len() >= 2);
        // lines tile the item sequence
        assert_eq!(lines[0].start, 0);
        for pair in lines.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(lines.last().unwrap().end, items.len());
        // every line fits
        for line in &lines {
            let metrics = compute_line_metrics(&items[line.start..line.end], &cache);
            assert!(metrics.total_word_width <= glyphs(11) + Mm(1e-6));
        }
    }

    #[test]
    fn hyphenation_points_are_used_when_needed() {
        let (cache, style) = setup();
        let hyphenator = Hyphenator::english();
        let items = items_for("hyphenation", &style, Some(&hyphenator));
        // "hyphenation" is 11 glyphs; 8 glyphs of room forces a break at "hyphen-"
        let lines = break_lines(&items, &cache, &style, glyphs(8));
        assert_eq!(lines.len(), 2);
        // the first line ends in a separator that renders a hyphen
        let last_item = &items[lines[0].end - 1];
        let sep = last_item.obj.as_separator().expect("break at a separator");
        assert_eq!(sep.end_of_line(), "-");
        let metrics = compute_line_metrics(&items[lines[0].start..lines[0].end], &cache);
        assert!(metrics.total_word_width <= glyphs(8) + Mm(1e-6));
    }

    #[test]
    fn oversized_words_force_a_break_with_a_warning() {
        let (cache, style) = setup();
        let items = items_for("incomprehensibilities yes", &style, None);
        let lines = break_lines(&items, &cache, &style, glyphs(5));
        // the overfull word still lands on its own line
        assert_eq!(lines.len(), 2);
    }
}
