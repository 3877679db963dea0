// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Knuth–Liang hyphenation.
//!
//! A [`Hyphenator`][] is loaded from a TeX-format pattern file with a `\patterns{…}` block and an
//! optional `\hyphenation{…}` exception block.  Querying a word yields a priority per inter-letter
//! gap; a gap with an odd priority is a valid break point.  The layout engine maps the odd
//! priorities 1/3/5 to break costs 5/3/1, so a higher priority makes a cheaper break.
//!
//! # Example
//!
//! ```
//! let hyphenator = quire::hyphenate::Hyphenator::english();
//! let points = hyphenator.points("hyphenation");
//! // "hy-phen-ation": odd priorities after the 2nd and 6th letter
//! assert_eq!(points[2] % 2, 1);
//! assert_eq!(points[6] % 2, 1);
//! ```
//!
//! [`Hyphenator`]: struct.Hyphenator.html

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path;
use std::rc::Rc;

use crate::error::{Context as _, Error, ErrorKind};

/// The maximum number of code points in a pattern.
const MAX_PATTERN_LEN: usize = 16;

/// The priority digits of a pattern, by gap position.
///
/// A pattern of up to 16 code points has up to 17 gaps (before, between and after its letters).
type Priorities = [u8; MAX_PATTERN_LEN + 1];

/// Hyphenates words using TeX-format patterns.
///
/// See the [module documentation](index.html) for an overview.  Patterns anchored with a leading
/// `.` only match at the start of a word, patterns with a trailing `.` only at the end; all other
/// patterns slide across every position.  Exceptions from the `\hyphenation{…}` block override the
/// pattern-derived priorities for exact word matches.  Query results are memoised for the lifetime
/// of the hyphenator.
pub struct Hyphenator {
    front: HashMap<String, Priorities>,
    mid: HashMap<String, Priorities>,
    back: HashMap<String, Priorities>,
    cache: RefCell<HashMap<String, Rc<Vec<u8>>>>,
}

impl Hyphenator {
    /// Parses a hyphenator from the contents of a TeX-format pattern file.
    ///
    /// The contents must contain a `\patterns{…}` block and may contain a `\hyphenation{…}` block
    /// with exceptions.  A UTF-8 BOM is tolerated.
    pub fn parse(contents: &str) -> Result<Hyphenator, Error> {
        let contents = contents.trim_start_matches('\u{feff}');

        let mut hyphenator = Hyphenator {
            front: HashMap::new(),
            mid: HashMap::new(),
            back: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        };

        let patterns = block_contents(contents, "\\patterns{").ok_or_else(|| {
            Error::new("missing \\patterns block", ErrorKind::InvalidData)
        })?;
        for token in tokens(patterns) {
            hyphenator.add_pattern(token)?;
        }

        if let Some(exceptions) = block_contents(contents, "\\hyphenation{") {
            for word in tokens(exceptions) {
                hyphenator.add_exception(word);
            }
        }

        Ok(hyphenator)
    }

    /// Parses the hyphenation file at the given path.
    pub fn from_file(path: impl AsRef<path::Path>) -> Result<Hyphenator, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not read hyphenation file {}", path.display()))?;
        Hyphenator::parse(&contents)
    }

    /// Looks up `<name>.tex` in the `data/hyphenation` directory of each of the given library
    /// paths and parses the first match.
    pub fn load(library_paths: &[path::PathBuf], name: &str) -> Result<Hyphenator, Error> {
        for dir in library_paths {
            let path = dir.join("data").join("hyphenation").join(format!("{}.tex", name));
            if path.is_file() {
                return Hyphenator::from_file(path);
            }
        }
        Err(Error::new(
            format!("no hyphenation patterns found for '{}'", name),
            ErrorKind::InvalidData,
        ))
    }

    /// Returns a hyphenator for English, built from the embedded pattern file.
    pub fn english() -> Hyphenator {
        Hyphenator::parse(include_str!("../data/hyphenation/en.tex"))
            .expect("Invariant violated: embedded hyphenation patterns are malformed")
    }

    fn add_pattern(&mut self, token: &str) -> Result<(), Error> {
        let front_anchored = token.starts_with('.');
        let back_anchored = token.ends_with('.') && token.len() > 1;

        let mut letters = String::new();
        let mut priorities: Priorities = [0; MAX_PATTERN_LEN + 1];
        let mut num_letters = 0usize;

        for c in token.chars() {
            if c == '.' {
                continue;
            } else if let Some(digit) = c.to_digit(10) {
                priorities[num_letters] = digit as u8;
            } else {
                if num_letters >= MAX_PATTERN_LEN {
                    return Err(Error::new(
                        format!("hyphenation pattern '{}' is too long", token),
                        ErrorKind::InvalidData,
                    ));
                }
                letters.push(c);
                num_letters += 1;
            }
        }

        let table = if front_anchored {
            &mut self.front
        } else if back_anchored {
            &mut self.back
        } else {
            &mut self.mid
        };
        table.insert(letters, priorities);
        Ok(())
    }

    fn add_exception(&mut self, token: &str) {
        let mut word = String::new();
        let mut points = Vec::new();
        for c in token.chars() {
            if c == '-' {
                // an explicit break in an exception has the best odd priority
                points.push(5);
            } else {
                word.push(c);
                while points.len() < word.chars().count() {
                    points.push(0);
                }
            }
        }
        points.push(0);
        self.cache.borrow_mut().insert(word, Rc::new(points));
    }

    /// Computes the hyphenation priorities for the given word.
    ///
    /// The result has one entry per gap, i.e. `word.chars().count() + 1` entries; entry *i* is the
    /// priority of breaking before the *i*-th code point.  Odd entries are valid break points.
    /// The first and last entry are never used as breaks by the layout engine.
    pub fn points(&self, word: &str) -> Rc<Vec<u8>> {
        let lowercased: String = word.chars().flat_map(char::to_lowercase).collect();

        if let Some(hit) = self.cache.borrow().get(&lowercased) {
            return Rc::clone(hit);
        }

        let chars: Vec<char> = lowercased.chars().collect();
        let len = chars.len();
        let mut result = vec![0u8; len + 1];

        let mut apply = |table: &HashMap<String, Priorities>, start: usize, pat_len: usize| {
            let snippet: String = chars[start..start + pat_len].iter().collect();
            if let Some(priorities) = table.get(&snippet) {
                for (k, &p) in priorities.iter().enumerate().take(pat_len + 1) {
                    if p != 0 && result[start + k] < p {
                        result[start + k] = p;
                    }
                }
            }
        };

        for pat_len in 1..=MAX_PATTERN_LEN.min(len) {
            apply(&self.front, 0, pat_len);
            apply(&self.back, len - pat_len, pat_len);
            for start in 0..=(len - pat_len) {
                apply(&self.mid, start, pat_len);
            }
        }

        let result = Rc::new(result);
        self.cache
            .borrow_mut()
            .insert(lowercased, Rc::clone(&result));
        result
    }

    /// Maps a hyphenation priority to a break cost.
    ///
    /// The produced odd priorities 1, 3 and 5 map to the costs 5, 3 and 1: a higher priority makes
    /// a cheaper break.
    pub fn break_cost(priority: u8) -> u8 {
        6u8.saturating_sub(priority.min(5))
    }
}

/// Returns the contents of the block starting with `opener`, up to the matching `}`.
fn block_contents<'a>(contents: &'a str, opener: &str) -> Option<&'a str> {
    let start = contents.find(opener)? + opener.len();
    let end = contents[start..].find('}')?;
    Some(&contents[start..start + end])
}

/// Iterates over the whitespace-separated tokens of a block, skipping TeX comments.
fn tokens(block: &str) -> impl Iterator<Item = &str> {
    block
        .lines()
        .map(|line| line.split('%').next().unwrap_or(""))
        .flat_map(|line| line.split_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Hyphenator {
        Hyphenator::parse(
            "\\patterns{\nhy3ph\nhe2n\nhena4\nhen5at\n1na\nn2at\n1tio\n2io\no2n\n}\n",
        )
        .unwrap()
    }

    #[test]
    fn thesis_example() {
        let points = sample().points("hyphenation");
        assert_eq!(points.len(), "hyphenation".len() + 1);
        let odd: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| *p % 2 == 1)
            .map(|(i, _)| i)
            .collect();
        // hy-phen-ation
        assert_eq!(odd, vec![2, 6]);
    }

    #[test]
    fn priorities_are_bounded() {
        let points = sample().points("hyphenation");
        assert!(points.iter().all(|&p| p <= 9));
    }

    #[test]
    fn queries_are_idempotent() {
        let hyphenator = sample();
        let first = hyphenator.points("hyphenation");
        let second = hyphenator.points("hyphenation");
        assert_eq!(first, second);
    }

    #[test]
    fn anchored_patterns() {
        let hyphenator = Hyphenator::parse("\\patterns{\n.ab1c\nab1c\nxy1z.\n}\n").unwrap();
        // front-anchored pattern applies at the word start
        assert_eq!(hyphenator.points("abcabc")[3], 1);
        // the same letters mid-word only hit the unanchored variant
        assert_eq!(hyphenator.points("zabc")[4], 0);
        // back-anchored pattern applies only at the end
        assert_eq!(hyphenator.points("xyzxyz")[5], 1);
        assert_eq!(hyphenator.points("xyzxyz")[2], 0);
    }

    #[test]
    fn exceptions_override_patterns() {
        let hyphenator = Hyphenator::parse(
            "\\patterns{\nhy3ph\n}\n\\hyphenation{\nta-ble\n}\n",
        )
        .unwrap();
        let points = hyphenator.points("table");
        assert_eq!(points[2], 5);
        assert_eq!(points.iter().filter(|&&p| p % 2 == 1).count(), 1);
    }

    #[test]
    fn case_is_folded() {
        let hyphenator = sample();
        assert_eq!(hyphenator.points("Hyphenation"), hyphenator.points("hyphenation"));
    }

    #[test]
    fn break_costs() {
        assert_eq!(Hyphenator::break_cost(1), 5);
        assert_eq!(Hyphenator::break_cost(3), 3);
        assert_eq!(Hyphenator::break_cost(5), 1);
    }

    #[test]
    fn bom_is_tolerated() {
        let hyphenator = Hyphenator::parse("\u{feff}\\patterns{\nhy3ph\n}\n").unwrap();
        assert_eq!(hyphenator.points("hyph")[2], 3);
    }

    #[test]
    fn english_patterns_load() {
        let hyphenator = Hyphenator::english();
        let points = hyphenator.points("computer");
        // com-put-er
        assert_eq!(points[3] % 2, 1);
    }
}
