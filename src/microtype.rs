// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Margin protrusion configuration.
//!
//! A microtype configuration file (`.cfg`) describes how far individual characters may protrude
//! into the margin, in thousandths of an em.  Rules are grouped into sections keyed by a font
//! family pattern (a name with an optional trailing `*` wildcard); a section can be restricted to
//! italic fonts and can name the feature set it provides.  The line layout engine uses the right
//! protrusion of a line's final character to let trailing punctuation hang into the right margin.

use std::fs;
use std::path;

use crate::error::{Context as _, Error, ErrorKind};

/// The protrusion ratios of a single character, in thousandths of an em.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Protrusion {
    /// How far the character may protrude into the left margin.
    pub left: f64,
    /// How far the character may protrude into the right margin.
    pub right: f64,
}

/// One section of a microtype configuration: a font-family pattern with its character rules.
#[derive(Clone, Debug)]
pub struct ProtrusionRule {
    pattern: String,
    italic_only: bool,
    features: Vec<String>,
    entries: Vec<(char, Protrusion)>,
}

impl ProtrusionRule {
    /// Returns whether this rule applies to the given font family name and italic flag.
    pub fn matches(&self, family: &str, italic: bool) -> bool {
        if self.italic_only && !italic {
            return false;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => family.starts_with(prefix),
            None => family == self.pattern,
        }
    }

    /// Returns the features this rule provides.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Returns the protrusion for the given character, if configured.
    pub fn get(&self, c: char) -> Option<Protrusion> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == c)
            .map(|(_, protrusion)| *protrusion)
    }
}

/// A parsed microtype configuration file.
#[derive(Clone, Debug, Default)]
pub struct MicrotypeConfig {
    rules: Vec<ProtrusionRule>,
}

impl MicrotypeConfig {
    /// Parses a configuration from the contents of a `.cfg` file.
    pub fn parse(contents: &str) -> Result<MicrotypeConfig, Error> {
        let mut config = MicrotypeConfig { rules: Vec::new() };

        for (number, line) in contents.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                let pattern = line
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| {
                        Error::new(
                            format!("malformed section header in line {}", number + 1),
                            ErrorKind::InvalidData,
                        )
                    })?;
                config.rules.push(ProtrusionRule {
                    pattern: pattern.trim().to_owned(),
                    italic_only: false,
                    features: Vec::new(),
                    entries: Vec::new(),
                });
                continue;
            }

            let rule = config.rules.last_mut().ok_or_else(|| {
                Error::new(
                    format!("entry before first section in line {}", number + 1),
                    ErrorKind::InvalidData,
                )
            })?;

            let mut parts = line.splitn(2, '=');
            let key = parts.next().unwrap_or("").trim();
            let value = parts
                .next()
                .ok_or_else(|| {
                    Error::new(
                        format!("missing '=' in line {}", number + 1),
                        ErrorKind::InvalidData,
                    )
                })?
                .trim();

            match key {
                "italic-only" => rule.italic_only = value == "true",
                "features" => {
                    rule.features = value.split(',').map(|f| f.trim().to_owned()).collect()
                }
                _ => {
                    let c = key_char(key).ok_or_else(|| {
                        Error::new(
                            format!("unknown character '{}' in line {}", key, number + 1),
                            ErrorKind::InvalidData,
                        )
                    })?;
                    let mut values = value.split_whitespace();
                    let left: f64 = values.next().unwrap_or("0").parse().unwrap_or(0.0);
                    let right: f64 = values.next().unwrap_or("0").parse().unwrap_or(0.0);
                    rule.entries.push((c, Protrusion { left, right }));
                }
            }
        }

        Ok(config)
    }

    /// Parses the configuration file at the given path.
    pub fn from_file(path: impl AsRef<path::Path>) -> Result<MicrotypeConfig, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not read microtype config {}", path.display()))?;
        MicrotypeConfig::parse(&contents)
    }

    /// Returns the default configuration embedded in this crate.
    pub fn default_config() -> MicrotypeConfig {
        MicrotypeConfig::parse(include_str!("../data/microtype/default.cfg"))
            .expect("Invariant violated: embedded microtype config is malformed")
    }

    /// Returns the protrusion for the given character in the given font family.
    ///
    /// The first matching section wins.
    pub fn protrusion(&self, family: &str, italic: bool, c: char) -> Option<Protrusion> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(family, italic))
            .find_map(|rule| rule.get(c))
    }
}

/// Resolves a character key: either the character itself or a small set of symbolic names.
fn key_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    match key {
        "hyphen" => Some('-'),
        "quoteright" => Some('\u{2019}'),
        "quoteleft" => Some('\u{2018}'),
        "quotedblright" => Some('\u{201D}'),
        "quotedblleft" => Some('\u{201C}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = MicrotypeConfig::default_config();
        let protrusion = config.protrusion("Times-Roman", false, '.').unwrap();
        assert_eq!(protrusion.right, 700.0);
        assert_eq!(protrusion.left, 0.0);
    }

    #[test]
    fn wildcard_patterns() {
        let config = MicrotypeConfig::parse("[Foo*]\n. = 0 500\n").unwrap();
        assert!(config.protrusion("Foo-Bar", false, '.').is_some());
        assert!(config.protrusion("Bar-Foo", false, '.').is_none());
    }

    #[test]
    fn italic_only_sections() {
        let config = MicrotypeConfig::parse("[Foo*]\nitalic-only = true\n. = 0 500\n").unwrap();
        assert!(config.protrusion("Foo-Italic", true, '.').is_some());
        assert!(config.protrusion("Foo-Roman", false, '.').is_none());
    }

    #[test]
    fn named_characters() {
        let config = MicrotypeConfig::parse("[X]\nquoteright = 100 200\n").unwrap();
        let protrusion = config.protrusion("X", false, '\u{2019}').unwrap();
        assert_eq!(protrusion.left, 100.0);
        assert_eq!(protrusion.right, 200.0);
    }
}
