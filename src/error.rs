// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Error types for `quire`.

use std::error;
use std::fmt;
use std::io;

/// A location in a source document, used for interpretation diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// The name of the source file.
    pub file: String,
    /// The one-based line number.
    pub line: usize,
    /// The one-based column number.
    pub column: usize,
}

impl Location {
    /// Creates a new location from a file name, a line and a column.
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Location {
        Location {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An error that occured in a `quire` function.
///
/// The error consists of an error message (provided by the `Display` implementation) and an error
/// kind, see [`kind`](#method.kind).  Interpretation and layout errors may carry the [`Location`][]
/// of the document node they originate from.
///
/// [`Location`]: struct.Location.html
#[derive(Debug)]
pub struct Error {
    msg: String,
    kind: ErrorKind,
    location: Option<Location>,
}

impl Error {
    /// Creates a new error.
    pub fn new(msg: impl Into<String>, kind: impl Into<ErrorKind>) -> Error {
        Error {
            msg: msg.into(),
            kind: kind.into(),
            location: None,
        }
    }

    /// Creates a new error with the given source location.
    pub fn at(msg: impl Into<String>, kind: impl Into<ErrorKind>, location: Location) -> Error {
        Error {
            msg: msg.into(),
            kind: kind.into(),
            location: Some(location),
        }
    }

    /// Returns the error kind for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the source location for this error, if known.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: {}", location, self.msg)
        } else {
            f.write_str(&self.msg)
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::IoError(err) => Some(err),
            ErrorKind::RusttypeError(err) => Some(err),
            _ => None,
        }
    }
}

/// The kind of an [`Error`](struct.Error.html).
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An internal error.
    Internal,
    /// An error raised while interpreting a document script.
    Interpretation,
    /// An error raised while laying out a document, e.g. insufficient space or an invalid
    /// cross-page reference.
    Layout,
    /// An inconsistency in the PDF object graph, e.g. a duplicate indirect id.
    PdfEncoding,
    /// An error caused by invalid data.
    InvalidData,
    /// An error caused by an invalid font.
    InvalidFont,
    /// An element exceeds the page size and could not be laid out.
    PageSizeExceeded,
    /// A string contains characters that the target encoding cannot represent.
    UnsupportedEncoding,
    /// An IO error.
    IoError(io::Error),
    /// An error caused by `rusttype`.
    RusttypeError(rusttype::Error),
}

impl From<io::Error> for ErrorKind {
    fn from(error: io::Error) -> ErrorKind {
        ErrorKind::IoError(error)
    }
}

impl From<rusttype::Error> for ErrorKind {
    fn from(error: rusttype::Error) -> ErrorKind {
        ErrorKind::RusttypeError(error)
    }
}

pub(crate) trait Context<T, E> {
    fn context<S: Into<String>>(self, msg: S) -> Result<T, Error>;

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, cb: F) -> Result<T, Error>;
}

impl<T, E: Into<ErrorKind>> Context<T, E> for Result<T, E> {
    fn context<S: Into<String>>(self, msg: S) -> Result<T, Error> {
        self.map_err(|err| Error::new(msg, err))
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, cb: F) -> Result<T, Error> {
        self.map_err(|err| Error::new(cb(), err))
    }
}
