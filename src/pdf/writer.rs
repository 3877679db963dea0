// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Serialising the object graph into PDF file syntax.
//!
//! Writing happens in two phases.  Phase A walks the graph from the catalog and the info
//! dictionary and hands out object ids in traversal order; phase B writes the header, every
//! indirect object at a recorded byte offset, the cross-reference table, and the trailer.  Given
//! the same object graph, the emitted bytes are identical.

use std::io::{self, Write};

use crate::error::{Context as _, Error, ErrorKind};

use super::object::{Dict, Name, ObjRef, Object, SlotValue};

/// A writer that tracks the number of bytes written, for the cross-reference table.
pub struct CountingWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wraps the given writer.
    pub fn new(inner: W) -> CountingWriter<W> {
        CountingWriter { inner, position: 0 }
    }

    /// Returns the number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Phase A: assigns ids to every indirect object reachable from `root`, in traversal order.
fn assign_ids(root: &ObjRef, next_id: &mut u64, objects: &mut Vec<ObjRef>) -> Result<(), Error> {
    if root.id() != 0 {
        // already visited through another reference
        return Ok(());
    }
    *next_id += 1;
    root.0.id.set(*next_id);
    objects.push(root.clone());

    // children before siblings
    let value = root.0.value.borrow();
    match &*value {
        SlotValue::Object(object) => assign_children(object, next_id, objects)?,
        SlotValue::Stream(stream) => {
            for (_, entry) in stream.dict.iter() {
                assign_children(entry, next_id, objects)?;
            }
        }
    }
    Ok(())
}

fn assign_children(
    object: &Object,
    next_id: &mut u64,
    objects: &mut Vec<ObjRef>,
) -> Result<(), Error> {
    match object {
        Object::Array(entries) => {
            for entry in entries {
                assign_children(entry, next_id, objects)?;
            }
        }
        Object::Dict(dict) => {
            for (_, entry) in dict.iter() {
                assign_children(entry, next_id, objects)?;
            }
        }
        Object::Reference(indirect) => assign_ids(indirect, next_id, objects)?,
        _ => {}
    }
    Ok(())
}

/// Formats a real number the way PDF expects: plain decimal, no exponent, no trailing zeros.
pub(crate) fn fmt_real(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let mut s = format!("{:.3}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Serialises a name with `#xx` escapes for delimiters.
fn write_name<W: Write>(w: &mut W, name: &Name) -> io::Result<()> {
    w.write_all(b"/")?;
    for &byte in name.0.as_bytes() {
        match byte {
            b'\x00'..=b' ' | b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']'
            | b'{' | b'}' | 0x7f..=0xff => {
                write!(w, "#{:02X}", byte)?;
            }
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}

/// Serialises a string object, switching to hex form for binary content.
fn write_string<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    if bytes.iter().all(|&b| (0x20..0x7f).contains(&b)) {
        w.write_all(b"(")?;
        for &byte in bytes {
            match byte {
                b'(' | b')' | b'\\' => {
                    w.write_all(&[b'\\', byte])?;
                }
                _ => w.write_all(&[byte])?,
            }
        }
        w.write_all(b")")
    } else {
        w.write_all(b"<")?;
        for byte in bytes {
            write!(w, "{:02X}", byte)?;
        }
        w.write_all(b">")
    }
}

/// Serialises an object in full, inlining everything except references.
pub(crate) fn write_object<W: Write>(w: &mut W, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => w.write_all(b"null"),
        Object::Boolean(value) => write!(w, "{}", value),
        Object::Integer(value) => write!(w, "{}", value),
        Object::Real(value) => w.write_all(fmt_real(*value).as_bytes()),
        Object::Str(bytes) => write_string(w, bytes),
        Object::Name(name) => write_name(w, name),
        Object::Array(entries) => {
            w.write_all(b"[")?;
            for (index, entry) in entries.iter().enumerate() {
                if index > 0 {
                    w.write_all(b" ")?;
                }
                write_object(w, entry)?;
            }
            w.write_all(b"]")
        }
        Object::Dict(dict) => write_dict(w, dict),
        Object::Reference(indirect) => write!(w, "{} 0 R", indirect.id()),
    }
}

fn write_dict<W: Write>(w: &mut W, dict: &Dict) -> io::Result<()> {
    w.write_all(b"<< ")?;
    for (name, value) in dict.iter() {
        write_name(w, name)?;
        w.write_all(b" ")?;
        write_object(w, value)?;
        w.write_all(b" ")?;
    }
    w.write_all(b">>")
}

fn write_indirect<W: Write>(w: &mut CountingWriter<W>, indirect: &ObjRef) -> Result<(), Error> {
    if indirect.0.written.get() {
        return Err(Error::new(
            format!("object {} written twice", indirect.id()),
            ErrorKind::PdfEncoding,
        ));
    }
    indirect.0.offset.set(w.position());
    indirect.0.written.set(true);

    write!(w, "{} 0 obj\n", indirect.id()).context("Failed to write object")?;

    let value = indirect.0.value.borrow();
    match &*value {
        SlotValue::Object(object) => {
            write_object(w, object).context("Failed to write object")?;
        }
        SlotValue::Stream(stream) => {
            let mut dict = stream.dict.clone();
            let body = if stream.compress {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&stream.data)
                    .and_then(|_| encoder.finish())
                    .context("Failed to compress stream")?
            } else {
                stream.data.clone()
            };
            if stream.compress {
                dict.set("Filter", Object::name("FlateDecode"));
                dict.set("Length1", stream.data.len() as i64);
            }
            dict.set("Length", body.len() as i64);
            write_dict(w, &dict).context("Failed to write stream dictionary")?;
            w.write_all(b"\nstream\n")
                .context("Failed to write stream")?;
            w.write_all(&body).context("Failed to write stream")?;
            w.write_all(b"\nendstream").context("Failed to write stream")?;
        }
    }

    w.write_all(b"\nendobj\n\n").context("Failed to write object")?;
    Ok(())
}

/// Writes a complete PDF file from the given catalog and info dictionary.
pub fn write_file<W: Write>(output: W, root: &ObjRef, info: &ObjRef) -> Result<(), Error> {
    let mut w = CountingWriter::new(io::BufWriter::new(output));

    // phase A: hand out ids
    let mut next_id = 0;
    let mut objects = Vec::new();
    assign_ids(root, &mut next_id, &mut objects)?;
    assign_ids(info, &mut next_id, &mut objects)?;

    // phase B: header, objects, xref, trailer
    w.write_all(b"%PDF-1.7\n%\xf0\xf1\xf2\xf3\n\n")
        .context("Failed to write header")?;

    for object in &objects {
        write_indirect(&mut w, object)?;
    }

    let xref_position = w.position();
    let count = objects.len() + 1;
    write!(w, "xref\n0 {}\n", count).context("Failed to write xref")?;
    write!(w, "{:010} {:05} f\r\n", 0, 65535).context("Failed to write xref")?;
    for object in &objects {
        write!(w, "{:010} {:05} n\r\n", object.0.offset.get(), 0)
            .context("Failed to write xref")?;
    }

    let mut trailer = Dict::new();
    trailer.set("Size", count as i64);
    trailer.set("Info", info.reference());
    trailer.set("Root", root.reference());

    w.write_all(b"trailer\n").context("Failed to write trailer")?;
    write_dict(&mut w, &trailer).context("Failed to write trailer")?;
    write!(w, "\nstartxref\n{}\n%%EOF\n", xref_position).context("Failed to write trailer")?;
    w.flush().context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::object::StreamData;

    fn serialize(object: &Object) -> String {
        let mut buf = Vec::new();
        write_object(&mut buf, object).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn primitive_syntax() {
        assert_eq!(serialize(&Object::Null), "null");
        assert_eq!(serialize(&Object::Boolean(true)), "true");
        assert_eq!(serialize(&Object::Integer(-42)), "-42");
        assert_eq!(serialize(&Object::Real(1.5)), "1.5");
        assert_eq!(serialize(&Object::Real(595.276)), "595.276");
        assert_eq!(serialize(&Object::Real(2.0)), "2");
        assert_eq!(serialize(&Object::string("ab(c)")), "(ab\\(c\\))");
        assert_eq!(serialize(&Object::name("Type")), "/Type");
        assert_eq!(
            serialize(&Object::Array(vec![
                Object::Integer(0),
                Object::Integer(1)
            ])),
            "[0 1]"
        );
    }

    #[test]
    fn names_are_escaped() {
        assert_eq!(serialize(&Object::name("A B")), "/A#20B");
    }

    #[test]
    fn file_structure_and_xref_offsets() {
        let mut catalog = Dict::new();
        catalog.set("Type", Object::name("Catalog"));
        let root = ObjRef::dict(catalog);
        let info = ObjRef::dict(Dict::new());

        let mut buf = Vec::new();
        write_file(&mut buf, &root, &info).unwrap();
        let text = String::from_utf8_lossy(&buf).into_owned();

        assert!(text.starts_with("%PDF-1.7\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("1 0 obj"));
        assert!(text.contains("trailer"));

        // the xref entry of every object points at its definition
        let xref_start = text.find("xref\n").unwrap();
        let entries: Vec<&str> = text[xref_start..]
            .lines()
            .filter(|line| line.ends_with(" n\r"))
            .collect();
        assert_eq!(entries.len(), 2);
        for (index, entry) in entries.iter().enumerate() {
            let offset: usize = entry.split(' ').next().unwrap().parse().unwrap();
            let expected = format!("{} 0 obj", index + 1);
            assert_eq!(&text[offset..offset + expected.len()], expected);
        }

        // startxref points at the xref table
        let startxref: usize = text
            .lines()
            .skip_while(|line| *line != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(&text[startxref..startxref + 4], "xref");
    }

    #[test]
    fn writing_is_deterministic() {
        let build = || {
            let mut pages = Dict::new();
            pages.set("Type", Object::name("Pages"));
            pages.set("Count", 0i64);
            let pages = ObjRef::dict(pages);
            let mut catalog = Dict::new();
            catalog.set("Type", Object::name("Catalog"));
            catalog.set("Pages", pages.reference());
            let root = ObjRef::dict(catalog);
            let info = ObjRef::dict(Dict::new());
            let mut buf = Vec::new();
            write_file(&mut buf, &root, &info).unwrap();
            buf
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn streams_are_deflated() {
        let stream = ObjRef::stream(StreamData {
            dict: Dict::new(),
            data: b"BT ET ".iter().cycle().take(600).cloned().collect(),
            compress: true,
        });
        let mut catalog = Dict::new();
        catalog.set("Contents", stream.reference());
        let root = ObjRef::dict(catalog);
        let info = ObjRef::dict(Dict::new());

        let mut buf = Vec::new();
        write_file(&mut buf, &root, &info).unwrap();
        let text = String::from_utf8_lossy(&buf).into_owned();
        assert!(text.contains("/Filter /FlateDecode"));
        assert!(text.contains("/Length1 600"));
        // 600 bytes of repetition compress well
        assert!(buf.len() < 800);
    }

    #[test]
    fn shared_objects_are_written_once() {
        let shared = ObjRef::object(Object::Integer(1));
        let mut catalog = Dict::new();
        catalog.set("A", shared.reference());
        catalog.set("B", shared.reference());
        let root = ObjRef::dict(catalog);
        let info = ObjRef::dict(Dict::new());

        // the shared object is assigned a single id and written once
        let mut buf = Vec::new();
        write_file(&mut buf, &root, &info).unwrap();
        let text = String::from_utf8_lossy(&buf).into_owned();
        assert_eq!(text.matches("2 0 obj").count(), 1);
    }
}
