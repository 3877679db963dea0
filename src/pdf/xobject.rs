// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! Image external objects.

use std::fmt::Write as _;

use crate::tree::ImageData;

use super::object::{Dict, ObjRef, Object, StreamData};
use super::writer::fmt_real;

/// Builds the image XObject stream for the given image data.
///
/// RGB pixel data is deflated; JPEG files pass through with the `DCTDecode` filter.
pub fn image_xobject(image: &ImageData) -> ObjRef {
    let mut dict = Dict::new();
    dict.set("Type", Object::name("XObject"));
    dict.set("Subtype", Object::name("Image"));
    dict.set("ColorSpace", Object::name("DeviceRGB"));
    dict.set("BitsPerComponent", 8i64);

    match image {
        ImageData::Rgb8 {
            width,
            height,
            data,
        } => {
            dict.set("Width", i64::from(*width));
            dict.set("Height", i64::from(*height));
            ObjRef::stream(StreamData {
                dict,
                data: data.clone(),
                compress: true,
            })
        }
        ImageData::Jpeg {
            width,
            height,
            data,
        } => {
            dict.set("Width", i64::from(*width));
            dict.set("Height", i64::from(*height));
            dict.set("Filter", Object::name("DCTDecode"));
            ObjRef::stream(StreamData {
                dict,
                data: data.clone(),
                compress: false,
            })
        }
    }
}

/// Emits the operators that place a registered image XObject.
///
/// The rectangle is in PDF user space with `(x, y)` at its lower-left corner.
pub fn placement_ops(resource_name: &str, x: f64, y: f64, width: f64, height: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ",
        fmt_real(width),
        fmt_real(height),
        fmt_real(x),
        fmt_real(y),
        resource_name
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_images_are_deflated_streams() {
        let image = ImageData::Rgb8 {
            width: 2,
            height: 1,
            data: vec![255, 0, 0, 0, 255, 0],
        };
        let xobject = image_xobject(&image);
        xobject.with_value(|value| match value {
            crate::pdf::object::SlotValue::Stream(stream) => {
                assert!(stream.compress);
                assert_eq!(stream.data.len(), 6);
            }
            _ => panic!("expected a stream"),
        });
    }

    #[test]
    fn placement_scales_the_unit_square() {
        let ops = placement_ops("X1", 10.0, 20.0, 100.0, 50.0);
        assert!(ops.contains("100 0 0 50 10 20 cm"));
        assert!(ops.contains("/X1 Do"));
    }
}
