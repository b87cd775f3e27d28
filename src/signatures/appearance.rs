//! Visible signature appearance.
//!
//! The normal appearance of a signature widget is a form XObject that draws
//! only the stamped image, scaled to fit and centered in the widget box.

use lopdf::{dictionary, Object, ObjectId, Stream};

use crate::error::Result;
use crate::geometry::Rect;
use crate::writer::{ContentStreamBuilder, ImageData, ImagePlacement};

/// Resource name of the image inside the appearance stream.
const APPEARANCE_IMAGE: &str = "Img";

/// Build the `/AP /N` form XObject for a `width` x `height` widget whose
/// graphic is the embedded `image` at `image_id`.
pub fn graphic_appearance(image: &ImageData, image_id: ObjectId, width: f32, height: f32) -> Result<Stream> {
    let bbox = Rect::new(0.0, 0.0, width, height);
    let placement = ImagePlacement::centered(image, &bbox);

    let mut content = ContentStreamBuilder::new();
    content.draw_image_at(APPEARANCE_IMAGE, &placement);

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => Object::Integer(1),
        "BBox" => pdf_rect(&bbox),
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                APPEARANCE_IMAGE => image_id,
            },
        },
    };
    Ok(Stream::new(dict, content.build()?))
}

/// A rectangle as a PDF array `[llx lly urx ury]`.
pub(crate) fn pdf_rect(rect: &Rect) -> Object {
    Object::Array(rect.to_pdf_array().iter().map(|&v| Object::Real(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::tests::red_png;

    #[test]
    fn test_appearance_draws_image_centered() {
        let image = ImageData::from_png(&red_png(10, 10)).unwrap();
        let stream = graphic_appearance(&image, (12, 0), 100.0, 20.0).unwrap();

        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
        let bbox = stream.dict.get(b"BBox").unwrap().as_array().unwrap();
        assert_eq!(bbox.len(), 4);
        let xobjects = stream
            .dict
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(xobjects.get(b"Img").unwrap(), &Object::Reference((12, 0)));

        let content = String::from_utf8(stream.content.clone()).unwrap();
        // 20 x 20 square centered in a 100 x 20 box
        assert!(content.contains("20 0 0 20 40 0 cm"));
        assert!(content.contains("/Img Do"));
    }
}
