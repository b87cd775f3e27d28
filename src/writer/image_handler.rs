//! Image XObjects for stamped elements.
//!
//! Images are embedded as image XObjects (ISO 32000-1 Section 8.9).
//!
//! # Supported Formats
//!
//! - **JPEG**: Pass-through embedding using DCTDecode filter
//! - **PNG**: Decoded, split into color and alpha, Flate compressed. The
//!   alpha channel becomes a DeviceGray soft mask.

use std::io::Write;

use lopdf::{dictionary, Object, Stream};

use crate::geometry::Rect;
use crate::rendering::{RasterFormat, RasterImage};

/// Compression applied to image samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// Zlib-compressed raw samples (FlateDecode filter)
    Flate,
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the number of color components.
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }

    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image samples prepared for embedding.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bits per component (usually 8)
    pub bits_per_component: u8,
    /// Color space
    pub color_space: ColorSpace,
    /// Encoding of `data`
    pub encoding: ImageEncoding,
    /// Encoded image data
    pub data: Vec<u8>,
    /// Flate-compressed alpha channel, if the image has one
    pub soft_mask: Option<Vec<u8>>,
}

impl ImageData {
    /// Prepare a rasterized element for embedding.
    pub fn from_raster(raster: &RasterImage) -> Result<Self, ImageError> {
        match raster.format {
            RasterFormat::Jpeg => Self::from_jpeg(raster.data.clone()),
            RasterFormat::Png => Self::from_png(&raster.data),
        }
    }

    /// Load a JPEG image from raw JPEG data.
    ///
    /// JPEG images can be embedded directly without transcoding.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self, ImageError> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;

        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            encoding: ImageEncoding::Jpeg,
            data,
            soft_mask: None,
        })
    }

    /// Load a PNG image, splitting off the alpha channel.
    pub fn from_png(data: &[u8]) -> Result<Self, ImageError> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| ImageError::DecodeError(e.to_string()))?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidData("empty image".to_string()));
        }

        let (color_space, pixels, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity((width * height) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha_channel.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha_channel))
            },
            image::ColorType::Rgb8 | image::ColorType::Rgb16 => {
                (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None)
            },
            _ => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha_channel.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha_channel))
            },
        };

        // Fully opaque alpha adds nothing.
        let alpha = alpha.filter(|a| a.iter().any(|&v| v != u8::MAX));

        Ok(Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            encoding: ImageEncoding::Flate,
            data: compress_image_data(&pixels)?,
            soft_mask: alpha.map(|a| compress_image_data(&a)).transpose()?,
        })
    }

    /// Build the Image XObject stream.
    ///
    /// `soft_mask` is the object reference of the stream returned by
    /// [`ImageData::build_soft_mask`], once that has been added to the document.
    pub fn build_xobject(&self, soft_mask: Option<lopdf::ObjectId>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space.pdf_name(),
            "BitsPerComponent" => self.bits_per_component as i64,
        };
        match self.encoding {
            ImageEncoding::Jpeg => dict.set("Filter", "DCTDecode"),
            ImageEncoding::Flate => dict.set("Filter", "FlateDecode"),
        }
        if self.color_space == ColorSpace::DeviceCMYK && self.encoding == ImageEncoding::Jpeg {
            // Adobe writes CMYK JPEGs inverted.
            dict.set(
                "Decode",
                [1, 0, 1, 0, 1, 0, 1, 0]
                    .iter()
                    .map(|v| Object::Integer(*v))
                    .collect::<Vec<_>>(),
            );
        }
        if let Some(id) = soft_mask {
            dict.set("SMask", id);
        }
        Stream::new(dict, self.data.clone())
    }

    /// Build the soft mask (alpha channel) XObject stream.
    pub fn build_soft_mask(&self) -> Option<Stream> {
        self.soft_mask.as_ref().map(|mask_data| {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width as i64,
                "Height" => self.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            Stream::new(dict, mask_data.clone())
        })
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Calculate dimensions to fit within a bounding box while maintaining aspect ratio.
    pub fn fit_to_box(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let aspect = self.aspect_ratio();
        let box_aspect = max_width / max_height;

        if aspect > box_aspect {
            // Image is wider than box, constrain by width
            (max_width, max_width / aspect)
        } else {
            // Image is taller than box, constrain by height
            (max_height * aspect, max_height)
        }
    }
}

/// Image embedding error.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Unsupported image format
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// Failed to decode image
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    /// Failed to compress image data
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// Invalid image data
    #[error("Invalid image data: {0}")]
    InvalidData(String),
}

/// Parse JPEG header to extract dimensions and color space.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace), ImageError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(ImageError::InvalidData("Not a valid JPEG".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        pos += 2;

        // Skip padding
        if marker == 0xFF || marker == 0x00 {
            continue;
        }

        // SOF markers (Start of Frame)
        if matches!(
            marker,
            0xC0 | 0xC1
                | 0xC2
                | 0xC3
                | 0xC5
                | 0xC6
                | 0xC7
                | 0xC9
                | 0xCA
                | 0xCB
                | 0xCD
                | 0xCE
                | 0xCF
        ) {
            if pos + 7 >= data.len() {
                return Err(ImageError::InvalidData("Truncated JPEG header".to_string()));
            }

            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let color_space = match data[pos + 7] {
                1 => ColorSpace::DeviceGray,
                4 => ColorSpace::DeviceCMYK,
                _ => ColorSpace::DeviceRGB,
            };

            return Ok((width, height, color_space));
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }

    Err(ImageError::InvalidData("Could not find JPEG dimensions".to_string()))
}

/// Compress image samples with zlib.
fn compress_image_data(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ImageError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ImageError::CompressionError(e.to_string()))
}

/// Image placement in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// X position (left edge)
    pub x: f32,
    /// Y position (bottom edge)
    pub y: f32,
    /// Display width
    pub width: f32,
    /// Display height
    pub height: f32,
}

impl ImagePlacement {
    /// Create a new image placement.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale `image` uniformly to fit `target`, centered horizontally and
    /// resting on the bottom edge.
    pub fn bottom_centered(image: &ImageData, target: &Rect) -> Self {
        let (width, height) = image.fit_to_box(target.width, target.height);
        Self::new(target.x + (target.width - width) / 2.0, target.y, width, height)
    }

    /// Scale `image` uniformly to fit `target`, centered both ways.
    pub fn centered(image: &ImageData, target: &Rect) -> Self {
        let (width, height) = image.fit_to_box(target.width, target.height);
        Self::new(
            target.x + (target.width - width) / 2.0,
            target.y + (target.height - height) / 2.0,
            width,
            height,
        )
    }

    /// Generate the transformation matrix for this placement.
    ///
    /// Returns the six values for the `cm` operator: a, b, c, d, e, f
    /// where the matrix is:
    /// ```text
    /// [ a  b  0 ]
    /// [ c  d  0 ]
    /// [ e  f  1 ]
    /// ```
    pub fn transform_matrix(&self) -> (f32, f32, f32, f32, f32, f32) {
        (self.width, 0.0, 0.0, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::tests::red_png;
    use std::io::Cursor;

    fn image(width: u32, height: u32) -> ImageData {
        ImageData {
            width,
            height,
            bits_per_component: 8,
            color_space: ColorSpace::DeviceRGB,
            encoding: ImageEncoding::Flate,
            data: Vec::new(),
            soft_mask: None,
        }
    }

    #[test]
    fn test_color_space_components() {
        assert_eq!(ColorSpace::DeviceGray.components(), 1);
        assert_eq!(ColorSpace::DeviceRGB.components(), 3);
        assert_eq!(ColorSpace::DeviceCMYK.components(), 4);
    }

    #[test]
    fn test_image_fit_to_box() {
        let image = image(200, 100);

        let (w, h) = image.fit_to_box(100.0, 100.0);
        assert!((w - 100.0).abs() < 0.001);
        assert!((h - 50.0).abs() < 0.001);

        let (w, h) = image.fit_to_box(400.0, 100.0);
        assert!((w - 200.0).abs() < 0.001);
        assert!((h - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_bottom_centered_placement() {
        // 1:1 image in a 120x30 box: 30x30, centered horizontally, on the bottom edge.
        let placement = ImagePlacement::bottom_centered(&image(10, 10), &Rect::new(50.0, 722.0, 120.0, 30.0));
        assert_eq!(placement, ImagePlacement::new(95.0, 722.0, 30.0, 30.0));
    }

    #[test]
    fn test_centered_placement() {
        let placement = ImagePlacement::centered(&image(40, 10), &Rect::new(0.0, 0.0, 40.0, 40.0));
        assert_eq!(placement, ImagePlacement::new(0.0, 15.0, 40.0, 10.0));
        let (a, _, _, d, e, f) = placement.transform_matrix();
        assert_eq!((a, d, e, f), (40.0, 10.0, 0.0, 15.0));
    }

    #[test]
    fn test_opaque_png_has_no_soft_mask() {
        let data = ImageData::from_png(&red_png(3, 2)).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.color_space, ColorSpace::DeviceRGB);
        assert!(data.soft_mask.is_none());
        assert!(data.build_soft_mask().is_none());
    }

    #[test]
    fn test_translucent_png_gets_soft_mask() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 128]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let data = ImageData::from_png(&png).unwrap();
        let mask = data.build_soft_mask().expect("soft mask");
        assert_eq!(mask.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");

        let xobject = data.build_xobject(Some((7, 0)));
        assert_eq!(xobject.dict.get(b"SMask").unwrap().as_reference().unwrap(), (7, 0));
        assert_eq!(xobject.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
    }

    #[test]
    fn test_jpeg_header_dimensions() {
        // SOI, SOF0 with 8-bit precision, 16x8, 3 components.
        let jpeg = [
            0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x08, 0x00, 0x10, 0x03, 0x01, 0x22,
            0x00,
        ];
        let data = ImageData::from_jpeg(jpeg.to_vec()).unwrap();
        assert_eq!((data.width, data.height), (16, 8));
        assert_eq!(data.color_space, ColorSpace::DeviceRGB);
        let xobject = data.build_xobject(None);
        assert_eq!(xobject.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
    }

    #[test]
    fn test_invalid_jpeg_header() {
        let result = parse_jpeg_header(&[0x00, 0x00]);
        assert!(matches!(result, Err(ImageError::InvalidData(_))));
    }
}
