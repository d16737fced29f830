// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decodes raw page uploads and re-encodes them in the
// canonical page format.

use image::{ColorType, DynamicImage, ImageFormat};
use tracing::{debug, instrument};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::types::PageType;

/// A single decoded page image.
///
/// ```ignore
/// let tiff = ImageProcessor::from_page_bytes(&png, PageType::Png)?.to_tiff_bytes()?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw bytes, guessing the format from the content.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| PaperwerkError::Image(format!("failed to decode image: {err}")))?;
        debug!(width = image.width(), height = image.height(), "image decoded");
        Ok(Self { image })
    }

    /// Decode raw bytes uploaded as `page_type`. Unknown types fall back to
    /// content sniffing.
    #[instrument(skip(data), fields(data_len = data.len(), page_type = page_type.as_str()))]
    pub fn from_page_bytes(data: &[u8], page_type: PageType) -> Result<Self> {
        let Some(format) = image_format(page_type) else {
            return Self::from_bytes(data);
        };
        let image = image::load_from_memory_with_format(data, format).map_err(|err| {
            PaperwerkError::Image(format!(
                "failed to decode {} page: {err}",
                page_type.as_str()
            ))
        })?;
        debug!(width = image.width(), height = image.height(), "page decoded");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Encoding -------------------------------------------------------------

    /// Encode as TIFF, the canonical page format.
    ///
    /// Grayscale pages stay 8-bit grayscale; everything else is flattened to
    /// 8-bit RGB. Alpha carries no information on a scanned page.
    pub fn to_tiff_bytes(&self) -> Result<Vec<u8>> {
        let flattened = match self.image.color() {
            ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
                DynamicImage::ImageLuma8(self.image.to_luma8())
            }
            _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
        };
        encode_to_format(&flattened, ImageFormat::Tiff)
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }
}

/// Encode `page_bytes` of type `page_type` to canonical TIFF.
pub fn normalize_page(page_bytes: &[u8], page_type: PageType) -> Result<Vec<u8>> {
    ImageProcessor::from_page_bytes(page_bytes, page_type)
        .and_then(|image| image.to_tiff_bytes())
        .map_err(|err| PaperwerkError::Conversion(err.to_string()))
}

fn image_format(page_type: PageType) -> Option<ImageFormat> {
    match page_type {
        PageType::Tiff => Some(ImageFormat::Tiff),
        PageType::Png => Some(ImageFormat::Png),
        PageType::Jpeg => Some(ImageFormat::Jpeg),
        PageType::Gif => Some(ImageFormat::Gif),
        PageType::Bmp => Some(ImageFormat::Bmp),
        PageType::Webp => Some(ImageFormat::WebP),
        PageType::Unknown => None,
    }
}

fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| PaperwerkError::Image(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}
