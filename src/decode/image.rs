use crate::resource::{ImageResource, DEFAULT_ALT_TEXT};

/// An image part as it sits in the package, before conversion.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddedImage<'a> {
    pub part_name: &'a str,
    pub bytes: &'a [u8],
    /// Whatever type the decoder could determine. May be generic.
    pub content_type: &'a str,
    pub alt_text: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageConversion {
    Resource(ImageResource),
    /// Rendered as a placeholder; the reason becomes a decode warning.
    Failed(String),
}

/// Converts one embedded image into an inline resource.
pub trait ImageHandler: Send + Sync {
    fn convert(&self, image: &EmbeddedImage<'_>) -> ImageConversion;
}

impl<F> ImageHandler for F
where
    F: Fn(&EmbeddedImage<'_>) -> ImageConversion + Send + Sync,
{
    fn convert(&self, image: &EmbeddedImage<'_>) -> ImageConversion {
        self(image)
    }
}

/// Base64-encodes the part bytes under the declared type.
#[derive(Clone, Debug)]
pub struct DataUriImageHandler {
    pub fallback_alt: String,
}

impl Default for DataUriImageHandler {
    fn default() -> Self {
        Self {
            fallback_alt: DEFAULT_ALT_TEXT.to_string(),
        }
    }
}

impl ImageHandler for DataUriImageHandler {
    fn convert(&self, image: &EmbeddedImage<'_>) -> ImageConversion {
        if image.bytes.is_empty() {
            return ImageConversion::Failed(format!("image part {} is empty", image.part_name));
        }
        let alt = image
            .alt_text
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.fallback_alt);
        ImageConversion::Resource(ImageResource::from_bytes(image.content_type, image.bytes, alt))
    }
}
