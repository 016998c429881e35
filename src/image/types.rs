//! Core types for image generation and editing.

use crate::error::{Result, StudioError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Largest batch a single generation request may ask for.
pub const MAX_IMAGES: u8 = 4;

/// Image formats accepted as attachments and returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Maps a MIME type back to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// The fixed set of aspect ratios offered for text-to-image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 widescreen.
    #[serde(rename = "16:9")]
    Widescreen,
    /// 9:16 portrait.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 landscape.
    #[serde(rename = "4:3")]
    Landscape,
    /// 3:4 vertical.
    #[serde(rename = "3:4")]
    Vertical,
}

impl AspectRatio {
    /// Every ratio, in the order they are offered to the user.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Widescreen,
        Self::Portrait,
        Self::Landscape,
        Self::Vertical,
    ];

    /// Returns the aspect ratio as sent on the wire (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Widescreen => "16:9",
            Self::Portrait => "9:16",
            Self::Landscape => "4:3",
            Self::Vertical => "3:4",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Square => "Square",
            Self::Widescreen => "Widescreen",
            Self::Portrait => "Portrait",
            Self::Landscape => "Landscape",
            Self::Vertical => "Vertical",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s || r.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                StudioError::InvalidRequest(format!(
                    "unknown aspect ratio '{s}'. Valid values: 1:1, 16:9, 9:16, 4:3, 3:4"
                ))
            })
    }
}

/// Parameters for text-to-image generation. Ignored when editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    number_of_images: u8,
    aspect_ratio: AspectRatio,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            number_of_images: 1,
            aspect_ratio: AspectRatio::default(),
        }
    }
}

impl GenerationConfig {
    /// Creates a config, rejecting counts outside `1..=4`.
    pub fn new(number_of_images: u8, aspect_ratio: AspectRatio) -> Result<Self> {
        Self::check_count(number_of_images)?;
        Ok(Self {
            number_of_images,
            aspect_ratio,
        })
    }

    fn check_count(number_of_images: u8) -> Result<()> {
        if !(1..=MAX_IMAGES).contains(&number_of_images) {
            return Err(StudioError::InvalidRequest(format!(
                "number of images must be between 1 and {MAX_IMAGES}, got {number_of_images}"
            )));
        }
        Ok(())
    }

    /// Replaces the aspect ratio, keeping the count.
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Number of images to request.
    pub fn number_of_images(&self) -> u8 {
        self.number_of_images
    }

    /// Aspect ratio to request.
    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }
}

/// A base64-encoded image handed to the edit pathway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    /// Base64 payload without any `data:` prefix.
    pub data: String,
    /// MIME type of the encoded image.
    pub mime_type: String,
}

impl ImageData {
    /// Encodes raw bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Reads and encodes an image file, sniffing its MIME type.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let format = sniff_format(&bytes, path)?;
        Ok(Self::from_bytes(&bytes, format.mime_type()))
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Resolves an image format from content, falling back to the file extension.
pub(crate) fn sniff_format(bytes: &[u8], path: &Path) -> Result<ImageFormat> {
    ImageFormat::from_magic_bytes(bytes)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
        })
        .ok_or_else(|| {
            StudioError::InvalidRequest(format!(
                "{} is not a PNG, JPG, or WEBP image",
                path.display()
            ))
        })
}

/// A generated image, held as a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use = "generated image should be saved or displayed"]
pub struct GeneratedImage(String);

impl GeneratedImage {
    /// Builds the data URL from a MIME type and base64 payload.
    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    /// Wraps an existing data URL after checking its shape.
    pub fn from_data_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        split_data_url(&url)?;
        Ok(Self(url))
    }

    /// The full data URL.
    pub fn url(&self) -> &str {
        &self.0
    }

    /// MIME type encoded in the URL.
    pub fn mime_type(&self) -> &str {
        split_data_url(&self.0).map(|(mime, _)| mime).unwrap_or("")
    }

    /// Base64 payload encoded in the URL.
    pub fn base64_payload(&self) -> &str {
        split_data_url(&self.0)
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }

    /// File extension to use when downloading.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(self.mime_type())
            .map(|f| f.extension())
            .unwrap_or("jpeg")
    }

    /// Decodes the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64_payload())
            .map_err(|e| StudioError::Decode(e.to_string()))
    }

    /// Decodes and writes the image to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }
}

impl std::fmt::Display for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn split_data_url(url: &str) -> Result<(&str, &str)> {
    url.strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| StudioError::Decode("not a base64 data URL".into()))
}
