//! Image generation and editing.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageService;
pub use types::{AspectRatio, GeneratedImage, GenerationConfig, ImageData, ImageFormat, MAX_IMAGES};

pub(crate) use types::sniff_format;
