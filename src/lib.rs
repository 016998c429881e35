#![warn(missing_docs)]
//! genstudio - prompt-driven image studio.
//!
//! Generate images from a text prompt with Imagen, or edit uploaded images with
//! Gemini. Results come back as `data:` URLs ready to display or download.
//!
//! # Quick Start
//!
//! ```no_run
//! use genstudio::{AspectRatio, GeminiService, GenerationConfig, ImageService};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let service = GeminiService::builder().build()?;
//!     let config = GenerationConfig::new(2, AspectRatio::Widescreen)?;
//!     let images = service
//!         .generate_images("A golden retriever puppy", &config)
//!         .await?;
//!     for (i, image) in images.iter().enumerate() {
//!         image.save(format!("puppy-{i}.jpeg"))?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Google Imagen / Gemini service
//! - `cli`: Command-line interface, interactive studio and MCP server

pub mod config;
mod error;
pub mod image;
#[doc(hidden)]
pub mod mcp;
pub mod studio;

pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use image::{
    AspectRatio, GeneratedImage, GenerationConfig, ImageData, ImageFormat, ImageService, MAX_IMAGES,
};

#[cfg(feature = "gemini")]
pub use image::providers::{GeminiService, GeminiServiceBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StudioError};
    pub use crate::image::{GeneratedImage, GenerationConfig, ImageData, ImageService};
    pub use crate::studio::{PromptForm, Studio};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiService;
}
