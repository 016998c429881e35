//! Image service trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationConfig, ImageData};
use async_trait::async_trait;

/// The two calls the studio makes against a generative image backend.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Generates `config.number_of_images()` images from a text prompt.
    async fn generate_images(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<GeneratedImage>>;

    /// Edits a single image according to a text prompt.
    ///
    /// May return more than one image if the model produces several.
    async fn edit_image(&self, prompt: &str, image: &ImageData) -> Result<Vec<GeneratedImage>>;

    /// Returns the name of this service for display.
    fn name(&self) -> &str;
}
