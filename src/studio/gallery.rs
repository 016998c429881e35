//! Gallery view over the studio state, plus downloads.

use crate::error::Result;
use crate::image::GeneratedImage;
use crate::studio::state::StudioState;
use std::fmt;
use std::path::{Path, PathBuf};

/// Shown while a submit is in flight.
pub const LOADING_MESSAGE: &str = "Generating your masterpiece, please wait...";
/// Heading above a failure message.
pub const ERROR_TITLE: &str = "An Error Occurred";
/// Heading shown before anything has been generated.
pub const EMPTY_TITLE: &str = "Your Generated Images Will Appear Here";
/// Hint under [`EMPTY_TITLE`].
pub const EMPTY_HINT: &str = "Fill out the form above to start creating.";

/// What the gallery shows. Loading wins over error, error over results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryView<'a> {
    /// A submit is in flight.
    Loading,
    /// The last submit failed with this message.
    Error(&'a str),
    /// Nothing generated yet.
    Empty,
    /// Results of the last submit.
    Images(&'a [GeneratedImage]),
}

impl<'a> GalleryView<'a> {
    /// Picks the view for `state`.
    pub fn from_state(state: &'a StudioState) -> Self {
        if state.loading {
            Self::Loading
        } else if let Some(error) = state.error.as_deref() {
            Self::Error(error)
        } else if state.images.is_empty() {
            Self::Empty
        } else {
            Self::Images(&state.images)
        }
    }

    /// Images on display; empty for every other view.
    pub fn images(&self) -> &'a [GeneratedImage] {
        match self {
            Self::Images(images) => images,
            _ => &[],
        }
    }
}

impl fmt::Display for GalleryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => writeln!(f, "{LOADING_MESSAGE}"),
            Self::Error(message) => {
                writeln!(f, "{ERROR_TITLE}")?;
                writeln!(f, "{message}")
            }
            Self::Empty => {
                writeln!(f, "{EMPTY_TITLE}")?;
                writeln!(f, "{EMPTY_HINT}")
            }
            Self::Images(images) => {
                for (i, image) in images.iter().enumerate() {
                    let size = image.base64_payload().len() / 4 * 3;
                    writeln!(
                        f,
                        "[{}] {} (~{} KB)",
                        i + 1,
                        image.mime_type(),
                        size.div_ceil(1024)
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Download name for a single image.
pub fn download_file_name(image: &GeneratedImage, timestamp_ms: i64) -> String {
    format!("ai-generated-image-{timestamp_ms}.{}", image.extension())
}

/// Saves every image into `dir`, returning the written paths in order.
///
/// Names share one timestamp; batches get a 1-based suffix so they don't collide.
pub fn download_all(images: &[GeneratedImage], dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let timestamp = chrono::Utc::now().timestamp_millis();

    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let name = if images.len() == 1 {
                download_file_name(image, timestamp)
            } else {
                format!(
                    "ai-generated-image-{timestamp}-{}.{}",
                    i + 1,
                    image.extension()
                )
            };
            let path = dir.join(name);
            image.save(&path)?;
            tracing::debug!(path = %path.display(), "saved image");
            Ok(path)
        })
        .collect()
}
