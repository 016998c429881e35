//! Transient result state shown by the gallery.

use crate::image::GeneratedImage;

/// Outcome of the most recent submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudioState {
    /// A submit is in flight.
    pub loading: bool,
    /// Images from the last successful submit.
    pub images: Vec<GeneratedImage>,
    /// User-facing message from the last failed submit.
    pub error: Option<String>,
}

impl StudioState {
    /// Resets for a new submit: loading, no error, no results.
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.images.clear();
    }

    /// Stores results and stops loading.
    pub fn finish_ok(&mut self, images: Vec<GeneratedImage>) {
        self.images = images;
        self.loading = false;
    }

    /// Stores the failure message and stops loading.
    pub fn finish_err(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.loading = false;
    }
}
