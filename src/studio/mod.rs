//! The studio: form, result state and gallery wired to an image service.
//!
//! ```no_run
//! use genstudio::studio::Studio;
//! use genstudio::GeminiService;
//!
//! # async fn run() -> genstudio::Result<()> {
//! let mut studio = Studio::new(GeminiService::builder().build()?);
//! studio.form_mut().set_prompt("A lighthouse at dusk, oil painting");
//! studio.form_mut().set_number_of_images(2)?;
//! studio.submit().await;
//! println!("{}", studio.gallery());
//! # Ok(())
//! # }
//! ```

mod command;
mod form;
mod gallery;
mod state;

pub use command::{Command, HELP};
pub use form::{Attachment, PromptForm, Submission};
pub use gallery::{download_all, download_file_name, GalleryView};
pub use state::StudioState;

use crate::error::{Result, StudioError};
use crate::image::{GeneratedImage, ImageService};
use futures::future::try_join_all;

/// User-facing wrapping for a failed text-to-image call.
pub fn generation_failure_message(err: &StudioError) -> String {
    format!("Failed to generate images. Please check your prompt and API key. Details: {err}")
}

/// User-facing wrapping for a failed edit call.
pub fn edit_failure_message(err: &StudioError) -> String {
    format!("Failed to edit image. Please check your prompt and API key. Details: {err}")
}

/// Root of the studio: owns the form, the last result and the service.
pub struct Studio<S> {
    service: S,
    form: PromptForm,
    state: StudioState,
}

impl<S: ImageService> Studio<S> {
    /// Creates a studio with an empty form around `service`.
    pub fn new(service: S) -> Self {
        Self {
            service,
            form: PromptForm::new(),
            state: StudioState::default(),
        }
    }

    /// The image service used for submits.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Current form contents.
    pub fn form(&self) -> &PromptForm {
        &self.form
    }

    /// Mutable access to the form for editing between submits.
    pub fn form_mut(&mut self) -> &mut PromptForm {
        &mut self.form
    }

    /// Result state of the last submit.
    pub fn state(&self) -> &StudioState {
        &self.state
    }

    /// What the gallery shows right now.
    pub fn gallery(&self) -> GalleryView<'_> {
        GalleryView::from_state(&self.state)
    }

    /// Starts a submit: snapshots the form and enters the loading state.
    ///
    /// Returns `None` without touching state when the prompt is blank or a
    /// submit is already in flight. Finish with [`Studio::complete`].
    pub fn begin(&mut self) -> Option<Submission> {
        if !self.form.can_submit(self.state.loading) {
            return None;
        }
        let submission = self.form.submission()?;
        self.state.begin();
        Some(submission)
    }

    /// Performs the service calls for a begun submit and records the outcome.
    pub async fn complete(&mut self, submission: &Submission) {
        match run_submission(&self.service, submission).await {
            Ok(images) => self.state.finish_ok(images),
            Err(message) => self.state.finish_err(message),
        }
    }

    /// [`Studio::begin`] followed by [`Studio::complete`]. Returns `false`
    /// when nothing was submitted.
    pub async fn submit(&mut self) -> bool {
        let Some(submission) = self.begin() else {
            return false;
        };
        self.complete(&submission).await;
        true
    }
}

/// Performs the service calls for a submission.
///
/// With attachments, every image is edited concurrently and any failure fails
/// the whole batch; results are flattened in attachment order. Without
/// attachments a single generation call is made. Errors come back as the
/// user-facing message.
pub async fn run_submission<S: ImageService + ?Sized>(
    service: &S,
    submission: &Submission,
) -> std::result::Result<Vec<GeneratedImage>, String> {
    if submission.is_edit() {
        let edits = submission.attachments.iter().map(|attachment| async move {
            let image = attachment.to_image_data();
            service
                .edit_image(&submission.prompt, &image)
                .await
                .map_err(|e| {
                    tracing::error!(attachment = attachment.name(), "error editing image: {e}");
                    edit_failure_message(&e)
                })
        });
        let results = try_join_all(edits).await?;
        Ok(results.into_iter().flatten().collect())
    } else {
        service
            .generate_images(&submission.prompt, &submission.config)
            .await
            .map_err(|e| {
                tracing::error!("error generating images: {e}");
                generation_failure_message(&e)
            })
    }
}

/// Applies a parsed command to the form. Commands that need the service
/// (`Submit`) or the terminal (`Save`, `Status`, `Help`, `Quit`) are left to
/// the caller and return `Ok(false)`.
pub fn apply_to_form(form: &mut PromptForm, command: &Command) -> Result<bool> {
    match command {
        Command::Prompt(text) => form.set_prompt(text.clone()),
        Command::Attach(paths) => form.attach_paths(paths.as_slice())?,
        Command::Remove(position) => {
            form.remove_attachment(position.saturating_sub(1))?;
        }
        Command::ClearAttachments => form.clear_attachments(),
        Command::Count(n) => form.set_number_of_images(*n)?,
        Command::Ratio(ratio) => form.set_aspect_ratio(*ratio),
        _ => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::image::{GenerationConfig, ImageData};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted service that records every call.
    #[derive(Default)]
    pub struct FakeService {
        pub fail_generate: bool,
        /// Edits whose prompt-side image payload matches fail.
        pub fail_edit_payload: Option<String>,
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageService for FakeService {
        async fn generate_images(
            &self,
            prompt: &str,
            config: &GenerationConfig,
        ) -> Result<Vec<GeneratedImage>> {
            self.calls.lock().unwrap().push(format!(
                "generate:{prompt}:{}:{}",
                config.number_of_images(),
                config.aspect_ratio()
            ));
            if self.fail_generate {
                return Err(StudioError::NoImages("nothing came back".into()));
            }
            Ok((0..config.number_of_images())
                .map(|i| GeneratedImage::from_base64("image/jpeg", &format!("GEN{i}")))
                .collect())
        }

        async fn edit_image(
            &self,
            prompt: &str,
            image: &ImageData,
        ) -> Result<Vec<GeneratedImage>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("edit:{prompt}:{}", image.mime_type));
            if self.fail_edit_payload.as_deref() == Some(image.data.as_str()) {
                return Err(StudioError::ContentBlocked("nope".into()));
            }
            // Echo the input back twice so flattening is observable
            Ok(vec![
                GeneratedImage::from_base64(&image.mime_type, &image.data),
                GeneratedImage::from_base64("image/png", "EXTRA"),
            ])
        }

        fn name(&self) -> &str {
            "fake"
        }
    }
}
