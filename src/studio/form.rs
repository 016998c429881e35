//! Prompt form: prompt text, attachments and generation parameters.

use crate::error::{Result, StudioError};
use crate::image::{sniff_format, AspectRatio, GenerationConfig, ImageData, ImageFormat};
use base64::Engine;
use std::path::Path;

/// A user-picked image waiting to be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    format: ImageFormat,
    bytes: Vec<u8>,
    preview: String,
}

impl Attachment {
    /// Wraps raw bytes, rejecting anything that is not PNG, JPEG or WEBP.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let format = sniff_format(&bytes, Path::new(&name))?;
        let preview = format!(
            "data:{};base64,{}",
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        Ok(Self {
            name,
            format,
            bytes,
            preview,
        })
    }

    /// Reads an attachment from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(name, bytes)
    }

    /// File name shown to the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type detected from the file contents.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Data URL shown as the thumbnail.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Encodes the file for the edit call.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::from_bytes(&self.bytes, self.mime_type())
    }
}

/// What a valid form hands to the studio on submit.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Prompt exactly as entered.
    pub prompt: String,
    /// Count and aspect ratio; unused when editing.
    pub config: GenerationConfig,
    /// Images to edit, in the order they were attached.
    pub attachments: Vec<Attachment>,
}

impl Submission {
    /// True when this submit edits images rather than generating new ones.
    pub fn is_edit(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Form state. Each attachment owns its preview, so files and previews
/// can never drift apart.
#[derive(Debug, Clone, Default)]
pub struct PromptForm {
    prompt: String,
    config: GenerationConfig,
    attachments: Vec<Attachment>,
}

impl PromptForm {
    /// Empty form: no prompt, one square image, nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt as typed.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Replaces the prompt.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Generation parameters.
    pub fn config(&self) -> GenerationConfig {
        self.config
    }

    /// Sets how many images to generate, rejecting counts outside 1..=4.
    pub fn set_number_of_images(&mut self, count: u8) -> Result<()> {
        self.config = GenerationConfig::new(count, self.config.aspect_ratio())?;
        Ok(())
    }

    /// Sets the aspect ratio for generated images.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.config = self.config.with_aspect_ratio(ratio);
    }

    /// Appends an attachment after any existing ones.
    pub fn attach(&mut self, attachment: Attachment) {
        tracing::debug!(
            name = attachment.name(),
            mime_type = attachment.mime_type(),
            "attached image"
        );
        self.attachments.push(attachment);
    }

    /// Reads and appends every path, stopping at the first unreadable one.
    pub fn attach_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let loaded = paths
            .iter()
            .map(Attachment::from_path)
            .collect::<Result<Vec<_>>>()?;
        for attachment in loaded {
            self.attach(attachment);
        }
        Ok(())
    }

    /// Removes the attachment (and its preview) at `index`.
    pub fn remove_attachment(&mut self, index: usize) -> Result<Attachment> {
        if index >= self.attachments.len() {
            return Err(StudioError::InvalidRequest(format!(
                "no attachment at position {} ({} attached)",
                index + 1,
                self.attachments.len()
            )));
        }
        Ok(self.attachments.remove(index))
    }

    /// Attached images in order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Preview data URLs, one per attachment and in the same order.
    pub fn previews(&self) -> impl Iterator<Item = &str> {
        self.attachments.iter().map(Attachment::preview)
    }

    /// Removes every attachment.
    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// With images attached the form edits; otherwise it generates.
    pub fn is_edit_mode(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Aspect ratio and count only apply when generating.
    pub fn generation_controls_enabled(&self) -> bool {
        !self.is_edit_mode()
    }

    /// True when the prompt has non-whitespace text.
    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    /// Whether the submit button is enabled.
    pub fn can_submit(&self, loading: bool) -> bool {
        !loading && self.has_prompt()
    }

    /// Text on the submit button.
    pub fn submit_label(&self, loading: bool) -> &'static str {
        match (loading, self.is_edit_mode()) {
            (true, true) => "Editing...",
            (true, false) => "Generating...",
            (false, true) => "Edit Image(s)",
            (false, false) => "Generate Images",
        }
    }

    /// Snapshot of the form, or `None` when the prompt is blank.
    pub fn submission(&self) -> Option<Submission> {
        if !self.has_prompt() {
            return None;
        }
        Some(Submission {
            prompt: self.prompt.clone(),
            config: self.config,
            attachments: self.attachments.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
    const JPEG: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 5, 6, 7, 8, 0, 0, 0, 0];

    fn png(name: &str) -> Attachment {
        Attachment::new(name, PNG.to_vec()).unwrap()
    }

    #[test]
    fn test_attachment_preview_is_data_url() {
        let a = png("cat.png");
        assert_eq!(a.mime_type(), "image/png");
        assert!(a.preview().starts_with("data:image/png;base64,"));
        assert_eq!(a.to_image_data().to_data_url(), a.preview());
    }

    #[test]
    fn test_attachment_rejects_unsupported_type() {
        let err = Attachment::new("anim.gif", b"GIF89a-------".to_vec()).unwrap_err();
        assert!(matches!(err, StudioError::InvalidRequest(_)));
    }

    #[test]
    fn test_blank_prompt_cannot_submit() {
        let mut form = PromptForm::new();
        assert!(form.submission().is_none());
        form.set_prompt("   \n\t");
        assert!(!form.can_submit(false));
        assert!(form.submission().is_none());

        form.set_prompt("  a red fox ");
        assert!(form.can_submit(false));
        assert!(!form.can_submit(true));
        // Untrimmed text is what gets sent
        assert_eq!(form.submission().unwrap().prompt, "  a red fox ");
    }

    #[test]
    fn test_count_bounds() {
        let mut form = PromptForm::new();
        assert!(form.set_number_of_images(0).is_err());
        assert!(form.set_number_of_images(5).is_err());
        assert_eq!(form.config().number_of_images(), 1);

        form.set_number_of_images(3).unwrap();
        form.set_aspect_ratio(AspectRatio::Vertical);
        assert_eq!(form.config().number_of_images(), 3);
        assert_eq!(form.config().aspect_ratio(), AspectRatio::Vertical);
    }

    #[test]
    fn test_attachments_and_previews_stay_in_lockstep() {
        let mut form = PromptForm::new();
        form.attach(png("a.png"));
        form.attach(Attachment::new("b.jpg", JPEG.to_vec()).unwrap());
        form.attach(png("c.png"));

        let removed = form.remove_attachment(1).unwrap();
        assert_eq!(removed.name(), "b.jpg");

        let names: Vec<_> = form.attachments().iter().map(Attachment::name).collect();
        assert_eq!(names, ["a.png", "c.png"]);
        let previews: Vec<_> = form.previews().collect();
        assert_eq!(previews.len(), 2);
        assert!(previews.iter().all(|p| p.starts_with("data:image/png")));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut form = PromptForm::new();
        form.attach(png("a.png"));
        assert!(form.remove_attachment(1).is_err());
        assert_eq!(form.attachments().len(), 1);
    }

    #[test]
    fn test_mode_and_labels() {
        let mut form = PromptForm::new();
        form.set_prompt("sunset");
        assert!(form.generation_controls_enabled());
        assert_eq!(form.submit_label(false), "Generate Images");
        assert_eq!(form.submit_label(true), "Generating...");

        form.attach(png("a.png"));
        assert!(form.is_edit_mode());
        assert!(!form.generation_controls_enabled());
        assert_eq!(form.submit_label(false), "Edit Image(s)");
        assert_eq!(form.submit_label(true), "Editing...");
        assert!(form.submission().unwrap().is_edit());

        form.clear_attachments();
        assert!(!form.is_edit_mode());
    }

    #[test]
    fn test_attach_paths_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.jpg");
        std::fs::write(&first, PNG).unwrap();
        std::fs::write(&second, JPEG).unwrap();

        let mut form = PromptForm::new();
        form.attach_paths(&[&first, &second]).unwrap();
        let names: Vec<_> = form.attachments().iter().map(Attachment::name).collect();
        assert_eq!(names, ["first.png", "second.jpg"]);
    }

    #[test]
    fn test_attach_paths_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        std::fs::write(&good, PNG).unwrap();
        let missing = dir.path().join("missing.png");

        let mut form = PromptForm::new();
        assert!(form.attach_paths(&[&good, &missing]).is_err());
        assert!(form.attachments().is_empty());
    }
}
