//! Session state and the generate / edit flows.
//!
//! [`Studio`] is the application state of one session: the three upload
//! lists, the active template, generation settings, the current result and
//! the history. It drives fusion → generation and single-step edits, and
//! turns every failure into a status message so the session stays usable.
//!
//! State sits behind a mutex that is never held across an `.await`. A
//! separate busy flag admits at most one generate or edit at a time; a call
//! made while another is running returns [`Outcome::Busy`] and does nothing.

use crate::config::StudioConfig;
use crate::credentials::CredentialSource;
use crate::error::StudioError;
use crate::fusion::{self, FusionRequest};
use crate::image::{
    AspectRatio, EditRequest, GeneratedImage, GenerationRequest, ImageProvider, ImageProviderExt,
    ReferenceImages, Resolution,
};
use crate::intake::{ImageCategory, ImageId, ImageList, IntakeSource, UploadedImage};
use crate::template::TemplateChoice;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// User-adjustable generation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub resolution: Resolution,
    /// Additional free-text instructions.
    pub instructions: String,
}

/// What the studio is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the user.
    #[default]
    Idle,
    /// Fusing and rendering a new image.
    Generating,
    /// Applying an edit to the current image.
    Editing,
}

/// Result of a generate or edit call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A new image is current and at the front of the history.
    Completed(Arc<GeneratedImage>),
    /// Nothing was produced; the message is also the status message.
    Failed(String),
    /// No credential was available; the selector was opened. Retry afterwards.
    CredentialRequired,
    /// Another generate or edit is in flight; nothing happened.
    Busy,
}

impl Outcome {
    /// Returns the image, if one was produced.
    pub fn image(&self) -> Option<&Arc<GeneratedImage>> {
        match self {
            Self::Completed(image) => Some(image),
            _ => None,
        }
    }
}

/// A snapshot of the session state.
#[derive(Debug, Clone)]
pub struct StudioState {
    /// Subject uploads.
    pub subjects: ImageList,
    /// Scene uploads.
    pub scenes: ImageList,
    /// Style reference uploads.
    pub styles: ImageList,
    /// Active template.
    pub template: TemplateChoice,
    /// Text of the custom template.
    pub custom_template: String,
    /// Generation settings.
    pub settings: GenerationSettings,
    /// Current activity.
    pub phase: Phase,
    /// Message shown to the user, if any.
    pub status: Option<String>,
    /// The image on display.
    pub current: Option<Arc<GeneratedImage>>,
    /// Every image produced this session, most recent first.
    pub history: Vec<Arc<GeneratedImage>>,
    /// Whether a usable credential is believed to be configured.
    pub has_credential: bool,
}

impl StudioState {
    fn new(config: &StudioConfig) -> Self {
        let max = config.max_images_per_category;
        Self {
            subjects: ImageList::new(ImageCategory::Subject, max),
            scenes: ImageList::new(ImageCategory::Scene, max),
            styles: ImageList::new(ImageCategory::Style, max),
            template: TemplateChoice::default(),
            custom_template: String::new(),
            settings: GenerationSettings::default(),
            phase: Phase::Idle,
            status: None,
            current: None,
            history: Vec::new(),
            has_credential: false,
        }
    }

    /// The upload list for a category.
    pub fn list(&self, category: ImageCategory) -> &ImageList {
        match category {
            ImageCategory::Subject => &self.subjects,
            ImageCategory::Scene => &self.scenes,
            ImageCategory::Style => &self.styles,
        }
    }

    fn list_mut(&mut self, category: ImageCategory) -> &mut ImageList {
        match category {
            ImageCategory::Subject => &mut self.subjects,
            ImageCategory::Scene => &mut self.scenes,
            ImageCategory::Style => &mut self.styles,
        }
    }

    /// The template text the next generation would use.
    pub fn template_text(&self) -> &str {
        self.template.text(&self.custom_template)
    }

    fn push_result(&mut self, image: Arc<GeneratedImage>) {
        self.history.insert(0, Arc::clone(&image));
        self.current = Some(image);
    }
}

/// Clears the busy flag and returns to idle when a flow ends, however it ends.
struct BusyGuard<'a> {
    studio: &'a Studio,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.studio.lock().phase = Phase::Idle;
        self.studio.busy.store(false, Ordering::Release);
    }
}

/// One fusion session.
pub struct Studio {
    provider: Arc<dyn ImageProvider>,
    credentials: Arc<dyn CredentialSource>,
    config: StudioConfig,
    state: Mutex<StudioState>,
    busy: AtomicBool,
    next_id: AtomicU64,
}

impl Studio {
    /// Creates an empty session. The credential flag starts unset; see
    /// [`Studio::refresh_credentials`].
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        credentials: Arc<dyn CredentialSource>,
        config: StudioConfig,
    ) -> Self {
        let state = StudioState::new(&config);
        Self {
            provider,
            credentials,
            config,
            state: Mutex::new(state),
            busy: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StudioState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The session configuration.
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Display name and image model of the backing provider.
    pub fn provider_info(&self) -> (&str, &str) {
        (self.provider.name(), self.provider.image_model())
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> StudioState {
        self.lock().clone()
    }

    /// The current status message.
    pub fn status(&self) -> Option<String> {
        self.lock().status.clone()
    }

    /// The image on display.
    pub fn current(&self) -> Option<Arc<GeneratedImage>> {
        self.lock().current.clone()
    }

    /// Session history, most recent first.
    pub fn history(&self) -> Vec<Arc<GeneratedImage>> {
        self.lock().history.clone()
    }

    /// True while a generate or edit is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether a usable credential is believed to be configured.
    pub fn has_credential(&self) -> bool {
        self.lock().has_credential
    }

    /// Re-queries the credential source and updates the availability flag.
    pub async fn refresh_credentials(&self) -> bool {
        let available = self.credentials.has_credential().await;
        self.lock().has_credential = available;
        available
    }

    /// Opens the credential selector. The flag is set on success.
    pub async fn select_credentials(&self) -> bool {
        match self.credentials.open_selector().await {
            Ok(()) => {
                self.lock().has_credential = true;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "credential selection failed");
                false
            }
        }
    }

    /// Checks the credential against the service and updates the flag.
    ///
    /// An auth failure clears the flag; other failures (network, rate
    /// limits) leave it as it was.
    pub async fn verify_credentials(&self) -> crate::Result<()> {
        match self.provider.health_check().await {
            Ok(()) => {
                self.lock().has_credential = true;
                Ok(())
            }
            Err(e) => {
                if e.is_auth() {
                    self.lock().has_credential = false;
                }
                tracing::warn!(error = %e, "credential check failed");
                Err(e)
            }
        }
    }

    /// Activates a template.
    pub fn select_template(&self, template: TemplateChoice) {
        self.lock().template = template;
    }

    /// Replaces the custom template text.
    pub fn set_custom_template(&self, text: impl Into<String>) {
        self.lock().custom_template = text.into();
    }

    /// Sets the output aspect ratio.
    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.lock().settings.aspect_ratio = ratio;
    }

    /// Sets the output resolution tier.
    pub fn set_resolution(&self, resolution: Resolution) {
        self.lock().settings.resolution = resolution;
    }

    /// Replaces the additional instructions.
    pub fn set_instructions(&self, instructions: impl Into<String>) {
        self.lock().settings.instructions = instructions.into();
    }

    /// Adds files to a category. See [`Studio::add_sources`].
    pub async fn add_files<I>(&self, category: ImageCategory, paths: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let sources = paths
            .into_iter()
            .map(|p| IntakeSource::Path(p.into()))
            .collect();
        self.add_sources(category, sources).await
    }

    /// Adds in-memory images to a category. See [`Studio::add_sources`].
    pub async fn add_bytes(&self, category: ImageCategory, files: Vec<(String, Vec<u8>)>) -> usize {
        let sources = files
            .into_iter()
            .map(|(name, data)| IntakeSource::Bytes { name, data })
            .collect();
        self.add_sources(category, sources).await
    }

    /// Decodes and adds images one at a time, returning how many were added.
    ///
    /// Only as many sources as there are free slots are processed; the rest
    /// are dropped. A source that fails to decode is logged and skipped.
    pub async fn add_sources(&self, category: ImageCategory, sources: Vec<IntakeSource>) -> usize {
        let remaining = self.lock().list(category).remaining();
        if sources.len() > remaining {
            tracing::debug!(
                %category,
                selected = sources.len(),
                remaining,
                "dropping selections past the category limit"
            );
        }

        let mut added = 0;
        for source in sources.into_iter().take(remaining) {
            let name = source.name();
            let id = ImageId(self.next_id.fetch_add(1, Ordering::Relaxed));
            match source
                .load(id, self.config.max_dimension, self.config.jpeg_quality)
                .await
            {
                Ok(image) => {
                    if self.lock().list_mut(category).push(image) {
                        added += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "image compression failed, skipping");
                }
            }
        }
        added
    }

    /// Removes an upload. Returns false if no such image exists.
    pub fn remove_image(&self, category: ImageCategory, id: ImageId) -> bool {
        self.lock().list_mut(category).remove(id).is_some()
    }

    /// The uploads of a category.
    pub fn images(&self, category: ImageCategory) -> Vec<UploadedImage> {
        self.lock().list(category).images().to_vec()
    }

    /// Makes a history entry current again.
    pub fn select_history(&self, index: usize) -> bool {
        let mut state = self.lock();
        match state.history.get(index).cloned() {
            Some(image) => {
                state.current = Some(image);
                true
            }
            None => false,
        }
    }

    /// Loads an existing image as the current result, e.g. to edit it.
    /// The history is not touched.
    pub fn adopt_image(&self, image: GeneratedImage) -> Arc<GeneratedImage> {
        let image = Arc::new(image);
        self.lock().current = Some(Arc::clone(&image));
        image
    }

    /// Writes the current image into `dir` as `gemini-fusion-<millis>.<ext>`.
    pub fn save_current(&self, dir: impl AsRef<Path>) -> crate::Result<PathBuf> {
        let image = self
            .current()
            .ok_or_else(|| StudioError::MissingInput("no image to save".into()))?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = dir
            .as_ref()
            .join(format!("gemini-fusion-{millis}.{}", image.format.extension()));
        image.save(&path)?;
        tracing::info!(path = %path.display(), "saved image");
        Ok(path)
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { studio: self })
    }

    /// Opens the selector when no credential is available.
    ///
    /// Returns false when the caller must stop and let the user retry.
    async fn ensure_credentials(&self) -> bool {
        if self.has_credential() {
            return true;
        }
        self.select_credentials().await;
        false
    }

    fn fail(&self, message: String) -> Outcome {
        self.lock().status = Some(message.clone());
        Outcome::Failed(message)
    }

    fn report_error(&self, prefix: &str, error: &StudioError) -> Outcome {
        tracing::error!(error = %error, "{prefix}");
        if error.is_auth() {
            self.lock().has_credential = false;
            return self.fail("API key is invalid, please select it again.".to_string());
        }
        self.fail(format!("{prefix}: {error}"))
    }

    /// Fuses the inputs into a prompt and renders it.
    pub async fn generate(&self) -> Outcome {
        let Some(_guard) = self.try_begin() else {
            return Outcome::Busy;
        };
        if !self.ensure_credentials().await {
            return Outcome::CredentialRequired;
        }

        let (fusion, references, settings) = {
            let mut state = self.lock();
            let has_style = !state.styles.is_empty();
            let template = state.template_text().to_string();
            if !has_style && template.trim().is_empty() {
                drop(state);
                return self.fail(
                    "Enter a custom composition template or upload a style reference image."
                        .to_string(),
                );
            }

            let progress = state.template.progress_message(has_style);
            state.phase = Phase::Generating;
            state.status = Some(progress);

            let fusion = FusionRequest {
                subjects: state.subjects.payloads(),
                scenes: state.scenes.payloads(),
                styles: state.styles.payloads(),
                instructions: state.settings.instructions.clone(),
                template,
            };
            let references = ReferenceImages {
                identity: state.subjects.first().map(|i| i.payload.clone()),
                background: state.scenes.first().map(|i| i.payload.clone()),
                composition: state.styles.first().map(|i| i.payload.clone()),
            };
            (fusion, references, state.settings.clone())
        };

        let prompt = fusion::fuse(self.provider.as_ref(), &fusion).await;
        tracing::debug!(%prompt, "fused prompt");

        self.lock().status = Some(format!(
            "Rendering a high-fidelity image with {}...",
            self.provider.image_model()
        ));

        let request = GenerationRequest::new(prompt)
            .with_resolution(settings.resolution)
            .with_aspect_ratio(settings.aspect_ratio)
            .with_references(references);

        match self
            .provider
            .generate_with_retries(&request, self.config.retries)
            .await
        {
            Ok(image) => {
                tracing::info!(
                    size_bytes = image.size(),
                    duration_ms = image.metadata.duration_ms,
                    "image generated"
                );
                let image = Arc::new(image);
                let mut state = self.lock();
                state.push_result(Arc::clone(&image));
                state.status = None;
                Outcome::Completed(image)
            }
            Err(e) => self.report_error("Generation failed", &e),
        }
    }

    /// Applies one instruction to the current image.
    pub async fn edit(&self, instruction: &str) -> Outcome {
        let Some(_guard) = self.try_begin() else {
            return Outcome::Busy;
        };

        let instruction = instruction.trim();
        let Some(current) = self.current() else {
            return self.fail("There is no image to edit yet.".to_string());
        };
        if instruction.is_empty() {
            return self.fail("Describe the change you want to make.".to_string());
        }
        if !self.ensure_credentials().await {
            return Outcome::CredentialRequired;
        }

        let aspect_ratio = {
            let mut state = self.lock();
            state.phase = Phase::Editing;
            state.status = Some("Applying your edit instruction...".to_string());
            state.settings.aspect_ratio
        };

        let request =
            EditRequest::new(current.to_encoded(), instruction).with_aspect_ratio(aspect_ratio);

        match self.provider.edit(&request).await {
            Ok(image) => {
                tracing::info!(size_bytes = image.size(), "image edited");
                let image = Arc::new(image);
                let mut state = self.lock();
                state.push_result(Arc::clone(&image));
                state.status = None;
                Outcome::Completed(image)
            }
            Err(e) => self.report_error("Edit failed", &e),
        }
    }
}
