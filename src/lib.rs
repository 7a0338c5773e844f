#![warn(missing_docs)]
//! Fusion Studio - merge subject, scene and style photos into one image.
//!
//! The pipeline has two model calls. A multimodal text model reads the
//! uploads (subjects, scenes, an optional style reference) together with a
//! scene template and writes a single generation prompt. An image model then
//! renders that prompt, with the first upload of each category attached as a
//! reference. Results can be refined with one-step edit instructions.
//!
//! # Quick Start
//!
//! ```no_run
//! use fusion_studio::{
//!     ApiKeyStore, GeminiProvider, ImageCategory, Outcome, Studio, StudioConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fusion_studio::Result<()> {
//!     let credentials = Arc::new(ApiKeyStore::from_env());
//!     let provider = GeminiProvider::builder()
//!         .credentials(credentials.clone())
//!         .build()?;
//!     let studio = Studio::new(Arc::new(provider), credentials, StudioConfig::from_env());
//!     studio.refresh_credentials().await;
//!
//!     studio.add_files(ImageCategory::Subject, ["me.jpg"]).await;
//!     studio.add_files(ImageCategory::Scene, ["tokyo.jpg"]).await;
//!
//!     if let Outcome::Completed(_) = studio.generate().await {
//!         studio.save_current(".")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Google Gemini provider (default)
//! - `cli`: the `fusion-studio` command-line interface (default)

mod error;

pub mod config;
pub mod credentials;
pub mod fusion;
pub mod image;
pub mod intake;
pub mod studio;
pub mod template;

pub use crate::config::StudioConfig;
pub use crate::credentials::{ApiKeyStore, CredentialSource};
pub use crate::error::{Result, StudioError};
pub use crate::fusion::{FusionMode, FusionRequest};
pub use crate::image::{
    AspectRatio, EditRequest, GeneratedImage, GenerationRequest, ImageFormat, ImageProvider,
    ImageProviderExt, Resolution,
};
pub use crate::intake::{ImageCategory, ImageId, IntakeSource, UploadedImage};
pub use crate::studio::{GenerationSettings, Outcome, Phase, Studio, StudioState};
pub use crate::template::{Preset, TemplateChoice};

#[cfg(feature = "gemini")]
pub use crate::image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StudioError};
    pub use crate::image::{GeneratedImage, ImageProvider, ImageProviderExt};
    pub use crate::intake::ImageCategory;
    pub use crate::studio::{Outcome, Studio};
    pub use crate::template::{Preset, TemplateChoice};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiProvider;
}
