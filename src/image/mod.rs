//! Image generation module.

mod provider;
pub mod providers;
mod request;
mod types;

pub use provider::{ImageProvider, ImageProviderExt};
pub use request::{AnalysisRequest, EditRequest, GenerationRequest, ReferenceImages};
pub use types::{
    AspectRatio, EncodedImage, GeneratedImage, GenerationMetadata, ImageFormat, PromptPart,
    Resolution,
};
