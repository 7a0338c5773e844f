//! Provider-independent request types.
//!
//! Each request knows how to lay itself out as an ordered list of
//! [`PromptPart`]s. Providers only translate those parts onto their wire
//! format, so the role labels and instructions stay the same across backends.

use crate::image::types::{AspectRatio, EncodedImage, PromptPart, Resolution};

const ID_SOURCE_INSTRUCTION: &str = "Reference Image [ID_SOURCE]: Use this face/identity. Map this identity onto the subject in the composition.";

const BG_SOURCE_INSTRUCTION: &str = "Reference Image [BG_SOURCE]: Use this exact environment. PRESERVE the lighting, color palette, time of day, and mood of this image. The subject must be integrated realistically into THIS specific scene.";

const MASTER_COMPOSITION_INSTRUCTION: &str = "Reference Image [MASTER_COMPOSITION]: This image defines the POSE, ANGLE, CLOTHING, and STYLE. Result must look like this image, but with the [ID_SOURCE] identity and [BG_SOURCE] background swapped in. Keep everything else UNCHANGED.";

/// A text/vision request whose answer is a single piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// System instruction steering the model.
    pub system_instruction: String,
    /// Ordered content parts.
    pub parts: Vec<PromptPart>,
}

/// Up to three reference images, each tagged by the role it plays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceImages {
    /// Identity source (face, hair, physique).
    pub identity: Option<EncodedImage>,
    /// Background source (location, lighting, mood).
    pub background: Option<EncodedImage>,
    /// Master composition source (pose, angle, clothing, style).
    pub composition: Option<EncodedImage>,
}

impl ReferenceImages {
    /// Number of references present.
    pub fn len(&self) -> usize {
        [&self.identity, &self.background, &self.composition]
            .iter()
            .filter(|r| r.is_some())
            .count()
    }

    /// Returns true when no reference is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A request to render an image from a fused prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The fused natural-language description.
    pub prompt: String,
    /// Output resolution tier.
    pub resolution: Resolution,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Role-tagged reference images.
    pub references: ReferenceImages,
}

impl GenerationRequest {
    /// Creates a request with default resolution and aspect ratio.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resolution: Resolution::default(),
            aspect_ratio: AspectRatio::default(),
            references: ReferenceImages::default(),
        }
    }

    /// Sets the resolution tier.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the reference images.
    pub fn with_references(mut self, references: ReferenceImages) -> Self {
        self.references = references;
        self
    }

    /// Lays out the request: each reference followed by its role, then the prompt.
    pub fn parts(&self) -> Vec<PromptPart> {
        let roles = [
            (&self.references.identity, ID_SOURCE_INSTRUCTION),
            (&self.references.background, BG_SOURCE_INSTRUCTION),
            (&self.references.composition, MASTER_COMPOSITION_INSTRUCTION),
        ];

        let mut parts = Vec::with_capacity(roles.len() * 2 + 1);
        for (image, instruction) in roles {
            if let Some(image) = image {
                parts.push(PromptPart::Image(image.clone()));
                parts.push(PromptPart::text(instruction));
            }
        }
        parts.push(PromptPart::Text(format!(
            "Create a photorealistic image based on this description: {}",
            self.prompt
        )));
        parts
    }
}

/// A single-step modification of an existing image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// The image to modify.
    pub image: EncodedImage,
    /// Free-text instruction.
    pub instruction: String,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
}

impl EditRequest {
    /// Creates an edit request.
    pub fn new(image: EncodedImage, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// The image followed by the instruction.
    pub fn parts(&self) -> Vec<PromptPart> {
        vec![
            PromptPart::Image(self.image.clone()),
            PromptPart::Text(format!("Edit this image: {}", self.instruction)),
        ]
    }
}
