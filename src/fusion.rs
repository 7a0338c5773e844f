//! Prompt fusion: turn uploads, instructions and a template into one prompt.
//!
//! A text/vision model looks at every uploaded image together with its role
//! and rewrites the scene into a single description for the image model.
//! Fusion runs in one of two modes, chosen once per request: when a style
//! reference is present its composition is reproduced and the template is
//! ignored; otherwise the template script is authoritative for pose, action
//! and camera angle.

use crate::image::{AnalysisRequest, EncodedImage, ImageProvider, PromptPart};

const SUBJECT_LABEL: &str = "Input Image Type: [User Subject/Person]";
const SCENE_LABEL: &str = "Input Image Type: [User Scene/Background]";
const STYLE_LABEL: &str = "Input Image Type: [Style Reference]";

/// Returned in style mode when the model answers without text.
const STYLE_EMPTY_FALLBACK: &str = "A high quality image";
/// Returned in style mode when the analysis call fails.
const STYLE_ERROR_FALLBACK: &str = "A high quality image based on the reference.";

const STYLE_REFERENCE_RULES: &str = r#"
    1. **Objective**: Reconstruct the description of the [Style Reference] image, but perform specific SWAPS based on user uploads.
    2. **The "Unchanged" Rule**:
       - If a visual element (Pose, Clothing, Art Style, Props) is in [Style Reference] and NOT explicitly replaced by [User Subject] or [User Scene], it MUST be preserved.
       - **Strict Aesthetic Matching**: Pay special attention to the "Style Reference" regarding **Skin Texture**, **Camera Lens Characteristics**, and **Composition**.
    3. **The "Swap" Rule (CRITICAL)**:
       - **Subject Swap**: If [User Subject] is present, describe the main character in the [Style Reference] but with the *face, hair, and physical identity* of the [User Subject].
       - **Background Swap**: If [User Scene] is present:
          - You MUST describe the location, lighting, and time of day VISIBLE in the [User Scene] image.
          - **OVERRIDE**: Ignore the lighting/atmosphere of the [Style Reference] if it conflicts with the [User Scene].
          - **FUSION**: Describe the [User Scene] as the setting, but mapped to the *Perspective/Camera Angle* of the [Style Reference].
"#;

const TEMPLATE_RULES: &str = r#"
    1. **Objective**: Execute the scene described in the **Base Text Template** (Master Script), casting the uploaded images into the roles.
    2. **Strict Text Adherence (Subject/Pose)**:
       - The **Base Text Template** is the authority for **Action**, **Pose**, **Clothing**, and **Camera Angle**.
    3. **The "Cast & Location" Swap (CRITICAL)**:
       - **Subject Integration**: If [User Subject] is provided, the character described in the text MUST take on the **Identity** of the [User Subject].
       - **Background Integration**: If [User Scene] is provided:
          - You MUST describe the location, lighting, time of day, and weather VISIBLE in the [User Scene] image.
          - **OVERRIDE**: You MUST IGNORE any lighting, sky, or environmental descriptions in the Base Text Template (e.g., if template says "sunlight" but user image is "night", use "night").
          - **FUSION**: Place the subject into this [User Scene] environment using the *Pose* and *Camera Angle* from the Template.
    4. **Result**: A fusion where the [User Subject] is enacting the **Base Text Template** pose/action, but physically located inside the [User Scene] environment.
"#;

const STYLE_REFERENCE_MODE: &str = r#">> MODE: STYLE REFERENCE RECONSTRUCTION
       - **Source of Truth**: The [Style Reference] image for Composition/Style.
       - **Source of Truth (Background)**: The [User Scene] image (if provided) for Lighting/Environment.
       - **Action**: Describe the [Style Reference] structure, but swap the environment with the [User Scene]'s description."#;

const TEMPLATE_MODE: &str = r#">> MODE: TEMPLATE FUSION
       - **Source of Truth**: The Base Text Template for Pose/Action/Angle.
       - **Source of Truth (Background)**: The [User Scene] image (if provided) for Lighting/Environment.
       - **Action**: Use the Text Template script, but rewrite the setting description to match the [User Scene]."#;

const SAFETY_CONSTRAINT: &str = r#"**SAFETY CONSTRAINT (CRITICAL)**:
    - You MUST ensure the output prompt is SAFE for image generation.
    - **Do NOT** include sexually explicit, nude, highly suggestive, or provocative descriptions.
    - If the user input or reference image implies nudity or restricted content, you MUST describe the subject as wearing appropriate clothing (e.g., fashion, casual wear, bathing suit if contextually appropriate but modest) that fits the style.
    - Avoid terms like "cleavage", "soft tissue volume", "provocative", or overly specific anatomical focus that could trigger safety filters."#;

/// How the fusion model should treat the inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusionMode {
    /// Reproduce the style reference; the template is ignored.
    StyleReference,
    /// Follow the template script.
    Template(String),
}

impl FusionMode {
    /// Style reference wins whenever one is present.
    pub fn select(has_style_reference: bool, template: &str) -> Self {
        if has_style_reference {
            Self::StyleReference
        } else {
            Self::Template(template.to_string())
        }
    }

    /// Prompt used when the model answers with nothing.
    fn empty_fallback(&self) -> String {
        match self {
            Self::StyleReference => STYLE_EMPTY_FALLBACK.to_string(),
            Self::Template(text) => text.clone(),
        }
    }

    /// Prompt used when the analysis call fails.
    fn error_fallback(&self) -> String {
        match self {
            Self::StyleReference => STYLE_ERROR_FALLBACK.to_string(),
            Self::Template(text) => text.clone(),
        }
    }
}

/// Everything the fusion step looks at.
#[derive(Debug, Clone, Default)]
pub struct FusionRequest {
    /// Subject payloads, in display order.
    pub subjects: Vec<EncodedImage>,
    /// Scene payloads, in display order.
    pub scenes: Vec<EncodedImage>,
    /// Style reference payloads, in display order.
    pub styles: Vec<EncodedImage>,
    /// Free-text user instructions.
    pub instructions: String,
    /// Active template text.
    pub template: String,
}

impl FusionRequest {
    /// Creates a request for a template with no images or instructions.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Default::default()
        }
    }

    /// The mode this request runs in.
    pub fn mode(&self) -> FusionMode {
        FusionMode::select(!self.styles.is_empty(), &self.template)
    }

    /// True when there is nothing to fuse into the template.
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
            && self.scenes.is_empty()
            && self.styles.is_empty()
            && self.instructions.trim().is_empty()
    }

    /// Builds the role-tagged analysis request.
    pub fn to_analysis(&self) -> AnalysisRequest {
        let mut parts = Vec::new();
        let groups = [
            (&self.subjects, SUBJECT_LABEL),
            (&self.scenes, SCENE_LABEL),
            (&self.styles, STYLE_LABEL),
        ];
        for (images, label) in groups {
            for image in images {
                parts.push(PromptPart::Image(image.clone()));
                parts.push(PromptPart::text(label));
            }
        }

        let instructions = match self.instructions.trim() {
            "" => "None",
            text => text,
        };
        parts.push(PromptPart::Text(format!(
            "User Additional Text Instructions: \"{instructions}\""
        )));

        AnalysisRequest {
            system_instruction: system_instruction(&self.mode()),
            parts,
        }
    }
}

fn system_instruction(mode: &FusionMode) -> String {
    let (mode_block, template, rules) = match mode {
        FusionMode::StyleReference => {
            (STYLE_REFERENCE_MODE, "(IGNORE TEMPLATE)", STYLE_REFERENCE_RULES)
        }
        FusionMode::Template(text) => (TEMPLATE_MODE, text.as_str(), TEMPLATE_RULES),
    };

    format!(
        r#"
    You are an expert Image Prompt Reverse-Engineer and Reconstructionist.

    YOUR TASK:
    Write a highly detailed image generation prompt for the "Banana Pro" model.

    {SAFETY_CONSTRAINT}

    **MODE SELECTION**:
    {mode_block}

    --- BASE TEXT TEMPLATE (Only use in Template Fusion Mode) ---
    {template}
    -------------------------------------------------------------

    SPECIFIC INSTRUCTIONS:
    {rules}

    OUTPUT:
    - Return ONLY the final, descriptive English prompt. Do not add explanations.
  "#
    )
}

/// Produces the fused prompt. Never fails: remote errors fall back to a safe prompt.
///
/// With no images and no instructions the template is returned as-is and the
/// provider is not called.
pub async fn fuse<P: ImageProvider + ?Sized>(provider: &P, request: &FusionRequest) -> String {
    if request.is_empty() {
        tracing::debug!("nothing to fuse, using template as-is");
        return request.template.clone();
    }

    let mode = request.mode();
    match provider.analyze(&request.to_analysis()).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("prompt analysis returned no text, using fallback prompt");
            mode.empty_fallback()
        }
        Err(e) => {
            tracing::warn!(error = %e, "prompt analysis failed, using fallback prompt");
            mode.error_fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, StudioError};
    use crate::image::{EditRequest, GeneratedImage, GenerationRequest, ImageFormat};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records analysis requests and answers with a canned result.
    struct Analyst {
        answer: std::result::Result<String, String>,
        seen: Mutex<Vec<AnalysisRequest>>,
    }

    impl Analyst {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err("upstream exploded".to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageProvider for Analyst {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            self.answer.clone().map_err(|m| StudioError::Api {
                status: 500,
                message: m,
            })
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<GeneratedImage> {
            Err(StudioError::NoImage("unused".into()))
        }

        async fn edit(&self, _request: &EditRequest) -> Result<GeneratedImage> {
            Err(StudioError::NoImage("unused".into()))
        }

        fn name(&self) -> &str {
            "analyst"
        }

        fn image_model(&self) -> &str {
            "analyst-image"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn payload(byte: u8) -> EncodedImage {
        EncodedImage::new(vec![byte; 8], ImageFormat::Jpeg)
    }

    #[tokio::test]
    async fn test_empty_request_returns_template_without_call() {
        let provider = Analyst::answering("should not be used");
        let request = FusionRequest {
            instructions: "   ".into(),
            ..FusionRequest::new("A giant in Tokyo")
        };

        assert_eq!(fuse(&provider, &request).await, "A giant in Tokyo");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_instructions_alone_trigger_analysis() {
        let provider = Analyst::answering("  A giant at night in Tokyo \n");
        let request = FusionRequest {
            instructions: "make it night".into(),
            ..FusionRequest::new("A giant in Tokyo")
        };

        assert_eq!(fuse(&provider, &request).await, "A giant at night in Tokyo");
        assert_eq!(provider.calls(), 1);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[0].parts.last().unwrap().as_text(),
            Some("User Additional Text Instructions: \"make it night\"")
        );
    }

    #[test]
    fn test_style_reference_overrides_template() {
        let with_style = FusionRequest {
            styles: vec![payload(3)],
            ..FusionRequest::new("Template A")
        };
        let other_template = FusionRequest {
            template: "Template B".into(),
            ..with_style.clone()
        };

        assert_eq!(with_style.mode(), FusionMode::StyleReference);
        assert_eq!(with_style.mode(), other_template.mode());
        assert_eq!(
            with_style.to_analysis().system_instruction,
            other_template.to_analysis().system_instruction
        );
        let instruction = with_style.to_analysis().system_instruction;
        assert!(instruction.contains("STYLE REFERENCE RECONSTRUCTION"));
        assert!(instruction.contains("(IGNORE TEMPLATE)"));
        assert!(!instruction.contains("Template A"));
    }

    #[test]
    fn test_template_mode_embeds_template() {
        let request = FusionRequest {
            subjects: vec![payload(1)],
            ..FusionRequest::new("A woman on volcanic rocks")
        };
        let instruction = request.to_analysis().system_instruction;

        assert_eq!(
            request.mode(),
            FusionMode::Template("A woman on volcanic rocks".into())
        );
        assert!(instruction.contains("TEMPLATE FUSION"));
        assert!(instruction.contains("A woman on volcanic rocks"));
        assert!(instruction.contains("SAFETY CONSTRAINT"));
    }

    #[test]
    fn test_parts_are_role_tagged_in_order() {
        let request = FusionRequest {
            subjects: vec![payload(1), payload(2)],
            scenes: vec![payload(3)],
            styles: vec![payload(4)],
            instructions: String::new(),
            template: "t".into(),
        };
        let parts = request.to_analysis().parts;

        assert_eq!(parts.len(), 9);
        assert_eq!(parts[0], PromptPart::Image(payload(1)));
        assert_eq!(parts[1].as_text(), Some(SUBJECT_LABEL));
        assert_eq!(parts[2], PromptPart::Image(payload(2)));
        assert_eq!(parts[4], PromptPart::Image(payload(3)));
        assert_eq!(parts[5].as_text(), Some(SCENE_LABEL));
        assert_eq!(parts[7].as_text(), Some(STYLE_LABEL));
        assert_eq!(
            parts[8].as_text(),
            Some("User Additional Text Instructions: \"None\"")
        );
    }

    #[tokio::test]
    async fn test_failure_falls_back_per_mode() {
        let provider = Analyst::failing();

        let template_request = FusionRequest {
            subjects: vec![payload(1)],
            ..FusionRequest::new("Template script")
        };
        assert_eq!(fuse(&provider, &template_request).await, "Template script");

        let style_request = FusionRequest {
            styles: vec![payload(2)],
            ..FusionRequest::new("Template script")
        };
        assert_eq!(fuse(&provider, &style_request).await, STYLE_ERROR_FALLBACK);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_answer_falls_back_per_mode() {
        let provider = Analyst::answering("   ");

        let style_request = FusionRequest {
            styles: vec![payload(2)],
            ..FusionRequest::new("Template script")
        };
        assert_eq!(fuse(&provider, &style_request).await, STYLE_EMPTY_FALLBACK);

        let template_request = FusionRequest {
            scenes: vec![payload(1)],
            ..FusionRequest::new("Template script")
        };
        assert_eq!(fuse(&provider, &template_request).await, "Template script");
    }
}
