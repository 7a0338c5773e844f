//! Catalog of composition templates.
//!
//! A template is a scene script: it fixes pose, action, clothing and camera
//! angle, while the uploaded images decide who is in the scene and where it
//! takes place. The thirteen presets ship with the crate; a custom template is
//! free text supplied by the user.

use crate::error::{Result, StudioError};
use std::str::FromStr;

/// Built-in scene templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    /// Colossal figure leaning over Shibuya Crossing.
    #[default]
    Giant,
    /// High-angle bathroom selfie, raw texture.
    Bathroom,
    /// Contemplative cafe portrait.
    Student,
    /// Night platform portrait with chibi doodles.
    Subway,
    /// Seaside balcony selfie.
    Beach,
    /// Reclining in a snowy forest.
    Snow,
    /// Emerald goddess fashion editorial.
    Emerald,
    /// Tailoring a dress for a miniature self.
    Sewing,
    /// Red dress on volcanic beach rocks.
    Rocks,
    /// Golden-hour check-in on a European square.
    Tourist,
    /// Miniature dancer on a phone screen.
    Phone,
    /// Runway gown made of butterflies.
    Butterfly,
    /// Alpine snowboard editorial.
    Ski,
}

impl Preset {
    /// All presets, in display order.
    pub const ALL: [Preset; 13] = [
        Self::Giant,
        Self::Bathroom,
        Self::Student,
        Self::Subway,
        Self::Beach,
        Self::Snow,
        Self::Emerald,
        Self::Sewing,
        Self::Rocks,
        Self::Tourist,
        Self::Phone,
        Self::Butterfly,
        Self::Ski,
    ];

    /// Stable short key, used on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Giant => "giant",
            Self::Bathroom => "bathroom",
            Self::Student => "student",
            Self::Subway => "subway",
            Self::Beach => "beach",
            Self::Snow => "snow",
            Self::Emerald => "emerald",
            Self::Sewing => "sewing",
            Self::Rocks => "rocks",
            Self::Tourist => "tourist",
            Self::Phone => "phone",
            Self::Butterfly => "butterfly",
            Self::Ski => "ski",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Giant => "Giant composition (default)",
            Self::Bathroom => "Bathroom high angle (raw realism)",
            Self::Student => "Student contemplation (literary)",
            Self::Subway => "Subway girl (doodle mixed media)",
            Self::Beach => "Beach selfie (influencer)",
            Self::Snow => "Snow beauty (8K ultra HD)",
            Self::Emerald => "Emerald goddess (vintage forest)",
            Self::Sewing => "Mini sewing (miniature realism)",
            Self::Rocks => "Beach rocks (haute couture)",
            Self::Tourist => "Tourist check-in (European charm)",
            Self::Phone => "Phone dance (cyber miniature)",
            Self::Butterfly => "Runway butterfly (dreamy couture)",
            Self::Ski => "Mountain ski (luxury sport)",
        }
    }

    /// The scene script.
    pub fn text(&self) -> &'static str {
        let text = match self {
            Self::Giant => include_str!("scenes/giant.txt"),
            Self::Bathroom => include_str!("scenes/bathroom.txt"),
            Self::Student => include_str!("scenes/student.txt"),
            Self::Subway => include_str!("scenes/subway.txt"),
            Self::Beach => include_str!("scenes/beach.txt"),
            Self::Snow => include_str!("scenes/snow.txt"),
            Self::Emerald => include_str!("scenes/emerald.txt"),
            Self::Sewing => include_str!("scenes/sewing.txt"),
            Self::Rocks => include_str!("scenes/rocks.txt"),
            Self::Tourist => include_str!("scenes/tourist.txt"),
            Self::Phone => include_str!("scenes/phone.txt"),
            Self::Butterfly => include_str!("scenes/butterfly.txt"),
            Self::Ski => include_str!("scenes/ski.txt"),
        };
        text.trim_end()
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Preset {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| StudioError::InvalidRequest(format!("unknown template: {s}")))
    }
}

/// Which template is active. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateChoice {
    /// A built-in preset.
    Preset(Preset),
    /// The user's custom template text.
    Custom,
}

impl Default for TemplateChoice {
    fn default() -> Self {
        Self::Preset(Preset::default())
    }
}

impl TemplateChoice {
    /// Resolves the template text; `custom` is used for [`TemplateChoice::Custom`].
    pub fn text<'a>(&self, custom: &'a str) -> &'a str {
        match self {
            Self::Preset(preset) => preset.text(),
            Self::Custom => custom,
        }
    }

    /// Progress message shown while the inputs are being analyzed.
    pub fn progress_message(&self, style_reference: bool) -> String {
        if style_reference {
            return "Analyzing the structure of the style reference image (template ignored)..."
                .to_string();
        }
        match self {
            Self::Preset(preset) => {
                format!("Analyzing inputs against the \"{}\" template...", preset.label())
            }
            Self::Custom => "Fusing your custom template with the uploaded images...".to_string(),
        }
    }
}

impl FromStr for TemplateChoice {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("custom") {
            return Ok(Self::Custom);
        }
        s.parse().map(Self::Preset)
    }
}
