//! Studio configuration.

/// Default cap on images per category.
pub const DEFAULT_MAX_IMAGES: usize = 4;
/// Default longest side of an uploaded image after downscaling.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;
/// Default JPEG quality for uploads.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Limits and policies for a studio session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// Maximum images held per category.
    pub max_images_per_category: usize,
    /// Longest side of the re-encoded upload, in pixels.
    pub max_dimension: u32,
    /// JPEG quality of the re-encoded upload (1-100).
    pub jpeg_quality: u8,
    /// Retries of transient generation failures.
    pub retries: u32,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            max_images_per_category: DEFAULT_MAX_IMAGES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            retries: 0,
        }
    }
}

impl StudioConfig {
    /// Reads `FUSION_*` overrides, falling back to defaults for unset or bad values.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`StudioConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |var: &str| lookup(var).and_then(|v| v.trim().parse::<u64>().ok());
        let defaults = Self::default();
        Self {
            max_images_per_category: parse("FUSION_MAX_IMAGES")
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_images_per_category),
            max_dimension: parse("FUSION_MAX_DIMENSION")
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_dimension),
            jpeg_quality: parse("FUSION_JPEG_QUALITY")
                .map(|q| q.clamp(1, 100) as u8)
                .unwrap_or(defaults.jpeg_quality),
            retries: parse("FUSION_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.retries),
        }
    }

    /// Sets the per-category cap, at least 1.
    pub fn with_max_images(mut self, max: usize) -> Self {
        self.max_images_per_category = max.max(1);
        self
    }

    /// Sets the downscale bound, at least 1 pixel.
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max.max(1);
        self
    }

    /// Sets the JPEG quality, clamped to 1-100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Sets the retry count for transient failures.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert_eq!(config.max_images_per_category, 4);
        assert_eq!(config.max_dimension, 1024);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.retries, 0);
    }

    #[test]
    fn test_builders() {
        let config = StudioConfig::default()
            .with_max_images(2)
            .with_max_dimension(512)
            .with_jpeg_quality(0)
            .with_retries(3);
        assert_eq!(config.max_images_per_category, 2);
        assert_eq!(config.max_dimension, 512);
        assert_eq!(config.jpeg_quality, 1);
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn test_builders_reject_zero_sizes() {
        let config = StudioConfig::default()
            .with_max_images(0)
            .with_max_dimension(0);
        assert_eq!(config.max_images_per_category, 1);
        assert_eq!(config.max_dimension, 1);
    }

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        move |var| vars.get(var).map(|v| v.to_string())
    }

    #[test]
    fn test_lookup_overrides() {
        let config = StudioConfig::from_lookup(lookup(&[
            ("FUSION_MAX_IMAGES", "6"),
            ("FUSION_MAX_DIMENSION", " 512 "),
            ("FUSION_JPEG_QUALITY", "90"),
            ("FUSION_RETRIES", "2"),
        ]));
        assert_eq!(config.max_images_per_category, 6);
        assert_eq!(config.max_dimension, 512);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_lookup_bad_values_fall_back() {
        let config = StudioConfig::from_lookup(lookup(&[
            ("FUSION_MAX_IMAGES", "0"),
            ("FUSION_MAX_DIMENSION", "-5"),
            ("FUSION_JPEG_QUALITY", "250"),
            ("FUSION_RETRIES", "abc"),
        ]));
        assert_eq!(config.max_images_per_category, DEFAULT_MAX_IMAGES);
        assert_eq!(config.max_dimension, DEFAULT_MAX_DIMENSION);
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.retries, 0);

        let config = StudioConfig::from_lookup(lookup(&[("FUSION_JPEG_QUALITY", "0")]));
        assert_eq!(config.jpeg_quality, 1);
        assert_eq!(StudioConfig::from_lookup(lookup(&[])), StudioConfig::default());
    }

    #[test]
    fn test_from_env() {
        // Only test in the crate that touches these variables.
        std::env::set_var("FUSION_MAX_IMAGES", "0");
        std::env::set_var("FUSION_MAX_DIMENSION", "256");
        std::env::set_var("FUSION_JPEG_QUALITY", "250");
        std::env::set_var("FUSION_RETRIES", "abc");

        let config = StudioConfig::from_env();

        for var in [
            "FUSION_MAX_IMAGES",
            "FUSION_MAX_DIMENSION",
            "FUSION_JPEG_QUALITY",
            "FUSION_RETRIES",
        ] {
            std::env::remove_var(var);
        }
        assert_eq!(config.max_images_per_category, DEFAULT_MAX_IMAGES);
        assert_eq!(config.max_dimension, 256);
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.retries, 0);
    }
}
