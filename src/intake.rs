//! Upload intake: decode, downscale and re-encode user images.
//!
//! Uploads are bounded to a square box (longer side capped, aspect ratio
//! preserved) and re-encoded as JPEG before they are sent to the model. The
//! original bytes are kept untouched for local preview.

use crate::error::{Result, StudioError};
use crate::image::{EncodedImage, ImageFormat};
use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::FilterType;
use ::image::DynamicImage;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Opaque identity of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role an uploaded image plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageCategory {
    /// Person whose identity is cast into the scene.
    Subject,
    /// Location whose environment and lighting are used.
    Scene,
    /// Style reference whose composition is reproduced.
    Style,
}

impl ImageCategory {
    /// All categories, in display order.
    pub const ALL: [ImageCategory; 3] = [Self::Subject, Self::Scene, Self::Style];

    /// Stable short key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Scene => "scene",
            Self::Style => "style",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Subject => "Subject / person (optional)",
            Self::Scene => "Background / scene (optional)",
            Self::Style => "Style reference (optional)",
        }
    }
}

impl std::fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ImageCategory {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "subject" | "user" | "person" => Ok(Self::Subject),
            "scene" | "background" => Ok(Self::Scene),
            "style" | "reference" | "ref" => Ok(Self::Style),
            other => Err(StudioError::InvalidRequest(format!(
                "unknown image category: {other}"
            ))),
        }
    }
}

/// Scales `(width, height)` down so the longer side is at most `max`.
///
/// Dimensions already inside the box are returned unchanged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |side: u32, long: u32| -> u32 {
        ((f64::from(side) * f64::from(max) / f64::from(long)).round() as u32).max(1)
    };
    if width > height {
        if width > max {
            return (max, scale(height, width));
        }
    } else if height > max {
        return (scale(width, height), max);
    }
    (width, height)
}

/// Result of [`downscale`].
#[derive(Debug, Clone)]
pub struct Downscaled {
    /// JPEG payload.
    pub payload: EncodedImage,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// Decodes `bytes`, bounds the image to `max_dimension` and re-encodes it as JPEG.
pub fn downscale(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<Downscaled> {
    let decoded = ::image::load_from_memory(bytes)?;
    let (width, height) = fit_within(decoded.width(), decoded.height(), max_dimension);

    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    Ok(Downscaled {
        payload: EncodedImage::new(data, ImageFormat::Jpeg),
        width,
        height,
    })
}

/// An image selected by the user, ready for upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Identity within the session.
    pub id: ImageId,
    /// Original file name.
    pub name: String,
    /// File the image was read from, if any.
    pub source: Option<PathBuf>,
    /// Unmodified original bytes, for local preview.
    pub preview: Arc<[u8]>,
    /// Compressed payload sent to the model.
    pub payload: EncodedImage,
    /// Payload width in pixels.
    pub width: u32,
    /// Payload height in pixels.
    pub height: u32,
}

impl UploadedImage {
    /// Builds an upload from in-memory bytes. CPU-bound.
    pub fn from_bytes(
        id: ImageId,
        name: impl Into<String>,
        bytes: Vec<u8>,
        max_dimension: u32,
        quality: u8,
    ) -> Result<Self> {
        let Downscaled {
            payload,
            width,
            height,
        } = downscale(&bytes, max_dimension, quality)?;
        Ok(Self {
            id,
            name: name.into(),
            source: None,
            preview: Arc::from(bytes),
            payload,
            width,
            height,
        })
    }
}

/// A file picked by the user, not yet decoded.
#[derive(Debug, Clone)]
pub enum IntakeSource {
    /// A file on disk.
    Path(PathBuf),
    /// Bytes already in memory.
    Bytes {
        /// Display name.
        name: String,
        /// Encoded image bytes.
        data: Vec<u8>,
    },
}

impl IntakeSource {
    /// Short name for logs and display.
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => display_name(path),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    /// Reads and decodes the source off the async executor.
    pub async fn load(self, id: ImageId, max_dimension: u32, quality: u8) -> Result<UploadedImage> {
        let (name, data, source) = match self {
            Self::Path(path) => {
                let data = tokio::fs::read(&path).await?;
                (display_name(&path), data, Some(path))
            }
            Self::Bytes { name, data } => (name, data, None),
        };

        let mut image = tokio::task::spawn_blocking(move || {
            UploadedImage::from_bytes(id, name, data, max_dimension, quality)
        })
        .await
        .map_err(|e| StudioError::Decode(e.to_string()))??;
        image.source = source;
        Ok(image)
    }
}

impl From<PathBuf> for IntakeSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// An ordered, capped list of uploads for one category.
#[derive(Debug, Clone)]
pub struct ImageList {
    category: ImageCategory,
    max: usize,
    items: Vec<UploadedImage>,
}

impl ImageList {
    /// Creates an empty list holding at most `max` images.
    pub fn new(category: ImageCategory, max: usize) -> Self {
        Self {
            category,
            max,
            items: Vec::new(),
        }
    }

    /// The category this list holds.
    pub fn category(&self) -> ImageCategory {
        self.category
    }

    /// Maximum number of images.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Free slots left.
    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.items.len())
    }

    /// Appends an image. Returns false, dropping the image, when the list is full.
    pub fn push(&mut self, image: UploadedImage) -> bool {
        if self.remaining() == 0 {
            return false;
        }
        self.items.push(image);
        true
    }

    /// Removes the image with the given id.
    pub fn remove(&mut self, id: ImageId) -> Option<UploadedImage> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    /// Images in display order.
    pub fn images(&self) -> &[UploadedImage] {
        &self.items
    }

    /// The first image, used as the generation reference.
    pub fn first(&self) -> Option<&UploadedImage> {
        self.items.first()
    }

    /// Payloads in display order.
    pub fn payloads(&self) -> Vec<EncodedImage> {
        self.items.iter().map(|i| i.payload.clone()).collect()
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when the list holds no image.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encodes a solid-color PNG of the given size.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ::image::RgbaImage::from_pixel(width, height, ::image::Rgba([200, 40, 90, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ::image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(2048, 1024, 1024), (1024, 512));
        assert_eq!(fit_within(3000, 2000, 1024), (1024, 683));
    }

    #[test]
    fn test_fit_within_portrait_and_square() {
        assert_eq!(fit_within(1000, 4000, 1024), (256, 1024));
        assert_eq!(fit_within(1500, 1500, 1024), (1024, 1024));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(640, 480, 1024), (640, 480));
        assert_eq!(fit_within(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        for (w, h) in [(4032, 3024), (3024, 4032), (5000, 7), (7, 5000), (1025, 1023)] {
            let (fw, fh) = fit_within(w, h, 1024);
            assert!(fw.max(fh) <= 1024);
            assert!(fw >= 1 && fh >= 1);
            if w > h {
                let exact = f64::from(h) * 1024.0 / f64::from(w);
                assert!((f64::from(fh) - exact).abs() <= 0.5 || fh == 1);
            } else {
                let exact = f64::from(w) * 1024.0 / f64::from(h);
                assert!((f64::from(fw) - exact).abs() <= 0.5 || fw == 1);
            }
        }
    }

    #[test]
    fn test_downscale_bounds_and_reencodes() {
        let out = downscale(&png_bytes(1600, 800), 1024, 80).unwrap();
        assert_eq!((out.width, out.height), (1024, 512));
        assert_eq!(out.payload.format, ImageFormat::Jpeg);
        assert_eq!(
            ImageFormat::from_magic_bytes(&out.payload.data),
            Some(ImageFormat::Jpeg)
        );

        let decoded = ::image::load_from_memory(&out.payload.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 512));
    }

    #[test]
    fn test_downscale_small_image_keeps_size() {
        let out = downscale(&png_bytes(300, 200), 1024, 80).unwrap();
        assert_eq!((out.width, out.height), (300, 200));
    }

    #[test]
    fn test_downscale_rejects_garbage() {
        let err = downscale(b"definitely not an image", 1024, 80).unwrap_err();
        assert!(matches!(err, StudioError::Image(_)));
    }

    #[test]
    fn test_uploaded_image_keeps_original_preview() {
        let bytes = png_bytes(1200, 1200);
        let upload =
            UploadedImage::from_bytes(ImageId(7), "face.png", bytes.clone(), 1024, 80).unwrap();
        assert_eq!(&*upload.preview, bytes.as_slice());
        assert_eq!((upload.width, upload.height), (1024, 1024));
        assert_eq!(upload.id.to_string(), "#7");
    }

    #[tokio::test]
    async fn test_intake_source_bytes() {
        let source = IntakeSource::Bytes {
            name: "scene.png".into(),
            data: png_bytes(64, 32),
        };
        assert_eq!(source.name(), "scene.png");
        let upload = source.load(ImageId(1), 16, 80).await.unwrap();
        assert_eq!((upload.width, upload.height), (16, 8));
        assert!(upload.source.is_none());
    }

    #[tokio::test]
    async fn test_intake_source_missing_file() {
        let source = IntakeSource::from(PathBuf::from("/nonexistent/fusion/photo.png"));
        assert_eq!(source.name(), "photo.png");
        let err = source.load(ImageId(1), 1024, 80).await.unwrap_err();
        assert!(matches!(err, StudioError::Io(_)));
    }

    #[test]
    fn test_image_list_cap() {
        let mut list = ImageList::new(ImageCategory::Scene, 2);
        for id in 0..3 {
            let upload =
                UploadedImage::from_bytes(ImageId(id), "x.png", png_bytes(4, 4), 1024, 80).unwrap();
            let accepted = list.push(upload);
            assert_eq!(accepted, id < 2);
        }
        assert_eq!(list.len(), 2);
        assert_eq!(list.remaining(), 0);
        assert_eq!(list.first().unwrap().id, ImageId(0));

        assert!(list.remove(ImageId(0)).is_some());
        assert!(list.remove(ImageId(0)).is_none());
        assert_eq!(list.remaining(), 1);
        assert_eq!(list.payloads().len(), 1);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("reference".parse::<ImageCategory>().unwrap(), ImageCategory::Style);
        assert_eq!("Subject".parse::<ImageCategory>().unwrap(), ImageCategory::Subject);
        assert!("crowd".parse::<ImageCategory>().is_err());
    }
}
