//! Image provider trait and utilities.

use crate::error::Result;
use crate::image::request::{AnalysisRequest, EditRequest, GenerationRequest};
use crate::image::types::GeneratedImage;
use async_trait::async_trait;

/// Trait for backends that can analyze, generate and edit images.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Runs a text/vision request and returns the model's text answer.
    ///
    /// An empty string means the model answered without text.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String>;

    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Applies a single edit instruction to an existing image.
    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Returns the image model identifier used for generation and edits.
    fn image_model(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait ImageProviderExt: ImageProvider {
    /// Generates with automatic retries on transient failures.
    async fn generate_with_retries(
        &self,
        request: &GenerationRequest,
        max_retries: u32,
    ) -> Result<GeneratedImage> {
        let mut attempt = 0;
        loop {
            match self.generate(request).await {
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

impl<T: ImageProvider + ?Sized> ImageProviderExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StudioError;
    use crate::image::types::{GenerationMetadata, ImageFormat};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageProvider for Flaky {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<String> {
            Ok(String::new())
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<GeneratedImage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(StudioError::RateLimited {
                    retry_after: Some(Duration::from_millis(1)),
                });
            }
            Ok(GeneratedImage::new(
                vec![1, 2, 3],
                ImageFormat::Png,
                GenerationMetadata::default(),
            ))
        }

        async fn edit(&self, _request: &EditRequest) -> Result<GeneratedImage> {
            Err(StudioError::NoImage("unused".into()))
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn image_model(&self) -> &str {
            "flaky-1"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let image = provider
            .generate_with_retries(&GenerationRequest::new("x"), 2)
            .await
            .unwrap();
        assert_eq!(image.data, vec![1, 2, 3]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provider = Flaky {
            failures: 5,
            calls: AtomicU32::new(0),
        };
        let result = provider
            .generate_with_retries(&GenerationRequest::new("x"), 1)
            .await;
        assert!(matches!(result, Err(StudioError::RateLimited { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let provider = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
        };
        assert!(provider
            .generate_with_retries(&GenerationRequest::new("x"), 0)
            .await
            .is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
