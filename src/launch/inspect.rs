//! Image inspection.
//!
//! Reads back what a build recorded in an image, so the launch contract can
//! be audited without starting a container.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::docker::DockerClient;
use crate::error::LaunchError;

/// Recorded launch metadata of a built image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    /// Image reference that was inspected.
    pub image: String,
    /// Image ID.
    pub id: Option<String>,
    /// Recorded default command (the single process a container runs).
    pub cmd: Vec<String>,
    /// Recorded entrypoint prefix, when the image sets one.
    pub entrypoint: Vec<String>,
    /// Recorded working directory.
    pub working_dir: Option<String>,
    /// Recorded image-level environment.
    pub env: Vec<String>,
    /// Image labels.
    pub labels: HashMap<String, String>,
}

/// Inspects an image's recorded configuration.
///
/// # Errors
///
/// Returns `LaunchError::ImageNotFound` when the image is absent locally.
pub async fn inspect_image(client: &DockerClient, image: &str) -> Result<ImageReport, LaunchError> {
    let inspect = client.inspect_image(image).await?;
    let config = inspect.config.unwrap_or_default();

    Ok(ImageReport {
        image: image.to_string(),
        id: inspect.id,
        cmd: config.cmd.unwrap_or_default(),
        entrypoint: config.entrypoint.unwrap_or_default(),
        working_dir: config.working_dir.filter(|w| !w.is_empty()),
        env: config.env.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
    })
}

impl ImageReport {
    /// Digest of the staged context recorded at build time, when present.
    pub fn context_digest(&self) -> Option<&str> {
        self.labels
            .get("pipewright.context.digest")
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ImageReport {
        let mut labels = HashMap::new();
        labels.insert(
            "pipewright.context.digest".to_string(),
            "deadbeef".to_string(),
        );
        ImageReport {
            image: "pipeline:latest".to_string(),
            id: Some("sha256:abc".to_string()),
            cmd: vec![
                "python".to_string(),
                "-u".to_string(),
                "run_pipeline.py".to_string(),
            ],
            entrypoint: Vec::new(),
            working_dir: Some("/app".to_string()),
            env: vec!["PYTHONUNBUFFERED=1".to_string()],
            labels,
        }
    }

    #[test]
    fn test_context_digest_lookup() {
        let report = sample_report();
        assert_eq!(report.context_digest(), Some("deadbeef"));
    }

    #[test]
    fn test_context_digest_absent() {
        let mut report = sample_report();
        report.labels.clear();
        assert_eq!(report.context_digest(), None);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_string(&sample_report()).unwrap();
        assert!(json.contains("run_pipeline.py"));
        assert!(json.contains("/app"));
    }
}
