//! Image Builder.
//!
//! Orchestrates one build: validate the descriptor, parse the manifest,
//! stage the context, render the instruction sequence, and drive the daemon
//! build to a tagged image. Every failure is terminal; a failed build leaves
//! no tag and no partial artifact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::build::context::ContextSnapshot;
use crate::build::dockerfile::render_dockerfile;
use crate::descriptor::BuildDescriptor;
use crate::docker::DockerClient;
use crate::error::BuildError;
use crate::manifest::Manifest;

/// One build invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Build context directory.
    pub context_dir: PathBuf,
    /// Descriptor governing the build.
    pub descriptor: BuildDescriptor,
    /// Tag to apply to the produced image.
    pub tag: String,
}

impl BuildRequest {
    /// Creates a request for a context directory with the given tag.
    pub fn new(context_dir: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            context_dir: context_dir.into(),
            descriptor: BuildDescriptor::default(),
            tag: tag.into(),
        }
    }

    /// Sets the descriptor.
    pub fn with_descriptor(mut self, descriptor: BuildDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }
}

/// Report of a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutput {
    /// Tag applied to the image.
    pub image_tag: String,
    /// Image ID reported by the daemon, when available.
    pub image_id: Option<String>,
    /// Digest of the staged context files.
    pub context_digest: String,
    /// Number of context files staged.
    pub file_count: usize,
    /// Number of requirements declared in the manifest.
    pub requirement_count: usize,
    /// When the build completed.
    pub built_at: DateTime<Utc>,
}

/// Drives image builds against the Docker daemon.
pub struct ImageBuilder {
    client: DockerClient,
}

impl ImageBuilder {
    /// Creates a builder over a connected client.
    pub fn new(client: DockerClient) -> Self {
        Self { client }
    }

    /// Runs one build to completion.
    ///
    /// The manifest is located and parsed before the daemon is contacted, so
    /// a malformed or missing manifest never reaches the build. Dependency
    /// resolution itself happens inside the daemon build; if it fails, the
    /// daemon reports an error, no tag is applied, and the error is
    /// surfaced here.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` for every failure class: bad descriptor,
    /// unreadable or empty context, missing or malformed manifest, daemon
    /// unavailable, or daemon-reported build failure.
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildOutput, BuildError> {
        let descriptor = &request.descriptor;
        descriptor.validate()?;

        let manifest = load_manifest(&request.context_dir, &descriptor.manifest_path)?;

        // Digest first so the rendered instructions can carry it as a label.
        let snapshot = ContextSnapshot::take(&request.context_dir, &descriptor.manifest_path)?;
        let dockerfile = render_dockerfile(descriptor, &manifest, &snapshot.digest);
        let staged = snapshot.pack(&dockerfile)?;

        info!(
            tag = %request.tag,
            base_image = %descriptor.base_image,
            files = staged.file_count,
            requirements = manifest.len(),
            digest = %staged.digest,
            "Building image"
        );

        let image_id = self
            .client
            .build_image(&request.tag, &staged.dockerfile_name, staged.archive)
            .await?;

        info!(tag = %request.tag, image_id = ?image_id, "Image built");

        Ok(BuildOutput {
            image_tag: request.tag.clone(),
            image_id,
            context_digest: staged.digest,
            file_count: staged.file_count,
            requirement_count: manifest.len(),
            built_at: Utc::now(),
        })
    }
}

/// Loads the manifest from its declared path inside the context.
pub fn load_manifest(context_dir: &Path, manifest_path: &str) -> Result<Manifest, BuildError> {
    let full = context_dir.join(manifest_path);
    Ok(Manifest::from_file(&full)?)
}
