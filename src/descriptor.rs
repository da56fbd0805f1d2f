//! Build descriptor for the pipeline container.
//!
//! The descriptor declares the complete build-and-launch envelope: base
//! runtime image, working directory, dependency manifest location, default
//! entrypoint, and image-level environment. Defaults reproduce the stock
//! pipeline container layout.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Default base runtime image.
pub const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim";

/// Default working directory inside the image.
pub const DEFAULT_WORKDIR: &str = "/app";

/// Default manifest path, relative to the build context root.
pub const DEFAULT_MANIFEST_PATH: &str = "requirements.txt";

/// Default descriptor file name looked up in the build context.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "pipewright.yaml";

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

fn default_workdir() -> String {
    DEFAULT_WORKDIR.to_string()
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

fn default_entrypoint() -> Vec<String> {
    vec![
        "python".to_string(),
        "-u".to_string(),
        "run_pipeline.py".to_string(),
    ]
}

/// Declarative description of the image to build.
///
/// Read once at build time; a produced image is never mutated, only
/// superseded by a later build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDescriptor {
    /// Base image reference (name + tag).
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Working directory inside the image. All staged files land here and
    /// the entrypoint runs from here.
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// Path of the dependency manifest, relative to the context root.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// The single default command recorded in the image. Invoked with no
    /// additional arguments at container start.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: Vec<String>,

    /// Extra image-level environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for BuildDescriptor {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            workdir: default_workdir(),
            manifest_path: default_manifest_path(),
            entrypoint: default_entrypoint(),
            env: BTreeMap::new(),
        }
    }
}

impl BuildDescriptor {
    /// Loads a descriptor from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `DescriptorError::NotFound` if the file does not exist, and
    /// `DescriptorError::Yaml` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        if !path.is_file() {
            return Err(DescriptorError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let descriptor: Self = serde_yaml::from_str(&text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Loads the descriptor governing a build context.
    ///
    /// An explicit path must exist. Without one, `pipewright.yaml` inside
    /// the context is used when present, otherwise the defaults apply.
    pub fn resolve(context: &Path, explicit: Option<&Path>) -> Result<Self, DescriptorError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let candidate = context.join(DEFAULT_DESCRIPTOR_FILE);
                if candidate.is_file() {
                    Self::from_file(&candidate)
                } else {
                    let descriptor = Self::default();
                    descriptor.validate()?;
                    Ok(descriptor)
                }
            }
        }
    }

    /// Sets the base image reference.
    pub fn with_base_image(mut self, image: impl Into<String>) -> Self {
        self.base_image = image.into();
        self
    }

    /// Sets the working directory.
    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Sets the manifest path.
    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Sets the entrypoint command.
    pub fn with_entrypoint(mut self, entrypoint: Vec<String>) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `DescriptorError::Invalid` if the image reference is empty,
    /// the workdir is not absolute, the manifest path is absolute or escapes
    /// the context, or the entrypoint is empty.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.base_image.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "base_image must not be empty".to_string(),
            ));
        }
        if !self.workdir.starts_with('/') {
            return Err(DescriptorError::Invalid(format!(
                "workdir must be an absolute path, got '{}'",
                self.workdir
            )));
        }
        if self.manifest_path.trim().is_empty() || self.manifest_path.starts_with('/') {
            return Err(DescriptorError::Invalid(format!(
                "manifest_path must be relative to the context root, got '{}'",
                self.manifest_path
            )));
        }
        if Path::new(&self.manifest_path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(DescriptorError::Invalid(format!(
                "manifest_path must not escape the context: '{}'",
                self.manifest_path
            )));
        }
        if self.entrypoint.is_empty() || self.entrypoint.iter().any(|a| a.trim().is_empty()) {
            return Err(DescriptorError::Invalid(
                "entrypoint must be a non-empty command".to_string(),
            ));
        }
        Ok(())
    }
}
