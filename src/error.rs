//! Error types for pipewright operations.
//!
//! Defines error types for the major subsystems:
//! - Build descriptor loading and validation
//! - Dependency manifest parsing
//! - Build context staging
//! - Image builds against the Docker daemon
//! - Container launch and exit-status propagation

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating a build descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Descriptor file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid descriptor: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while parsing a dependency manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported directive on line {line}: '{text}'")]
    UnsupportedDirective { line: usize, text: String },

    #[error("Invalid requirement on line {line}: '{text}'")]
    InvalidRequirement { line: usize, text: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while staging a build context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Build context is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Build context is empty: {0}")]
    Empty(PathBuf),

    #[error("Dependency manifest '{manifest}' not found in build context {context}")]
    ManifestMissing { manifest: String, context: PathBuf },

    #[error("Failed to walk build context: {0}")]
    Walk(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building an image.
///
/// Every variant is terminal: no image is tagged and no partial artifact
/// survives a failed build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Image build failed: {0}")]
    BuildFailed(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while launching a container.
///
/// A non-zero exit of the entrypoint process is not a `LaunchError`; it is
/// reported as a normal exit status and propagated verbatim.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Image '{0}' not found")]
    ImageNotFound(String),

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Failed to start container: {0}")]
    StartFailed(String),

    #[error("Failed to read container output: {0}")]
    LogStream(String),

    #[error("Failed to observe container exit: {0}")]
    WaitFailed(String),

    #[error("Failed to forward signal to container: {0}")]
    SignalForward(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
