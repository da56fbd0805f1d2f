//! pipewright: reproducible build-and-launch envelope for pipeline containers.
//!
//! This library builds an immutable container image from a build context and
//! a dependency manifest, and launches the recorded entrypoint as the single
//! foreground process of a container, propagating its exit status.

// Core modules
pub mod build;
pub mod cli;
pub mod descriptor;
pub mod docker;
pub mod error;
pub mod launch;
pub mod manifest;

// Re-export commonly used error types
pub use error::{BuildError, ContextError, DescriptorError, LaunchError, ManifestError};
