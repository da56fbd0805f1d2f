//! Image build phase.
//!
//! This module turns a build context plus a build descriptor into an
//! immutable, tagged container image: staging the context verbatim,
//! rendering the ordered build instructions, and driving the daemon build.

pub mod builder;
pub mod context;
pub mod dockerfile;

pub use builder::{BuildOutput, BuildRequest, ImageBuilder};
pub use context::{stage_context, ContextSnapshot, StagedContext};
pub use dockerfile::render_dockerfile;
