//! Docker daemon access.
//!
//! A thin wrapper over the bollard crate covering exactly the operations the
//! build and launch phases need.

pub mod client;

pub use client::DockerClient;
