//! Container launch phase.
//!
//! Starts the single foreground process a built image records, streams its
//! output unbuffered, forwards external termination signals, and propagates
//! its exit status.

pub mod inspect;
pub mod launcher;

pub use inspect::{inspect_image, ImageReport};
pub use launcher::{failure_exit_code, LaunchOptions, LaunchState, Launcher};
