//! Process Launcher.
//!
//! Owns a container's lifetime: exactly one foreground process, created from
//! the image's recorded metadata with no overrides, its output pumped to the
//! launcher's own streams as it appears, its exit status propagated
//! verbatim. External SIGINT/SIGTERM are forwarded to the container rather
//! than swallowed.

use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::docker::DockerClient;
use crate::error::LaunchError;

/// Lifecycle of a launched container.
///
/// There is no restarting state; restart policy is an external orchestration
/// concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    /// Container has not been started.
    NotStarted,
    /// The foreground process is running.
    Running,
    /// The foreground process exited with this status code.
    Exited(i64),
}

impl std::fmt::Display for LaunchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchState::NotStarted => write!(f, "not-started"),
            LaunchState::Running => write!(f, "running"),
            LaunchState::Exited(code) => write!(f, "exited({code})"),
        }
    }
}

/// Configuration for launching a container.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Image to launch.
    pub image: String,
    /// Container name; a unique one is generated when absent.
    pub container_name: Option<String>,
    /// Keep the exited container instead of removing it.
    pub keep_container: bool,
}

impl LaunchOptions {
    /// Creates options for an image with defaults.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            container_name: None,
            keep_container: false,
        }
    }

    /// Sets an explicit container name.
    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// Keeps the exited container for inspection.
    pub fn with_keep_container(mut self, keep: bool) -> Self {
        self.keep_container = keep;
        self
    }

    fn resolve_name(&self) -> String {
        self.container_name
            .clone()
            .unwrap_or_else(|| format!("pipeline-run-{}", Uuid::new_v4().simple()))
    }
}

/// Launches one container and owns it until exit.
pub struct Launcher {
    client: DockerClient,
    options: LaunchOptions,
    state: LaunchState,
}

impl Launcher {
    /// Creates a launcher over a connected client.
    pub fn new(client: DockerClient, options: LaunchOptions) -> Self {
        Self {
            client,
            options,
            state: LaunchState::NotStarted,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &LaunchState {
        &self.state
    }

    /// Runs the container to completion and returns its exit status.
    ///
    /// The container is created with no command, environment, or working
    /// directory overrides, so the image's recorded entrypoint runs with
    /// zero additional arguments from the working directory established at
    /// build time. A start failure (entrypoint missing or not executable)
    /// is returned immediately; it is the only error the launcher itself
    /// can observe about the process.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` for daemon failures. A non-zero exit of the
    /// process is NOT an error; the code is returned for propagation.
    pub async fn launch(&mut self) -> Result<i64, LaunchError> {
        if !self.client.image_exists(&self.options.image).await {
            return Err(LaunchError::ImageNotFound(self.options.image.clone()));
        }

        let name = self.options.resolve_name();
        let id = self
            .client
            .create_container(&name, &self.options.image)
            .await?;

        if let Err(e) = self.client.start_container(&id).await {
            // No process ever ran; remove the husk before surfacing.
            if let Err(remove_err) = self.client.remove_container(&id, true).await {
                warn!(container_id = %id, error = %remove_err, "Failed to remove unstarted container");
            }
            return Err(e);
        }

        self.state = LaunchState::Running;
        info!(container_id = %id, image = %self.options.image, "Container started");

        // One log pump; it ends on its own when the container stops.
        let log_client = self.client.clone();
        let log_id = id.clone();
        let pump = tokio::spawn(async move { log_client.pump_logs(&log_id).await });

        let wait_result = self.wait_forwarding_signals(&id).await;

        match pump.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(container_id = %id, error = %e, "Log stream ended with error"),
            Err(e) => warn!(container_id = %id, error = %e, "Log pump task failed"),
        }

        let code = wait_result?;
        self.state = LaunchState::Exited(code);
        info!(container_id = %id, exit_code = code, "Container exited");

        if !self.options.keep_container {
            if let Err(e) = self.client.remove_container(&id, true).await {
                warn!(container_id = %id, error = %e, "Failed to remove container");
            }
        }

        Ok(code)
    }

    /// Waits for the container to exit while forwarding SIGINT/SIGTERM.
    ///
    /// A forwarded signal does not end the wait; whatever exit status the
    /// process reaches afterwards (for example 137 after an external kill)
    /// is the one propagated.
    async fn wait_forwarding_signals(&self, id: &str) -> Result<i64, LaunchError> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let wait = self.client.wait_container(id);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                code = &mut wait => return code,
                _ = sigint.recv() => self.forward_signal(id, "SIGINT").await,
                _ = sigterm.recv() => self.forward_signal(id, "SIGTERM").await,
            }
        }
    }

    async fn forward_signal(&self, id: &str, signal_name: &str) {
        info!(container_id = %id, signal = signal_name, "Forwarding signal to container");
        if let Err(e) = self.client.kill_container(id, signal_name).await {
            // The container may already have exited; the wait reports the
            // final status either way.
            warn!(container_id = %id, signal = signal_name, error = %e, "Signal forward failed");
        }
    }
}

/// Exit code for a launch failure, following the convention used by
/// container runtimes: 127 for a missing entrypoint, 126 for a
/// non-executable one, 125 for any other launcher-side failure.
pub fn failure_exit_code(error: &LaunchError) -> i32 {
    match error {
        LaunchError::StartFailed(message) => {
            let message = message.to_lowercase();
            if message.contains("executable file not found")
                || message.contains("no such file or directory")
            {
                127
            } else if message.contains("permission denied") {
                126
            } else {
                125
            }
        }
        _ => 125,
    }
}
