//! Docker API wrapper using the bollard crate.
//!
//! Build-side operations (image build) report `BuildError`; container-side
//! operations report `LaunchError`. Both failure classes are terminal here:
//! nothing in this module retries.

use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::ImageInspect;
use bollard::Docker;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{BuildError, LaunchError};

/// Docker client wrapper for build and container operations.
#[derive(Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connects to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns the underlying connection error; callers map it into their
    /// phase's daemon-unavailable variant.
    pub fn connect() -> Result<Self, bollard::errors::Error> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// Creates a client from an existing bollard Docker instance.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Builds and tags an image from a packed context archive.
    ///
    /// The daemon's build stream is drained fully; any error record aborts
    /// with `BuildError::BuildFailed` and no tag is applied. There is no
    /// retry and no partial artifact.
    ///
    /// # Returns
    ///
    /// The image ID when the daemon reports one.
    pub async fn build_image(
        &self,
        tag: &str,
        dockerfile_name: &str,
        archive: Vec<u8>,
    ) -> Result<Option<String>, BuildError> {
        let options = BuildImageOptions {
            dockerfile: dockerfile_name.to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(archive.into()));
        let mut image_id = None;

        while let Some(result) = stream.next().await {
            let info =
                result.map_err(|e| BuildError::BuildFailed(format!("build stream error: {e}")))?;

            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!(target: "pipewright::build", "{line}");
                }
            }

            if let Some(error) = info.error {
                let detail = info
                    .error_detail
                    .and_then(|d| d.message)
                    .unwrap_or_default();
                return Err(BuildError::BuildFailed(if detail.is_empty() {
                    error
                } else {
                    format!("{error}: {detail}")
                }));
            }

            if let Some(bollard::models::BuildInfoAux::Default(id)) = info.aux {
                image_id = id.id;
            }
        }

        Ok(image_id)
    }

    /// Checks if an image exists locally.
    pub async fn image_exists(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    /// Inspects an image's recorded configuration.
    pub async fn inspect_image(&self, image: &str) -> Result<ImageInspect, LaunchError> {
        self.docker.inspect_image(image).await.map_err(|e| {
            if e.to_string().contains("No such image") {
                LaunchError::ImageNotFound(image.to_string())
            } else {
                LaunchError::CreateFailed(format!("Failed to inspect image: {e}"))
            }
        })
    }

    /// Creates a container from an image with no overrides.
    ///
    /// Command, working directory, and environment are all left to the
    /// image's recorded metadata; the container runs exactly what the build
    /// recorded, with zero extra arguments.
    ///
    /// # Returns
    ///
    /// The container ID on success.
    pub async fn create_container(&self, name: &str, image: &str) -> Result<String, LaunchError> {
        let config = Config::<String> {
            image: Some(image.to_string()),
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                if e.to_string().contains("No such image") {
                    LaunchError::ImageNotFound(image.to_string())
                } else {
                    LaunchError::CreateFailed(e.to_string())
                }
            })?;

        Ok(response.id)
    }

    /// Starts a container by ID.
    pub async fn start_container(&self, id: &str) -> Result<(), LaunchError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| LaunchError::StartFailed(e.to_string()))
    }

    /// Sends a signal to a running container.
    pub async fn kill_container(&self, id: &str, signal: &str) -> Result<(), LaunchError> {
        self.docker
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await
            .map_err(|e| LaunchError::SignalForward(e.to_string()))
    }

    /// Removes a container by ID.
    pub async fn remove_container(&self, id: &str, force: bool) -> Result<(), LaunchError> {
        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| LaunchError::CreateFailed(format!("Failed to remove container: {e}")))
    }

    /// Waits for a container to exit and returns its status code.
    ///
    /// The daemon reports a non-zero exit through the wait stream's error
    /// side; that is still a normal exit here, and the code is returned
    /// verbatim for propagation.
    pub async fn wait_container(&self, id: &str) -> Result<i64, LaunchError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(LaunchError::WaitFailed(e.to_string())),
            None => Err(LaunchError::WaitFailed(
                "wait stream ended without a status".to_string(),
            )),
        }
    }

    /// Follows a container's log stream, copying each chunk to this
    /// process's stdout/stderr and flushing immediately.
    ///
    /// Output therefore reaches the log sink as the entrypoint produces it,
    /// not when it exits. The stream ends when the container stops.
    pub async fn pump_logs(&self, id: &str) -> Result<(), LaunchError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                    stdout.write_all(&message).await?;
                    stdout.flush().await?;
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.write_all(&message).await?;
                    stderr.flush().await?;
                }
                Ok(LogOutput::StdIn { .. }) => {}
                Err(e) => return Err(LaunchError::LogStream(e.to_string())),
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for DockerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerClient").finish_non_exhaustive()
    }
}
