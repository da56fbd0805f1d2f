//! Integration tests for the build-and-launch contract.
//!
//! These tests require a reachable Docker daemon and network access for base
//! image pulls. Run with: cargo test --test docker_contract -- --ignored

use std::path::Path;

use pipewright::build::{BuildRequest, ImageBuilder};
use pipewright::descriptor::BuildDescriptor;
use pipewright::docker::DockerClient;
use pipewright::error::BuildError;
use pipewright::launch::{inspect_image, LaunchOptions, Launcher};

fn client() -> DockerClient {
    DockerClient::connect().expect("Docker daemon must be reachable for integration tests")
}

fn write_context(dir: &Path, manifest: &str, files: &[(&str, &str)]) {
    std::fs::write(dir.join("requirements.txt"), manifest).unwrap();
    for (path, contents) in files {
        std::fs::write(dir.join(path), contents).unwrap();
    }
}

/// Busybox-based descriptor: no pip in the base image, so the manifest must
/// stay empty and the install layer must be skipped.
fn busybox_descriptor(entrypoint: &[&str]) -> BuildDescriptor {
    BuildDescriptor::default()
        .with_base_image("busybox:1.36")
        .with_entrypoint(entrypoint.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
#[ignore] // Run with: cargo test --test docker_contract -- --ignored
async fn test_build_then_run_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_context(dir.path(), "", &[("run_pipeline.py", "unused\n")]);

    let builder = ImageBuilder::new(client());
    let request = BuildRequest::new(dir.path(), "pipewright-it-zero:latest")
        .with_descriptor(busybox_descriptor(&["sh", "-c", "echo started; exit 0"]));

    let output = builder.build(&request).await.expect("build should succeed");
    assert_eq!(output.requirement_count, 0);

    let mut launcher = Launcher::new(
        client(),
        LaunchOptions::new("pipewright-it-zero:latest"),
    );
    let code = launcher.launch().await.expect("launch should succeed");
    assert_eq!(code, 0);
}

#[tokio::test]
#[ignore]
async fn test_nonzero_exit_code_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_context(dir.path(), "", &[]);

    let builder = ImageBuilder::new(client());
    let request = BuildRequest::new(dir.path(), "pipewright-it-seven:latest")
        .with_descriptor(busybox_descriptor(&["sh", "-c", "exit 7"]));
    builder.build(&request).await.expect("build should succeed");

    let mut launcher = Launcher::new(
        client(),
        LaunchOptions::new("pipewright-it-seven:latest"),
    );
    let code = launcher.launch().await.expect("launch should succeed");
    assert_eq!(code, 7);
}

#[tokio::test]
#[ignore]
async fn test_external_kill_reports_137() {
    let dir = tempfile::tempdir().unwrap();
    write_context(dir.path(), "", &[]);

    let builder = ImageBuilder::new(client());
    let request = BuildRequest::new(dir.path(), "pipewright-it-kill:latest")
        .with_descriptor(busybox_descriptor(&["sleep", "60"]));
    builder.build(&request).await.expect("build should succeed");

    let name = "pipewright-it-kill-run";
    let mut launcher = Launcher::new(
        client(),
        LaunchOptions::new("pipewright-it-kill:latest").with_container_name(name),
    );
    let handle = tokio::spawn(async move { launcher.launch().await });

    // Give the container time to start, then terminate it externally.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    client()
        .kill_container(name, "SIGKILL")
        .await
        .expect("kill should reach the running container");

    let code = handle
        .await
        .expect("launch task should not panic")
        .expect("launch should report the exit status");
    assert_eq!(code, 137);
}

#[tokio::test]
#[ignore]
async fn test_unresolvable_manifest_fails_build_and_leaves_no_image() {
    let dir = tempfile::tempdir().unwrap();
    write_context(
        dir.path(),
        "pipewright-no-such-package-zz9==99.99.99\n",
        &[("run_pipeline.py", "print('never')\n")],
    );

    let tag = "pipewright-it-badmanifest:latest";
    let builder = ImageBuilder::new(client());
    let request = BuildRequest::new(dir.path(), tag);

    let err = builder.build(&request).await.expect_err("build must fail");
    assert!(matches!(err, BuildError::BuildFailed(_)), "got: {err}");

    assert!(
        !client().image_exists(tag).await,
        "a failed build must not leave a usable image"
    );
}

#[tokio::test]
#[ignore]
async fn test_image_records_entrypoint_workdir_and_digest() {
    let dir = tempfile::tempdir().unwrap();
    write_context(dir.path(), "", &[("run_pipeline.py", "unused\n")]);

    let tag = "pipewright-it-inspect:latest";
    let builder = ImageBuilder::new(client());
    let request = BuildRequest::new(dir.path(), tag)
        .with_descriptor(busybox_descriptor(&["sh", "-c", "true"]));
    let output = builder.build(&request).await.expect("build should succeed");

    let report = inspect_image(&client(), tag)
        .await
        .expect("inspect should succeed");

    assert_eq!(report.cmd, vec!["sh", "-c", "true"]);
    assert_eq!(report.working_dir.as_deref(), Some("/app"));
    assert_eq!(report.context_digest(), Some(output.context_digest.as_str()));
    assert!(report
        .env
        .iter()
        .any(|e| e == "PYTHONUNBUFFERED=1"));
}

#[tokio::test]
#[ignore]
async fn test_missing_image_is_a_launch_error() {
    let mut launcher = Launcher::new(
        client(),
        LaunchOptions::new("pipewright-it-missing:never-built"),
    );
    let err = launcher.launch().await.expect_err("launch must fail");
    assert!(matches!(
        err,
        pipewright::error::LaunchError::ImageNotFound(_)
    ));
}
