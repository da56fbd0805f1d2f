//! Build instruction rendering.
//!
//! Renders the ordered instruction sequence for a pipeline image from a
//! build descriptor and a parsed manifest. The order is fixed: base image,
//! provenance labels, environment, working directory, verbatim context copy,
//! dependency installation, default command. The dependency layer always
//! precedes the recorded command, so no staged file can run against a
//! partially installed dependency set.

use crate::descriptor::BuildDescriptor;
use crate::manifest::Manifest;

/// Escape special characters in environment variable values.
fn escape_env_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
}

/// Escape a command argument for the JSON-form CMD instruction.
fn escape_cmd_arg(arg: &str) -> String {
    arg.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render the build instructions for a descriptor + manifest pair.
///
/// The output is deterministic: identical inputs (including the context
/// digest) produce identical text.
pub fn render_dockerfile(
    descriptor: &BuildDescriptor,
    manifest: &Manifest,
    context_digest: &str,
) -> String {
    let mut lines = Vec::new();

    // Base image
    lines.push(format!("FROM {}", descriptor.base_image));
    lines.push(String::new());

    // Provenance labels
    lines.push(format!(
        "LABEL pipewright.version=\"{}\"",
        env!("CARGO_PKG_VERSION")
    ));
    lines.push(format!(
        "LABEL pipewright.context.digest=\"{}\"",
        context_digest
    ));
    lines.push(String::new());

    // Unbuffered output for the pipeline process, then descriptor env.
    // BTreeMap ordering keeps repeated renders identical.
    lines.push("ENV PYTHONUNBUFFERED=\"1\"".to_string());
    for (key, value) in &descriptor.env {
        lines.push(format!("ENV {}=\"{}\"", key, escape_env_value(value)));
    }
    lines.push(String::new());

    // Working directory, then the whole context, nothing filtered
    lines.push(format!("WORKDIR {}", descriptor.workdir));
    lines.push(String::new());
    lines.push(format!("COPY . {}", descriptor.workdir));
    lines.push(String::new());

    // Dependency installation. A resolution failure fails this layer and
    // therefore the whole build; there is no fallback path.
    if !manifest.is_empty() {
        lines.push(format!(
            "RUN pip install --no-cache-dir -r {}",
            descriptor.manifest_path
        ));
        lines.push(String::new());
    }

    // The single recorded command, exec form, zero extra arguments
    let args: Vec<String> = descriptor
        .entrypoint
        .iter()
        .map(|a| format!("\"{}\"", escape_cmd_arg(a)))
        .collect();
    lines.push(format!("CMD [{}]", args.join(", ")));

    lines.join("\n")
}
