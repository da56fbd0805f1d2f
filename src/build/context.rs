//! Build context staging.
//!
//! The entire context directory is staged for the build: every regular file,
//! byte-for-byte, relative paths preserved, nothing filtered. A SHA-256
//! digest over the sorted (path, contents) sequence makes repeat stagings of
//! identical trees observably identical.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tar::Builder as TarBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::ContextError;

/// An enumerated, digested build context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    /// Context directory the snapshot was taken from.
    pub root: PathBuf,
    /// Relative paths of every context file, in stable sorted order.
    pub files: Vec<PathBuf>,
    /// Hex SHA-256 over the sorted (path, contents) sequence.
    pub digest: String,
}

/// A packed build context, ready to submit to the daemon.
#[derive(Debug, Clone)]
pub struct StagedContext {
    /// Gzipped tar archive of the context plus the generated build
    /// instructions.
    pub archive: Vec<u8>,
    /// Digest carried over from the snapshot.
    pub digest: String,
    /// Number of context files staged (the generated instruction file is not
    /// counted).
    pub file_count: usize,
    /// Name of the instruction file inside the archive.
    pub dockerfile_name: String,
}

impl ContextSnapshot {
    /// Takes a snapshot of a context directory.
    ///
    /// Enumerates every regular file (symlinks are followed, so a link is
    /// staged as the file it points to), verifies the dependency manifest is
    /// present at its declared relative path, and computes the digest.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::NotADirectory` for a bad context path,
    /// `ContextError::Empty` when the context holds no files, and
    /// `ContextError::ManifestMissing` when the manifest is absent. All of
    /// these abort the build before the daemon is contacted.
    pub fn take(context_dir: &Path, manifest_path: &str) -> Result<Self, ContextError> {
        if !context_dir.is_dir() {
            return Err(ContextError::NotADirectory(context_dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(context_dir)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ContextError::Walk(e.to_string()))?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(context_dir)
                    .map_err(|e| ContextError::Walk(e.to_string()))?
                    .to_path_buf();
                files.push(relative);
            }
        }

        if files.is_empty() {
            return Err(ContextError::Empty(context_dir.to_path_buf()));
        }

        if !files.iter().any(|f| f == Path::new(manifest_path)) {
            return Err(ContextError::ManifestMissing {
                manifest: manifest_path.to_string(),
                context: context_dir.to_path_buf(),
            });
        }

        let mut hasher = Sha256::new();
        for relative in &files {
            let contents = std::fs::read(context_dir.join(relative))?;
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update((contents.len() as u64).to_be_bytes());
            hasher.update(&contents);
        }

        Ok(Self {
            root: context_dir.to_path_buf(),
            files,
            digest: hex::encode(hasher.finalize()),
        })
    }

    /// Name for the generated instruction file that cannot shadow a context
    /// file.
    pub fn dockerfile_name(&self) -> String {
        if self.files.iter().any(|f| f.as_os_str() == "Dockerfile") {
            "Dockerfile.pipewright".to_string()
        } else {
            "Dockerfile".to_string()
        }
    }

    /// Packs the snapshot plus the rendered build instructions into a
    /// gzipped tar archive for the daemon.
    pub fn pack(&self, dockerfile: &str) -> Result<StagedContext, ContextError> {
        let dockerfile_name = self.dockerfile_name();

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut tar = TarBuilder::new(encoder);

        // Generated instructions first, then the context verbatim.
        let mut header = tar::Header::new_gnu();
        header.set_size(dockerfile.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, &dockerfile_name, dockerfile.as_bytes())?;

        for relative in &self.files {
            tar.append_path_with_name(self.root.join(relative), relative)?;
        }

        let encoder = tar.into_inner()?;
        let archive = encoder.finish()?;

        debug!(
            files = self.files.len(),
            digest = %self.digest,
            archive_bytes = archive.len(),
            "Staged build context"
        );

        Ok(StagedContext {
            archive,
            digest: self.digest.clone(),
            file_count: self.files.len(),
            dockerfile_name,
        })
    }
}

/// Snapshot and pack in one step.
pub fn stage_context(
    context_dir: &Path,
    manifest_path: &str,
    dockerfile: &str,
) -> Result<StagedContext, ContextError> {
    ContextSnapshot::take(context_dir, manifest_path)?.pack(dockerfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::HashMap;
    use std::io::Read;

    fn write_tree(dir: &Path, files: &[(&str, &[u8])]) {
        for (path, contents) in files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, contents).unwrap();
        }
    }

    fn unpack(archive: &[u8]) -> HashMap<String, Vec<u8>> {
        let mut entries = HashMap::new();
        let mut tar = tar::Archive::new(GzDecoder::new(archive));
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            entries.insert(path, contents);
        }
        entries
    }

    #[test]
    fn test_stage_packs_all_files_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("requirements.txt", b"pyyaml\n"),
                ("run_pipeline.py", b"print('hi')\n"),
                ("conf/coder.yaml", b"model: m\n"),
                ("data.bin", &[0u8, 159, 146, 150]),
            ],
        );

        let staged = stage_context(dir.path(), "requirements.txt", "FROM scratch\n").unwrap();
        assert_eq!(staged.file_count, 4);

        let entries = unpack(&staged.archive);
        assert_eq!(entries["requirements.txt"], b"pyyaml\n");
        assert_eq!(entries["run_pipeline.py"], b"print('hi')\n");
        assert_eq!(entries["conf/coder.yaml"], b"model: m\n");
        assert_eq!(entries["data.bin"], vec![0u8, 159, 146, 150]);
        assert_eq!(entries["Dockerfile"], b"FROM scratch\n");
    }

    #[test]
    fn test_digest_stable_across_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("requirements.txt", b"requests\n"), ("a.py", b"pass\n")],
        );

        let first = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap();
        let second = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap();
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn test_digest_changes_with_contents() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("requirements.txt", b"requests\n"), ("a.py", b"pass\n")],
        );
        let first = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap();

        std::fs::write(dir.path().join("a.py"), b"print()\n").unwrap();
        let second = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap();
        assert_ne!(first.digest, second.digest);
    }

    #[test]
    fn test_digest_unaffected_by_dockerfile_text() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("requirements.txt", b"requests\n")]);

        let snapshot = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap();
        let a = snapshot.pack("FROM a\n").unwrap();
        let b = snapshot.pack("FROM b\n").unwrap();
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_missing_manifest_fails_before_packing() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("run_pipeline.py", b"pass\n")]);

        let err = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap_err();
        assert!(matches!(err, ContextError::ManifestMissing { .. }));
    }

    #[test]
    fn test_empty_context_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContextSnapshot::take(dir.path(), "requirements.txt").unwrap_err();
        assert!(matches!(err, ContextError::Empty(_)));
    }

    #[test]
    fn test_bad_context_path() {
        let err = ContextSnapshot::take(Path::new("/nonexistent/ctx"), "requirements.txt")
            .unwrap_err();
        assert!(matches!(err, ContextError::NotADirectory(_)));
    }

    #[test]
    fn test_existing_dockerfile_is_not_shadowed() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("requirements.txt", b"requests\n"),
                ("Dockerfile", b"FROM user/own\n"),
            ],
        );

        let staged = stage_context(dir.path(), "requirements.txt", "FROM generated\n").unwrap();
        assert_eq!(staged.dockerfile_name, "Dockerfile.pipewright");

        let entries = unpack(&staged.archive);
        assert_eq!(entries["Dockerfile"], b"FROM user/own\n");
        assert_eq!(entries["Dockerfile.pipewright"], b"FROM generated\n");
    }

    #[test]
    fn test_manifest_in_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("deps/requirements.txt", b"requests\n")]);

        let snapshot = ContextSnapshot::take(dir.path(), "deps/requirements.txt").unwrap();
        assert_eq!(snapshot.files.len(), 1);
    }
}
