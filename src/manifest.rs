//! Dependency manifest parsing.
//!
//! The manifest is a requirements-format file: one package per line with an
//! optional version specifier. It is read once at build time; resolution and
//! installation happen inside the image build, never here.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// A single declared dependency: package name plus optional version
/// constraint, e.g. `requests>=2.31` or `pyyaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Package name as written, without extras or specifier.
    pub name: String,
    /// Optional extras, e.g. `security` in `requests[security]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    /// Version specifier as written, e.g. `==2.31.0` or `>=1.0,<2.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(spec) = &self.specifier {
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

/// An ordered dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Requirements in declaration order. Duplicates are kept; the resolver
    /// decides, not this layer.
    pub requirements: Vec<Requirement>,
}

fn requirement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // name [extras] [specifier], whitespace-tolerant
        Regex::new(
            r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[(?P<extras>[A-Za-z0-9._,\s-]+)\])?\s*(?P<spec>(?:==|>=|<=|~=|!=|>|<).*)?$",
        )
        .expect("requirement regex is valid")
    })
}

/// Validate a package name against a conservative character set.
///
/// Names must start with an alphanumeric character and may contain only
/// alphanumerics, hyphens, underscores, and periods. This keeps shell
/// metacharacters out of anything derived from a manifest line.
pub fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl Manifest {
    /// Parses manifest text.
    ///
    /// Blank lines and `#` comments are skipped. Option directives (`-r`,
    /// `-e`, `--index-url`, ...) are rejected: the manifest is a declarative
    /// package list, not an installer command stream.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::UnsupportedDirective` for option lines and
    /// `ManifestError::InvalidRequirement` for lines that do not parse as a
    /// requirement.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut requirements = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;

            // Strip trailing comments, then surrounding whitespace
            let content = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let content = content.trim();
            if content.is_empty() {
                continue;
            }

            if content.starts_with('-') {
                return Err(ManifestError::UnsupportedDirective {
                    line,
                    text: content.to_string(),
                });
            }

            let captures = requirement_regex().captures(content).ok_or_else(|| {
                ManifestError::InvalidRequirement {
                    line,
                    text: content.to_string(),
                }
            })?;

            let name = captures["name"].to_string();
            if !is_valid_package_name(&name) {
                return Err(ManifestError::InvalidRequirement {
                    line,
                    text: content.to_string(),
                });
            }

            let extras = captures
                .name("extras")
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|e| e.trim().to_string())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            let specifier = captures
                .name("spec")
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());

            requirements.push(Requirement {
                name,
                extras,
                specifier,
            });
        }

        Ok(Self { requirements })
    }

    /// Loads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::NotFound` if the file does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Returns true when the manifest declares no requirements.
    ///
    /// An empty manifest is valid; the build simply has nothing to install.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Number of declared requirements.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }
}
