//! `ttpcheck.toml` project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "ttpcheck.toml";

/// Settings read from `ttpcheck.toml`. Every section is optional;
/// command-line flags override what is set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckManifest {
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// `[validation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Profile preset: lenient, standard or strict.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub warnings_as_errors: Option<bool>,
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `human` or `json`.
    #[serde(default)]
    pub format: Option<String>,
}

impl CheckManifest {
    /// Search upward from `start_dir` for `ttpcheck.toml`, parse it and
    /// return it with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: CheckManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing ttpcheck.toml")
    }

    pub fn default_profile(&self) -> Option<&str> {
        self.validation.as_ref().and_then(|v| v.profile.as_deref())
    }

    pub fn warnings_as_errors(&self) -> bool {
        self.validation
            .as_ref()
            .and_then(|v| v.warnings_as_errors)
            .unwrap_or(false)
    }

    pub fn output_format(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.format.as_deref())
    }
}
