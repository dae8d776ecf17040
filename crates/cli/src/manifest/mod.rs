use std::{fs, path::Path};

use commerce_helcim_types::{GatewayConfig, MANIFEST_FILE_NAME};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Gateway manifest file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Gateway configurations keyed by name (e.g. "helcim", "helcim_live")
    #[serde(default)]
    pub gateways: IndexMap<String, GatewayConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadManifestError {
    #[error("{} not found at {}. Please create a {} file in your project root.",
        MANIFEST_FILE_NAME,
        .0.display(),
        MANIFEST_FILE_NAME)]
    FileNotFound(std::path::PathBuf),
    #[error("Failed to read {}: {}", .0.display(), .1)]
    ReadError(std::path::PathBuf, std::io::Error),
    #[error("Failed to parse {}: {}", .0.display(), .1)]
    ParseError(std::path::PathBuf, serde_yml::Error),
}

impl Manifest {
    /// Load manifest from the specified file path
    pub fn load(manifest_file_path: &Path) -> Result<Self, LoadManifestError> {
        if !manifest_file_path.exists() {
            return Err(LoadManifestError::FileNotFound(
                manifest_file_path.to_path_buf(),
            ));
        }

        let content = fs::read_to_string(manifest_file_path)
            .map_err(|e| LoadManifestError::ReadError(manifest_file_path.to_path_buf(), e))?;

        serde_yml::from_str(&content)
            .map_err(|e| LoadManifestError::ParseError(manifest_file_path.to_path_buf(), e))
    }

    /// Get a gateway by name, or the first one declared when no name is given
    pub fn get_gateway(&self, name: Option<&str>) -> Option<(&str, &GatewayConfig)> {
        match name {
            Some(name) => self
                .gateways
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v)),
            None => self.gateways.first().map(|(k, v)| (k.as_str(), v)),
        }
    }
}
