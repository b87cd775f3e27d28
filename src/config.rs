//! Configuration for stamping.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signatures::SignOptions;

/// Subdirectory of the documents directory that receives stamped files.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "PDFApp/Signed";

/// Stamping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampConfig {
    /// Root of the user's documents.
    pub documents_dir: PathBuf,

    /// Path under `documents_dir` where output files are written.
    pub output_subdir: PathBuf,

    /// Raster pixels per view unit.
    pub pixel_density: f32,

    /// Options for signed output.
    pub sign_options: SignOptions,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl StampConfig {
    /// Create a configuration writing under `documents_dir`.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            output_subdir: PathBuf::from(DEFAULT_OUTPUT_SUBDIR),
            pixel_density: 1.0,
            sign_options: SignOptions::default(),
        }
    }

    /// Set the output subdirectory.
    pub fn with_output_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.output_subdir = subdir.into();
        self
    }

    /// Set the raster density.
    pub fn with_pixel_density(mut self, density: f32) -> Self {
        self.pixel_density = density;
        self
    }

    /// Set the signing options.
    pub fn with_sign_options(mut self, options: SignOptions) -> Self {
        self.sign_options = options;
        self
    }

    /// Directory that receives output files.
    pub fn output_dir(&self) -> PathBuf {
        self.documents_dir.join(&self.output_subdir)
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ProcessingError(format!("invalid stamp configuration: {}", e)))
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::ProcessingError(format!("cannot read configuration {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::ProcessingError(format!("cannot serialize configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StampConfig::new("/home/user/Documents");
        assert_eq!(config.output_subdir, PathBuf::from("PDFApp/Signed"));
        assert_eq!(config.pixel_density, 1.0);
        assert_eq!(config.sign_options.estimated_size, 8192);
        assert_eq!(
            config.output_dir(),
            PathBuf::from("/home/user/Documents/PDFApp/Signed")
        );
    }

    #[test]
    fn test_json_round_trip_keeps_overrides() {
        let config = StampConfig::new("/tmp/docs")
            .with_pixel_density(2.0)
            .with_sign_options(SignOptions::default().with_reason("Approved"));
        let parsed = StampConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StampConfig::from_json(r#"{"documents_dir": "/data", "pixel_density": 3.0}"#).unwrap();
        assert_eq!(config.documents_dir, PathBuf::from("/data"));
        assert_eq!(config.pixel_density, 3.0);
        assert_eq!(config.output_subdir, PathBuf::from(DEFAULT_OUTPUT_SUBDIR));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StampConfig::from_json("{not json"),
            Err(Error::ProcessingError(_))
        ));
    }
}
