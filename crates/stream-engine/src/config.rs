//! Configuration types for pipelines

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};
use crate::split::SplitStrategy;

/// Pipeline-wide behaviour switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Check that the parts produced by the passes of a streaming run cover
    /// the whole request
    pub verify_tiling: bool,
    /// New node outputs are released once their consumer has read them
    pub release_data_by_default: bool,
    /// Emit per-pass events in addition to run start/end events
    pub pass_events: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verify_tiling: true,
            release_data_by_default: false,
            pass_events: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded pipeline config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }
}

/// Division settings for streaming nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamingOptions {
    /// Number of pieces to ask for; the strategy may use fewer
    pub divisions: u64,
    /// How the requested region is divided
    pub strategy: SplitStrategy,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            divisions: 10,
            strategy: SplitStrategy::Slab,
        }
    }
}

impl StreamingOptions {
    pub fn new(divisions: u64, strategy: SplitStrategy) -> Result<Self> {
        let options = Self { divisions, strategy };
        options.validate()?;
        Ok(options)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.divisions == 0 {
            return Err(StreamError::InvalidConfig(
                "divisions must be at least 1".to_string(),
            ));
        }
        if self.divisions > i64::MAX as u64 {
            return Err(StreamError::InvalidConfig(format!(
                "divisions must not exceed {}",
                i64::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PipelineConfig::from_json_str(r#"{"passEvents": false}"#).unwrap();
        assert!(config.verify_tiling);
        assert!(!config.release_data_by_default);
        assert!(!config.pass_events);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"verifyTiling": false, "releaseDataByDefault": true}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert!(!config.verify_tiling);
        assert!(config.release_data_by_default);
        assert!(config.pass_events);

        assert!(PipelineConfig::from_file(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_streaming_options() {
        let options = StreamingOptions::from_json_str(r#"{"divisions": 4, "strategy": "tile"}"#).unwrap();
        assert_eq!(options, StreamingOptions::new(4, SplitStrategy::Tile).unwrap());

        let err = StreamingOptions::from_json_str(r#"{"divisions": 0}"#).unwrap_err();
        assert!(matches!(err, StreamError::InvalidConfig(_)));
        assert!(StreamingOptions::from_json_str(r#"{"strategy": "spiral"}"#).is_err());
    }
}
