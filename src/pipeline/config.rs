//! Pipeline configuration and file loading.
//!
//! [`PipelineConfig`] gathers the tuning of every stage. Every field has a
//! default, so a configuration file only needs the values it overrides.
//! [`ConfigLoader`] reads and writes it as TOML or JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use crate::core::SheetError;
use crate::pipeline::evidence::EvidenceConfig;
use crate::pipeline::recognition::RecognitionConfig;
use crate::processors::{DigitSegmenterConfig, LineSegmenterConfig, TokenExtractorConfig};

/// Configuration for the whole page pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Batches with more pages than this run in parallel.
    pub parallel_threshold: usize,
    /// Shift question ranges into answer-region coordinates using the page bboxes.
    ///
    /// Off by default: both regions are assumed to start at the same page row.
    pub align_regions_to_page: bool,
    /// Row segmentation of both regions.
    pub line_segmenter: LineSegmenterConfig,
    /// Glyph-cluster extraction in answer rows.
    pub token_extractor: TokenExtractorConfig,
    /// Digit crops within tokens.
    pub digit_segmenter: DigitSegmenterConfig,
    /// Classification, splitting and recombination.
    pub recognition: RecognitionConfig,
    /// Failure evidence rendering.
    pub evidence: EvidenceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            align_regions_to_page: false,
            line_segmenter: LineSegmenterConfig::default(),
            token_extractor: TokenExtractorConfig::default(),
            digit_segmenter: DigitSegmenterConfig::default(),
            recognition: RecognitionConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validates every stage configuration.
    pub fn validate(&self) -> Result<(), SheetError> {
        self.line_segmenter.validate()?;
        self.token_extractor.validate()?;
        self.digit_segmenter.validate()?;
        self.recognition.validate()?;
        Ok(())
    }
}

/// Configuration file format
#[derive(Debug, Clone, Copy)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration loader for the page pipeline
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, auto-detecting the format from the extension
    ///
    /// The loaded configuration is validated before it is returned.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use answer_sheet_ocr::pipeline::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("sheet.toml"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> Result<PipelineConfig, SheetError> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            SheetError::config_error(format!(
                "Unsupported config file extension: {:?}",
                path.extension()
            ))
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::load_from_string(&content, format)
    }

    /// Load and validate configuration from a string with specified format
    pub fn load_from_string(content: &str, format: ConfigFormat) -> Result<PipelineConfig, SheetError> {
        let config = match format {
            ConfigFormat::Toml => Self::load_from_toml(content)?,
            ConfigFormat::Json => Self::load_from_json(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn load_from_toml(content: &str) -> Result<PipelineConfig, SheetError> {
        toml::from_str(content)
            .map_err(|e| SheetError::config_error(format!("Failed to parse TOML config: {e}")))
    }

    /// Load configuration from JSON string
    pub fn load_from_json(content: &str) -> Result<PipelineConfig, SheetError> {
        serde_json::from_str(content)
            .map_err(|e| SheetError::config_error(format!("Failed to parse JSON config: {e}")))
    }

    /// Save configuration to a file, auto-detecting the format from the extension
    pub fn save_to_file(config: &PipelineConfig, path: &Path) -> Result<(), SheetError> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            SheetError::config_error(format!(
                "Unsupported config file extension: {:?}",
                path.extension()
            ))
        })?;

        let content = Self::save_to_string(config, format)?;

        std::fs::write(path, content).map_err(|e| {
            SheetError::config_error(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Save configuration to string with specified format
    pub fn save_to_string(config: &PipelineConfig, format: ConfigFormat) -> Result<String, SheetError> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
                SheetError::config_error(format!("Failed to serialize config to TOML: {e}"))
            }),
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                SheetError::config_error(format!("Failed to serialize config to JSON: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvidenceFormat;

    #[test]
    fn test_config_format_detection() {
        assert!(matches!(
            ConfigFormat::from_extension(Path::new("config.toml")),
            Some(ConfigFormat::Toml)
        ));
        assert!(matches!(
            ConfigFormat::from_extension(Path::new("config.json")),
            Some(ConfigFormat::Json)
        ));
        assert!(ConfigFormat::from_extension(Path::new("config.txt")).is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConfigLoader::load_from_string(
            r#"
            parallel_threshold = 16

            [recognition]
            confidence_threshold = 0.9

            [evidence]
            format = "jpeg"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.parallel_threshold, 16);
        assert!((config.recognition.confidence_threshold - 0.9).abs() < 1e-6);
        assert_eq!(config.evidence.format, EvidenceFormat::Jpeg);
        assert_eq!(config.line_segmenter, LineSegmenterConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected_on_load() {
        let err = ConfigLoader::load_from_string(
            r#"{"recognition": {"confidence_threshold": 1.5}}"#,
            ConfigFormat::Json,
        )
        .unwrap_err();
        assert!(matches!(err, SheetError::ConfigError { .. }));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.line_segmenter.merge_distance = 30;
        config.align_regions_to_page = true;

        for name in ["sheet.toml", "sheet.json"] {
            let path = dir.path().join(name);
            ConfigLoader::save_to_file(&config, &path).unwrap();
            let loaded = ConfigLoader::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.yaml");
        assert!(ConfigLoader::save_to_file(&PipelineConfig::default(), &path).is_err());
    }
}
