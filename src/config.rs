use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{OutputExtension, ResizeFilter};

/// Main configuration structure loaded from config files
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub general: Option<GeneralConfig>,
    pub compression: Option<CompressionConfig>,
    pub output: Option<OutputConfig>,
    pub profiles: Option<HashMap<String, ProfileConfig>>,
}

/// Configuration profile for predefined settings
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileConfig {
    pub description: Option<String>,
    pub quality: Option<u8>,
    pub scale: Option<f64>,
    pub extension: Option<String>,
    pub filter: Option<String>,
}

/// General configuration options
#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub input_dir: Option<String>,
    pub output_dir: Option<String>,
    pub dry_run: Option<bool>,
}

/// Compression-related configuration
#[derive(Debug, Deserialize)]
pub struct CompressionConfig {
    pub quality: Option<u8>,
    pub scale: Option<f64>,
    pub extension: Option<String>,
    pub filter: Option<String>,
}

/// Output and reporting configuration
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub verbose: Option<bool>,
    pub quiet: Option<bool>,
    pub generate_report: Option<bool>,
    pub report_format: Option<String>,
}

impl Config {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Location of the per-user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("imgshrink").join("config.toml"))
    }

    /// Load the per-user config file if one exists
    pub fn discover() -> Result<Option<Self>> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    /// Look up a named profile
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig> {
        self.profiles
            .as_ref()
            .and_then(|profiles| profiles.get(name))
            .ok_or_else(|| anyhow!("Unknown profile: {name}"))
    }

    /// Layer the file's settings, then the named profile, over `params`
    pub fn apply(&self, mut params: JobParameters, profile: Option<&str>) -> Result<JobParameters> {
        if let Some(general) = &self.general {
            if let Some(input_dir) = &general.input_dir {
                params.input_dir = PathBuf::from(input_dir);
            }
            if let Some(output_dir) = &general.output_dir {
                params.output_dir = Some(PathBuf::from(output_dir));
            }
            if let Some(dry_run) = general.dry_run {
                params.dry_run = dry_run;
            }
        }

        if let Some(compression) = &self.compression {
            params = apply_compression(
                params,
                compression.quality,
                compression.scale,
                compression.extension.as_deref(),
                compression.filter.as_deref(),
            )?;
        }

        if let Some(name) = profile {
            let profile = self.profile(name)?;
            params = apply_compression(
                params,
                profile.quality,
                profile.scale,
                profile.extension.as_deref(),
                profile.filter.as_deref(),
            )
            .with_context(|| format!("Invalid profile: {name}"))?;
        }

        Ok(params)
    }
}

fn apply_compression(
    mut params: JobParameters,
    quality: Option<u8>,
    scale: Option<f64>,
    extension: Option<&str>,
    filter: Option<&str>,
) -> Result<JobParameters> {
    if let Some(quality) = quality {
        params.quality = quality;
    }
    if let Some(scale) = scale {
        params.scale = scale;
    }
    if let Some(extension) = extension {
        params.extension = extension.parse()?;
    }
    if let Some(filter) = filter {
        params.filter = filter.parse()?;
    }
    Ok(params)
}

/// Rejected job parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Quality must be between 1 and 100, got {0}")]
    QualityOutOfRange(u8),

    #[error("Scale must be greater than 0 and at most 1, got {0}")]
    ScaleOutOfRange(f64),

    #[error("No input directory given")]
    MissingInput,
}

/// Parameters of a single run
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    pub input_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub quality: u8,
    pub scale: f64,
    pub extension: OutputExtension,
    pub filter: ResizeFilter,
    pub dry_run: bool,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: None,
            quality: 80,
            scale: 0.5,
            extension: OutputExtension::default(),
            filter: ResizeFilter::default(),
            dry_run: false,
        }
    }
}

impl JobParameters {
    /// Create new job parameters with default quality and scale
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            input_dir,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = Some(output_dir);
        self
    }

    pub fn with_extension(mut self, extension: OutputExtension) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get the effective output directory (calculated if not set)
    pub fn get_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join("imgshrink_output"))
    }

    /// Check ranges before any file is touched
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(ParameterError::MissingInput);
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ParameterError::QualityOutOfRange(self.quality));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 1.0 {
            return Err(ParameterError::ScaleOutOfRange(self.scale));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[general]
input_dir = "photos"
dry_run = true

[compression]
quality = 70
scale = 0.4
extension = "jpg"

[profiles.thumbnail]
description = "Tiny previews"
quality = 60
scale = 0.1
filter = "lanczos3"
"#;

    #[test]
    fn validate_rejects_out_of_range_values() {
        let params = JobParameters::new(PathBuf::from("in"));
        assert!(params.validate().is_ok());

        assert_eq!(
            params.clone().with_quality(0).validate(),
            Err(ParameterError::QualityOutOfRange(0))
        );
        assert_eq!(
            params.clone().with_quality(101).validate(),
            Err(ParameterError::QualityOutOfRange(101))
        );
        for scale in [0.0, -0.5, 1.5] {
            assert_eq!(
                params.clone().with_scale(scale).validate(),
                Err(ParameterError::ScaleOutOfRange(scale))
            );
        }
        assert!(params.clone().with_scale(f64::NAN).validate().is_err());
        assert!(params.clone().with_scale(1.0).with_quality(100).validate().is_ok());
        assert_eq!(
            JobParameters::default().validate(),
            Err(ParameterError::MissingInput)
        );
    }

    #[test]
    fn output_dir_defaults_inside_input() {
        let params = JobParameters::new(PathBuf::from("in"));
        assert_eq!(params.get_output_dir(), PathBuf::from("in").join("imgshrink_output"));
        let params = params.with_output_dir(PathBuf::from("out"));
        assert_eq!(params.get_output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn config_sections_then_profile_override_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        let params = config.apply(JobParameters::default(), None).unwrap();
        assert_eq!(params.input_dir, PathBuf::from("photos"));
        assert!(params.dry_run);
        assert_eq!(params.quality, 70);
        assert_eq!(params.scale, 0.4);
        assert_eq!(params.extension, OutputExtension::Jpg);
        assert_eq!(params.filter, ResizeFilter::Triangle);

        let params = config
            .apply(JobParameters::default(), Some("thumbnail"))
            .unwrap();
        assert_eq!(params.quality, 60);
        assert_eq!(params.scale, 0.1);
        assert_eq!(params.extension, OutputExtension::Jpg);
        assert_eq!(params.filter, ResizeFilter::Lanczos3);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let err = config
            .apply(JobParameters::default(), Some("poster"))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown profile: poster"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.profile("thumbnail").is_ok());
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
