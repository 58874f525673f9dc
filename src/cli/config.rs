//! Conversion of CLI arguments into a segmentation configuration

use crate::cli::main_impl::Cli;
use crate::config::SegmentationConfig;
use anyhow::{Context, Result};

/// Layers file, environment and flag settings into one configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration for one CLI invocation
    ///
    /// Precedence, lowest first: defaults, `--config` file, `MODEL_PATH`,
    /// explicit flags.
    pub(crate) fn from_cli(cli: &Cli) -> Result<SegmentationConfig> {
        let base = match &cli.config {
            Some(path) => SegmentationConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => SegmentationConfig::default(),
        };
        let mut config = base.with_env_overrides();

        if let Some(model) = &cli.model {
            config.model_path = Some(model.clone());
        }
        if let Some(backend) = cli.backend {
            config.backend_type = backend.into();
        }
        if let Some(threshold) = cli.confidence_threshold {
            config.confidence_threshold = threshold;
        }
        if cli.threads > 0 {
            config.intra_threads = cli.threads;
        }
        if cli.no_warmup {
            config.warmup = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::main_impl::CliBackend;
    use crate::config::BackendType;
    use clap::Parser;
    use std::{ffi::OsString, path::PathBuf};

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "cutout",
            "photo.jpg",
            "--model",
            "/models/seg.onnx",
            "--backend",
            "onnx",
            "--confidence-threshold",
            "0.45",
            "--no-warmup",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.model_path, Some(PathBuf::from("/models/seg.onnx")));
        assert_eq!(config.backend_type, BackendType::Onnx);
        assert!((config.confidence_threshold - 0.45).abs() < f64::EPSILON);
        assert!(!config.warmup);
        assert_eq!(cli.backend, Some(CliBackend::Onnx));
    }

    #[test]
    fn test_config_file_is_layered_under_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutout.json");
        std::fs::write(&path, r#"{"confidence_threshold": 0.2, "max_dimension": 2000}"#).unwrap();

        let cli = Cli::parse_from([
            OsString::from("cutout"),
            OsString::from("in.png"),
            OsString::from("--config"),
            path.clone().into_os_string(),
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.max_dimension, 2000);
        assert!((config.confidence_threshold - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let cli = Cli::parse_from(["cutout", "in.png", "--confidence-threshold", "1.5"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }
}
