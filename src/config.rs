use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::bundle::{IndicatorParams, IndicatorSuite};
use crate::error::ConfigError;
use crate::interaction::ResizeStrategy;
use crate::render::CanvasSize;
use crate::source::fmp::FMP_BASE_URL;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_width() -> f64 {
    760.0
}

fn default_height() -> f64 {
    400.0
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

fn default_resize() -> String {
    "observer".into()
}

fn default_source_kind() -> String {
    "file".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_base_url() -> String {
    FMP_BASE_URL.into()
}

fn default_requests_per_second() -> u32 {
    5
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indicators: IndicatorParams,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChartConfig {
    /// CSS pixels
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,
    /// Accepted values: `"observer"` | `"window"`
    #[serde(default = "default_resize")]
    pub resize: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            device_pixel_ratio: default_device_pixel_ratio(),
            resize: default_resize(),
        }
    }
}

impl ChartConfig {
    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.width, self.height, self.device_pixel_ratio)
    }

    pub fn resize_strategy(&self) -> ResizeStrategy {
        ResizeStrategy::from_str(&self.resize).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Accepted values: `"file"` | `"fmp"`
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            data_dir: default_data_dir(),
            base_url: default_base_url(),
            api_key: None,
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    parse(&content)
}

/// Without a file every section takes its defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    match path {
        Some(path) => load(path),
        None => Ok(AppConfig::default()),
    }
}

pub fn parse(content: &str) -> Result<AppConfig, Report<ConfigError>> {
    let config: AppConfig = toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_SOURCE_KINDS: &[&str] = &["file", "fmp"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_chart(config)?;
    validate_source(config)?;
    validate_indicators(config)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not valid",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_chart(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let chart = &config.chart;
    let dimensions = [
        ("width", chart.width),
        ("height", chart.height),
        ("device_pixel_ratio", chart.device_pixel_ratio),
    ];
    for (name, value) in dimensions {
        if !(value.is_finite() && value > 0.0) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("chart.{name} must be > 0"),
            }));
        }
    }
    if ResizeStrategy::from_str(&chart.resize).is_none() {
        return Err(Report::new(ConfigError::Validation {
            field: format!("chart.resize \"{}\" is not valid", chart.resize),
        }));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let source = &config.source;
    if !VALID_SOURCE_KINDS.contains(&source.kind.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!("source.kind \"{}\" is not valid", source.kind),
        }));
    }
    if source.kind == "fmp" && source.api_key.as_deref().is_none_or(str::is_empty) {
        return Err(Report::new(ConfigError::Validation {
            field: "source.api_key is required for kind \"fmp\"".into(),
        }));
    }
    if source.requests_per_second == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "source.requests_per_second must be > 0".into(),
        }));
    }
    Ok(())
}

fn validate_indicators(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    IndicatorSuite::new(config.indicators).change_context(ConfigError::Validation {
        field: "indicators".into(),
    })?;
    Ok(())
}
