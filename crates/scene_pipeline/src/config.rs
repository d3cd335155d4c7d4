//! Configuration loading
//!
//! Pipeline composition and manager pacing can come from TOML or RON files
//! instead of code, keeping stage selection out of application binaries.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::foundation::math::Color;
use crate::pipeline::{CullStage, GraphicsDevice, GraphicsPipeline, HeadlessDevice, LogDevice, SortStage};

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// File-backed configuration, format-selected by extension
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Which bundled output device to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Frame-recording device with no surface
    #[default]
    Headless,
    /// Device that traces draw traffic through `log`
    Log,
}

/// Declarative pipeline and pacing setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Minimum interval between frame starts, in milliseconds
    pub minimum_frame_interval_ms: u64,
    /// Whether the paced loop starts armed
    pub start_enabled: bool,
    /// Cull stage selection
    pub cull: CullStage,
    /// Sort stage selection
    pub sort: SortStage,
    /// Bundled device selection
    pub device: DeviceKind,
    /// Device clear color used when a scene has no background
    pub clear_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            minimum_frame_interval_ms: 16,
            start_enabled: false,
            cull: CullStage::default(),
            sort: SortStage::default(),
            device: DeviceKind::default(),
            clear_color: Color::BLACK,
        }
    }
}

impl Config for RenderConfig {}

impl RenderConfig {
    /// The configured pacing interval
    #[must_use]
    pub fn minimum_frame_interval(&self) -> Duration {
        Duration::from_millis(self.minimum_frame_interval_ms)
    }

    /// Build a fully composed pipeline from this configuration
    #[must_use]
    pub fn build_pipeline(&self) -> GraphicsPipeline {
        let mut device: Box<dyn GraphicsDevice> = match self.device {
            DeviceKind::Headless => Box::new(HeadlessDevice::new()),
            DeviceKind::Log => Box::new(LogDevice::new()),
        };
        device.set_clear_color(self.clear_color);
        GraphicsPipeline::with_stages(self.cull, self.sort, device)
    }
}
