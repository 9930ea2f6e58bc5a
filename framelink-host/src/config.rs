//! Configuration loading
//!
//! Reads a TOML file into a [`LinkConfig`] and validates it into the types
//! the link runs on. Every section is optional; missing sections and keys
//! take the GYJ-0122 defaults.
//!
//! ```toml
//! [serial]
//! path = "/dev/ttyUSB0"
//! baudrate = 9600
//!
//! [frame]
//! header = [0x3C]
//! tail = [0x3E]
//! command_offset = 2
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use framelink_core::LinkConfig;
use framelink_protocol::{FrameSpec, SequenceCounter, SequenceError, SpecError};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// File is not valid TOML or does not match the schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Frame section describes an impossible layout
    #[error("invalid frame layout: {0}")]
    Spec(SpecError),
    /// Sequence section is an empty range
    #[error("invalid sequence range: {0}")]
    Sequence(SequenceError),
}

impl From<SpecError> for ConfigError {
    fn from(e: SpecError) -> Self {
        ConfigError::Spec(e)
    }
}

impl From<SequenceError> for ConfigError {
    fn from(e: SequenceError) -> Self {
        ConfigError::Sequence(e)
    }
}

/// Configuration together with its validated parts
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LinkConfig,
    pub spec: FrameSpec,
    pub sequence: SequenceCounter,
}

impl LoadedConfig {
    /// Validate an already deserialized configuration
    pub fn validate(config: LinkConfig) -> Result<Self, ConfigError> {
        let spec = config.frame_spec()?;
        let sequence = config.sequence_counter()?;
        Ok(Self {
            config,
            spec,
            sequence,
        })
    }
}

/// Parse TOML text
pub fn parse(text: &str) -> Result<LoadedConfig, ConfigError> {
    let config: LinkConfig = toml::from_str(text)?;
    LoadedConfig::validate(config)
}

/// Load and validate a configuration file
pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
    info!(path = %path.display(), "loading configuration");
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse(&text)?;
    log_config_summary(&loaded);
    Ok(loaded)
}

/// Load `path` if given, otherwise use the defaults
pub fn load_or_default(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    match path {
        Some(path) => load(path),
        None => {
            info!("no configuration file given, using defaults");
            let loaded = LoadedConfig::validate(LinkConfig::default())?;
            log_config_summary(&loaded);
            Ok(loaded)
        }
    }
}

fn log_config_summary(loaded: &LoadedConfig) {
    let serial = &loaded.config.serial;
    let spec = &loaded.spec;
    info!(
        port = serial.path.as_str(),
        baudrate = serial.baudrate,
        "configuration loaded"
    );
    debug!(
        data_bits = u8::from(serial.data_bits),
        parity = ?serial.parity,
        stop_bits = u8::from(serial.stop_bits),
        minimum_read_size = serial.minimum_read_size,
        timeout_ms = serial.timeout_ms,
        "serial settings"
    );
    debug!(
        header = ?spec.header(),
        tail = ?spec.tail(),
        length = ?spec.length_field(),
        command = ?spec.command_field(),
        data_offset = spec.data_offset(),
        data_size = spec.data_size(),
        max_frame_length = spec.max_frame_length(),
        "frame layout"
    );
    debug!(
        start = loaded.config.sequence.start,
        end = loaded.config.sequence.end,
        read_chunk = loaded.config.link.read_chunk,
        request_attempts = loaded.config.link.request_attempts,
        "link settings"
    );
}
