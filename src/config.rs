// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;

pub use self::audio::Audio;
pub use self::error::ConfigError;

mod audio;
mod error;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BLOCK_SIZE: usize = 256;
const DEFAULT_MAX_SAMPLE_SECONDS: u32 = 60;
const DEFAULT_SAMPLES_DIR: &str = "samples";

/// A YAML representation of the sampler configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SamplerConfig {
    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames rendered per audio block (default: 256).
    block_size: Option<usize>,

    /// Longest sample accepted, in seconds at the output rate (default: 60).
    max_sample_seconds: Option<u32>,

    /// Directory that named samples are resolved against (default: "samples").
    samples_dir: Option<String>,

    /// Name of the sample to load at startup.
    sample: Option<String>,

    /// Where voice parameters are persisted.
    state_file: Option<String>,

    /// Audio output configuration.
    audio: Option<Audio>,
}

impl SamplerConfig {
    /// Parse a sampler configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SamplerConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SamplerConfig>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.block_size == Some(0) {
            return Err(ConfigError::Invalid {
                field: "block_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the block size in frames (default: 256).
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the sample capacity in frames.
    pub fn max_sample_frames(&self) -> usize {
        self.max_sample_seconds.unwrap_or(DEFAULT_MAX_SAMPLE_SECONDS) as usize
            * self.sample_rate() as usize
    }

    /// Returns the samples directory.
    pub fn samples_dir(&self) -> PathBuf {
        PathBuf::from(
            self.samples_dir
                .as_deref()
                .unwrap_or(DEFAULT_SAMPLES_DIR),
        )
    }

    /// Returns the sample to load at startup, if any.
    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    /// Returns the parameter state file, if any.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.state_file.as_ref().map(PathBuf::from)
    }

    /// Returns the audio output configuration, if any.
    pub fn audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }

    /// Overrides the samples directory.
    pub fn with_samples_dir(mut self, samples_dir: &Path) -> Self {
        self.samples_dir = Some(samples_dir.to_string_lossy().to_string());
        self
    }

    /// Overrides the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Overrides the output sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Overrides the sample capacity.
    pub fn with_max_sample_seconds(mut self, seconds: u32) -> Self {
        self.max_sample_seconds = Some(seconds);
        self
    }

    /// Overrides the parameter state file.
    pub fn with_state_file(mut self, state_file: &Path) -> Self {
        self.state_file = Some(state_file.to_string_lossy().to_string());
        self
    }

    /// Overrides the startup sample.
    pub fn with_sample(mut self, sample: &str) -> Self {
        self.sample = Some(sample.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> SamplerConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("{}");
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.block_size(), 256);
        assert_eq!(config.max_sample_frames(), 60 * 44100);
        assert_eq!(config.samples_dir(), PathBuf::from("samples"));
        assert!(config.sample().is_none());
        assert!(config.state_file().is_none());
        assert!(config.audio().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            sample_rate: 48000
            block_size: 128
            max_sample_seconds: 10
            samples_dir: /opt/kits
            sample: kick
            state_file: /var/lib/sampler.yaml
            audio:
              device: UltraLite-mk5
              channels: 4
        "#,
        );
        assert_eq!(config.sample_rate(), 48000);
        assert_eq!(config.block_size(), 128);
        assert_eq!(config.max_sample_frames(), 480000);
        assert_eq!(config.samples_dir(), PathBuf::from("/opt/kits"));
        assert_eq!(config.sample(), Some("kick"));
        assert_eq!(
            config.state_file(),
            Some(PathBuf::from("/var/lib/sampler.yaml"))
        );
        let audio = config.audio().unwrap();
        assert_eq!(audio.device(), "UltraLite-mk5");
        assert_eq!(audio.channels(), 4);
    }

    #[test]
    fn test_deserialize_rejects_zero_block_size() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("sampler.yaml");
        std::fs::write(&path, "block_size: 0\n").unwrap();
        match SamplerConfig::deserialize(&path) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "block_size"),
            other => panic!("expected invalid block size, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_missing_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let result = SamplerConfig::deserialize(&tempdir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
