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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::engine::{
    sanitize_max_sounds, sanitize_volume, DEFAULT_MAX_SOUNDS, DEFAULT_VOLUME,
};
use crate::audio::modifier::reverb::{self, DEFAULT_DELAY, DEFAULT_STEPS, MAX_STEPS};
use crate::audio::modifier::ReverbModifier;

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// Master volume in [0, 1] (default: 1.0)
    volume: Option<f32>,

    /// Maximum number of instances mixed at once (default: 64)
    max_sounds: Option<usize>,

    /// The output device. The host default is used when absent.
    device: Option<String>,

    /// Reverb applied to sounds played from the command line.
    reverb: Option<ReverbConfig>,
}

impl EngineConfig {
    /// New will create a new engine configuration.
    pub fn new(volume: f32, max_sounds: usize) -> EngineConfig {
        EngineConfig {
            volume: Some(volume),
            max_sounds: Some(max_sounds),
            device: None,
            reverb: None,
        }
    }

    /// Returns the master volume, clamped to [0, 1].
    pub fn volume(&self) -> f32 {
        sanitize_volume(self.volume.unwrap_or(DEFAULT_VOLUME))
    }

    /// Returns the instance limit, clamped to [1, 256].
    pub fn max_sounds(&self) -> usize {
        sanitize_max_sounds(self.max_sounds.unwrap_or(DEFAULT_MAX_SOUNDS))
    }

    /// Returns the output device name, if one was configured.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the reverb configuration, if any.
    pub fn reverb(&self) -> Option<&ReverbConfig> {
        self.reverb.as_ref()
    }
}

/// Reverb settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ReverbConfig {
    /// Total delay across all taps as a duration string (default: 250ms)
    delay: Option<String>,

    /// Number of taps (default: 4)
    steps: Option<usize>,

    /// Gain of the first tap in [0, 1] (default: 0.5)
    volume: Option<f32>,
}

impl ReverbConfig {
    pub fn new(delay: &str, steps: usize, volume: f32) -> ReverbConfig {
        ReverbConfig {
            delay: Some(delay.to_string()),
            steps: Some(steps),
            volume: Some(volume),
        }
    }

    /// Returns the reverb delay.
    pub fn delay(&self) -> Result<Duration, ConfigError> {
        match &self.delay {
            Some(delay) => Ok(DurationString::from_string(delay.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: delay.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_DELAY),
        }
    }

    /// Returns the number of taps, clamped to [1, 64].
    pub fn steps(&self) -> usize {
        self.steps.unwrap_or(DEFAULT_STEPS).clamp(1, MAX_STEPS)
    }

    /// Returns the first tap's gain, clamped to [0, 1].
    pub fn volume(&self) -> f32 {
        reverb::sanitize_volume(self.volume.unwrap_or(reverb::DEFAULT_VOLUME))
    }

    /// Builds a reverb modifier from these settings.
    pub fn create_modifier(&self) -> Result<ReverbModifier, ConfigError> {
        Ok(ReverbModifier::new(
            self.delay()?,
            self.steps(),
            self.volume(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> EngineConfig {
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
        assert_eq!(config.volume(), 1.0);
        assert_eq!(config.max_sounds(), 64);
        assert_eq!(config.device(), None);
        assert!(config.reverb().is_none());

        let config = EngineConfig::default();
        assert_eq!(config.volume(), 1.0);
        assert_eq!(config.max_sounds(), 64);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let config = parse(
            r#"
            volume: 3.5
            max_sounds: 0
            "#,
        );
        assert_eq!(config.volume(), 1.0);
        assert_eq!(config.max_sounds(), 1);

        let config = parse("max_sounds: 5000");
        assert_eq!(config.max_sounds(), 256);
    }

    #[test]
    fn test_reverb() {
        let config = parse(
            r#"
            reverb:
              delay: 1s
              steps: 100
              volume: 0.25
            "#,
        );
        let reverb = config.reverb().unwrap();
        assert_eq!(reverb.delay().unwrap(), Duration::from_secs(1));
        assert_eq!(reverb.steps(), 64);
        assert_eq!(reverb.volume(), 0.25);

        let modifier = reverb.create_modifier().unwrap();
        assert_eq!(modifier.delay(), Duration::from_secs(1));
        assert_eq!(modifier.steps(), 64);
        assert_eq!(modifier.volume(), 0.25);
    }

    #[test]
    fn test_reverb_defaults() {
        let config = parse(
            r#"
            reverb:
              steps: 4
            "#,
        );
        let reverb = config.reverb().unwrap();
        assert_eq!(reverb.delay().unwrap(), DEFAULT_DELAY);
        assert_eq!(reverb.steps(), DEFAULT_STEPS);
        assert_eq!(reverb.volume(), 0.5);
    }

    #[test]
    fn test_invalid_reverb_delay() {
        let reverb = ReverbConfig::new("soon", 4, 0.5);
        assert!(matches!(
            reverb.delay(),
            Err(ConfigError::InvalidDuration { value, .. }) if value == "soon"
        ));
        assert!(reverb.create_modifier().is_err());
    }
}
