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
use std::path::Path;

use config::{Config, File};

mod engine;
mod error;

pub use engine::{EngineConfig, ReverbConfig};
pub use error::ConfigError;

/// Parses the engine configuration from a YAML file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize::<EngineConfig>()?)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_load_engine_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(
            &path,
            r#"
            volume: 0.8
            max_sounds: 32
            device: "Built-in Output"
            reverb:
              delay: 120ms
              steps: 6
            "#,
        )
        .unwrap();

        let config = load_engine_config(&path).unwrap();
        assert_eq!(config.volume(), 0.8);
        assert_eq!(config.max_sounds(), 32);
        assert_eq!(config.device(), Some("Built-in Output"));

        let reverb = config.reverb().unwrap();
        assert_eq!(reverb.delay().unwrap(), Duration::from_millis(120));
        assert_eq!(reverb.steps(), 6);
    }

    #[test]
    fn test_load_engine_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_engine_config(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
