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
//! Persisted sampler state: the loaded sample's name and every parameter.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::param::ParamRecord;

/// Error types for reading and writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

/// What survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    /// Name of the sample that was loaded, resolved against the samples
    /// directory on restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,

    /// Parameters in walk order.
    #[serde(default)]
    pub params: Vec<ParamRecord>,
}

impl SamplerState {
    /// Reads a state file.
    pub fn load(path: &Path) -> Result<SamplerState, StateError> {
        let contents = fs::read_to_string(path)?;
        let state: SamplerState = serde_yml::from_str(&contents)?;
        debug!(
            path = ?path,
            params = state.params.len(),
            sample = ?state.sample_name,
            "Loaded sampler state"
        );
        Ok(state)
    }

    /// Writes the state file, replacing any previous contents.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let contents = serde_yml::to_string(self)?;
        fs::write(path, contents)?;
        debug!(path = ?path, params = self.params.len(), "Saved sampler state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("state.yaml");
        let state = SamplerState {
            sample_name: Some("snare".to_string()),
            params: vec![
                ParamRecord {
                    path: "sample speed".to_string(),
                    value: 1.5,
                    min: 0.0,
                    max: 5.0,
                    step: 0.01,
                },
                ParamRecord {
                    path: "Voice 3/mode".to_string(),
                    value: -2.0,
                    min: -3.0,
                    max: 2.0,
                    step: 1.0,
                },
            ],
        };
        state.save(&path).unwrap();
        assert_eq!(SamplerState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_load_without_sample() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("state.yaml");
        fs::write(
            &path,
            "params:\n  - path: Voice 0/speed\n    value: 2.0\n    min: 0.0\n    max: 5.0\n    step: 0.01\n",
        )
        .unwrap();
        let state = SamplerState::load(&path).unwrap();
        assert!(state.sample_name.is_none());
        assert_eq!(state.params.len(), 1);
        assert_eq!(state.params[0].path, "Voice 0/speed");
    }

    #[test]
    fn test_load_errors() {
        let tempdir = tempfile::tempdir().unwrap();
        let missing = tempdir.path().join("missing.yaml");
        assert!(matches!(
            SamplerState::load(&missing),
            Err(StateError::Io(_))
        ));

        let garbage = tempdir.path().join("garbage.yaml");
        fs::write(&garbage, "params: [this is: not: valid").unwrap();
        assert!(matches!(
            SamplerState::load(&garbage),
            Err(StateError::Yaml(_))
        ));
    }
}
