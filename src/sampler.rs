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
//! The multi-voice drum sampler.
use tracing::{info, warn};

use crate::config::SamplerConfig;
use crate::state::SamplerState;

mod buffer;
mod engine;
mod error;
pub mod loader;
mod voice;
mod worker;

pub use buffer::{BufferHandle, SampleBuffer};
pub use engine::{
    LoadReport, RestoreOutcome, Sampler, SamplerEngine, SamplerHandle, SamplerParams,
};
pub use error::{LoadError, SamplerError};
pub use voice::{PlayMode, Voice, VoiceParams, VoiceSettings, IDLE, NUM_VOICES};
pub use worker::{LoadOutcome, LoadRequest, LoadWorker};

/// Builds the sampler, loads the configured sample and restores saved
/// parameters. Load and restore failures are logged; the sampler starts with
/// whatever succeeded.
pub fn init(config: &SamplerConfig) -> Result<(SamplerHandle, SamplerEngine), SamplerError> {
    let (handle, engine) = Sampler::build(config)?;

    if let Some(sample) = config.sample() {
        if let Err(e) = handle.load_named(sample) {
            warn!(sample, err = %e, "Unable to load startup sample");
        }
    }

    if let Some(state_file) = config.state_file() {
        if state_file.exists() {
            match SamplerState::load(&state_file) {
                Ok(state) => {
                    let outcome = handle.restore(&state);
                    if let Some(e) = &outcome.sample_error {
                        warn!(err = %e, "Unable to load saved sample; restoring parameters");
                    }
                    info!(
                        applied = outcome.params.applied,
                        unknown = outcome.params.unknown.len(),
                        "Restored sampler state"
                    );
                }
                Err(e) => warn!(path = ?state_file, err = %e, "Unable to read sampler state"),
            }
        }
    }

    Ok((handle, engine))
}
