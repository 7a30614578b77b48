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
//! Offline rendering to a WAV file.
use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::sampler::{SamplerEngine, SamplerError, SamplerHandle};

/// Error types for offline rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Triggers `voices` together and renders `length` of output into a mono
/// 32-bit float WAV at the sampler's output rate. Returns the frames written.
pub fn render_to_wav(
    handle: &SamplerHandle,
    engine: &mut SamplerEngine,
    voices: &[usize],
    length: Duration,
    path: &Path,
) -> Result<usize, RenderError> {
    for voice in voices {
        handle.trigger(*voice)?;
    }

    let sample_rate = handle.output_sample_rate();
    let total = (length.as_secs_f64() * sample_rate as f64).round() as usize;
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let mut block = vec![0.0f32; engine.block_size()];
    let mut written = 0;
    while written < total {
        let frames = block.len().min(total - written);
        let out = &mut block[..frames];
        out.fill(0.0);
        engine.render(out);
        for sample in out.iter() {
            writer.write_sample(*sample)?;
        }
        written += frames;
    }
    writer.finalize()?;

    info!(path = ?path, frames = written, sample_rate, "Rendered to WAV");
    Ok(written)
}
