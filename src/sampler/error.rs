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
use std::path::PathBuf;

/// Error types for decoding a sample source.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Sample file not found: {0}")]
    NotFound(PathBuf),

    #[error("Sample decode failed: {0}")]
    DecodeFailed(String),

    #[error("Sample exceeds the capacity of {capacity} frames after {frames} frames")]
    TooLarge { frames: usize, capacity: usize },

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error types for sampler control operations.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Failed to load sample '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("Sample '{name}' has {frames} frames, exceeding the capacity of {capacity}")]
    TooLarge {
        name: String,
        frames: usize,
        capacity: usize,
    },

    #[error("Load of '{0}' was superseded by a newer request")]
    Superseded(String),

    #[error("Voice index {0} out of range")]
    NoSuchVoice(usize),

    #[error("Invalid block size {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid output sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("Block resize queue is full; keeping {0} frames")]
    ResizeQueueFull(usize),

    #[error("Audio engine is no longer accepting block resizes")]
    EngineGone,

    #[error("Sample loader is not running")]
    LoaderGone,
}
