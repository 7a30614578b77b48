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

//! Decoding sample sources into mono frames.
//!
//! Any format symphonia can probe is accepted. Multi-channel material is
//! folded to mono by averaging the channels of each frame.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::error::LoadError;

/// A fully decoded sample, folded to mono.
#[derive(Debug, Clone)]
pub struct DecodedSample {
    /// One f32 per frame.
    pub frames: Vec<f32>,
    /// Sample rate of the source.
    pub sample_rate: u32,
    /// Channel count of the source before folding.
    pub channels: u16,
}

impl DecodedSample {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames.len() as f64 / self.sample_rate as f64)
    }
}

/// Decodes an audio file from disk. Decoding stops with
/// [`LoadError::TooLarge`] once more than `max_frames` frames are produced.
pub fn decode_file(path: &Path, max_frames: usize) -> Result<DecodedSample, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        )),
    })?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(
        Box::new(file),
        hint,
        &path.display().to_string(),
        max_frames,
    )
}

/// Decodes an audio file that is already in memory. `extension` is an
/// optional format hint such as `"wav"`.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    max_frames: usize,
) -> Result<DecodedSample, LoadError> {
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint, "<memory>", max_frames)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    label: &str,
    max_frames: usize,
) -> Result<DecodedSample, LoadError> {
    let mss = MediaSourceStream::new(source, Default::default());
    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LoadError::DecodeFailed(format!("'{}': {}", label, e)))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::DecodeFailed(format!("'{}': no audio track", label)))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| LoadError::DecodeFailed(format!("'{}': {}", label, e)))?;

    let mut sample_rate = params.sample_rate;
    let mut channels = params.channels.map(|c| c.count() as u16);
    // The header's frame count is only a hint and may be forged.
    let mut frames = match params.n_frames {
        Some(n) => Vec::with_capacity(usize::try_from(n).unwrap_or(usize::MAX).min(max_frames)),
        None => Vec::new(),
    };

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(LoadError::AudioError(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);
                fold_to_mono(decoded, &mut frames);
                if frames.len() > max_frames {
                    return Err(LoadError::TooLarge {
                        frames: frames.len(),
                        capacity: max_frames,
                    });
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet is skipped rather than failing the whole sample.
                warn!(source = label, error = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(LoadError::AudioError(e)),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| {
        LoadError::DecodeFailed(format!("'{}': sample rate not specified", label))
    })?;
    let channels = channels.ok_or_else(|| {
        LoadError::DecodeFailed(format!("'{}': channels not specified", label))
    })?;
    if frames.is_empty() {
        return Err(LoadError::DecodeFailed(format!(
            "'{}': no audio frames",
            label
        )));
    }

    debug!(
        source = label,
        frames = frames.len(),
        sample_rate,
        channels,
        "Sample decoded"
    );

    Ok(DecodedSample {
        frames,
        sample_rate,
        channels,
    })
}

/// Appends the decoded packet to `out`, averaging channels per frame.
fn fold_to_mono(decoded: AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => mix_planes(&buf, out, |sample| sample),
        AudioBufferRef::F64(buf) => mix_planes(&buf, out, |sample| sample as f32),
        AudioBufferRef::S8(buf) => mix_planes(&buf, out, scale_s8),
        AudioBufferRef::S16(buf) => mix_planes(&buf, out, scale_s16),
        AudioBufferRef::S24(buf) => mix_planes(&buf, out, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => mix_planes(&buf, out, scale_s32),
        AudioBufferRef::U8(buf) => mix_planes(&buf, out, scale_u8),
        AudioBufferRef::U16(buf) => mix_planes(&buf, out, scale_u16),
        AudioBufferRef::U24(buf) => mix_planes(&buf, out, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => mix_planes(&buf, out, scale_u32),
    }
}

fn mix_planes<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let planes = buf.planes();
    let planes = planes.planes();
    if planes.is_empty() {
        return;
    }
    let scale = 1.0 / planes.len() as f32;
    out.reserve(buf.frames());
    for frame in 0..buf.frames() {
        let sum: f32 = planes.iter().map(|plane| convert(plane[frame])).sum();
        out.push(sum * scale);
    }
}

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
