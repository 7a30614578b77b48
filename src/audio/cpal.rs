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
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::{BlockSizeWatcher, DeviceInfo};
use crate::config;
use crate::events::Events;
use crate::sampler::SamplerEngine;

/// Largest number of frames rendered in one pass. Callbacks asking for more
/// are rendered in several passes.
const MAX_RENDER_FRAMES: usize = 4096;

/// Lists cpal output devices across every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);
            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    host: host_id.name().to_string(),
                    max_channels,
                });
            }
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

/// Finds an output device by name. "default" picks the default host's
/// default output.
fn find_device(name: &str) -> Result<cpal::Device, Box<dyn Error>> {
    if name == "default" {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "no default output device".into());
    }
    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.devices() else {
            continue;
        };
        for device in devices {
            if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                return Ok(device);
            }
        }
    }
    Err(format!("no device found with name {}", name).into())
}

/// A running output stream driving a [`SamplerEngine`]. Playback stops when
/// this is dropped.
pub struct Output {
    _stream: cpal::Stream,
    callback_frames: Arc<AtomicUsize>,
}

impl Output {
    /// Opens the configured device and starts rendering. The engine's mono
    /// output is copied to every channel.
    pub fn start(
        audio: &config::Audio,
        sample_rate: u32,
        engine: SamplerEngine,
    ) -> Result<Output, Box<dyn Error>> {
        let span = span!(Level::INFO, "output", device = audio.device());
        let _enter = span.enter();

        let device = find_device(audio.device())?;
        let sample_format = device.default_output_config()?.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: audio.channels(),
            sample_rate: sample_rate as cpal::SampleRate,
            buffer_size: cpal::BufferSize::Default,
        };
        let callback_frames = Arc::new(AtomicUsize::new(0));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, engine, callback_frames.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, engine, callback_frames.clone())?
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, engine, callback_frames.clone())?
            }
            other => return Err(format!("unsupported sample format {}", other).into()),
        };
        stream.play()?;
        info!(
            channels = stream_config.channels,
            sample_rate,
            format = %sample_format,
            "Output stream started"
        );

        Ok(Output {
            _stream: stream,
            callback_frames,
        })
    }

    /// Frames per channel the device asked for in its last callback, or 0
    /// before the first callback.
    pub fn callback_frames(&self) -> usize {
        self.callback_frames.load(Ordering::Relaxed)
    }

    /// Reports callback size changes through `events`.
    pub fn watch_block_size(
        &self,
        events: Arc<Events>,
    ) -> Result<BlockSizeWatcher, Box<dyn Error>> {
        BlockSizeWatcher::start(self.callback_frames.clone(), events)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut engine: SamplerEngine,
    callback_frames: Arc<AtomicUsize>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = stream_config.channels.max(1) as usize;
    let mut mono = vec![0.0f32; MAX_RENDER_FRAMES];
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            callback_frames.store(data.len() / channels, Ordering::Relaxed);
            for chunk in data.chunks_mut(MAX_RENDER_FRAMES * channels) {
                let mix = &mut mono[..chunk.len() / channels];
                mix.fill(0.0);
                engine.render(mix);
                for (frame, sample) in chunk.chunks_mut(channels).zip(mix.iter()) {
                    frame.fill(T::from_sample(*sample));
                }
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}
