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
//! The sampler engine and its control handle.
//!
//! [`Sampler::build`] splits the sampler in two. The [`SamplerEngine`] is
//! owned by the audio thread and only ever does lock-free reads. The
//! [`SamplerHandle`] is cloned freely across control threads and does all the
//! allocating work: decoding, buffer publishing, and scratch resizing.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use crate::config::SamplerConfig;
use crate::events::Events;
use crate::param::{self, Child, Param, ParamGroup, RestoreReport};
use crate::state::SamplerState;

use super::buffer::{BufferHandle, SampleBuffer};
use super::error::{LoadError, SamplerError};
use super::loader;
use super::voice::{Voice, VoiceParams, VoiceSettings, NUM_VOICES};

/// Gain applied to every voice when summing.
const VOICE_GAIN: f32 = 1.0;

/// Pending scratch buffers the engine has not picked up yet.
const RESIZE_QUEUE_DEPTH: usize = 4;

/// Replaced scratch buffers waiting to be freed by the control side.
const RETIRE_QUEUE_DEPTH: usize = 16;

const REQUEST_NONE: u8 = 0;
const REQUEST_TRIGGER: u8 = 1;
const REQUEST_STOP: u8 = 2;

/// The root parameter group: the global speed followed by every voice.
pub struct SamplerParams {
    /// Global playback rate multiplier applied on top of every voice's speed.
    pub sample_speed: Param<f32>,
    voices: [VoiceParams; NUM_VOICES],
}

impl SamplerParams {
    fn new() -> Self {
        Self {
            sample_speed: Param::clamped("sample speed", 1.0, 0.0, 5.0, 0.01),
            voices: std::array::from_fn(VoiceParams::new),
        }
    }

    pub fn voice(&self, index: usize) -> Option<&VoiceParams> {
        self.voices.get(index)
    }

    pub fn voices(&self) -> &[VoiceParams] {
        &self.voices
    }
}

impl ParamGroup for SamplerParams {
    fn name(&self) -> &str {
        "Sampler"
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(Child<'a>)) {
        visit(Child::Param(&self.sample_speed));
        for voice in self.voices.iter() {
            visit(Child::Group(voice));
        }
    }
}

/// Per-voice mailbox between the control and audio threads.
struct VoiceSignal {
    /// Pending request, consumed at the start of the next block.
    request: AtomicU8,
    /// Play progress as f32 bits, written by the audio thread.
    progress: AtomicU32,
}

impl VoiceSignal {
    fn new() -> Self {
        Self {
            request: AtomicU8::new(REQUEST_NONE),
            progress: AtomicU32::new((-1.0f32).to_bits()),
        }
    }
}

/// State shared by the engine and every handle.
struct Shared {
    params: SamplerParams,
    signals: [VoiceSignal; NUM_VOICES],
    buffer: BufferHandle,
    selected_voice: AtomicUsize,
    output_sample_rate: u32,
    max_capacity: usize,
    samples_dir: PathBuf,
    /// Most recently requested block size.
    block_size: AtomicUsize,
    /// Ticket of the most recent load request.
    load_ticket: AtomicU64,
    /// Serializes the ticket check with the publish that follows it.
    publish_lock: Mutex<()>,
}

/// What [`SamplerHandle::restore`] managed to apply.
#[derive(Debug)]
pub struct RestoreOutcome {
    pub params: RestoreReport,
    /// Set when the saved sample could not be loaded.
    pub sample_error: Option<SamplerError>,
}

/// Describes a successfully published sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub name: String,
    pub frames: usize,
    pub sample_rate: u32,
    pub duration: Duration,
}

pub struct Sampler;

impl Sampler {
    /// Builds the sampler with an empty buffer. The handle goes to the
    /// control side, the engine to whatever drives the audio output.
    pub fn build(
        config: &SamplerConfig,
    ) -> Result<(SamplerHandle, SamplerEngine), SamplerError> {
        let block_size = config.block_size();
        if block_size == 0 {
            return Err(SamplerError::InvalidBlockSize(block_size));
        }
        let output_sample_rate = config.sample_rate();
        if output_sample_rate == 0 {
            return Err(SamplerError::InvalidSampleRate(output_sample_rate));
        }
        let max_capacity = config.max_sample_frames();

        let shared = Arc::new(Shared {
            params: SamplerParams::new(),
            signals: std::array::from_fn(|_| VoiceSignal::new()),
            buffer: BufferHandle::new(SampleBuffer::empty(output_sample_rate, max_capacity)),
            selected_voice: AtomicUsize::new(0),
            output_sample_rate,
            max_capacity,
            samples_dir: config.samples_dir(),
            block_size: AtomicUsize::new(block_size),
            load_ticket: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
        });

        let (resize_tx, resize_rx) = bounded(RESIZE_QUEUE_DEPTH);
        let (retire_tx, retire_rx) = bounded(RETIRE_QUEUE_DEPTH);

        info!(
            voices = NUM_VOICES,
            sample_rate = output_sample_rate,
            block_size,
            max_capacity,
            "Sampler built"
        );

        Ok((
            SamplerHandle {
                shared: shared.clone(),
                resize_tx,
                retire_rx,
            },
            SamplerEngine {
                shared,
                voices: [Voice::new(); NUM_VOICES],
                scratch: vec![0.0; block_size],
                resize_rx,
                retire_tx,
            },
        ))
    }
}

/// Ratio of source frames to output frames at unit voice speed.
#[inline]
fn speed_scale(buffer: &SampleBuffer, output_sample_rate: u32, sample_speed: f32) -> f64 {
    buffer.sample_rate() as f64 / output_sample_rate as f64 * sample_speed as f64
}

/// The audio-thread half of the sampler.
pub struct SamplerEngine {
    shared: Arc<Shared>,
    voices: [Voice; NUM_VOICES],
    /// Mix buffer sized to the block. Output is rendered in chunks of its length.
    scratch: Vec<f32>,
    resize_rx: Receiver<Vec<f32>>,
    retire_tx: Sender<Vec<f32>>,
}

impl SamplerEngine {
    /// Renders every playing voice and sums the result into `out`. Never
    /// allocates, locks or fails.
    pub fn render(&mut self, out: &mut [f32]) {
        self.accept_resizes();

        let Self {
            shared,
            voices,
            scratch,
            ..
        } = self;

        let buffer = shared.buffer.load();
        let scale = speed_scale(
            &buffer,
            shared.output_sample_rate,
            shared.params.sample_speed.get(),
        );

        // Parameters are read once per voice per block.
        let settings: [VoiceSettings; NUM_VOICES] =
            std::array::from_fn(|index| shared.params.voices[index].settings());

        for (index, voice) in voices.iter_mut().enumerate() {
            match shared.signals[index]
                .request
                .swap(REQUEST_NONE, Ordering::AcqRel)
            {
                REQUEST_TRIGGER => voice.trigger(&settings[index]),
                REQUEST_STOP => voice.stop(),
                _ => {}
            }
        }

        if !scratch.is_empty() {
            for chunk in out.chunks_mut(scratch.len()) {
                let mix = &mut scratch[..chunk.len()];
                mix.fill(0.0);
                for (voice, settings) in voices.iter_mut().zip(settings.iter()) {
                    if !voice.is_idle() {
                        voice.render_into(settings, &buffer, scale, VOICE_GAIN, mix);
                    }
                }
                for (sample, mixed) in chunk.iter_mut().zip(mix.iter()) {
                    *sample += *mixed;
                }
            }
        }

        for (index, voice) in voices.iter().enumerate() {
            shared.signals[index]
                .progress
                .store(voice.progress(&settings[index]).to_bits(), Ordering::Relaxed);
        }
    }

    /// Swaps in scratch buffers sent by [`SamplerHandle::on_block_size_changed`]
    /// and hands the replaced ones back for freeing.
    fn accept_resizes(&mut self) {
        while let Ok(scratch) = self.resize_rx.try_recv() {
            let previous = std::mem::replace(&mut self.scratch, scratch);
            // Every resize drains the retire queue before queueing, so it
            // holds RESIZE_QUEUE_DEPTH plus one per racing resizer at most.
            let retired = self.retire_tx.try_send(previous);
            debug_assert!(retired.is_ok(), "retire queue full; freed on the audio thread");
        }
    }

    /// Resizes the scratch directly. For owners that already serialize block
    /// size changes with [`SamplerEngine::render`]; allocates.
    pub fn on_block_size_changed(&mut self, block_size: usize) -> Result<(), SamplerError> {
        if block_size == 0 {
            return Err(SamplerError::InvalidBlockSize(block_size));
        }
        self.scratch = vec![0.0; block_size];
        self.shared.block_size.store(block_size, Ordering::Relaxed);
        Ok(())
    }

    /// The block size currently in effect.
    pub fn block_size(&self) -> usize {
        self.scratch.len()
    }

    /// Number of voices that were playing at the end of the last block.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|voice| !voice.is_idle()).count()
    }
}

impl fmt::Debug for SamplerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerEngine")
            .field("block_size", &self.scratch.len())
            .field("active_voices", &self.active_voices())
            .field("buffer", &self.shared.buffer)
            .finish()
    }
}

/// The control-thread half of the sampler.
#[derive(Clone)]
pub struct SamplerHandle {
    shared: Arc<Shared>,
    resize_tx: Sender<Vec<f32>>,
    retire_rx: Receiver<Vec<f32>>,
}

impl SamplerHandle {
    fn signal(&self, index: usize) -> Result<&VoiceSignal, SamplerError> {
        self.shared
            .signals
            .get(index)
            .ok_or(SamplerError::NoSuchVoice(index))
    }

    /// Restarts a voice from its start boundary at the next block.
    pub fn trigger(&self, index: usize) -> Result<(), SamplerError> {
        self.signal(index)?
            .request
            .store(REQUEST_TRIGGER, Ordering::Release);
        Ok(())
    }

    /// Silences a voice at the next block.
    pub fn stop(&self, index: usize) -> Result<(), SamplerError> {
        self.signal(index)?
            .request
            .store(REQUEST_STOP, Ordering::Release);
        Ok(())
    }

    pub fn stop_all(&self) {
        for signal in self.shared.signals.iter() {
            signal.request.store(REQUEST_STOP, Ordering::Release);
        }
    }

    /// A voice's parameters, for editing.
    pub fn voice(&self, index: usize) -> Result<&VoiceParams, SamplerError> {
        self.shared
            .params
            .voice(index)
            .ok_or(SamplerError::NoSuchVoice(index))
    }

    /// The whole parameter tree.
    pub fn params(&self) -> &SamplerParams {
        &self.shared.params
    }

    /// Picks the voice the UI edits. Has no effect on rendering.
    pub fn select_voice(&self, index: usize) -> Result<(), SamplerError> {
        if index >= NUM_VOICES {
            return Err(SamplerError::NoSuchVoice(index));
        }
        self.shared.selected_voice.store(index, Ordering::Relaxed);
        Ok(())
    }

    pub fn selected_voice(&self) -> usize {
        self.shared.selected_voice.load(Ordering::Relaxed)
    }

    /// Progress through the voice's window in `[0, 1]`, or -1 while idle.
    /// Updated once per block.
    pub fn play_progress(&self, index: usize) -> Result<f32, SamplerError> {
        Ok(f32::from_bits(
            self.signal(index)?.progress.load(Ordering::Relaxed),
        ))
    }

    /// The published buffer, for waveform display.
    pub fn waveform(&self) -> Arc<SampleBuffer> {
        self.shared.buffer.current()
    }

    /// Name of the published sample, if one has been loaded.
    pub fn sample_name(&self) -> Option<String> {
        let buffer = self.shared.buffer.load();
        if buffer.name().is_empty() {
            None
        } else {
            Some(buffer.name().to_string())
        }
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.shared.output_sample_rate
    }

    pub fn max_capacity(&self) -> usize {
        self.shared.max_capacity
    }

    /// The block size most recently requested.
    pub fn block_size(&self) -> usize {
        self.shared.block_size.load(Ordering::Relaxed)
    }

    /// Decodes and publishes a sample file. The sample is named after the
    /// file stem.
    pub fn load_sample(&self, path: &Path) -> Result<LoadReport, SamplerError> {
        let ticket = self.begin_load();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let span = span!(Level::INFO, "load sample", name = name.as_str());
        let _enter = span.enter();

        let decoded = loader::decode_file(path, self.shared.max_capacity).map_err(|source| {
            warn!(path = ?path, err = %source, "Sample load failed; keeping previous sample");
            load_error(&name, source)
        })?;
        self.finish_load(ticket, &name, decoded.frames, decoded.sample_rate)
    }

    /// Loads `<samples_dir>/<name>.wav`.
    pub fn load_named(&self, name: &str) -> Result<LoadReport, SamplerError> {
        let path = self.shared.samples_dir.join(format!("{}.wav", name));
        self.load_sample(&path)
    }

    /// Decodes and publishes an in-memory file. An extension on `name` is
    /// used as a format hint.
    pub fn load_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<LoadReport, SamplerError> {
        let ticket = self.begin_load();
        let extension = Path::new(name).extension().and_then(|ext| ext.to_str());
        let decoded = loader::decode_bytes(bytes, extension, self.shared.max_capacity)
            .map_err(|source| {
                warn!(name, err = %source, "Sample decode failed; keeping previous sample");
                load_error(name, source)
            })?;
        self.finish_load(ticket, name, decoded.frames, decoded.sample_rate)
    }

    /// Publishes frames that are already mono f32.
    pub fn publish_frames(
        &self,
        name: &str,
        frames: Vec<f32>,
        sample_rate: u32,
    ) -> Result<LoadReport, SamplerError> {
        let ticket = self.begin_load();
        self.finish_load(ticket, name, frames, sample_rate)
    }

    fn begin_load(&self) -> u64 {
        self.shared.load_ticket.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Publishes the buffer if `ticket` is still the latest load, then
    /// rebinds every voice's window to it.
    fn finish_load(
        &self,
        ticket: u64,
        name: &str,
        frames: Vec<f32>,
        sample_rate: u32,
    ) -> Result<LoadReport, SamplerError> {
        if sample_rate == 0 {
            return Err(SamplerError::InvalidSampleRate(sample_rate));
        }
        let buffer = SampleBuffer::new(name, frames, sample_rate, self.shared.max_capacity)
            .inspect_err(|e| warn!(err = %e, "Rejecting sample; keeping previous sample"))?;
        let report = LoadReport {
            name: name.to_string(),
            frames: buffer.len(),
            sample_rate,
            duration: buffer.duration(),
        };
        let last_frame = i32::try_from(buffer.last_frame()).unwrap_or(i32::MAX);

        {
            let _publish = self.shared.publish_lock.lock();
            if self.shared.load_ticket.load(Ordering::Acquire) != ticket {
                debug!(name, ticket, "Discarding superseded load");
                return Err(SamplerError::Superseded(name.to_string()));
            }
            self.shared.buffer.publish(buffer);
            for voice in self.shared.params.voices.iter() {
                voice.rebind(last_frame);
            }
        }

        info!(
            name,
            frames = report.frames,
            sample_rate,
            duration = ?report.duration,
            "Sample published"
        );
        Ok(report)
    }

    /// Frees retired sample buffers no reader references any more.
    pub fn collect(&self) -> usize {
        self.shared.buffer.collect()
    }

    /// Allocates a scratch buffer for the new block size and queues it for
    /// the engine, which installs it before its next block.
    pub fn on_block_size_changed(&self, block_size: usize) -> Result<(), SamplerError> {
        if block_size == 0 {
            return Err(SamplerError::InvalidBlockSize(block_size));
        }
        let freed = self.retire_rx.try_iter().count();
        match self.resize_tx.try_send(vec![0.0; block_size]) {
            Ok(()) => {
                self.shared.block_size.store(block_size, Ordering::Relaxed);
                debug!(block_size, freed, "Queued sampler block resize");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SamplerError::ResizeQueueFull(self.block_size())),
            Err(TrySendError::Disconnected(_)) => Err(SamplerError::EngineGone),
        }
    }

    /// Resizes the engine whenever `events` reports a new block size.
    pub fn subscribe(&self, events: &Events) {
        let handle = self.clone();
        events.block_size_changed.subscribe(move |block_size| {
            if let Err(e) = handle.on_block_size_changed(block_size) {
                warn!(err = %e, block_size, "Unable to resize sampler block");
            }
        });
    }

    /// Captures the sample name and every parameter.
    pub fn snapshot(&self) -> SamplerState {
        SamplerState {
            sample_name: self.sample_name(),
            params: param::snapshot(&self.shared.params),
        }
    }

    /// Loads the state's sample if it is not already published, then applies
    /// its parameters. Parameters are restored after the load so `in` and
    /// `out` are bounded by the right sample. A failed load does not stop the
    /// parameters being applied against whatever buffer is active.
    pub fn restore(&self, state: &SamplerState) -> RestoreOutcome {
        let sample_error = match &state.sample_name {
            Some(name) if self.sample_name().as_deref() != Some(name.as_str()) => {
                self.load_named(name).err()
            }
            _ => None,
        };
        RestoreOutcome {
            params: param::restore(&self.shared.params, &state.params),
            sample_error,
        }
    }
}

fn load_error(name: &str, source: LoadError) -> SamplerError {
    match source {
        LoadError::TooLarge { frames, capacity } => SamplerError::TooLarge {
            name: name.to_string(),
            frames,
            capacity,
        },
        source => SamplerError::Load {
            name: name.to_string(),
            source,
        },
    }
}

impl fmt::Debug for SamplerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerHandle")
            .field("buffer", &self.shared.buffer)
            .field("selected_voice", &self.selected_voice())
            .field("block_size", &self.block_size())
            .finish()
    }
}
