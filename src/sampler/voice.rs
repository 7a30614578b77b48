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

//! Per-voice playback state machine.
//!
//! A voice is either idle (`position == IDLE`) or playing somewhere inside its
//! `[in, out]` window. Forward modes start at `in` and move up; backward
//! modes start at `out` and move down. At the window boundary, loop modes wrap
//! to the opposite boundary carrying the overshoot, everything else stops.

use crate::param::{Child, Param, ParamGroup};

use super::buffer::SampleBuffer;

/// Number of voices, one per key.
pub const NUM_VOICES: usize = 24;

/// Position value of an idle voice.
pub const IDLE: f64 = -1.0;

/// Frames moved per rotary detent on `in` and `out`.
const FRAME_STEP: i32 = 100;

/// Playback direction and boundary behavior. The discriminants are the raw
/// values of the `mode` parameter; non-negative values play forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    BackwardLoop = -3,
    BackwardStop = -2,
    Backward = -1,
    Forward = 0,
    ForwardStop = 1,
    ForwardLoop = 2,
}

impl PlayMode {
    pub const MIN: i32 = -3;
    pub const MAX: i32 = 2;

    /// Converts a raw mode value, wrapping values outside the range.
    pub fn from_raw(raw: i32) -> Self {
        let span = (Self::MAX - Self::MIN + 1) as i64;
        let wrapped = Self::MIN as i64 + (raw as i64 - Self::MIN as i64).rem_euclid(span);
        match wrapped {
            -3 => PlayMode::BackwardLoop,
            -2 => PlayMode::BackwardStop,
            -1 => PlayMode::Backward,
            0 => PlayMode::Forward,
            1 => PlayMode::ForwardStop,
            _ => PlayMode::ForwardLoop,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    pub fn is_forward(self) -> bool {
        self.raw() >= 0
    }

    pub fn is_loop(self) -> bool {
        matches!(self, PlayMode::ForwardLoop | PlayMode::BackwardLoop)
    }

    /// Plays through once and goes idle at the far boundary.
    pub fn is_one_shot(self) -> bool {
        matches!(self, PlayMode::Forward | PlayMode::Backward)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayMode::BackwardLoop => "<-loop",
            PlayMode::BackwardStop => "<-stop",
            PlayMode::Backward => "<-",
            PlayMode::Forward => "->",
            PlayMode::ForwardStop => "stop->",
            PlayMode::ForwardLoop => "loop->",
        }
    }
}

/// The tunable parameters of one voice.
pub struct VoiceParams {
    name: String,
    /// First frame of the playback window.
    pub in_point: Param<i32>,
    /// Last frame of the playback window.
    pub out_point: Param<i32>,
    /// Playback rate multiplier.
    pub speed: Param<f32>,
    /// Raw [`PlayMode`] value.
    pub mode: Param<i32>,
}

impl VoiceParams {
    pub fn new(index: usize) -> Self {
        Self {
            name: format!("Voice {}", index),
            in_point: Param::clamped("in", 0, 0, 0, FRAME_STEP),
            out_point: Param::clamped("out", 0, 0, 0, FRAME_STEP),
            speed: Param::clamped("speed", 1.0, 0.0, 5.0, 0.01),
            mode: Param::wrapping(
                "mode",
                PlayMode::Forward.raw(),
                PlayMode::MIN,
                PlayMode::MAX,
                1,
            ),
        }
    }

    pub fn mode(&self) -> PlayMode {
        PlayMode::from_raw(self.mode.get())
    }

    pub fn set_mode(&self, mode: PlayMode) {
        self.mode.set(mode.raw());
    }

    /// Reads every parameter once, for use over a whole block.
    #[inline]
    pub fn settings(&self) -> VoiceSettings {
        VoiceSettings::new(
            self.in_point.get(),
            self.out_point.get(),
            self.speed.get(),
            self.mode(),
        )
    }

    /// Rebinds `in` and `out` to a buffer whose last frame is `last_frame`.
    /// An `out` that sat at the old end of the sample follows the new end.
    pub fn rebind(&self, last_frame: i32) {
        self.in_point.set_range(0, last_frame);
        self.out_point.set_range_following_max(0, last_frame);
    }
}

impl ParamGroup for VoiceParams {
    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(Child<'a>)) {
        visit(Child::Param(&self.in_point));
        visit(Child::Param(&self.out_point));
        visit(Child::Param(&self.speed));
        visit(Child::Param(&self.mode));
    }
}

/// A consistent snapshot of a voice's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub start: f64,
    pub end: f64,
    pub speed: f64,
    pub mode: PlayMode,
}

impl VoiceSettings {
    /// Builds settings for the window `[in_point, out_point]`. An `out_point`
    /// before `in_point` collapses the window onto `in_point`.
    pub fn new(in_point: i32, out_point: i32, speed: f32, mode: PlayMode) -> Self {
        let start = in_point.max(0) as f64;
        Self {
            start,
            end: (out_point as f64).max(start),
            speed: speed.max(0.0) as f64,
            mode,
        }
    }

    /// Width of the window in frames.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Runtime transport state of one voice.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    position: f64,
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    pub fn new() -> Self {
        Self { position: IDLE }
    }

    /// Fractional frame index, or [`IDLE`].
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.position == IDLE
    }

    /// Starts playback from the mode's start boundary.
    pub fn trigger(&mut self, settings: &VoiceSettings) {
        self.position = if settings.mode.is_forward() {
            settings.start
        } else {
            settings.end
        };
    }

    pub fn stop(&mut self) {
        self.position = IDLE;
    }

    /// Advances by a whole block of `frames` at the voice's speed times
    /// `scale`. Returns true while the voice is still playing.
    pub fn advance(&mut self, settings: &VoiceSettings, frames: usize, scale: f64) -> bool {
        self.step(settings, settings.speed * scale * frames as f64);
        !self.is_idle()
    }

    /// Moves the position by `delta` frames in the mode's direction and
    /// resolves any boundary crossing.
    #[inline]
    pub fn step(&mut self, settings: &VoiceSettings, delta: f64) {
        if self.is_idle() {
            return;
        }
        let span = settings.length();
        if settings.mode.is_forward() {
            self.position += delta;
            if self.position > settings.end {
                if settings.mode.is_loop() && span > 0.0 {
                    let overshoot = self.position - settings.end;
                    self.position = settings.start + wrap_overshoot(overshoot, span);
                } else {
                    self.position = IDLE;
                }
            }
        } else {
            self.position -= delta;
            if self.position < settings.start {
                if settings.mode.is_loop() && span > 0.0 {
                    let overshoot = settings.start - self.position;
                    self.position = settings.end - wrap_overshoot(overshoot, span);
                } else {
                    self.position = IDLE;
                }
            }
        }
    }

    /// Progress through the window in `[0, 1]`, or -1 while idle.
    pub fn progress(&self, settings: &VoiceSettings) -> f32 {
        if self.is_idle() {
            return -1.0;
        }
        let span = settings.length();
        if span <= 0.0 {
            return 0.0;
        }
        ((self.position - settings.start) / span).clamp(0.0, 1.0) as f32
    }

    /// Resamples `buffer` into `out`, summing onto what is already there, and
    /// advances one frame per output frame. Stops early if the voice goes idle.
    #[inline]
    pub fn render_into(
        &mut self,
        settings: &VoiceSettings,
        buffer: &SampleBuffer,
        scale: f64,
        gain: f32,
        out: &mut [f32],
    ) {
        let increment = settings.speed * scale;
        for frame in out.iter_mut() {
            if self.is_idle() {
                break;
            }
            *frame += buffer.sample_at(self.position) * gain;
            self.step(settings, increment);
        }
    }
}

/// Reduces an overshoot into `(0, span]`, keeping the fractional phase.
#[inline]
fn wrap_overshoot(overshoot: f64, span: f64) -> f64 {
    let wrapped = overshoot % span;
    if wrapped == 0.0 {
        span
    } else {
        wrapped
    }
}
