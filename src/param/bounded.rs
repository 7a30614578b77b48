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

//! Bounded, lock-free parameter values.
//!
//! Every tunable value in the sampler is a [`Param`]: a named scalar with
//! declared bounds, a step size and an out-of-range [`Policy`]. Writes are
//! normalized rather than rejected, so `set` always succeeds. Storage is a
//! single atomic word per field, so the audio thread reads without taking a
//! lock. Writers on the control side serialize on a per-parameter lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// What happens to a value written outside of `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Saturate at the nearest bound.
    Clamp,
    /// Wrap around, preserving the offset past the bound.
    Wrap,
}

/// A scalar type that can back a [`Param`].
pub trait ParamValue: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Packs the value into an atomic word.
    fn to_bits(self) -> u64;

    /// Unpacks a value produced by [`ParamValue::to_bits`].
    fn from_bits(bits: u64) -> Self;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;

    /// Saturates into `[min, max]`.
    fn clamp_to(self, min: Self, max: Self) -> Self;

    /// Wraps into `[min, max]` with a period of `(max - min) + step`.
    fn wrap_to(self, min: Self, max: Self, step: Self) -> Self;

    /// Moves the value by `steps` increments of `step`.
    fn offset(self, step: Self, steps: i32) -> Self;

    /// Formats the value for display.
    fn format(self) -> String;
}

impl ParamValue for i32 {
    #[inline]
    fn to_bits(self) -> u64 {
        self as u32 as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as u32 as i32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        // NaN casts to 0.
        value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    #[inline]
    fn clamp_to(self, min: Self, max: Self) -> Self {
        if max < min {
            return min;
        }
        self.max(min).min(max)
    }

    fn wrap_to(self, min: Self, max: Self, step: Self) -> Self {
        if max < min {
            return min;
        }
        if (min..=max).contains(&self) {
            return self;
        }
        let span = (max as i64 - min as i64) + (step as i64).max(1);
        let wrapped = min as i64 + (self as i64 - min as i64).rem_euclid(span);
        (wrapped as i32).min(max)
    }

    fn offset(self, step: Self, steps: i32) -> Self {
        let moved = self as i64 + step as i64 * steps as i64;
        moved.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    fn format(self) -> String {
        self.to_string()
    }
}

impl ParamValue for f32 {
    #[inline]
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn clamp_to(self, min: Self, max: Self) -> Self {
        if self.is_nan() || max < min {
            return min;
        }
        self.max(min).min(max)
    }

    fn wrap_to(self, min: Self, max: Self, step: Self) -> Self {
        if !self.is_finite() {
            return self.clamp_to(min, max);
        }
        if max < min {
            return min;
        }
        if (min..=max).contains(&self) {
            return self;
        }
        let span = (max - min) + step.max(0.0);
        if span <= 0.0 {
            return min;
        }
        (min + (self - min).rem_euclid(span)).clamp_to(min, max)
    }

    fn offset(self, step: Self, steps: i32) -> Self {
        self + step * steps as f32
    }

    fn format(self) -> String {
        format!("{:.2}", self)
    }
}

/// A named value with declared bounds.
///
/// The value, min and max live in atomics. Any number of control threads
/// may write: every write, including a bounds change, holds `writer` for its
/// whole read-normalize-store, so a stored value always lies within the
/// bounds stored alongside it. The audio thread never writes and reads each
/// parameter once per voice per block without locking.
pub struct Param<T: ParamValue> {
    name: &'static str,
    default: T,
    step: T,
    policy: Policy,
    value: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    writer: Mutex<()>,
}

impl<T: ParamValue> Param<T> {
    /// Creates a new parameter. The default is normalized against the bounds.
    pub fn new(name: &'static str, default: T, min: T, max: T, step: T, policy: Policy) -> Self {
        let param = Self {
            name,
            default,
            step,
            policy,
            value: AtomicU64::new(default.to_bits()),
            min: AtomicU64::new(min.to_bits()),
            max: AtomicU64::new(max.to_bits()),
            writer: Mutex::new(()),
        };
        param.set(default);
        param
    }

    /// Creates a parameter that saturates at its bounds.
    pub fn clamped(name: &'static str, default: T, min: T, max: T, step: T) -> Self {
        Self::new(name, default, min, max, step, Policy::Clamp)
    }

    /// Creates a parameter that wraps around at its bounds.
    pub fn wrapping(name: &'static str, default: T, min: T, max: T, step: T) -> Self {
        Self::new(name, default, min, max, step, Policy::Wrap)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn get(&self) -> T {
        T::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Normalizes `value` per the policy and stores it. Never fails.
    pub fn set(&self, value: T) {
        let _writer = self.writer.lock();
        self.store(value);
    }

    /// Restores the default value.
    pub fn reset(&self) {
        self.set(self.default);
    }

    /// Moves the value by `steps` increments, as a rotary encoder would.
    pub fn nudge(&self, steps: i32) {
        let _writer = self.writer.lock();
        self.store(self.get().offset(self.step, steps));
    }

    #[inline]
    pub fn min(&self) -> T {
        T::from_bits(self.min.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn max(&self) -> T {
        T::from_bits(self.max.load(Ordering::Relaxed))
    }

    pub fn step(&self) -> T {
        self.step
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Rebinds the bounds and re-normalizes the current value into them.
    pub fn set_range(&self, min: T, max: T) {
        let _writer = self.writer.lock();
        self.store_range(min, max);
        self.store(self.get());
    }

    /// Like [`Param::set_range`], but a value sitting at the old max moves to
    /// the new max instead of being normalized.
    pub fn set_range_following_max(&self, min: T, max: T) {
        let _writer = self.writer.lock();
        let at_max = self.get() >= self.max();
        self.store_range(min, max);
        self.store(if at_max { max } else { self.get() });
    }

    /// Callers hold `writer`.
    fn store_range(&self, min: T, max: T) {
        self.min.store(min.to_bits(), Ordering::Relaxed);
        self.max.store(max.to_bits(), Ordering::Relaxed);
    }

    /// Callers hold `writer`.
    fn store(&self, value: T) {
        let normalized = self.normalize(value);
        self.value.store(normalized.to_bits(), Ordering::Relaxed);
    }

    fn normalize(&self, value: T) -> T {
        let (min, max) = (self.min(), self.max());
        match self.policy {
            Policy::Clamp => value.clamp_to(min, max),
            Policy::Wrap => value.wrap_to(min, max, self.step),
        }
    }
}

impl<T: ParamValue> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("value", &self.get())
            .field("min", &self.min())
            .field("max", &self.max())
            .field("step", &self.step)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Type-erased access to a parameter, used for UI enumeration and
/// persistence. Values travel as `f64`.
pub trait ParamRef: Send + Sync {
    fn name(&self) -> &str;

    fn policy(&self) -> Policy;

    fn get_f64(&self) -> f64;

    /// Sets the value through the normal bounded path.
    fn set_f64(&self, value: f64);

    fn min_f64(&self) -> f64;

    fn max_f64(&self) -> f64;

    fn step_f64(&self) -> f64;

    fn default_f64(&self) -> f64;

    fn nudge(&self, steps: i32);

    fn reset(&self);

    /// Formats the current value for display.
    fn display(&self) -> String;
}

impl<T: ParamValue> ParamRef for Param<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn policy(&self) -> Policy {
        self.policy
    }

    fn get_f64(&self) -> f64 {
        self.get().to_f64()
    }

    fn set_f64(&self, value: f64) {
        self.set(T::from_f64(value));
    }

    fn min_f64(&self) -> f64 {
        self.min().to_f64()
    }

    fn max_f64(&self) -> f64 {
        self.max().to_f64()
    }

    fn step_f64(&self) -> f64 {
        self.step.to_f64()
    }

    fn default_f64(&self) -> f64 {
        self.default.to_f64()
    }

    fn nudge(&self, steps: i32) {
        Param::nudge(self, steps)
    }

    fn reset(&self) {
        Param::reset(self)
    }

    fn display(&self) -> String {
        self.get().format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_saturates() {
        let param = Param::clamped("speed", 1.0f32, 0.0, 5.0, 0.01);
        for (input, expected) in [(-3.0, 0.0), (0.0, 0.0), (2.5, 2.5), (5.0, 5.0), (17.0, 5.0)] {
            param.set(input);
            assert_eq!(param.get(), expected, "set({})", input);
        }

        let frames = Param::clamped("in", 0i32, 0, 1000, 100);
        frames.set(-1);
        assert_eq!(frames.get(), 0);
        frames.set(1001);
        assert_eq!(frames.get(), 1000);
        frames.set(i32::MAX);
        assert_eq!(frames.get(), 1000);
    }

    #[test]
    fn test_clamp_non_finite() {
        let param = Param::clamped("speed", 1.0f32, 0.0, 5.0, 0.01);
        param.set(f32::NAN);
        assert_eq!(param.get(), 0.0);
        param.set(f32::INFINITY);
        assert_eq!(param.get(), 5.0);
        param.set(f32::NEG_INFINITY);
        assert_eq!(param.get(), 0.0);
    }

    #[test]
    fn test_wrap_at_bounds() {
        let mode = Param::wrapping("mode", 0i32, -3, 2, 1);
        mode.set(3);
        assert_eq!(mode.get(), -3);
        mode.set(-4);
        assert_eq!(mode.get(), 2);

        // The offset past the bound is preserved.
        mode.set(5);
        assert_eq!(mode.get(), -1);
        mode.set(-3 - 6 * 4);
        assert_eq!(mode.get(), -3);
    }

    #[test]
    fn test_wrap_float() {
        let param = Param::wrapping("phase", 0.0f32, 0.0, 1.5, 0.5);
        param.set(2.0);
        assert_eq!(param.get(), 0.0);
        param.set(-0.5);
        assert_eq!(param.get(), 1.5);
        param.set(2.5);
        assert_eq!(param.get(), 0.5);
    }

    #[test]
    fn test_nudge_cycles_mode() {
        let mode = Param::wrapping("mode", 2i32, -3, 2, 1);
        mode.nudge(1);
        assert_eq!(mode.get(), -3);
        mode.nudge(-1);
        assert_eq!(mode.get(), 2);

        let frames = Param::clamped("out", 0i32, 0, 250, 100);
        frames.nudge(2);
        assert_eq!(frames.get(), 200);
        frames.nudge(1);
        assert_eq!(frames.get(), 250);
    }

    #[test]
    fn test_set_range_renormalizes() {
        let out = Param::clamped("out", 0i32, 0, 0, 100);
        assert_eq!(out.get(), 0);
        out.set_range(0, 44099);
        out.set(44099);
        assert_eq!(out.get(), 44099);
        out.set_range(0, 999);
        assert_eq!(out.get(), 999);
        assert_eq!(out.max(), 999);
    }

    #[test]
    fn test_set_range_following_max() {
        let out = Param::clamped("out", 0i32, 0, 999, 100);
        out.set(999);
        out.set_range_following_max(0, 4999);
        assert_eq!(out.get(), 4999);
        out.set_range_following_max(0, 9);
        assert_eq!(out.get(), 9);

        out.set(5);
        out.set_range_following_max(0, 4999);
        assert_eq!(out.get(), 5);
    }

    #[test]
    fn test_concurrent_set_and_set_range_stay_bounded() {
        let out = Param::clamped("out", 0i32, 0, 999, 100);
        for _ in 0..200 {
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for i in 0..50 {
                        let max = if i % 2 == 0 { 9 } else { 999 };
                        out.set_range_following_max(0, max);
                    }
                    out.set_range(0, 9);
                });
                scope.spawn(|| {
                    for _ in 0..50 {
                        out.set(900);
                        out.nudge(1);
                    }
                });
            });
            assert_eq!(out.max(), 9);
            assert!(
                out.get() >= out.min() && out.get() <= out.max(),
                "{:?} escaped its bounds",
                out
            );
            out.set_range(0, 999);
        }
    }

    #[test]
    fn test_default_is_normalized() {
        let param = Param::clamped("gain", 9.0f32, 0.0, 2.0, 0.1);
        assert_eq!(param.get(), 2.0);
        param.set(0.5);
        param.reset();
        assert_eq!(param.get(), 2.0);
    }

    #[test]
    fn test_param_ref_round_trips_through_f64() {
        let mode = Param::wrapping("mode", 0i32, -3, 2, 1);
        let erased: &dyn ParamRef = &mode;
        erased.set_f64(1.4);
        assert_eq!(mode.get(), 1);
        erased.set_f64(3.0);
        assert_eq!(erased.get_f64(), -3.0);
        assert_eq!(erased.display(), "-3");

        let speed = Param::clamped("speed", 1.0f32, 0.0, 5.0, 0.01);
        let erased: &dyn ParamRef = &speed;
        assert_eq!(erased.display(), "1.00");
        assert_eq!(erased.max_f64(), 5.0);
    }
}
