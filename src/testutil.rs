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

//! Shared helpers for unit tests.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::audio::instance::InstanceListener;
use crate::audio::sound::PreSampledSound;

/// Tolerance used when comparing mixed or interpolated samples.
pub const EPSILON: f32 = 1e-6;

/// Asserts two samples match within [`EPSILON`].
#[track_caller]
pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() <= EPSILON,
        "expected {} but got {}",
        expected,
        actual
    );
}

/// A sound whose samples are distinct and increasing, so interpolation is easy to check.
pub fn ramp_sound(frames: usize, channels: u16, sample_rate: u32) -> PreSampledSound {
    let len = frames * channels as usize;
    let samples = (0..len)
        .map(|i| (i as f32 + 1.0) / (len as f32 + 1.0))
        .collect();
    PreSampledSound::new(samples, sample_rate, channels).unwrap()
}

/// A sound holding the same value in every sample.
pub fn constant_sound(
    value: f32,
    frames: usize,
    channels: u16,
    sample_rate: u32,
) -> Arc<PreSampledSound> {
    let samples = vec![value; frames * channels as usize];
    Arc::new(PreSampledSound::new(samples, sample_rate, channels).unwrap())
}

/// A mono sine wave.
pub fn sine(frequency: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Counts listener callbacks.
#[derive(Default)]
pub struct CountingListener {
    pub looped: AtomicU32,
    pub finished: AtomicU32,
}

impl CountingListener {
    pub fn looped(&self) -> u32 {
        self.looped.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }
}

impl InstanceListener for CountingListener {
    fn sound_looped(&self, _instance: u64, _loops: u32) {
        self.looped.fetch_add(1, Ordering::SeqCst);
    }

    fn sound_finished(&self, _instance: u64) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}
