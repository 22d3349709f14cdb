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

//! A multi-tap echo reverb with a trailing history buffer.
//!
//! Every output sample gets `steps` delayed copies of the dry signal added to
//! it, evenly spaced across the configured delay. Tap `n` is scaled by
//! `volume / n`. Taps that reach back before the current block read from the
//! history of previous blocks.

use std::collections::VecDeque;
use std::time::Duration;

use super::Modifier;
use crate::audio::error::AudioError;
use crate::audio::format::WaveFormat;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_STEPS: usize = 4;
pub const MAX_STEPS: usize = 64;
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Clamps a reverb volume to [0, 1], mapping non-finite input to the default.
pub fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        DEFAULT_VOLUME
    }
}

#[derive(Debug)]
pub struct ReverbModifier {
    /// Total span covered by the taps.
    delay: Duration,
    /// Number of taps.
    steps: usize,
    /// Gain of the first tap.
    volume: f32,
    /// Format the history was built for.
    format: Option<WaveFormat>,
    /// Dry samples from previous blocks, oldest first.
    history: VecDeque<f32>,
    /// Maximum number of samples kept in `history`.
    capacity: usize,
    /// Copy of the dry block being processed.
    dry: Vec<f32>,
    /// Samples recorded since the last non-zero dry sample.
    silent_run: usize,
}

impl ReverbModifier {
    pub fn new(delay: Duration, steps: usize, volume: f32) -> Self {
        Self {
            delay,
            steps: steps.clamp(1, MAX_STEPS),
            volume: sanitize_volume(volume),
            format: None,
            history: VecDeque::new(),
            capacity: 0,
            dry: Vec::new(),
            silent_run: usize::MAX,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Changes the delay span. History is rebuilt on the next block.
    pub fn set_delay(&mut self, delay: Duration) {
        if delay != self.delay {
            self.delay = delay;
            self.format = None;
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn set_steps(&mut self, steps: usize) {
        self.steps = steps.clamp(1, MAX_STEPS);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = sanitize_volume(volume);
    }

    /// Frames between consecutive taps.
    fn spacing(&self, format: &WaveFormat) -> usize {
        let frames = (self.delay.as_secs_f64() * format.sample_rate as f64) as usize;
        frames / self.steps
    }

    fn configure(&mut self, format: &WaveFormat) {
        self.capacity = format.samples_for(self.delay.as_secs_f64());
        self.history = VecDeque::with_capacity(self.capacity);
        self.silent_run = usize::MAX;
        self.format = Some(*format);
    }

    /// Appends the dry block to history, evicting the oldest samples.
    fn record(&mut self) {
        match self.dry.iter().rposition(|s| *s != 0.0) {
            Some(last) => self.silent_run = self.dry.len() - 1 - last,
            None => self.silent_run = self.silent_run.saturating_add(self.dry.len()),
        }

        if self.capacity == 0 {
            return;
        }
        if self.dry.len() >= self.capacity {
            let newest = &self.dry[self.dry.len() - self.capacity..];
            self.history.clear();
            self.history.extend(newest);
            return;
        }
        let overflow = (self.history.len() + self.dry.len()).saturating_sub(self.capacity);
        self.history.drain(..overflow);
        self.history.extend(&self.dry);
    }
}

impl Default for ReverbModifier {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY, DEFAULT_STEPS, DEFAULT_VOLUME)
    }
}

impl Modifier for ReverbModifier {
    fn modify(&mut self, buffer: &mut [f32], format: &WaveFormat) -> Result<bool, AudioError> {
        if buffer.is_empty() {
            return Ok(false);
        }
        if self.format != Some(*format) {
            self.configure(format);
        }

        let channels = format.channels as usize;
        if buffer.len() % channels != 0 {
            return Err(AudioError::InvalidSampleCount {
                count: buffer.len(),
                channels: format.channels,
            });
        }

        self.dry.clear();
        self.dry.extend_from_slice(buffer);

        let spacing = self.spacing(format) * channels;
        let mut audible = false;
        if spacing > 0 && self.volume > 0.0 {
            let history_len = self.history.len();
            for (i, out) in buffer.iter_mut().enumerate() {
                let mut wet = 0.0;
                for step in 1..=self.steps {
                    let delay = step * spacing;
                    let delayed = if i >= delay {
                        self.dry[i - delay]
                    } else {
                        let back = delay - i;
                        if back <= history_len {
                            self.history[history_len - back]
                        } else {
                            0.0
                        }
                    };
                    if delayed != 0.0 {
                        wet += delayed * self.volume / step as f32;
                    }
                }
                if wet != 0.0 {
                    *out += wet;
                    audible = true;
                }
            }
        }

        self.record();

        // A recent non-zero sample still has taps ahead of it.
        let reach = spacing * self.steps;
        let tail = spacing > 0 && self.volume > 0.0 && self.silent_run < reach;
        Ok(audible || tail)
    }

    fn reset(&mut self) {
        self.history.clear();
        self.silent_run = usize::MAX;
    }

    fn name(&self) -> &'static str {
        "reverb"
    }
}
