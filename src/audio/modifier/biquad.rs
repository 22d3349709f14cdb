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

//! Low/high-pass filtering with one biquad per channel.
//!
//! Direct Form II transposed, coefficients from the RBJ audio EQ cookbook.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::Modifier;
use crate::audio::error::AudioError;
use crate::audio::format::WaveFormat;

/// Lowest cutoff used when computing coefficients.
const MIN_CUTOFF: f32 = 1.0;
/// Fraction of Nyquist the cutoff is held under to keep the poles stable.
const MAX_CUTOFF_RATIO: f32 = 0.99;

/// Which band the filter passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    fn new(kind: FilterKind, cutoff: f32, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let cutoff = cutoff.clamp(MIN_CUTOFF, (nyquist * MAX_CUTOFF_RATIO).max(MIN_CUTOFF));

        let omega = 2.0 * PI * cutoff as f64 / sample_rate as f64;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * FRAC_1_SQRT_2);

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ),
            FilterKind::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }
}

/// Filter memory for one channel.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    z1: f32,
    z2: f32,
}

impl ChannelState {
    #[inline]
    fn process(&mut self, input: f32, c: &Coefficients) -> f32 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// A low- or high-pass filter modifier.
#[derive(Debug)]
pub struct BiquadModifier {
    kind: FilterKind,
    /// Requested cutoff in Hz.
    frequency: f32,
    /// Coefficients and the (sample rate, cutoff) they were computed for.
    cached: Option<(u32, f32, Coefficients)>,
    /// One state per interleaved channel.
    channels: Vec<ChannelState>,
}

impl BiquadModifier {
    pub fn new(kind: FilterKind, frequency: f32) -> Self {
        let mut modifier = Self {
            kind,
            frequency: 0.0,
            cached: None,
            channels: Vec::new(),
        };
        modifier.set_frequency(frequency);
        modifier
    }

    pub fn low_pass(frequency: f32) -> Self {
        Self::new(FilterKind::LowPass, frequency)
    }

    pub fn high_pass(frequency: f32) -> Self {
        Self::new(FilterKind::HighPass, frequency)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Sets the cutoff. Non-finite input opens the filter fully.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = if frequency.is_finite() {
            frequency.max(0.0)
        } else {
            match self.kind {
                FilterKind::LowPass => f32::MAX,
                FilterKind::HighPass => 0.0,
            }
        };
    }

    fn coefficients(&mut self, sample_rate: u32) -> Coefficients {
        match self.cached {
            Some((rate, frequency, coefficients))
                if rate == sample_rate && frequency == self.frequency =>
            {
                coefficients
            }
            _ => {
                let coefficients = Coefficients::new(self.kind, self.frequency, sample_rate);
                self.cached = Some((sample_rate, self.frequency, coefficients));
                coefficients
            }
        }
    }
}

impl Modifier for BiquadModifier {
    fn modify(&mut self, buffer: &mut [f32], format: &WaveFormat) -> Result<bool, AudioError> {
        if buffer.is_empty() {
            return Ok(false);
        }

        let channel_count = format.channels as usize;
        if channel_count == 0 || buffer.len() % channel_count != 0 {
            return Err(AudioError::InvalidSampleCount {
                count: buffer.len(),
                channels: format.channels,
            });
        }
        if self.channels.len() != channel_count {
            self.channels = vec![ChannelState::default(); channel_count];
        }

        let coefficients = self.coefficients(format.sample_rate);
        for frame in buffer.chunks_exact_mut(channel_count) {
            for (sample, state) in frame.iter_mut().zip(self.channels.iter_mut()) {
                *sample = state.process(*sample, &coefficients);
            }
        }

        Ok(false)
    }

    fn reset(&mut self) {
        for state in &mut self.channels {
            *state = ChannelState::default();
        }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            FilterKind::LowPass => "low-pass",
            FilterKind::HighPass => "high-pass",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::OUTPUT_FORMAT;
    use crate::testutil::{calculate_rms, sine};

    fn mono(rate: u32) -> WaveFormat {
        WaveFormat::new(rate, 1).unwrap()
    }

    #[test]
    fn test_empty_buffer_is_untouched() {
        let mut filter = BiquadModifier::low_pass(1000.0);
        let mut buffer: Vec<f32> = Vec::new();
        assert!(!filter.modify(&mut buffer, &OUTPUT_FORMAT).unwrap());
        assert!(filter.cached.is_none());
    }

    #[test]
    fn test_partial_frame_is_rejected() {
        let mut filter = BiquadModifier::low_pass(1000.0);
        let mut buffer = vec![0.5; 5];
        let result = filter.modify(&mut buffer, &OUTPUT_FORMAT);
        assert!(matches!(
            result,
            Err(AudioError::InvalidSampleCount {
                count: 5,
                channels: 2,
            })
        ));
        assert!(buffer.iter().all(|s| *s == 0.5));
    }

    #[test]
    fn test_low_pass_attenuates_highs() {
        let mut filter = BiquadModifier::low_pass(500.0);
        let mut high = sine(10_000.0, 44100, 4410);
        filter.modify(&mut high, &mono(44100)).unwrap();
        assert!(calculate_rms(&high[441..]) < 0.02);

        let mut filter = BiquadModifier::low_pass(5000.0);
        let mut low = sine(100.0, 44100, 4410);
        filter.modify(&mut low, &mono(44100)).unwrap();
        assert!(calculate_rms(&low[441..]) > 0.6);
    }

    #[test]
    fn test_high_pass_removes_dc() {
        let mut filter = BiquadModifier::high_pass(200.0);
        let mut buffer = vec![1.0; 8820];
        filter.modify(&mut buffer, &mono(44100)).unwrap();
        assert!(buffer[8000..].iter().all(|s| s.abs() < 1e-2));
    }

    #[test]
    fn test_low_pass_keeps_dc() {
        let mut filter = BiquadModifier::low_pass(200.0);
        let mut buffer = vec![1.0; 8820];
        filter.modify(&mut buffer, &mono(44100)).unwrap();
        assert!(buffer[8000..].iter().all(|s| (s - 1.0).abs() < 1e-2));
    }

    #[test]
    fn test_channels_filtered_independently() {
        let mut filter = BiquadModifier::high_pass(200.0);
        // Left carries DC, right carries nothing.
        let mut buffer: Vec<f32> = (0..8820)
            .map(|i| if i % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        filter.modify(&mut buffer, &OUTPUT_FORMAT).unwrap();
        assert!(buffer.iter().skip(1).step_by(2).all(|s| *s == 0.0));
        assert!(buffer[0] > 0.5);
    }

    #[test]
    fn test_coefficients_follow_format_and_frequency() {
        let mut filter = BiquadModifier::low_pass(1000.0);
        let mut buffer = vec![0.0; 4];
        filter.modify(&mut buffer, &mono(44100)).unwrap();
        let first = filter.cached.unwrap();
        assert_eq!(first.0, 44100);

        filter.modify(&mut buffer, &mono(22050)).unwrap();
        let second = filter.cached.unwrap();
        assert_eq!(second.0, 22050);
        assert_ne!(first.2, second.2);

        filter.set_frequency(2000.0);
        filter.modify(&mut buffer, &mono(22050)).unwrap();
        assert_eq!(filter.cached.unwrap().1, 2000.0);

        filter.modify(&mut buffer, &OUTPUT_FORMAT).unwrap();
        assert_eq!(filter.channels.len(), 2);
    }

    #[test]
    fn test_non_finite_frequency_opens_filter() {
        let mut filter = BiquadModifier::low_pass(f32::NAN);
        assert_eq!(filter.frequency(), f32::MAX);
        filter.set_frequency(-5.0);
        assert_eq!(filter.frequency(), 0.0);

        let filter = BiquadModifier::high_pass(f32::INFINITY);
        assert_eq!(filter.frequency(), 0.0);
    }

    #[test]
    fn test_stays_finite_at_extremes() {
        for frequency in [0.0, 1.0, 22050.0, f32::MAX] {
            for kind in [FilterKind::LowPass, FilterKind::HighPass] {
                let mut filter = BiquadModifier::new(kind, frequency);
                let mut buffer = sine(440.0, 44100, 44100);
                filter.modify(&mut buffer, &mono(44100)).unwrap();
                assert!(buffer.iter().all(|s| s.is_finite()));
            }
        }
    }
}
