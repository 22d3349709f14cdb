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

//! Fractional-index resampling of a pre-sampled sound.
//!
//! The sampler turns a playback position, speed and output sample rate into an
//! interpolated block of interleaved samples. Positions are measured in frames
//! of the source sound and may be fractional, which is what allows arbitrary
//! playback speeds and rate conversion with a single linear interpolator.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::AudioError;
use super::format::WaveFormat;
use super::sound::PreSampledSound;

/// Fastest playback speed accepted, in either direction.
pub const MAX_SPEED: f64 = 32.0;
/// Speed used when a caller supplies a non-finite value.
pub const DEFAULT_SPEED: f64 = 1.0;
/// Volume used when a caller supplies a non-finite value.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// What happened to the playback position during one sampling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleTransition {
    /// Playback stayed inside the sound.
    #[default]
    None,
    /// The position wrapped around at least once.
    Looped,
    /// The position ran off the sound and the remainder was silenced.
    Finished,
}

/// The outcome of one sampling call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleResult {
    /// The position to resume from on the next call.
    pub index: f64,
    /// The last transition that occurred.
    pub transition: SampleTransition,
    /// Number of times the position wrapped during this call.
    pub loops: u32,
    /// Number of samples written from the sound. Everything after this is silence.
    pub written: usize,
}

/// Tunable sampler parameters. Read once per sampling call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParams {
    /// Overrides the sound's own sample rate, shifting pitch and speed together.
    pub custom_sample_rate: Option<u32>,
    /// Playback speed multiplier. Negative values play in reverse.
    pub speed: f64,
    /// Linear gain applied while writing.
    pub volume: f32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            custom_sample_rate: None,
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl SamplerParams {
    /// Source frames advanced per output frame.
    pub fn step(&self, sound: &PreSampledSound, target: &WaveFormat) -> f64 {
        let source_rate = self.custom_sample_rate.unwrap_or(sound.sample_rate()) as f64;
        self.speed * source_rate / target.sample_rate as f64
    }
}

/// Clamps a speed into range, mapping non-finite input to the default.
pub fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(-MAX_SPEED, MAX_SPEED)
    } else {
        DEFAULT_SPEED
    }
}

/// Clamps a volume to be non-negative, mapping non-finite input to the default.
pub fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.max(0.0)
    } else {
        DEFAULT_VOLUME
    }
}

/// Resamples a single sound. Parameters may be changed from any thread.
pub struct Sampler {
    /// The sound being played.
    sound: Arc<PreSampledSound>,
    /// Parameters, snapshotted at the start of every call.
    params: Mutex<SamplerParams>,
}

impl Sampler {
    /// Creates a sampler with default parameters.
    pub fn new(sound: Arc<PreSampledSound>) -> Self {
        Self {
            sound,
            params: Mutex::new(SamplerParams::default()),
        }
    }

    /// Returns the sound being sampled.
    pub fn sound(&self) -> &Arc<PreSampledSound> {
        &self.sound
    }

    /// Returns a consistent copy of the current parameters.
    pub fn params(&self) -> SamplerParams {
        *self.params.lock()
    }

    pub fn speed(&self) -> f64 {
        self.params.lock().speed
    }

    pub fn set_speed(&self, speed: f64) {
        self.params.lock().speed = sanitize_speed(speed);
    }

    pub fn volume(&self) -> f32 {
        self.params.lock().volume
    }

    pub fn set_volume(&self, volume: f32) {
        self.params.lock().volume = sanitize_volume(volume);
    }

    pub fn custom_sample_rate(&self) -> Option<u32> {
        self.params.lock().custom_sample_rate
    }

    /// Sets the rate override. `Some(0)` is treated as no override.
    pub fn set_custom_sample_rate(&self, rate: Option<u32>) {
        self.params.lock().custom_sample_rate = rate.filter(|rate| *rate > 0);
    }

    /// Fills `buffer` from the sound starting at `offset`.
    ///
    /// The parameters are read under the lock once, then all work happens
    /// without holding it.
    pub fn sample(
        &self,
        buffer: &mut [f32],
        offset: f64,
        looped: bool,
        target: &WaveFormat,
    ) -> Result<SampleResult, AudioError> {
        let params = self.params();
        sample_into(&self.sound, buffer, offset, looped, target, &params)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("format", &self.sound.format())
            .field("params", &self.params())
            .finish()
    }
}

/// Wraps an index into `[0, length)`.
#[inline]
fn wrap_index(index: f64, length: f64) -> f64 {
    let wrapped = index.rem_euclid(length);
    // rem_euclid can round up to `length` for tiny negative inputs.
    if wrapped >= length {
        0.0
    } else {
        wrapped
    }
}

/// Counts how many times an out-of-range index went around the sound.
#[inline]
fn wrap_count(index: f64, length: f64) -> u32 {
    index.div_euclid(length).abs().min(u32::MAX as f64) as u32
}

/// Pins an index that ran off either end of a sound to its last valid frame.
#[inline]
fn clamp_index(index: f64, length: f64) -> f64 {
    if index < 0.0 {
        0.0
    } else {
        (length - 1.0).max(0.0)
    }
}

/// Core sampling routine shared by [`Sampler::sample`] and tests.
///
/// The output is written in the target's channel layout. When the sound has
/// fewer channels than the target, source channels repeat (mono feeds both
/// sides of a stereo output).
pub fn sample_into(
    sound: &PreSampledSound,
    buffer: &mut [f32],
    offset: f64,
    looped: bool,
    target: &WaveFormat,
    params: &SamplerParams,
) -> Result<SampleResult, AudioError> {
    if target.sample_rate == 0 || target.channels == 0 {
        return Err(AudioError::InvalidFormat(format!(
            "cannot sample into {}",
            target
        )));
    }

    let count = buffer.len();
    let out_channels = target.channels as usize;
    let source_channels = sound.channels() as usize;
    if count % out_channels != 0 {
        return Err(AudioError::InvalidSampleCount {
            count,
            channels: target.channels,
        });
    }
    if count % source_channels != 0 {
        return Err(AudioError::InvalidSampleCount {
            count,
            channels: sound.channels(),
        });
    }

    let length = sound.channel_sample_count();
    if length == 0 {
        buffer.fill(0.0);
        return Ok(SampleResult {
            index: 0.0,
            transition: SampleTransition::Finished,
            loops: 0,
            written: 0,
        });
    }
    if !offset.is_finite() {
        return Err(AudioError::InvalidSampleIndex {
            index: offset,
            length,
        });
    }

    let length_f = length as f64;
    let step = params.step(sound, target);
    if !step.is_finite() {
        return Err(AudioError::InvalidSampleIndex {
            index: step,
            length,
        });
    }

    let volume = params.volume;
    let mut index = if looped {
        wrap_index(offset, length_f)
    } else {
        offset.clamp(0.0, (length_f - 1.0).max(0.0))
    };
    let mut transition = SampleTransition::None;
    let mut loops = 0u32;

    for frame in 0..count / out_channels {
        if index >= length_f || index < 0.0 {
            if looped {
                loops = loops.saturating_add(wrap_count(index, length_f));
                index = wrap_index(index, length_f);
                transition = SampleTransition::Looped;
            } else {
                let written = frame * out_channels;
                buffer[written..].fill(0.0);
                return Ok(SampleResult {
                    index: clamp_index(index, length_f),
                    transition: SampleTransition::Finished,
                    loops,
                    written,
                });
            }
        }

        let base = index.floor();
        let fraction = (index - base) as f32;
        let frame_index = base as i64;
        let start = frame * out_channels;
        for (channel, slot) in buffer[start..start + out_channels].iter_mut().enumerate() {
            let source_channel = channel % source_channels;
            let a = sound.sample_at(frame_index, source_channel);
            let b = sound.sample_at(frame_index + 1, source_channel);
            *slot = (a + (b - a) * fraction) * volume;
        }

        index += step;
    }

    // Report a crossing on the final frame now rather than on the next call.
    if index >= length_f || index < 0.0 {
        if looped {
            loops = loops.saturating_add(wrap_count(index, length_f));
            index = wrap_index(index, length_f);
            transition = SampleTransition::Looped;
        } else {
            index = clamp_index(index, length_f);
            transition = SampleTransition::Finished;
        }
    }

    Ok(SampleResult {
        index,
        transition,
        loops,
        written: count,
    })
}
