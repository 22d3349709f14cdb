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

//! One playing voice of a pre-sampled sound.
//!
//! An instance pairs a [`Sampler`] with a position cursor, playback controls and
//! a chain of modifiers. Controls may be changed from any thread while the mix
//! thread pulls samples. Every lock here is held only for a field copy or a
//! single block of modifier work, and no method takes two of them at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::error::AudioError;
use super::format::WaveFormat;
use super::modifier::pan::sanitize_pan;
use super::modifier::{BiquadModifier, Modifier, ModifierChain, PanModifier};
use super::sampler::{SampleTransition, Sampler};
use super::sound::PreSampledSound;

/// Global instance ID counter.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Playback state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundState {
    Playing,
    Paused,
    Stopped,
    Finished,
}

/// Receives loop and finish notifications. Called on the mix thread while the
/// engine holds its mix lock, so implementations must not block or call
/// [`AudioEngine::stop_all`](super::engine::AudioEngine::stop_all).
pub trait InstanceListener: Send + Sync {
    /// The position wrapped `loops` times during the last block.
    fn sound_looped(&self, _instance: u64, _loops: u32) {}

    /// The instance reached the end of its sound and any effect tail.
    fn sound_finished(&self, _instance: u64) {}
}

/// Plain control values, copied out under the lock.
#[derive(Debug, Clone, Copy)]
struct Controls {
    state: SoundState,
    /// Fractional frame position in the sound.
    position: f64,
    looped: bool,
    pan: f32,
    low_pass: Option<f32>,
    high_pass: Option<f32>,
    /// The sound has ended and only modifier tails are still playing.
    draining: bool,
    /// Bumped by seeks and transport changes so a block computed against an
    /// older position doesn't overwrite them.
    revision: u64,
}

/// Modifiers owned by the instance. The built-ins run after the user chain.
struct Effects {
    chain: ModifierChain,
    low_pass: BiquadModifier,
    high_pass: BiquadModifier,
    pan: PanModifier,
}

impl Effects {
    fn apply(
        &mut self,
        buffer: &mut [f32],
        format: &WaveFormat,
        controls: &Controls,
    ) -> Result<bool, AudioError> {
        let mut pending = self.chain.apply(buffer, format)?;

        if let Some(frequency) = controls.low_pass {
            self.low_pass.set_frequency(frequency);
            pending |= self.low_pass.modify(buffer, format)?;
        }
        if let Some(frequency) = controls.high_pass {
            self.high_pass.set_frequency(frequency);
            pending |= self.high_pass.modify(buffer, format)?;
        }
        if controls.pan != 0.0 {
            self.pan.set_pan(controls.pan);
            pending |= self.pan.modify(buffer, format)?;
        }

        Ok(pending)
    }

    fn reset(&mut self) {
        self.chain.reset();
        self.low_pass.reset();
        self.high_pass.reset();
    }
}

/// A single playback of a [`PreSampledSound`].
pub struct SoundInstance {
    /// Unique ID for this instance.
    id: u64,
    /// Resamples the sound and owns speed, volume and rate override.
    sampler: Sampler,
    controls: Mutex<Controls>,
    effects: Mutex<Effects>,
    listener: Mutex<Option<Arc<dyn InstanceListener>>>,
}

impl SoundInstance {
    /// Creates a stopped instance positioned at the start of the sound.
    pub fn new(sound: Arc<PreSampledSound>) -> Self {
        Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            sampler: Sampler::new(sound),
            controls: Mutex::new(Controls {
                state: SoundState::Stopped,
                position: 0.0,
                looped: false,
                pan: 0.0,
                low_pass: None,
                high_pass: None,
                draining: false,
                revision: 0,
            }),
            effects: Mutex::new(Effects {
                chain: ModifierChain::new(),
                low_pass: BiquadModifier::low_pass(f32::MAX),
                high_pass: BiquadModifier::high_pass(0.0),
                pan: PanModifier::default(),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sound(&self) -> &Arc<PreSampledSound> {
        self.sampler.sound()
    }

    /// Fills `buffer` with the next block of this instance in `format`.
    ///
    /// Anything other than `Playing` yields silence without touching the
    /// sampler. Returns `Finished` only on the block where the instance
    /// actually transitions, which is after every modifier tail has drained.
    pub fn get_samples(
        &self,
        buffer: &mut [f32],
        format: &WaveFormat,
    ) -> Result<SampleTransition, AudioError> {
        let controls = *self.controls.lock();
        if controls.state != SoundState::Playing {
            buffer.fill(0.0);
            return Ok(SampleTransition::None);
        }

        let (index, transition, loops) = if controls.draining {
            buffer.fill(0.0);
            (controls.position, SampleTransition::Finished, 0)
        } else {
            let result = self
                .sampler
                .sample(buffer, controls.position, controls.looped, format)?;
            (result.index, result.transition, result.loops)
        };

        let pending = self.effects.lock().apply(buffer, format, &controls)?;

        let finished = transition == SampleTransition::Finished && !pending;
        {
            let mut current = self.controls.lock();
            if current.revision == controls.revision && current.state == SoundState::Playing {
                current.position = index;
                if transition == SampleTransition::Finished {
                    current.draining = pending;
                    if finished {
                        current.state = SoundState::Finished;
                    }
                }
            }
        }

        let reported = match transition {
            SampleTransition::Looped => SampleTransition::Looped,
            SampleTransition::Finished if finished => SampleTransition::Finished,
            _ => SampleTransition::None,
        };

        if reported != SampleTransition::None {
            let listener = self.listener.lock().clone();
            if let Some(listener) = listener {
                match reported {
                    SampleTransition::Looped => listener.sound_looped(self.id, loops),
                    _ => listener.sound_finished(self.id),
                }
            }
        }

        Ok(reported)
    }

    /// Starts or resumes playback. A finished instance starts over.
    pub fn play(&self) {
        let start = self.start_position();
        let mut controls = self.controls.lock();
        if controls.state == SoundState::Finished {
            controls.position = start;
            controls.draining = false;
            controls.revision += 1;
        }
        controls.state = SoundState::Playing;
        debug!(
            instance = self.id,
            position = controls.position,
            "Instance playing"
        );
    }

    /// Pauses a playing instance, keeping its position.
    pub fn pause(&self) {
        let mut controls = self.controls.lock();
        if controls.state == SoundState::Playing {
            controls.state = SoundState::Paused;
        }
    }

    /// Stops playback, rewinds, and clears effect state.
    pub fn stop(&self) {
        let start = self.start_position();
        {
            let mut controls = self.controls.lock();
            controls.state = SoundState::Stopped;
            controls.position = start;
            controls.draining = false;
            controls.revision += 1;
        }
        self.effects.lock().reset();
    }

    pub fn state(&self) -> SoundState {
        self.controls.lock().state
    }

    /// Where playback begins for the current direction.
    fn start_position(&self) -> f64 {
        if self.sampler.speed() < 0.0 {
            (self.sound().channel_sample_count() as f64 - 1.0).max(0.0)
        } else {
            0.0
        }
    }

    /// Current position in frames of the sound.
    pub fn position_frames(&self) -> f64 {
        self.controls.lock().position
    }

    /// Seeks to a frame. Out-of-range values are clamped into the sound, NaN seeks to the start.
    ///
    /// Seeking a finished instance leaves it stopped at the new position.
    pub fn set_position_frames(&self, frames: f64) {
        let length = self.sound().channel_sample_count() as f64;
        let frames = if frames.is_nan() {
            0.0
        } else {
            frames.clamp(0.0, (length - 1.0).max(0.0))
        };
        let mut controls = self.controls.lock();
        controls.position = frames;
        controls.draining = false;
        controls.revision += 1;
        if controls.state == SoundState::Finished {
            controls.state = SoundState::Stopped;
        }
    }

    /// Current position as time at the sound's native rate.
    pub fn position(&self) -> Duration {
        let seconds = self.position_frames() / self.sound().sample_rate() as f64;
        Duration::from_secs_f64(seconds.max(0.0))
    }

    pub fn set_position(&self, position: Duration) {
        self.set_position_frames(position.as_secs_f64() * self.sound().sample_rate() as f64);
    }

    pub fn looped(&self) -> bool {
        self.controls.lock().looped
    }

    pub fn set_looped(&self, looped: bool) {
        self.controls.lock().looped = looped;
    }

    pub fn volume(&self) -> f32 {
        self.sampler.volume()
    }

    /// Sets the linear gain. Negative values clamp to 0, NaN resets to 1.
    pub fn set_volume(&self, volume: f32) {
        self.sampler.set_volume(volume);
    }

    pub fn speed(&self) -> f64 {
        self.sampler.speed()
    }

    /// Sets the playback speed. Negative plays in reverse, NaN resets to 1.
    pub fn set_speed(&self, speed: f64) {
        self.sampler.set_speed(speed);
    }

    pub fn custom_sample_rate(&self) -> Option<u32> {
        self.sampler.custom_sample_rate()
    }

    pub fn set_custom_sample_rate(&self, rate: Option<u32>) {
        self.sampler.set_custom_sample_rate(rate);
    }

    pub fn pan(&self) -> f32 {
        self.controls.lock().pan
    }

    /// Sets the pan in [-1, 1]. NaN centers.
    pub fn set_pan(&self, pan: f32) {
        self.controls.lock().pan = sanitize_pan(pan);
    }

    pub fn low_pass_frequency(&self) -> Option<f32> {
        self.controls.lock().low_pass
    }

    /// Enables a low-pass at the given cutoff, clamped to [0, Nyquist]. NaN disables it.
    pub fn set_low_pass_frequency(&self, frequency: Option<f32>) {
        let frequency = self.sanitize_cutoff(frequency);
        self.controls.lock().low_pass = frequency;
    }

    pub fn high_pass_frequency(&self) -> Option<f32> {
        self.controls.lock().high_pass
    }

    /// Enables a high-pass at the given cutoff, clamped to [0, Nyquist]. NaN disables it.
    pub fn set_high_pass_frequency(&self, frequency: Option<f32>) {
        let frequency = self.sanitize_cutoff(frequency);
        self.controls.lock().high_pass = frequency;
    }

    fn sanitize_cutoff(&self, frequency: Option<f32>) -> Option<f32> {
        let nyquist = self.sound().format().nyquist();
        frequency
            .filter(|f| !f.is_nan())
            .map(|f| f.clamp(0.0, nyquist))
    }

    /// Appends a modifier to the instance's chain.
    pub fn add_modifier(&self, modifier: Box<dyn Modifier>) {
        self.effects.lock().chain.add(modifier);
    }

    /// Inserts a modifier at `index` in the chain.
    pub fn insert_modifier(&self, index: usize, modifier: Box<dyn Modifier>) {
        self.effects.lock().chain.insert(index, modifier);
    }

    /// Removes the modifier at `index`.
    pub fn remove_modifier(&self, index: usize) -> Option<Box<dyn Modifier>> {
        self.effects.lock().chain.remove(index)
    }

    pub fn clear_modifiers(&self) {
        self.effects.lock().chain.clear();
    }

    pub fn modifier_count(&self) -> usize {
        self.effects.lock().chain.len()
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn InstanceListener>>) {
        *self.listener.lock() = listener;
    }
}

impl PartialEq for SoundInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Debug for SoundInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let controls = *self.controls.lock();
        f.debug_struct("SoundInstance")
            .field("id", &self.id)
            .field("state", &controls.state)
            .field("position", &controls.position)
            .field("sampler", &self.sampler)
            .finish()
    }
}
